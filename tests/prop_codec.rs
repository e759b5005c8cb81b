//! Property tests for the record codec
//!
//! - Bottles and their heads survive encode/decode field for field
//! - Readings split into lines of at most ten values and decode back
//! - The 112 minute interval quirk only touches 112/308

use chrono::{Duration, NaiveDate, NaiveDateTime};
use oxitopdump::codec::{interval_from_wire, interval_to_wire};
use oxitopdump::{Bottle, BottleId, BottleReadings, BottleSerial, Mode};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn bottle_serial() -> impl Strategy<Value = BottleSerial> {
    (2000i32..2060, 1u32..=12, 1u32..=28, 1u8..=99).prop_map(|(y, m, d, n)| {
        BottleSerial::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), n).unwrap()
    })
}

fn start_time() -> impl Strategy<Value = NaiveDateTime> {
    (2000i32..2060, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap()
        },
    )
}

fn run_days() -> impl Strategy<Value = i64> {
    prop::sample::select(vec![1i64, 2, 3, 14, 28])
}

/// Intervals the wire carries unambiguously; 308 would decode as 112.
fn interval_minutes() -> impl Strategy<Value = i64> {
    (1i64..1440).prop_filter("308 is the wire form of 112", |m| *m != 308)
}

fn head_serials() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((1u32..999_999_999).prop_map(|s| s.to_string()), 0..4)
}

prop_compose! {
    fn bottle()(
        serial in bottle_serial(),
        id in 1u32..=999,
        start in start_time(),
        days in run_days(),
        interval in interval_minutes(),
        measurements in 0u32..10_000,
        bottle_volume in 1u32..5_000,
        sample_tenths in 1u32..50_000,
        heads in head_serials(),
    ) -> Bottle {
        let mut bottle = Bottle::new(
            serial,
            BottleId::new(id).unwrap(),
            start,
            start + Duration::days(days),
            Duration::minutes(interval),
            measurements,
            Mode::Pressure,
            f64::from(bottle_volume),
            f64::from(sample_tenths) / 10.0,
            0,
        )
        .unwrap();
        for head in &heads {
            bottle.add_head(head, None).unwrap();
        }
        bottle
    }
}

// ============================================================================
// Round-trip Property Tests
// ============================================================================

proptest! {
    #[test]
    fn bottle_round_trip(bottle in bottle()) {
        let wire = bottle.to_wire().unwrap();
        let decoded = Bottle::from_wire(&wire, None).unwrap();
        prop_assert_eq!(&decoded, &bottle);
        prop_assert_eq!(decoded.heads().len(), bottle.heads().len());
        // Constant fields come back out byte for byte
        prop_assert_eq!(decoded.to_wire().unwrap(), wire);
    }

    #[test]
    fn readings_split_and_recovered(
        bottle in bottle(),
        head in 1u32..999_999_999,
        values in prop::collection::vec(any::<i32>(), 0..300),
    ) {
        let mut bottle = bottle;
        let head = bottle.add_head(&head.to_string(), Some(values.clone())).unwrap();
        let readings = head.cached_readings().unwrap();

        let wire = readings.to_wire();
        let value_lines = wire.split('\r').filter(|l| l.starts_with(',')).count();
        prop_assert_eq!(value_lines, (values.len() + 9) / 10);
        for line in wire.split('\r').skip(1) {
            prop_assert!(line.matches(',').count() <= 10);
        }

        let decoded = BottleReadings::from_wire(head.head_ref(), &wire).unwrap();
        prop_assert_eq!(decoded.values(), values.as_slice());
        prop_assert_eq!(decoded.len(), values.len());
        prop_assert_eq!(&decoded, readings);
    }

    #[test]
    fn interval_quirk_only_affects_112(minutes in 1i64..10_000) {
        let wire = interval_to_wire(minutes);
        if minutes == 112 {
            prop_assert_eq!(wire, 308);
        } else {
            prop_assert_eq!(wire, minutes);
        }
        if minutes != 308 {
            prop_assert_eq!(interval_from_wire(wire), minutes);
        }
    }
}

#[test]
fn interval_wire_308_is_112_minutes() {
    assert_eq!(interval_from_wire(308), 112);
    assert_eq!(interval_to_wire(112), 308);
}
