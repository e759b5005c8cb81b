//! Bottles the emulated unit holds on power-up.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::bottles::{Bottle, BottleId, BottleSerial, Mode};
use crate::utils::error::OxitopError;

/// Pressure readings recorded by head 60108 over a 14 day run.
const RUN_60108: [i32; 361] = [
    970, 965, 965, 965, 965, 965, 964, 965, 965, 965, 965, 964,
    965, 965, 965, 965, 965, 965, 964, 965, 965, 965, 965, 965,
    964, 965, 965, 964, 964, 964, 965, 965, 965, 965, 965, 965,
    965, 965, 964, 964, 965, 965, 965, 964, 965, 965, 965, 965,
    965, 965, 965, 965, 965, 965, 965, 964, 964, 964, 965, 965,
    965, 965, 965, 964, 964, 964, 964, 965, 965, 965, 965, 965,
    964, 964, 964, 964, 964, 964, 965, 965, 965, 965, 965, 964,
    964, 964, 964, 964, 965, 965, 964, 964, 964, 965, 965, 964,
    965, 965, 964, 964, 965, 964, 964, 964, 965, 965, 964, 964,
    964, 965, 965, 964, 964, 964, 965, 964, 964, 964, 964, 965,
    964, 965, 965, 964, 964, 965, 965, 964, 964, 964, 964, 964,
    965, 964, 965, 965, 964, 965, 965, 964, 965, 964, 965, 965,
    965, 964, 965, 964, 964, 964, 964, 964, 964, 964, 964, 964,
    964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 965, 965,
    964, 964, 964, 964, 964, 965, 964, 964, 964, 964, 964, 964,
    964, 964, 964, 965, 965, 964, 965, 964, 964, 965, 964, 964,
    964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964,
    964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964,
    964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964, 964,
    964, 964, 964, 964, 964, 964, 964, 964, 964, 963, 963, 964,
    963, 963, 964, 964, 964, 964, 964, 964, 963, 964, 964, 964,
    964, 964, 964, 964, 964, 963, 963, 963, 963, 964, 964, 964,
    964, 963, 963, 964, 964, 964, 963, 963, 963, 964, 963, 964,
    964, 964, 964, 964, 964, 963, 963, 963, 963, 963, 963, 963,
    963, 963, 963, 963, 963, 963, 963, 963, 964, 964, 963, 963,
    963, 963, 963, 963, 963, 964, 963, 963, 963, 963, 963, 962,
    962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962,
    961, 962, 962, 962, 963, 962, 962, 962, 962, 962, 962, 962,
    962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 961,
    962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 961,
    962,
];

/// Pressure readings recorded by head 60145 over a 28 day run.
const RUN_60145: [i32; 361] = [
    976, 964, 963, 963, 963, 963, 963, 963, 963, 963, 963, 963,
    963, 963, 964, 963, 963, 963, 963, 963, 963, 963, 963, 963,
    962, 963, 963, 962, 962, 963, 963, 963, 963, 962, 963, 963,
    963, 962, 962, 963, 962, 963, 963, 962, 962, 963, 963, 963,
    963, 962, 962, 963, 963, 963, 962, 963, 963, 963, 963, 962,
    962, 962, 963, 962, 963, 962, 962, 963, 963, 962, 962, 962,
    962, 963, 962, 962, 962, 962, 963, 963, 962, 963, 963, 963,
    962, 962, 962, 962, 963, 962, 962, 962, 962, 962, 962, 962,
    962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 963, 962,
    962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962, 962,
    962, 961, 962, 961, 962, 962, 962, 962, 962, 962, 962, 961,
    962, 961, 961, 962, 961, 962, 962, 962, 962, 961, 962, 962,
    961, 962, 962, 961, 962, 961, 962, 961, 962, 961, 962, 961,
    962, 961, 962, 961, 962, 961, 962, 961, 961, 961, 962, 961,
    962, 962, 961, 962, 962, 961, 961, 961, 962, 961, 961, 962,
    962, 961, 962, 961, 961, 961, 961, 961, 962, 961, 961, 961,
    961, 962, 961, 962, 961, 961, 962, 961, 961, 962, 961, 961,
    961, 961, 961, 961, 961, 961, 961, 961, 961, 961, 961, 961,
    962, 961, 960, 961, 961, 961, 961, 960, 961, 961, 960, 961,
    961, 961, 961, 961, 961, 961, 961, 961, 961, 961, 961, 961,
    961, 961, 960, 961, 960, 961, 961, 960, 961, 960, 961, 960,
    960, 960, 961, 961, 960, 961, 960, 961, 961, 960, 961, 960,
    961, 960, 961, 960, 960, 960, 961, 960, 960, 961, 961, 961,
    960, 961, 960, 960, 961, 960, 960, 961, 960, 960, 960, 960,
    961, 960, 960, 960, 960, 960, 960, 961, 960, 960, 960, 960,
    960, 960, 960, 959, 960, 959, 960, 960, 959, 960, 960, 960,
    960, 960, 960, 960, 960, 960, 960, 960, 960, 960, 960, 960,
    960, 959, 960, 959, 960, 960, 959, 960, 960, 959, 960, 960,
    959, 960, 959, 959, 960, 959, 959, 959, 960, 960, 960, 959,
    959, 960, 959, 960, 960, 959, 960, 959, 959, 960, 959, 959,
    960,
];

const BOTTLE_VOLUME: f64 = 510.0;
const SAMPLE_VOLUME: f64 = 432.0;
const MEASUREMENTS: u32 = 360;

fn timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> Result<NaiveDateTime, OxitopError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, min, sec))
        .ok_or_else(|| OxitopError::decode(format!("invalid fixture date {}-{}-{}", year, month, day)))
}

fn pressure_bottle(
    serial: &str,
    id: u32,
    start: NaiveDateTime,
    days: i64,
    interval_minutes: i64,
) -> Result<Bottle, OxitopError> {
    Bottle::new(
        serial.parse::<BottleSerial>()?,
        BottleId::new(id)?,
        start,
        start + Duration::days(days),
        Duration::minutes(interval_minutes),
        MEASUREMENTS,
        Mode::Pressure,
        BOTTLE_VOLUME,
        SAMPLE_VOLUME,
        0,
    )
}

/// The three bottles of the reference catalog, in the order GAPB lists them.
pub fn fixture_bottles() -> Result<Vec<Bottle>, OxitopError> {
    let mut first = pressure_bottle("110222-06", 999, timestamp(2011, 2, 22, 16, 54, 55)?, 14, 56)?;
    first.add_head("60108", Some(RUN_60108.to_vec()))?;

    let mut second = pressure_bottle("121119-03", 3, timestamp(2012, 11, 19, 13, 53, 4)?, 3, 12)?;
    second.add_head("60108", Some(Vec::new()))?;

    let mut third = pressure_bottle("120323-01", 1, timestamp(2012, 3, 23, 17, 32, 23)?, 28, 112)?;
    third.add_head("60145", Some(RUN_60145.to_vec()))?;
    third.add_head("60143", Some(RUN_60108.to_vec()))?;

    Ok(vec![first, second, third])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_catalog() {
        let bottles = fixture_bottles().unwrap();
        let serials: Vec<String> = bottles.iter().map(|b| b.serial().to_string()).collect();
        assert_eq!(serials, vec!["110222-06", "121119-03", "120323-01"]);

        let head_counts: Vec<usize> = bottles.iter().map(|b| b.heads().len()).collect();
        assert_eq!(head_counts, vec![1, 1, 2]);

        assert_eq!(bottles[0].day_count(), 14);
        assert_eq!(bottles[1].day_count(), 3);
        assert_eq!(bottles[2].day_count(), 28);
        assert_eq!(bottles[2].interval().num_minutes(), 112);
        assert!(bottles.iter().all(|b| !b.is_bound()));
    }

    #[test]
    fn test_fixture_readings() {
        let bottles = fixture_bottles().unwrap();
        let readings = bottles[0].heads()[0].cached_readings().unwrap();
        assert_eq!(readings.len(), 361);
        assert!(bottles[1].heads()[0].cached_readings().unwrap().is_empty());
        assert_eq!(
            bottles[2].head("60143").unwrap().cached_readings().unwrap().values(),
            readings.values()
        );
    }

    #[test]
    fn test_fixtures_encode() {
        for bottle in fixture_bottles().unwrap() {
            assert!(bottle.to_wire().is_ok(), "{} failed to encode", bottle.serial());
        }
    }
}
