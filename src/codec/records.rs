use chrono::Duration;
use log::debug;
use std::fmt::Write;

use super::{
    day_count_code, format_timestamp, interval_from_wire, interval_to_wire, parse_timestamp,
    split_lines, LINE_TERMINATOR,
};
use crate::bottles::{Bottle, BottleHead, BottleId, BottleReadings, BottleRef, BottleSerial, HeadRef, Mode};
use crate::protocol::LoggerHandle;
use crate::utils::error::OxitopError;

// Bottle header layout. The constant runs are unexplained but the unit
// always sends them, so they are reproduced verbatim.
const BOTTLE_FIELDS: usize = 20;
const HEADER_LEAD: [&str; 3] = ["0", "0", "3"];
const HEADER_BLOCK: [&str; 4] = ["2", "5", "240", "40"];
const HEADER_UNUSED: &str = "0";
const HEADER_TAIL: [&str; 2] = ["2", "1"];

const HEAD_FIELDS: usize = 4;
const HEAD_CONSTANT: &str = "150";

const READINGS_FIELDS: usize = 7;
const READINGS_FLAGS: [&str; 2] = ["1", "1"];
const VALUES_PER_LINE: usize = 10;

fn parse_wire_serial(field: &str) -> Result<BottleSerial, OxitopError> {
    if field.len() != 8 {
        return Err(OxitopError::decode(format!("invalid wire serial {:?}", field)));
    }
    field.parse()
}

fn check_constants(record: &str, received: &[&str], expected: &[&str]) {
    if received != expected {
        debug!("{} carries {:?} where {:?} was expected", record, received, expected);
    }
}

pub fn encode_bottle(bottle: &Bottle) -> Result<String, OxitopError> {
    let days = bottle.day_count();
    let code = day_count_code(days).ok_or_else(|| {
        OxitopError::Encode(format!(
            "bottle {} runs for {} days, which has no day-count code",
            bottle.serial(),
            days
        ))
    })?;

    let mut fields: Vec<String> = Vec::with_capacity(BOTTLE_FIELDS);
    fields.extend(HEADER_LEAD.iter().map(|s| s.to_string()));
    fields.push(bottle.id().to_string());
    fields.push(bottle.serial().wire());
    fields.push(format_timestamp(&bottle.start()));
    fields.push(format_timestamp(&bottle.finish()));
    fields.extend(HEADER_BLOCK.iter().map(|s| s.to_string()));
    fields.push(bottle.measurements().to_string());
    fields.push((days * 24 * 60).to_string());
    fields.push(format!("{:.0}", bottle.bottle_volume()));
    fields.push(format!("{:.1}", bottle.sample_volume()));
    fields.push(HEADER_UNUSED.to_string());
    fields.push(code.to_string());
    fields.extend(HEADER_TAIL.iter().map(|s| s.to_string()));
    fields.push(interval_to_wire(bottle.interval().num_minutes()).to_string());

    let mut out = fields.join(",");
    out.push(LINE_TERMINATOR);
    for head in bottle.heads() {
        out.push_str(&encode_head(head));
    }
    Ok(out)
}

/// Decodes a bottle header plus its head lines. `logger` is recorded on
/// the bottle and its heads so they can be refreshed later.
pub fn decode_bottle(data: &str, logger: Option<LoggerHandle>) -> Result<Bottle, OxitopError> {
    let lines = split_lines(data)?;
    let (header, head_lines) = lines
        .split_first()
        .ok_or_else(|| OxitopError::decode("empty bottle record"))?;

    let fields: Vec<&str> = header.split(',').collect();
    if fields.len() != BOTTLE_FIELDS {
        return Err(OxitopError::decode(format!(
            "bottle header has {} fields, expected {}",
            fields.len(),
            BOTTLE_FIELDS
        )));
    }
    check_constants("bottle header", &fields[0..3], &HEADER_LEAD);
    check_constants("bottle header", &fields[7..11], &HEADER_BLOCK);
    check_constants("bottle header", &fields[17..19], &HEADER_TAIL);

    let id: BottleId = fields[3].parse()?;
    let serial = parse_wire_serial(fields[4])?;
    let start = parse_timestamp(fields[5])?;
    let finish = parse_timestamp(fields[6])?;
    let measurements: u32 = fields[11].parse()?;
    let bottle_volume: f64 = fields[13].parse()?;
    let sample_volume: f64 = fields[14].parse()?;
    let wire_interval: u32 = fields[19].parse()?;
    let interval = interval_from_wire(i64::from(wire_interval));

    // The header has no mode field; everything the unit lists is a
    // pressure bottle, and dilution is always sent as 0.
    let mut bottle = Bottle::new(
        serial,
        id,
        start,
        finish,
        Duration::minutes(interval),
        measurements,
        Mode::Pressure,
        bottle_volume,
        sample_volume,
        0,
    )?;
    bottle.bind(logger);

    for line in head_lines {
        let head = decode_head(bottle.bottle_ref(), line)?;
        bottle.push_head(head);
    }
    Ok(bottle)
}

/// Splits a `GAPB` listing into bottles: a line that does not start with a
/// comma opens a new bottle, comma lines are heads of the current one.
pub fn decode_bottle_list(data: &str, logger: Option<LoggerHandle>) -> Result<Vec<Bottle>, OxitopError> {
    let mut bottles = Vec::new();
    let mut block = String::new();

    for line in split_lines(data)? {
        if !line.starts_with(',') {
            if !block.is_empty() {
                bottles.push(decode_bottle(&block, logger.clone())?);
            }
            block.clear();
        }
        block.push_str(line);
        block.push(LINE_TERMINATOR);
    }
    if !block.is_empty() {
        bottles.push(decode_bottle(&block, logger)?);
    }
    Ok(bottles)
}

pub fn encode_head(head: &BottleHead) -> String {
    format!(",{},{},{}", head.serial(), HEAD_CONSTANT, LINE_TERMINATOR)
}

pub fn decode_head(bottle: BottleRef, line: &str) -> Result<BottleHead, OxitopError> {
    let line = line.strip_suffix(LINE_TERMINATOR).unwrap_or(line);
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != HEAD_FIELDS || !fields[0].is_empty() || !fields[3].is_empty() {
        return Err(OxitopError::decode(format!("malformed head line {:?}", line)));
    }
    check_constants("head line", &fields[2..3], &[HEAD_CONSTANT]);
    BottleHead::new(bottle, fields[1], None)
}

pub fn encode_readings(readings: &BottleReadings) -> String {
    let head = readings.head();
    let mut out = format!(
        "{:0>9},{},{},{},{},{},{}{}",
        head.head_serial(),
        head.bottle_serial().wire(),
        READINGS_FLAGS[0],
        READINGS_FLAGS[1],
        readings.marker(),
        format_timestamp(&head.bottle_start()),
        readings.len(),
        LINE_TERMINATOR
    );
    for chunk in readings.chunks(VALUES_PER_LINE) {
        for value in chunk {
            // Writing to a String cannot fail
            let _ = write!(out, ",{}", value);
        }
        out.push(LINE_TERMINATOR);
    }
    out
}

/// Decodes a `GMSK` readings block for `head`, checking that the block is
/// really about that head and bottle and that no readings went missing.
pub fn decode_readings(head: HeadRef, data: &str) -> Result<BottleReadings, OxitopError> {
    let lines = split_lines(data)?;
    let (header, value_lines) = lines
        .split_first()
        .ok_or_else(|| OxitopError::decode("empty readings record"))?;

    let fields: Vec<&str> = header.split(',').collect();
    if fields.len() != READINGS_FIELDS {
        return Err(OxitopError::decode(format!(
            "readings header has {} fields, expected {}",
            fields.len(),
            READINGS_FIELDS
        )));
    }
    check_constants("readings header", &fields[2..4], &READINGS_FLAGS);

    let head_serial: u32 = fields[0].parse()?;
    let expected_head: u32 = head.head_serial().parse()?;
    if head_serial != expected_head {
        return Err(OxitopError::decode(format!(
            "readings are for head {}, expected {}",
            head_serial,
            head.head_serial()
        )));
    }

    let bottle_serial = parse_wire_serial(fields[1])?;
    if bottle_serial != head.bottle_serial() {
        return Err(OxitopError::decode(format!(
            "readings are for bottle {}, expected {}",
            bottle_serial,
            head.bottle_serial()
        )));
    }

    let marker: u16 = fields[4].parse()?;
    parse_timestamp(fields[5])?;
    let count: usize = fields[6].parse()?;

    let mut values = Vec::new();
    for line in value_lines {
        for value in line.split(',').filter(|v| !v.is_empty()) {
            values.push(value.parse::<i32>()?);
        }
    }
    if values.len() != count {
        return Err(OxitopError::decode(format!(
            "readings header declares {} values but {} were sent",
            count,
            values.len()
        )));
    }

    Ok(BottleReadings::with_marker(head, marker, values))
}
