//! Text records exchanged with the OC110.
//!
//! Every record is a run of CR-terminated lines of comma separated ASCII
//! fields. Several fields have no known meaning; they are written back
//! exactly as the unit sends them.

pub mod checksum;
pub mod records;

use chrono::NaiveDateTime;

use crate::utils::error::OxitopError;

pub use checksum::{additive_checksum, checksum_line, parse_checksum_line};
pub use records::{
    decode_bottle, decode_bottle_list, decode_head, decode_readings, encode_bottle, encode_head,
    encode_readings,
};

pub const LINE_TERMINATOR: char = '\r';
pub const TIMESTAMP_FORMAT: &str = "%y%m%d%H%M%S";

// The unit reports a 112 minute interval as 308. No other value is affected.
const INTERVAL_112_MINUTES: i64 = 112;
const INTERVAL_112_WIRE: i64 = 308;

pub fn interval_to_wire(minutes: i64) -> i64 {
    if minutes == INTERVAL_112_MINUTES {
        INTERVAL_112_WIRE
    } else {
        minutes
    }
}

pub fn interval_from_wire(value: i64) -> i64 {
    if value == INTERVAL_112_WIRE {
        INTERVAL_112_MINUTES
    } else {
        value
    }
}

/// Device constant for a run length. Only these run lengths are known.
pub fn day_count_code(days: i64) -> Option<u8> {
    match days {
        28 | 14 => Some(10),
        3 => Some(6),
        2 => Some(4),
        1 => Some(2),
        _ => None,
    }
}

pub(crate) fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(field: &str) -> Result<NaiveDateTime, OxitopError> {
    if field.len() != 12 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OxitopError::decode(format!("invalid timestamp {:?}", field)));
    }
    NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT)
        .map_err(|e| OxitopError::decode(format!("invalid timestamp {:?}: {}", field, e)))
}

/// Splits a record into its lines. The record must end with a terminator;
/// the empty piece after it is dropped.
pub(crate) fn split_lines(data: &str) -> Result<Vec<&str>, OxitopError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if !data.is_ascii() {
        return Err(OxitopError::decode("record contains non-ASCII data"));
    }
    let body = data
        .strip_suffix(LINE_TERMINATOR)
        .ok_or_else(|| OxitopError::decode("record is missing its final line terminator"))?;
    Ok(body.split(LINE_TERMINATOR).collect())
}
