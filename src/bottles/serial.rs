use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::OxitopError;

/// Bottle serial number: the run's start date plus a sequence number,
/// written `YYMMDD-NN` (or `YYMMDDNN` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BottleSerial {
    date: NaiveDate,
    number: u8,
}

impl BottleSerial {
    pub fn new(date: NaiveDate, number: u8) -> Result<Self, OxitopError> {
        if !(1..=99).contains(&number) {
            return Err(OxitopError::decode(format!(
                "bottle sequence number {} is not between 1 and 99",
                number
            )));
        }
        Ok(Self { date, number })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Serial as transmitted by the unit, without the dash.
    pub fn wire(&self) -> String {
        format!("{}{:02}", self.date.format("%y%m%d"), self.number)
    }
}

impl FromStr for BottleSerial {
    type Err = OxitopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OxitopError::decode(format!("invalid serial number {}", s));

        let (date, number) = match s.split_once('-') {
            Some(parts) => parts,
            None if s.len() == 8 && s.is_char_boundary(6) => s.split_at(6),
            None => return Err(invalid()),
        };
        if date.len() != 6 || number.len() != 2 {
            return Err(invalid());
        }
        if !date.bytes().chain(number.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let date = NaiveDate::parse_from_str(date, "%y%m%d").map_err(|_| invalid())?;
        let number: u8 = number.parse().map_err(|_| invalid())?;
        Self::new(date, number).map_err(|_| invalid())
    }
}

impl fmt::Display for BottleSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.date.format("%y%m%d"), self.number)
    }
}

/// User-assigned bottle tag, 1 to 999. Not unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BottleId(u16);

impl BottleId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 999;

    pub fn new(id: u32) -> Result<Self, OxitopError> {
        if !(Self::MIN as u32..=Self::MAX as u32).contains(&id) {
            return Err(OxitopError::decode(format!(
                "id must be an integer between 1 and 999, got {}",
                id
            )));
        }
        Ok(Self(id as u16))
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl FromStr for BottleId {
    type Err = OxitopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s
            .trim()
            .parse()
            .map_err(|_| OxitopError::decode(format!("invalid bottle id {:?}", s)))?;
        Self::new(id)
    }
}

impl fmt::Display for BottleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Pressure,
    Bod,
}

impl FromStr for Mode {
    type Err = OxitopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pressure" => Ok(Mode::Pressure),
            "bod" => Ok(Mode::Bod),
            _ => Err(OxitopError::decode(format!(
                "mode must be one of \"pressure\" or \"bod\", got {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Pressure => write!(f, "pressure"),
            Mode::Bod => write!(f, "bod"),
        }
    }
}
