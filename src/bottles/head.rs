use chrono::NaiveDateTime;
use log::debug;

use super::bottle::BottleRef;
use super::readings::BottleReadings;
use super::serial::BottleSerial;
use crate::codec;
use crate::utils::error::OxitopError;

/// Identifies the head a set of readings belongs to, along with the bottle
/// details the readings record repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadRef {
    head_serial: String,
    bottle_serial: BottleSerial,
    bottle_start: NaiveDateTime,
}

impl HeadRef {
    pub fn head_serial(&self) -> &str {
        &self.head_serial
    }

    pub fn bottle_serial(&self) -> BottleSerial {
        self.bottle_serial
    }

    pub fn bottle_start(&self) -> NaiveDateTime {
        self.bottle_start
    }
}

/// A measuring head on a bottle. Readings are fetched on first access.
#[derive(Debug, Clone)]
pub struct BottleHead {
    bottle: BottleRef,
    serial: String,
    readings: Option<BottleReadings>,
}

/// Head serials are decimal and must fit the 9-digit readings header.
pub(crate) fn validate_head_serial(serial: &str) -> Result<u32, OxitopError> {
    if serial.is_empty() || serial.len() > 9 || !serial.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OxitopError::decode(format!("invalid head serial {:?}", serial)));
    }
    Ok(serial.parse()?)
}

impl BottleHead {
    pub(crate) fn new(
        bottle: BottleRef,
        serial: &str,
        readings: Option<Vec<i32>>,
    ) -> Result<Self, OxitopError> {
        validate_head_serial(serial)?;
        let mut head = Self {
            bottle,
            serial: serial.to_string(),
            readings: None,
        };
        if let Some(values) = readings {
            head.readings = Some(BottleReadings::new(head.head_ref(), values));
        }
        Ok(head)
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn bottle(&self) -> &BottleRef {
        &self.bottle
    }

    pub fn is_bound(&self) -> bool {
        self.bottle.logger.is_some()
    }

    pub fn head_ref(&self) -> HeadRef {
        HeadRef {
            head_serial: self.serial.clone(),
            bottle_serial: self.bottle.serial,
            bottle_start: self.bottle.start,
        }
    }

    /// Readings already held, without touching the data logger.
    pub fn cached_readings(&self) -> Option<&BottleReadings> {
        self.readings.as_ref()
    }

    /// Returns the head's readings, fetching them from the data logger on
    /// first access. An unbound head without readings yields `None`.
    pub fn readings(&mut self) -> Result<Option<&BottleReadings>, OxitopError> {
        if self.readings.is_none() {
            if let Some(logger) = &self.bottle.logger {
                debug!("Fetching readings for head {} of bottle {}", self.serial, self.bottle.serial);
                let bottle = self.bottle.serial;
                let head = self.serial.as_str();
                let data = logger.with_session(|session| session.fetch_readings(&bottle, head))?;
                self.readings = Some(BottleReadings::from_wire(self.head_ref(), &data)?);
            }
        }
        Ok(self.readings.as_ref())
    }

    /// Drops the cached readings so the next access fetches them again.
    pub fn refresh(&mut self) -> Result<(), OxitopError> {
        if self.bottle.logger.is_none() {
            return Err(OxitopError::NotBound(
                "Cannot refresh a bottle head with no associated data logger".to_string(),
            ));
        }
        self.readings = None;
        Ok(())
    }

    pub fn to_wire(&self) -> String {
        codec::encode_head(self)
    }

    pub(crate) fn rebind(&mut self, bottle: BottleRef) {
        self.bottle = bottle;
        let head_ref = self.head_ref();
        if let Some(readings) = &mut self.readings {
            readings.rebind(head_ref);
        }
    }
}

impl PartialEq for BottleHead {
    /// Two heads are the same head when they share a serial and sit on the
    /// same bottle; whether readings have been fetched yet is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial && self.bottle.serial == other.bottle.serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bottle_ref() -> BottleRef {
        BottleRef {
            serial: "110222-06".parse().unwrap(),
            start: NaiveDate::from_ymd_opt(2011, 2, 22)
                .unwrap()
                .and_hms_opt(16, 54, 55)
                .unwrap(),
            logger: None,
        }
    }

    #[test]
    fn test_head_serial_validation() {
        assert_eq!(validate_head_serial("60108").unwrap(), 60108);
        assert!(validate_head_serial("").is_err());
        assert!(validate_head_serial("6010a").is_err());
        assert!(validate_head_serial("1234567890").is_err());
    }

    #[test]
    fn test_unbound_head_without_readings() {
        let mut head = BottleHead::new(bottle_ref(), "60108", None).unwrap();
        assert!(!head.is_bound());
        assert!(head.readings().unwrap().is_none());
        assert!(matches!(head.refresh(), Err(OxitopError::NotBound(_))));
    }

    #[test]
    fn test_absent_and_empty_readings_differ() {
        let mut empty = BottleHead::new(bottle_ref(), "60108", Some(vec![])).unwrap();
        let absent = BottleHead::new(bottle_ref(), "60108", None).unwrap();
        assert!(empty.readings().unwrap().unwrap().is_empty());
        assert!(absent.cached_readings().is_none());
    }

    #[test]
    fn test_head_ref() {
        let head = BottleHead::new(bottle_ref(), "60108", None).unwrap();
        let head_ref = head.head_ref();
        assert_eq!(head_ref.head_serial(), "60108");
        assert_eq!(head_ref.bottle_serial().to_string(), "110222-06");
    }
}
