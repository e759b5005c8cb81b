use chrono::{Duration, NaiveDateTime};
use log::{debug, info};

use super::head::BottleHead;
use super::serial::{BottleId, BottleSerial, Mode};
use crate::codec;
use crate::protocol::{Command, LoggerHandle};
use crate::utils::error::OxitopError;

/// What a head needs to know about the bottle it sits on. Heads hold this
/// instead of a pointer to the bottle itself.
#[derive(Debug, Clone)]
pub struct BottleRef {
    pub(crate) serial: BottleSerial,
    pub(crate) start: NaiveDateTime,
    pub(crate) logger: Option<LoggerHandle>,
}

impl BottleRef {
    pub fn serial(&self) -> BottleSerial {
        self.serial
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn logger(&self) -> Option<&LoggerHandle> {
        self.logger.as_ref()
    }
}

/// One experiment run as stored on the data logger.
#[derive(Debug, Clone)]
pub struct Bottle {
    serial: BottleSerial,
    id: BottleId,
    start: NaiveDateTime,
    finish: NaiveDateTime,
    interval: Duration,
    measurements: u32,
    mode: Mode,
    bottle_volume: f64,  // ml
    sample_volume: f64,  // ml
    dilution: u32,
    heads: Vec<BottleHead>,
    logger: Option<LoggerHandle>,  // None for bottles built by hand
}

/// True when `volume` survives being written with `decimals` places.
fn fits_wire(volume: f64, decimals: usize) -> bool {
    format!("{:.*}", decimals, volume).parse::<f64>() == Ok(volume)
}

impl Bottle {
    /// Volumes must be positive and exactly representable on the wire: whole
    /// millilitres for the bottle, tenths for the sample.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        serial: BottleSerial,
        id: BottleId,
        start: NaiveDateTime,
        finish: NaiveDateTime,
        interval: Duration,
        measurements: u32,
        mode: Mode,
        bottle_volume: f64,
        sample_volume: f64,
        dilution: u32,
    ) -> Result<Self, OxitopError> {
        for (name, volume) in [("bottle_volume", bottle_volume), ("sample_volume", sample_volume)] {
            if !(volume.is_finite() && volume > 0.0) {
                return Err(OxitopError::decode(format!("{} must be positive, got {}", name, volume)));
            }
        }
        if !fits_wire(bottle_volume, 0) {
            return Err(OxitopError::decode(format!(
                "bottle_volume must be whole millilitres, got {}",
                bottle_volume
            )));
        }
        if !fits_wire(sample_volume, 1) {
            return Err(OxitopError::decode(format!(
                "sample_volume must be in tenths of a millilitre, got {}",
                sample_volume
            )));
        }

        Ok(Self {
            serial,
            id,
            start,
            finish,
            interval,
            measurements,
            mode,
            bottle_volume,
            sample_volume,
            dilution,
            heads: Vec::new(),
            logger: None,
        })
    }

    pub fn serial(&self) -> BottleSerial {
        self.serial
    }

    pub fn id(&self) -> BottleId {
        self.id
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn finish(&self) -> NaiveDateTime {
        self.finish
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn measurements(&self) -> u32 {
        self.measurements
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn bottle_volume(&self) -> f64 {
        self.bottle_volume
    }

    pub fn sample_volume(&self) -> f64 {
        self.sample_volume
    }

    pub fn dilution(&self) -> u32 {
        self.dilution
    }

    pub fn heads(&self) -> &[BottleHead] {
        &self.heads
    }

    pub fn heads_mut(&mut self) -> &mut [BottleHead] {
        &mut self.heads
    }

    pub fn head(&self, serial: &str) -> Option<&BottleHead> {
        self.heads.iter().find(|h| h.serial() == serial)
    }

    pub fn head_mut(&mut self, serial: &str) -> Option<&mut BottleHead> {
        self.heads.iter_mut().find(|h| h.serial() == serial)
    }

    /// Attaches a new head. `readings` of `None` leaves them to be fetched
    /// later (which only works on a bound bottle).
    pub fn add_head(
        &mut self,
        serial: &str,
        readings: Option<Vec<i32>>,
    ) -> Result<&mut BottleHead, OxitopError> {
        let head = BottleHead::new(self.bottle_ref(), serial, readings)?;
        self.heads.push(head);
        let index = self.heads.len() - 1;
        Ok(&mut self.heads[index])
    }

    pub fn logger(&self) -> Option<&LoggerHandle> {
        self.logger.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.logger.is_some()
    }

    /// Whole days between start and finish.
    pub fn day_count(&self) -> i64 {
        (self.finish - self.start).num_days()
    }

    pub fn mode_string(&self) -> String {
        match self.mode {
            Mode::Pressure => format!("Pressure {}d", self.day_count()),
            Mode::Bod => "BOD".to_string(),
        }
    }

    pub fn bottle_ref(&self) -> BottleRef {
        BottleRef {
            serial: self.serial,
            start: self.start,
            logger: self.logger.clone(),
        }
    }

    pub fn to_wire(&self) -> Result<String, OxitopError> {
        codec::encode_bottle(self)
    }

    pub fn from_wire(data: &str, logger: Option<LoggerHandle>) -> Result<Self, OxitopError> {
        codec::decode_bottle(data, logger)
    }

    /// Re-reads this bottle from the data logger it came from and replaces
    /// every field with the fresh copy. Heads are replaced too, so cached
    /// readings are dropped.
    pub fn refresh(&mut self) -> Result<(), OxitopError> {
        let logger = self.logger.clone().ok_or_else(|| {
            OxitopError::NotBound("Cannot refresh a bottle with no associated data logger".to_string())
        })?;

        info!("🔄 Refreshing bottle {}", self.serial);
        let command = Command::Gprb { bottle: self.serial };
        let data = logger.with_session(|session| session.execute(&command))?;
        let fresh = codec::decode_bottle(&data, Some(logger))?;

        let Bottle {
            serial,
            id,
            start,
            finish,
            interval,
            measurements,
            mode,
            bottle_volume,
            sample_volume,
            dilution,
            heads,
            logger,
        } = fresh;
        self.serial = serial;
        self.id = id;
        self.start = start;
        self.finish = finish;
        self.interval = interval;
        self.measurements = measurements;
        self.mode = mode;
        self.bottle_volume = bottle_volume;
        self.sample_volume = sample_volume;
        self.dilution = dilution;
        self.logger = logger;
        self.heads = heads;

        // The decoded heads point at the throwaway copy; point them here
        let bottle_ref = self.bottle_ref();
        for head in &mut self.heads {
            head.rebind(bottle_ref.clone());
        }
        debug!("Bottle {} now has {} head(s)", self.serial, self.heads.len());
        Ok(())
    }

    pub(crate) fn bind(&mut self, logger: Option<LoggerHandle>) {
        self.logger = logger;
        let bottle_ref = self.bottle_ref();
        for head in &mut self.heads {
            head.rebind(bottle_ref.clone());
        }
    }

    pub(crate) fn push_head(&mut self, head: BottleHead) {
        self.heads.push(head);
    }
}

impl PartialEq for Bottle {
    /// Compares the recorded data only; which data logger (if any) a bottle
    /// came from does not matter.
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.id == other.id
            && self.start == other.start
            && self.finish == other.finish
            && self.interval == other.interval
            && self.measurements == other.measurements
            && self.mode == other.mode
            && self.bottle_volume == other.bottle_volume
            && self.sample_volume == other.sample_volume
            && self.dilution == other.dilution
            && self.heads == other.heads
    }
}
