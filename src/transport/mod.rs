//! Byte-level access to the OC110 serial line.
//!
//! The protocol engine only ever talks to a [`Transport`]; the real port
//! lives in [`serial`], the emulator supplies a virtual one.

pub mod serial;

use std::time::Duration;

use crate::utils::error::OxitopError;

pub use serial::SerialTransport;

pub trait Transport: Send {
    /// The read timeout this transport was constructed with. Never zero.
    fn timeout(&self) -> Duration;

    /// Blocks until `max_bytes` arrive or the timeout elapses. An empty
    /// result means nothing arrived at all.
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, OxitopError>;

    /// Returns how many bytes were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, OxitopError>;

    fn get_cts(&mut self) -> Result<bool, OxitopError>;

    fn set_rts(&mut self, level: bool) -> Result<(), OxitopError>;

    fn flush(&mut self) -> Result<(), OxitopError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, OxitopError> {
        (**self).read(max_bytes)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, OxitopError> {
        (**self).write(data)
    }

    fn get_cts(&mut self) -> Result<bool, OxitopError> {
        (**self).get_cts()
    }

    fn set_rts(&mut self, level: bool) -> Result<(), OxitopError> {
        (**self).set_rts(level)
    }

    fn flush(&mut self) -> Result<(), OxitopError> {
        (**self).flush()
    }
}

/// Rejects the zero timeout that would turn every read into a busy poll.
pub fn require_timeout(timeout: Duration) -> Result<Duration, OxitopError> {
    if timeout.is_zero() {
        return Err(OxitopError::Config(
            "The port is not set for blocking I/O with a non-zero timeout".to_string(),
        ));
    }
    Ok(timeout)
}
