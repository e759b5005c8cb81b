//! Command/response engine for the OC110 data logger.

pub mod command;
pub mod logger;
pub mod session;

pub use command::{Command, DeviceError};
pub use logger::{DataLogger, LoggerHandle, EXPECTED_ID};
pub use session::{Session, SessionState, CTS_POLL_INTERVAL};
