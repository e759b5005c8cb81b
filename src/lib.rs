//! OxiTop OC110 data logger access
//!
//! This library talks the OC110's serial protocol (RTS/CTS wake-up,
//! CR-framed commands, additive checksums), decodes the bottle, head and
//! readings records it sends, and emulates the unit for testing.

pub mod bottles;
pub mod codec;
pub mod config;
pub mod emulator;
pub mod protocol;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use bottles::{Bottle, BottleHead, BottleId, BottleReadings, BottleSerial, Mode};
pub use config::{Config, EmulatorConfig};
pub use emulator::{CancelToken, Emulator};
pub use protocol::{Command, DataLogger, SessionState};
pub use transport::{SerialTransport, Transport};
pub use utils::error::OxitopError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
