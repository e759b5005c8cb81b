//! Bottles, their heads and the heads' readings.

pub mod bottle;
pub mod head;
pub mod readings;
pub mod serial;

pub use bottle::{Bottle, BottleRef};
pub use head::{BottleHead, HeadRef};
pub use readings::{BottleReadings, DEFAULT_MARKER};
pub use serial::{BottleId, BottleSerial, Mode};
