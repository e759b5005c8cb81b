//! A software OC110 for development and testing without the instrument.
//!
//! The emulated unit runs on its own thread behind a [`DevicePort`]: either
//! the in-memory [`link`] (tests, [`Emulator::virtual_device`]) or a real
//! serial port wired to a host through a null-modem cable.

pub mod device;
pub mod fixtures;
pub mod link;
pub mod port;

pub use device::{CancelToken, DeviceEmulator, Emulator};
pub use fixtures::fixture_bottles;
pub use link::{virtual_pair, VirtualDevicePort, VirtualSerial};
pub use port::{open_device_port, DevicePort};
