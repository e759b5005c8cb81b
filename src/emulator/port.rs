use log::{error, info, trace};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

use crate::config::EmulatorConfig;
use crate::utils::error::OxitopError;

/// Device side of a serial line, as seen by the emulated unit.
pub trait DevicePort: Send {
    /// Whatever the host has sent so far. Never blocks.
    fn receive(&mut self) -> Result<Vec<u8>, OxitopError>;

    fn transmit(&mut self, data: &[u8]) -> Result<(), OxitopError>;

    /// The host's RTS line.
    fn request_to_send(&mut self) -> Result<bool, OxitopError>;

    /// Drives the host's CTS line.
    fn set_clear_to_send(&mut self, level: bool) -> Result<(), OxitopError>;
}

// Through a null-modem cable the host's RTS arrives on our CTS pin and our
// RTS pin drives the host's CTS.
impl DevicePort for Box<dyn SerialPort> {
    fn receive(&mut self) -> Result<Vec<u8>, OxitopError> {
        let available = self.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; available];
        let n = self.read(&mut buffer)?;
        buffer.truncate(n);
        trace!("device RX: {}", hex::encode(&buffer));
        Ok(buffer)
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), OxitopError> {
        trace!("device TX: {}", hex::encode(data));
        self.write_all(data)?;
        self.flush()?;
        Ok(())
    }

    fn request_to_send(&mut self) -> Result<bool, OxitopError> {
        Ok(self.read_clear_to_send()?)
    }

    fn set_clear_to_send(&mut self, level: bool) -> Result<(), OxitopError> {
        Ok(self.write_request_to_send(level)?)
    }
}

/// Opens `path` as the device end of a null-modem link.
pub fn open_device_port(path: &str, config: &EmulatorConfig) -> Result<Box<dyn SerialPort>, OxitopError> {
    info!("🔌 Serving emulated OC110 on port: {} ({} baud)", path, config.baud_rate);
    let mut port = serialport::new(path, config.baud_rate)
        .timeout(Duration::from_millis(100))
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|e| {
            error!("❌ Failed to open serial port {}: {}", path, e);
            OxitopError::Communication(format!("Failed to open port: {}", e))
        })?;
    // Asleep until the host asks for it
    port.write_request_to_send(false)?;
    Ok(port)
}
