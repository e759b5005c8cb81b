use log::{error, info, trace};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::{require_timeout, Transport};
use crate::config::Config;
use crate::utils::error::OxitopError;

/// A [`Transport`] over a physical serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialTransport {
    pub fn open(config: &Config) -> Result<Self, OxitopError> {
        let timeout = require_timeout(config.timeout())?;

        info!("🔌 Connecting to OC110 on port: {}", config.serial_port);
        info!("⚙️  Configuration: {} baud, 8 data bits, no parity, 1 stop bit", config.baud_rate);

        // RTS/CTS are driven by hand during the handshake, so the driver must
        // not take them over.
        let port = serialport::new(&config.serial_port, config.baud_rate)
            .timeout(timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", config.serial_port, e);
                OxitopError::Communication(format!("Failed to open port: {}", e))
            })?;

        info!("✅ Serial connection established");
        Self::from_port(port)
    }

    /// Wraps an already opened port, taking its configured timeout.
    pub fn from_port(port: Box<dyn SerialPort>) -> Result<Self, OxitopError> {
        let timeout = require_timeout(port.timeout())?;
        Ok(Self { port, timeout })
    }
}

impl Transport for SerialTransport {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, OxitopError> {
        let deadline = Instant::now() + self.timeout;
        let mut result = Vec::with_capacity(max_bytes);
        let mut buffer = vec![0u8; max_bytes];

        while result.len() < max_bytes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port.set_timeout(remaining)?;
            match self.port.read(&mut buffer[..max_bytes - result.len()]) {
                Ok(0) => continue,
                Ok(n) => result.extend_from_slice(&buffer[..n]),
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if !result.is_empty() {
            trace!("RX bytes: {}", hex::encode(&result));
        }
        Ok(result)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, OxitopError> {
        trace!("TX bytes: {}", hex::encode(data));
        let mut written = 0;
        while written < data.len() {
            match self.port.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    fn get_cts(&mut self) -> Result<bool, OxitopError> {
        Ok(self.port.read_clear_to_send()?)
    }

    fn set_rts(&mut self, level: bool) -> Result<(), OxitopError> {
        Ok(self.port.write_request_to_send(level)?)
    }

    fn flush(&mut self) -> Result<(), OxitopError> {
        self.port
            .flush()
            .map_err(|e| OxitopError::Communication(format!("Flush failed: {}", e)))
    }
}
