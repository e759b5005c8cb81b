use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::OxitopError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,

    // Handshake settings
    pub cts_poll_interval_ms: u64,

    // Emulator settings
    pub emulator: EmulatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub baud_rate: u32,
    pub wake_delay_ms: u64,       // Time the unit takes to raise CTS after RTS
    pub poll_interval_ms: u64,    // Worker loop granularity
    pub boot_banner: bool,        // Send the BIOS banner on first wake
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            wake_delay_ms: 500,
            poll_interval_ms: 10,
            boot_banner: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let serial_port = if cfg!(target_os = "windows") {
            "COM1"
        } else {
            "/dev/ttyUSB0"
        };

        Self {
            serial_port: serial_port.to_string(),
            baud_rate: 9600,
            timeout_ms: 5000,
            cts_poll_interval_ms: 100,
            emulator: EmulatorConfig::default(),
        }
    }
}

impl EmulatorConfig {
    pub fn wake_delay(&self) -> Duration {
        Duration::from_millis(self.wake_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OxitopError> {
        let path = path.as_ref();
        info!("📄 Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| OxitopError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| OxitopError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), OxitopError> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| OxitopError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), OxitopError> {
        if self.timeout_ms == 0 {
            return Err(OxitopError::Config(
                "The port must use blocking I/O with a non-zero timeout".to_string(),
            ));
        }
        if self.baud_rate == 0 || self.emulator.baud_rate == 0 {
            return Err(OxitopError::Config("Baud rate must be non-zero".to_string()));
        }
        if self.cts_poll_interval_ms == 0 || self.emulator.poll_interval_ms == 0 {
            return Err(OxitopError::Config("Poll intervals must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cts_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cts_poll_interval_ms)
    }
}
