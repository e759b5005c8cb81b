use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::fixtures::fixture_bottles;
use super::link::{virtual_pair, VirtualSerial};
use super::port::DevicePort;
use crate::bottles::{Bottle, BottleReadings, BottleSerial};
use crate::codec;
use crate::config::EmulatorConfig;
use crate::protocol::{Command, DeviceError, EXPECTED_ID};
use crate::utils::error::OxitopError;

const PROMPT: &[u8] = b">\r";
const LOGON: &[u8] = b"LOGON\r";
const BIOS_BANNER: &[u8] = b"\0\r\nBIOS OC Version 1.0\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Power {
    Asleep,
    Waking { at: Instant },
    Awake,
    /// After CLOC: CTS is down until the unit comes back up.
    Rebooting { at: Instant },
}

/// The emulated OC110 itself: line state, command dispatch and catalog.
/// Driven by [`poll`](Self::poll); [`Emulator`] runs it on a thread.
pub struct DeviceEmulator<P: DevicePort> {
    port: P,
    bottles: Vec<Bottle>,
    config: EmulatorConfig,
    power: Power,
    booted: bool,
    input: Vec<u8>,
}

impl<P: DevicePort> DeviceEmulator<P> {
    pub fn new(port: P, bottles: Vec<Bottle>, config: EmulatorConfig) -> Self {
        Self {
            port,
            bottles,
            config,
            power: Power::Asleep,
            booted: false,
            input: Vec::new(),
        }
    }

    pub fn bottles(&self) -> &[Bottle] {
        &self.bottles
    }

    pub fn is_awake(&self) -> bool {
        self.power == Power::Awake
    }

    /// Advances the unit to `now`: follows the host's RTS line and answers
    /// any complete commands received.
    pub fn poll(&mut self, now: Instant) -> Result<(), OxitopError> {
        let rts = self.port.request_to_send()?;
        match self.power {
            Power::Asleep => {
                if rts {
                    debug!("Host raised RTS, waking up");
                    self.power = Power::Waking {
                        at: now + self.config.wake_delay(),
                    };
                }
                // Nothing is read while asleep
                self.port.receive()?;
            }
            Power::Waking { at } => {
                if !rts {
                    self.power = Power::Asleep;
                } else if now >= at {
                    self.wake()?;
                }
            }
            Power::Rebooting { at } => {
                if now >= at {
                    if rts {
                        self.port.set_clear_to_send(true)?;
                        self.port.transmit(b"\0")?;
                        self.transmit_prompted(LOGON)?;
                        self.power = Power::Awake;
                    } else {
                        debug!("Reboot finished with RTS low, going to sleep");
                        self.power = Power::Asleep;
                    }
                }
                self.port.receive()?;
            }
            Power::Awake => {
                if !rts {
                    debug!("Host dropped RTS, going to sleep");
                    self.port.set_clear_to_send(false)?;
                    self.power = Power::Asleep;
                    self.input.clear();
                    return Ok(());
                }
                let data = self.port.receive()?;
                self.input.extend(data.into_iter().filter(|&b| b != b'\n'));
                while let Some(end) = self.input.iter().position(|&b| b == b'\r') {
                    let line: Vec<u8> = self.input.drain(..=end).collect();
                    let line = String::from_utf8_lossy(&line[..end]).into_owned();
                    self.process(&line, now)?;
                    if self.power != Power::Awake {
                        self.input.clear();
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn wake(&mut self) -> Result<(), OxitopError> {
        self.port.set_clear_to_send(true)?;
        if !self.booted && self.config.boot_banner {
            self.port.transmit(BIOS_BANNER)?;
        }
        self.booted = true;
        self.transmit_prompted(LOGON)?;
        self.power = Power::Awake;
        info!("🟢 Emulated OC110 awake");
        Ok(())
    }

    fn process(&mut self, line: &str, now: Instant) -> Result<(), OxitopError> {
        debug!("📥 Device RX: {}", line);
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("⚠️ Rejected command {:?}: {}", line, e);
                return self.reply_error(e);
            }
        };

        match command {
            Command::Maid => self.transmit_prompted(format!("{}\r", EXPECTED_ID).as_bytes()),
            Command::Cloc => {
                self.transmit_checksummed("")?;
                self.port.set_clear_to_send(false)?;
                self.power = Power::Rebooting {
                    at: now + self.config.wake_delay(),
                };
                info!("🔴 Connection closed by host");
                Ok(())
            }
            Command::Gapb => {
                let mut payload = String::new();
                for bottle in &self.bottles {
                    payload.push_str(&codec::encode_bottle(bottle)?);
                }
                self.transmit_checksummed(&payload)
            }
            Command::Gprb { bottle } => match self.find_bottle(&bottle) {
                Some(found) => {
                    let payload = codec::encode_bottle(found)?;
                    self.transmit_checksummed(&payload)
                }
                None => self.reply_error(DeviceError::InvalidBottle),
            },
            Command::Gsns { bottle } => match self.find_bottle(&bottle) {
                Some(_) => self.port.transmit(PROMPT),
                None => self.reply_error(DeviceError::InvalidBottle),
            },
            Command::Gmsk { bottle, head } => {
                let payload = match self.find_bottle(&bottle) {
                    None => Err(DeviceError::InvalidBottle),
                    Some(found) => match found.head(&head) {
                        None => Err(DeviceError::InvalidHead),
                        Some(found_head) => Ok(match found_head.cached_readings() {
                            Some(readings) => codec::encode_readings(readings),
                            None => codec::encode_readings(&BottleReadings::new(
                                found_head.head_ref(),
                                Vec::new(),
                            )),
                        }),
                    },
                };
                match payload {
                    Ok(payload) => self.transmit_checksummed(&payload),
                    Err(e) => self.reply_error(e),
                }
            }
        }
    }

    fn find_bottle(&self, serial: &BottleSerial) -> Option<&Bottle> {
        self.bottles.iter().find(|bottle| bottle.serial() == *serial)
    }

    fn reply_error(&mut self, error: DeviceError) -> Result<(), OxitopError> {
        self.transmit_prompted(format!("{}\r", error).as_bytes())
    }

    fn transmit_prompted(&mut self, payload: &[u8]) -> Result<(), OxitopError> {
        self.port.transmit(payload)?;
        self.port.transmit(PROMPT)
    }

    fn transmit_checksummed(&mut self, payload: &str) -> Result<(), OxitopError> {
        self.port.transmit(payload.as_bytes())?;
        self.port.transmit(codec::checksum_line(payload.as_bytes()).as_bytes())?;
        self.port.transmit(PROMPT)
    }
}

/// Cooperative stop flag shared with the emulator thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A [`DeviceEmulator`] running on its own thread until cancelled.
pub struct Emulator {
    cancel: CancelToken,
    worker: Option<JoinHandle<Result<(), OxitopError>>>,
}

impl Emulator {
    pub fn spawn<P: DevicePort + 'static>(
        port: P,
        bottles: Vec<Bottle>,
        config: &EmulatorConfig,
    ) -> Result<Self, OxitopError> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let poll_interval = config.poll_interval();
        let mut device = DeviceEmulator::new(port, bottles, config.clone());

        info!("🚀 Starting OC110 emulator with {} bottle(s)", device.bottles().len());
        let worker = thread::Builder::new()
            .name("oc110-emulator".to_string())
            .spawn(move || {
                while !token.is_cancelled() {
                    if let Err(e) = device.poll(Instant::now()) {
                        error!("❌ Emulator stopped: {}", e);
                        return Err(e);
                    }
                    thread::sleep(poll_interval);
                }
                info!("🛑 OC110 emulator stopped");
                Ok(())
            })?;

        Ok(Self {
            cancel,
            worker: Some(worker),
        })
    }

    /// An emulated unit holding the fixture catalog, plus the host end of
    /// the virtual line to it.
    pub fn virtual_device(
        config: &EmulatorConfig,
        timeout: Duration,
    ) -> Result<(Self, VirtualSerial), OxitopError> {
        let (host, device) = virtual_pair(config.baud_rate, timeout)?;
        let emulator = Self::spawn(device, fixture_bottles()?, config)?;
        Ok((emulator, host))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |worker| !worker.is_finished())
    }

    /// Cancels the worker and waits for it, returning the error that
    /// stopped it early, if any.
    pub fn stop(mut self) -> Result<(), OxitopError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), OxitopError> {
        self.cancel.cancel();
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| OxitopError::Communication("Emulator thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            warn!("⚠️ Emulator ended with error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A port that records what the unit sends.
    #[derive(Default)]
    struct ScriptedPort {
        rts: bool,
        cts: bool,
        inbound: Vec<u8>,
        outbound: Vec<u8>,
    }

    impl DevicePort for ScriptedPort {
        fn receive(&mut self) -> Result<Vec<u8>, OxitopError> {
            Ok(std::mem::take(&mut self.inbound))
        }

        fn transmit(&mut self, data: &[u8]) -> Result<(), OxitopError> {
            self.outbound.extend_from_slice(data);
            Ok(())
        }

        fn request_to_send(&mut self) -> Result<bool, OxitopError> {
            Ok(self.rts)
        }

        fn set_clear_to_send(&mut self, level: bool) -> Result<(), OxitopError> {
            self.cts = level;
            Ok(())
        }
    }

    fn awake_device() -> (DeviceEmulator<ScriptedPort>, Instant) {
        let config = EmulatorConfig {
            boot_banner: false,
            ..EmulatorConfig::default()
        };
        let mut device = DeviceEmulator::new(ScriptedPort::default(), fixture_bottles().unwrap(), config);
        let start = Instant::now();
        device.port.rts = true;
        device.poll(start).unwrap();
        device.poll(start + Duration::from_millis(600)).unwrap();
        assert!(device.is_awake());
        device.port.outbound.clear();
        (device, start + Duration::from_millis(600))
    }

    fn exchange(device: &mut DeviceEmulator<ScriptedPort>, now: Instant, command: &str) -> String {
        device.port.inbound.extend_from_slice(command.as_bytes());
        device.poll(now).unwrap();
        String::from_utf8(std::mem::take(&mut device.port.outbound)).unwrap()
    }

    #[test]
    fn test_wake_sequence() {
        let mut device = DeviceEmulator::new(
            ScriptedPort::default(),
            Vec::new(),
            EmulatorConfig::default(),
        );
        let start = Instant::now();
        device.poll(start).unwrap();
        assert!(!device.port.cts);

        device.port.rts = true;
        device.poll(start).unwrap();
        device.poll(start + Duration::from_millis(400)).unwrap();
        assert!(!device.port.cts, "CTS raised before the wake delay");

        device.poll(start + Duration::from_millis(500)).unwrap();
        assert!(device.port.cts);
        assert_eq!(device.port.outbound, b"\0\r\nBIOS OC Version 1.0\r\nLOGON\r>\r".to_vec());
    }

    #[test]
    fn test_maid_and_invalid_command() {
        let (mut device, now) = awake_device();
        assert_eq!(exchange(&mut device, now, "MAID\r"), "OC110\r>\r");
        assert_eq!(exchange(&mut device, now, "\r"), "INVALID COMMAND\r>\r");
        assert_eq!(exchange(&mut device, now, "XYZZY\r"), "INVALID COMMAND\r>\r");
    }

    #[test]
    fn test_lookup_errors() {
        let (mut device, now) = awake_device();
        assert_eq!(exchange(&mut device, now, "GPRB\r"), "INVALID ARGS\r>\r");
        assert_eq!(exchange(&mut device, now, "GPRB,99010101\r"), "INVALID BOTTLE\r>\r");
        assert_eq!(exchange(&mut device, now, "GSNS,12111903\r"), ">\r");
        assert_eq!(exchange(&mut device, now, "GMSK,12111903,1\r"), "INVALID HEAD\r>\r");
        assert_eq!(exchange(&mut device, now, "GMSK,99010101,60108\r"), "INVALID BOTTLE\r>\r");
    }

    #[test]
    fn test_gprb_is_checksummed() {
        let (mut device, now) = awake_device();
        let response = exchange(&mut device, now, "GPRB,12111903\r");
        let payload = "0,0,3,3,12111903,121119135304,121122135304,2,5,240,40,360,4320,510,432.0,0,6,2,1,12\r,60108,150,\r";
        let expected = format!("{}{}>\r", payload, codec::checksum_line(payload.as_bytes()));
        assert_eq!(response, expected);
    }

    #[test]
    fn test_gmsk_empty_readings() {
        let (mut device, now) = awake_device();
        let response = exchange(&mut device, now, "GMSK,12111903,60108\r");
        assert!(response.starts_with("000060108,12111903,1,1,247,121119135304,0\r,"));
        assert!(response.ends_with(">\r"));
    }

    #[test]
    fn test_cloc_reboot_banner_needs_rts() {
        let (mut device, now) = awake_device();
        assert_eq!(exchange(&mut device, now, "CLOC\r"), ",0\r>\r");
        assert!(!device.port.cts);

        // Host keeps RTS up: the unit comes back on its own
        device.poll(now + Duration::from_millis(500)).unwrap();
        assert!(device.port.cts);
        assert_eq!(device.port.outbound, b"\0LOGON\r>\r".to_vec());

        // Host drops RTS straight after CLOC: the banner is lost
        device.port.outbound.clear();
        exchange(&mut device, now, "CLOC\r");
        device.port.rts = false;
        device.poll(now + Duration::from_millis(500)).unwrap();
        assert!(!device.port.cts);
        assert!(device.port.outbound.is_empty());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }

    #[test]
    fn test_emulator_stops_on_cancel() {
        let config = EmulatorConfig::default();
        let (emulator, _host) = Emulator::virtual_device(&config, Duration::from_millis(100)).unwrap();
        assert!(emulator.is_running());
        emulator.stop().unwrap();
    }
}
