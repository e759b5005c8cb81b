//! Drives the protocol engine against the emulated unit over a virtual line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oxitopdump::emulator::{fixture_bottles, virtual_pair, Emulator, VirtualSerial};
use oxitopdump::{
    BottleSerial, DataLogger, EmulatorConfig, OxitopError, SessionState, Transport,
};
use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(2);

fn fast_config() -> EmulatorConfig {
    EmulatorConfig {
        baud_rate: 115_200,
        ..EmulatorConfig::default()
    }
}

fn connect() -> (Emulator, DataLogger) {
    let (emulator, host) = Emulator::virtual_device(&fast_config(), TIMEOUT).unwrap();
    let logger = DataLogger::new(Box::new(host)).unwrap();
    (emulator, logger)
}

fn serial(text: &str) -> BottleSerial {
    text.parse().unwrap()
}

#[test]
fn test_connect_identifies_unit() {
    let (_emulator, logger) = connect();
    assert_eq!(logger.id(), "OC110");
    assert_eq!(logger.state().unwrap(), SessionState::Ready);
}

#[test]
fn test_single_bottle_matches_fixture() {
    let (_emulator, logger) = connect();
    let fixture = fixture_bottles().unwrap().remove(1);

    let mut bottle = logger.bottle(&serial("121119-03")).unwrap();
    assert_eq!(bottle, fixture);
    assert!(bottle.is_bound());
    assert_eq!(bottle.id().get(), 3);
    assert_eq!(bottle.interval().num_minutes(), 12);
    assert_eq!(bottle.measurements(), 360);
    assert_eq!(bottle.mode_string(), "Pressure 3d");

    assert_eq!(bottle.heads().len(), 1);
    let head = &mut bottle.heads_mut()[0];
    assert_eq!(head.serial(), "60108");
    assert!(head.cached_readings().is_none());
    let readings = head.readings().unwrap().unwrap();
    assert!(readings.is_empty());
    assert_eq!(readings.marker(), 247);
}

#[test]
fn test_bottle_listing() {
    let (_emulator, mut logger) = connect();
    let bottles = logger.bottles().unwrap();

    let serials: Vec<String> = bottles.iter().map(|b| b.serial().to_string()).collect();
    assert_eq!(serials, vec!["110222-06", "121119-03", "120323-01"]);
    let head_counts: Vec<usize> = bottles.iter().map(|b| b.heads().len()).collect();
    assert_eq!(head_counts, vec![1, 1, 2]);
    assert_eq!(bottles, fixture_bottles().unwrap().as_slice());
    assert_eq!(bottles[2].interval().num_minutes(), 112);
}

#[test]
fn test_head_readings_fetched_lazily() {
    let (_emulator, mut logger) = connect();
    let fixtures = fixture_bottles().unwrap();
    let expected = fixtures[2].head("60145").unwrap().cached_readings().unwrap().clone();

    let bottle = &mut logger.bottles().unwrap()[2];
    let head = bottle.head_mut("60145").unwrap();
    let readings = head.readings().unwrap().unwrap();
    assert_eq!(readings.values(), expected.values());
    assert_eq!(readings.head(), expected.head());

    head.refresh().unwrap();
    assert!(head.cached_readings().is_none());
    assert_eq!(head.readings().unwrap().unwrap().len(), 361);
}

#[test]
fn test_bottle_refresh_in_place() {
    let (_emulator, mut logger) = connect();
    let bottle = &mut logger.bottles().unwrap()[0];
    bottle.heads_mut()[0].readings().unwrap();

    bottle.refresh().unwrap();
    assert_eq!(*bottle, fixture_bottles().unwrap()[0]);
    // Fresh heads start without readings and still point at this bottle
    let head = &bottle.heads()[0];
    assert!(head.cached_readings().is_none());
    assert_eq!(head.bottle().serial(), bottle.serial());
    assert!(head.is_bound());
}

#[test]
fn test_logger_refresh_refetches_list() {
    let (_emulator, mut logger) = connect();
    assert_eq!(logger.bottles().unwrap().len(), 3);
    logger.refresh();
    assert_eq!(logger.bottles().unwrap().len(), 3);
}

#[test]
fn test_unknown_bottle_is_unexpected_reply() {
    let (_emulator, logger) = connect();
    match logger.bottle(&serial("990101-01")) {
        Err(OxitopError::UnexpectedReply(text)) => assert_eq!(text, "INVALID BOTTLE"),
        other => panic!("unexpected result: {:?}", other),
    }
    // The session is still usable afterwards
    assert!(logger.bottle(&serial("110222-06")).is_ok());
}

#[test]
fn test_unbound_entities_cannot_refresh() {
    let mut bottle = fixture_bottles().unwrap().remove(0);
    assert!(matches!(bottle.refresh(), Err(OxitopError::NotBound(_))));
    assert!(matches!(bottle.heads_mut()[0].refresh(), Err(OxitopError::NotBound(_))));
}

#[test]
fn test_dropped_logger_unbinds() {
    let (_emulator, logger) = connect();
    let mut bottle = logger.bottle(&serial("110222-06")).unwrap();
    drop(logger);
    assert!(matches!(bottle.refresh(), Err(OxitopError::NotBound(_))));
    assert!(matches!(bottle.heads_mut()[0].readings(), Err(OxitopError::NotBound(_))));
}

#[test]
fn test_close_and_reconnect() {
    let (_emulator, logger) = connect();
    logger.close().unwrap();
    assert_eq!(logger.state().unwrap(), SessionState::Closed);

    // The next command wakes the unit again
    let bottle = logger.bottle(&serial("120323-01")).unwrap();
    assert_eq!(bottle.heads().len(), 2);
    assert_eq!(logger.state().unwrap(), SessionState::Ready);
}

#[test]
fn test_handshake_timeout_shorter_than_wake_delay() {
    let config = fast_config();
    let (_emulator, host) = Emulator::virtual_device(&config, Duration::from_millis(200)).unwrap();
    assert!(matches!(
        DataLogger::new(Box::new(host)),
        Err(OxitopError::HandshakeFailed)
    ));
}

#[test]
fn test_handshake_timeout_longer_than_wake_delay() {
    let config = fast_config();
    let (_emulator, host) = Emulator::virtual_device(&config, Duration::from_secs(1)).unwrap();
    assert!(DataLogger::new(Box::new(host)).is_ok());
}

/// Corrupts the first byte received after being armed.
struct TamperingTransport {
    inner: VirtualSerial,
    armed: Arc<AtomicBool>,
}

impl Transport for TamperingTransport {
    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, OxitopError> {
        let mut data = self.inner.read(max_bytes)?;
        if let Some(first) = data.first_mut() {
            if self.armed.swap(false, Ordering::SeqCst) {
                *first ^= 0x01;
            }
        }
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, OxitopError> {
        self.inner.write(data)
    }

    fn get_cts(&mut self) -> Result<bool, OxitopError> {
        self.inner.get_cts()
    }

    fn set_rts(&mut self, level: bool) -> Result<(), OxitopError> {
        self.inner.set_rts(level)
    }

    fn flush(&mut self) -> Result<(), OxitopError> {
        self.inner.flush()
    }
}

#[test]
fn test_tampered_payload_fails_checksum() {
    let config = fast_config();
    let (host, device) = virtual_pair(config.baud_rate, TIMEOUT).unwrap();
    let _emulator = Emulator::spawn(device, fixture_bottles().unwrap(), &config).unwrap();

    let armed = Arc::new(AtomicBool::new(false));
    let transport = TamperingTransport {
        inner: host,
        armed: Arc::clone(&armed),
    };
    let logger = DataLogger::new(Box::new(transport)).unwrap();

    armed.store(true, Ordering::SeqCst);
    assert!(matches!(
        logger.bottle(&serial("121119-03")),
        Err(OxitopError::ChecksumMismatch { .. })
    ));
}
