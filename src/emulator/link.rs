//! In-memory serial line between a host [`Transport`] and an emulated unit.
//!
//! Each direction is a queue of bytes stamped with the instant they finish
//! arriving, so a write of `n` bytes becomes visible over `n * 10 / baud`
//! seconds just as it would on a real 8-N-1 line.

use log::trace;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::port::DevicePort;
use crate::transport::{require_timeout, Transport};
use crate::utils::error::OxitopError;

/// Start bit, eight data bits, stop bit.
const BITS_PER_CHAR: u64 = 10;

pub(crate) fn char_time(baud_rate: u32) -> Duration {
    Duration::from_nanos(BITS_PER_CHAR * 1_000_000_000 / u64::from(baud_rate.max(1)))
}

#[derive(Default)]
struct QueueState {
    bytes: VecDeque<(u8, Instant)>,
    last_arrival: Option<Instant>,
}

/// One direction of the line. Safe for one producer and one consumer.
pub(crate) struct TimedQueue {
    state: Mutex<QueueState>,
    arrived: Condvar,
    char_time: Duration,
}

impl TimedQueue {
    pub(crate) fn new(char_time: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            arrived: Condvar::new(),
            char_time,
        }
    }

    /// Queues `data` behind anything still in flight.
    pub(crate) fn push(&self, data: &[u8]) -> Result<(), OxitopError> {
        let mut state = self.state.lock().map_err(|_| OxitopError::Lock)?;
        let now = Instant::now();
        let mut at = state.last_arrival.filter(|last| *last > now).unwrap_or(now);
        for &byte in data {
            at += self.char_time;
            state.bytes.push_back((byte, at));
        }
        state.last_arrival = Some(at);
        self.arrived.notify_all();
        Ok(())
    }

    /// Takes up to `max_bytes` that have arrived, waiting until `deadline`
    /// for the rest. Returns whatever arrived by then.
    pub(crate) fn pop(&self, max_bytes: usize, deadline: Instant) -> Result<Vec<u8>, OxitopError> {
        let mut out = Vec::new();
        let mut state = self.state.lock().map_err(|_| OxitopError::Lock)?;
        loop {
            let now = Instant::now();
            while out.len() < max_bytes {
                match state.bytes.front() {
                    Some(&(byte, at)) if at <= now => {
                        out.push(byte);
                        state.bytes.pop_front();
                    }
                    _ => break,
                }
            }
            if out.len() >= max_bytes || now >= deadline {
                return Ok(out);
            }

            let wake = match state.bytes.front() {
                Some(&(_, at)) => at.min(deadline),
                None => deadline,
            };
            let (guard, _) = self
                .arrived
                .wait_timeout(state, wake.saturating_duration_since(now))
                .map_err(|_| OxitopError::Lock)?;
            state = guard;
        }
    }

    /// Everything that has arrived so far, without waiting.
    pub(crate) fn pop_ready(&self) -> Result<Vec<u8>, OxitopError> {
        self.pop(usize::MAX, Instant::now())
    }

    /// When the last queued byte finishes arriving.
    pub(crate) fn drained_at(&self) -> Result<Option<Instant>, OxitopError> {
        let state = self.state.lock().map_err(|_| OxitopError::Lock)?;
        Ok(state.bytes.back().map(|&(_, at)| at))
    }
}

struct Link {
    to_host: TimedQueue,
    to_device: TimedQueue,
    rts: AtomicBool,  // driven by the host
    cts: AtomicBool,  // driven by the device
}

/// Host end of a virtual line.
pub struct VirtualSerial {
    link: Arc<Link>,
    timeout: Duration,
}

/// Device end of a virtual line.
pub struct VirtualDevicePort {
    link: Arc<Link>,
}

/// Creates both ends of a virtual line running at `baud_rate`. The host end
/// blocks on reads for at most `timeout`, which must be non-zero.
pub fn virtual_pair(
    baud_rate: u32,
    timeout: Duration,
) -> Result<(VirtualSerial, VirtualDevicePort), OxitopError> {
    let timeout = require_timeout(timeout)?;
    if baud_rate == 0 {
        return Err(OxitopError::Config("Baud rate must be non-zero".to_string()));
    }
    let char_time = char_time(baud_rate);
    let link = Arc::new(Link {
        to_host: TimedQueue::new(char_time),
        to_device: TimedQueue::new(char_time),
        rts: AtomicBool::new(false),
        cts: AtomicBool::new(false),
    });
    Ok((
        VirtualSerial {
            link: Arc::clone(&link),
            timeout,
        },
        VirtualDevicePort { link },
    ))
}

impl Transport for VirtualSerial {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, OxitopError> {
        self.link.to_host.pop(max_bytes, Instant::now() + self.timeout)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, OxitopError> {
        trace!("virtual TX: {}", hex::encode(data));
        self.link.to_device.push(data)?;
        Ok(data.len())
    }

    fn get_cts(&mut self) -> Result<bool, OxitopError> {
        Ok(self.link.cts.load(Ordering::SeqCst))
    }

    fn set_rts(&mut self, level: bool) -> Result<(), OxitopError> {
        self.link.rts.store(level, Ordering::SeqCst);
        Ok(())
    }

    /// Blocks until everything written has reached the device.
    fn flush(&mut self) -> Result<(), OxitopError> {
        if let Some(at) = self.link.to_device.drained_at()? {
            let wait = at.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        Ok(())
    }
}

impl DevicePort for VirtualDevicePort {
    fn receive(&mut self) -> Result<Vec<u8>, OxitopError> {
        self.link.to_device.pop_ready()
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), OxitopError> {
        self.link.to_host.push(data)
    }

    fn request_to_send(&mut self) -> Result<bool, OxitopError> {
        Ok(self.link.rts.load(Ordering::SeqCst))
    }

    fn set_clear_to_send(&mut self, level: bool) -> Result<(), OxitopError> {
        self.link.cts.store(level, Ordering::SeqCst);
        Ok(())
    }
}
