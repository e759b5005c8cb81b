use log::{debug, info, trace, warn};
use std::thread;
use std::time::{Duration, Instant};

use super::command::Command;
use crate::bottles::BottleSerial;
use crate::codec::{additive_checksum, parse_checksum_line};
use crate::transport::{require_timeout, Transport};
use crate::utils::error::OxitopError;

/// Interval between CTS checks while waiting for the unit to wake.
pub const CTS_POLL_INTERVAL: Duration = Duration::from_millis(100);

const PROMPT: &[u8] = b">\r";
const LOGON: &str = "LOGON\r";
const INVALID_COMMAND: &str = "INVALID COMMAND\r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing exchanged yet.
    Disconnected,
    /// RTS raised, waiting for the unit to raise CTS.
    AwaitingCts,
    /// Line is up but no prompt has been seen.
    AwaitingPrompt,
    Ready,
    /// CLOC sent. The next command starts a new handshake.
    Closed,
}

/// Wire-level state of a conversation with one unit: handshake, framing and
/// checksums. One command is in flight at a time.
pub struct Session {
    transport: Box<dyn Transport>,
    poll_interval: Duration,
    seen_prompt: bool,
    state: SessionState,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>, poll_interval: Duration) -> Result<Self, OxitopError> {
        require_timeout(transport.timeout())?;
        if poll_interval.is_zero() {
            return Err(OxitopError::Config("CTS poll interval must be non-zero".to_string()));
        }
        Ok(Self {
            transport,
            poll_interval,
            seen_prompt: false,
            state: SessionState::Disconnected,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends `command` and returns its payload, checksum-verified where the
    /// command has one.
    pub fn execute(&mut self, command: &Command) -> Result<String, OxitopError> {
        self.send(command)?;
        self.receive(command.checksummed())
    }

    /// CLOC, then drop RTS so the unit goes back to sleep.
    pub fn close(&mut self) -> Result<(), OxitopError> {
        self.execute(&Command::Cloc)?;
        self.transport.set_rts(false)?;
        self.seen_prompt = false;
        self.state = SessionState::Closed;
        info!("👋 Connection to data logger closed");
        Ok(())
    }

    /// GSNS then GMSK, as the vendor software does, returning the readings
    /// block.
    pub fn fetch_readings(&mut self, bottle: &BottleSerial, head: &str) -> Result<String, OxitopError> {
        self.execute(&Command::Gsns { bottle: *bottle })?;
        self.execute(&Command::Gmsk {
            bottle: *bottle,
            head: head.to_string(),
        })
    }

    /// Brings the line up if needed: RTS/CTS wake-up, then a bare CR if no
    /// prompt has been seen yet.
    fn handshake(&mut self) -> Result<(), OxitopError> {
        let mut check_response = false;
        let mut response = String::new();

        if !self.transport.get_cts()? {
            self.state = SessionState::AwaitingCts;
            let deadline = Instant::now() + self.transport.timeout();
            debug!("Raising RTS and waiting for CTS");
            self.transport.set_rts(true)?;
            while !self.transport.get_cts()? {
                thread::sleep(self.poll_interval);
                if Instant::now() > deadline {
                    warn!("⏰ No CTS from data logger before timeout");
                    return Err(OxitopError::HandshakeFailed);
                }
            }
            // A freshly woken unit sends its boot banner; only the last line
            // matters
            self.state = SessionState::AwaitingPrompt;
            check_response = true;
            response.push_str(&self.receive(false)?);
        }

        if !self.seen_prompt {
            self.state = SessionState::AwaitingPrompt;
            self.write_all(b"\r")?;
            check_response = true;
            response.push_str(&self.receive(false)?);
        }

        if check_response && !(response.ends_with(LOGON) || response.ends_with(INVALID_COMMAND)) {
            return Err(OxitopError::UnexpectedReply(format!(
                "Expected LOGON or INVALID COMMAND, but got {:?}",
                response
            )));
        }
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), OxitopError> {
        self.handshake()?;
        debug!("📤 TX: {}", command);
        self.write_all(command.frame().as_bytes())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), OxitopError> {
        let written = self.transport.write(data)?;
        if written != data.len() {
            return Err(OxitopError::PartialSend {
                written,
                expected: data.len(),
            });
        }
        self.transport.flush()
    }

    /// Reads up to and including the prompt, strips it, and verifies the
    /// checksum line when `checksum` is set. Returns the remaining lines,
    /// each with its terminator.
    fn receive(&mut self, checksum: bool) -> Result<String, OxitopError> {
        let mut response: Vec<u8> = Vec::new();
        let mut line_start = 0;

        // One byte at a time so nothing past the prompt is consumed
        while !response.ends_with(PROMPT) {
            let data = self.transport.read(1)?;
            match data.as_slice() {
                [] => return Err(OxitopError::ReceiveTimeout),
                // LFs only show up in the boot banner and would break line
                // splitting
                [b'\n'] => continue,
                [b'\r'] => {
                    debug!("📥 RX: {}", String::from_utf8_lossy(&response[line_start..]));
                    response.push(b'\r');
                    line_start = response.len();
                }
                _ => response.extend_from_slice(&data),
            }
        }
        self.seen_prompt = true;
        self.state = SessionState::Ready;
        trace!("RX frame: {}", hex::encode(&response));

        let text = String::from_utf8(response)
            .ok()
            .filter(|text| text.is_ascii())
            .ok_or_else(|| OxitopError::UnexpectedReply("Response is not ASCII".to_string()))?;

        let mut lines: Vec<&str> = text.split('\r').collect();
        // Drop the prompt and the empty piece after it
        lines.truncate(lines.len().saturating_sub(2));

        if checksum {
            let received_line = lines.pop().ok_or_else(|| {
                OxitopError::UnexpectedReply("Response is missing its checksum".to_string())
            })?;
            let received = parse_checksum_line(received_line)?;
            let expected: u64 = lines
                .iter()
                .map(|line| additive_checksum(line.as_bytes()) + b'\r' as u64)
                .sum();
            if received != expected {
                return Err(OxitopError::ChecksumMismatch { expected, received });
            }
        }

        Ok(lines.iter().map(|line| format!("{}\r", line)).collect())
    }
}
