use log::{debug, info};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use super::command::Command;
use super::session::{Session, SessionState, CTS_POLL_INTERVAL};
use crate::bottles::{Bottle, BottleSerial};
use crate::codec;
use crate::config::Config;
use crate::transport::{SerialTransport, Transport};
use crate::utils::error::OxitopError;

/// Unit identifier MAID must return.
pub const EXPECTED_ID: &str = "OC110";

/// Non-owning link from a bottle back to the data logger it was read from.
/// Dropping the [`DataLogger`] leaves every handle dangling, after which
/// calls through it fail with [`OxitopError::NotBound`].
#[derive(Clone)]
pub struct LoggerHandle {
    session: Weak<Mutex<Session>>,
}

impl LoggerHandle {
    pub fn is_alive(&self) -> bool {
        self.session.strong_count() > 0
    }

    pub(crate) fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, OxitopError>,
    ) -> Result<T, OxitopError> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| OxitopError::NotBound("Data logger has been dropped".to_string()))?;
        let mut session = session.lock().map_err(|_| OxitopError::Lock)?;
        f(&mut session)
    }
}

impl fmt::Debug for LoggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A connected OC110. Owns the session; bottles hold [`LoggerHandle`]s
/// back to it.
pub struct DataLogger {
    session: Arc<Mutex<Session>>,
    id: String,
    bottles: Option<Vec<Bottle>>,  // GAPB result, fetched on first use
}

impl DataLogger {
    /// Connects over `transport` and checks the unit identifies as an OC110.
    pub fn new(transport: Box<dyn Transport>) -> Result<Self, OxitopError> {
        Self::with_poll_interval(transport, CTS_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        transport: Box<dyn Transport>,
        poll_interval: Duration,
    ) -> Result<Self, OxitopError> {
        let mut session = Session::new(transport, poll_interval)?;
        let response = session.execute(&Command::Maid)?;
        let id = response.trim_end_matches('\r').to_string();
        if id != EXPECTED_ID {
            return Err(OxitopError::UnexpectedReply(format!(
                "Expected {} but got {:?}",
                EXPECTED_ID, id
            )));
        }
        info!("✅ Connected to data logger {}", id);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            id,
            bottles: None,
        })
    }

    /// Opens the serial port named in `config` and connects.
    pub fn open(config: &Config) -> Result<Self, OxitopError> {
        let transport = SerialTransport::open(config)?;
        Self::with_poll_interval(Box::new(transport), config.cts_poll_interval())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> LoggerHandle {
        LoggerHandle {
            session: Arc::downgrade(&self.session),
        }
    }

    pub fn state(&self) -> Result<SessionState, OxitopError> {
        let session = self.session.lock().map_err(|_| OxitopError::Lock)?;
        Ok(session.state())
    }

    /// Every bottle stored on the unit. Fetched with GAPB on first call and
    /// cached until [`refresh`](Self::refresh).
    pub fn bottles(&mut self) -> Result<&mut [Bottle], OxitopError> {
        let bottles = match self.bottles.take() {
            Some(bottles) => bottles,
            None => {
                debug!("Fetching bottle list");
                let data = self.execute(&Command::Gapb)?;
                let bottles = codec::decode_bottle_list(&data, Some(self.handle()))?;
                info!("📦 Data logger holds {} bottle(s)", bottles.len());
                bottles
            }
        };
        Ok(self.bottles.insert(bottles).as_mut_slice())
    }

    /// Reads a single bottle with GPRB, bypassing the cached list.
    pub fn bottle(&self, serial: &BottleSerial) -> Result<Bottle, OxitopError> {
        let data = self.execute(&Command::Gprb { bottle: *serial })?;
        codec::decode_bottle(&data, Some(self.handle()))
    }

    /// Drops the cached bottle list so the next call fetches it again.
    pub fn refresh(&mut self) {
        self.bottles = None;
    }

    /// Ends the session. A later command wakes the unit again.
    pub fn close(&self) -> Result<(), OxitopError> {
        let mut session = self.session.lock().map_err(|_| OxitopError::Lock)?;
        session.close()
    }

    fn execute(&self, command: &Command) -> Result<String, OxitopError> {
        let mut session = self.session.lock().map_err(|_| OxitopError::Lock)?;
        session.execute(command)
    }
}

impl fmt::Debug for DataLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLogger")
            .field("id", &self.id)
            .field("cached_bottles", &self.bottles.as_ref().map(Vec::len))
            .finish()
    }
}
