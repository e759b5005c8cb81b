use std::fmt;

use crate::bottles::BottleSerial;

/// The six commands the OC110 understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// MAnufacturer ID; the unit answers `OC110`.
    Maid,
    /// CLOse Connection.
    Cloc,
    /// Get All Pressure Bottles.
    Gapb,
    /// Get PRessure Bottle.
    Gprb { bottle: BottleSerial },
    /// Purpose unknown. The vendor software always sends it between GPRB and
    /// GMSK, so we do too.
    Gsns { bottle: BottleSerial },
    /// All readings of one head.
    Gmsk { bottle: BottleSerial, head: String },
}

/// Error lines the unit sends instead of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    InvalidArgs,
    InvalidBottle,
    InvalidHead,
    InvalidCommand,
}

impl DeviceError {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceError::InvalidArgs => "INVALID ARGS",
            DeviceError::InvalidBottle => "INVALID BOTTLE",
            DeviceError::InvalidHead => "INVALID HEAD",
            DeviceError::InvalidCommand => "INVALID COMMAND",
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Maid => "MAID",
            Command::Cloc => "CLOC",
            Command::Gapb => "GAPB",
            Command::Gprb { .. } => "GPRB",
            Command::Gsns { .. } => "GSNS",
            Command::Gmsk { .. } => "GMSK",
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            Command::Maid | Command::Cloc | Command::Gapb => Vec::new(),
            Command::Gprb { bottle } | Command::Gsns { bottle } => vec![bottle.wire()],
            Command::Gmsk { bottle, head } => vec![bottle.wire(), head.clone()],
        }
    }

    /// Whether the response ends with a checksum line.
    pub fn checksummed(&self) -> bool {
        match self {
            Command::Maid | Command::Gsns { .. } => false,
            Command::Cloc | Command::Gapb | Command::Gprb { .. } | Command::Gmsk { .. } => true,
        }
    }

    /// `NAME[,arg]*\r`, ready for the wire.
    pub fn frame(&self) -> String {
        let mut parts = vec![self.name().to_string()];
        parts.extend(self.args());
        format!("{}\r", parts.join(","))
    }

    /// Parses a received command line (without terminator) the way the
    /// unit does, yielding the error line it would answer with on failure.
    pub fn parse(line: &str) -> Result<Self, DeviceError> {
        let mut parts = line.split(',');
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let bottle = |arg: &str| -> Result<BottleSerial, DeviceError> {
            arg.parse().map_err(|_| DeviceError::InvalidBottle)
        };

        match (name, args.as_slice()) {
            ("MAID", _) => Ok(Command::Maid),
            ("CLOC", _) => Ok(Command::Cloc),
            ("GAPB", _) => Ok(Command::Gapb),
            ("GPRB", [serial]) => Ok(Command::Gprb { bottle: bottle(*serial)? }),
            ("GSNS", [serial]) => Ok(Command::Gsns { bottle: bottle(*serial)? }),
            ("GMSK", [serial, head]) => Ok(Command::Gmsk {
                bottle: bottle(*serial)?,
                head: head.to_string(),
            }),
            ("GPRB", _) | ("GSNS", _) | ("GMSK", _) => Err(DeviceError::InvalidArgs),
            _ => Err(DeviceError::InvalidCommand),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.frame().trim_end_matches('\r'))
    }
}
