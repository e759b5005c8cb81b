use thiserror::Error;

#[derive(Error, Debug)]
pub enum OxitopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to detect readiness with RTS/CTS handshake")]
    HandshakeFailed,

    #[error("Only wrote first {written} bytes of {expected}")]
    PartialSend { written: usize, expected: usize },

    #[error("Unexpected reply from data logger: {0}")]
    UnexpectedReply(String),

    #[error("Checksum mismatch: calculated {expected}, received {received}")]
    ChecksumMismatch { expected: u64, received: u64 },

    #[error("Failed to read any data before timeout")]
    ReceiveTimeout,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Not bound to a data logger: {0}")]
    NotBound(String),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Lock acquisition failed")]
    Lock,
}

impl OxitopError {
    /// Failures raised while transmitting a command.
    pub fn is_send_error(&self) -> bool {
        matches!(self, OxitopError::HandshakeFailed | OxitopError::PartialSend { .. })
    }

    /// Failures raised while receiving or verifying a response.
    pub fn is_receive_error(&self) -> bool {
        matches!(
            self,
            OxitopError::UnexpectedReply(_)
                | OxitopError::ChecksumMismatch { .. }
                | OxitopError::ReceiveTimeout
        )
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        OxitopError::Decode(msg.into())
    }
}

impl From<std::io::Error> for OxitopError {
    fn from(err: std::io::Error) -> Self {
        OxitopError::Communication(format!("IO error: {}", err))
    }
}

impl From<serialport::Error> for OxitopError {
    fn from(err: serialport::Error) -> Self {
        OxitopError::Communication(format!("Serial port error: {}", err))
    }
}

impl From<std::num::ParseIntError> for OxitopError {
    fn from(err: std::num::ParseIntError) -> Self {
        OxitopError::Decode(format!("Invalid integer: {}", err))
    }
}

impl From<std::num::ParseFloatError> for OxitopError {
    fn from(err: std::num::ParseFloatError) -> Self {
        OxitopError::Decode(format!("Invalid number: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_grouping() {
        assert!(OxitopError::HandshakeFailed.is_send_error());
        assert!(OxitopError::PartialSend { written: 1, expected: 5 }.is_send_error());
        assert!(OxitopError::ReceiveTimeout.is_receive_error());
        assert!(OxitopError::ChecksumMismatch { expected: 1, received: 2 }.is_receive_error());
        assert!(!OxitopError::Decode("bad".into()).is_send_error());
        assert!(!OxitopError::Decode("bad".into()).is_receive_error());
    }

    #[test]
    fn test_partial_send_message() {
        let err = OxitopError::PartialSend { written: 3, expected: 10 };
        assert_eq!(err.to_string(), "Only wrote first 3 bytes of 10");
    }
}
