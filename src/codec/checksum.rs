use crate::utils::error::OxitopError;

/// Sum of the byte values; the OC110's only integrity check.
pub fn additive_checksum(data: &[u8]) -> u64 {
    data.iter().map(|&b| b as u64).sum()
}

/// The `,<sum>\r` line the unit appends after a checksummed payload.
pub fn checksum_line(payload: &[u8]) -> String {
    format!(",{}\r", additive_checksum(payload))
}

/// Parses a received checksum line (without its terminator).
pub fn parse_checksum_line(line: &str) -> Result<u64, OxitopError> {
    let digits = line.strip_prefix(',').ok_or_else(|| {
        if line.starts_with("INVALID") {
            OxitopError::UnexpectedReply(line.to_string())
        } else {
            OxitopError::UnexpectedReply(format!("Checksum is missing leading comma: {:?}", line))
        }
    })?;
    digits
        .parse()
        .map_err(|_| OxitopError::UnexpectedReply(format!("Malformed checksum: {:?}", line)))
}
