//! Core types shared by the host and engine sides.

use std::collections::BTreeSet;
use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum key length accepted by the store callbacks.
pub const MAX_KEY_LEN: usize = 64 * 1024;

/// Maximum value length accepted by the store callbacks.
pub const MAX_VALUE_LEN: usize = 128 * 1024;

/// A key/value pair yielded by a range iterator.
pub type Record = (Vec<u8>, Vec<u8>);

/// Content hash identifying a stored module: SHA-256 of the wasm bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("checksum must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("checksum is not valid hex: {0}")]
    InvalidHex(String),
}

impl Checksum {
    pub fn generate(wasm: &[u8]) -> Self {
        Self(Sha256::digest(wasm).into())
    }

    pub fn from_hex(input: &str) -> Result<Self, ChecksumError> {
        let bytes = hex::decode(input).map_err(|e| ChecksumError::InvalidHex(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Checksum {
    type Error = ChecksumError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = value
            .try_into()
            .map_err(|_| ChecksumError::InvalidLength(value.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Iteration order for range scans. Travels as `i32` across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Order {
    Ascending = 1,
    Descending = 2,
}

impl TryFrom<i32> for Order {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Order::Ascending),
            2 => Ok(Order::Descending),
            other => Err(other),
        }
    }
}

/// Static facts about a stored module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    /// True if the module exports any of the IBC lifecycle hooks.
    pub has_ibc_entry_points: bool,
    pub required_capabilities: BTreeSet<String>,
}

/// Split a comma-separated capability list, trimming blanks.
pub fn parse_capabilities(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join capabilities into the comma-separated wire form.
pub fn join_capabilities(capabilities: &BTreeSet<String>) -> String {
    capabilities.iter().cloned().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_empty_input() {
        let checksum = Checksum::generate(b"");
        assert_eq!(
            checksum.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_hex_parse() {
        let checksum = Checksum::generate(b"wasm");
        let parsed = Checksum::from_hex(&checksum.to_hex()).unwrap();
        assert_eq!(parsed, checksum);
        assert_eq!(checksum.to_string(), checksum.to_hex());
    }

    #[test]
    fn test_checksum_wrong_length() {
        assert_eq!(
            Checksum::try_from(&[0u8; 31][..]),
            Err(ChecksumError::InvalidLength(31))
        );
        assert!(matches!(
            Checksum::from_hex("zz"),
            Err(ChecksumError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_order_from_i32() {
        assert_eq!(Order::try_from(1), Ok(Order::Ascending));
        assert_eq!(Order::try_from(2), Ok(Order::Descending));
        assert_eq!(Order::try_from(0), Err(0));
        assert_eq!(Order::try_from(3), Err(3));
    }

    #[test]
    fn test_capability_list() {
        let caps = parse_capabilities(" staking, iterator,,stargate ");
        assert_eq!(caps.len(), 3);
        assert!(caps.contains("staking"));
        assert_eq!(join_capabilities(&caps), "iterator,staking,stargate");
        assert!(parse_capabilities("").is_empty());
    }
}
