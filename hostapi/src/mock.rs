//! Mock capabilities for tests.

use std::collections::HashMap;

use crate::error::HostError;
use crate::traits::{AddressCodec, Querier};

/// Shortest human address accepted by [`MockApi`].
pub const MOCK_ADDRESS_MIN_LEN: usize = 3;

/// Longest human address accepted by [`MockApi`].
pub const MOCK_ADDRESS_MAX_LEN: usize = 64;

/// Address codec whose canonical form is the lowercase ASCII bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockApi;

impl AddressCodec for MockApi {
    fn humanize(&self, canonical: &[u8]) -> Result<String, HostError> {
        if canonical.len() < MOCK_ADDRESS_MIN_LEN {
            return Err(HostError::user("Invalid input: canonical address too short"));
        }
        let human = std::str::from_utf8(canonical)
            .map_err(|_| HostError::user("Invalid input: canonical address is not UTF-8"))?;
        Ok(human.to_string())
    }

    fn canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError> {
        if human.len() < MOCK_ADDRESS_MIN_LEN {
            return Err(HostError::user("Invalid input: human address too short"));
        }
        if human.len() > MOCK_ADDRESS_MAX_LEN {
            return Err(HostError::user("Invalid input: human address too long"));
        }
        if !human.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(HostError::user("Invalid input: human address must be alphanumeric"));
        }
        Ok(human.to_ascii_lowercase().into_bytes())
    }
}

/// Querier answering from a fixed request → response table.
#[derive(Debug, Clone, Default)]
pub struct MockQuerier {
    responses: HashMap<Vec<u8>, Vec<u8>>,
}

impl MockQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, request: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(request.into(), response.into());
        self
    }
}

impl Querier for MockQuerier {
    fn query_raw(&self, request: &[u8], _gas_limit: u64) -> Result<Vec<u8>, HostError> {
        self.responses
            .get(request)
            .cloned()
            .ok_or_else(|| HostError::user(format!("unsupported query: {}", String::from_utf8_lossy(request))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_lowercases() {
        let api = MockApi;
        assert_eq!(api.canonicalize("Alice123").unwrap(), b"alice123".to_vec());
    }

    #[test]
    fn test_canonicalize_rejects_bad_input() {
        let api = MockApi;
        assert!(matches!(api.canonicalize("ab"), Err(HostError::User(_))));
        assert!(matches!(api.canonicalize(&"a".repeat(65)), Err(HostError::User(_))));
        assert!(matches!(api.canonicalize("not valid"), Err(HostError::User(_))));
    }

    #[test]
    fn test_humanize_roundtrip() {
        let api = MockApi;
        let canonical = api.canonicalize("bob").unwrap();
        assert_eq!(api.humanize(&canonical).unwrap(), "bob");
        assert!(matches!(api.humanize(&[0xff, 0xfe, 0xfd]), Err(HostError::User(_))));
        assert!(matches!(api.humanize(b"x"), Err(HostError::User(_))));
    }

    #[test]
    fn test_querier_responses() {
        let querier = MockQuerier::new().with_response("balance", "100");
        assert_eq!(querier.query_raw(b"balance", 1000).unwrap(), b"100".to_vec());

        let err = querier.query_raw(b"other", 1000).unwrap_err();
        assert_eq!(err.to_status(), -5);
        assert!(err.message().unwrap().contains("other"));
    }
}
