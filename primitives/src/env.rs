//! JSON payloads describing the chain environment of a call.
//!
//! These are serialized by the host and handed to entry points as the `env`
//! and `info` byte buffers. The field set and coercions are a compatibility
//! surface: 64-bit timestamps travel as decimal strings, an empty funds list
//! is emitted as `[]`, and absent or `null` fields decode as zero values.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Everything an entry point may know about the chain when it is called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    #[serde(default, deserialize_with = "null_as_default")]
    pub block: BlockInfo,
    /// `None` outside of a transaction (e.g. in queries); serialized as `null`.
    #[serde(default)]
    pub transaction: Option<TransactionInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contract: ContractInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: u64,
    /// Nanoseconds since the unix epoch.
    #[serde(default, with = "u64_string")]
    pub time: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
}

/// Who sent the message and what funds came with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub funds: Vec<Coin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    #[serde(default, deserialize_with = "null_as_default")]
    pub denom: String,
    /// Decimal string; amounts may exceed 64 bits.
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `u64` as a JSON decimal string. `null` reads as zero, `""` is rejected.
mod u64_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(0),
            Some(s) => s
                .parse::<u64>()
                .map_err(|e| de::Error::custom(format!("invalid u64 string {:?}: {}", s, e))),
        }
    }
}
