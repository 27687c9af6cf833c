use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ClaimError, Result};

/// Chain the funds were locked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainType {
    Btc,
    Eth,
}

impl ChainType {
    /// Tag byte used when hashing a lock parameter
    pub fn tag(&self) -> u8 {
        match self {
            ChainType::Btc => 0,
            ChainType::Eth => 1,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ChainType::Btc => "BTC",
            ChainType::Eth => "ETH",
        }
    }
}

impl FromStr for ChainType {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Ok(ChainType::Eth),
            "btc" | "bitcoin" => Ok(ChainType::Btc),
            other => Err(ClaimError::InvalidParameter(format!("unknown chain type: {}", other))),
        }
    }
}

/// 20-byte Ethereum account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// Introducer used when a lock names none
    pub const ZERO: EthAddress = EthAddress([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for EthAddress {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim().trim_start_matches("0x").trim_start_matches("0X");
        let bytes = hex::decode(raw)
            .map_err(|e| ClaimError::InvalidParameter(format!("bad Ethereum address {}: {}", s, e)))?;
        let array: [u8; 20] = bytes.try_into().map_err(|b: Vec<u8>| {
            ClaimError::InvalidParameter(format!(
                "Ethereum address must be 20 bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A `Locked` event read from the source chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    /// Locked amount in wei
    pub amount: u128,
    /// Lock duration in seconds
    pub duration: u64,
    pub lock_address: EthAddress,
    pub introducer_address: EthAddress,
    pub block_number: u64,
    pub transaction_hash: String,
}

/// Parameters that identify one lock on the destination chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockParam {
    pub chain: ChainType,
    pub transaction_hash: Vec<u8>,
    pub public_key: Vec<u8>,
    pub duration: u64,
    pub value: u128,
}

impl LockParam {
    pub fn new(
        chain: ChainType,
        transaction_hash: Vec<u8>,
        public_key: Vec<u8>,
        duration: u64,
        value: u128,
    ) -> Self {
        Self {
            chain,
            transaction_hash,
            public_key,
            duration,
            value,
        }
    }

    /// Build a parameter from hex-encoded hash and key
    pub fn from_hex(
        chain: ChainType,
        transaction_hash: &str,
        public_key: &str,
        duration: u64,
        value: u128,
    ) -> Result<Self> {
        Ok(Self::new(
            chain,
            decode_hex(transaction_hash)?,
            decode_hex(public_key)?,
            duration,
            value,
        ))
    }

    /// Claim parameter for an Ethereum lock owned by `public_key`
    pub fn from_event(event: &LockEvent, public_key: &[u8]) -> Result<Self> {
        Ok(Self::new(
            ChainType::Eth,
            decode_hex(&event.transaction_hash)?,
            public_key.to_vec(),
            event.duration,
            event.amount,
        ))
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.public_key))
    }

    pub fn transaction_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.transaction_hash))
    }
}

/// Decode a hex string with or without the `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let raw = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    Ok(hex::decode(raw)?)
}

/// Deterministic identifier of a claim, derived from its [`LockParam`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimId([u8; 32]);

impl ClaimId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ClaimId {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        let array: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ClaimError::InvalidParameter(format!("claim id must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(array))
    }
}

impl Serialize for ClaimId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ClaimId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// On-chain claim record as observed by the last poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub approve: BTreeSet<String>,
    pub decline: BTreeSet<String>,
    pub complete: bool,
    /// Reward amount in femto
    pub amount: u128,
}

impl Claim {
    pub fn approvals(&self) -> usize {
        self.approve.len()
    }

    pub fn declines(&self) -> usize {
        self.decline.len()
    }
}

/// Chain-wide vote configuration for claim requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteRequirement {
    /// Approvals minus declines needed for acceptance
    pub positive_votes: u32,
    /// Total votes needed before the outcome is final
    pub vote_threshold: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_address_parsing_ignores_case() {
        let lower: EthAddress = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".parse().unwrap();
        let mixed: EthAddress = "0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower.to_string(), "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn test_eth_address_rejects_wrong_length() {
        assert!("0x1234".parse::<EthAddress>().is_err());
        assert!(EthAddress::ZERO.is_zero());
    }

    #[test]
    fn test_claim_id_hex_round_trip() {
        let id = ClaimId::from_bytes([0xab; 32]);
        let parsed: ClaimId = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("0xabcd".parse::<ClaimId>().is_err());
    }

    #[test]
    fn test_lock_param_from_event() {
        let event = LockEvent {
            amount: 1_000_000_000_000_000_000,
            duration: 30 * 24 * 3600,
            lock_address: EthAddress::from_bytes([1u8; 20]),
            introducer_address: EthAddress::ZERO,
            block_number: 42,
            transaction_hash: format!("0x{}", "11".repeat(32)),
        };
        let param = LockParam::from_event(&event, &[2u8; 33]).unwrap();

        assert_eq!(param.chain, ChainType::Eth);
        assert_eq!(param.transaction_hash, vec![0x11; 32]);
        assert_eq!(param.value, event.amount);
        assert_eq!(param.duration, event.duration);
    }

    #[test]
    fn test_chain_type_from_str() {
        assert_eq!("ETH".parse::<ChainType>().unwrap(), ChainType::Eth);
        assert_eq!("btc".parse::<ChainType>().unwrap(), ChainType::Btc);
        assert!("doge".parse::<ChainType>().is_err());
    }
}
