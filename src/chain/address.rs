use blake2::{Blake2b512, Digest};
use std::fmt;

use crate::{
    error::{ClaimError, Result},
    lockdrop::claim_id::blake2_256,
};

const CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const ACCOUNT_LEN: usize = 32;

/// Highest network prefix that fits the single-byte SS58 form
pub const MAX_SIMPLE_PREFIX: u8 = 63;

/// Destination-chain account address (SS58, single-byte network prefix).
///
/// Equality compares the decoded prefix and account bytes, never the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ss58Address {
    prefix: u8,
    account: [u8; ACCOUNT_LEN],
}

impl Ss58Address {
    pub fn from_account(prefix: u8, account: [u8; ACCOUNT_LEN]) -> Result<Self> {
        if prefix > MAX_SIMPLE_PREFIX {
            return Err(ClaimError::InvalidAddress(format!(
                "unsupported network prefix {}",
                prefix
            )));
        }
        Ok(Self { prefix, account })
    }

    /// Default address of a source-chain public key: BLAKE2b-256 of the key.
    pub fn from_public_key(prefix: u8, public_key: &[u8]) -> Result<Self> {
        if public_key.is_empty() {
            return Err(ClaimError::InvalidParameter("empty public key".to_string()));
        }
        Self::from_account(prefix, blake2_256(&[public_key]))
    }

    /// Decode and validate `s` against the network `prefix`
    pub fn parse(s: &str, prefix: u8) -> Result<Self> {
        let data = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| ClaimError::InvalidAddress(format!("{}: {}", s, e)))?;

        if data.len() != 1 + ACCOUNT_LEN + CHECKSUM_LEN {
            return Err(ClaimError::InvalidAddress(format!(
                "{}: invalid decoded length {}",
                s,
                data.len()
            )));
        }

        let (body, checksum) = data.split_at(1 + ACCOUNT_LEN);
        if checksum != ss58_checksum(body) {
            return Err(ClaimError::InvalidAddress(format!("{}: invalid checksum", s)));
        }

        if body[0] != prefix {
            return Err(ClaimError::InvalidAddress(format!(
                "{}: prefix mismatch, expected {} got {}",
                s, prefix, body[0]
            )));
        }

        let mut account = [0u8; ACCOUNT_LEN];
        account.copy_from_slice(&body[1..]);
        Self::from_account(prefix, account)
    }

    /// Whether `s` is a valid address for the network `prefix`
    pub fn is_valid(s: &str, prefix: u8) -> bool {
        Self::parse(s, prefix).is_ok()
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn account(&self) -> &[u8; ACCOUNT_LEN] {
        &self.account
    }

    pub fn encode(&self) -> String {
        let mut data = Vec::with_capacity(1 + ACCOUNT_LEN + CHECKSUM_LEN);
        data.push(self.prefix);
        data.extend_from_slice(&self.account);
        let checksum = ss58_checksum(&data);
        data.extend_from_slice(&checksum);
        bs58::encode(data).into_string()
    }
}

impl fmt::Display for Ss58Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn ss58_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(CHECKSUM_PREFIX);
    hasher.update(data);
    let digest = hasher.finalize();

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLASM_PREFIX: u8 = 5;

    #[test]
    fn test_encode_then_parse() {
        let address = Ss58Address::from_account(PLASM_PREFIX, [7u8; 32]).unwrap();
        let parsed = Ss58Address::parse(&address.encode(), PLASM_PREFIX).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_parse_known_generic_address() {
        // Alice on the generic substrate prefix
        let alice = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
        let address = Ss58Address::parse(alice, 42).unwrap();
        assert_eq!(address.account()[0], 0xd4);
        assert_eq!(address.encode(), alice);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut encoded = Ss58Address::from_account(PLASM_PREFIX, [7u8; 32]).unwrap().encode();
        let last = encoded.pop().unwrap();
        encoded.push(if last == 'a' { 'b' } else { 'a' });
        assert!(matches!(
            Ss58Address::parse(&encoded, PLASM_PREFIX),
            Err(ClaimError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_rejects_other_network() {
        let encoded = Ss58Address::from_account(42, [7u8; 32]).unwrap().encode();
        assert!(!Ss58Address::is_valid(&encoded, PLASM_PREFIX));
        assert!(!Ss58Address::is_valid("not an address", PLASM_PREFIX));
    }

    #[test]
    fn test_default_address_is_deterministic() {
        let key = [0x02u8; 33];
        let a = Ss58Address::from_public_key(PLASM_PREFIX, &key).unwrap();
        let b = Ss58Address::from_public_key(PLASM_PREFIX, &key).unwrap();
        assert_eq!(a, b);
        assert_eq!(*a.account(), blake2_256(&[&key]));
        assert!(Ss58Address::from_public_key(PLASM_PREFIX, &[]).is_err());
    }
}
