use blake2::{digest::consts::U32, Blake2b, Digest};

use crate::{
    error::{ClaimError, Result},
    lockdrop::types::{ClaimId, LockParam},
};

type Blake2b256 = Blake2b<U32>;

/// Length of a lock transaction hash
pub const TRANSACTION_HASH_LEN: usize = 32;
/// Length of a compressed ECDSA public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// BLAKE2b-256 over the concatenation of `parts`
pub fn blake2_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derive the claim id of a lock.
///
/// The id is BLAKE2b-256 over the fixed-width encoding
/// `chain tag (1) || tx hash (32) || public key (33) || duration (u64 LE) || value (u128 LE)`.
/// Every field has a fixed width, so distinct parameters never share an encoding.
pub fn derive_claim_id(param: &LockParam) -> Result<ClaimId> {
    validate(param)?;

    let encoded = encode(param);
    Ok(ClaimId::from_bytes(blake2_256(&[&encoded])))
}

fn validate(param: &LockParam) -> Result<()> {
    if param.transaction_hash.len() != TRANSACTION_HASH_LEN {
        return Err(ClaimError::InvalidParameter(format!(
            "transaction hash must be {} bytes, got {}",
            TRANSACTION_HASH_LEN,
            param.transaction_hash.len()
        )));
    }

    if param.public_key.len() != PUBLIC_KEY_LEN {
        return Err(ClaimError::InvalidParameter(format!(
            "public key must be {} bytes (compressed), got {}",
            PUBLIC_KEY_LEN,
            param.public_key.len()
        )));
    }

    Ok(())
}

fn encode(param: &LockParam) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + TRANSACTION_HASH_LEN + PUBLIC_KEY_LEN + 8 + 16);
    out.push(param.chain.tag());
    out.extend_from_slice(&param.transaction_hash);
    out.extend_from_slice(&param.public_key);
    out.extend_from_slice(&param.duration.to_le_bytes());
    out.extend_from_slice(&param.value.to_le_bytes());
    out
}
