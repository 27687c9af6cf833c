use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::{
    error::{ClaimError, Result},
    lockdrop::{claim_id::blake2_256, types::ClaimId},
};

/// Attempts between checks of the cancellation flag
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Anti-spam nonce attached to a claim request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PowNonce(pub u64);

impl PowNonce {
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

/// Bounded search for a claim request nonce.
///
/// A nonce is valid when BLAKE2b-256(claim id || nonce LE) starts with at
/// least `difficulty_bits` zero bits.
#[derive(Debug, Clone, Copy)]
pub struct NonceSearch {
    pub difficulty_bits: u8,
    pub max_attempts: u64,
}

impl NonceSearch {
    pub fn new(difficulty_bits: u8, max_attempts: u64) -> Self {
        Self {
            difficulty_bits,
            max_attempts,
        }
    }

    /// Search nonces `0..max_attempts` in order; the first valid one wins.
    pub fn search(&self, id: &ClaimId, cancel: &AtomicBool) -> Result<PowNonce> {
        for nonce in 0..self.max_attempts {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return Err(ClaimError::PowCancelled);
            }

            if verify_nonce(id, PowNonce(nonce), self.difficulty_bits) {
                return Ok(PowNonce(nonce));
            }
        }

        Err(ClaimError::PowExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Run [`NonceSearch::search`] on the blocking pool, abandoned after `timeout`
    pub async fn run(self, id: ClaimId, timeout: Duration) -> Result<PowNonce> {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();

        let task = tokio::task::spawn_blocking(move || self.search(&id, &flag));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ClaimError::Other(anyhow::anyhow!("nonce search task failed: {}", e))),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!("Nonce search for {} timed out after {:?}", id, timeout);
                Err(ClaimError::PowCancelled)
            }
        }
    }
}

pub fn verify_nonce(id: &ClaimId, nonce: PowNonce, difficulty_bits: u8) -> bool {
    let hash = blake2_256(&[id.as_bytes(), &nonce.to_bytes()]);
    leading_zero_bits(&hash) >= difficulty_bits as u32
}

fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut count = 0u32;
    for byte in hash {
        let lz = byte.leading_zeros();
        count += lz;
        if lz < 8 {
            break;
        }
    }
    count
}
