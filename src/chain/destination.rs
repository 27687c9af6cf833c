use async_trait::async_trait;

use crate::{
    chain::address::Ss58Address,
    error::Result,
    lockdrop::{
        pow::PowNonce,
        types::{Claim, ClaimId, LockParam, VoteRequirement},
    },
};

/// Hash of a transaction accepted by the destination chain, `0x`-prefixed hex
pub type TxHash = String;

/// What the claim engine needs from a destination-chain client.
///
/// Implementations report a duplicate request as
/// [`ClaimError::AlreadyRequested`](crate::error::ClaimError::AlreadyRequested),
/// transport failures as `Transport` and dispatch failures as
/// `TransactionRejected`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Claim record for `id`, `None` if it was never requested
    async fn claim(&self, id: &ClaimId) -> Result<Option<Claim>>;

    async fn vote_requirement(&self) -> Result<VoteRequirement>;

    /// Free balance of `who` in femto
    async fn balance(&self, who: &Ss58Address) -> Result<u128>;

    async fn request(&self, param: &LockParam, nonce: PowNonce) -> Result<TxHash>;

    /// Pay the reward to the locker's default address
    async fn claim_direct(&self, id: &ClaimId) -> Result<TxHash>;

    /// Pay the reward to `recipient`, authorised by the locker's `signature`
    async fn claim_to(&self, id: &ClaimId, recipient: &Ss58Address, signature: &[u8]) -> Result<TxHash>;
}

/// Locker-side signing capability for delegated payouts.
///
/// Returns a hex signature over the claim id bound to `recipient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimSigner: Send + Sync {
    async fn sign(&self, id: &ClaimId, recipient: &Ss58Address) -> Result<String>;
}
