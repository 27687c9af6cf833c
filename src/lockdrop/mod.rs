pub mod claim_id;
pub mod monitor;
pub mod pow;
pub mod types;

pub use claim_id::derive_claim_id;
pub use monitor::{FetchStatus, LockMonitor, LockSnapshot};
pub use pow::{NonceSearch, PowNonce};
pub use types::{ChainType, Claim, ClaimId, EthAddress, LockEvent, LockParam, VoteRequirement};
