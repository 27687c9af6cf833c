use thiserror::Error;

use crate::lockdrop::types::ClaimId;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Source chain unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Claim {0} was already requested")]
    AlreadyRequested(ClaimId),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Claim requirement was not met for {0}")]
    ClaimRequirementNotMet(ClaimId),

    #[error("A submission for claim {0} is already in progress")]
    SubmissionInFlight(ClaimId),

    #[error("Destination chain RPC error: {0}")]
    Transport(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Invalid claim signature: {0}")]
    InvalidSignature(String),

    #[error("No proof-of-work nonce found after {attempts} attempts")]
    PowExhausted { attempts: u64 },

    #[error("Proof-of-work search was cancelled")]
    PowCancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClaimError {
    /// Whether the session may carry on and retry after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClaimError::SourceUnavailable(_)
                | ClaimError::AlreadyRequested(_)
                | ClaimError::SubmissionInFlight(_)
                | ClaimError::Transport(_)
                | ClaimError::TransactionRejected(_)
                | ClaimError::InvalidSignature(_)
                | ClaimError::PowExhausted { .. }
                | ClaimError::PowCancelled
                | ClaimError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let id = ClaimId::from_bytes([7u8; 32]);

        assert!(ClaimError::SourceUnavailable("timeout".into()).is_recoverable());
        assert!(ClaimError::AlreadyRequested(id).is_recoverable());
        assert!(ClaimError::Transport("connection reset".into()).is_recoverable());
        assert!(ClaimError::InvalidSignature("odd length".into()).is_recoverable());

        assert!(!ClaimError::InvalidParameter("empty hash".into()).is_recoverable());
        assert!(!ClaimError::InvalidAddress("bad checksum".into()).is_recoverable());
        assert!(!ClaimError::ClaimRequirementNotMet(id).is_recoverable());
    }
}
