use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    chain::{
        address::Ss58Address,
        destination::{ClaimSigner, DestinationChain, TxHash},
    },
    claim::{
        book::{ClaimPhase, SharedBook, Submission},
        eligibility::can_submit_claim,
    },
    error::{ClaimError, Result},
    lockdrop::{
        pow::{NonceSearch, PowNonce},
        types::{decode_hex, ClaimId, LockParam},
    },
};

/// Who receives the reward of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The default address of the locker's own public key
    Direct,
    /// Another address, which needs the locker's signature
    Delegated(Ss58Address),
}

impl Recipient {
    pub fn resolve(recipient: &Ss58Address, default: &Ss58Address) -> Self {
        if recipient == default {
            Recipient::Direct
        } else {
            Recipient::Delegated(*recipient)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestReceipt {
    pub id: ClaimId,
    pub nonce: PowNonce,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub id: ClaimId,
    pub recipient: Recipient,
    pub tx_hash: TxHash,
}

/// Drives the request and claim calls of the lockdrop protocol.
///
/// Submissions never wait for a poll. A failed submission leaves the claim
/// in the phase it had before; the next poll reports what the chain did with
/// an accepted one.
pub struct ClaimEngine {
    chain: Arc<dyn DestinationChain>,
    book: SharedBook,
    search: NonceSearch,
    pow_timeout: Duration,
    prefix: u8,
}

impl ClaimEngine {
    pub fn new(
        chain: Arc<dyn DestinationChain>,
        book: SharedBook,
        search: NonceSearch,
        pow_timeout: Duration,
        prefix: u8,
    ) -> Self {
        Self {
            chain,
            book,
            search,
            pow_timeout,
            prefix,
        }
    }

    /// Request votes for the claim of `param`.
    ///
    /// Allowed when the claim was never requested or voting rejected it.
    pub async fn submit_request(&self, param: &LockParam) -> Result<RequestReceipt> {
        let id = {
            let mut book = self.book.write();
            let id = book.track(param.clone())?;
            match book.phase(&id) {
                ClaimPhase::NotRequested | ClaimPhase::Rejected => {}
                _ => return Err(ClaimError::AlreadyRequested(id)),
            }
            book.begin_submission(&id)?;
            id
        };

        let result = self.send_request(id, param).await;
        self.book
            .write()
            .finish_submission(&id, Submission::Request, result.is_ok());

        match &result {
            Ok(receipt) => info!(
                "Claim {} requested (nonce {}) | tx: {}",
                id, receipt.nonce.0, receipt.tx_hash
            ),
            Err(ClaimError::AlreadyRequested(_)) => info!("Claim {} was already requested", id),
            Err(e) => warn!("Claim request for {} failed: {}", id, e),
        }

        result
    }

    async fn send_request(&self, id: ClaimId, param: &LockParam) -> Result<RequestReceipt> {
        let nonce = self.search.run(id, self.pow_timeout).await?;
        let tx_hash = self.chain.request(param, nonce).await?;
        Ok(RequestReceipt { id, nonce, tx_hash })
    }

    /// How a payout to `address` must be sent for the tracked claim `id`
    pub fn recipient_for(&self, id: &ClaimId, address: &Ss58Address) -> Result<Recipient> {
        let book = self.book.read();
        let param = book
            .param(id)
            .ok_or_else(|| ClaimError::InvalidParameter(format!("claim {} is not tracked", id)))?;
        let default = Ss58Address::from_public_key(self.prefix, &param.public_key)?;
        Ok(Recipient::resolve(address, &default))
    }

    /// Claim the reward of `id` for `address`
    pub async fn submit_claim(
        &self,
        id: &ClaimId,
        address: &Ss58Address,
        signer: &dyn ClaimSigner,
    ) -> Result<ClaimReceipt> {
        let recipient = self.recipient_for(id, address)?;
        self.submit_claim_as(id, recipient, signer).await
    }

    /// Claim the reward of `id`. Only valid while the latest snapshot is
    /// claimable and no earlier claim for `id` is awaiting confirmation.
    pub async fn submit_claim_as(
        &self,
        id: &ClaimId,
        recipient: Recipient,
        signer: &dyn ClaimSigner,
    ) -> Result<ClaimReceipt> {
        {
            let mut book = self.book.write();
            if book.phase(id) == ClaimPhase::Claiming {
                return Err(ClaimError::SubmissionInFlight(*id));
            }
            let claimable = match book.requirement() {
                Some(req) => can_submit_claim(book.snapshot(id), &req),
                None => false,
            };
            if !claimable {
                return Err(ClaimError::ClaimRequirementNotMet(*id));
            }
            book.begin_submission(id)?;
        }

        let result = self.send_claim(id, recipient, signer).await;
        self.book
            .write()
            .finish_submission(id, Submission::Claim, result.is_ok());

        match &result {
            Ok(receipt) => info!("Claim {} sent | tx: {}", id, receipt.tx_hash),
            Err(e) => warn!("Claim for {} failed: {}", id, e),
        }

        result
    }

    async fn send_claim(
        &self,
        id: &ClaimId,
        recipient: Recipient,
        signer: &dyn ClaimSigner,
    ) -> Result<ClaimReceipt> {
        let tx_hash = match &recipient {
            Recipient::Direct => self.chain.claim_direct(id).await?,
            Recipient::Delegated(address) => {
                info!("Claim {} pays out to delegated address {}", id, address);
                // a new signature for every attempt, bound to this id and address
                let signature = decode_hex(&signer.sign(id, address).await?)
                    .map_err(|e| ClaimError::InvalidSignature(e.to_string()))?;
                if signature.is_empty() {
                    return Err(ClaimError::InvalidSignature("empty claim signature".to_string()));
                }
                self.chain.claim_to(id, address, &signature).await?
            }
        };

        Ok(ClaimReceipt {
            id: *id,
            recipient,
            tx_hash,
        })
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::destination::{MockClaimSigner, MockDestinationChain};
    use crate::claim::{book::PENDING_EXPIRY_POLLS, reconciliation::PollReport};
    use crate::lockdrop::types::{ChainType, Claim, VoteRequirement};
    use chrono::Utc;
    use std::collections::HashMap;

    const PREFIX: u8 = 5;

    fn param() -> LockParam {
        LockParam::new(ChainType::Eth, vec![0x11; 32], vec![0x02; 33], 86_400, 1_000)
    }

    fn engine(chain: MockDestinationChain, book: SharedBook) -> ClaimEngine {
        ClaimEngine::new(
            Arc::new(chain),
            book,
            NonceSearch::new(4, 1_000_000),
            Duration::from_secs(30),
            PREFIX,
        )
    }

    fn observe(book: &SharedBook, id: ClaimId, approve: usize, decline: usize, complete: bool) {
        let claim = Claim {
            id,
            approve: (0..approve).map(|i| format!("a{}", i)).collect(),
            decline: (0..decline).map(|i| format!("d{}", i)).collect(),
            complete,
            amount: 500,
        };
        book.write().apply(PollReport {
            claims: HashMap::from([(id, Some(claim))]),
            failed: Vec::new(),
            requirement: Some(VoteRequirement {
                positive_votes: 2,
                vote_threshold: 4,
            }),
            balance: None,
            polled_at: Utc::now(),
        });
    }

    fn default_address() -> Ss58Address {
        Ss58Address::from_public_key(PREFIX, &param().public_key).unwrap()
    }

    #[tokio::test]
    async fn test_request_moves_to_requested() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_request()
            .times(1)
            .returning(|_, _| Ok("0xfeed".to_string()));

        let book = SharedBook::new();
        let engine = engine(chain, book.clone());
        let receipt = engine.submit_request(&param()).await.unwrap();

        assert_eq!(receipt.tx_hash, "0xfeed");
        assert!(crate::lockdrop::pow::verify_nonce(&receipt.id, receipt.nonce, 4));
        assert_eq!(book.read().phase(&receipt.id), ClaimPhase::Requested);
    }

    #[tokio::test]
    async fn test_failed_request_keeps_phase() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_request()
            .returning(|_, _| Err(ClaimError::Transport("connection reset".into())));

        let book = SharedBook::new();
        let engine = engine(chain, book.clone());
        let err = engine.submit_request(&param()).await.unwrap_err();

        assert!(err.is_recoverable());
        let id = crate::lockdrop::derive_claim_id(&param()).unwrap();
        assert_eq!(book.read().phase(&id), ClaimPhase::NotRequested);
    }

    #[tokio::test]
    async fn test_duplicate_request_is_reported_without_submitting() {
        let mut chain = MockDestinationChain::new();
        chain.expect_request().never();

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 1, 0, false);

        let engine = engine(chain, book);
        assert!(matches!(
            engine.submit_request(&param()).await,
            Err(ClaimError::AlreadyRequested(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_claim_can_be_requested_again() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_request()
            .times(1)
            .returning(|_, _| Ok("0x01".to_string()));

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 1, 3, false);

        let engine = engine(chain, book.clone());
        engine.submit_request(&param()).await.unwrap();
        assert_eq!(book.read().phase(&id), ClaimPhase::Requested);
    }

    #[tokio::test]
    async fn test_chain_duplicate_surfaces_already_requested() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_request()
            .returning(|param, _| {
                let id = crate::lockdrop::derive_claim_id(param).unwrap();
                Err(ClaimError::AlreadyRequested(id))
            });

        let book = SharedBook::new();
        let engine = engine(chain, book.clone());
        let err = engine.submit_request(&param()).await.unwrap_err();

        assert!(matches!(err, ClaimError::AlreadyRequested(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_claim_before_eligibility_is_rejected() {
        let mut chain = MockDestinationChain::new();
        chain.expect_claim_direct().never();
        let mut signer = MockClaimSigner::new();
        signer.expect_sign().never();

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 1, 1, false);

        let engine = engine(chain, book);
        let err = engine.submit_claim(&id, &default_address(), &signer).await.unwrap_err();
        assert!(matches!(err, ClaimError::ClaimRequirementNotMet(_)));
    }

    #[tokio::test]
    async fn test_claim_to_default_address_needs_no_signature() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_claim_direct()
            .times(1)
            .returning(|_| Ok("0xc1a1".to_string()));
        chain.expect_claim_to().never();
        let mut signer = MockClaimSigner::new();
        signer.expect_sign().never();

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 3, 1, false);

        let engine = engine(chain, book.clone());
        let receipt = engine.submit_claim(&id, &default_address(), &signer).await.unwrap();

        assert_eq!(receipt.recipient, Recipient::Direct);
        assert_eq!(book.read().phase(&id), ClaimPhase::Claiming);
    }

    #[tokio::test]
    async fn test_delegated_claim_signs_exactly_once() {
        let delegate = Ss58Address::from_account(PREFIX, [9u8; 32]).unwrap();
        let id = crate::lockdrop::derive_claim_id(&param()).unwrap();

        let mut signer = MockClaimSigner::new();
        signer
            .expect_sign()
            .withf(move |signed_id, to| *signed_id == id && *to == delegate)
            .times(1)
            .returning(|_, _| Ok("0xdeadbeef".to_string()));

        let mut chain = MockDestinationChain::new();
        chain.expect_claim_direct().never();
        chain
            .expect_claim_to()
            .withf(move |claim_id, to, signature| {
                *claim_id == id && *to == delegate && signature == [0xde, 0xad, 0xbe, 0xef]
            })
            .times(1)
            .returning(|_, _, _| Ok("0xc1a2".to_string()));

        let book = SharedBook::new();
        book.write().track(param()).unwrap();
        observe(&book, id, 3, 1, false);

        let engine = engine(chain, book);
        let receipt = engine.submit_claim(&id, &delegate, &signer).await.unwrap();
        assert_eq!(receipt.recipient, Recipient::Delegated(delegate));
    }

    #[tokio::test]
    async fn test_failed_claim_stays_eligible() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_claim_direct()
            .returning(|_| Err(ClaimError::TransactionRejected("bad origin".into())));
        let signer = MockClaimSigner::new();

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 4, 0, false);

        let engine = engine(chain, book.clone());
        assert!(engine.submit_claim(&id, &default_address(), &signer).await.is_err());
        assert_eq!(book.read().phase(&id), ClaimPhase::Eligible);
    }

    #[tokio::test]
    async fn test_second_claim_while_claiming_is_not_sent() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_claim_direct()
            .times(1)
            .returning(|_| Ok("0xc1".to_string()));
        chain.expect_claim_to().never();
        let signer = MockClaimSigner::new();

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 3, 1, false);

        let engine = engine(chain, book.clone());
        engine.submit_claim(&id, &default_address(), &signer).await.unwrap();
        assert_eq!(book.read().phase(&id), ClaimPhase::Claiming);

        let err = engine.submit_claim(&id, &default_address(), &signer).await.unwrap_err();
        assert!(matches!(err, ClaimError::SubmissionInFlight(_)));
        assert_eq!(book.read().phase(&id), ClaimPhase::Claiming);
    }

    #[tokio::test]
    async fn test_second_delegated_claim_is_not_signed_again() {
        let delegate = Ss58Address::from_account(PREFIX, [9u8; 32]).unwrap();

        let mut signer = MockClaimSigner::new();
        signer
            .expect_sign()
            .times(1)
            .returning(|_, _| Ok("0xdeadbeef".to_string()));
        let mut chain = MockDestinationChain::new();
        chain
            .expect_claim_to()
            .times(1)
            .returning(|_, _, _| Ok("0xc2".to_string()));

        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 3, 1, false);

        let engine = engine(chain, book);
        engine.submit_claim(&id, &delegate, &signer).await.unwrap();
        assert!(matches!(
            engine.submit_claim(&id, &delegate, &signer).await,
            Err(ClaimError::SubmissionInFlight(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_request_can_be_retried() {
        let mut chain = MockDestinationChain::new();
        chain
            .expect_request()
            .times(2)
            .returning(|_, _| Ok("0x0a".to_string()));

        let book = SharedBook::new();
        let engine = engine(chain, book.clone());
        let id = engine.submit_request(&param()).await.unwrap().id;

        for _ in 0..PENDING_EXPIRY_POLLS {
            book.write().apply(PollReport {
                claims: HashMap::from([(id, None)]),
                failed: Vec::new(),
                requirement: None,
                balance: None,
                polled_at: Utc::now(),
            });
        }
        assert_eq!(book.read().phase(&id), ClaimPhase::NotRequested);

        engine.submit_request(&param()).await.unwrap();
        assert_eq!(book.read().phase(&id), ClaimPhase::Requested);
    }

    fn delegated_engine_with_signature(
        signature: Result<String>,
        book: SharedBook,
    ) -> (ClaimEngine, MockClaimSigner) {
        let mut chain = MockDestinationChain::new();
        chain.expect_claim_to().never();
        chain.expect_claim_direct().never();

        let mut signer = MockClaimSigner::new();
        let mut signature = Some(signature);
        signer
            .expect_sign()
            .times(1)
            .returning(move |_, _| signature.take().unwrap_or_else(|| Ok(String::new())));

        (engine(chain, book), signer)
    }

    #[tokio::test]
    async fn test_signer_failure_keeps_claim_eligible() {
        let delegate = Ss58Address::from_account(PREFIX, [9u8; 32]).unwrap();
        let book = SharedBook::new();
        let id = book.write().track(param()).unwrap();
        observe(&book, id, 3, 1, false);

        let (engine, signer) = delegated_engine_with_signature(
            Err(ClaimError::Transport("wallet closed".into())),
            book.clone(),
        );
        let err = engine.submit_claim(&id, &delegate, &signer).await.unwrap_err();

        assert!(err.is_recoverable());
        assert_eq!(book.read().phase(&id), ClaimPhase::Eligible);
    }

    #[tokio::test]
    async fn test_malformed_signature_is_recoverable() {
        let delegate = Ss58Address::from_account(PREFIX, [9u8; 32]).unwrap();

        for bad in ["0xnot-hex", "0x"] {
            let book = SharedBook::new();
            let id = book.write().track(param()).unwrap();
            observe(&book, id, 3, 1, false);

            let (engine, signer) = delegated_engine_with_signature(Ok(bad.to_string()), book.clone());
            let err = engine.submit_claim(&id, &delegate, &signer).await.unwrap_err();

            assert!(matches!(err, ClaimError::InvalidSignature(_)), "{}: {:?}", bad, err);
            assert!(err.is_recoverable());
            assert_eq!(book.read().phase(&id), ClaimPhase::Eligible);
        }
    }

    #[tokio::test]
    async fn test_request_with_unreachable_difficulty_is_bounded() {
        let mut chain = MockDestinationChain::new();
        chain.expect_request().never();

        let book = SharedBook::new();
        let engine = ClaimEngine::new(
            Arc::new(chain),
            book.clone(),
            NonceSearch::new(255, 1_000),
            Duration::from_secs(30),
            PREFIX,
        );

        let err = engine.submit_request(&param()).await.unwrap_err();
        assert!(matches!(err, ClaimError::PowExhausted { attempts: 1_000 }));
        let id = crate::lockdrop::derive_claim_id(&param()).unwrap();
        assert_eq!(book.read().phase(&id), ClaimPhase::NotRequested);
    }

    #[test]
    fn test_recipient_resolution_is_typed() {
        let default = default_address();
        let same = Ss58Address::parse(&default.encode(), PREFIX).unwrap();
        assert_eq!(Recipient::resolve(&same, &default), Recipient::Direct);

        let other = Ss58Address::from_account(PREFIX, [1u8; 32]).unwrap();
        assert_eq!(Recipient::resolve(&other, &default), Recipient::Delegated(other));
    }

    #[test]
    fn test_untracked_claim_has_no_recipient() {
        let engine = engine(MockDestinationChain::new(), SharedBook::new());
        let id = ClaimId::from_bytes([3u8; 32]);
        assert!(matches!(
            engine.recipient_for(&id, &default_address()),
            Err(ClaimError::InvalidParameter(_))
        ));
    }
}
