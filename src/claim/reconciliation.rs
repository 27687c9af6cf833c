use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    chain::{address::Ss58Address, destination::DestinationChain},
    lockdrop::types::{Claim, ClaimId, VoteRequirement},
};

/// Result of one poll tick.
///
/// `claims` holds every id whose query succeeded (`None` = not requested on
/// chain). Ids in `failed` keep their previous state. `requirement` and
/// `balance` are `None` when their query failed.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub claims: HashMap<ClaimId, Option<Claim>>,
    pub failed: Vec<ClaimId>,
    pub requirement: Option<VoteRequirement>,
    pub balance: Option<u128>,
    pub polled_at: DateTime<Utc>,
}

/// Reads claim records, the vote requirement and the recipient balance.
///
/// Keeps no history: every report is a full replacement for the ids it
/// contains, so polling twice is harmless.
pub struct ClaimStateReconciler {
    chain: Arc<dyn DestinationChain>,
}

impl ClaimStateReconciler {
    pub fn new(chain: Arc<dyn DestinationChain>) -> Self {
        Self { chain }
    }

    pub async fn poll(&self, ids: &[ClaimId], recipient: Option<&Ss58Address>) -> PollReport {
        let claim_queries = join_all(ids.iter().map(|id| self.chain.claim(id)));
        let requirement_query = self.chain.vote_requirement();
        let balance_query = async {
            match recipient {
                Some(who) => Some(self.chain.balance(who).await),
                None => None,
            }
        };

        let (claim_results, requirement, balance) =
            futures::join!(claim_queries, requirement_query, balance_query);

        let mut claims = HashMap::new();
        let mut failed = Vec::new();
        for (id, result) in ids.iter().zip(claim_results) {
            match result {
                Ok(claim) => {
                    claims.insert(*id, claim);
                }
                Err(e) => {
                    warn!("Claim query for {} failed: {}", id, e);
                    failed.push(*id);
                }
            }
        }

        let requirement = match requirement {
            Ok(req) => Some(req),
            Err(e) => {
                warn!("Vote requirement query failed: {}", e);
                None
            }
        };

        let balance = match balance {
            Some(Ok(balance)) => Some(balance),
            Some(Err(e)) => {
                warn!("Balance query failed: {}", e);
                None
            }
            None => None,
        };

        debug!(
            "Polled {} claims ({} failed), requirement: {:?}",
            claims.len(),
            failed.len(),
            requirement
        );

        PollReport {
            claims,
            failed,
            requirement,
            balance,
            polled_at: Utc::now(),
        }
    }
}
