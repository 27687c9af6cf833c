use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::{
    chain::address::Ss58Address,
    claim::{
        eligibility::{has_all_votes, is_accepted, ActionHint, Eligibility},
        reconciliation::PollReport,
    },
    error::{ClaimError, Result},
    lockdrop::{
        claim_id::derive_claim_id,
        types::{Claim, ClaimId, LockParam, VoteRequirement},
    },
};

/// Where a claim stands in the request / vote / claim protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClaimPhase {
    NotRequested,
    /// Request accepted by the chain, not yet visible to a poll
    Requested,
    VotesPending,
    Eligible,
    /// All votes are in and the claim was declined
    Rejected,
    /// Claim transaction sent, payout not yet observed
    Claiming,
    Claimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Request,
    Claim,
}

/// Polls without an effect before an accepted submission is presumed lost
pub const PENDING_EXPIRY_POLLS: u32 = 8;

/// A submission the chain accepted but no poll has reflected yet
#[derive(Debug, Clone)]
struct Pending {
    kind: Submission,
    /// Snapshot at the time of submission
    observed: Option<Claim>,
    unchanged_polls: u32,
}

/// Per-claim view handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct ClaimStatus {
    pub id: ClaimId,
    pub phase: ClaimPhase,
    pub eligibility: Eligibility,
    pub hint: ActionHint,
    pub claim: Option<Claim>,
}

/// Local view of tracked claims, merged from poll results and submissions
#[derive(Debug, Default)]
pub struct ClaimBook {
    params: BTreeMap<ClaimId, LockParam>,
    /// Absent key: never polled. `None`: polled, not requested on chain.
    snapshots: HashMap<ClaimId, Option<Claim>>,
    requirement: Option<VoteRequirement>,
    balance: Option<u128>,
    recipient: Option<Ss58Address>,
    in_flight: HashSet<ClaimId>,
    pending: HashMap<ClaimId, Pending>,
    last_poll: Option<DateTime<Utc>>,
    closed: bool,
}

impl ClaimBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking the claim of `param`
    pub fn track(&mut self, param: LockParam) -> Result<ClaimId> {
        let id = derive_claim_id(&param)?;
        self.params.insert(id, param);
        Ok(id)
    }

    pub fn tracked_ids(&self) -> Vec<ClaimId> {
        self.params.keys().copied().collect()
    }

    pub fn param(&self, id: &ClaimId) -> Option<&LockParam> {
        self.params.get(id)
    }

    /// Latest known on-chain record
    pub fn snapshot(&self, id: &ClaimId) -> Option<&Claim> {
        self.snapshots.get(id).and_then(Option::as_ref)
    }

    pub fn requirement(&self) -> Option<VoteRequirement> {
        self.requirement
    }

    pub fn balance(&self) -> Option<u128> {
        self.balance
    }

    pub fn recipient(&self) -> Option<Ss58Address> {
        self.recipient
    }

    pub fn set_recipient(&mut self, recipient: Ss58Address) {
        self.recipient = Some(recipient);
    }

    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        self.last_poll
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting poll results
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Eligibility flags; nothing is claimable before the vote requirement is known
    pub fn eligibility(&self, id: &ClaimId) -> Eligibility {
        let snapshot = self.snapshot(id);
        match self.requirement {
            Some(req) => Eligibility::evaluate(snapshot, &req),
            None => Eligibility {
                requested: snapshot.is_some(),
                complete: snapshot.map(|c| c.complete).unwrap_or(false),
                ..Eligibility::default()
            },
        }
    }

    pub fn phase(&self, id: &ClaimId) -> ClaimPhase {
        let pending = self.pending.get(id).map(|p| p.kind);

        let claim = match self.snapshot(id) {
            None if pending == Some(Submission::Request) => return ClaimPhase::Requested,
            None => return ClaimPhase::NotRequested,
            Some(claim) => claim,
        };

        if claim.complete {
            return ClaimPhase::Claimed;
        }

        match pending {
            Some(Submission::Claim) => return ClaimPhase::Claiming,
            Some(Submission::Request) => return ClaimPhase::Requested,
            None => {}
        }

        match self.requirement {
            Some(req) if !has_all_votes(claim, &req) => ClaimPhase::VotesPending,
            Some(req) if !is_accepted(claim, &req) => ClaimPhase::Rejected,
            Some(_) => ClaimPhase::Eligible,
            None => ClaimPhase::VotesPending,
        }
    }

    pub fn status(&self, id: &ClaimId) -> ClaimStatus {
        let eligibility = self.eligibility(id);
        ClaimStatus {
            id: *id,
            phase: self.phase(id),
            eligibility,
            hint: ActionHint::from_eligibility(&eligibility),
            claim: self.snapshot(id).cloned(),
        }
    }

    pub fn overview(&self) -> Vec<ClaimStatus> {
        self.params.keys().map(|id| self.status(id)).collect()
    }

    /// Mark a submission for `id` as executing
    pub fn begin_submission(&mut self, id: &ClaimId) -> Result<()> {
        if !self.in_flight.insert(*id) {
            return Err(ClaimError::SubmissionInFlight(*id));
        }
        Ok(())
    }

    /// End an executing submission. Only an accepted one changes the phase.
    pub fn finish_submission(&mut self, id: &ClaimId, kind: Submission, accepted: bool) {
        self.in_flight.remove(id);
        if accepted {
            let observed = self.snapshot(id).cloned();
            self.pending.insert(
                *id,
                Pending {
                    kind,
                    observed,
                    unchanged_polls: 0,
                },
            );
        }
    }

    /// Merge one poll tick. Returns `false` if the book is closed and nothing
    /// was applied.
    pub fn apply(&mut self, report: PollReport) -> bool {
        if self.closed {
            debug!("Discarding poll result for closed session");
            return false;
        }

        if let Some(req) = report.requirement {
            self.requirement = Some(req);
        }
        if let Some(balance) = report.balance {
            self.balance = Some(balance);
        }

        for (id, claim) in report.claims {
            if !self.params.contains_key(&id) {
                continue;
            }

            let was_complete = self.snapshot(&id).map(|c| c.complete).unwrap_or(false);
            let is_complete = claim.as_ref().map(|c| c.complete).unwrap_or(false);
            if was_complete && !is_complete {
                warn!("Ignoring regressed snapshot for completed claim {}", id);
                continue;
            }

            let resolved = match self.pending.get_mut(&id) {
                Some(p) => {
                    let seen = match p.kind {
                        Submission::Request => claim != p.observed,
                        Submission::Claim => is_complete,
                    };
                    if !seen {
                        p.unchanged_polls += 1;
                    }
                    let expired = !seen && p.unchanged_polls >= PENDING_EXPIRY_POLLS;
                    if expired {
                        warn!(
                            "{:?} for claim {} had no effect after {} polls, allowing retry",
                            p.kind, id, p.unchanged_polls
                        );
                    }
                    seen || expired
                }
                None => false,
            };
            if resolved {
                self.pending.remove(&id);
            }

            self.snapshots.insert(id, claim);
        }

        self.last_poll = Some(report.polled_at);
        true
    }
}

/// [`ClaimBook`] shared between the poll task and the claim engine
#[derive(Debug, Clone, Default)]
pub struct SharedBook(Arc<RwLock<ClaimBook>>);

impl SharedBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ClaimBook> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ClaimBook> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
