use serde::Serialize;

use crate::lockdrop::types::{Claim, VoteRequirement};

/// Enough votes were cast for the outcome to be final
pub fn has_all_votes(claim: &Claim, req: &VoteRequirement) -> bool {
    claim.approvals() + claim.declines() >= req.vote_threshold as usize
}

/// Approvals exceed declines by at least the required margin
pub fn is_accepted(claim: &Claim, req: &VoteRequirement) -> bool {
    claim.approvals() as i64 - claim.declines() as i64 >= req.positive_votes as i64
}

/// The reward can be claimed now
pub fn can_submit_claim(claim: Option<&Claim>, req: &VoteRequirement) -> bool {
    match claim {
        Some(claim) => has_all_votes(claim, req) && is_accepted(claim, req) && !claim.complete,
        None => false,
    }
}

/// Voting finished against the claim
pub fn is_rejected(claim: &Claim, req: &VoteRequirement) -> bool {
    has_all_votes(claim, req) && !is_accepted(claim, req)
}

/// All eligibility flags of one claim snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Eligibility {
    pub requested: bool,
    pub has_all_votes: bool,
    pub accepted: bool,
    pub rejected: bool,
    pub complete: bool,
    pub can_submit_claim: bool,
}

impl Eligibility {
    pub fn evaluate(claim: Option<&Claim>, req: &VoteRequirement) -> Self {
        match claim {
            Some(c) => Self {
                requested: true,
                has_all_votes: has_all_votes(c, req),
                accepted: is_accepted(c, req),
                rejected: is_rejected(c, req),
                complete: c.complete,
                can_submit_claim: can_submit_claim(claim, req),
            },
            None => Self::default(),
        }
    }
}

/// User action suggested for a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionHint {
    /// Send a claim request
    Request,
    /// Votes are still coming in
    Wait,
    /// Voting rejected the claim; a fresh request may be sent
    Retry,
    /// The reward can be claimed
    Claim,
    /// The reward was paid
    Done,
}

impl ActionHint {
    pub fn from_eligibility(flags: &Eligibility) -> Self {
        if !flags.requested {
            ActionHint::Request
        } else if flags.complete {
            ActionHint::Done
        } else if !flags.has_all_votes {
            ActionHint::Wait
        } else if !flags.accepted {
            ActionHint::Retry
        } else {
            ActionHint::Claim
        }
    }
}

/// Human readable eligibility status
pub fn eligibility_reason(claim: Option<&Claim>, req: &VoteRequirement) -> String {
    let claim = match claim {
        Some(c) => c,
        None => return "Claim not requested".to_string(),
    };

    if claim.complete {
        return "Claimed lockdrop".to_string();
    }

    let votes = claim.approvals() + claim.declines();
    if !has_all_votes(claim, req) {
        return format!(
            "Waiting for votes ({} of {} cast)",
            votes, req.vote_threshold
        );
    }

    if !is_accepted(claim, req) {
        return format!(
            "Claim rejected ({} approve, {} decline, {} net approvals needed)",
            claim.approvals(),
            claim.declines(),
            req.positive_votes
        );
    }

    "Claim requested and approved (not claimed)".to_string()
}
