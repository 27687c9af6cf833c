pub mod book;
pub mod eligibility;
pub mod engine;
pub mod reconciliation;
pub mod session;

pub use book::{ClaimBook, ClaimPhase, ClaimStatus, SharedBook, PENDING_EXPIRY_POLLS};
pub use eligibility::{can_submit_claim, has_all_votes, is_accepted, ActionHint, Eligibility};
pub use engine::{ClaimEngine, ClaimReceipt, Recipient, RequestReceipt};
pub use reconciliation::{ClaimStateReconciler, PollReport};
pub use session::ClaimSession;
