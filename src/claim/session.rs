use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::claim::{book::SharedBook, reconciliation::ClaimStateReconciler};

/// Recurring claim poll owned by one user session.
///
/// Polls once at start and then every `period`. A tick that comes due while
/// the previous poll is still running is skipped. After [`ClaimSession::stop`]
/// returns the book is closed and no poll result is applied to it again.
pub struct ClaimSession {
    book: SharedBook,
    handle: Option<JoinHandle<()>>,
}

impl ClaimSession {
    pub fn start(reconciler: ClaimStateReconciler, book: SharedBook, period: Duration) -> Self {
        info!("Starting claim poll every {:?}", period);

        let task_book = book.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let (ids, recipient) = {
                    let book = task_book.read();
                    if book.is_closed() {
                        break;
                    }
                    (book.tracked_ids(), book.recipient())
                };

                let report = reconciler.poll(&ids, recipient.as_ref()).await;
                if !task_book.write().apply(report) {
                    break;
                }
                debug!("Poll tick applied for {} claims", ids.len());
            }
        });

        Self {
            book,
            handle: Some(handle),
        }
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stop polling. Takes effect before returning.
    pub fn stop(&mut self) {
        self.book.write().close();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Claim poll stopped");
        }
    }
}

impl Drop for ClaimSession {
    fn drop(&mut self) {
        self.stop();
    }
}
