use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    chain::source::{BlockTag, EventLog, SourceChain, LOCKED_EVENT},
    error::{ClaimError, Result},
    lockdrop::types::{EthAddress, LockEvent},
};

/// Outcome of a lock fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    /// The source chain could not be read; the lock list is empty and should
    /// be fetched again later
    SourceUnavailable(String),
}

/// Point-in-time list of lock events
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    pub locks: Vec<LockEvent>,
    pub status: FetchStatus,
}

impl LockSnapshot {
    fn unavailable(err: ClaimError) -> Self {
        Self {
            locks: Vec::new(),
            status: FetchStatus::SourceUnavailable(err.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == FetchStatus::Complete
    }
}

/// Reads lock events of the lockdrop contract
pub struct LockMonitor {
    source: Arc<dyn SourceChain>,
    from_block: u64,
}

impl LockMonitor {
    pub fn new(source: Arc<dyn SourceChain>, from_block: u64) -> Self {
        Self { source, from_block }
    }

    /// Locks whose originating transaction was sent by `account`.
    ///
    /// Anyone can relay a lock for someone else, so ownership is decided by the
    /// transaction sender and never by a field of the event.
    pub async fn fetch_locks(&self, account: &EthAddress) -> LockSnapshot {
        info!("Fetching locks sent by {}", account);

        match self.owned_locks(account).await {
            Ok(locks) => {
                debug!("Found {} locks for {}", locks.len(), account);
                LockSnapshot {
                    locks,
                    status: FetchStatus::Complete,
                }
            }
            Err(e) => {
                warn!("Lock fetch for {} failed: {}", account, e);
                LockSnapshot::unavailable(e)
            }
        }
    }

    /// Every lock of the contract, regardless of sender
    pub async fn fetch_all_locks(&self) -> LockSnapshot {
        match self.past_events().await {
            Ok(events) => LockSnapshot {
                locks: events.iter().filter_map(normalize_logged).collect(),
                status: FetchStatus::Complete,
            },
            Err(e) => {
                warn!("Lock fetch failed: {}", e);
                LockSnapshot::unavailable(e)
            }
        }
    }

    async fn owned_locks(&self, account: &EthAddress) -> Result<Vec<LockEvent>> {
        let events = self.past_events().await?;

        let senders = try_join_all(
            events
                .iter()
                .map(|e| self.source.get_transaction(&e.transaction_hash)),
        )
        .await?;

        Ok(events
            .iter()
            .zip(senders)
            .filter(|(_, tx)| tx.from == *account)
            .filter_map(|(event, _)| normalize_logged(event))
            .collect())
    }

    async fn past_events(&self) -> Result<Vec<EventLog>> {
        self.source
            .get_past_events(LOCKED_EVENT, BlockTag::Number(self.from_block), BlockTag::Latest)
            .await
            .map_err(|e| match e {
                ClaimError::SourceUnavailable(_) => e,
                other => ClaimError::SourceUnavailable(other.to_string()),
            })
    }
}

fn normalize_logged(event: &EventLog) -> Option<LockEvent> {
    match normalize(event) {
        Ok(lock) => Some(lock),
        Err(e) => {
            warn!("Skipping malformed lock event {}: {}", event.transaction_hash, e);
            None
        }
    }
}

/// Convert raw event values into a [`LockEvent`]
pub fn normalize(event: &EventLog) -> Result<LockEvent> {
    let field = |name: &str| {
        event
            .return_values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ClaimError::InvalidParameter(format!("Locked event without {}", name)))
    };

    let amount = field("eth")?
        .parse::<u128>()
        .map_err(|e| ClaimError::InvalidParameter(format!("bad lock amount: {}", e)))?;
    let duration = field("duration")?
        .parse::<u64>()
        .map_err(|e| ClaimError::InvalidParameter(format!("bad lock duration: {}", e)))?;

    Ok(LockEvent {
        amount,
        duration,
        lock_address: field("lock")?.parse()?,
        introducer_address: default_introducer(event.return_values.get("introducer").map(String::as_str))?,
        block_number: event.block_number,
        transaction_hash: event.transaction_hash.clone(),
    })
}

/// An absent or empty introducer falls back to the zero address
pub fn default_introducer(introducer: Option<&str>) -> Result<EthAddress> {
    match introducer.map(str::trim) {
        Some(s) if !s.is_empty() => s.parse(),
        _ => Ok(EthAddress::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::source::{MockSourceChain, TransactionInfo};
    use std::collections::HashMap;

    fn addr(byte: u8) -> EthAddress {
        EthAddress::from_bytes([byte; 20])
    }

    fn log(tx: &str, lock: EthAddress, block: u64) -> EventLog {
        let mut values = HashMap::new();
        values.insert("eth".to_string(), "1000000000000000000".to_string());
        values.insert("duration".to_string(), "2592000".to_string());
        values.insert("lock".to_string(), lock.to_string());
        values.insert("introducer".to_string(), String::new());
        EventLog {
            return_values: values,
            transaction_hash: tx.to_string(),
            block_number: block,
        }
    }

    fn source_with(events: Vec<EventLog>, senders: HashMap<String, EthAddress>) -> MockSourceChain {
        let mut source = MockSourceChain::new();
        source
            .expect_get_past_events()
            .returning(move |_, _, _| Ok(events.clone()));
        source.expect_get_transaction().returning(move |hash| {
            Ok(TransactionInfo {
                hash: hash.to_string(),
                from: senders[hash],
            })
        });
        source
    }

    #[tokio::test]
    async fn test_fetch_locks_filters_by_sender() {
        let me = addr(0x01);
        let relayer = addr(0x02);

        // the relayed lock names `me` as lock address but was sent by someone else
        let events = vec![log("0xaa", addr(0x10), 5), log("0xbb", me, 6)];
        let senders = HashMap::from([("0xaa".to_string(), me), ("0xbb".to_string(), relayer)]);

        let monitor = LockMonitor::new(Arc::new(source_with(events, senders)), 0);
        let snapshot = monitor.fetch_locks(&me).await;

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.locks.len(), 1);
        assert_eq!(snapshot.locks[0].transaction_hash, "0xaa");
        assert_eq!(snapshot.locks[0].block_number, 5);
        assert_eq!(snapshot.locks[0].introducer_address, EthAddress::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_all_locks_is_unfiltered() {
        let events = vec![log("0xaa", addr(0x10), 5), log("0xbb", addr(0x11), 6)];
        let monitor = LockMonitor::new(Arc::new(source_with(events, HashMap::new())), 0);

        let snapshot = monitor.fetch_all_locks().await;
        assert_eq!(snapshot.locks.len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_yields_empty_unavailable_snapshot() {
        let mut source = MockSourceChain::new();
        source
            .expect_get_past_events()
            .returning(|_, _, _| Err(ClaimError::SourceUnavailable("connection refused".into())));

        let monitor = LockMonitor::new(Arc::new(source), 0);
        let snapshot = monitor.fetch_locks(&addr(0x01)).await;

        assert!(snapshot.locks.is_empty());
        assert!(matches!(snapshot.status, FetchStatus::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_sender_lookup_failure_is_unavailable() {
        let mut source = MockSourceChain::new();
        let events = vec![log("0xaa", addr(0x10), 5)];
        source
            .expect_get_past_events()
            .returning(move |_, _, _| Ok(events.clone()));
        source
            .expect_get_transaction()
            .returning(|_| Err(ClaimError::SourceUnavailable("timeout".into())));

        let monitor = LockMonitor::new(Arc::new(source), 0);
        let snapshot = monitor.fetch_locks(&addr(0x01)).await;

        assert!(!snapshot.is_complete());
        assert!(snapshot.locks.is_empty());
    }

    #[test]
    fn test_normalize_rejects_missing_amount() {
        let mut event = log("0xaa", addr(0x10), 1);
        event.return_values.remove("eth");
        assert!(normalize(&event).is_err());
    }

    #[test]
    fn test_default_introducer() {
        assert_eq!(default_introducer(None).unwrap(), EthAddress::ZERO);
        assert_eq!(default_introducer(Some("")).unwrap(), EthAddress::ZERO);
        assert_eq!(
            default_introducer(Some(&addr(0x05).to_string())).unwrap(),
            addr(0x05)
        );
    }
}
