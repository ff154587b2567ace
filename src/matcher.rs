//! Transaction Matcher
//!
//! Scans newly observed pending transactions against the session's match
//! criteria and returns the first qualifying candidate. Transient node
//! faults are logged and retried; they never abort the scan.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::criteria::MatchCriteria;
use crate::monitor::CancelToken;
use crate::rpc::{CandidateTransaction, ChainClient, PendingSubscription};

/// Poll the subscription until a qualifying candidate appears, the deadline
/// elapses, or the session is cancelled
///
/// First match wins: the scan accepts the first hash whose transaction
/// satisfies the criteria and does not keep looking for better matches.
/// Hashes that can no longer be resolved (dropped from the pool between
/// observation and lookup) are skipped silently.
pub async fn scan_for_match<C: ChainClient + ?Sized>(
    client: &C,
    subscription: &PendingSubscription,
    criteria: &MatchCriteria,
    deadline: Instant,
    poll_interval: Duration,
    cancel: &CancelToken,
) -> Option<CandidateTransaction> {
    loop {
        if cancel.is_cancelled() || Instant::now() >= deadline {
            return None;
        }

        match client.poll_new(subscription).await {
            Ok(hashes) => {
                for hash in hashes {
                    match client.transaction_by_hash(hash).await {
                        Ok(Some(tx)) if criteria.matches(&tx) => {
                            info!(
                                hash = %tx.hash,
                                from = %tx.from,
                                value = %tx.value,
                                "Pending transaction matches criteria"
                            );
                            return Some(tx);
                        }
                        Ok(Some(_)) => {}
                        // Dropped from the pool between observation and lookup.
                        Ok(None) => {}
                        Err(e) => debug!(%hash, "Transaction lookup failed, skipping: {e}"),
                    }
                }
            }
            // Transient: retried on the next round without shortening the deadline.
            Err(e) => warn!("Pending-transaction poll failed: {e}"),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        sleep(poll_interval.min(remaining)).await;
    }
}
