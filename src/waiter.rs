//! Confirmation Waiter
//!
//! Polls for the receipt of a matched transaction until it is mined or the
//! session deadline elapses, then classifies the result. Receipt-poll
//! failures are swallowed and retried; the waiter cannot tell "node is down"
//! apart from "not yet mined" and deliberately does not try to.

use alloy::primitives::TxHash;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::monitor::CancelToken;
use crate::rpc::{ChainClient, Receipt};

/// Reference receipt poll interval
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How a matched transaction's finality wait resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalityOutcome {
    /// Mined with a success status
    Confirmed(Receipt),
    /// Mined but reverted on-chain
    Reverted(Receipt),
    /// Deadline elapsed before a receipt appeared
    TimedOut,
}

/// Poll for a receipt until mined, cancelled, or the deadline elapses
///
/// Poll faults do not shorten the deadline: a flaky node costs retries, not
/// the session.
pub async fn await_receipt<C: ChainClient + ?Sized>(
    client: &C,
    tx_hash: TxHash,
    deadline: Instant,
    poll_interval: Duration,
    cancel: &CancelToken,
) -> FinalityOutcome {
    loop {
        if cancel.is_cancelled() {
            return FinalityOutcome::TimedOut;
        }

        match client.receipt_by_hash(tx_hash).await {
            Ok(Some(receipt)) => {
                info!(
                    hash = %tx_hash,
                    block = ?receipt.block_number,
                    status = receipt.status,
                    "Transaction mined"
                );
                return if receipt.status {
                    FinalityOutcome::Confirmed(receipt)
                } else {
                    FinalityOutcome::Reverted(receipt)
                };
            }
            // Not yet mined.
            Ok(None) => {}
            Err(e) => debug!(hash = %tx_hash, "Receipt poll failed, retrying: {e}"),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return FinalityOutcome::TimedOut;
        }
        sleep(poll_interval.min(remaining)).await;
    }
}
