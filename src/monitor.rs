//! Payment Monitor
//!
//! Orchestrates one monitoring session: open a pending-transaction
//! subscription, scan for a qualifying candidate, await its finality, and
//! deliver exactly one terminal outcome. The subscription is released on
//! every exit path, and a single wall-clock deadline is shared between the
//! scan and finality phases.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::criteria::MatchCriteria;
use crate::matcher::scan_for_match;
use crate::rpc::{CandidateTransaction, ChainClient, PendingSubscription, Receipt, RpcError};
use crate::waiter::{await_receipt, FinalityOutcome};

/// Default overall session deadline
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default interval between pending-pool polls during the scan phase
pub const SCAN_POLL_INTERVAL_MS: u64 = 500;

/// Default interval between receipt polls during the finality phase
pub const RECEIPT_POLL_INTERVAL_SECS: u64 = 2;

/// Errors that can abort a session before any polling happens
///
/// Everything after the subscription is open degrades to a terminal
/// [`MonitorOutcome`] instead of erroring; availability of a definitive
/// answer takes priority over error fidelity.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Could not open pending-transaction subscription: {0}")]
    Connection(#[from] RpcError),
}

/// Terminal result of one monitoring session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// A qualifying transfer was observed and mined successfully
    Matched {
        tx_hash: alloy::primitives::TxHash,
        receipt: Receipt,
    },
    /// No qualifying transfer was confirmed before the deadline
    NoMatchTimeout,
    /// A qualifying transfer was mined but reverted on-chain
    MinedButFailed { receipt: Receipt },
}

/// Configuration for a monitoring session
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Overall deadline shared across the scan and finality phases
    pub timeout: Duration,
    /// Sleep between pending-pool polls
    pub scan_poll_interval: Duration,
    /// Sleep between receipt polls
    pub receipt_poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            scan_poll_interval: Duration::from_millis(SCAN_POLL_INTERVAL_MS),
            receipt_poll_interval: Duration::from_secs(RECEIPT_POLL_INTERVAL_SECS),
        }
    }
}

impl MonitorConfig {
    /// Create a config with the specified overall deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Caller side of a session cancellation signal
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Ask the session to stop at its next poll iteration
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Session side of a cancellation signal, checked at each poll iteration
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Create a linked cancel handle/token pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Session phases between subscription open and the terminal outcome
enum SessionState {
    Scanning,
    AwaitingFinality(CandidateTransaction),
}

/// Runs monitoring sessions against an injected chain client
///
/// Sessions are independent: each owns its own subscription handle, and any
/// number may run concurrently over the same client.
pub struct PaymentMonitor<C> {
    client: Arc<C>,
    config: MonitorConfig,
}

impl<C: ChainClient> PaymentMonitor<C> {
    pub fn new(client: Arc<C>, config: MonitorConfig) -> Self {
        Self { client, config }
    }

    /// Create a monitor with the default configuration
    pub fn with_default_config(client: Arc<C>) -> Self {
        Self::new(client, MonitorConfig::default())
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run one session to its terminal outcome
    pub async fn watch(&self, criteria: MatchCriteria) -> Result<MonitorOutcome, MonitorError> {
        self.watch_with_cancel(criteria, CancelToken::never()).await
    }

    /// Run one session, stopping early if the token is cancelled
    ///
    /// A cancelled session terminates with [`MonitorOutcome::NoMatchTimeout`]
    /// and still releases its subscription.
    pub async fn watch_with_cancel(
        &self,
        criteria: MatchCriteria,
        cancel: CancelToken,
    ) -> Result<MonitorOutcome, MonitorError> {
        let subscription = self.client.subscribe_pending().await?;
        let deadline = Instant::now() + self.config.timeout;

        info!(
            sender = %criteria.sender,
            receiver = %criteria.receiver,
            amount = %criteria.amount,
            timeout_secs = self.config.timeout.as_secs(),
            "Monitoring session started"
        );

        let outcome = self.drive(&subscription, &criteria, deadline, &cancel).await;

        // Exactly one release per session, on every exit path. A failed
        // uninstall leaves the filter to expire on the node side.
        if let Err(e) = self.client.release_subscription(subscription).await {
            warn!("Failed to release pending-transaction filter: {e}");
        }

        info!(?outcome, "Monitoring session finished");
        Ok(outcome)
    }

    async fn drive(
        &self,
        subscription: &PendingSubscription,
        criteria: &MatchCriteria,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> MonitorOutcome {
        let mut state = SessionState::Scanning;
        loop {
            state = match state {
                SessionState::Scanning => {
                    match scan_for_match(
                        self.client.as_ref(),
                        subscription,
                        criteria,
                        deadline,
                        self.config.scan_poll_interval,
                        cancel,
                    )
                    .await
                    {
                        Some(candidate) => SessionState::AwaitingFinality(candidate),
                        None => return MonitorOutcome::NoMatchTimeout,
                    }
                }
                SessionState::AwaitingFinality(candidate) => {
                    // The deadline carries over from the scan phase; finding a
                    // candidate does not reset the clock.
                    match await_receipt(
                        self.client.as_ref(),
                        candidate.hash,
                        deadline,
                        self.config.receipt_poll_interval,
                        cancel,
                    )
                    .await
                    {
                        FinalityOutcome::Confirmed(receipt) => {
                            return MonitorOutcome::Matched {
                                tx_hash: candidate.hash,
                                receipt,
                            }
                        }
                        FinalityOutcome::Reverted(receipt) => {
                            return MonitorOutcome::MinedButFailed { receipt }
                        }
                        FinalityOutcome::TimedOut => return MonitorOutcome::NoMatchTimeout,
                    }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockChainClient;
    use alloy::primitives::{address, b256, Address, TxHash, U256};

    const SENDER: Address = address!("a80CDa9D4898E2Cb232453ded54Fcb56b03e01Ae");
    const RECEIVER: Address = address!("38A8E09dE82A13fd31Fbe5D19E52BfF46A94f1c9");

    fn criteria() -> MatchCriteria {
        MatchCriteria::new(SENDER, RECEIVER, U256::from(1_500_000_000_000_000_000u64))
    }

    fn match_hash() -> TxHash {
        b256!("2222222222222222222222222222222222222222222222222222222222222222")
    }

    fn matching_candidate() -> CandidateTransaction {
        CandidateTransaction {
            hash: match_hash(),
            from: SENDER,
            to: Some(RECEIVER),
            value: U256::from(1_500_000_000_000_000_000u64),
            observed_at: 0,
        }
    }

    fn receipt(status: bool) -> Receipt {
        Receipt {
            transaction_hash: match_hash(),
            block_number: Some(100),
            status,
            gas_used: 21_000,
            effective_gas_price: 1_000_000_000,
        }
    }

    fn test_config(timeout_secs: u64) -> MonitorConfig {
        MonitorConfig {
            timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }

    fn mock_with_subscription() -> MockChainClient {
        let mut mock = MockChainClient::new();
        mock.expect_subscribe_pending().times(1).returning(|| {
            Ok(PendingSubscription {
                filter_id: U256::from(1),
            })
        });
        mock
    }

    // ==================== watch tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_matched_outcome_releases_subscription_once() {
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![match_hash()]));
        mock.expect_transaction_by_hash()
            .returning(|_| Ok(Some(matching_candidate())));
        mock.expect_receipt_by_hash()
            .returning(|_| Ok(Some(receipt(true))));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Ok(()));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(10));
        let outcome = monitor.watch(criteria()).await.unwrap();

        assert_eq!(
            outcome,
            MonitorOutcome::Matched {
                tx_hash: match_hash(),
                receipt: receipt(true),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_transaction_reports_mined_but_failed() {
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![match_hash()]));
        mock.expect_transaction_by_hash()
            .returning(|_| Ok(Some(matching_candidate())));
        mock.expect_receipt_by_hash()
            .returning(|_| Ok(Some(receipt(false))));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Ok(()));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(10));
        let outcome = monitor.watch(criteria()).await.unwrap();

        assert_eq!(
            outcome,
            MonitorOutcome::MinedButFailed {
                receipt: receipt(false),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidate_times_out_and_releases() {
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![]));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Ok(()));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(5));
        let started = Instant::now();
        let outcome = monitor.watch(criteria()).await.unwrap();

        assert_eq!(outcome, MonitorOutcome::NoMatchTimeout);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_shared_across_phases() {
        // Candidate appears immediately but is never mined: the session ends
        // at the overall deadline, not a fresh finality budget.
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![match_hash()]));
        mock.expect_transaction_by_hash()
            .returning(|_| Ok(Some(matching_candidate())));
        mock.expect_receipt_by_hash().returning(|_| Ok(None));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Ok(()));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(8));
        let started = Instant::now();
        let outcome = monitor.watch(criteria()).await.unwrap();

        assert_eq!(outcome, MonitorOutcome::NoMatchTimeout);
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_subscription_failure_aborts_without_release() {
        let mut mock = MockChainClient::new();
        mock.expect_subscribe_pending()
            .times(1)
            .returning(|| Err(RpcError::Subscription("node unreachable".into())));
        // No release expectation: nothing was opened.

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(10));
        let result = monitor.watch(criteria()).await;

        assert!(matches!(result, Err(MonitorError::Connection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_failure_does_not_change_outcome() {
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![match_hash()]));
        mock.expect_transaction_by_hash()
            .returning(|_| Ok(Some(matching_candidate())));
        mock.expect_receipt_by_hash()
            .returning(|_| Ok(Some(receipt(true))));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Err(RpcError::Transport("uninstall failed".into())));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(10));
        let outcome = monitor.watch(criteria()).await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Matched { .. }));
    }

    // ==================== cancellation tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_cancel_terminates_with_timeout_outcome() {
        let mut mock = mock_with_subscription();
        mock.expect_poll_new().returning(|_| Ok(vec![]));
        mock.expect_release_subscription()
            .times(1)
            .returning(|_| Ok(()));

        let monitor = PaymentMonitor::new(Arc::new(mock), test_config(600));
        let (handle, token) = cancel_pair();

        let started = Instant::now();
        let session = tokio::spawn(async move {
            monitor.watch_with_cancel(criteria(), token).await
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.cancel();

        let outcome = session.await.unwrap().unwrap();
        assert_eq!(outcome, MonitorOutcome::NoMatchTimeout);
        // Cancellation is observed at the next poll iteration.
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_cancel_token_never() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_pair_signals() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    // ==================== MonitorConfig tests ====================

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(
            config.scan_poll_interval,
            Duration::from_millis(SCAN_POLL_INTERVAL_MS)
        );
        assert_eq!(
            config.receipt_poll_interval,
            Duration::from_secs(RECEIPT_POLL_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_monitor_config_with_timeout() {
        let config = MonitorConfig::with_timeout(Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(
            config.receipt_poll_interval,
            Duration::from_secs(RECEIPT_POLL_INTERVAL_SECS)
        );
    }
}
