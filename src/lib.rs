//! Paygate Monitor Library
//!
//! Transaction-matching and confirmation engine for a blockchain payment
//! gateway: watches a node's pending pool for a transfer matching an
//! expected (sender, receiver, amount) triple, awaits its finality, and
//! reports a single terminal outcome per session.

pub mod criteria;
pub mod matcher;
pub mod monitor;
pub mod oracle;
pub mod records;
pub mod rpc;
pub mod transfer;
pub mod waiter;
pub mod webhook;

// Re-export commonly used types
pub use criteria::{native_to_wei, wei_to_native, MatchCriteria};
pub use monitor::{
    cancel_pair, CancelHandle, CancelToken, MonitorConfig, MonitorError, MonitorOutcome,
    PaymentMonitor,
};
pub use oracle::PriceOracle;
pub use records::{PaymentRecord, PaymentStatus, PaymentStore, TransactionRecord};
pub use rpc::{
    CandidateTransaction, ChainClient, HttpChainClient, PendingSubscription, Receipt, RpcConfig,
    RpcError,
};
pub use waiter::FinalityOutcome;
pub use webhook::{WebhookDispatcher, WebhookPayload};

/// Install a process-wide tracing subscriber, honoring `RUST_LOG`
///
/// Falls back to `info` when no filter is configured; safe to call more than
/// once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
