//! Chain RPC Client
//!
//! Connects to a blockchain node over HTTP JSON-RPC and exposes the small
//! surface the payment flow needs: a pending-transaction filter with
//! changes-since-last-poll semantics, transaction and receipt lookup by hash,
//! and the raw-transaction send path shared with the wallet code.

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Transaction, TransactionReceipt};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::info;

/// Default RPC endpoint (NeoX testnet seed node)
pub const DEFAULT_RPC_ENDPOINT: &str = "https://neoxt4seed1.ngd.network";

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Pending-transaction subscription failed: {0}")]
    Subscription(String),

    #[error("RPC transport error: {0}")]
    Transport(String),
}

/// Configuration for the chain RPC client
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint URL
    pub endpoint: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC_ENDPOINT.to_string(),
        }
    }
}

impl RpcConfig {
    /// Create a new config with the specified endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

/// Handle for an installed pending-transaction filter
///
/// Owned by the monitoring session for its lifetime; releasing it consumes
/// the handle, so it cannot be released twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubscription {
    /// Node-assigned filter id, passed back on every poll
    pub filter_id: U256,
}

/// A broadcast but not-yet-mined transaction pulled from the pending pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTransaction {
    /// Transaction hash
    pub hash: TxHash,
    /// Sender address
    pub from: Address,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Transfer value in wei
    pub value: U256,
    /// Unix timestamp in milliseconds when the candidate was observed
    pub observed_at: u64,
}

/// Block-inclusion record for a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Receipt {
    /// Hash of the mined transaction
    pub transaction_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: Option<u64>,
    /// Execution status: true = success, false = reverted
    pub status: bool,
    /// Gas consumed by the transaction
    pub gas_used: u128,
    /// Price per gas unit actually paid, in wei
    pub effective_gas_price: u128,
}

impl Receipt {
    /// Total gas fee paid, in wei
    pub fn gas_fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// Node RPC surface consumed by the matching and confirmation flow
///
/// Implemented by [`HttpChainClient`] for real nodes; sessions take the trait
/// so tests can script the chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Install a pending-transaction filter on the node
    async fn subscribe_pending(&self) -> Result<PendingSubscription, RpcError>;

    /// Fetch the transaction hashes observed since the previous poll
    ///
    /// Each call returns only new items; an empty batch means nothing new.
    async fn poll_new(&self, subscription: &PendingSubscription) -> Result<Vec<TxHash>, RpcError>;

    /// Fetch transaction details by hash
    ///
    /// Returns `None` when the node has dropped the entry from its pool and
    /// it is not yet mined.
    async fn transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> Result<Option<CandidateTransaction>, RpcError>;

    /// Fetch the receipt for a transaction; `None` until mined
    async fn receipt_by_hash(&self, hash: TxHash) -> Result<Option<Receipt>, RpcError>;

    /// Uninstall a pending-transaction filter
    async fn release_subscription(&self, subscription: PendingSubscription)
        -> Result<(), RpcError>;

    /// Current node gas price in wei
    async fn gas_price(&self) -> Result<u128, RpcError>;

    /// Number of transactions sent from an address (the next nonce)
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError>;

    /// Broadcast a signed raw transaction, returning its hash
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcError>;
}

/// HTTP JSON-RPC implementation of [`ChainClient`]
///
/// One instance per process, explicitly constructed and shared by reference
/// across concurrent monitoring sessions. The underlying connection pool
/// tolerates independent pollers.
pub struct HttpChainClient {
    provider: RootProvider<Http<Client>>,
    endpoint: String,
}

impl HttpChainClient {
    /// Connect to the node named by the config
    pub fn connect(config: &RpcConfig) -> Result<Self, RpcError> {
        let url = config
            .endpoint
            .parse::<reqwest::Url>()
            .map_err(|e| RpcError::Connection(format!("invalid endpoint '{}': {e}", config.endpoint)))?;

        let provider = ProviderBuilder::new().on_http(url);
        info!("Connected chain RPC client to {}", config.endpoint);

        Ok(Self {
            provider,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn transport_err(e: impl std::fmt::Display) -> RpcError {
    RpcError::Transport(e.to_string())
}

fn candidate_from_rpc(tx: Transaction) -> CandidateTransaction {
    use alloy::consensus::Transaction as _;
    CandidateTransaction {
        hash: *tx.inner.tx_hash(),
        from: tx.from,
        to: tx.inner.to(),
        value: tx.inner.value(),
        observed_at: current_timestamp_millis(),
    }
}

fn receipt_from_rpc(receipt: TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        status: receipt.status(),
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn subscribe_pending(&self) -> Result<PendingSubscription, RpcError> {
        let filter_id: U256 = self
            .provider
            .raw_request("eth_newPendingTransactionFilter".into(), ())
            .await
            .map_err(|e| RpcError::Subscription(e.to_string()))?;

        info!(%filter_id, "Installed pending-transaction filter");
        Ok(PendingSubscription { filter_id })
    }

    async fn poll_new(&self, subscription: &PendingSubscription) -> Result<Vec<TxHash>, RpcError> {
        self.provider
            .raw_request("eth_getFilterChanges".into(), (subscription.filter_id,))
            .await
            .map_err(transport_err)
    }

    async fn transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> Result<Option<CandidateTransaction>, RpcError> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(transport_err)?;
        Ok(tx.map(candidate_from_rpc))
    }

    async fn receipt_by_hash(&self, hash: TxHash) -> Result<Option<Receipt>, RpcError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(transport_err)?;
        Ok(receipt.map(receipt_from_rpc))
    }

    async fn release_subscription(
        &self,
        subscription: PendingSubscription,
    ) -> Result<(), RpcError> {
        let _uninstalled: bool = self
            .provider
            .raw_request("eth_uninstallFilter".into(), (subscription.filter_id,))
            .await
            .map_err(transport_err)?;

        info!(filter_id = %subscription.filter_id, "Released pending-transaction filter");
        Ok(())
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        self.provider.get_gas_price().await.map_err(transport_err)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(transport_err)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(transport_err)?;
        Ok(*pending.tx_hash())
    }
}
