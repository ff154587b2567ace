//! Native Transfer Path
//!
//! Builds, signs and broadcasts a plain native-asset transfer through the
//! shared chain client: node gas price, next account nonce, standard
//! 21 000-gas limit. Key material stays with the caller; nothing here stores
//! or derives wallet keys.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;
use tracing::info;

use crate::rpc::{ChainClient, RpcError};

/// Standard gas limit for a native-asset transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Chain id of the default network (NeoX testnet)
pub const DEFAULT_CHAIN_ID: u64 = 12_227_332;

/// Errors that can occur while sending a transfer
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to build transaction: {0}")]
    Build(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// A native-asset transfer to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Recipient address
    pub to: Address,
    /// Transfer value in wei
    pub amount: U256,
    /// Chain id the signature commits to
    pub chain_id: u64,
}

impl TransferRequest {
    /// Create a transfer on the default chain
    pub fn new(to: Address, amount: U256) -> Self {
        Self {
            to,
            amount,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }

    /// Create a transfer for a specific chain id
    pub fn on_chain(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }
}

/// Sign and broadcast a native transfer, returning its hash
///
/// The caller can hand the returned hash to the confirmation waiter to await
/// mining; this function does not block on inclusion.
pub async fn send_native_transfer<C: ChainClient + ?Sized>(
    client: &C,
    signing_key: &str,
    request: &TransferRequest,
) -> Result<TxHash, TransferError> {
    let signer: PrivateKeySigner = signing_key
        .trim_start_matches("0x")
        .parse()
        .map_err(|e| TransferError::InvalidKey(format!("{e}")))?;
    let from = signer.address();

    let nonce = client.transaction_count(from).await?;
    let gas_price = client.gas_price().await?;

    let tx = TransactionRequest::default()
        .with_from(from)
        .with_to(request.to)
        .with_value(request.amount)
        .with_nonce(nonce)
        .with_gas_limit(TRANSFER_GAS_LIMIT)
        .with_gas_price(gas_price)
        .with_chain_id(request.chain_id);

    let wallet = EthereumWallet::from(signer);
    let envelope = tx
        .build(&wallet)
        .await
        .map_err(|e| TransferError::Build(e.to_string()))?;

    let hash = client.send_raw_transaction(&envelope.encoded_2718()).await?;
    info!(%hash, %from, to = %request.to, value = %request.amount, "Broadcast native transfer");
    Ok(hash)
}
