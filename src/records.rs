//! Payment & Transaction Records
//!
//! The persistence collaborator surface: the records the surrounding CRUD
//! glue stores, the store trait it implements, and the mapping from a
//! session's terminal outcome onto those records.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::monitor::MonitorOutcome;
use crate::webhook::{WebhookDispatcher, WebhookPayload};

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Awaiting a qualifying on-chain transfer
    Pending,
    /// A qualifying transfer was mined successfully
    Successful,
    /// A qualifying transfer was mined but reverted
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Successful => "Successful",
            PaymentStatus::Failed => "Failed",
        }
    }
}

/// An expected payment registered by a business
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub payment_id: Uuid,
    /// Payer address
    pub sender: Address,
    /// Merchant wallet address
    pub receiver: Address,
    /// Expected transfer value in wei
    pub amount: U256,
    pub status: PaymentStatus,
    /// Hash of the matched transfer, set on success or on-chain failure
    pub transaction_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Register a new pending payment
    pub fn new(sender: Address, receiver: Address, amount: U256) -> Self {
        Self {
            payment_id: Uuid::new_v4(),
            sender,
            receiver,
            amount,
            status: PaymentStatus::Pending,
            transaction_hash: None,
            created_at: Utc::now(),
        }
    }
}

/// The on-chain transfer recorded against a payment's terminal outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub payment_id: Uuid,
    pub from: Address,
    pub to: Address,
    /// Transfer value in wei
    pub amount: U256,
    /// Gas fee paid in wei
    pub gas_fee: U256,
    pub block_number: Option<u64>,
    pub status: PaymentStatus,
    pub hash: TxHash,
    pub created_at: DateTime<Utc>,
}

/// Error surfaced by a persistence backend
#[derive(Error, Debug)]
#[error("Payment store error: {0}")]
pub struct StoreError(pub String);

/// Persistence collaborator implemented by the surrounding glue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist the current state of a payment record
    async fn update_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError>;

    /// Persist a transaction record created by a terminal outcome
    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;
}

/// Apply a terminal outcome to a payment record
///
/// Returns the transaction record to persist when a transfer was actually
/// mined; a timeout leaves the payment `Pending` (the caller may monitor
/// again later) and produces no record.
pub fn apply_outcome(
    payment: &mut PaymentRecord,
    outcome: &MonitorOutcome,
) -> Option<TransactionRecord> {
    match outcome {
        MonitorOutcome::Matched { tx_hash, receipt } => {
            payment.status = PaymentStatus::Successful;
            payment.transaction_hash = Some(*tx_hash);
            Some(TransactionRecord {
                payment_id: payment.payment_id,
                from: payment.sender,
                to: payment.receiver,
                amount: payment.amount,
                gas_fee: receipt.gas_fee(),
                block_number: receipt.block_number,
                status: PaymentStatus::Successful,
                hash: *tx_hash,
                created_at: Utc::now(),
            })
        }
        MonitorOutcome::MinedButFailed { receipt } => {
            payment.status = PaymentStatus::Failed;
            payment.transaction_hash = Some(receipt.transaction_hash);
            Some(TransactionRecord {
                payment_id: payment.payment_id,
                from: payment.sender,
                to: payment.receiver,
                amount: payment.amount,
                gas_fee: receipt.gas_fee(),
                block_number: receipt.block_number,
                status: PaymentStatus::Failed,
                hash: receipt.transaction_hash,
                created_at: Utc::now(),
            })
        }
        MonitorOutcome::NoMatchTimeout => None,
    }
}

/// Persist a terminal outcome and notify the business endpoint
///
/// The store update is authoritative and its failure propagates; webhook
/// delivery is best-effort and never blocks settlement.
pub async fn finalize_payment<S: PaymentStore + ?Sized>(
    store: &S,
    dispatcher: &WebhookDispatcher,
    webhook_url: Option<&str>,
    payment: &mut PaymentRecord,
    outcome: &MonitorOutcome,
) -> Result<(), StoreError> {
    let record = apply_outcome(payment, outcome);

    store.update_payment(payment).await?;
    if let Some(record) = &record {
        store.insert_transaction(record).await?;
    }

    if let Some(url) = webhook_url {
        let payload = WebhookPayload::from_outcome(payment, outcome);
        dispatcher.dispatch_best_effort(url, &payload).await;
    }

    Ok(())
}
