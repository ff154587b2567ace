//! Webhook Dispatcher
//!
//! Posts terminal payment outcomes to a business-configured URL as JSON.
//! Delivery is best-effort: failures are logged, never retried by the core.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::monitor::MonitorOutcome;
use crate::records::PaymentRecord;
use crate::rpc::{current_timestamp_millis, Receipt};

/// Webhook delivery timeout
pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur during webhook delivery
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Payment notification format POSTed to the business endpoint
///
/// Amounts are decimal strings in wei; addresses and hashes are 0x-prefixed
/// hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Payment record id
    pub payment_id: String,
    /// Terminal payment status ("Successful", "Failed", "Pending")
    pub status: String,
    /// Expected transfer value in wei as decimal string
    pub amount: String,
    /// Payer address
    pub sender: String,
    /// Merchant wallet address
    pub receiver: String,
    /// Matched transaction hash, empty when no transfer was confirmed
    pub transaction_hash: String,
    /// Gas fee paid in wei as decimal string, "0" when unknown
    pub gas_fee: String,
    /// Block the transaction was mined in, if any
    pub block_number: Option<u64>,
    /// Full receipt when the transaction was mined
    pub receipt: Option<Receipt>,
    /// Unix timestamp in milliseconds when the payload was built
    pub timestamp: u64,
}

impl WebhookPayload {
    /// Build the notification for a payment's terminal outcome
    pub fn from_outcome(payment: &PaymentRecord, outcome: &MonitorOutcome) -> Self {
        let (transaction_hash, gas_fee, block_number, receipt) = match outcome {
            MonitorOutcome::Matched { tx_hash, receipt } => (
                format!("{tx_hash:#x}"),
                receipt.gas_fee().to_string(),
                receipt.block_number,
                Some(receipt.clone()),
            ),
            MonitorOutcome::MinedButFailed { receipt } => (
                format!("{:#x}", receipt.transaction_hash),
                receipt.gas_fee().to_string(),
                receipt.block_number,
                Some(receipt.clone()),
            ),
            MonitorOutcome::NoMatchTimeout => (String::new(), "0".to_string(), None, None),
        };

        WebhookPayload {
            payment_id: payment.payment_id.to_string(),
            status: payment.status.as_str().to_string(),
            amount: payment.amount.to_string(),
            sender: format!("{:#x}", payment.sender),
            receiver: format!("{:#x}", payment.receiver),
            transaction_hash,
            gas_fee,
            block_number,
            receipt,
            timestamp: current_timestamp_millis(),
        }
    }

    /// Serialize the payload to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a payload from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Posts payment notifications to business-configured endpoints
pub struct WebhookDispatcher {
    http: reqwest::Client,
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Deliver a payload, treating any non-2xx response as an error
    pub async fn dispatch(&self, url: &str, payload: &WebhookPayload) -> Result<(), WebhookError> {
        self.http
            .post(url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        info!(payment_id = %payload.payment_id, url, "Webhook delivered");
        Ok(())
    }

    /// Deliver a payload, logging failures instead of returning them
    pub async fn dispatch_best_effort(&self, url: &str, payload: &WebhookPayload) {
        if let Err(e) = self.dispatch(url, payload).await {
            error!(payment_id = %payload.payment_id, url, "Webhook delivery failed: {e}");
        }
    }
}
