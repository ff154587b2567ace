//! Price Oracle
//!
//! Converts native-asset amounts to a fiat-equivalent value through a
//! third-party quote endpoint. Display data only: nothing in the matching
//! path depends on it.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use alloy::primitives::U256;

use crate::criteria::wei_to_native;

/// Default quote endpoint (CryptoCompare price API)
pub const DEFAULT_PRICE_ENDPOINT: &str = "https://min-api.cryptocompare.com/data/price";

/// Default native-asset symbol quoted
pub const DEFAULT_ASSET_SYMBOL: &str = "GAS";

/// Default fiat symbol quoted against
pub const DEFAULT_FIAT_SYMBOL: &str = "USDT";

/// Quote request timeout
pub const QUOTE_TIMEOUT_SECS: u64 = 10;

/// Decimal places kept in fiat display values
pub const FIAT_DISPLAY_SCALE: u32 = 6;

/// Errors that can occur while quoting
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Quote request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Quote response is missing the '{symbol}' rate")]
    MissingQuote { symbol: String },

    #[error("Amount is too large to convert for display")]
    AmountOutOfRange,
}

/// Fetches native-to-fiat rates from an HTTP quote service
pub struct PriceOracle {
    http: reqwest::Client,
    endpoint: String,
    asset: String,
    fiat: String,
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceOracle {
    /// Create an oracle against the default endpoint and symbols
    pub fn new() -> Self {
        Self::with_endpoint(
            DEFAULT_PRICE_ENDPOINT,
            DEFAULT_ASSET_SYMBOL,
            DEFAULT_FIAT_SYMBOL,
        )
    }

    /// Create an oracle against a specific endpoint and symbol pair
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        asset: impl Into<String>,
        fiat: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(QUOTE_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.into(),
            asset: asset.into(),
            fiat: fiat.into(),
        }
    }

    /// Fetch the current fiat rate for one whole native-asset unit
    pub async fn quote(&self) -> Result<Decimal, OracleError> {
        let url = format!(
            "{}?fsym={}&tsyms={}",
            self.endpoint, self.asset, self.fiat
        );
        let quotes: HashMap<String, Decimal> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rate = quotes
            .get(&self.fiat)
            .copied()
            .ok_or_else(|| OracleError::MissingQuote {
                symbol: self.fiat.clone(),
            })?;
        debug!(asset = %self.asset, fiat = %self.fiat, %rate, "Fetched price quote");
        Ok(rate)
    }

    /// Convert a wei amount to its fiat-equivalent display value
    ///
    /// Zero short-circuits without a network call; the result is rounded to
    /// [`FIAT_DISPLAY_SCALE`] decimal places.
    pub async fn wei_to_fiat(&self, value: U256) -> Result<Decimal, OracleError> {
        if value.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let native = wei_to_native(value).ok_or(OracleError::AmountOutOfRange)?;
        let rate = self.quote().await?;
        Ok((native * rate).round_dp(FIAT_DISPLAY_SCALE))
    }
}
