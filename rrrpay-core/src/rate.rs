//! Fiat to token exchange rates
//!
//! Rates are fetched per call and never cached: every reference snapshots the
//! rate it was created with, and that snapshot is what amounts are computed from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Which way the quote converts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateDirection {
    /// Fiat to token
    OnRamp,
    /// Token to fiat
    OffRamp,
}

impl RateDirection {
    /// Query-string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RateDirection::OnRamp => "onramp",
            RateDirection::OffRamp => "offramp",
        }
    }
}

impl std::fmt::Display for RateDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time quote: fiat units per one whole token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawExchangeRate")]
pub struct ExchangeRate {
    direction: RateDirection,
    value: Decimal,
    fetched_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExchangeRate {
    direction: RateDirection,
    value: Decimal,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<RawExchangeRate> for ExchangeRate {
    type Error = Error;

    fn try_from(raw: RawExchangeRate) -> Result<Self> {
        Self::at(raw.direction, raw.value, raw.fetched_at)
    }
}

impl ExchangeRate {
    /// Build a rate stamped with the current time
    pub fn new(direction: RateDirection, value: Decimal) -> Result<Self> {
        Self::at(direction, value, Utc::now())
    }

    /// Build a rate with an explicit timestamp
    pub fn at(direction: RateDirection, value: Decimal, fetched_at: DateTime<Utc>) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(Error::RateUnavailable(format!("non-positive rate: {}", value)));
        }
        Ok(Self {
            direction,
            value: value.normalize(),
            fetched_at,
        })
    }

    pub fn direction(&self) -> RateDirection {
        self.direction
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Source of exchange rates
///
/// Implementations must not retry internally; the caller decides.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch a current rate, failing with [`Error::RateUnavailable`]
    async fn get_rate(&self, direction: RateDirection) -> Result<ExchangeRate>;
}

#[async_trait]
impl<T: RateProvider + ?Sized> RateProvider for std::sync::Arc<T> {
    async fn get_rate(&self, direction: RateDirection) -> Result<ExchangeRate> {
        (**self).get_rate(direction).await
    }
}

/// A rate fixed by the operator
///
/// This is an explicit configuration choice, not a fallback for an
/// unreachable quote service.
#[derive(Debug, Clone)]
pub struct FixedRateProvider {
    value: Decimal,
}

impl FixedRateProvider {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(Error::RateUnavailable(format!("non-positive rate: {}", value)));
        }
        Ok(Self { value })
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn get_rate(&self, direction: RateDirection) -> Result<ExchangeRate> {
        ExchangeRate::new(direction, self.value)
    }
}

/// Quote service client
///
/// Issues `GET {base_url}/rate?direction=onramp` and expects a JSON body with a
/// `rate` field holding a number or a decimal string.
#[derive(Clone)]
pub struct HttpRateProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateProvider {
    /// Create a client with a 10 second request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::RateUnavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn get_rate(&self, direction: RateDirection) -> Result<ExchangeRate> {
        let url = format!("{}/rate", self.base_url);
        debug!(%url, %direction, "fetching exchange rate");

        let response = self
            .client
            .get(&url)
            .query(&[("direction", direction.as_str())])
            .send()
            .await
            .map_err(|e| Error::RateUnavailable(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "quote service returned an error");
            return Err(Error::RateUnavailable(format!(
                "quote service returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::RateUnavailable(format!("Invalid JSON: {}", e)))?;

        let value = parse_rate_value(&body["rate"])?;
        ExchangeRate::new(direction, value)
    }
}

/// Accept `"1600.5"` or `1600.5`
fn parse_rate_value(value: &serde_json::Value) -> Result<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s.trim())
            .map_err(|e| Error::RateUnavailable(format!("invalid rate {:?}: {}", s, e))),
        serde_json::Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| Error::RateUnavailable(format!("invalid rate {}", n)))?;
            // Round-trip through the textual form to avoid binary float noise
            Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::try_from(f))
                .map_err(|e| Error::RateUnavailable(format!("invalid rate {}: {}", n, e)))
        }
        serde_json::Value::Null => Err(Error::RateUnavailable("missing rate".to_string())),
        other => Err(Error::RateUnavailable(format!("invalid rate {}", other))),
    }
}
