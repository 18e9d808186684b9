//! Payment references: one unpredictable public key per invoice attempt

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    Error, ExchangeRate, FiatAmount, LedgerAddress, RateDirection, RateProvider, Result,
};

/// A 256-bit public tag attached to exactly one payment attempt
///
/// The locator finds the payer's transfer by this key, so it must never be
/// reused across attempts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceKey(LedgerAddress);

impl ReferenceKey {
    /// Draw a fresh key from the given CSPRNG
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(LedgerAddress::from_bytes(bytes))
    }

    /// Draw a fresh key from the operating system
    pub fn generate() -> Self {
        Self::random(&mut OsRng)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(LedgerAddress::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// The key as a ledger account address
    pub fn as_address(&self) -> &LedgerAddress {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        self.0.to_base58()
    }
}

impl FromStr for ReferenceKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(LedgerAddress::parse(s)?))
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceKey({})", self.0)
    }
}

/// A reference key bound to a memo and the rate used to price it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReference {
    key: ReferenceKey,
    memo: String,
    rate: ExchangeRate,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl PaymentReference {
    /// Bind an existing key to a memo and rate
    pub fn new(key: ReferenceKey, memo: impl Into<String>, rate: ExchangeRate) -> Result<Self> {
        let memo = memo.into();
        validate_memo(&memo)?;
        Ok(Self {
            key,
            memo,
            rate,
            created_at: Utc::now(),
            signature: None,
        })
    }

    pub fn key(&self) -> &ReferenceKey {
        &self.key
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn rate(&self) -> &ExchangeRate {
        &self.rate
    }

    /// The rate snapshot amounts are computed from
    pub fn rate_value(&self) -> Decimal {
        self.rate.value()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Signature of the matching transfer, once located
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Record the matching transaction; the reference is immutable afterwards
    pub fn attach_signature(&mut self, signature: impl Into<String>) -> Result<()> {
        if let Some(ref existing) = self.signature {
            return Err(Error::SignatureAlreadySet(existing.clone()));
        }
        self.signature = Some(signature.into());
        Ok(())
    }

    /// Whether the attempt has outlived `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.time_remaining(ttl).is_zero()
    }

    /// Time left before the presentation layer should discard this reference
    pub fn time_remaining(&self, ttl: Duration) -> Duration {
        let elapsed = (Utc::now() - self.created_at).to_std().unwrap_or(Duration::ZERO);
        ttl.saturating_sub(elapsed)
    }
}

/// Creates payment references, one rate lookup each
pub struct ReferenceGenerator<R> {
    rates: R,
}

impl<R: RateProvider> ReferenceGenerator<R> {
    pub fn new(rates: R) -> Self {
        Self { rates }
    }

    /// Generate a key, fetch an on-ramp rate and bind both to `memo`
    ///
    /// If the rate cannot be fetched no reference is created.
    pub async fn create_reference(&self, memo: &str) -> Result<PaymentReference> {
        validate_memo(memo)?;
        let rate = self.rates.get_rate(RateDirection::OnRamp).await?;
        let key = ReferenceKey::generate();

        info!(reference = %key, rate = %rate.value(), "created payment reference");
        PaymentReference::new(key, memo, rate)
    }

    /// Quote the token amount for a fiat amount at a freshly fetched rate
    pub async fn quote(&self, fiat: FiatAmount, decimals: u8) -> Result<String> {
        let rate = self.rates.get_rate(RateDirection::OnRamp).await?;
        debug!(rate = %rate.value(), %fiat, "quoting token amount");
        crate::amount::format_token_amount(fiat, rate.value(), decimals)
    }
}

fn validate_memo(memo: &str) -> Result<()> {
    if memo.trim().is_empty() {
        return Err(Error::InvalidMemo("memo must not be empty".to_string()));
    }
    Ok(())
}

/// The invoice being settled, as supplied by the invoice provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Retrieval reference identifying what is owed
    pub rrr: String,
    pub amount: FiatAmount,
    pub description: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}

impl Invoice {
    pub fn new(rrr: impl Into<String>, amount: FiatAmount, description: impl Into<String>) -> Self {
        Self {
            rrr: rrr.into(),
            amount,
            description: description.into(),
            currency: default_currency(),
        }
    }

    /// Memo bound to every payment attempt for this invoice
    pub fn payment_memo(&self) -> String {
        format!("Remita Invoice Payment - RRR: {}", self.rrr)
    }
}
