//! Configuration injected into the generator, encoder and locator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{LedgerAddress, QrOptions, DEFAULT_TOKEN_DECIMALS};

/// URI scheme of the ledger's payment-request standard
pub const DEFAULT_URI_SCHEME: &str = "solana";

/// How long a payer has to complete an attempt before the reference is discarded
pub const DEFAULT_ATTEMPT_TTL: Duration = Duration::from_secs(300);

/// Bounded retry policy for the transfer locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of ledger lookups before giving up.
    pub max_attempts: u32,
    /// Fixed delay between lookups.
    #[serde(with = "duration_millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// What to do with a transfer larger than the expected amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverpaymentPolicy {
    /// Confirm; the invoice is settled and the excess is the payer's loss.
    #[default]
    Accept,
    /// Treat any amount other than the exact expected one as a mismatch.
    Reject,
}

/// Everything the payment core needs to know about the operator's setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Wallet that receives the tokens.
    pub recipient: LedgerAddress,
    /// Mint of the settlement token.
    pub token_mint: LedgerAddress,
    /// Fractional digits of the settlement token.
    #[serde(default = "default_decimals")]
    pub token_decimals: u8,
    /// Payment URI scheme.
    #[serde(default = "default_scheme")]
    pub uri_scheme: String,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub overpayment: OverpaymentPolicy,
    /// Attempt expiry enforced by the presentation layer.
    #[serde(default = "default_ttl", with = "duration_secs")]
    pub attempt_ttl: Duration,
    #[serde(default)]
    pub qr: QrOptions,
}

fn default_decimals() -> u8 {
    DEFAULT_TOKEN_DECIMALS
}

fn default_scheme() -> String {
    DEFAULT_URI_SCHEME.to_string()
}

fn default_ttl() -> Duration {
    DEFAULT_ATTEMPT_TTL
}

impl PaymentConfig {
    /// Config with defaults for everything but the two addresses
    pub fn new(recipient: LedgerAddress, token_mint: LedgerAddress) -> Self {
        Self {
            recipient,
            token_mint,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            uri_scheme: default_scheme(),
            retry: RetryPolicy::default(),
            overpayment: OverpaymentPolicy::default(),
            attempt_ttl: DEFAULT_ATTEMPT_TTL,
            qr: QrOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_overpayment(mut self, policy: OverpaymentPolicy) -> Self {
        self.overpayment = policy;
        self
    }

    pub fn with_token_decimals(mut self, decimals: u8) -> Self {
        self.token_decimals = decimals;
        self
    }

    pub fn with_attempt_ttl(mut self, ttl: Duration) -> Self {
        self.attempt_ttl = ttl;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
