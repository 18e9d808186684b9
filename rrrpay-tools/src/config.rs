//! CLI configuration.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rrrpay_core::{
    FixedRateProvider, HttpRateProvider, LedgerAddress, PaymentConfig, RateProvider, RetryPolicy,
    RpcConfig, DEFAULT_TOKEN_DECIMALS, USDC_MINT,
};

/// Where exchange rates come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateSource {
    /// Quote service base URL.
    Http(String),
    /// Operator-fixed NGN per token.
    Fixed(Decimal),
}

/// Operator configuration.
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    /// Ledger JSON-RPC endpoint.
    pub rpc_url: String,
    /// Merchant wallet receiving payments.
    pub recipient: LedgerAddress,
    /// Settlement token mint.
    pub token_mint: LedgerAddress,
    pub token_decimals: u8,
    pub rate_source: Option<RateSource>,
    /// Maximum ledger lookups per verification.
    pub max_attempts: u32,
    /// Delay between lookups in milliseconds.
    pub retry_delay_ms: u64,
    /// Attempt expiry in seconds.
    pub attempt_ttl_secs: u64,
}

impl ToolsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_url = var("RRRPAY_RPC_URL")
            .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());

        let recipient = var("RRRPAY_RECIPIENT")
            .context("RRRPAY_RECIPIENT must be set")?
            .parse::<LedgerAddress>()
            .context("RRRPAY_RECIPIENT is not a valid address")?;

        let token_mint = var("RRRPAY_TOKEN_MINT")
            .unwrap_or_else(|| USDC_MINT.to_string())
            .parse::<LedgerAddress>()
            .context("RRRPAY_TOKEN_MINT is not a valid address")?;

        let token_decimals: u8 = parse_or(&var, "RRRPAY_TOKEN_DECIMALS", DEFAULT_TOKEN_DECIMALS)?;

        let rate_source = match (var("RRRPAY_RATE_URL"), var("RRRPAY_FIXED_RATE")) {
            (Some(url), _) => Some(RateSource::Http(url)),
            (None, Some(rate)) => Some(RateSource::Fixed(
                Decimal::from_str(rate.trim()).context("RRRPAY_FIXED_RATE is not a decimal")?,
            )),
            (None, None) => None,
        };

        let max_attempts: u32 = parse_or(&var, "RRRPAY_MAX_ATTEMPTS", 10)?;
        let retry_delay_ms: u64 = parse_or(&var, "RRRPAY_RETRY_DELAY_MS", 2000)?;
        let attempt_ttl_secs: u64 = parse_or(&var, "RRRPAY_ATTEMPT_TTL_SECS", 300)?;

        Ok(Self {
            rpc_url,
            recipient,
            token_mint,
            token_decimals,
            rate_source,
            max_attempts,
            retry_delay_ms,
            attempt_ttl_secs,
        })
    }

    /// Payment core configuration.
    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig::new(self.recipient, self.token_mint)
            .with_token_decimals(self.token_decimals)
            .with_retry(RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ))
            .with_attempt_ttl(Duration::from_secs(self.attempt_ttl_secs))
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig::default().with_url(self.rpc_url.clone())
    }

    /// Build the configured rate provider.
    pub fn rate_provider(&self) -> Result<Arc<dyn RateProvider>> {
        match &self.rate_source {
            Some(RateSource::Http(url)) => Ok(Arc::new(HttpRateProvider::new(url.clone())?)),
            Some(RateSource::Fixed(rate)) => Ok(Arc::new(FixedRateProvider::new(*rate)?)),
            None => Err(anyhow!("RRRPAY_RATE_URL or RRRPAY_FIXED_RATE must be set")),
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            ToolsConfig::from_lookup(lookup(&[("RRRPAY_RECIPIENT", "11111111111111111111111111111112")]))
                .unwrap();
        assert_eq!(config.token_mint.to_base58(), USDC_MINT);
        assert_eq!(config.token_decimals, 6);
        assert_eq!(config.rate_source, None);
        assert!(config.rate_provider().is_err());

        let payment = config.payment_config();
        assert_eq!(payment.retry.max_attempts, 10);
        assert_eq!(payment.retry.delay, Duration::from_secs(2));
        assert_eq!(payment.attempt_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = ToolsConfig::from_lookup(lookup(&[
            ("RRRPAY_RECIPIENT", "11111111111111111111111111111112"),
            ("RRRPAY_FIXED_RATE", "1600"),
            ("RRRPAY_MAX_ATTEMPTS", "3"),
            ("RRRPAY_RETRY_DELAY_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(config.rate_source, Some(RateSource::Fixed(Decimal::new(1600, 0))));
        assert_eq!(config.payment_config().retry.max_attempts, 3);
        assert!(config.rate_provider().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        assert!(ToolsConfig::from_lookup(lookup(&[])).is_err());
        assert!(ToolsConfig::from_lookup(lookup(&[("RRRPAY_RECIPIENT", "nope")])).is_err());
        assert!(ToolsConfig::from_lookup(lookup(&[
            ("RRRPAY_RECIPIENT", "11111111111111111111111111111112"),
            ("RRRPAY_MAX_ATTEMPTS", "many"),
        ]))
        .is_err());
    }
}
