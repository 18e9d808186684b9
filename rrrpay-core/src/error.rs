//! Error types for the payment-reference lifecycle

use thiserror::Error;

/// Result type alias for rrrpay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while creating, encoding or verifying a payment reference
#[derive(Debug, Error)]
pub enum Error {
    /// The quote service was unreachable or returned an unusable rate
    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),

    /// Fiat amount is negative, non-finite or out of range
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount has more fractional digits than the token supports
    #[error("Amount has too many decimal places (max {max}): {amount}")]
    TooManyDecimalPlaces { amount: String, max: u8 },

    /// Memo is empty or otherwise unusable
    #[error("Invalid memo: {0}")]
    InvalidMemo(String),

    /// Address is not a canonical 32-byte base58 key
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Building the request URI or rasterizing it failed
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// Invalid payment request URI
    #[error("Invalid URI format: {0}")]
    InvalidUri(String),

    /// Missing required URI parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Network or ledger timeout during a lookup
    #[error("Transient lookup error: {0}")]
    TransientLookup(String),

    /// The reference already carries a transaction signature
    #[error("Reference already bound to transaction {0}")]
    SignatureAlreadySet(String),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientLookup(_) | Error::RateUnavailable(_))
    }

    /// Whether the error points at operator setup rather than a payer or network problem
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::EncodingFailure(_) | Error::InvalidAddress(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::TransientLookup(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::TransientLookup("timeout".into()).is_transient());
        assert!(Error::RateUnavailable("503".into()).is_transient());
        assert!(!Error::InvalidAmount("-1".into()).is_transient());

        assert!(Error::EncodingFailure("bad scheme".into()).is_configuration());
        assert!(Error::InvalidAddress("short".into()).is_configuration());
        assert!(!Error::TransientLookup("timeout".into()).is_configuration());
    }
}
