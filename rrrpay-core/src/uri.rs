//! Payment request URI generation and parsing
//!
//! ## URI Format
//!
//! ```text
//! solana:<recipient>?amount=1.250000&spl-token=<mint>&reference=<key>&memo=Remita%20Invoice
//! ```
//!
//! The amount is always rendered at the token's full fixed precision. Parsing
//! accepts `token=` as an alias for `spl-token=`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::{Error, LedgerAddress, ReferenceKey, Result, TokenAmount};

/// The canonical tuple a payer's wallet needs to build the transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub recipient: LedgerAddress,
    pub amount: TokenAmount,
    pub token_mint: LedgerAddress,
    pub reference: ReferenceKey,
    pub memo: String,
}

impl PaymentRequest {
    /// Generate the full URI string under `scheme`
    pub fn to_uri(&self, scheme: &str) -> String {
        let memo = utf8_percent_encode(&self.memo, NON_ALPHANUMERIC);
        format!(
            "{}:{}?amount={}&spl-token={}&reference={}&memo={}",
            scheme, self.recipient, self.amount, self.token_mint, self.reference, memo
        )
    }

    /// Parse a payment request URI whose amount uses at most `decimals` fractional digits
    pub fn parse(uri_str: &str, scheme: &str, decimals: u8) -> Result<Self> {
        let url = url::Url::parse(uri_str)?;

        // url lowercases the scheme it parses
        if !url.scheme().eq_ignore_ascii_case(scheme) {
            return Err(Error::InvalidUri(format!(
                "Scheme must be {}, got {}",
                scheme,
                url.scheme()
            )));
        }

        let recipient = LedgerAddress::parse(url.path())
            .map_err(|e| Error::InvalidUri(format!("Invalid recipient: {}", e)))?;

        let query = url.query().ok_or(Error::MissingParameter("query"))?;

        let mut amount: Option<&str> = None;
        let mut token: Option<&str> = None;
        let mut reference: Option<&str> = None;
        let mut memo: Option<String> = None;

        for param in query.split('&') {
            let mut parts = param.splitn(2, '=');
            let name = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("");

            match name {
                "amount" => amount = Some(value),
                "spl-token" | "token" => token = Some(value),
                "reference" => {
                    if reference.is_some() {
                        return Err(Error::InvalidUri("Multiple references".to_string()));
                    }
                    reference = Some(value);
                }
                "memo" => {
                    let decoded = percent_decode_str(value)
                        .decode_utf8()
                        .map_err(|e| Error::InvalidUri(format!("Invalid memo encoding: {}", e)))?;
                    memo = Some(decoded.into_owned());
                }
                _ => {
                    // label, message and other optional fields carry nothing we verify
                }
            }
        }

        let amount = TokenAmount::parse(amount.ok_or(Error::MissingParameter("amount"))?, decimals)?;
        let token_mint = LedgerAddress::parse(token.ok_or(Error::MissingParameter("spl-token"))?)
            .map_err(|e| Error::InvalidUri(format!("Invalid token mint: {}", e)))?;
        let reference = reference
            .ok_or(Error::MissingParameter("reference"))?
            .parse::<ReferenceKey>()
            .map_err(|e| Error::InvalidUri(format!("Invalid reference: {}", e)))?;
        let memo = memo.ok_or(Error::MissingParameter("memo"))?;

        Ok(Self {
            recipient,
            amount,
            token_mint,
            reference,
            memo,
        })
    }
}
