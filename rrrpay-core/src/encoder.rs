//! Turns a priced reference into a scannable payment request

use serde::Serialize;
use tracing::debug;

use crate::{
    qr, Error, FiatAmount, PaymentConfig, PaymentReference, PaymentRequest, Result, TokenAmount,
};

/// The displayable result of encoding a payment request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedArtifact {
    pub request: PaymentRequest,
    pub uri: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl EncodedArtifact {
    /// The QR image as a `data:image/png;base64,...` URI
    pub fn data_uri(&self) -> String {
        qr::png_data_uri(&self.png)
    }
}

/// Builds payment request URIs and their QR images from a fixed configuration
#[derive(Debug, Clone)]
pub struct RequestEncoder {
    config: PaymentConfig,
}

impl RequestEncoder {
    pub fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    /// The token amount owed for `fiat` at the reference's rate snapshot
    pub fn token_amount(&self, fiat: FiatAmount, reference: &PaymentReference) -> Result<TokenAmount> {
        TokenAmount::from_fiat(fiat, reference.rate_value(), self.config.token_decimals)
    }

    /// Price, serialize and rasterize a payment request
    pub fn encode_request(
        &self,
        fiat: FiatAmount,
        reference: &PaymentReference,
        memo: &str,
    ) -> Result<EncodedArtifact> {
        let amount = self.token_amount(fiat, reference)?;

        let request = PaymentRequest {
            recipient: self.config.recipient,
            amount,
            token_mint: self.config.token_mint,
            reference: *reference.key(),
            memo: memo.to_string(),
        };

        if self.config.uri_scheme.is_empty()
            || !self.config.uri_scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(Error::EncodingFailure(format!(
                "invalid URI scheme: {:?}",
                self.config.uri_scheme
            )));
        }

        let uri = request.to_uri(&self.config.uri_scheme);
        let png = qr::render_png_bytes(&uri, &self.config.qr)?;

        debug!(reference = %reference.key(), %amount, uri_len = uri.len(), "encoded payment request");

        Ok(EncodedArtifact { request, uri, png })
    }
}
