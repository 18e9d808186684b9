//! The three calls the presentation layer makes
//!
//! ```text
//! create_reference(memo)            -> PaymentReference
//! build_encoded_artifact(fiat, ref) -> EncodedArtifact (URI + QR)
//! verify(ref, fiat)                 -> PaymentVerification
//! ```
//!
//! The presentation layer also enforces attempt expiry: once
//! [`PaymentGateway::is_expired`] holds, it discards the reference and asks for
//! a new one.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::locator::{TransferLocator, VerificationState};
use crate::verification::{assemble_outcome, PaymentVerification};
use crate::{
    EncodedArtifact, FiatAmount, Invoice, Ledger, PaymentConfig, PaymentReference, RateProvider,
    ReferenceGenerator, RequestEncoder, Result,
};

/// Payment core wired to a rate source, a ledger and one configuration
pub struct PaymentGateway<R, L> {
    generator: ReferenceGenerator<R>,
    encoder: RequestEncoder,
    locator: TransferLocator<L>,
    config: PaymentConfig,
}

impl<R: RateProvider, L: Ledger> PaymentGateway<R, L> {
    pub fn new(rates: R, ledger: L, config: PaymentConfig) -> Self {
        Self {
            generator: ReferenceGenerator::new(rates),
            encoder: RequestEncoder::new(config.clone()),
            locator: TransferLocator::new(ledger, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Start a payment attempt bound to `memo`
    pub async fn create_reference(&self, memo: &str) -> Result<PaymentReference> {
        self.generator.create_reference(memo).await
    }

    /// Start a payment attempt for an invoice, using its standard memo
    pub async fn create_invoice_reference(&self, invoice: &Invoice) -> Result<PaymentReference> {
        self.generator.create_reference(&invoice.payment_memo()).await
    }

    /// Current token equivalent of `fiat`, for display before an attempt starts
    pub async fn quote(&self, fiat: FiatAmount) -> Result<String> {
        self.generator.quote(fiat, self.config.token_decimals).await
    }

    /// Build the payment URI and QR image for an attempt
    pub fn build_encoded_artifact(
        &self,
        fiat: FiatAmount,
        reference: &PaymentReference,
    ) -> Result<EncodedArtifact> {
        self.encoder.encode_request(fiat, reference, reference.memo())
    }

    /// Look for the attempt's transfer; never fails
    ///
    /// On success the transaction signature is recorded on `reference`.
    pub async fn verify(&self, reference: &mut PaymentReference, fiat: FiatAmount) -> PaymentVerification {
        self.verify_with_cancel(reference, fiat, &CancellationToken::new())
            .await
    }

    /// [`verify`](Self::verify), abandoning the search once `cancel` fires
    pub async fn verify_with_cancel(
        &self,
        reference: &mut PaymentReference,
        fiat: FiatAmount,
        cancel: &CancellationToken,
    ) -> PaymentVerification {
        let outcome = match self.encoder.token_amount(fiat, reference) {
            Ok(expected) => Ok(self.locator.locate(reference, expected, cancel).await),
            Err(e) => Err(e),
        };

        if let Ok(VerificationState::Confirmed { signature, .. }) = &outcome {
            if reference.signature() != Some(signature.as_str()) {
                if let Err(e) = reference.attach_signature(signature.clone()) {
                    warn!(reference = %reference.key(), error = %e, "located a second transaction");
                    return assemble_outcome(Err(e));
                }
            }
        }

        assemble_outcome(outcome)
    }

    /// Whether the attempt has outlived the configured TTL
    pub fn is_expired(&self, reference: &PaymentReference) -> bool {
        reference.is_expired(self.config.attempt_ttl)
    }

    pub fn time_remaining(&self, reference: &PaymentReference) -> Duration {
        reference.time_remaining(self.config.attempt_ttl)
    }
}
