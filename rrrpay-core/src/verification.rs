//! Verification result assembly
//!
//! Every terminal state and every error collapses into one
//! [`PaymentVerification`] so the presentation layer renders a single branch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::locator::{RejectReason, VerificationState};
use crate::Result;

/// Outcome of one verification attempt as shown to the payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<String>,
    /// Settled token amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PaymentVerification {
    /// The unverified result
    pub fn unverified() -> Self {
        Self {
            verified: false,
            transaction_signature: None,
            amount: None,
            timestamp: None,
        }
    }
}

/// Map a terminal locator state to the result
pub fn assemble(state: VerificationState) -> PaymentVerification {
    match state {
        VerificationState::Confirmed {
            signature, amount, ..
        } if !signature.is_empty() => {
            info!(%signature, %amount, "verification succeeded");
            PaymentVerification {
                verified: true,
                transaction_signature: Some(signature),
                amount: Some(amount.to_decimal()),
                timestamp: Some(Utc::now()),
            }
        }
        VerificationState::Confirmed { .. } => {
            warn!("confirmed state without a signature");
            PaymentVerification::unverified()
        }
        VerificationState::Rejected(reason) => {
            match &reason {
                RejectReason::NotFound { .. } => info!(%reason, "verification not found"),
                RejectReason::Mismatch { .. } => warn!(%reason, "verification mismatch"),
                RejectReason::Cancelled => info!("verification cancelled"),
            }
            PaymentVerification::unverified()
        }
        other => {
            warn!(state = ?other, "assembled a non-terminal state");
            PaymentVerification::unverified()
        }
    }
}

/// Like [`assemble`], folding errors raised before or during location into `verified: false`
pub fn assemble_outcome(outcome: Result<VerificationState>) -> PaymentVerification {
    match outcome {
        Ok(state) => assemble(state),
        Err(e) if e.is_configuration() => {
            error!(error = %e, "verification failed, check the payment configuration");
            PaymentVerification::unverified()
        }
        Err(e) => {
            warn!(error = %e, transient = e.is_transient(), "verification failed");
            PaymentVerification::unverified()
        }
    }
}
