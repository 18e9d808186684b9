//! Transfer locator and validator
//!
//! Drives one verification attempt through
//! `Searching -> Found -> Validating -> {Confirmed, Rejected}`.
//!
//! Ledger indexing lags behind submission, so `Searching` is retried a bounded
//! number of times with a fixed delay. A body that fails to load also consumes
//! an attempt and sends the machine back to `Searching`. The loop returns as
//! soon as a terminal state is reached.

use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Ledger, LedgerTransfer, LookupOutcome, OverpaymentPolicy, PaymentConfig, PaymentReference,
    TokenAmount,
};

/// Which validation check a located transaction failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    /// The transaction executed with an error
    ///
    /// The search loop skips failed bodies, so only direct callers of
    /// [`TransferLocator::validate`] see this.
    Failed,
    /// The reference key is not among the transaction's accounts
    Reference,
    /// No token balance of the configured recipient went up
    Recipient,
    /// The recipient was credited, but in another token
    Token,
    /// Wrong amount after truncation to the encoding precision
    Amount {
        expected: TokenAmount,
        actual: TokenAmount,
    },
    /// A memo was recorded and differs from the bound one
    Memo { recorded: String },
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::Failed => write!(f, "transaction failed on chain"),
            MismatchKind::Reference => write!(f, "reference key not in transaction"),
            MismatchKind::Recipient => write!(f, "recipient not credited"),
            MismatchKind::Token => write!(f, "wrong token"),
            MismatchKind::Amount { expected, actual } => {
                write!(f, "amount {} does not settle {}", actual, expected)
            }
            MismatchKind::Memo { recorded } => write!(f, "memo mismatch: {:?}", recorded),
        }
    }
}

/// Why a verification attempt ended unverified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The attempt cap ran out before a transaction validated
    NotFound { attempts: u32 },
    /// A transaction was located but failed validation
    Mismatch {
        signature: String,
        kind: MismatchKind,
    },
    /// The caller abandoned the attempt
    Cancelled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotFound { attempts } => {
                write!(f, "no matching transfer after {} attempts", attempts)
            }
            RejectReason::Mismatch { signature, kind } => write!(f, "{} ({})", kind, signature),
            RejectReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// States of one verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Searching {
        attempt: u32,
    },
    Found {
        attempt: u32,
        signature: String,
    },
    Validating {
        attempt: u32,
        transfer: LedgerTransfer,
    },
    Confirmed {
        signature: String,
        /// Amount credited to the recipient, at the encoding precision
        amount: TokenAmount,
        /// Unix seconds, when the ledger reports it
        block_time: Option<i64>,
    },
    Rejected(RejectReason),
}

/// Locates and validates the transfer for one payment reference
pub struct TransferLocator<L> {
    ledger: L,
    config: PaymentConfig,
}

impl<L: Ledger> TransferLocator<L> {
    pub fn new(ledger: L, config: PaymentConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Run the state machine to a terminal state
    ///
    /// Returns `Confirmed` or `Rejected`. Cancelling `cancel` stops further
    /// ledger calls and yields `Rejected(Cancelled)`.
    pub async fn locate(
        &self,
        reference: &PaymentReference,
        expected: TokenAmount,
        cancel: &CancellationToken,
    ) -> VerificationState {
        let mut state = VerificationState::Searching { attempt: 1 };

        loop {
            state = match state {
                VerificationState::Searching { attempt } => {
                    debug!(reference = %reference.key(), attempt, "searching ledger");

                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return cancelled(reference),
                        outcome = self.ledger.find_signature(reference.key()) => outcome,
                    };

                    match outcome {
                        LookupOutcome::Found(signature) => {
                            VerificationState::Found { attempt, signature }
                        }
                        LookupOutcome::NotFoundYet => self.next_attempt(attempt, cancel).await,
                        LookupOutcome::TransientError(e) => {
                            warn!(reference = %reference.key(), attempt, error = %e, "transient lookup error");
                            self.next_attempt(attempt, cancel).await
                        }
                    }
                }

                VerificationState::Found { attempt, signature } => {
                    let fetched = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return cancelled(reference),
                        fetched = self.ledger.fetch_transfer(&signature) => fetched,
                    };

                    match fetched {
                        Ok(Some(transfer)) if transfer.failed => {
                            // a failed transaction moved nothing, keep looking
                            debug!(%signature, attempt, "located transaction failed on chain");
                            self.next_attempt(attempt, cancel).await
                        }
                        Ok(Some(transfer)) => VerificationState::Validating { attempt, transfer },
                        Ok(None) => {
                            debug!(%signature, attempt, "transaction body not visible yet");
                            self.next_attempt(attempt, cancel).await
                        }
                        Err(e) => {
                            warn!(%signature, attempt, error = %e, "failed to fetch transaction");
                            self.next_attempt(attempt, cancel).await
                        }
                    }
                }

                VerificationState::Validating { transfer, .. } => {
                    match self.validate(&transfer, reference, expected) {
                        Ok(amount) => {
                            info!(
                                reference = %reference.key(),
                                signature = %transfer.signature,
                                %amount,
                                "payment confirmed"
                            );
                            VerificationState::Confirmed {
                                signature: transfer.signature,
                                amount,
                                block_time: transfer.block_time,
                            }
                        }
                        Err(kind) => VerificationState::Rejected(RejectReason::Mismatch {
                            signature: transfer.signature,
                            kind,
                        }),
                    }
                }

                terminal => return terminal,
            };
        }
    }

    /// Sleep out the retry delay and search again, or give up at the cap
    async fn next_attempt(&self, attempt: u32, cancel: &CancellationToken) -> VerificationState {
        if attempt >= self.config.retry.max_attempts {
            return VerificationState::Rejected(RejectReason::NotFound { attempts: attempt });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => VerificationState::Rejected(RejectReason::Cancelled),
            _ = tokio::time::sleep(self.config.retry.delay) => {
                VerificationState::Searching { attempt: attempt + 1 }
            }
        }
    }

    /// Check a located transaction against the reference
    ///
    /// Order: execution status, reference tag, recipient, token, amount, memo.
    /// Returns the credited amount at the encoding precision.
    pub fn validate(
        &self,
        transfer: &LedgerTransfer,
        reference: &PaymentReference,
        expected: TokenAmount,
    ) -> Result<TokenAmount, MismatchKind> {
        if transfer.failed {
            return Err(MismatchKind::Failed);
        }
        if !transfer.carries_reference(reference.key()) {
            return Err(MismatchKind::Reference);
        }

        let to_recipient: Vec<_> = transfer
            .credits
            .iter()
            .filter(|c| c.owner == self.config.recipient)
            .collect();
        if to_recipient.is_empty() {
            return Err(MismatchKind::Recipient);
        }

        let mut units: u64 = 0;
        let mut matched = false;
        for credit in to_recipient.iter().filter(|c| c.mint == self.config.token_mint) {
            // overflow saturates
            let truncated = credit
                .amount
                .truncate_to(expected.decimals())
                .map(|a| a.units())
                .unwrap_or(u64::MAX);
            units = units.saturating_add(truncated);
            matched = true;
        }
        if !matched {
            return Err(MismatchKind::Token);
        }

        let actual = TokenAmount::from_units(units, expected.decimals())
            .map_err(|_| MismatchKind::Amount { expected, actual: expected })?;

        let settles = match self.config.overpayment {
            OverpaymentPolicy::Accept => actual.units() >= expected.units(),
            OverpaymentPolicy::Reject => actual.units() == expected.units(),
        };
        if !settles {
            return Err(MismatchKind::Amount { expected, actual });
        }

        if let Some(recorded) = &transfer.memo {
            if recorded != reference.memo() {
                return Err(MismatchKind::Memo {
                    recorded: recorded.clone(),
                });
            }
        }

        Ok(actual)
    }
}

fn cancelled(reference: &PaymentReference) -> VerificationState {
    debug!(reference = %reference.key(), "verification cancelled");
    VerificationState::Rejected(RejectReason::Cancelled)
}
