//! # Stablecoin settlement for RRR invoices
//!
//! Lets a payer settle a fiat-denominated Remita Retrieval Reference (RRR)
//! invoice with an SPL stable token, and lets the merchant confirm the transfer
//! on chain.
//!
//! ## Overview
//!
//! One payment attempt goes through three calls:
//! - `create_reference(memo)` fetches an on-ramp rate and binds it, with a fresh
//!   256-bit reference key, to the invoice memo
//! - `build_encoded_artifact(fiat, reference)` converts the fiat amount at the
//!   bound rate (truncated, never rounded up) and emits a payment URI and its QR
//! - `verify(reference, fiat)` searches the ledger for a transaction tagged with
//!   the reference key, retrying a bounded number of times, and checks its
//!   recipient, token, amount and memo
//!
//! ## URI Format
//!
//! ```text
//! solana:<recipient>?amount=1.250000&spl-token=<mint>&reference=<key>&memo=Remita%20Invoice%20Payment%20-%20RRR%3A%20...
//! ```
//!
//! Verification never fails with an error. Every outcome, including transport
//! failures, becomes a [`PaymentVerification`].

mod address;
pub mod amount;
mod config;
mod encoder;
mod error;
mod gateway;
mod ledger;
pub mod locator;
pub mod qr;
mod rate;
mod reference;
pub mod rpc;
mod uri;
pub mod verification;

pub use address::{LedgerAddress, ADDRESS_LEN};
pub use amount::{
    format_token_amount, FiatAmount, TokenAmount, DEFAULT_TOKEN_DECIMALS, MAX_TOKEN_DECIMALS,
};
pub use config::{
    OverpaymentPolicy, PaymentConfig, RetryPolicy, DEFAULT_ATTEMPT_TTL, DEFAULT_URI_SCHEME,
};
pub use encoder::{EncodedArtifact, RequestEncoder};
pub use error::{Error, Result};
pub use gateway::PaymentGateway;
pub use ledger::{Ledger, LedgerTransfer, LookupOutcome, TokenCredit};
pub use locator::{MismatchKind, RejectReason, TransferLocator, VerificationState};
pub use qr::{ErrorCorrection, QrFormat, QrOptions};
pub use rate::{ExchangeRate, FixedRateProvider, HttpRateProvider, RateDirection, RateProvider};
pub use reference::{Invoice, PaymentReference, ReferenceGenerator, ReferenceKey};
pub use rpc::{RpcConfig, SolanaRpcClient};
pub use uri::PaymentRequest;
pub use verification::{assemble, assemble_outcome, PaymentVerification};

/// Mainnet USDC mint, the settlement token the service was built around
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
