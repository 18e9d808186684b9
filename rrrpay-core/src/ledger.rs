//! Read-only view of the ledger consumed by the transfer locator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{LedgerAddress, ReferenceKey, Result, TokenAmount};

/// Result of one search for a transaction tagged with a reference key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A transaction carrying the tag, by signature
    Found(String),
    /// Nothing indexed yet
    NotFoundYet,
    /// The lookup itself failed; try again later
    TransientError(String),
}

/// A net increase of one owner's balance of one token within a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCredit {
    /// Owner of the token account that was credited
    pub owner: LedgerAddress,
    pub mint: LedgerAddress,
    /// Balance increase at the mint's own precision
    pub amount: TokenAmount,
}

/// The parts of a confirmed transaction that validation compares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransfer {
    pub signature: String,
    /// Token balances that went up
    pub credits: Vec<TokenCredit>,
    /// Memo recorded on chain, if any
    pub memo: Option<String>,
    /// Every account key the transaction touched
    pub account_keys: Vec<LedgerAddress>,
    /// Unix seconds
    pub block_time: Option<i64>,
    /// Whether the transaction executed with an error
    pub failed: bool,
}

impl LedgerTransfer {
    /// Whether the transaction lists `reference` among its accounts
    pub fn carries_reference(&self, reference: &ReferenceKey) -> bool {
        self.account_keys.iter().any(|key| key == reference.as_address())
    }
}

/// The two idempotent reads the locator needs
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Find a transaction whose accounts include `reference`
    async fn find_signature(&self, reference: &ReferenceKey) -> LookupOutcome;

    /// Fetch and decode the transaction body for `signature`
    ///
    /// `Ok(None)` means the body is not available yet.
    async fn fetch_transfer(&self, signature: &str) -> Result<Option<LedgerTransfer>>;
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    async fn find_signature(&self, reference: &ReferenceKey) -> LookupOutcome {
        (**self).find_signature(reference).await
    }

    async fn fetch_transfer(&self, signature: &str) -> Result<Option<LedgerTransfer>> {
        (**self).fetch_transfer(signature).await
    }
}
