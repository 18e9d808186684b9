//! JSON-RPC ledger client
//!
//! Finds reference-tagged transactions with `getSignaturesForAddress` and
//! decodes their token movements from `getTransaction` in `jsonParsed` form.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    Error, Ledger, LedgerAddress, LedgerTransfer, LookupOutcome, ReferenceKey, Result, TokenAmount,
    TokenCredit,
};

/// Commitment level used for every read
pub const DEFAULT_COMMITMENT: &str = "confirmed";

/// Upper bound on signatures fetched per lookup
const SIGNATURE_PAGE_LIMIT: u32 = 1000;

/// Program name the RPC node reports for memo instructions
const MEMO_PROGRAM: &str = "spl-memo";

/// Ledger RPC endpoint configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Server URL (e.g., "https://api.mainnet-beta.solana.com")
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub commitment: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            timeout: Duration::from_secs(15),
            commitment: DEFAULT_COMMITMENT.to_string(),
        }
    }
}

impl RpcConfig {
    /// Use a custom server URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP JSON-RPC client for the ledger
#[derive(Clone)]
pub struct SolanaRpcClient {
    config: RpcConfig,
    client: reqwest::Client,
}

impl SolanaRpcClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::EncodingFailure(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.config.url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::TransientLookup(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: RpcResponse<T> = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(Error::TransientLookup(format!(
                "{} failed with {}: {}",
                method, err.code, err.message
            )));
        }
        Ok(envelope.result)
    }

    async fn signatures_for(&self, reference: &ReferenceKey) -> Result<Vec<SignatureInfo>> {
        let params = json!([
            reference.to_base58(),
            { "commitment": self.config.commitment, "limit": SIGNATURE_PAGE_LIMIT }
        ]);
        Ok(self
            .call::<Vec<SignatureInfo>>("getSignaturesForAddress", params)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl Ledger for SolanaRpcClient {
    async fn find_signature(&self, reference: &ReferenceKey) -> LookupOutcome {
        match self.signatures_for(reference).await {
            Ok(signatures) => match select_signature(&signatures) {
                Some(signature) => LookupOutcome::Found(signature),
                None => LookupOutcome::NotFoundYet,
            },
            Err(e) => {
                warn!(reference = %reference, error = %e, "signature lookup failed");
                LookupOutcome::TransientError(e.to_string())
            }
        }
    }

    async fn fetch_transfer(&self, signature: &str) -> Result<Option<LedgerTransfer>> {
        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "commitment": self.config.commitment,
                "maxSupportedTransactionVersion": 0
            }
        ]);

        match self.call::<RpcTransaction>("getTransaction", params).await? {
            Some(tx) => decode_transaction(signature, tx).map(Some),
            None => {
                debug!(%signature, "transaction body not available yet");
                Ok(None)
            }
        }
    }
}

/// Pick the oldest successful signature
///
/// Nodes return signatures newest first. Failed transactions moved no funds,
/// so a list holding only those counts as nothing recorded yet.
pub fn select_signature(signatures: &[SignatureInfo]) -> Option<String> {
    signatures
        .iter()
        .rev()
        .find(|s| s.err.is_none())
        .map(|s| s.signature.clone())
}

/// Decode a `jsonParsed` transaction into the fields validation compares
pub fn decode_transaction(signature: &str, tx: RpcTransaction) -> Result<LedgerTransfer> {
    let meta = tx
        .meta
        .ok_or_else(|| Error::TransientLookup(format!("transaction {} has no meta", signature)))?;

    let pre: HashMap<u32, &RpcTokenBalance> = meta
        .pre_token_balances
        .iter()
        .map(|b| (b.account_index, b))
        .collect();

    let mut credits = Vec::new();
    for post in &meta.post_token_balances {
        let Some(ref owner) = post.owner else { continue };

        let post_units = parse_units(&post.ui_token_amount.amount)?;
        let pre_units = match pre.get(&post.account_index) {
            Some(b) => parse_units(&b.ui_token_amount.amount)?,
            None => 0,
        };

        if post_units > pre_units {
            credits.push(TokenCredit {
                owner: LedgerAddress::parse(owner)?,
                mint: LedgerAddress::parse(&post.mint)?,
                amount: TokenAmount::from_units(post_units - pre_units, post.ui_token_amount.decimals)?,
            });
        }
    }

    let message = &tx.transaction.message;
    let account_keys = message
        .account_keys
        .iter()
        .map(|k| LedgerAddress::parse(k.pubkey()))
        .collect::<Result<Vec<_>>>()?;

    let memo = message
        .instructions
        .iter()
        .find(|ix| ix.program.as_deref() == Some(MEMO_PROGRAM))
        .and_then(|ix| ix.parsed.as_ref())
        .and_then(|parsed| parsed.as_str())
        .map(str::to_string);

    Ok(LedgerTransfer {
        signature: signature.to_string(),
        credits,
        memo,
        account_keys,
        block_time: tx.block_time,
        failed: meta.err.is_some(),
    })
}

fn parse_units(amount: &str) -> Result<u64> {
    amount
        .parse::<u64>()
        .map_err(|e| Error::TransientLookup(format!("malformed token amount {:?}: {}", amount, e)))
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// One entry of `getSignaturesForAddress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// `getTransaction` result in `jsonParsed` encoding
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    #[serde(default)]
    pub block_time: Option<i64>,
    pub meta: Option<RpcTransactionMeta>,
    pub transaction: RpcTransactionBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub pre_token_balances: Vec<RpcTokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<RpcTokenBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTokenBalance {
    pub account_index: u32,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: RpcUiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcUiTokenAmount {
    /// Raw base units as a decimal string
    pub amount: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransactionBody {
    pub message: RpcMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMessage {
    pub account_keys: Vec<RpcAccountKey>,
    #[serde(default)]
    pub instructions: Vec<RpcInstruction>,
}

/// Parsed messages list keys as objects, raw ones as plain strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcAccountKey {
    Parsed { pubkey: String },
    Raw(String),
}

impl RpcAccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            RpcAccountKey::Parsed { pubkey } => pubkey,
            RpcAccountKey::Raw(pubkey) => pubkey,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcInstruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYER: &str = "11111111111111111111111111111112";
    const MERCHANT: &str = "SysvarRent111111111111111111111111111111111";
    const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn reference() -> ReferenceKey {
        ReferenceKey::from_bytes([9u8; 32])
    }

    fn transfer_json(pre: &str, post: &str, err: Value) -> Value {
        json!({
            "blockTime": 1_700_000_000,
            "meta": {
                "err": err,
                "preTokenBalances": [
                    { "accountIndex": 1, "mint": USDC_MINT, "owner": PAYER,
                      "uiTokenAmount": { "amount": "5000000", "decimals": 6 } },
                    { "accountIndex": 2, "mint": USDC_MINT, "owner": MERCHANT,
                      "uiTokenAmount": { "amount": pre, "decimals": 6 } }
                ],
                "postTokenBalances": [
                    { "accountIndex": 1, "mint": USDC_MINT, "owner": PAYER,
                      "uiTokenAmount": { "amount": "3750000", "decimals": 6 } },
                    { "accountIndex": 2, "mint": USDC_MINT, "owner": MERCHANT,
                      "uiTokenAmount": { "amount": post, "decimals": 6 } }
                ]
            },
            "transaction": {
                "message": {
                    "accountKeys": [
                        { "pubkey": PAYER, "signer": true, "writable": true },
                        { "pubkey": MERCHANT, "signer": false, "writable": true },
                        { "pubkey": reference().to_base58(), "signer": false, "writable": false }
                    ],
                    "instructions": [
                        { "program": "spl-token", "parsed": { "type": "transferChecked" } },
                        { "program": "spl-memo", "parsed": "Remita Invoice Payment - RRR: 42" }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_decode_transfer() {
        let tx: RpcTransaction = serde_json::from_value(transfer_json("0", "1250000", Value::Null)).unwrap();
        let transfer = decode_transaction("sig", tx).unwrap();

        assert_eq!(transfer.credits.len(), 1);
        let credit = &transfer.credits[0];
        assert_eq!(credit.owner.to_base58(), MERCHANT);
        assert_eq!(credit.mint.to_base58(), USDC_MINT);
        assert_eq!(credit.amount.to_string(), "1.250000");
        assert_eq!(transfer.memo.as_deref(), Some("Remita Invoice Payment - RRR: 42"));
        assert!(transfer.carries_reference(&reference()));
        assert_eq!(transfer.block_time, Some(1_700_000_000));
        assert!(!transfer.failed);
    }

    #[test]
    fn test_decode_failed_transaction() {
        let err = json!({ "InstructionError": [0, "Custom"] });
        let tx: RpcTransaction = serde_json::from_value(transfer_json("10", "10", err)).unwrap();
        let transfer = decode_transaction("sig", tx).unwrap();
        assert!(transfer.failed);
        assert!(transfer.credits.is_empty());
    }

    #[test]
    fn test_select_signature_prefers_oldest_success() {
        let list: Vec<SignatureInfo> = serde_json::from_value(json!([
            { "signature": "newest", "slot": 3, "err": null },
            { "signature": "middle", "slot": 2, "err": null },
            { "signature": "oldest-failed", "slot": 1, "err": { "InstructionError": [0, "Custom"] } }
        ]))
        .unwrap();
        assert_eq!(select_signature(&list).as_deref(), Some("middle"));
        assert_eq!(select_signature(&list[2..]), None);
        assert_eq!(select_signature(&[]), None);
    }

    #[test]
    fn test_envelope_error() {
        let envelope: RpcResponse<Vec<SignatureInfo>> = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32005, "message": "Node is behind" }
        }))
        .unwrap();
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error.unwrap().code, -32005);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        let client = SolanaRpcClient::new(
            RpcConfig::default()
                .with_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap();
        assert!(matches!(
            client.find_signature(&reference()).await,
            LookupOutcome::TransientError(_)
        ));
        assert!(matches!(
            client.fetch_transfer("sig").await,
            Err(Error::TransientLookup(_))
        ));
    }
}
