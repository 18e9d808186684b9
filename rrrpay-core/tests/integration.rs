//! End-to-end tests for rrrpay-core
//!
//! Drive the three gateway calls against a scripted in-memory ledger.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use rrrpay_core::{
    FiatAmount, FixedRateProvider, Invoice, Ledger, LedgerAddress, LedgerTransfer, LookupOutcome,
    PaymentConfig, PaymentGateway, PaymentRequest, ReferenceKey, Result, RetryPolicy, TokenAmount,
    TokenCredit, USDC_MINT,
};

const MERCHANT: &str = "11111111111111111111111111111112";

fn config() -> PaymentConfig {
    PaymentConfig::new(MERCHANT.parse().unwrap(), USDC_MINT.parse().unwrap())
}

/// Records the searched reference and reports a transfer from the `visible_from`th lookup on
struct ScriptedLedger {
    visible_from: u32,
    credited_units: u64,
    memo: String,
    searched: Mutex<Option<ReferenceKey>>,
    lookups: AtomicU32,
}

impl ScriptedLedger {
    fn new(visible_from: u32, credited_units: u64, memo: &str) -> Arc<Self> {
        Arc::new(Self {
            visible_from,
            credited_units,
            memo: memo.to_string(),
            searched: Mutex::new(None),
            lookups: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn find_signature(&self, reference: &ReferenceKey) -> LookupOutcome {
        *self.searched.lock().unwrap() = Some(*reference);
        let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.visible_from {
            LookupOutcome::Found("4vJ9JU1bJJE96FWSJKvHsmmFADCg4gpZQff4P3bkLKi".to_string())
        } else {
            LookupOutcome::NotFoundYet
        }
    }

    async fn fetch_transfer(&self, signature: &str) -> Result<Option<LedgerTransfer>> {
        let reference = *self.searched.lock().unwrap();
        let merchant: LedgerAddress = MERCHANT.parse()?;
        let mut account_keys = vec![merchant];
        account_keys.extend(reference.map(|r| *r.as_address()));

        Ok(Some(LedgerTransfer {
            signature: signature.to_string(),
            credits: vec![TokenCredit {
                owner: merchant,
                mint: USDC_MINT.parse()?,
                amount: TokenAmount::from_units(self.credited_units, 6)?,
            }],
            memo: Some(self.memo.clone()),
            account_keys,
            block_time: Some(1_717_000_000),
            failed: false,
        }))
    }
}

fn invoice() -> Invoice {
    Invoice::new(
        "280007021234",
        FiatAmount::new(Decimal::new(2000, 0)).unwrap(),
        "Acceptance fee",
    )
}

fn gateway(ledger: Arc<ScriptedLedger>) -> PaymentGateway<FixedRateProvider, Arc<ScriptedLedger>> {
    PaymentGateway::new(
        FixedRateProvider::new(Decimal::new(1600, 0)).unwrap(),
        ledger,
        config(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_full_payment_flow() {
    let invoice = invoice();
    let ledger = ScriptedLedger::new(3, 1_250_000, &invoice.payment_memo());
    let gateway = gateway(ledger.clone());

    let mut reference = gateway.create_invoice_reference(&invoice).await.unwrap();
    let artifact = gateway.build_encoded_artifact(invoice.amount, &reference).unwrap();

    assert!(artifact.uri.starts_with(&format!("solana:{}?amount=1.250000&", MERCHANT)));
    assert!(artifact.png.starts_with(&[0x89, 0x50, 0x4E, 0x47]));

    // what the payer's wallet sees
    let decoded = PaymentRequest::parse(&artifact.uri, "solana", 6).unwrap();
    assert_eq!(decoded.reference, *reference.key());
    assert_eq!(decoded.memo, "Remita Invoice Payment - RRR: 280007021234");

    let result = gateway.verify(&mut reference, invoice.amount).await;

    assert!(result.verified);
    assert_eq!(ledger.lookups.load(Ordering::SeqCst), 3);
    let signature = result.transaction_signature.unwrap();
    assert!(!signature.is_empty());
    assert_eq!(reference.signature(), Some(signature.as_str()));
    assert_eq!(result.amount, Some(Decimal::new(1_250_000, 6)));
}

#[tokio::test(start_paused = true)]
async fn test_one_unit_short_is_rejected() {
    let invoice = invoice();
    let ledger = ScriptedLedger::new(1, 1_249_999, &invoice.payment_memo());
    let gateway = gateway(ledger.clone());

    let mut reference = gateway.create_invoice_reference(&invoice).await.unwrap();
    let result = gateway.verify(&mut reference, invoice.amount).await;

    assert!(!result.verified);
    assert!(result.transaction_signature.is_none());
    assert!(reference.signature().is_none());
    assert_eq!(ledger.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_indexed_stops_at_cap() {
    let invoice = invoice();
    let ledger = ScriptedLedger::new(u32::MAX, 1_250_000, &invoice.payment_memo());
    let gateway = PaymentGateway::new(
        FixedRateProvider::new(Decimal::new(1600, 0)).unwrap(),
        ledger.clone(),
        config().with_retry(RetryPolicy::new(4, Duration::from_secs(2))),
    );

    let mut reference = gateway.create_invoice_reference(&invoice).await.unwrap();
    let result = gateway.verify(&mut reference, invoice.amount).await;

    assert!(!result.verified);
    assert_eq!(ledger.lookups.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_memo_of_another_invoice_is_rejected() {
    let invoice = invoice();
    let ledger = ScriptedLedger::new(1, 1_250_000, "Remita Invoice Payment - RRR: 111111111111");
    let gateway = gateway(ledger);

    let mut reference = gateway.create_invoice_reference(&invoice).await.unwrap();
    assert!(!gateway.verify(&mut reference, invoice.amount).await.verified);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_attempt_is_unverified() {
    let invoice = invoice();
    let ledger = ScriptedLedger::new(u32::MAX, 1_250_000, &invoice.payment_memo());
    let gateway = gateway(ledger.clone());
    let mut reference = gateway.create_invoice_reference(&invoice).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let result = gateway
        .verify_with_cancel(&mut reference, invoice.amount, &cancel)
        .await;

    assert!(!result.verified);
    // lookups at t=0, 2 and 4, cancelled during the next delay
    assert_eq!(ledger.lookups.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_references_are_independent() {
    let invoice = invoice();
    let gateway = gateway(ScriptedLedger::new(1, 1_250_000, &invoice.payment_memo()));

    let a = gateway.create_invoice_reference(&invoice).await.unwrap();
    let b = gateway.create_invoice_reference(&invoice).await.unwrap();
    assert_ne!(a.key(), b.key());

    let uri_a = gateway.build_encoded_artifact(invoice.amount, &a).unwrap().uri;
    let uri_b = gateway.build_encoded_artifact(invoice.amount, &b).unwrap().uri;
    assert_ne!(uri_a, uri_b);
}
