//! End-to-end tests: a `BridgeClient` in an embedded frame talking to a
//! `BridgeProvider` in its parent, over in-process `LocalWindow`s.
//!
//! Run with:
//! ```bash
//! cargo test --test bridge_native
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Notify};
use tokio_test::{assert_err, assert_ok};

use wallet_bridge::prelude::*;

const WALLET_ORIGIN: &str = "https://wallet.example";
const LENDER_ORIGIN: &str = "https://lend.example";
const EVIL_ORIGIN: &str = "https://evil.example";

const PUBLIC_KEY: &str = "02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc";
const DERIVATION_PATH: &str = "m/84'/0'/0'/0/0";
const BITCOIN_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
const POLYGON_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
const NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
const API_KEY: &str = "lk_test_4f3c2a";

const SLOW_PSBT: &str = "slow";
const REJECTED_PSBT: &str = "reject";

// ─── Test wallet ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct TestWallet {
    calls: Arc<AtomicUsize>,
}

impl TestWallet {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WalletHandler for TestWallet {
    async fn get_public_key(&self) -> Result<String, WalletError> {
        self.record();
        Ok(PUBLIC_KEY.into())
    }

    async fn get_derivation_path(&self) -> Result<String, WalletError> {
        self.record();
        Ok(DERIVATION_PATH.into())
    }

    async fn get_address(
        &self,
        address_type: AddressType,
        asset: Option<LoanAsset>,
    ) -> Result<Option<String>, WalletError> {
        self.record();
        Ok(match (address_type, asset) {
            (AddressType::Bitcoin, _) => Some(BITCOIN_ADDRESS.into()),
            (AddressType::LoanAsset, Some(LoanAsset::UsdcPol | LoanAsset::UsdtPol)) => {
                Some(POLYGON_ADDRESS.into())
            }
            (AddressType::LoanAsset, _) => None,
        })
    }

    async fn sign_psbt(&self, psbt: String) -> Result<String, WalletError> {
        self.record();
        match psbt.as_str() {
            REJECTED_PSBT => Err(WalletError::user_rejected("user rejected")),
            SLOW_PSBT => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(format!("signed:{psbt}"))
            }
            _ => Ok(format!("signed:{psbt}")),
        }
    }

    async fn get_npub(&self) -> Result<String, WalletError> {
        self.record();
        Ok(NPUB.into())
    }

    async fn get_api_key(&self) -> Result<String, WalletError> {
        self.record();
        Ok(API_KEY.into())
    }

    async fn get_capabilities(&self) -> Result<WalletCapabilities, WalletError> {
        self.record();
        Ok(WalletCapabilities {
            can_send_bitcoin: true,
            can_sign_psbt: true,
            receivable_loan_assets: vec![LoanAsset::UsdcPol, LoanAsset::UsdtPol],
            sendable_loan_assets: vec![LoanAsset::UsdcPol],
            has_nostr_identity: true,
        })
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

struct Bridge {
    wallet: LocalWindow,
    frame: LocalWindow,
    handler: TestWallet,
    provider: BridgeProvider<LocalWindow>,
    client: BridgeClient<LocalWindow>,
}

fn allow_lender() -> ProviderConfig {
    ProviderConfig::new(AllowedOrigins::list([LENDER_ORIGIN]))
}

/// Wallet window with the lender embedded, provider listening for that frame only.
fn bridge(client_config: ClientConfig) -> Bridge {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let frame = LocalWindow::embedded(&wallet, LENDER_ORIGIN).unwrap();
    let handler = TestWallet::default();

    let provider = BridgeProvider::new(wallet.clone(), handler.clone(), allow_lender());
    provider
        .listen(Some(Arc::new(wallet.frame(&frame))))
        .expect("listen");
    let client = BridgeClient::in_frame(frame.clone(), client_config).expect("client");

    Bridge {
        wallet,
        frame,
        handler,
        provider,
        client,
    }
}

fn pinned() -> ClientConfig {
    ClientConfig::default().target_origin(WALLET_ORIGIN)
}

fn short_timeout() -> ClientConfig {
    ClientConfig::default().timeout_ms(200)
}

// ─── Round trips ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_operation_round_trips() {
    let b = bridge(pinned());

    assert_eq!(assert_ok!(b.client.get_public_key().await), PUBLIC_KEY);
    assert_eq!(assert_ok!(b.client.get_derivation_path().await), DERIVATION_PATH);
    assert_eq!(
        assert_ok!(b.client.get_address(AddressType::Bitcoin, None).await),
        Some(BITCOIN_ADDRESS.to_string())
    );
    assert_eq!(assert_ok!(b.client.get_npub().await), NPUB);
    assert_eq!(
        assert_ok!(b.client.sign_psbt("cHNidP8BAHECAAAAAQ").await),
        "signed:cHNidP8BAHECAAAAAQ"
    );
    assert_eq!(assert_ok!(b.client.get_api_key().await), API_KEY);

    let capabilities = assert_ok!(b.client.get_capabilities().await);
    assert!(capabilities.can_sign_psbt);
    assert!(capabilities.supports_receiving(LoanAsset::UsdtPol));
    assert!(!capabilities.supports_sending(LoanAsset::UsdtPol));

    assert_eq!(b.handler.calls(), 7);
    assert_eq!(b.client.pending_count(), 0);
}

#[tokio::test]
async fn test_loan_asset_address_and_fiat_null() {
    let b = bridge(pinned());

    let address = assert_ok!(
        b.client
            .get_address(AddressType::LoanAsset, Some(LoanAsset::UsdcPol))
            .await
    );
    assert_eq!(address.as_deref(), Some(POLYGON_ADDRESS));

    let address = assert_ok!(
        b.client
            .get_address(AddressType::LoanAsset, Some(LoanAsset::Usd))
            .await
    );
    assert_eq!(address, None);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_out_of_order() {
    let b = bridge(pinned());

    let slow = assert_ok!(b.client.start(RequestBody::SignPsbt {
        psbt: SLOW_PSBT.into()
    }));
    let fast = assert_ok!(b.client.start(RequestBody::GetPublicKey));
    assert_ne!(slow.id(), fast.id());

    let fast_body = assert_ok!(fast.response().await);
    assert_eq!(
        fast_body,
        ResponseBody::PublicKeyResponse {
            public_key: PUBLIC_KEY.into()
        }
    );
    // The slow signature is still outstanding.
    assert_eq!(b.client.pending_count(), 1);

    let slow_body = assert_ok!(slow.response().await);
    assert_eq!(
        slow_body,
        ResponseBody::PsbtSigned {
            signed_psbt: format!("signed:{SLOW_PSBT}")
        }
    );
    assert_eq!(b.client.pending_count(), 0);
}

/// Holds `GET_PUBLIC_KEY` until a `SIGN_PSBT` has been signed.
struct SignFirstWallet {
    signed: Arc<Notify>,
}

#[async_trait]
impl WalletHandler for SignFirstWallet {
    async fn get_public_key(&self) -> Result<String, WalletError> {
        self.signed.notified().await;
        Ok(PUBLIC_KEY.into())
    }

    async fn get_derivation_path(&self) -> Result<String, WalletError> {
        Ok(DERIVATION_PATH.into())
    }

    async fn get_address(
        &self,
        _address_type: AddressType,
        _asset: Option<LoanAsset>,
    ) -> Result<Option<String>, WalletError> {
        Ok(None)
    }

    async fn sign_psbt(&self, psbt: String) -> Result<String, WalletError> {
        self.signed.notify_one();
        Ok(format!("signed:{psbt}"))
    }
}

#[tokio::test]
async fn test_later_request_answered_first() {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let frame = LocalWindow::embedded(&wallet, LENDER_ORIGIN).unwrap();
    let provider = BridgeProvider::new(
        wallet.clone(),
        SignFirstWallet {
            signed: Arc::new(Notify::new()),
        },
        allow_lender(),
    );
    provider.listen(Some(Arc::new(wallet.frame(&frame)))).unwrap();

    // Record response tags in the order the frame receives them.
    let (tx, mut arrivals) = mpsc::unbounded_channel();
    let _recorder = frame
        .add_listener(Arc::new(move |event: MessageEvent| {
            if let Some(tag) = event.data.get("type").and_then(|t| t.as_str()) {
                let _ = tx.send(tag.to_string());
            }
        }))
        .unwrap();

    let client = BridgeClient::in_frame(frame.clone(), pinned()).unwrap();
    let public_key = assert_ok!(client.start(RequestBody::GetPublicKey));
    let signature = assert_ok!(client.start(RequestBody::SignPsbt {
        psbt: "cHNidP8B".into()
    }));

    assert_eq!(
        assert_ok!(public_key.response().await),
        ResponseBody::PublicKeyResponse {
            public_key: PUBLIC_KEY.into()
        }
    );
    assert_eq!(
        assert_ok!(signature.response().await),
        ResponseBody::PsbtSigned {
            signed_psbt: "signed:cHNidP8B".into()
        }
    );

    assert_eq!(arrivals.recv().await.as_deref(), Some("PSBT_SIGNED"));
    assert_eq!(arrivals.recv().await.as_deref(), Some("PUBLIC_KEY_RESPONSE"));
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_handler_rejection_reaches_caller() {
    let b = bridge(pinned());

    let err = assert_err!(b.client.sign_psbt(REJECTED_PSBT).await);
    assert_eq!(err.to_string(), "user rejected");
    assert_eq!(err.code(), ErrorCode::UserRejected);

    // Later calls are unaffected.
    assert_ok!(b.client.get_public_key().await);
}

#[tokio::test]
async fn test_unimplemented_operation_is_unsupported() {
    let b = bridge(pinned());

    let err = assert_err!(b.client.sign_message("hello").await);
    assert!(matches!(
        err,
        BridgeError::Remote {
            code: ErrorCode::Unsupported,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    // A parent with no provider never answers.
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let frame = LocalWindow::embedded(&wallet, LENDER_ORIGIN).unwrap();
    let client = BridgeClient::in_frame(frame, short_timeout()).unwrap();

    let started = Instant::now();
    let err = assert_err!(client.get_public_key().await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(350), "{elapsed:?}");

    assert!(err.is_timeout());
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert!(err.to_string().contains("GET_PUBLIC_KEY"), "{err}");
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_timeout_counts_from_send() {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let frame = LocalWindow::embedded(&wallet, LENDER_ORIGIN).unwrap();
    let client = BridgeClient::in_frame(frame, ClientConfig::default().timeout_ms(100)).unwrap();

    let call = assert_ok!(client.start(RequestBody::GetPublicKey));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let awaited = Instant::now();
    let err = assert_err!(call.response().await);
    assert!(awaited.elapsed() < Duration::from_millis(50), "{:?}", awaited.elapsed());
    assert!(err.is_timeout());
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_top_level_page_has_no_parent() {
    let page = LocalWindow::new(LENDER_ORIGIN).unwrap();
    let client = BridgeClient::in_frame(page, ClientConfig::default()).unwrap();

    let err = assert_err!(client.get_npub().await);
    assert!(matches!(err, BridgeError::NoParentFrame(Operation::GetNpub)));
}

// ─── Origin + source isolation ───────────────────────────────────────────────

#[tokio::test]
async fn test_disallowed_origin_is_never_answered() {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let evil = LocalWindow::embedded(&wallet, EVIL_ORIGIN).unwrap();
    let handler = TestWallet::default();

    let provider = BridgeProvider::new(wallet.clone(), handler.clone(), allow_lender());
    provider.listen(None).unwrap();

    let client = BridgeClient::in_frame(evil, short_timeout()).unwrap();
    let err = assert_err!(client.get_public_key().await);
    assert!(err.is_timeout());
    assert_eq!(handler.calls(), 0);
}

#[tokio::test]
async fn test_other_frame_of_allowed_origin_is_ignored() {
    let b = bridge(short_timeout());
    let sibling = LocalWindow::embedded(&b.wallet, LENDER_ORIGIN).unwrap();
    let sibling_client = BridgeClient::in_frame(sibling, short_timeout()).unwrap();

    let err = assert_err!(sibling_client.get_public_key().await);
    assert!(err.is_timeout());
    assert_eq!(b.handler.calls(), 0);

    assert_ok!(b.client.get_public_key().await);
    assert_eq!(b.handler.calls(), 1);
}

#[tokio::test]
async fn test_pinned_target_origin_mismatch_is_dropped() {
    let b = bridge(
        ClientConfig::default()
            .target_origin("https://not-the-wallet.example")
            .timeout_ms(200),
    );

    let err = assert_err!(b.client.get_public_key().await);
    assert!(err.is_timeout());
    assert_eq!(b.handler.calls(), 0);
}

#[tokio::test]
async fn test_opaque_origin_frame_gets_wildcard_reply() {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let sandboxed = LocalWindow::embedded(&wallet, "null").unwrap();

    let provider = BridgeProvider::new(
        wallet.clone(),
        TestWallet::default(),
        ProviderConfig::new(AllowedOrigins::any()),
    );
    provider.listen(None).unwrap();

    let client = BridgeClient::in_frame(sandboxed, ClientConfig::default()).unwrap();
    assert_eq!(assert_ok!(client.get_npub().await), NPUB);
}

#[tokio::test]
async fn test_response_from_non_parent_window_is_ignored() {
    let wallet = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let frame = LocalWindow::embedded(&wallet, LENDER_ORIGIN).unwrap();
    // Same origin as the wallet, but a different window.
    let impostor = LocalWindow::new(WALLET_ORIGIN).unwrap();
    let client = BridgeClient::in_frame(frame.clone(), pinned()).unwrap();

    let call = assert_ok!(client.start(RequestBody::GetApiKey));
    let forged = json!({ "type": "API_KEY_RESPONSE", "id": call.id().as_str(), "apiKey": "forged" });
    assert_ok!(impostor.frame(&frame).post_message(&forged, "*"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.pending_count(), 1);
    assert!(client.cancel(call.id()));
}

#[tokio::test]
async fn test_foreign_messages_are_ignored() {
    let b = bridge(pinned());
    let to_frame = b.wallet.frame(&b.frame);

    let call = assert_ok!(b.client.start(RequestBody::GetDerivationPath));
    for junk in [
        json!("hello"),
        json!({ "type": "WEBPACK_HOT_UPDATE" }),
        json!({ "type": "PUBLIC_KEY_RESPONSE", "id": "unknown-id", "publicKey": "00" }),
        json!({ "id": call.id().as_str() }),
    ] {
        assert_ok!(to_frame.post_message(&junk, "*"));
    }

    let body = assert_ok!(call.response().await);
    assert_eq!(
        body,
        ResponseBody::DerivationPathResponse {
            path: DERIVATION_PATH.into()
        }
    );
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_destroy_rejects_in_flight_calls() {
    let b = bridge(pinned());
    assert_eq!(b.frame.listener_count(), 1);

    let call = assert_ok!(b.client.start(RequestBody::SignPsbt {
        psbt: SLOW_PSBT.into()
    }));
    b.client.destroy();
    b.client.destroy();

    assert_eq!(b.frame.listener_count(), 0);
    assert!(matches!(call.response().await, Err(BridgeError::Destroyed)));
    assert!(matches!(
        b.client.get_public_key().await,
        Err(BridgeError::Destroyed)
    ));
}

#[tokio::test]
async fn test_provider_destroy_stops_answering() {
    let b = bridge(short_timeout());
    assert_ok!(b.client.get_public_key().await);
    assert_eq!(b.wallet.listener_count(), 1);

    b.provider.destroy();
    b.provider.destroy();
    assert_eq!(b.wallet.listener_count(), 0);

    let err = assert_err!(b.client.get_public_key().await);
    assert!(err.is_timeout());
    assert_eq!(b.handler.calls(), 1);
}

#[tokio::test]
async fn test_cancel_leaves_other_calls_running() {
    let b = bridge(pinned());

    let cancelled = assert_ok!(b.client.start(RequestBody::SignPsbt {
        psbt: SLOW_PSBT.into()
    }));
    let kept = assert_ok!(b.client.start(RequestBody::GetNpub));
    let id = cancelled.id().clone();

    assert!(b.client.cancel(&id));
    assert!(matches!(
        cancelled.response().await,
        Err(BridgeError::Cancelled(cancelled_id)) if cancelled_id == id
    ));
    assert_eq!(
        assert_ok!(kept.response().await),
        ResponseBody::NpubResponse { npub: NPUB.into() }
    );
}
