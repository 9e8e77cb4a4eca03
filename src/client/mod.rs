//! `BridgeClient`: the embedded (iframe) side of the bridge.
//!
//! Each wallet operation becomes an async call that resolves with the
//! operation's payload or fails with a [`BridgeError`]. Requests are
//! correlated with responses purely by id, so concurrent calls may be
//! answered in any order.

pub mod pending;

pub use pending::PendingCall;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::error::BridgeError;
use crate::protocol::{
    AddressType, LoanAsset, Operation, Request, RequestBody, Response, ResponseBody,
    WalletCapabilities,
};
use crate::shared::{Origin, RequestId};
use crate::transport::{MessageEvent, MessageHost, MessageSink};

use pending::{outcome, PendingTable};

/// State shared between the client and its message listener.
struct ClientState {
    pending: Arc<PendingTable>,
    parent: Option<Arc<dyn MessageSink>>,
    pinned_origin: Option<Origin>,
}

impl ClientState {
    fn on_message(&self, event: MessageEvent) {
        // The channel is shared with unrelated traffic: anything that is not a
        // bridge response is ignored.
        let response: Response = match serde_json::from_value(event.data) {
            Ok(response) => response,
            Err(_) => {
                tracing::trace!("Ignoring non-bridge message from {}", event.origin);
                return;
            }
        };

        if let Some(pinned) = &self.pinned_origin {
            if &event.origin != pinned {
                tracing::debug!(
                    "Ignoring response {} from unexpected origin {}",
                    response.id,
                    event.origin
                );
                return;
            }
        }

        if let (Some(parent), Some(source)) = (&self.parent, &event.source) {
            if !parent.same_window(source.as_ref()) {
                tracing::debug!("Ignoring response {} from a window other than the parent", response.id);
                return;
            }
        }

        let settled = self
            .pending
            .settle(&response.id, |operation| outcome(operation, response.body));
        if !settled {
            tracing::trace!("No pending request for response {}", response.id);
        }
    }
}

/// Client for a wallet running in the parent frame.
///
/// Owns one message listener on `host`, attached on construction and
/// removed by [`BridgeClient::destroy`] (or on drop).
pub struct BridgeClient<H: MessageHost> {
    host: H,
    config: ClientConfig,
    state: Arc<ClientState>,
    registration: Mutex<Option<H::Registration>>,
    destroyed: AtomicBool,
}

impl<H: MessageHost> BridgeClient<H> {
    /// Create a client listening on `host` and posting to `parent`.
    ///
    /// `parent` is `None` when the page is not embedded; every call then
    /// fails immediately with [`BridgeError::NoParentFrame`].
    pub fn new(
        host: H,
        parent: Option<Arc<dyn MessageSink>>,
        config: ClientConfig,
    ) -> Result<Self, BridgeError> {
        let state = Arc::new(ClientState {
            pending: Arc::new(PendingTable::default()),
            parent,
            pinned_origin: config.pinned_origin(),
        });

        let listener_state = Arc::clone(&state);
        let registration =
            host.add_listener(Arc::new(move |event: MessageEvent| listener_state.on_message(event)))?;
        tracing::debug!(
            "Wallet bridge client listening (target origin {}, timeout {}ms)",
            config.target_origin,
            config.timeout_ms
        );

        Ok(Self {
            host,
            config,
            state,
            registration: Mutex::new(Some(registration)),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Typed operations ──────────────────────────────────────────────────

    /// Compressed public key, hex encoded (66 chars).
    pub async fn get_public_key(&self) -> Result<String, BridgeError> {
        match self.request(RequestBody::GetPublicKey).await? {
            ResponseBody::PublicKeyResponse { public_key } => Ok(public_key),
            other => Err(unexpected(Operation::GetPublicKey, &other)),
        }
    }

    /// BIP32 derivation path of the key in use, e.g. `m/84'/0'/0'/0/0`.
    pub async fn get_derivation_path(&self) -> Result<String, BridgeError> {
        match self.request(RequestBody::GetDerivationPath).await? {
            ResponseBody::DerivationPathResponse { path } => Ok(path),
            other => Err(unexpected(Operation::GetDerivationPath, &other)),
        }
    }

    /// Address of the requested kind; `None` when none applies (e.g. a fiat asset).
    pub async fn get_address(
        &self,
        address_type: AddressType,
        asset: Option<LoanAsset>,
    ) -> Result<Option<String>, BridgeError> {
        match self
            .request(RequestBody::GetAddress {
                address_type,
                asset,
            })
            .await?
        {
            ResponseBody::AddressResponse { address } => Ok(address),
            other => Err(unexpected(Operation::GetAddress, &other)),
        }
    }

    /// Nostr public key in `npub` form.
    pub async fn get_npub(&self) -> Result<String, BridgeError> {
        match self.request(RequestBody::GetNpub).await? {
            ResponseBody::NpubResponse { npub } => Ok(npub),
            other => Err(unexpected(Operation::GetNpub, &other)),
        }
    }

    /// Ask the wallet to sign a PSBT (base64 or hex); returns the signed PSBT.
    pub async fn sign_psbt(&self, psbt: &str) -> Result<String, BridgeError> {
        match self
            .request(RequestBody::SignPsbt {
                psbt: psbt.to_string(),
            })
            .await?
        {
            ResponseBody::PsbtSigned { signed_psbt } => Ok(signed_psbt),
            other => Err(unexpected(Operation::SignPsbt, &other)),
        }
    }

    pub async fn sign_message(&self, message: &str) -> Result<String, BridgeError> {
        match self
            .request(RequestBody::SignMessage {
                message: message.to_string(),
            })
            .await?
        {
            ResponseBody::MessageSigned { signature } => Ok(signature),
            other => Err(unexpected(Operation::SignMessage, &other)),
        }
    }

    pub async fn get_api_key(&self) -> Result<String, BridgeError> {
        match self.request(RequestBody::GetApiKey).await? {
            ResponseBody::ApiKeyResponse { api_key } => Ok(api_key),
            other => Err(unexpected(Operation::GetApiKey, &other)),
        }
    }

    pub async fn get_capabilities(&self) -> Result<WalletCapabilities, BridgeError> {
        match self.request(RequestBody::GetCapabilities).await? {
            ResponseBody::CapabilitiesResponse { capabilities } => Ok(capabilities),
            other => Err(unexpected(Operation::GetCapabilities, &other)),
        }
    }

    // ── Raw requests ──────────────────────────────────────────────────────

    /// Send `body` and wait for its correlated response.
    pub async fn request(&self, body: RequestBody) -> Result<ResponseBody, BridgeError> {
        self.start(body)?.response().await
    }

    /// Post `body` to the parent and return the in-flight call.
    ///
    /// The call's id can be passed to [`BridgeClient::cancel`].
    pub fn start(&self, body: RequestBody) -> Result<PendingCall, BridgeError> {
        let operation = body.operation();
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(BridgeError::Destroyed);
        }
        let Some(parent) = &self.state.parent else {
            return Err(BridgeError::NoParentFrame(operation));
        };

        let (id, rx) = self.state.pending.register(operation);
        // From here on, an early return drops `call`, which removes the entry.
        let call = PendingCall::new(
            id.clone(),
            operation,
            rx,
            Arc::clone(&self.state.pending),
            self.config.timeout(),
        );

        let message = serde_json::to_value(Request::new(id, body))?;
        parent.post_message(&message, &self.config.target_origin)?;
        tracing::debug!("Sent {} request {}", operation, call.id());

        Ok(call)
    }

    /// Reject the in-flight call `id` with [`BridgeError::Cancelled`].
    ///
    /// Returns `false` if the call already completed. Other calls are unaffected.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let cancelled = self
            .state
            .pending
            .settle(id, |_| Err(BridgeError::Cancelled(id.clone())));
        if cancelled {
            tracing::debug!("Cancelled request {}", id);
        }
        cancelled
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.state.pending.len()
    }

    pub fn is_listening(&self) -> bool {
        self.registration.lock().is_some()
    }

    /// Stop listening and reject every in-flight call with [`BridgeError::Destroyed`].
    ///
    /// Later calls fail with `Destroyed`. Calling this again is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(registration) = self.registration.lock().take() {
            self.host.remove_listener(registration);
        }

        let rejected = self.state.pending.reject_all(|_| BridgeError::Destroyed);
        tracing::debug!("Wallet bridge client destroyed ({} pending call(s) rejected)", rejected);
    }
}

impl<H: MessageHost> Drop for BridgeClient<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
impl BridgeClient<crate::transport::wasm::BrowserWindow> {
    /// Client for the current browser window, posting to `window.parent`.
    pub fn from_window(config: ClientConfig) -> Result<Self, BridgeError> {
        let window = crate::transport::wasm::BrowserWindow::current()?;
        let parent = window
            .parent()
            .map(|parent| Arc::new(parent) as Arc<dyn MessageSink>);
        Self::new(window, parent, config)
    }
}

#[cfg(feature = "native")]
impl BridgeClient<crate::transport::native::LocalWindow> {
    /// Client for a [`LocalWindow`](crate::transport::native::LocalWindow) frame, posting to its parent.
    pub fn in_frame(
        window: crate::transport::native::LocalWindow,
        config: ClientConfig,
    ) -> Result<Self, BridgeError> {
        let parent = window
            .parent()
            .map(|parent| Arc::new(parent) as Arc<dyn MessageSink>);
        Self::new(window, parent, config)
    }
}

fn unexpected(expected: Operation, received: &ResponseBody) -> BridgeError {
    BridgeError::UnexpectedResponse {
        expected,
        received: received.tag(),
    }
}
