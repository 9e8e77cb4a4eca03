//! `BridgeProvider`: the wallet (parent window) side of the bridge.
//!
//! Listens for bridge requests, drops those from origins outside the
//! allow-list, runs the [`WalletHandler`] for each accepted request and
//! posts the response back to the requesting window. Requests are handled
//! concurrently; a slow handler never delays another request.

pub mod handler;

pub use handler::WalletHandler;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::{AllowedOrigins, ProviderConfig, WILDCARD_ORIGIN};
use crate::error::BridgeError;
use crate::protocol::{Request, Response};
use crate::transport::{MessageEvent, MessageHost, MessageSink};

struct ProviderState {
    handler: Arc<dyn WalletHandler>,
    allowed: AllowedOrigins,
}

pub struct BridgeProvider<H: MessageHost> {
    host: H,
    state: Arc<ProviderState>,
    registration: Mutex<Option<H::Registration>>,
}

impl<H: MessageHost> BridgeProvider<H> {
    /// Create a provider for `host`. Nothing is received until [`listen`](Self::listen).
    pub fn new<W>(host: H, handler: W, config: ProviderConfig) -> Self
    where
        W: WalletHandler + 'static,
    {
        Self {
            host,
            state: Arc::new(ProviderState {
                handler: Arc::new(handler),
                allowed: config.allowed_origins,
            }),
            registration: Mutex::new(None),
        }
    }

    /// Start answering requests.
    ///
    /// With `target` set, only requests whose `source` is that window (the
    /// embedded iframe) are answered. Calling `listen` again while already
    /// listening is a no-op.
    pub fn listen(&self, target: Option<Arc<dyn MessageSink>>) -> Result<(), BridgeError> {
        let mut registration = self.registration.lock();
        if registration.is_some() {
            tracing::debug!("Wallet bridge provider already listening");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let host = self.host.clone();
        *registration = Some(self.host.add_listener(Arc::new(move |event: MessageEvent| {
            on_message(&state, &host, target.as_deref(), event)
        }))?);

        match &self.state.allowed {
            AllowedOrigins::Any => tracing::info!("Wallet bridge provider listening (any origin)"),
            AllowedOrigins::List(origins) => tracing::info!(
                "Wallet bridge provider listening ({} allowed origin(s))",
                origins.len()
            ),
        }
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.registration.lock().is_some()
    }

    /// Stop answering requests. Handlers already running still post their
    /// responses. Calling this again is a no-op.
    pub fn destroy(&self) {
        if let Some(registration) = self.registration.lock().take() {
            self.host.remove_listener(registration);
            tracing::debug!("Wallet bridge provider destroyed");
        }
    }
}

impl<H: MessageHost> Drop for BridgeProvider<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
impl BridgeProvider<crate::transport::wasm::BrowserWindow> {
    /// Provider for the current browser window.
    pub fn from_window<W>(handler: W, config: ProviderConfig) -> Result<Self, BridgeError>
    where
        W: WalletHandler + 'static,
    {
        let window = crate::transport::wasm::BrowserWindow::current()?;
        Ok(Self::new(window, handler, config))
    }
}

/// What to do with one received message.
#[derive(Debug, PartialEq)]
enum Screened {
    /// Not a bridge request (foreign `postMessage` traffic).
    Foreign,
    DisallowedOrigin,
    /// A bridge request from a window other than the bound iframe.
    WrongSource,
    Accepted(Request),
}

/// Decode first so unrelated traffic never reaches the warn-level drops.
fn screen(state: &ProviderState, target: Option<&dyn MessageSink>, event: &MessageEvent) -> Screened {
    let Ok(request) = Request::deserialize(&event.data) else {
        return Screened::Foreign;
    };

    if !state.allowed.allows(&event.origin) {
        return Screened::DisallowedOrigin;
    }

    if let Some(target) = target {
        let from_target = event
            .source
            .as_ref()
            .is_some_and(|source| target.same_window(source.as_ref()));
        if !from_target {
            return Screened::WrongSource;
        }
    }

    Screened::Accepted(request)
}

fn on_message<H: MessageHost>(
    state: &Arc<ProviderState>,
    host: &H,
    target: Option<&dyn MessageSink>,
    event: MessageEvent,
) {
    let request = match screen(state, target, &event) {
        Screened::Accepted(request) => request,
        Screened::Foreign => {
            tracing::trace!("Ignoring non-bridge message from {}", event.origin);
            return;
        }
        Screened::DisallowedOrigin => {
            tracing::warn!("Dropping bridge request from disallowed origin {}", event.origin);
            return;
        }
        Screened::WrongSource => {
            tracing::warn!("Dropping bridge request from a window other than the target frame");
            return;
        }
    };

    let Some(source) = event.source else {
        tracing::warn!("Bridge request {} has no source window to reply to", request.id);
        return;
    };

    // Sandboxed frames report an opaque origin that cannot be targeted.
    let reply_origin = if event.origin.is_opaque() {
        WILDCARD_ORIGIN.to_string()
    } else {
        event.origin.as_str().to_string()
    };

    let operation = request.body.operation();
    tracing::debug!("Received {} request {} from {}", operation, request.id, event.origin);

    let state = Arc::clone(state);
    host.spawn(Box::pin(async move {
        let body = handler::handle(state.handler.as_ref(), request.body).await;
        let response = Response::new(request.id, body);

        let result = serde_json::to_value(&response)
            .map_err(BridgeError::from)
            .and_then(|message| source.post_message(&message, &reply_origin));
        match result {
            Ok(()) => tracing::debug!("Answered {} request {}", operation, response.id),
            Err(e) => tracing::error!("Failed to answer {} request {}: {}", operation, response.id, e),
        }
    }));
}
