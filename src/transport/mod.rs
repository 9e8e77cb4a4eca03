//! Transport layer: windows, message events and listeners.
//!
//! The actual transport is compile-time dispatched:
//! - `native` feature → in-process frames driven by tokio tasks (native.rs)
//! - `wasm` feature on `wasm32` → `web-sys::Window::postMessage` (wasm.rs)
//!
//! Both implement the traits below. The client and provider only ever see
//! [`MessageHost`] (the window they listen on) and [`MessageSink`] (a window
//! they post to).

#[cfg(feature = "native")]
pub mod native;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::error::BridgeError;
use crate::shared::{BoxFuture, MaybeSend, MaybeSync, Origin};

/// A window that messages can be posted to: the parent, an iframe's content
/// window, or the `source` of a received event.
pub trait MessageSink: MaybeSend + MaybeSync + 'static {
    /// Post `message` to this window. Browsers drop the message silently when
    /// the window's origin does not match `target_origin` (`"*"` matches all).
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), BridgeError>;

    /// Whether `other` refers to the same window as `self`.
    fn same_window(&self, other: &dyn MessageSink) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// One received cross-document message.
#[derive(Clone)]
pub struct MessageEvent {
    /// Origin of the sending window, as reported by the browser.
    pub origin: Origin,
    /// The sending window, if it can be replied to.
    pub source: Option<Arc<dyn MessageSink>>,
    pub data: Value,
}

impl std::fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageEvent")
            .field("origin", &self.origin)
            .field("has_source", &self.source.is_some())
            .field("data", &self.data)
            .finish()
    }
}

/// Callback invoked for every message event the host window receives.
pub trait Listener: Fn(MessageEvent) + MaybeSend + MaybeSync {}

impl<F> Listener for F where F: Fn(MessageEvent) + MaybeSend + MaybeSync {}

/// The window a client or provider lives in: owns listener registration and
/// runs the async work started from inside a listener.
pub trait MessageHost: Clone + MaybeSend + MaybeSync + 'static {
    /// Keeps a listener attached until handed back to [`MessageHost::remove_listener`].
    type Registration: MaybeSend;

    fn add_listener(&self, listener: Arc<dyn Listener>) -> Result<Self::Registration, BridgeError>;

    fn remove_listener(&self, registration: Self::Registration);

    /// Run `task` on the host's event loop.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}
