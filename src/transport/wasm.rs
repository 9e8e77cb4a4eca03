//! Browser frames using `web-sys::Window`.
//!
//! - `BrowserWindow` is the window this code runs in: it owns the `message`
//!   listeners and spawns work with `wasm_bindgen_futures::spawn_local`
//! - `BrowserFrame` is another window (parent, iframe content window, or the
//!   `source` of an event) that messages are posted to
//!
//! Messages cross the boundary as plain JS objects: outgoing values go through
//! `JSON.parse`, incoming `event.data` through `JSON.stringify`. Data that
//! cannot be represented as JSON is skipped before it reaches a listener.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlIFrameElement, Window};

use crate::error::BridgeError;
use crate::shared::{BoxFuture, Origin};
use crate::transport::{Listener, MessageEvent, MessageHost, MessageSink};

const MESSAGE_EVENT: &str = "message";

// ─── BrowserWindow ───────────────────────────────────────────────────────────

/// The window this code is running in.
#[derive(Clone)]
pub struct BrowserWindow {
    window: Window,
}

impl BrowserWindow {
    pub fn current() -> Result<Self, BridgeError> {
        web_sys::window()
            .map(|window| Self { window })
            .ok_or_else(|| BridgeError::Transport("No global window".into()))
    }

    /// The embedding parent frame, or `None` when running top-level
    /// (`window.parent === window`).
    pub fn parent(&self) -> Option<BrowserFrame> {
        let parent = self.window.parent().ok().flatten()?;
        if js_sys::Object::is(parent.as_ref(), self.window.as_ref()) {
            return None;
        }
        Some(BrowserFrame { window: parent })
    }
}

/// Keeps the JS closure alive while the listener is attached.
pub struct BrowserListener {
    closure: Closure<dyn FnMut(web_sys::MessageEvent)>,
}

impl MessageHost for BrowserWindow {
    type Registration = BrowserListener;

    fn add_listener(&self, listener: Arc<dyn Listener>) -> Result<BrowserListener, BridgeError> {
        let closure = Closure::<dyn FnMut(_)>::new(move |e: web_sys::MessageEvent| {
            let Some(data) = js_to_json(&e.data()) else {
                tracing::trace!("Skipping message without JSON-representable data");
                return;
            };

            // Window-to-window messages always carry a WindowProxy source; a
            // cross-origin WindowProxy fails `instanceof Window`, so no dyn_into.
            let source = e.source().map(|source| {
                Arc::new(BrowserFrame {
                    window: source.unchecked_into::<Window>(),
                }) as Arc<dyn MessageSink>
            });

            listener(MessageEvent {
                origin: Origin::new(&e.origin()),
                source,
                data,
            });
        });

        self.window
            .add_event_listener_with_callback(MESSAGE_EVENT, closure.as_ref().unchecked_ref())
            .map_err(|e| BridgeError::Transport(extract_js_error(&e)))?;

        Ok(BrowserListener { closure })
    }

    fn remove_listener(&self, registration: BrowserListener) {
        if let Err(e) = self.window.remove_event_listener_with_callback(
            MESSAGE_EVENT,
            registration.closure.as_ref().unchecked_ref(),
        ) {
            tracing::error!("Failed to remove message listener: {}", extract_js_error(&e));
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

// ─── BrowserFrame ────────────────────────────────────────────────────────────

/// A window messages are posted to.
#[derive(Clone)]
pub struct BrowserFrame {
    window: Window,
}

impl BrowserFrame {
    /// The content window of an `<iframe>`, once it has one.
    pub fn from_iframe(iframe: &HtmlIFrameElement) -> Option<Self> {
        iframe.content_window().map(|window| Self { window })
    }
}

impl MessageSink for BrowserFrame {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), BridgeError> {
        let json = serde_json::to_string(message)?;
        let value = js_sys::JSON::parse(&json)
            .map_err(|e| BridgeError::Transport(extract_js_error(&e)))?;
        self.window
            .post_message(&value, target_origin)
            .map_err(|e| BridgeError::Transport(extract_js_error(&e)))
    }

    fn same_window(&self, other: &dyn MessageSink) -> bool {
        other
            .as_any()
            .downcast_ref::<BrowserFrame>()
            .is_some_and(|other| js_sys::Object::is(self.window.as_ref(), other.window.as_ref()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn js_to_json(value: &JsValue) -> Option<Value> {
    let json = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&json).ok()
}

fn extract_js_error(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        let name = error.name().as_string().unwrap_or_else(|| "Error".to_string());
        let message = error.message().as_string().unwrap_or_default();

        return if message.is_empty() {
            name
        } else {
            format!("{}: {}", name, message)
        };
    }

    if let Some(s) = err.as_string() {
        if !s.is_empty() {
            return s;
        }
    }

    if let Ok(json_str) = js_sys::JSON::stringify(err) {
        if let Some(s) = json_str.as_string() {
            if !s.is_empty() && s != "null" && s != "undefined" {
                return s;
            }
        }
    }

    "Unknown postMessage error".to_string()
}
