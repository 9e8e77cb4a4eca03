//! Native in-process frames, with `tokio` tasks standing in for the browser.
//!
//! A [`LocalWindow`] behaves like a browser window for bridge purposes:
//! - Each window has an origin and an optional parent
//! - `post_message` enforces the target origin the way browsers do (silent drop)
//! - Events are queued and delivered asynchronously, in order, by a background task
//! - Every event carries the sender's origin and a reply handle (`event.source`)
//!
//! Useful for hosting the bridge in a native shell (e.g. a desktop webview
//! host relaying frames) and for exercising client + provider end-to-end.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::WILDCARD_ORIGIN;
use crate::error::BridgeError;
use crate::shared::{BoxFuture, Origin};
use crate::transport::{Listener, MessageEvent, MessageHost, MessageSink};

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

type Listeners = Arc<Mutex<Vec<(u64, Arc<dyn Listener>)>>>;

struct WindowInner {
    id: u64,
    origin: Origin,
    parent: Option<LocalWindow>,
    listeners: Listeners,
    next_listener_id: AtomicU64,
    queue: mpsc::UnboundedSender<MessageEvent>,
    runtime: Handle,
}

/// An in-process window. Cheap to clone; clones refer to the same window.
#[derive(Clone)]
pub struct LocalWindow {
    inner: Arc<WindowInner>,
}

impl LocalWindow {
    /// Create a top-level window (no parent).
    ///
    /// Fails with [`BridgeError::Transport`] outside a tokio runtime, which
    /// drives event delivery and handler tasks.
    pub fn new(origin: &str) -> Result<Self, BridgeError> {
        Self::create(origin, None)
    }

    /// Create a frame embedded in `parent`, like an `<iframe>` loaded from `origin`.
    pub fn embedded(parent: &LocalWindow, origin: &str) -> Result<Self, BridgeError> {
        Self::create(origin, Some(parent.clone()))
    }

    fn create(origin: &str, parent: Option<LocalWindow>) -> Result<Self, BridgeError> {
        let runtime = Handle::try_current()
            .map_err(|e| BridgeError::Transport(format!("LocalWindow needs a tokio runtime: {}", e)))?;

        let (queue, rx) = mpsc::unbounded_channel();
        let listeners: Listeners = Arc::default();
        runtime.spawn(deliver(rx, Arc::clone(&listeners)));

        Ok(Self {
            inner: Arc::new(WindowInner {
                id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
                origin: Origin::new(origin),
                parent,
                listeners,
                next_listener_id: AtomicU64::new(1),
                queue,
                runtime,
            }),
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    /// This frame's parent as seen from inside it (`window.parent`).
    ///
    /// `None` for a top-level window.
    pub fn parent(&self) -> Option<WindowProxy> {
        self.inner.parent.as_ref().map(|parent| WindowProxy {
            target: parent.clone(),
            sender: self.clone(),
        })
    }

    /// `child`'s content window as seen from this window (`iframe.contentWindow`).
    pub fn frame(&self, child: &LocalWindow) -> WindowProxy {
        WindowProxy {
            target: child.clone(),
            sender: self.clone(),
        }
    }

    /// Number of message listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl std::fmt::Debug for LocalWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWindow")
            .field("id", &self.inner.id)
            .field("origin", &self.inner.origin)
            .finish()
    }
}

/// Registration handle returned by [`LocalWindow::add_listener`](MessageHost::add_listener).
#[derive(Debug)]
pub struct LocalListener(u64);

impl MessageHost for LocalWindow {
    type Registration = LocalListener;

    fn add_listener(&self, listener: Arc<dyn Listener>) -> Result<LocalListener, BridgeError> {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));
        Ok(LocalListener(id))
    }

    fn remove_listener(&self, registration: LocalListener) {
        self.inner
            .listeners
            .lock()
            .retain(|(id, _)| *id != registration.0);
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.inner.runtime.spawn(task);
    }
}

// ─── WindowProxy ─────────────────────────────────────────────────────────────

/// A handle for posting to `target` on behalf of `sender`.
#[derive(Clone)]
pub struct WindowProxy {
    target: LocalWindow,
    sender: LocalWindow,
}

impl WindowProxy {
    pub fn origin(&self) -> &Origin {
        self.target.origin()
    }
}

impl std::fmt::Debug for WindowProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowProxy")
            .field("target", &self.target)
            .field("sender", &self.sender)
            .finish()
    }
}

impl MessageSink for WindowProxy {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), BridgeError> {
        if target_origin.trim() != WILDCARD_ORIGIN
            && Origin::new(target_origin) != self.target.inner.origin
        {
            tracing::trace!(
                "Dropping message for {}: target origin {} does not match",
                self.target.inner.origin,
                target_origin
            );
            return Ok(());
        }

        let reply = WindowProxy {
            target: self.sender.clone(),
            sender: self.target.clone(),
        };
        let event = MessageEvent {
            origin: self.sender.inner.origin.clone(),
            source: Some(Arc::new(reply)),
            data: message.clone(),
        };

        self.target
            .inner
            .queue
            .send(event)
            .map_err(|_| BridgeError::Transport("Target window is closed".into()))
    }

    fn same_window(&self, other: &dyn MessageSink) -> bool {
        other
            .as_any()
            .downcast_ref::<WindowProxy>()
            .is_some_and(|other| other.target.inner.id == self.target.inner.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─── Event delivery ──────────────────────────────────────────────────────────

/// Deliver queued events to the listeners attached at delivery time.
async fn deliver(mut rx: mpsc::UnboundedReceiver<MessageEvent>, listeners: Listeners) {
    while let Some(event) = rx.recv().await {
        let snapshot: Vec<Arc<dyn Listener>> = listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event.clone());
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
