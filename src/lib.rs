//! # Wallet Bridge
//!
//! Typed request/response RPC between an app embedded in an `<iframe>` and
//! the wallet running in the parent window, over `postMessage`. Supports both
//! native and WASM targets.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: newtypes, the wire protocol, errors and configuration (always available, WASM-safe)
//! 2. **Transport**: compile-time dispatch between in-process tokio frames (native) and `web-sys` windows (WASM)
//! 3. **Client**: `BridgeClient`, the embedded side. Correlates responses by id and enforces timeouts
//! 4. **Provider**: `BridgeProvider`, the wallet side. Filters by origin and dispatches to a `WalletHandler`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wallet_bridge::prelude::*;
//!
//! // Inside the iframe
//! let client = BridgeClient::from_window(
//!     ClientConfig::default().target_origin("https://wallet.example"),
//! )?;
//! let public_key = client.get_public_key().await?;
//! let signed = client.sign_psbt(&psbt_base64).await?;
//!
//! // In the wallet
//! let provider = BridgeProvider::from_window(
//!     MyWallet::new(),
//!     ProviderConfig::new(AllowedOrigins::list(["https://lend.example"])),
//! )?;
//! provider.listen(None)?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and platform bounds.
pub mod shared;

/// Message shapes exchanged between client and provider.
pub mod protocol;

/// Bridge error types.
pub mod error;

/// Client and provider configuration.
pub mod config;

// ── Layer 2: Transport ───────────────────────────────────────────────────────

/// Windows, message events and listeners.
pub mod transport;

// ── Layer 3: Client ──────────────────────────────────────────────────────────

/// `BridgeClient`, used from inside the embedded frame.
pub mod client;

// ── Layer 4: Provider ────────────────────────────────────────────────────────

/// `BridgeProvider` and the `WalletHandler` trait, used by the wallet.
pub mod provider;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{Origin, RequestId};

    // Protocol
    pub use crate::protocol::{
        AddressType, ErrorCode, LoanAsset, Operation, Request, RequestBody, Response,
        ResponseBody, WalletCapabilities,
    };

    // Errors + config
    pub use crate::config::{AllowedOrigins, ClientConfig, ProviderConfig};
    pub use crate::error::{BridgeError, WalletError};

    // Transport
    pub use crate::transport::{MessageEvent, MessageHost, MessageSink};

    #[cfg(feature = "native")]
    pub use crate::transport::native::{LocalWindow, WindowProxy};

    #[cfg(all(feature = "wasm", target_arch = "wasm32"))]
    pub use crate::transport::wasm::{BrowserFrame, BrowserWindow};

    // Client + provider
    pub use crate::client::{BridgeClient, PendingCall};
    pub use crate::provider::{BridgeProvider, WalletHandler};
}
