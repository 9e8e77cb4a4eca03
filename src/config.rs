//! Client and provider configuration.
//!
//! | Setting | Side | Default |
//! |---------|------|---------|
//! | `timeoutMs` | client | `30000` |
//! | `targetOrigin` | client | `"*"` |
//! | `allowedOrigins` | provider | required |

use crate::shared::Origin;
use serde::Deserialize;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Target origin / allow-list entry that matches every origin.
pub const WILDCARD_ORIGIN: &str = "*";

// ─── ClientConfig ────────────────────────────────────────────────────────────

/// Configuration for a [`BridgeClient`](crate::client::BridgeClient).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Origin requests are posted to. `"*"` is convenient in development;
    /// pin the wallet's origin in production.
    pub target_origin: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target_origin: WILDCARD_ORIGIN.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    pub fn target_origin(mut self, origin: &str) -> Self {
        self.target_origin = origin.to_string();
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The pinned parent origin, or `None` when posting to `"*"`.
    ///
    /// When pinned, responses from any other origin are ignored.
    pub fn pinned_origin(&self) -> Option<Origin> {
        if self.target_origin.trim() == WILDCARD_ORIGIN {
            None
        } else {
            Some(Origin::new(&self.target_origin))
        }
    }
}

// ─── AllowedOrigins ──────────────────────────────────────────────────────────

/// Origins a provider accepts requests from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<String>")]
pub enum AllowedOrigins {
    /// Every origin. Development only.
    Any,
    List(Vec<Origin>),
}

impl AllowedOrigins {
    /// Accept requests from every origin.
    pub fn any() -> Self {
        tracing::warn!("Wallet bridge accepts requests from any origin");
        Self::Any
    }

    /// Accept requests only from `origins`. A `"*"` entry opts into [`AllowedOrigins::Any`].
    pub fn list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        for origin in origins {
            let origin = origin.as_ref();
            if origin.trim() == WILDCARD_ORIGIN {
                return Self::any();
            }
            list.push(Origin::new(origin));
        }
        Self::List(list)
    }

    pub fn allows(&self, origin: &Origin) -> bool {
        match self {
            Self::Any => true,
            Self::List(list) => list.contains(origin),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<Vec<String>> for AllowedOrigins {
    fn from(origins: Vec<String>) -> Self {
        Self::list(origins)
    }
}

// ─── ProviderConfig ──────────────────────────────────────────────────────────

/// Configuration for a [`BridgeProvider`](crate::provider::BridgeProvider).
///
/// There is no `Default`: the allow-list is always chosen explicitly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub allowed_origins: AllowedOrigins,
}

impl ProviderConfig {
    pub fn new(allowed_origins: AllowedOrigins) -> Self {
        Self { allowed_origins }
    }
}
