//! Shared newtypes and utilities used across the client and provider.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw strings carried in bridge messages, so they can be used directly in
//! wire types without conversion overhead.

pub mod platform;

pub use platform::{BoxFuture, MaybeSend, MaybeSync};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ─── RequestId ───────────────────────────────────────────────────────────────

/// Length of the random suffix appended to the millisecond timestamp.
const REQUEST_ID_SUFFIX_LEN: usize = 9;

/// Opaque correlation id for a request/response pair (e.g. `"1718035200123-k3f9x0q2a"`).
///
/// Only used to match a response to its request. Not a security token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Timestamp in milliseconds followed by a random lowercase alphanumeric suffix.
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REQUEST_ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("{}-{}", chrono::Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RequestId(s))
    }
}

// ─── Origin ──────────────────────────────────────────────────────────────────

/// A browser security origin: `scheme://host[:port]`.
///
/// Stored normalised (lowercase, no trailing slash) so that
/// `"https://Trusted.Example/"` and `"https://trusted.example"` compare equal.
/// The opaque origin of a sandboxed frame is the literal string `"null"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

/// The origin string browsers report for sandboxed or `file:` frames.
pub const OPAQUE_ORIGIN: &str = "null";

impl Origin {
    pub fn new(s: &str) -> Self {
        Self(s.trim().trim_end_matches('/').to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_opaque(&self) -> bool {
        self.0 == OPAQUE_ORIGIN
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Origin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Origin {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl FromStr for Origin {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Origin::new(s))
    }
}

impl Serialize for Origin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Origin::new(&s))
    }
}
