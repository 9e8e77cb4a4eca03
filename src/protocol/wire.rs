//! Wire types: the tagged objects posted between frames.
//!
//! Both directions use `#[serde(tag = "type")]` with the operation tag in
//! SCREAMING_SNAKE_CASE and camelCase payload fields, so a JS peer sees
//! `{ type: "GET_ADDRESS", id: "...", addressType: "LOAN_ASSET", asset: "UsdcPol" }`.

use super::{AddressType, LoanAsset, Operation, WalletCapabilities};
use crate::shared::RequestId;
use serde::{Deserialize, Serialize};

// ─── Requests ────────────────────────────────────────────────────────────────

/// A request envelope: correlation id plus the tagged body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    pub fn new(id: RequestId, body: RequestBody) -> Self {
        Self { id, body }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestBody {
    GetPublicKey,
    GetDerivationPath,
    #[serde(rename_all = "camelCase")]
    GetAddress {
        address_type: AddressType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset: Option<LoanAsset>,
    },
    GetNpub,
    /// `psbt` is base64 or hex; the bridge never decodes it.
    SignPsbt { psbt: String },
    SignMessage { message: String },
    GetApiKey,
    GetCapabilities,
}

impl RequestBody {
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetPublicKey => Operation::GetPublicKey,
            Self::GetDerivationPath => Operation::GetDerivationPath,
            Self::GetAddress { .. } => Operation::GetAddress,
            Self::GetNpub => Operation::GetNpub,
            Self::SignPsbt { .. } => Operation::SignPsbt,
            Self::SignMessage { .. } => Operation::SignMessage,
            Self::GetApiKey => Operation::GetApiKey,
            Self::GetCapabilities => Operation::GetCapabilities,
        }
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// A response envelope. `id` always equals the answered request's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn new(id: RequestId, body: ResponseBody) -> Self {
        Self { id, body }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseBody {
    #[serde(rename_all = "camelCase")]
    PublicKeyResponse { public_key: String },
    DerivationPathResponse { path: String },
    /// `address` is `null` when no address applies (e.g. a fiat loan asset).
    AddressResponse {
        #[serde(default)]
        address: Option<String>,
    },
    NpubResponse { npub: String },
    #[serde(rename_all = "camelCase")]
    PsbtSigned { signed_psbt: String },
    MessageSigned { signature: String },
    #[serde(rename_all = "camelCase")]
    ApiKeyResponse { api_key: String },
    CapabilitiesResponse { capabilities: WalletCapabilities },
    Error {
        #[serde(rename = "error")]
        message: String,
        #[serde(default)]
        code: ErrorCode,
    },
}

impl ResponseBody {
    /// The operation this response answers; `None` for `ERROR`.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::PublicKeyResponse { .. } => Some(Operation::GetPublicKey),
            Self::DerivationPathResponse { .. } => Some(Operation::GetDerivationPath),
            Self::AddressResponse { .. } => Some(Operation::GetAddress),
            Self::NpubResponse { .. } => Some(Operation::GetNpub),
            Self::PsbtSigned { .. } => Some(Operation::SignPsbt),
            Self::MessageSigned { .. } => Some(Operation::SignMessage),
            Self::ApiKeyResponse { .. } => Some(Operation::GetApiKey),
            Self::CapabilitiesResponse { .. } => Some(Operation::GetCapabilities),
            Self::Error { .. } => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::PublicKeyResponse { .. } => "PUBLIC_KEY_RESPONSE",
            Self::DerivationPathResponse { .. } => "DERIVATION_PATH_RESPONSE",
            Self::AddressResponse { .. } => "ADDRESS_RESPONSE",
            Self::NpubResponse { .. } => "NPUB_RESPONSE",
            Self::PsbtSigned { .. } => "PSBT_SIGNED",
            Self::MessageSigned { .. } => "MESSAGE_SIGNED",
            Self::ApiKeyResponse { .. } => "API_KEY_RESPONSE",
            Self::CapabilitiesResponse { .. } => "CAPABILITIES_RESPONSE",
            Self::Error { .. } => "ERROR",
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}

// ─── ErrorCode ───────────────────────────────────────────────────────────────

/// Machine-readable cause carried next to the human-readable error message.
///
/// Peers that only send a message decode as `Internal`; unknown codes too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    UserRejected,
    Unsupported,
    #[default]
    #[serde(other)]
    Internal,
}
