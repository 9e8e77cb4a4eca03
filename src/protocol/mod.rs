//! Bridge protocol: the operation taxonomy and the enums the wire envelopes are built from.
//!
//! `wire` holds the tagged request/response objects exactly as they travel
//! through `postMessage`. This module holds the small domain enums those
//! objects are built from.

pub mod capabilities;
pub mod wire;

pub use capabilities::WalletCapabilities;
pub use wire::{ErrorCode, Request, RequestBody, Response, ResponseBody};

use serde::{Deserialize, Serialize};

// ─── AddressType ─────────────────────────────────────────────────────────────

/// Which kind of address a `GET_ADDRESS` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    /// The wallet's bitcoin receive address.
    Bitcoin,
    /// Where the borrower receives (or repays) the loan asset.
    LoanAsset,
}

// ─── LoanAsset ───────────────────────────────────────────────────────────────

/// Assets a loan can be paid out or repaid in.
///
/// Serialized by variant name (`"UsdcPol"`, `"Usd"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanAsset {
    UsdcPol,
    UsdtPol,
    UsdcEth,
    UsdtEth,
    UsdcStrk,
    UsdtStrk,
    UsdcSol,
    UsdtSol,
    UsdtLiquid,
    Usd,
    Eur,
    Chf,
    Mxn,
}

impl LoanAsset {
    /// Fiat assets settle by bank transfer and have no on-chain address.
    pub fn is_fiat(&self) -> bool {
        matches!(self, Self::Usd | Self::Eur | Self::Chf | Self::Mxn)
    }
}

// ─── Operation ───────────────────────────────────────────────────────────────

/// The closed set of bridge operations, named by their request tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetPublicKey,
    GetDerivationPath,
    GetAddress,
    GetNpub,
    SignPsbt,
    SignMessage,
    GetApiKey,
    GetCapabilities,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetPublicKey => "GET_PUBLIC_KEY",
            Self::GetDerivationPath => "GET_DERIVATION_PATH",
            Self::GetAddress => "GET_ADDRESS",
            Self::GetNpub => "GET_NPUB",
            Self::SignPsbt => "SIGN_PSBT",
            Self::SignMessage => "SIGN_MESSAGE",
            Self::GetApiKey => "GET_API_KEY",
            Self::GetCapabilities => "GET_CAPABILITIES",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
