//! Declarative description of what a wallet can do.

use super::LoanAsset;
use serde::{Deserialize, Serialize};

/// Returned by `GET_CAPABILITIES`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCapabilities {
    /// The wallet can broadcast a bitcoin payment itself (e.g. collateral funding).
    #[serde(default)]
    pub can_send_bitcoin: bool,
    /// The wallet answers `SIGN_PSBT`.
    #[serde(default)]
    pub can_sign_psbt: bool,
    /// Assets the wallet can receive a loan payout in.
    #[serde(default)]
    pub receivable_loan_assets: Vec<LoanAsset>,
    /// Assets the wallet can send to repay a loan.
    #[serde(default)]
    pub sendable_loan_assets: Vec<LoanAsset>,
    /// The wallet exposes a Nostr identity (`GET_NPUB`).
    #[serde(default)]
    pub has_nostr_identity: bool,
}

impl WalletCapabilities {
    pub fn supports_receiving(&self, asset: LoanAsset) -> bool {
        self.receivable_loan_assets.contains(&asset)
    }

    pub fn supports_sending(&self, asset: LoanAsset) -> bool {
        self.sendable_loan_assets.contains(&asset)
    }
}
