//! Wallet handler trait and request dispatch.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::error::WalletError;
use crate::protocol::{
    AddressType, ErrorCode, LoanAsset, RequestBody, ResponseBody, WalletCapabilities,
};
use crate::shared::{MaybeSend, MaybeSync};

/// Implemented by the wallet to answer bridge requests.
///
/// Methods may await user confirmation or an external signer. Returning an
/// error (or panicking) produces an `ERROR` response for that request only.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait WalletHandler: MaybeSend + MaybeSync {
    async fn get_public_key(&self) -> Result<String, WalletError>;

    async fn get_derivation_path(&self) -> Result<String, WalletError>;

    /// `Ok(None)` when no address applies, e.g. a fiat loan asset.
    async fn get_address(
        &self,
        address_type: AddressType,
        asset: Option<LoanAsset>,
    ) -> Result<Option<String>, WalletError>;

    async fn sign_psbt(&self, psbt: String) -> Result<String, WalletError>;

    async fn get_npub(&self) -> Result<String, WalletError> {
        Err(WalletError::unsupported("Wallet has no Nostr identity"))
    }

    async fn sign_message(&self, _message: String) -> Result<String, WalletError> {
        Err(WalletError::unsupported("Wallet does not sign messages"))
    }

    async fn get_api_key(&self) -> Result<String, WalletError> {
        Err(WalletError::unsupported("Wallet has no API key"))
    }

    async fn get_capabilities(&self) -> Result<WalletCapabilities, WalletError> {
        Err(WalletError::unsupported("Wallet does not declare capabilities"))
    }
}

/// Run the handler for `body`, turning errors and panics into `ERROR` bodies.
pub(crate) async fn handle(handler: &dyn WalletHandler, body: RequestBody) -> ResponseBody {
    let operation = body.operation();

    match AssertUnwindSafe(dispatch(handler, body)).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::debug!("{} handler failed: {}", operation, e);
            ResponseBody::error(e.code, e.message)
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("{} handler panicked: {}", operation, reason);
            ResponseBody::error(
                ErrorCode::Internal,
                format!("{} handler panicked: {}", operation, reason),
            )
        }
    }
}

async fn dispatch(handler: &dyn WalletHandler, body: RequestBody) -> Result<ResponseBody, WalletError> {
    let response = match body {
        RequestBody::GetPublicKey => ResponseBody::PublicKeyResponse {
            public_key: handler.get_public_key().await?,
        },
        RequestBody::GetDerivationPath => ResponseBody::DerivationPathResponse {
            path: handler.get_derivation_path().await?,
        },
        RequestBody::GetAddress {
            address_type,
            asset,
        } => ResponseBody::AddressResponse {
            address: handler.get_address(address_type, asset).await?,
        },
        RequestBody::GetNpub => ResponseBody::NpubResponse {
            npub: handler.get_npub().await?,
        },
        RequestBody::SignPsbt { psbt } => ResponseBody::PsbtSigned {
            signed_psbt: handler.sign_psbt(psbt).await?,
        },
        RequestBody::SignMessage { message } => ResponseBody::MessageSigned {
            signature: handler.sign_message(message).await?,
        },
        RequestBody::GetApiKey => ResponseBody::ApiKeyResponse {
            api_key: handler.get_api_key().await?,
        },
        RequestBody::GetCapabilities => ResponseBody::CapabilitiesResponse {
            capabilities: handler.get_capabilities().await?,
        },
    };
    Ok(response)
}
