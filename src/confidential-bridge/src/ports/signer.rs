use alloy_primitives::{Address, B256};
use fhe_bridge_types::PermitSignature;
use std::future::Future;

/// Port for the owner's signing key. Key management stays outside this crate.
pub trait TypedDataSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign a finished EIP-712 digest.
    fn sign_hash(
        &self,
        digest: B256,
    ) -> impl Future<Output = Result<PermitSignature, SignerError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
