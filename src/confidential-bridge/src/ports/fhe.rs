use alloy_primitives::{Address, U256};
use fhe_bridge_types::{CiphertextHandle, EncryptedInput, FheType};
use std::future::Future;

/// Port for the FHE co-processor client.
///
/// `initialize` binds the client to a chain and an account; `encrypt` and `unseal` fail with
/// [`FheError::NotInitialized`] before that. Unsealing is asynchronous relative to the chain: a
/// value may not be decryptable yet right after the transaction that produced it.
pub trait FheBackend: Send + Sync {
    fn initialize(
        &self,
        chain_id: u64,
        account: Address,
    ) -> impl Future<Output = Result<(), FheError>> + Send;

    fn encrypt(
        &self,
        value: U256,
        utype: FheType,
    ) -> impl Future<Output = Result<EncryptedInput, FheError>> + Send;

    fn unseal(
        &self,
        handle: CiphertextHandle,
        utype: FheType,
    ) -> impl Future<Output = Result<U256, FheError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum FheError {
    #[error("FHE client not initialised: {0}")]
    NotInitialized(String),

    #[error("decryption not permitted: {0}")]
    NotPermitted(String),

    #[error("decryption not ready: {0}")]
    NotReady(String),

    #[error("value does not fit {0:?}")]
    OutOfRange(FheType),

    #[error("FHE backend error: {0}")]
    Backend(String),
}

impl FheError {
    /// Only "not ready yet" is worth retrying after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FheError::NotReady(_))
    }
}
