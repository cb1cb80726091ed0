use alloy_primitives::{Address, U256};
use fhe_bridge_types::CiphertextHandle;

use crate::{
    artifact::ArtifactError,
    config::ConfigError,
    ports::{ChainError, FheError, OutboxError, SignerError},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the protocol operations. Nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Resolution.
    #[error("{key} not found: pass it explicitly, deploy it, or add it to the network config")]
    AddressNotFound { key: String },

    #[error("chain {0} is not configured")]
    ChainNotConfigured(u64),

    // Authorisation.
    #[error("cannot mint {token} for {account}: signer may lack mint permission ({reason})")]
    MintUnauthorized {
        token: Address,
        account: Address,
        reason: String,
    },

    #[error("not permitted to decrypt {handle}: {reason}")]
    DecryptNotPermitted {
        handle: CiphertextHandle,
        reason: String,
    },

    #[error("signer {signer} cannot sign for {expected}")]
    SignerMismatch { signer: Address, expected: Address },

    // Decryption not ready (retryable).
    #[error("decryption of {handle} is not available yet; retry later")]
    DecryptionPending { handle: CiphertextHandle },

    // Preconditions.
    #[error("intent {id} not found")]
    IntentNotFound { id: U256 },

    #[error("intent {id} is already filled")]
    AlreadyFilled { id: U256 },

    #[error("claim {ct_hash} not found")]
    ClaimNotFound { ct_hash: U256 },

    #[error("claim {ct_hash} has already been claimed")]
    ClaimAlreadyClaimed { ct_hash: U256 },

    #[error("claim {ct_hash} is not decrypted yet")]
    ClaimNotDecrypted { ct_hash: U256 },

    #[error("claim {ct_hash} is marked claimed but was never decrypted")]
    ClaimInconsistent { ct_hash: U256 },

    #[error("permit expired at {deadline} (now {now})")]
    PermitExpired { deadline: U256, now: u64 },

    #[error("stale permit nonce: expected {expected}, found {found}")]
    StaleNonce { expected: U256, found: U256 },

    #[error("ciphertext handle mismatch: expected {expected}, found {found}")]
    HandleMismatch {
        expected: CiphertextHandle,
        found: CiphertextHandle,
    },

    #[error("{what} mismatch: expected {expected}, found {found}")]
    AddressMismatch {
        what: &'static str,
        expected: Address,
        found: Address,
    },

    #[error("artifact for intent {id} does not match the origin bridge's record")]
    ArtifactMismatch { id: U256 },

    #[error("intent targets chain {expected}, but the bridge is on chain {found}")]
    ChainMismatch { expected: u64, found: u64 },

    #[error("uint type {0} does not fit the 7-bit handle field")]
    UintTypeOutOfRange(u8),

    #[error("amount must be non-zero")]
    ZeroAmount,

    // Collaborators.
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Fhe(#[from] FheError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Map an unseal failure for `handle` onto the taxonomy above.
    pub fn from_unseal(handle: CiphertextHandle, err: FheError) -> Self {
        match err {
            FheError::NotReady(_) => Error::DecryptionPending { handle },
            FheError::NotPermitted(reason) => Error::DecryptNotPermitted { handle, reason },
            other => Error::Fhe(other),
        }
    }

    /// Retryable after a delay; the caller owns the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DecryptionPending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseal_errors_are_classified() {
        let h = CiphertextHandle::ZERO;
        assert!(Error::from_unseal(h, FheError::NotReady("pending".into())).is_retryable());
        assert!(matches!(
            Error::from_unseal(h, FheError::NotPermitted("acl".into())),
            Error::DecryptNotPermitted { .. }
        ));
        let backend = Error::from_unseal(h, FheError::Backend("boom".into()));
        assert!(matches!(backend, Error::Fhe(_)));
        assert!(!backend.is_retryable());
    }
}
