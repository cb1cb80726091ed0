//! Ports for the external collaborators: token contracts, the bridge contract, the FHE
//! co-processor, the owner's signing key, and the intent hand-off channel.
//!
//! State-changing calls resolve only once the transaction is included, so callers can chain
//! dependent operations (approve, then wrap) without further waiting.

pub mod bridge;
pub mod fhe;
pub mod outbox;
pub mod signer;
pub mod token;

use alloy_primitives::{Address, B256};

pub use bridge::{BridgeContract, BridgeRequest, BridgeSubmission};
pub use fhe::{FheBackend, FheError};
pub use outbox::{IntentOutbox, OutboxError};
pub use signer::{SignerError, TypedDataSigner};
pub use token::{ConfidentialToken, PlainToken};

/// Inclusion receipt for a state-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Builds token clients for addresses discovered at runtime (e.g. a token's underlying ERC20).
pub trait ContractFactory: Send + Sync {
    type Confidential: ConfidentialToken;
    type Plain: PlainToken;

    /// Account that signs the transactions sent through the built clients.
    fn sender(&self) -> Address;

    fn confidential_token(&self, address: Address) -> Self::Confidential;

    fn plain_token(&self, address: Address) -> Self::Plain;
}

/// Revert fragments that mean "the work is already done".
const IDEMPOTENT_REVERTS: &[&str] = &["already claimed", "already verified", "already filled"];

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transaction {0} dropped before inclusion")]
    Dropped(B256),

    #[error("invalid call argument: {0}")]
    InvalidArgument(String),

    #[error("malformed return data: {0}")]
    Decode(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// A revert caused by the operation having already happened (claimed, verified, filled).
    pub fn is_idempotent_noop(&self) -> bool {
        match self {
            ChainError::Reverted(reason) => {
                let reason = reason.to_ascii_lowercase();
                IDEMPOTENT_REVERTS.iter().any(|fragment| reason.contains(fragment))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_reverts_are_recognised() {
        assert!(
            ChainError::Reverted("execution reverted: Already claimed".into()).is_idempotent_noop()
        );
        assert!(ChainError::Reverted("intent already filled".into()).is_idempotent_noop());
        assert!(!ChainError::Reverted("insufficient allowance".into()).is_idempotent_noop());
        assert!(!ChainError::Rpc("already claimed".into()).is_idempotent_noop());
    }
}
