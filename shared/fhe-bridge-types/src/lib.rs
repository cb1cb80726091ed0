//! Shared types for the confidential bridge (on-chain/off-chain).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod claim;
pub mod fhe_type;
pub mod handle;
pub mod intent;
pub mod permit;

pub use claim::{Claim, ClaimStatus};
pub use fhe_type::FheType;
pub use handle::{
    append_metadata_to_input, pack, unpack, CiphertextHandle, EncryptedInput, HandleMetadata,
};
pub use intent::{BridgeIntent, FilledStatus, IntentError};
pub use permit::{Eip712Domain, PermitError, PermitSignature, TransferPermit, DEFAULT_PERMIT_TTL};
