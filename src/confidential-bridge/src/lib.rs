//! Protocol layer for confidential cross-chain intents.
//!
//! The contracts, the FHE co-processor and the signing key are reached through the traits in
//! [`ports`]; [`adapters`] holds the JSON-RPC, local-key and in-memory implementations.

pub mod adapters;
pub mod artifact;
pub mod claims;
pub mod config;
pub mod eip712;
pub mod errors;
pub mod intent;
pub mod permit;
pub mod ports;
pub mod provisioner;

pub use artifact::{ArtifactError, IntentArtifact};
pub use claims::{ClaimManager, ClaimReport, UnwrapOptions, UnwrapOutcome};
pub use config::{
    default_destination_chain, AddressResolver, ConfigError, ContractKey, DeploymentRegistry,
    Network, NetworkConfig,
};
pub use errors::{Error, Result};
pub use intent::{
    fulfillment_value_hash, verify_artifact, FulfillOptions, IntentManager, IntentParams,
    IntentStage,
};
pub use permit::{transfer_from, PermitBuilder, PermitRequest};
pub use provisioner::BalanceProvisioner;

pub use fhe_bridge_types as types;

/// Current unix time in seconds.
pub fn now_unix() -> u64 {
    time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}
