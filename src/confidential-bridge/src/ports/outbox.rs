use alloy_primitives::U256;
use std::future::Future;

use crate::artifact::{ArtifactError, IntentArtifact};

/// Hand-off between the relayer that can decrypt and the process that fulfils.
///
/// Implementations:
/// - `FileOutbox` (one JSON document per intent)
/// - `MemoryOutbox` (single process)
pub trait IntentOutbox: Send + Sync {
    /// Store an exported intent. Re-publishing the same id overwrites it.
    fn publish(
        &self,
        artifact: &IntentArtifact,
    ) -> impl Future<Output = Result<(), OutboxError>> + Send;

    fn fetch(
        &self,
        intent_id: U256,
    ) -> impl Future<Output = Result<Option<IntentArtifact>, OutboxError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("outbox unavailable: {0}")]
    Unavailable(String),
}
