use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::U256;
use tokio::sync::Mutex;

use crate::{
    artifact::IntentArtifact,
    ports::{IntentOutbox, OutboxError},
};

/// Outbox for a relayer that exports and fulfils in the same process.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    artifacts: Arc<Mutex<BTreeMap<U256, IntentArtifact>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.lock().await.is_empty()
    }
}

impl IntentOutbox for MemoryOutbox {
    async fn publish(&self, artifact: &IntentArtifact) -> Result<(), OutboxError> {
        self.artifacts
            .lock()
            .await
            .insert(artifact.intent_id(), artifact.clone());
        Ok(())
    }

    async fn fetch(&self, intent_id: U256) -> Result<Option<IntentArtifact>, OutboxError> {
        Ok(self.artifacts.lock().await.get(&intent_id).cloned())
    }
}
