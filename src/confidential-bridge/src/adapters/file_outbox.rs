use std::path::{Path, PathBuf};

use alloy_primitives::U256;

use crate::{
    artifact::IntentArtifact,
    ports::{IntentOutbox, OutboxError},
};

/// One `intent-<id>.json` per exported intent under `dir`.
#[derive(Debug, Clone)]
pub struct FileOutbox {
    dir: PathBuf,
}

impl FileOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, intent_id: U256) -> PathBuf {
        self.dir.join(format!("intent-{intent_id}.json"))
    }
}

impl IntentOutbox for FileOutbox {
    async fn publish(&self, artifact: &IntentArtifact) -> Result<(), OutboxError> {
        artifact.write_to(&self.path_for(artifact.intent_id()))?;
        Ok(())
    }

    async fn fetch(&self, intent_id: U256) -> Result<Option<IntentArtifact>, OutboxError> {
        let path = self.path_for(intent_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(IntentArtifact::read_from(&path)?))
    }
}
