use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::flow::{RestoreFlow, RestoreState};

/// Serialized snapshot of the in-flight or last-completed job, written so a
/// restart can resume polling the same prediction id instead of losing
/// track of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub prediction_id: String,
    pub original_filename: String,
    pub state: RestoreState,
    pub restored_image_url: Option<String>,
    pub error: Option<String>,
}

impl Checkpoint {
    pub fn from_flow(flow: &RestoreFlow, original_filename: &str) -> Option<Self> {
        Some(Self {
            prediction_id: flow.prediction_id()?.to_string(),
            original_filename: original_filename.to_string(),
            state: flow.state(),
            restored_image_url: flow.restored_image_url().map(|s| s.to_string()),
            error: flow.last_error().map(|s| s.to_string()),
        })
    }
}

/// File-backed checkpoint store.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Persist the checkpoint, replacing any previous one.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let data = serde_json::to_vec_pretty(checkpoint)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// Load the stored checkpoint. A missing or unreadable file yields
    /// `None`; a corrupt checkpoint is discarded rather than wedging the
    /// client.
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::Io(e)),
        };

        match serde_json::from_slice(&data) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding corrupt checkpoint");
                Ok(None)
            }
        }
    }

    /// Remove the checkpoint (start-over).
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Io(e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> CheckpointStore {
        let path = std::env::temp_dir().join(format!("checkpoint_{}.json", Uuid::new_v4()));
        CheckpointStore::new(path)
    }

    fn sample_checkpoint() -> Checkpoint {
        Checkpoint {
            prediction_id: "pred-1".to_string(),
            original_filename: "old.jpg".to_string(),
            state: RestoreState::Loading,
            restored_image_url: None,
            error: None,
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = temp_store();
        store.save(&sample_checkpoint()).unwrap();

        let loaded = store.load().unwrap().expect("checkpoint should exist");
        assert_eq!(loaded.prediction_id, "pred-1");
        assert_eq!(loaded.state, RestoreState::Loading);

        store.clear().unwrap();
    }

    #[test]
    fn test_load_missing_yields_none() {
        let store = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_checkpoint_discarded() {
        let store = temp_store();
        std::fs::write(&store.path, b"{ not json").unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = temp_store();
        store.clear().unwrap();
        store.clear().unwrap();
    }
}
