//! State persistence seam.
//!
//! The orchestrator writes the post-apply snapshot through this trait;
//! the engine itself holds no persistent storage. The in-memory
//! implementation keeps the snapshot as serialized JSON, the same shape
//! a browser-storage or key-value backend would hold.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tabsync_engine::state::SelectionState;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),
}

/// Abstract snapshot store for the projected `SelectionState`.
#[async_trait]
pub trait StatePersistence: Send + Sync + 'static {
    async fn save(&self, state: &SelectionState) -> Result<(), PersistenceError>;

    async fn load(&self) -> Result<Option<SelectionState>, PersistenceError>;
}

/// In-memory persistence for tests and simulation.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    snapshot: Arc<RwLock<Option<String>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatePersistence for MemoryPersistence {
    async fn save(&self, state: &SelectionState) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(state)
            .map_err(|e| PersistenceError::WriteFailed(e.to_string()))?;
        *self.snapshot.write() = Some(json);
        Ok(())
    }

    async fn load(&self) -> Result<Option<SelectionState>, PersistenceError> {
        match self.snapshot.read().as_deref() {
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|e| PersistenceError::ReadFailed(e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_engine::state::SelectedImage;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let persistence = MemoryPersistence::new();
        assert_eq!(persistence.load().await.unwrap(), None);

        let mut state = SelectionState::new();
        state.selected_images.push(SelectedImage {
            image_id: "img-1".to_string(),
            instance_id: "inst-1".to_string(),
            file_name: "IMG_0001.jpg".to_string(),
        });

        persistence.save(&state).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), Some(state));
    }
}
