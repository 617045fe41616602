//! Tabsync client - drives one annotation workspace replica.
//!
//! This crate wraps the pure merge/resolve/apply core from
//! `tabsync-engine` with the sync orchestrator and the collaborator
//! seams it talks to: a remote operation transport, a state persistence
//! backend, and an image catalog.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tabsync_client::{MemoryPersistence, MemoryStore, SyncConfig, SyncOrchestrator};
//! use tabsync_engine::catalog::MemoryCatalog;
//! use tabsync_ops::op::BrowserId;
//!
//! # async fn run() {
//! let store = MemoryStore::new();
//! let mut catalog = MemoryCatalog::new();
//! catalog.insert("img-1", "IMG_0001.jpg");
//!
//! let client = SyncOrchestrator::new(
//!     BrowserId::new("browser-a"),
//!     Arc::new(store.handle()),
//!     Arc::new(MemoryPersistence::new()),
//!     Arc::new(catalog),
//!     SyncConfig::default(),
//! );
//!
//! // Edits queue locally and survive offline periods.
//! let instance = client.add_selection("img-1", None);
//!
//! // A sync cycle reconciles them with every other session's edits.
//! client.sync().await.unwrap();
//! assert!(client.state().is_selected(&instance));
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`orchestrator`] - The fetch → merge → resolve → apply → persist cycle
//! - [`transport`] - Remote operation store abstraction
//! - [`storage`] - Snapshot persistence abstraction
//! - [`error`] - Error types

pub mod error;
pub mod orchestrator;
pub mod storage;
pub mod transport;

// Re-exports for convenience
pub use error::{Result, SyncError};
pub use orchestrator::{SyncConfig, SyncConfigBuilder, SyncOrchestrator, SyncReport};
pub use storage::{MemoryPersistence, PersistenceError, StatePersistence};
pub use transport::{FetchedOps, MemoryStore, MemoryTransport, OperationTransport, PushAck, TransportError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::orchestrator::{SyncConfig, SyncOrchestrator};
    pub use crate::storage::StatePersistence;
    pub use crate::transport::OperationTransport;
    pub use tabsync_engine::catalog::ImageCatalog;
    pub use tabsync_engine::state::SelectionState;
    pub use tabsync_ops::op::{BrowserId, MetadataPatch, Operation, SortDirection};
}
