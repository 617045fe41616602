//! Remote operation transport abstraction.
//!
//! The orchestrator is agnostic to the wire: anything that can return
//! operations newer than a version cursor and accept a batch of pushed
//! operations works. Delivery is at-least-once; the engine deduplicates
//! by operation id, so a transport may re-deliver freely.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabsync_ops::op::Operation;
use thiserror::Error;

/// Transport-level failure. Retryable by construction: a failed cycle
/// simply leaves the local queue intact.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Push failed: {0}")]
    PushFailed(String),

    #[error("Remote unavailable")]
    Unavailable,
}

/// Operations newer than the requested version, plus the remote's
/// current version cursor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedOps {
    pub operations: Vec<Operation>,
    pub last_version: u64,
}

/// Acknowledgment of a successful push.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    pub last_version: u64,
}

/// Abstract remote operation store.
#[async_trait]
pub trait OperationTransport: Send + Sync + 'static {
    /// Fetch all operations with a remote version greater than `version`.
    async fn fetch_since(&self, version: u64) -> Result<FetchedOps, TransportError>;

    /// Push locally queued operations. Pushing an operation the remote
    /// already holds is a no-op, not an error.
    async fn push(&self, ops: &[Operation]) -> Result<PushAck, TransportError>;
}

/// Shared in-memory operation store standing in for a remote, used by
/// tests and the convergence simulation. Each replica talks to it
/// through its own [`MemoryTransport`] handle.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
    fail_pushes: Arc<AtomicBool>,
    fail_fetches: Arc<AtomicBool>,
}

#[derive(Default)]
struct StoreInner {
    /// Operations in arrival order, tagged with server-assigned versions.
    log: Vec<(u64, Operation)>,
    next_version: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport handle for one replica.
    pub fn handle(&self) -> MemoryTransport {
        MemoryTransport {
            store: self.clone(),
        }
    }

    /// Make subsequent pushes fail until cleared (for retry tests).
    pub fn set_fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent fetches fail until cleared (for retry tests).
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Seed the store with operations, as if another client had pushed
    /// them earlier.
    pub fn seed(&self, ops: &[Operation]) {
        let mut inner = self.inner.write();
        for op in ops {
            if inner.log.iter().any(|(_, existing)| existing.id == op.id) {
                continue;
            }
            inner.next_version += 1;
            let version = inner.next_version;
            inner.log.push((version, op.clone()));
        }
    }

    /// Total number of distinct operations held.
    pub fn len(&self) -> usize {
        self.inner.read().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().log.is_empty()
    }
}

/// One replica's handle onto a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryTransport {
    store: MemoryStore,
}

#[async_trait]
impl OperationTransport for MemoryTransport {
    async fn fetch_since(&self, version: u64) -> Result<FetchedOps, TransportError> {
        if self.store.fail_fetches.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable);
        }

        let inner = self.store.inner.read();
        let operations = inner
            .log
            .iter()
            .filter(|(v, _)| *v > version)
            .map(|(_, op)| op.clone())
            .collect();
        Ok(FetchedOps {
            operations,
            last_version: inner.next_version,
        })
    }

    async fn push(&self, ops: &[Operation]) -> Result<PushAck, TransportError> {
        if self.store.fail_pushes.load(Ordering::SeqCst) {
            return Err(TransportError::PushFailed("remote rejected batch".to_string()));
        }

        self.store.seed(ops);
        Ok(PushAck {
            last_version: self.store.inner.read().next_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_ops::op::{BrowserId, OpKind};

    fn add(id: &str, ts: u64, instance: &str) -> Operation {
        Operation {
            id: id.to_string(),
            timestamp: ts,
            browser_id: BrowserId::new("browser-a"),
            kind: OpKind::AddSelection {
                instance_id: instance.to_string(),
                image_id: format!("img-{}", instance),
                file_name: None,
            },
        }
    }

    #[tokio::test]
    async fn test_push_then_fetch_since() {
        let store = MemoryStore::new();
        let transport = store.handle();

        let ack = transport
            .push(&[add("op-1", 100, "i1"), add("op-2", 200, "i2")])
            .await
            .unwrap();
        assert_eq!(ack.last_version, 2);

        let fetched = transport.fetch_since(0).await.unwrap();
        assert_eq!(fetched.operations.len(), 2);
        assert_eq!(fetched.last_version, 2);

        let fetched = transport.fetch_since(1).await.unwrap();
        assert_eq!(fetched.operations.len(), 1);
        assert_eq!(fetched.operations[0].id, "op-2");
    }

    #[tokio::test]
    async fn test_duplicate_push_is_a_noop() {
        let store = MemoryStore::new();
        let transport = store.handle();

        let op = add("op-1", 100, "i1");
        transport.push(&[op.clone()]).await.unwrap();
        let ack = transport.push(&[op]).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(ack.last_version, 1);
    }

    #[tokio::test]
    async fn test_push_failure_injection() {
        let store = MemoryStore::new();
        let transport = store.handle();

        store.set_fail_pushes(true);
        assert!(transport.push(&[add("op-1", 100, "i1")]).await.is_err());
        assert!(store.is_empty());

        store.set_fail_pushes(false);
        assert!(transport.push(&[add("op-1", 100, "i1")]).await.is_ok());
        assert_eq!(store.len(), 1);
    }
}
