//! The sync orchestrator: local edit API plus the
//! fetch → merge → resolve → apply → persist → clear cycle.
//!
//! Safety under concurrent edits across sessions comes entirely from
//! the commutativity and determinism of merge/resolve/apply — there is
//! no lock shared between replicas. A cycle may be abandoned at any
//! point before the queue clear and retried from scratch.

use crate::error::{Result, SyncError};
use crate::storage::StatePersistence;
use crate::transport::OperationTransport;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tabsync_engine::catalog::ImageCatalog;
use tabsync_engine::merge::merge;
use tabsync_engine::resolve::resolve;
use tabsync_engine::state::{ApplyContext, SelectionState};
use tabsync_ops::id::{create_instance_id, epoch_millis};
use tabsync_ops::op::{
    BrowserId, ImageId, InstanceId, MetadataPatch, OpKind, Operation, SortDirection,
};
use tracing::{debug, warn};

/// Configuration for sync behavior.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Suggested delay between periodic sync cycles (in milliseconds).
    pub sync_interval_ms: u64,
    /// Maximum operations pushed per transport call.
    pub max_push_batch: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 1000,
            max_push_batch: 100,
        }
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn sync_interval(mut self, ms: u64) -> Self {
        self.config.sync_interval_ms = ms;
        self
    }

    pub fn max_push_batch(mut self, size: usize) -> Self {
        self.config.max_push_batch = size;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one completed sync cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations fetched from the remote.
    pub fetched: usize,
    /// Operations surviving conflict resolution and applied.
    pub applied: usize,
    /// Locally queued operations pushed and acknowledged.
    pub pushed: usize,
}

struct Inner {
    state: SelectionState,
    pending: Vec<Operation>,
    /// Remote version cursor: everything at or below has been folded in.
    version: u64,
}

/// Drives one annotation workspace replica.
///
/// The browser identity is injected at construction and stamped onto
/// every operation this replica creates.
pub struct SyncOrchestrator<T: OperationTransport, P: StatePersistence> {
    browser_id: BrowserId,
    config: SyncConfig,
    transport: Arc<T>,
    persistence: Arc<P>,
    catalog: Arc<dyn ImageCatalog>,
    inner: RwLock<Inner>,
}

impl<T: OperationTransport, P: StatePersistence> SyncOrchestrator<T, P> {
    pub fn new(
        browser_id: BrowserId,
        transport: Arc<T>,
        persistence: Arc<P>,
        catalog: Arc<dyn ImageCatalog>,
        config: SyncConfig,
    ) -> Self {
        Self {
            browser_id,
            config,
            transport,
            persistence,
            catalog,
            inner: RwLock::new(Inner {
                state: SelectionState::new(),
                pending: Vec::new(),
                version: 0,
            }),
        }
    }

    pub fn browser_id(&self) -> &BrowserId {
        &self.browser_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Suggested delay between periodic sync cycles.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.config.sync_interval_ms)
    }

    /// Snapshot of the current projected state.
    pub fn state(&self) -> SelectionState {
        self.inner.read().state.clone()
    }

    /// Number of operations awaiting acknowledgment.
    pub fn pending_len(&self) -> usize {
        self.inner.read().pending.len()
    }

    /// Select an image. Returns the new selection's instance id; the
    /// same image can be selected again under a fresh instance.
    pub fn add_selection(
        &self,
        image_id: impl Into<ImageId>,
        file_name: Option<String>,
    ) -> InstanceId {
        let now = epoch_millis();
        let instance_id = create_instance_id(&self.browser_id, now);
        self.record(Operation::new(
            self.browser_id.clone(),
            now,
            OpKind::AddSelection {
                instance_id: instance_id.clone(),
                image_id: image_id.into(),
                file_name,
            },
        ));
        instance_id
    }

    /// Deselect one selection instance.
    pub fn delete_selection(&self, instance_id: impl Into<InstanceId>) {
        self.record(Operation::new(
            self.browser_id.clone(),
            epoch_millis(),
            OpKind::DeleteSelection {
                instance_id: instance_id.into(),
            },
        ));
    }

    /// Edit an instance's metadata. Absent patch fields are left
    /// unchanged.
    pub fn update_metadata(&self, instance_id: impl Into<InstanceId>, patch: MetadataPatch) {
        self.record(Operation::new(
            self.browser_id.clone(),
            epoch_millis(),
            OpKind::UpdateMetadata {
                instance_id: instance_id.into(),
                data: patch,
            },
        ));
    }

    /// Change the sort preference. `None` is recorded as-is and applies
    /// as a no-op.
    pub fn change_sort(&self, direction: Option<SortDirection>) {
        self.record(Operation::new(
            self.browser_id.clone(),
            epoch_millis(),
            OpKind::SortChange {
                sort_direction: direction,
            },
        ));
    }

    /// Queue an operation for the next cycle. The snapshot is only
    /// updated by `sync`, which folds pending and remote operations in
    /// one chronological order — folding local edits early would let
    /// two replicas disagree on list positions.
    fn record(&self, op: Operation) {
        self.inner.write().pending.push(op);
    }

    /// Run one sync cycle: fetch remote operations, merge with the
    /// pending queue, resolve conflicts, fold the result onto the
    /// snapshot, persist, push the queue, and clear it on
    /// acknowledgment.
    ///
    /// On any error the queue and version cursor are left untouched, so
    /// the cycle can simply be retried.
    pub async fn sync(&self) -> Result<SyncReport> {
        let (pending, since, base) = {
            let inner = self.inner.read();
            (inner.pending.clone(), inner.version, inner.state.clone())
        };

        let fetched = self.transport.fetch_since(since).await?;
        debug!(
            browser = %self.browser_id,
            since,
            fetched = fetched.operations.len(),
            pending = pending.len(),
            "sync cycle started"
        );

        let now = epoch_millis();
        let merged = merge(&pending, &fetched.operations);
        let resolved = resolve(&merged, &self.browser_id, now);

        let mut state = base;
        let ctx = ApplyContext {
            browser_id: &self.browser_id,
            now_ms: now,
            catalog: self.catalog.as_ref(),
        };
        state.apply_all(&resolved, &ctx);

        self.persistence.save(&state).await?;

        let mut push_ack = None;
        if !pending.is_empty() {
            for batch in pending.chunks(self.config.max_push_batch.max(1)) {
                match self.transport.push(batch).await {
                    Ok(ack) => push_ack = Some(ack),
                    Err(err) => {
                        // Anything pushed so far is deduplicated on retry.
                        warn!(browser = %self.browser_id, %err, "push failed, keeping queue");
                        return Err(SyncError::from(err));
                    }
                }
            }
        }

        let report = SyncReport {
            fetched: fetched.operations.len(),
            applied: resolved.len(),
            pushed: pending.len(),
        };

        // The push acknowledgment may cover remote operations this cycle
        // never saw, so the cursor normally advances only to the fetched
        // version; our own operations get refetched once, harmlessly.
        // When the ack accounts for exactly our pushes and nothing else,
        // every skipped version is ours and the cursor can take it.
        let mut cursor = fetched.last_version;
        if let Some(ack) = push_ack {
            if fetched.last_version == since
                && ack.last_version == since + pending.len() as u64
            {
                cursor = ack.last_version;
            }
        }

        let mut inner = self.inner.write();
        inner.state = state;
        inner.version = inner.version.max(cursor);
        inner
            .pending
            .retain(|op| !pending.iter().any(|acked| acked.id == op.id));

        debug!(browser = %self.browser_id, ?report, "sync cycle completed");
        Ok(report)
    }

    /// Run sync cycles at the configured interval until the task is
    /// dropped. Failed cycles are logged and retried on the next tick;
    /// retrying is always safe.
    pub async fn run_periodic(&self) {
        loop {
            if let Err(err) = self.sync().await {
                warn!(browser = %self.browser_id, %err, "sync cycle failed, will retry");
            }
            tokio::time::sleep(self.sync_interval()).await;
        }
    }
}
