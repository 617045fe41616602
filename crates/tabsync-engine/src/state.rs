//! The `SelectionState` projection and the reducer that folds resolved
//! operations into it.
//!
//! Applying an operation is total: malformed or unknown records leave
//! the state untouched instead of failing the pipeline. Convergence
//! across replicas comes from the reducer being deterministic and
//! idempotent over a resolved, chronologically sorted operation set.

use crate::catalog::ImageCatalog;
use crate::RECENCY_WINDOW_MS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabsync_ops::op::{
    BrowserId, ImageId, InstanceId, MetadataPatch, OpKind, Operation, SortDirection,
};
use tracing::{debug, warn};

/// One selected image instance. Order within
/// [`SelectionState::selected_images`] is user-visible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedImage {
    #[serde(rename = "id")]
    pub image_id: ImageId,
    pub instance_id: InstanceId,
    pub file_name: String,
}

/// Per-instance annotation metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Timestamp of the operation that last touched this entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

/// The mutable projection that operations are folded into.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub selected_images: Vec<SelectedImage>,
    pub instance_metadata: BTreeMap<InstanceId, InstanceMetadata>,
    pub defect_sort_direction: Option<SortDirection>,
}

/// Everything the reducer needs besides the state and the operation:
/// the resolving browser's identity, the current wall clock, and the
/// image lookup seam.
pub struct ApplyContext<'a> {
    pub browser_id: &'a BrowserId,
    pub now_ms: u64,
    pub catalog: &'a dyn ImageCatalog,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, instance_id: &str) -> bool {
        self.selected_images
            .iter()
            .any(|entry| entry.instance_id == instance_id)
    }

    pub fn metadata(&self, instance_id: &str) -> Option<&InstanceMetadata> {
        self.instance_metadata.get(instance_id)
    }

    /// Fold one operation into the state. Never panics; operations that
    /// do not apply (duplicate adds, deletes of absent instances,
    /// unknown kinds) are no-ops.
    pub fn apply(&mut self, op: &Operation, ctx: &ApplyContext<'_>) {
        match &op.kind {
            OpKind::AddSelection {
                instance_id,
                image_id,
                file_name,
            } => self.apply_add(instance_id, image_id, file_name.as_deref(), ctx),
            OpKind::DeleteSelection { instance_id } => self.apply_delete(instance_id),
            OpKind::UpdateMetadata { instance_id, data } => {
                self.apply_update(instance_id, data, op, ctx)
            }
            OpKind::SortChange { sort_direction } => {
                // `None` is a no-op sentinel, not "clear the direction".
                if let Some(direction) = sort_direction {
                    self.defect_sort_direction = Some(*direction);
                }
            }
            OpKind::Unknown => {
                warn!(op_id = %op.id, "ignoring operation of unknown kind");
            }
        }
    }

    /// Fold a resolved, chronologically sorted operation list into the
    /// state.
    pub fn apply_all(&mut self, ops: &[Operation], ctx: &ApplyContext<'_>) {
        for op in ops {
            self.apply(op, ctx);
        }
    }

    fn apply_add(
        &mut self,
        instance_id: &InstanceId,
        image_id: &ImageId,
        op_file_name: Option<&str>,
        ctx: &ApplyContext<'_>,
    ) {
        if self.is_selected(instance_id) {
            return;
        }

        let file_name = resolve_file_name(image_id, op_file_name, ctx.catalog);
        let entry = SelectedImage {
            image_id: image_id.clone(),
            instance_id: instance_id.clone(),
            file_name,
        };

        // Under descending sort the newest selection goes first; applying
        // in chronological order keeps the list sorted without a re-sort.
        if self.defect_sort_direction == Some(SortDirection::Desc) {
            self.selected_images.insert(0, entry);
        } else {
            self.selected_images.push(entry);
        }
    }

    fn apply_delete(&mut self, instance_id: &InstanceId) {
        self.selected_images
            .retain(|entry| entry.instance_id != *instance_id);
        self.instance_metadata.remove(instance_id);
    }

    fn apply_update(
        &mut self,
        instance_id: &InstanceId,
        patch: &MetadataPatch,
        op: &Operation,
        ctx: &ApplyContext<'_>,
    ) {
        // Recency re-check at apply time: a replay of this browser's own
        // operation must not clobber a fresher local edit.
        if let Some(last_modified) = self
            .instance_metadata
            .get(instance_id)
            .and_then(|meta| meta.last_modified)
        {
            if last_modified > op.timestamp
                && ctx.now_ms.saturating_sub(last_modified) < RECENCY_WINDOW_MS
                && op.browser_id == *ctx.browser_id
            {
                debug!(op_id = %op.id, %instance_id, "skipping replayed metadata update");
                return;
            }
        }

        let meta = self.instance_metadata.entry(instance_id.clone()).or_default();
        if let Some(number) = &patch.photo_number {
            meta.photo_number = Some(number.clone());
        }
        if let Some(text) = &patch.description {
            meta.description = Some(text.clone());
        }
        meta.last_modified = Some(op.timestamp);
    }
}

/// Fallback chain for the display label of a new selection:
/// catalog file name, then the catalog's source file name, then the
/// name carried on the operation, then a literal `"unknown"`.
fn resolve_file_name(
    image_id: &ImageId,
    op_file_name: Option<&str>,
    catalog: &dyn ImageCatalog,
) -> String {
    if let Some(record) = catalog.lookup(image_id) {
        if let Some(name) = record.file_name.or(record.source_name) {
            return name;
        }
    }
    op_file_name.unwrap_or("unknown").to_string()
}
