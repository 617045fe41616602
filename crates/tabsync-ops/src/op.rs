//! Operation records — the unit of synchronization.
//!
//! Every user intent (select an image, deselect it, edit its metadata,
//! change the sort preference) is captured as one immutable `Operation`
//! and appended to the local queue. Operations carry no behavior; they
//! are pure data folded into a `SelectionState` downstream.

use serde::{Deserialize, Serialize};

/// Globally unique operation identifier,
/// format `{epochMillis}-{browserId}-{randomSuffix}`.
pub type OpId = String;

/// Identifies one selection instance. An image may be selected more
/// than once; each selection gets its own instance id.
pub type InstanceId = String;

/// Identifies the underlying image.
pub type ImageId = String;

/// Stable per-browser identifier, persisted across reloads of the same
/// browser profile. Always injected explicitly, never read from ambient
/// storage.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BrowserId(pub String);

impl BrowserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BrowserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sort preference for the selected-image list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Partial metadata edit. Absent fields mean "leave unchanged";
/// patches are shallow-merged onto existing metadata on apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetadataPatch {
    pub fn photo_number(number: impl Into<String>) -> Self {
        Self {
            photo_number: Some(number.into()),
            ..Default::default()
        }
    }

    pub fn description(text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            ..Default::default()
        }
    }
}

/// The operation payload, tagged by kind. Each variant carries only the
/// fields relevant to that kind.
///
/// `Unknown` absorbs kinds emitted by newer clients: such records
/// deserialize cleanly, are logged at apply time, and leave the state
/// untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OpKind {
    AddSelection {
        instance_id: InstanceId,
        image_id: ImageId,
        /// Fallback label when the image cannot be looked up at apply time.
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    DeleteSelection {
        instance_id: InstanceId,
    },
    UpdateMetadata {
        instance_id: InstanceId,
        data: MetadataPatch,
    },
    SortChange {
        /// `None` is a no-op sentinel: the existing direction is kept.
        sort_direction: Option<SortDirection>,
    },
    #[serde(other)]
    Unknown,
}

impl OpKind {
    /// The selection instance this operation targets, if any.
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            OpKind::AddSelection { instance_id, .. }
            | OpKind::DeleteSelection { instance_id }
            | OpKind::UpdateMetadata { instance_id, .. } => Some(instance_id),
            OpKind::SortChange { .. } | OpKind::Unknown => None,
        }
    }
}

/// An immutable, append-only record of a single user intent.
///
/// Operations live in the local queue until a sync cycle is
/// acknowledged, then are discarded; durability of their effect lives
/// in the projected `SelectionState`, never in the record itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OpId,
    /// Creation time in epoch milliseconds.
    pub timestamp: u64,
    pub browser_id: BrowserId,
    #[serde(flatten)]
    pub kind: OpKind,
}

impl Operation {
    /// Create an operation stamped with a fresh id for `browser_id`.
    pub fn new(browser_id: BrowserId, timestamp: u64, kind: OpKind) -> Self {
        Self {
            id: crate::id::create_op_id(&browser_id, timestamp),
            timestamp,
            browser_id,
            kind,
        }
    }

    /// Total ordering key for chronological application.
    ///
    /// The id tie-break makes ordering deterministic across replicas
    /// for operations sharing a timestamp.
    pub fn sort_key(&self) -> (u64, &str) {
        (self.timestamp, self.id.as_str())
    }
}
