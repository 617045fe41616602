//! Image lookup seam.
//!
//! The engine never talks to image storage directly; applying an
//! `AddSelection` resolves its display label through this trait.

use std::collections::HashMap;
use tabsync_ops::op::ImageId;

/// Descriptive metadata for one image, as returned by the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageRecord {
    /// Display file name, if the catalog has one.
    pub file_name: Option<String>,
    /// Name of the underlying source file, used when `file_name` is absent.
    pub source_name: Option<String>,
}

/// Lookup interface for image metadata.
pub trait ImageCatalog: Send + Sync {
    fn lookup(&self, image_id: &ImageId) -> Option<ImageRecord>;
}

/// In-memory catalog for tests and simulation.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    records: HashMap<ImageId, ImageRecord>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under `image_id` with a display file name.
    pub fn insert(&mut self, image_id: impl Into<ImageId>, file_name: impl Into<String>) {
        self.records.insert(
            image_id.into(),
            ImageRecord {
                file_name: Some(file_name.into()),
                source_name: None,
            },
        );
    }

    pub fn insert_record(&mut self, image_id: impl Into<ImageId>, record: ImageRecord) {
        self.records.insert(image_id.into(), record);
    }
}

impl ImageCatalog for MemoryCatalog {
    fn lookup(&self, image_id: &ImageId) -> Option<ImageRecord> {
        self.records.get(image_id).cloned()
    }
}
