// File: `crates/tabsync-engine/src/lib.rs`
pub mod catalog;
pub mod merge;
pub mod resolve;
pub mod state;

/// Window (in milliseconds) during which a browser's own very recent
/// metadata edit is preferred over a competing replayed operation
/// attributed to the same browser.
pub const RECENCY_WINDOW_MS: u64 = 5000;
