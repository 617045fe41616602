// File: `crates/tabsync-ops/src/lib.rs`
pub mod id;
pub mod op;
