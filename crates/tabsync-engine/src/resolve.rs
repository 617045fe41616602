//! Conflict resolution over a merged, time-sorted operation set.
//!
//! Rules, evaluated per selection instance:
//!
//! 1. Delete dominance: a `DeleteSelection` discards every other
//!    operation on that instance, regardless of relative timestamps.
//! 2. Metadata last-writer-wins with recency protection: exactly one
//!    `UpdateMetadata` survives per instance. A candidate from the
//!    resolving browser younger than [`RECENCY_WINDOW_MS`] is kept
//!    over replays of that browser's own operations, unless a
//!    later-timestamped update from another browser supersedes it;
//!    otherwise the greatest `(timestamp, id)` wins.
//! 3. Additions and sort changes never conflict.
//!
//! The output is re-sorted ascending so the applier sees operations in
//! chronological order (an update must follow its add).

use crate::RECENCY_WINDOW_MS;
use std::collections::{BTreeMap, BTreeSet};
use tabsync_ops::op::{BrowserId, InstanceId, OpId, OpKind, Operation};

/// Reduce a merged operation set to a contradiction-free list, sorted
/// ascending by `(timestamp, id)` for application.
pub fn resolve(ops: &[Operation], local_browser: &BrowserId, now_ms: u64) -> Vec<Operation> {
    let deleted: BTreeSet<&InstanceId> = ops
        .iter()
        .filter_map(|op| match &op.kind {
            OpKind::DeleteSelection { instance_id } => Some(instance_id),
            _ => None,
        })
        .collect();

    // Group surviving metadata updates per instance and pick one winner each.
    let mut updates: BTreeMap<&InstanceId, Vec<&Operation>> = BTreeMap::new();
    for op in ops {
        if let OpKind::UpdateMetadata { instance_id, .. } = &op.kind {
            if !deleted.contains(instance_id) {
                updates.entry(instance_id).or_default().push(op);
            }
        }
    }
    let winners: BTreeSet<&OpId> = updates
        .values()
        .map(|candidates| &pick_update_winner(candidates, local_browser, now_ms).id)
        .collect();

    let mut resolved: Vec<Operation> = ops
        .iter()
        .filter(|op| match &op.kind {
            OpKind::AddSelection { instance_id, .. } => !deleted.contains(instance_id),
            OpKind::UpdateMetadata { .. } => winners.contains(&op.id),
            OpKind::DeleteSelection { .. } | OpKind::SortChange { .. } | OpKind::Unknown => true,
        })
        .cloned()
        .collect();

    resolved.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    resolved
}

/// Choose the surviving metadata update among competing candidates for
/// one instance.
fn pick_update_winner<'a>(
    candidates: &[&'a Operation],
    local_browser: &BrowserId,
    now_ms: u64,
) -> &'a Operation {
    let newest = candidates
        .iter()
        .max_by(|a, b| a.sort_key().cmp(&b.sort_key()))
        .copied()
        .unwrap_or(candidates[0]);

    // Recency protection: prefer this browser's own fresh edit over a
    // replay of its own earlier operation. An update from another
    // browser with a strictly later timestamp still supersedes it.
    let protected = candidates
        .iter()
        .filter(|op| {
            op.browser_id == *local_browser
                && now_ms.saturating_sub(op.timestamp) <= RECENCY_WINDOW_MS
        })
        .max_by(|a, b| a.sort_key().cmp(&b.sort_key()))
        .copied();

    if let Some(protected) = protected {
        let superseded = candidates
            .iter()
            .any(|op| op.browser_id != *local_browser && op.timestamp > protected.timestamp);
        if !superseded {
            return protected;
        }
    }

    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_ops::op::MetadataPatch;

    fn browser(name: &str) -> BrowserId {
        BrowserId::new(name)
    }

    fn add(id: &str, ts: u64, by: &str, instance: &str) -> Operation {
        Operation {
            id: id.to_string(),
            timestamp: ts,
            browser_id: browser(by),
            kind: OpKind::AddSelection {
                instance_id: instance.to_string(),
                image_id: format!("img-{}", instance),
                file_name: None,
            },
        }
    }

    fn delete(id: &str, ts: u64, by: &str, instance: &str) -> Operation {
        Operation {
            id: id.to_string(),
            timestamp: ts,
            browser_id: browser(by),
            kind: OpKind::DeleteSelection {
                instance_id: instance.to_string(),
            },
        }
    }

    fn update(id: &str, ts: u64, by: &str, instance: &str, number: &str) -> Operation {
        Operation {
            id: id.to_string(),
            timestamp: ts,
            browser_id: browser(by),
            kind: OpKind::UpdateMetadata {
                instance_id: instance.to_string(),
                data: MetadataPatch::photo_number(number),
            },
        }
    }

    #[test]
    fn test_delete_dominates_earlier_and_later_ops() {
        let ops = vec![
            add("op-1", 100, "browser-a", "x"),
            delete("op-2", 150, "browser-b", "x"),
            update("op-3", 200, "browser-a", "x", "5"),
        ];

        let resolved = resolve(&ops, &browser("browser-a"), 1_000_000);
        let ids: Vec<_> = resolved.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-2"]);
    }

    #[test]
    fn test_delete_only_affects_its_own_instance() {
        let ops = vec![
            add("op-1", 100, "browser-a", "x"),
            add("op-2", 110, "browser-a", "y"),
            delete("op-3", 150, "browser-b", "x"),
        ];

        let resolved = resolve(&ops, &browser("browser-a"), 1_000_000);
        let ids: Vec<_> = resolved.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-2", "op-3"]);
    }

    #[test]
    fn test_last_writer_wins_across_browsers() {
        let ops = vec![
            update("op-1", 100, "browser-a", "x", "1"),
            update("op-2", 200, "browser-b", "x", "2"),
        ];

        // Neither candidate is within the protection window.
        let resolved = resolve(&ops, &browser("browser-a"), 1_000_000);
        let ids: Vec<_> = resolved.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-2"]);
    }

    #[test]
    fn test_recency_protection_wins_timestamp_tie() {
        let now = 1_700_000_001_000;
        let ops = vec![
            // This browser's fresh edit.
            update("op-a", 1_700_000_000_000, "browser-a", "x", "7"),
            // Concurrent update from another browser at the same
            // timestamp; plain LWW would pick it on the id tie-break.
            update("op-b", 1_700_000_000_000, "browser-b", "x", "3"),
        ];

        let resolved = resolve(&ops, &browser("browser-a"), now);
        assert_eq!(resolved[0].id, "op-a");

        // Once the local edit ages out of the window, the id tie-break
        // decides again.
        let later = now + RECENCY_WINDOW_MS + 1;
        let resolved = resolve(&ops, &browser("browser-a"), later);
        assert_eq!(resolved[0].id, "op-b");
    }

    #[test]
    fn test_recency_protection_superseded_by_later_update() {
        let now = 1_700_000_001_000;
        let ops = vec![
            update("op-1", 1_700_000_000_000, "browser-a", "x", "7"),
            update("op-2", 1_700_000_000_500, "browser-b", "x", "9"),
        ];

        // browser-a's edit is fresh, but browser-b's strictly later
        // update supersedes it.
        let resolved = resolve(&ops, &browser("browser-a"), now);
        assert_eq!(resolved[0].id, "op-2");
    }

    #[test]
    fn test_recency_protection_only_applies_to_resolving_browser() {
        let now = 1_700_000_001_000;
        let ops = vec![
            update("op-a", 1_700_000_000_000, "browser-a", "x", "7"),
            update("op-b", 1_700_000_000_000, "browser-b", "x", "3"),
        ];

        // Resolving as an uninvolved browser: nothing is protected and
        // the id tie-break picks op-b.
        let resolved = resolve(&ops, &browser("browser-c"), now);
        assert_eq!(resolved[0].id, "op-b");
    }

    #[test]
    fn test_one_update_survives_per_instance() {
        let ops = vec![
            update("op-1", 100, "browser-a", "x", "1"),
            update("op-2", 200, "browser-b", "x", "2"),
            update("op-3", 150, "browser-c", "y", "3"),
        ];

        let resolved = resolve(&ops, &browser("browser-a"), 1_000_000);
        let ids: Vec<_> = resolved.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-3", "op-2"]);
    }

    #[test]
    fn test_output_is_chronologically_sorted() {
        let ops = vec![
            update("op-3", 300, "browser-a", "x", "1"),
            add("op-1", 100, "browser-a", "x"),
            add("op-2", 200, "browser-b", "y"),
        ];

        let resolved = resolve(&ops, &browser("browser-a"), 1_000_000);
        let timestamps: Vec<_> = resolved.iter().map(|op| op.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let mut ops = vec![
            add("op-1", 100, "browser-a", "x"),
            delete("op-4", 150, "browser-b", "x"),
            update("op-2", 200, "browser-a", "x", "5"),
            update("op-3", 250, "browser-b", "y", "6"),
        ];

        let forward = resolve(&ops, &browser("browser-a"), 1_000_000);
        ops.reverse();
        let backward = resolve(&ops, &browser("browser-a"), 1_000_000);
        assert_eq!(forward, backward);
    }
}
