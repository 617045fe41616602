//! Merging local and remote operation logs.
//!
//! Delivery is at-least-once, so the same operation may arrive from
//! both sides or twice from the remote. Merge deduplicates by id and
//! imposes one total order so that every replica folds the same set in
//! the same sequence.

use std::collections::HashSet;
use tabsync_ops::op::Operation;

/// Combine local and remote operation lists into one deduplicated set,
/// sorted ascending by `(timestamp, id)`.
///
/// Duplicate ids keep their first occurrence; the id tie-break makes
/// the output independent of which side an operation arrived from.
pub fn merge(local: &[Operation], remote: &[Operation]) -> Vec<Operation> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
    let mut merged: Vec<Operation> = Vec::with_capacity(local.len() + remote.len());

    for op in local.iter().chain(remote.iter()) {
        if seen.insert(op.id.as_str()) {
            merged.push(op.clone());
        }
    }

    merged.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_ops::op::{BrowserId, OpKind, SortDirection};

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

    fn sort_change(id: &str, ts: u64) -> Operation {
        Operation {
            id: id.to_string(),
            timestamp: ts,
            browser_id: BrowserId::new("browser-b"),
            kind: OpKind::SortChange {
                sort_direction: Some(SortDirection::Desc),
            },
        }
    }

    #[test]
    fn test_merge_sorts_by_timestamp() {
        let local = vec![add("op-3", 300, "i3"), add("op-1", 100, "i1")];
        let remote = vec![add("op-2", 200, "i2")];

        let merged = merge(&local, &remote);
        let ids: Vec<_> = merged.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-1", "op-2", "op-3"]);
    }

    #[test]
    fn test_merge_deduplicates_by_id() {
        let op = add("op-1", 100, "i1");
        let merged = merge(&[op.clone()], &[op.clone(), op]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = vec![add("op-1", 100, "i1"), sort_change("op-4", 100)];
        let b = vec![add("op-2", 200, "i2"), add("op-1", 100, "i1")];

        assert_eq!(merge(&a, &b), merge(&b, &a));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = vec![add("op-1", 100, "i1"), add("op-2", 200, "i2")];
        let b = vec![add("op-3", 150, "i3")];

        let once = merge(&a, &b);
        let twice = merge(&once, &b);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_tie_break_on_id() {
        // Same timestamp: the id decides, not the concatenation order.
        let x = add("op-a", 100, "i1");
        let y = sort_change("op-b", 100);

        let forward = merge(&[x.clone()], &[y.clone()]);
        let reverse = merge(&[y], &[x]);

        assert_eq!(forward, reverse);
        assert_eq!(forward[0].id, "op-a");
    }
}
