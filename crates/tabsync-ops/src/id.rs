//! Operation ID generation.
//!
//! IDs follow the format `{epochMillis}-{browserId}-{randomSuffix}`.
//! The 7-character base36 suffix makes collisions negligible within one
//! browser's lifetime; uniqueness across browsers comes from the
//! embedded browser id.

use crate::op::{BrowserId, OpId};
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Build a globally unique operation id for `browser_id` at `timestamp`.
pub fn create_op_id(browser_id: &BrowserId, timestamp: u64) -> OpId {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}-{}", timestamp, browser_id, suffix)
}

/// Build an instance id for a new selection. Same shape as an
/// operation id; an image selected twice gets two distinct instances.
pub fn create_instance_id(browser_id: &BrowserId, timestamp: u64) -> crate::op::InstanceId {
    create_op_id(browser_id, timestamp)
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_id_format() {
        let id = create_op_id(&BrowserId::new("browser-a"), 1_700_000_000_000);
        let mut parts = id.splitn(3, '-');

        assert_eq!(parts.next(), Some("1700000000000"));
        assert_eq!(parts.next(), Some("browser"));

        let rest = parts.next().unwrap();
        let suffix = rest.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_op_ids_are_unique() {
        let browser = BrowserId::new("browser-a");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(create_op_id(&browser, 100)));
        }
    }

    #[test]
    fn test_epoch_millis_is_monotonic_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
    }
}
