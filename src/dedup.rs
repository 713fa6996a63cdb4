//! Duplicate event suppression
//!
//! Duplicates arise when the same physical spike is detected twice under
//! slightly different alignment, most visibly right after a merge shifts one
//! unit's times onto another's. Suppression is a greedy left-to-right scan,
//! not a mutual-distance clustering: an anchor absorbs every later event
//! within the tolerance of the anchor itself, so a drifting chain collapses
//! entirely into its first event.

use log::debug;

use crate::types::{EventStream, REMOVED_LABEL};

/// Indices of duplicate events in a time-ascending, single-unit sequence.
///
/// An event not yet marked removed becomes an anchor; every subsequent event
/// within `tol` samples of the anchor (inclusive) is marked for removal. The
/// first event beyond the window becomes the next anchor. O(n).
pub fn find_duplicate_times(times: &[i64], tol: i64) -> Vec<usize> {
    let mut removed = Vec::new();
    let mut deleted = vec![false; times.len()];
    for i1 in 0..times.len() {
        if deleted[i1] {
            continue;
        }
        let mut i2 = i1 + 1;
        while i2 < times.len() && times[i2] <= times[i1] + tol {
            removed.push(i2);
            deleted[i2] = true;
            i2 += 1;
        }
    }
    removed
}

/// Remove per-unit duplicates from a time-ascending mixed-label stream.
///
/// Each unit's events are scanned independently; duplicates get the removed
/// label and are dropped from the returned stream. Surviving events keep
/// their order and labels.
pub fn remove_duplicate_events(events: &EventStream, tol: i64) -> EventStream {
    let mut labels = events.labels.clone();
    let mut total_removed = 0usize;
    for unit_id in 1..=events.num_units() as u32 {
        let inds = events.unit_indices(unit_id);
        if inds.is_empty() {
            continue;
        }
        let times0: Vec<i64> = inds.iter().map(|&i| events.times[i]).collect();
        let duplicates = find_duplicate_times(&times0, tol);
        if !duplicates.is_empty() {
            debug!(
                "Removing {} duplicate events in unit {}",
                duplicates.len(),
                unit_id
            );
            total_removed += duplicates.len();
            for &d in &duplicates {
                labels[inds[d]] = REMOVED_LABEL;
            }
        }
    }
    let mut out = EventStream::with_capacity(events.len() - total_removed);
    for i in 0..events.len() {
        if labels[i] != REMOVED_LABEL {
            out.push(events.times[i], labels[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_scenario() {
        // 103 is within 5 of anchor 100; 250 starts a new anchor
        let removed = find_duplicate_times(&[100, 103, 250], 5);
        assert_eq!(removed, vec![1]);
    }

    #[test]
    fn test_chain_collapses_into_anchor() {
        // each event is within 4 of the previous but 108 is beyond 4 of the
        // anchor 100; the scan is anchored, so only 100's window applies
        let removed = find_duplicate_times(&[100, 103, 104, 108], 4);
        assert_eq!(removed, vec![1, 2]);
        // 108 becomes the next anchor and survives
    }

    #[test]
    fn test_inclusive_tolerance() {
        let removed = find_duplicate_times(&[100, 105], 5);
        assert_eq!(removed, vec![1]);
        let removed = find_duplicate_times(&[100, 106], 5);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(find_duplicate_times(&[], 5).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let times = vec![10, 12, 13, 30, 33, 60];
        let removed = find_duplicate_times(&times, 3);
        let kept: Vec<i64> = times
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, &t)| t)
            .collect();
        assert!(find_duplicate_times(&kept, 3).is_empty());
    }

    #[test]
    fn test_remove_duplicate_events_per_unit() {
        // unit 1 has a duplicate pair; unit 2's event in between is untouched
        let events = EventStream {
            times: vec![100, 102, 103, 250],
            labels: vec![1, 2, 1, 1],
        };
        let out = remove_duplicate_events(&events, 5);
        assert_eq!(out.times, vec![100, 102, 250]);
        assert_eq!(out.labels, vec![1, 2, 1]);
    }

    #[test]
    fn test_remove_duplicate_events_monotonic() {
        let events = EventStream {
            times: vec![1, 2, 3, 4],
            labels: vec![1, 1, 1, 1],
        };
        let out = remove_duplicate_events(&events, 10);
        assert!(out.len() <= events.len());
        assert_eq!(out.times, vec![1]);
    }
}
