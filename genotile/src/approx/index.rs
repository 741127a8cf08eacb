//! Best-available lookup over committed cache entries.
//!
//! Entries are indexed by their absolute range in an R-tree (as degenerate
//! boxes on the line `y = 0`). A query gathers every entry overlapping the
//! needed range, prefers entries whose sampling rate is closest to the one
//! requested, and greedily carves the needed range between them.

use std::ops::Range;

use rstar::{RTree, RTreeObject, AABB};

use super::RangeSet;

/// Key of a range-cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeKey {
    pub height_bucket: u64,
    pub sampling_rate: u64,
    pub tile_index: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct IndexedSpan {
    start: i64,
    end: i64,
    key: RangeKey,
}

impl IndexedSpan {
    fn new(range: &Range<u64>, key: RangeKey) -> Self {
        Self {
            start: to_coord(range.start),
            end: to_coord(range.end),
            key,
        }
    }
}

impl RTreeObject for IndexedSpan {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.start, 0], [self.end, 0])
    }
}

/// One piece of an approximate answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproximateMatch {
    /// Part of the needed range this entry supplies.
    pub range: Range<u64>,
    pub key: RangeKey,
}

/// Interval index of committed entries.
#[derive(Debug, Default)]
pub struct ApproximateIndex {
    tree: RTree<IndexedSpan>,
}

impl ApproximateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, range: Range<u64>, key: RangeKey) {
        if range.start < range.end {
            self.tree.insert(IndexedSpan::new(&range, key));
        }
    }

    pub fn remove(&mut self, range: &Range<u64>, key: RangeKey) -> bool {
        self.tree.remove(&IndexedSpan::new(range, key)).is_some()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Cover as much of `needed` as possible with indexed entries.
    ///
    /// Candidates are taken in order of `|sampling_rate - requested|`, then by
    /// position. Returned ranges are pairwise disjoint and lie inside `needed`;
    /// parts no entry covers are left out.
    pub fn query(&self, needed: &Range<u64>, sampling_rate: u64) -> Vec<ApproximateMatch> {
        if needed.start >= needed.end {
            return Vec::new();
        }
        let (start, end) = (to_coord(needed.start), to_coord(needed.end));
        let envelope = AABB::from_corners([start, 0], [end, 0]);

        let mut candidates: Vec<&IndexedSpan> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            // envelopes are closed; keep only true half-open overlaps
            .filter(|span| span.start < end && span.end > start)
            .collect();
        candidates.sort_by_key(|span| {
            (
                span.key.sampling_rate.abs_diff(sampling_rate),
                span.start,
                span.end,
                span.key,
            )
        });

        let mut remaining = RangeSet::from_range(needed.clone());
        let mut matches = Vec::new();
        for span in candidates {
            if remaining.is_empty() {
                break;
            }
            let range = span.start as u64..span.end as u64;
            for piece in remaining.intersect(&range) {
                matches.push(ApproximateMatch {
                    range: piece,
                    key: span.key,
                });
            }
            remaining.subtract(&range);
        }
        matches
    }
}

fn to_coord(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(sampling_rate: u64, tile_index: u64) -> RangeKey {
        RangeKey {
            height_bucket: 0,
            sampling_rate,
            tile_index,
        }
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = ApproximateIndex::new();
        assert!(index.query(&(0..100), 1).is_empty());
    }

    #[test]
    fn test_prefers_closest_sampling_rate() {
        let mut index = ApproximateIndex::new();
        index.insert(0..1000, key(64, 0));
        index.insert(0..1000, key(4, 0));

        let matches = index.query(&(100..200), 1);
        assert_eq!(matches, vec![ApproximateMatch { range: 100..200, key: key(4, 0) }]);
    }

    #[test]
    fn test_fills_gaps_with_worse_candidates() {
        let mut index = ApproximateIndex::new();
        index.insert(0..50, key(4, 0));
        index.insert(0..200, key(64, 0));

        let matches = index.query(&(0..100), 4);
        assert_eq!(
            matches,
            vec![
                ApproximateMatch { range: 0..50, key: key(4, 0) },
                ApproximateMatch { range: 50..100, key: key(64, 0) },
            ]
        );
    }

    #[test]
    fn test_touching_entries_do_not_match() {
        let mut index = ApproximateIndex::new();
        index.insert(0..100, key(1, 0));
        index.insert(200..300, key(1, 2));
        assert!(index.query(&(100..200), 1).is_empty());
    }

    #[test]
    fn test_uncovered_part_is_left_out() {
        let mut index = ApproximateIndex::new();
        index.insert(0..60, key(1, 0));
        let matches = index.query(&(50..100), 1);
        assert_eq!(matches, vec![ApproximateMatch { range: 50..60, key: key(1, 0) }]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut index = ApproximateIndex::new();
        index.insert(0..10, key(1, 0));
        index.insert(10..20, key(1, 1));
        assert!(index.remove(&(0..10), key(1, 0)));
        assert!(!index.remove(&(0..10), key(1, 0)));
        assert_eq!(index.len(), 1);
        index.clear();
        assert!(index.is_empty());
    }

    proptest! {
        #[test]
        fn prop_matches_partition_inside_request(
            entries in proptest::collection::vec((0u64..5000, 1u64..2000, 0u32..8), 0..30),
            start in 0u64..5000,
            len in 1u64..3000,
            rate_exp in 0u32..8,
        ) {
            let mut index = ApproximateIndex::new();
            for (i, (s, l, e)) in entries.iter().enumerate() {
                index.insert(*s..s + l, key(1 << e, i as u64));
            }
            let needed = start..start + len;
            let mut matches = index.query(&needed, 1 << rate_exp);
            matches.sort_by_key(|m| m.range.start);

            for m in &matches {
                prop_assert!(m.range.start < m.range.end);
                prop_assert!(m.range.start >= needed.start && m.range.end <= needed.end);
            }
            for pair in matches.windows(2) {
                prop_assert!(pair[0].range.end <= pair[1].range.start);
            }
        }
    }
}
