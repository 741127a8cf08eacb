//! Sets of half-open integer intervals.

use std::ops::Range;

/// Sorted, disjoint, non-empty `[start, end)` spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    spans: Vec<Range<u64>>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_range(range: Range<u64>) -> Self {
        let mut set = Self::new();
        if range.start < range.end {
            set.spans.push(range);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[Range<u64>] {
        &self.spans
    }

    /// Total length covered.
    pub fn covered(&self) -> u64 {
        self.spans.iter().map(|span| span.end - span.start).sum()
    }

    /// Pieces of this set that fall inside `range`, in order.
    pub fn intersect(&self, range: &Range<u64>) -> Vec<Range<u64>> {
        self.spans
            .iter()
            .filter_map(|span| {
                let start = span.start.max(range.start);
                let end = span.end.min(range.end);
                (start < end).then_some(start..end)
            })
            .collect()
    }

    /// Remove `range` from the set, splitting spans as needed.
    pub fn subtract(&mut self, range: &Range<u64>) {
        if range.start >= range.end {
            return;
        }
        let mut remaining = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end <= range.start || span.start >= range.end {
                remaining.push(span);
                continue;
            }
            if span.start < range.start {
                remaining.push(span.start..range.start);
            }
            if span.end > range.end {
                remaining.push(range.end..span.end);
            }
        }
        self.spans = remaining;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_range_gives_empty_set() {
        assert!(RangeSet::from_range(5..5).is_empty());
        assert!(RangeSet::from_range(6..5).is_empty());
    }

    #[test]
    fn test_subtract_middle_splits() {
        let mut set = RangeSet::from_range(0..100);
        set.subtract(&(40..60));
        assert_eq!(set.spans(), &[0..40, 60..100]);
        assert_eq!(set.covered(), 80);
    }

    #[test]
    fn test_subtract_edges() {
        let mut set = RangeSet::from_range(0..100);
        set.subtract(&(0..10));
        set.subtract(&(90..200));
        assert_eq!(set.spans(), &[10..90]);
    }

    #[test]
    fn test_subtract_everything() {
        let mut set = RangeSet::from_range(10..20);
        set.subtract(&(0..30));
        assert!(set.is_empty());
    }

    #[test]
    fn test_intersect_across_pieces() {
        let mut set = RangeSet::from_range(0..100);
        set.subtract(&(40..60));
        assert_eq!(set.intersect(&(30..70)), vec![30..40, 60..70]);
        assert!(set.intersect(&(45..55)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_subtract_leaves_disjoint_sorted_spans(
            cuts in proptest::collection::vec((0u64..1000, 1u64..200), 0..20)
        ) {
            let mut set = RangeSet::from_range(0..1000);
            for (start, len) in cuts {
                let cut = start..start + len;
                set.subtract(&cut);
                prop_assert!(set.intersect(&cut).is_empty());
            }
            for pair in set.spans().windows(2) {
                prop_assert!(pair[0].end < pair[1].start || pair[0].end == pair[1].start);
                prop_assert!(pair[0].start < pair[0].end);
            }
            prop_assert!(set.covered() <= 1000);
        }
    }
}
