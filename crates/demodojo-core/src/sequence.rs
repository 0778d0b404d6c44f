use serde::{Deserialize, Serialize};

/// Set of chunk sequence numbers stored as sorted, disjoint, inclusive ranges.
///
/// An uninterrupted recording collapses to a single range, which keeps the
/// persisted session record small no matter how long the capture runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceRanges {
    ranges: Vec<(u64, u64)>,
}

impl SequenceRanges {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `seq` has been recorded.
    pub fn contains(&self, seq: u64) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < seq {
                    std::cmp::Ordering::Less
                } else if lo > seq {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Records `seq`. Returns `false` if it was already present.
    pub fn insert(&mut self, seq: u64) -> bool {
        if self.contains(seq) {
            return false;
        }

        let idx = self.ranges.partition_point(|&(_, hi)| hi < seq);
        let joins_prev = idx > 0 && self.ranges[idx - 1].1.checked_add(1) == Some(seq);
        let joins_next = idx < self.ranges.len() && seq.checked_add(1) == Some(self.ranges[idx].0);

        match (joins_prev, joins_next) {
            (true, true) => {
                self.ranges[idx - 1].1 = self.ranges[idx].1;
                self.ranges.remove(idx);
            }
            (true, false) => self.ranges[idx - 1].1 = seq,
            (false, true) => self.ranges[idx].0 = seq,
            (false, false) => self.ranges.insert(idx, (seq, seq)),
        }

        true
    }

    /// Highest recorded sequence number.
    pub fn highest(&self) -> Option<u64> {
        self.ranges.last().map(|&(_, hi)| hi)
    }

    /// The sequence number that continues the run without a gap.
    pub fn next_expected(&self) -> u64 {
        self.highest().map_or(0, |hi| hi.saturating_add(1))
    }

    /// Number of recorded sequence numbers.
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(|&(lo, hi)| hi - lo + 1).sum()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns `true` if the recorded numbers do not form one run starting at 0.
    pub fn has_gap(&self) -> bool {
        match self.ranges.as_slice() {
            [] => false,
            [(lo, _)] => *lo != 0,
            _ => true,
        }
    }
}
