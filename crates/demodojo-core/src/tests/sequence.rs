use crate::SequenceRanges;

/// WHAT: Contiguous inserts collapse into one range
/// WHY: Long recordings must not bloat the persisted session record
#[test]
fn given_contiguous_sequence_when_inserted_then_single_run_without_gap() {
    // Given: An empty set
    let mut ranges = SequenceRanges::new();

    // When: 0..100 inserted in order
    for seq in 0..100 {
        assert!(ranges.insert(seq));
    }

    // Then: One run from 0, no gap
    assert_eq!(ranges.len(), 100);
    assert_eq!(ranges.highest(), Some(99));
    assert_eq!(ranges.next_expected(), 100);
    assert!(!ranges.has_gap());
    assert_eq!(serde_json::to_string(&ranges).ok().as_deref(), Some("[[0,99]]"));
}

/// WHAT: Filling a hole merges neighbouring ranges
/// WHY: A late chunk closes the gap in the record of what was seen
#[test]
fn given_hole_when_filled_then_ranges_merge() {
    // Given: 0, 1 and 3 recorded
    let mut ranges = SequenceRanges::new();
    ranges.insert(0);
    ranges.insert(1);
    ranges.insert(3);
    assert!(ranges.has_gap());

    // When: 2 arrives, then 2 again
    let first = ranges.insert(2);
    let again = ranges.insert(2);

    // Then: Single run, duplicate refused
    assert!(first);
    assert!(!again);
    assert!(!ranges.has_gap());
    assert!(ranges.contains(2));
    assert_eq!(ranges.len(), 4);
}

/// WHAT: A run not starting at zero counts as a gap
/// WHY: Missing leading chunks are as much a hole as missing middle ones
#[test]
fn given_first_chunk_missing_when_checked_then_gap() {
    // Given: Only 1 and 2 recorded
    let mut ranges = SequenceRanges::new();
    ranges.insert(2);
    ranges.insert(1);

    // When / Then: Gap reported, 0 absent
    assert!(ranges.has_gap());
    assert!(!ranges.contains(0));
    assert!(!ranges.is_empty());
}
