//! Unit tests for `PersistentSequence`.
//!
//! This module contains comprehensive tests for the persistent sequence,
//! organized by operation group.

use phalanx::{PersistentSequence, SequenceError, SequenceView};
use rstest::rstest;

fn sequence(elements: impl IntoIterator<Item = i32>) -> PersistentSequence<i32> {
    elements.into_iter().collect()
}

// =============================================================================
// Construction
// =============================================================================

#[rstest]
fn test_new_creates_empty_sequence() {
    let sequence: PersistentSequence<i32> = PersistentSequence::new();
    assert!(sequence.is_empty());
    assert_eq!(sequence.len(), 0);
}

#[rstest]
fn test_singleton() {
    let sequence = PersistentSequence::singleton(42);
    assert_eq!(sequence.len(), 1);
    assert_eq!(sequence.front(), Some(&42));
    assert_eq!(sequence.back(), Some(&42));
}

#[rstest]
fn test_from_slice() {
    let sequence = PersistentSequence::from_slice(&[1, 2, 3]);
    assert_eq!(sequence.to_vec(), vec![1, 2, 3]);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4)]
#[case(8)]
#[case(9)]
#[case(100)]
#[case(1000)]
fn test_collect_round_trips(#[case] count: i32) {
    let sequence = sequence(0..count);
    assert_eq!(sequence.to_vec(), (0..count).collect::<Vec<_>>());
}

#[rstest]
fn test_default_is_empty() {
    let sequence: PersistentSequence<i32> = PersistentSequence::default();
    assert!(sequence.is_empty());
}

#[rstest]
fn test_sequence_macro() {
    let built = phalanx::sequence![1, 2, 3];
    assert_eq!(built, sequence(1..=3));
    let empty: PersistentSequence<i32> = phalanx::sequence![];
    assert!(empty.is_empty());
}

// =============================================================================
// Push and pop at the ends
// =============================================================================

#[rstest]
fn test_push_back_preserves_original() {
    let original = sequence(1..=3);
    let extended = original.push_back(4);
    assert_eq!(original.len(), 3);
    assert_eq!(extended.len(), 4);
    assert_eq!(extended.back(), Some(&4));
}

#[rstest]
fn test_push_front_preserves_original() {
    let original = sequence(1..=3);
    let extended = original.push_front(0);
    assert_eq!(original.front(), Some(&1));
    assert_eq!(extended.front(), Some(&0));
}

#[rstest]
fn test_push_many_both_ends() {
    let mut current = PersistentSequence::new();
    for index in 0..200 {
        current = current.push_back(index);
        current = current.push_front(-index - 1);
    }
    assert_eq!(current.len(), 400);
    assert_eq!(current.front(), Some(&-200));
    assert_eq!(current.back(), Some(&199));
}

#[rstest]
fn test_view_front_on_empty() {
    let sequence: PersistentSequence<i32> = PersistentSequence::new();
    assert_eq!(sequence.view_front(), None);
    assert_eq!(sequence.view_back(), None);
}

#[rstest]
fn test_view_front_returns_rest() {
    let (element, rest) = sequence(1..=3).view_front().unwrap();
    assert_eq!(element, 1);
    assert_eq!(rest.to_vec(), vec![2, 3]);
}

#[rstest]
fn test_view_back_returns_rest() {
    let (rest, element) = sequence(1..=3).view_back().unwrap();
    assert_eq!(element, 3);
    assert_eq!(rest.to_vec(), vec![1, 2]);
}

// =============================================================================
// Indexed access
// =============================================================================

#[rstest]
fn test_get_negative_wraps() {
    let sequence = sequence(0..10);
    assert_eq!(sequence.get(-1), Some(&9));
    assert_eq!(sequence.get(-10), Some(&0));
    assert_eq!(sequence.get(-11), None);
}

#[rstest]
fn test_set_replaces_single_element() {
    let original = sequence(0..10);
    let updated = original.set(4, 99).unwrap();
    assert_eq!(updated.get(4), Some(&99));
    assert_eq!(updated.len(), 10);
    assert_eq!(original.get(4), Some(&4));
}

#[rstest]
fn test_set_negative_index() {
    let updated = sequence(0..5).set(-1, 99).unwrap();
    assert_eq!(updated.to_vec(), vec![0, 1, 2, 3, 99]);
}

#[rstest]
fn test_insert_clamps_out_of_range() {
    let original = sequence(1..=3);
    assert_eq!(original.insert(-100, 0).to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(original.insert(100, 4).to_vec(), vec![1, 2, 3, 4]);
}

#[rstest]
fn test_insert_then_erase_is_identity() {
    let original = sequence(0..50);
    for index in 0..=50 {
        let inserted = original.insert(index, 99);
        assert_eq!(inserted.erase(index).unwrap(), original);
    }
}

#[rstest]
fn test_erase_out_of_range() {
    assert_eq!(
        sequence(0..3).erase(5),
        Err(SequenceError::IndexOutOfRange {
            index: 5,
            length: 3
        })
    );
}

#[rstest]
fn test_erase_range_clamps() {
    let original = sequence(0..10);
    assert_eq!(original.erase_range(7, 100).to_vec(), (0..7).collect::<Vec<_>>());
    assert_eq!(original.erase_range(5, 2).to_vec(), original.to_vec());
    assert_eq!(original.erase_range(-3, -1).to_vec(), vec![0, 1, 2, 3, 4, 5, 6, 9]);
}

#[rstest]
fn test_erase_slice_stepped() {
    let original = sequence(0..10);
    let erased = original.erase_slice(0, 10, 2).unwrap();
    assert_eq!(erased.to_vec(), vec![1, 3, 5, 7, 9]);
}

#[rstest]
fn test_erase_slice_zero_step() {
    assert_eq!(
        sequence(0..5).erase_slice(0, 5, 0),
        Err(SequenceError::ZeroStep)
    );
}

#[rstest]
fn test_remove_first_occurrence() {
    let original = sequence([1, 2, 3, 2]);
    assert_eq!(original.remove(&2).unwrap().to_vec(), vec![1, 3, 2]);
    assert_eq!(original.remove(&9), Err(SequenceError::ValueNotFound));
}

#[rstest]
fn test_index_of_and_count() {
    let haystack = sequence([1, 2, 3, 2, 1]);
    assert_eq!(haystack.index_of(&2, ..), Ok(1));
    assert_eq!(haystack.index_of(&2, 2..), Ok(3));
    assert_eq!(haystack.index_of(&2, 2..3), Err(SequenceError::ValueNotFound));
    assert_eq!(haystack.count_value(&2), 2);
    assert_eq!(haystack.count_value(&9), 0);
}

// =============================================================================
// Slices
// =============================================================================

#[rstest]
fn test_get_slice_contiguous() {
    let sequence = sequence(1..=5);
    assert_eq!(sequence.get_slice(1, 4, 1).unwrap().to_vec(), vec![2, 3, 4]);
}

#[rstest]
fn test_get_slice_negative_bounds() {
    let sequence = sequence(1..=5);
    assert_eq!(sequence.get_slice(-4, -1, 1).unwrap().to_vec(), vec![2, 3, 4]);
}

#[rstest]
fn test_get_slice_stepped() {
    let sequence = sequence(1..=5);
    assert_eq!(sequence.get_slice(1, 5, 2).unwrap().to_vec(), vec![2, 4]);
}

#[rstest]
fn test_get_slice_negative_step() {
    let sequence = sequence(1..=5);
    assert_eq!(
        sequence.get_slice(4, -6, -1).unwrap().to_vec(),
        vec![5, 4, 3, 2, 1]
    );
    assert_eq!(sequence.get_slice(4, 0, -2).unwrap().to_vec(), vec![5, 3]);
}

#[rstest]
fn test_get_slice_empty_selection() {
    let sequence = sequence(1..=5);
    assert!(sequence.get_slice(3, 1, 1).unwrap().is_empty());
}

#[rstest]
fn test_get_range_clamps() {
    let sequence = sequence(0..10);
    assert_eq!(sequence.get_range(8, 100).to_vec(), vec![8, 9]);
    assert_eq!(sequence.get_range(7, 3).len(), 0);
}

#[rstest]
fn test_set_range_replaces_run() {
    let sequence = sequence(1..=5);
    let replaced = sequence.set_range(1, 4, [-1, -2, -3]);
    assert_eq!(replaced.to_vec(), vec![1, -1, -2, -3, 5]);
}

#[rstest]
fn test_set_range_may_change_length() {
    let sequence = sequence(1..=5);
    assert_eq!(sequence.set_range(1, 4, [0]).to_vec(), vec![1, 0, 5]);
    assert_eq!(sequence.set_range(2, 2, [9, 9]).len(), 7);
}

#[rstest]
fn test_set_slice_stepped() {
    let sequence = sequence(0..6);
    let replaced = sequence.set_slice(0, 6, 2, [10, 20, 30]).unwrap();
    assert_eq!(replaced.to_vec(), vec![10, 1, 20, 3, 30, 5]);
}

#[rstest]
fn test_set_slice_negative_step_assigns_backwards() {
    let sequence = sequence(0..6);
    let replaced = sequence.set_slice(5, -7, -2, [10, 20, 30]).unwrap();
    assert_eq!(replaced.to_vec(), vec![0, 30, 2, 20, 4, 10]);
}

#[rstest]
fn test_set_slice_wrong_length() {
    let sequence = sequence(0..6);
    assert_eq!(
        sequence.set_slice(0, 6, 2, [1, 2]),
        Err(SequenceError::LengthMismatch {
            expected: 3,
            actual: 2
        })
    );
}

#[rstest]
fn test_mset_applies_last_write() {
    let sequence = sequence(1..=4);
    let updated = sequence.mset([(2, 0), (3, 5)]).unwrap();
    assert_eq!(updated.to_vec(), vec![1, 2, 0, 5]);
    let duplicate = sequence.mset([(1, 7), (1, 8)]).unwrap();
    assert_eq!(duplicate.get(1), Some(&8));
}

#[rstest]
fn test_mset_rejects_bad_index() {
    let sequence = sequence(1..=4);
    assert!(sequence.mset([(1, 0), (9, 0)]).is_err());
}

// =============================================================================
// Concatenation, splitting, repetition
// =============================================================================

#[rstest]
fn test_concat() {
    let left = sequence(1..=3).push_back(4);
    let combined = sequence(1..=3).concat(&left);
    assert_eq!(combined.to_vec(), vec![1, 2, 3, 1, 2, 3, 4]);
}

#[rstest]
fn test_concat_sizes() {
    for left in [0usize, 1, 2, 7, 8, 9, 64, 100] {
        for right in [0usize, 1, 3, 8, 27, 101] {
            let combined = sequence(0..left as i32).concat(&sequence(0..right as i32));
            assert_eq!(combined.len(), left + right);
            combined.check_invariants();
        }
    }
}

#[rstest]
fn test_split_returns_element() {
    let (left, value, right) = sequence(0..10).split(4).unwrap();
    assert_eq!(left.to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(value, 4);
    assert_eq!(right.to_vec(), vec![5, 6, 7, 8, 9]);
}

#[rstest]
fn test_split_at_clamps() {
    let original = sequence(0..5);
    let (left, right) = original.split_at(100);
    assert_eq!(left.len(), 5);
    assert!(right.is_empty());
    let (left, right) = original.split_at(-100);
    assert!(left.is_empty());
    assert_eq!(right.len(), 5);
}

#[rstest]
fn test_take_and_drop() {
    let original = sequence(0..10);
    assert_eq!(original.take_front(3).to_vec(), vec![0, 1, 2]);
    assert_eq!(original.drop_front(7).to_vec(), vec![7, 8, 9]);
    assert_eq!(original.take_back(2).to_vec(), vec![8, 9]);
    assert_eq!(original.drop_back(8).to_vec(), vec![0, 1]);
    assert_eq!(original.take_front(100), original);
    assert!(original.drop_front(100).is_empty());
}

#[rstest]
fn test_repeat() {
    let original = sequence(1..=2);
    assert!(original.repeat(0).is_empty());
    assert_eq!(original.repeat(1), original);
    assert_eq!(original.repeat(3).to_vec(), vec![1, 2, 1, 2, 1, 2]);
}

#[rstest]
fn test_operators_mirror_methods() {
    let left = sequence(1..=2);
    let right = sequence(3..=4);
    assert_eq!((left.clone() + right).to_vec(), vec![1, 2, 3, 4]);
    assert_eq!((left * 2).to_vec(), vec![1, 2, 1, 2]);
}

// =============================================================================
// Reverse, transform, view, chunks
// =============================================================================

#[rstest]
fn test_reverse() {
    let original = sequence(0..100);
    let reversed = original.reverse();
    reversed.check_invariants();
    assert_eq!(reversed.to_vec(), (0..100).rev().collect::<Vec<_>>());
    assert_eq!(reversed.reverse(), original);
}

#[rstest]
fn test_transform_maps_every_element() {
    let doubled = sequence(0..50).transform(|element| element * 2);
    doubled.check_invariants();
    assert_eq!(doubled.to_vec(), (0..50).map(|x| x * 2).collect::<Vec<_>>());
}

#[rstest]
fn test_transform_changes_type() {
    let rendered: PersistentSequence<String> =
        sequence(1..=3).transform(|element| element.to_string());
    assert_eq!(rendered.get(1), Some(&"2".to_string()));
}

#[rstest]
fn test_view_alternates_chunks_and_elements() {
    let parts = sequence(1..=4).view(&[1, 3]).unwrap();
    assert_eq!(
        parts,
        vec![
            SequenceView::Chunk(sequence([1])),
            SequenceView::Element(2),
            SequenceView::Chunk(sequence([3])),
            SequenceView::Element(4),
            SequenceView::Chunk(sequence([])),
        ]
    );
}

#[rstest]
fn test_view_rejects_unsorted_indices() {
    let original = sequence(1..=5);
    assert_eq!(
        original.view(&[3, 1]),
        Err(SequenceError::UnsortedIndices)
    );
    assert_eq!(original.view(&[2, 2]), Err(SequenceError::UnsortedIndices));
    assert!(original.view(&[9]).is_err());
}

#[rstest]
fn test_chunks_of() {
    let chunks = sequence(1..=8).chunks_of(3).unwrap();
    let rendered: Vec<Vec<i32>> = chunks.iter().map(PersistentSequence::to_vec).collect();
    assert_eq!(rendered, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8]]);
}

#[rstest]
fn test_chunks_of_zero_is_error() {
    assert_eq!(
        sequence(1..=3).chunks_of(0).unwrap_err(),
        SequenceError::BadChunkSize
    );
}

// =============================================================================
// Comparison and hashing
// =============================================================================

#[rstest]
fn test_equality_ignores_structure() {
    let pushed: PersistentSequence<i32> =
        (0..50).fold(PersistentSequence::new(), |sequence, element| {
            sequence.push_back(element)
        });
    let bulk = sequence(0..50);
    assert_eq!(pushed, bulk);
}

#[rstest]
fn test_lexicographic_ordering() {
    assert!(sequence([1, 2]) < sequence([1, 3]));
    assert!(sequence([1, 2]) < sequence([1, 2, 0]));
    assert!(sequence([2]) > sequence([1, 9, 9]));
    assert!(sequence([]) < sequence([0]));
}

#[rstest]
fn test_hash_agrees_with_equality() {
    use std::collections::HashSet;
    let mut set = HashSet::new();
    set.insert(sequence(0..20));
    assert!(set.contains(&sequence(0..20)));
}

#[rstest]
fn test_debug_renders_like_a_list() {
    assert_eq!(format!("{:?}", sequence(1..=3)), "[1, 2, 3]");
}

// =============================================================================
// Iterators
// =============================================================================

#[rstest]
fn test_into_iter() {
    let collected: Vec<i32> = sequence(0..25).into_iter().collect();
    assert_eq!(collected, (0..25).collect::<Vec<_>>());
}

#[rstest]
fn test_reverse_iter_matches_reverse() {
    let original = sequence(0..70);
    let backwards: Vec<i32> = original.reverse_iter().copied().collect();
    assert_eq!(backwards, original.reverse().to_vec());
}

#[rstest]
fn test_iterator_nth_uses_seek() {
    let original = sequence(0..1000);
    let mut iterator = original.iter();
    assert_eq!(iterator.nth(500), Some(&500));
    assert_eq!(iterator.next(), Some(&501));
}

#[rstest]
fn test_iterator_size_hint() {
    let original = sequence(0..10);
    let mut iterator = original.iter();
    assert_eq!(iterator.size_hint(), (10, Some(10)));
    iterator.next();
    assert_eq!(iterator.size_hint(), (9, Some(9)));
}
