//! Unit tests for `SequenceEvolver`.

use phalanx::{PersistentSequence, SequenceError, SequenceEvolver};
use rstest::rstest;

fn evolver(elements: impl IntoIterator<Item = i32>) -> SequenceEvolver<i32> {
    elements.into_iter().collect::<PersistentSequence<i32>>().evolver()
}

#[rstest]
fn test_starts_from_snapshot() {
    let evolver = evolver(1..=3);
    assert_eq!(evolver.len(), 3);
    assert_eq!(evolver.get(0), Some(&1));
}

#[rstest]
fn test_push_and_pop_both_ends() {
    let mut evolver = evolver([]);
    evolver.push_back(2);
    evolver.push_back(3);
    evolver.push_front(1);
    assert_eq!(evolver.to_vec(), vec![1, 2, 3]);
    assert_eq!(evolver.pop_front(), Some(1));
    assert_eq!(evolver.pop_back(), Some(3));
    assert_eq!(evolver.pop_back(), Some(2));
    assert_eq!(evolver.pop_back(), None);
}

#[rstest]
fn test_set_and_delete() {
    let mut evolver = evolver(1..=4);
    evolver.set(1, 20).unwrap();
    evolver.delete(0).unwrap();
    assert_eq!(evolver.to_vec(), vec![20, 3, 4]);
    assert_eq!(
        evolver.set(10, 0),
        Err(SequenceError::IndexOutOfRange {
            index: 10,
            length: 3
        })
    );
}

#[rstest]
fn test_insert_clamps() {
    let mut evolver = evolver(1..=3);
    evolver.insert(-100, 0);
    evolver.insert(100, 4);
    assert_eq!(evolver.to_vec(), vec![0, 1, 2, 3, 4]);
}

#[rstest]
fn test_pop_at_negative_default_position() {
    let mut evolver = evolver(1..=4);
    assert_eq!(evolver.pop_at(-1), Ok(4));
    assert_eq!(evolver.to_vec(), vec![1, 2, 3]);
}

#[rstest]
fn test_remove_value() {
    let mut evolver = evolver([1, 2, 3, 2]);
    evolver.remove(&2).unwrap();
    assert_eq!(evolver.to_vec(), vec![1, 3, 2]);
    assert_eq!(evolver.remove(&9), Err(SequenceError::ValueNotFound));
}

#[rstest]
fn test_extend_and_concat() {
    let mut evolver = evolver(1..=2);
    evolver.extend([3, 4]);
    evolver.concat(&(5..=6).collect::<PersistentSequence<i32>>());
    assert_eq!(evolver.to_vec(), vec![1, 2, 3, 4, 5, 6]);
}

#[rstest]
fn test_reverse_and_repeat_in_place() {
    let mut evolver = evolver(1..=3);
    evolver.reverse();
    assert_eq!(evolver.to_vec(), vec![3, 2, 1]);
    evolver.repeat(2);
    assert_eq!(evolver.to_vec(), vec![3, 2, 1, 3, 2, 1]);
}

#[rstest]
fn test_persistent_snapshots_do_not_alias() {
    let mut evolver = evolver(1..=3);
    let before = evolver.persistent();
    evolver.push_back(4);
    evolver.clear();
    evolver.push_back(9);
    assert_eq!(before.to_vec(), vec![1, 2, 3]);
    assert_eq!(evolver.into_persistent().to_vec(), vec![9]);
}

#[rstest]
fn test_every_snapshot_remains_valid() {
    let mut evolver = evolver([]);
    let mut snapshots = Vec::new();
    for element in 0..50 {
        evolver.push_back(element);
        snapshots.push(evolver.persistent());
    }
    for (index, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.len(), index + 1);
        assert_eq!(snapshot.back(), Some(&(index as i32)));
    }
}
