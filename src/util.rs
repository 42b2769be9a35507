//! Shared helpers for the persistent collections.
//!
//! Index and slice adjustment, iterator-based comparison, and the
//! order-sensitive hash combiner used by every collection in this crate.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::SequenceError;

// =============================================================================
// Hashing
// =============================================================================

/// Seed for the iterable hash, the 32-bit golden ratio constant.
pub(crate) const HASH_SEED: u64 = 0x9e37_79b9;

/// Folds one element hash into a running seed.
pub(crate) const fn hash_combine(seed: u64, element_hash: u64) -> u64 {
    element_hash
        .wrapping_add(HASH_SEED)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Hashes an ordered iterable left to right.
///
/// Two iterables that yield equal elements in the same order hash equal,
/// independent of their underlying representation.
pub(crate) fn hash_iterable<I>(elements: I) -> u64
where
    I: IntoIterator,
    I::Item: Hash,
{
    let mut seed = HASH_SEED;
    for element in elements {
        let mut hasher = DefaultHasher::new();
        element.hash(&mut hasher);
        seed = hash_combine(seed, hasher.finish());
    }
    seed
}

// =============================================================================
// Iterator Comparison
// =============================================================================

/// Element-wise equality of two ordered iterators.
///
/// Short-circuits on the first mismatch; iterators of different lengths are
/// unequal.
pub(crate) fn equal_iterators<I, J>(mut left: I, mut right: J) -> bool
where
    I: Iterator,
    J: Iterator<Item = I::Item>,
    I::Item: PartialEq,
{
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => {}
            _ => return false,
        }
    }
}

/// Lexicographic comparison of two ordered iterators.
pub(crate) fn compare_iterators<I, J>(mut left: I, mut right: J) -> Ordering
where
    I: Iterator,
    J: Iterator<Item = I::Item>,
    I::Item: Ord,
{
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                ordering => return ordering,
            },
        }
    }
}

/// Lexicographic partial comparison of two ordered iterators.
pub(crate) fn partial_compare_iterators<I, J>(mut left: I, mut right: J) -> Option<Ordering>
where
    I: Iterator,
    J: Iterator<Item = I::Item>,
    I::Item: PartialOrd,
{
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Some(Ordering::Equal),
            (None, Some(_)) => return Some(Ordering::Less),
            (Some(_), None) => return Some(Ordering::Greater),
            (Some(x), Some(y)) => match x.partial_cmp(&y) {
                Some(Ordering::Equal) => {}
                ordering => return ordering,
            },
        }
    }
}

// =============================================================================
// Index Adjustment
// =============================================================================

/// Resolves a possibly-negative index against a length.
///
/// Negative indices wrap from the end. Returns the adjusted index or
/// [`SequenceError::IndexOutOfRange`].
pub(crate) fn check_index(length: usize, index: isize) -> Result<usize, SequenceError> {
    let adjusted = if index < 0 {
        index + cast_length(length)
    } else {
        index
    };
    if adjusted < 0 || adjusted >= cast_length(length) {
        return Err(SequenceError::IndexOutOfRange { index, length });
    }
    cast_adjusted(adjusted, index, length)
}

/// Resolves a possibly-negative index, clamping into `[0, length]`.
pub(crate) fn clamp_index(length: usize, index: isize) -> usize {
    let adjusted = if index < 0 {
        index + cast_length(length)
    } else {
        index
    };
    adjusted.clamp(0, cast_length(length)).unsigned_abs()
}

fn cast_length(length: usize) -> isize {
    isize::try_from(length).unwrap_or(isize::MAX)
}

fn cast_adjusted(adjusted: isize, index: isize, length: usize) -> Result<usize, SequenceError> {
    usize::try_from(adjusted).map_err(|_| SequenceError::IndexOutOfRange { index, length })
}

// =============================================================================
// Slice Adjustment
// =============================================================================

/// A `(start, stop, step)` slice normalized against a sequence length.
///
/// After adjustment the bounds are in range, `step` is positive, and
/// iteration always runs forward; `reversed` records whether the selected
/// elements should be emitted back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SliceBounds {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
    pub count: usize,
    pub reversed: bool,
}

/// Adjusts `(start, stop, step)` slice indices against `length`.
///
/// Negative indices wrap; out-of-range indices clamp to `[0, length]` for a
/// positive step or `[-1, length - 1]` for a negative one. `count` is the
/// number of selected elements. A negative step is normalized to forward
/// iteration after `count` is computed.
pub(crate) fn adjust_slice(
    length: usize,
    start: isize,
    stop: isize,
    step: isize,
) -> Result<SliceBounds, SequenceError> {
    if step == 0 {
        return Err(SequenceError::ZeroStep);
    }
    let n = cast_length(length);
    let mut start = start;
    let mut stop = stop;
    if start < 0 {
        start += n;
        if start < 0 {
            start = if step < 0 { -1 } else { 0 };
        }
    } else if start >= n {
        start = if step < 0 { n - 1 } else { n };
    }
    if stop < 0 {
        stop += n;
        if stop < 0 {
            stop = if step < 0 { -1 } else { 0 };
        }
    } else if stop >= n {
        stop = if step < 0 { n - 1 } else { n };
    }
    let count = if step < 0 {
        if stop < start {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        }
    } else if start < stop {
        (stop - start - 1) / step + 1
    } else {
        0
    };
    let reversed = step < 0;
    if count == 0 {
        return Ok(SliceBounds {
            start: 0,
            stop: 0,
            step: step.unsigned_abs(),
            count: 0,
            reversed,
        });
    }
    // Normalize a negative step to a forward walk over the same elements.
    let (start, stop, step) = if step < 0 {
        (start + (count - 1) * step, start + 1, -step)
    } else {
        (start, stop, step)
    };
    Ok(SliceBounds {
        start: start.unsigned_abs(),
        stop: stop.unsigned_abs(),
        step: step.unsigned_abs(),
        count: count.unsigned_abs(),
        reversed,
    })
}

// =============================================================================
// Tests
// =============================================================================
