//! Persistent (immutable) sequence based on a 2-3 finger tree.
//!
//! This module provides [`PersistentSequence`], an immutable random-access
//! sequence that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentSequence` is a size-annotated 2-3 finger tree, as described
//! in Hinze & Paterson's "Finger Trees: A Simple General-purpose Data
//! Structure" (2006), extended with indexed insertion and deletion:
//!
//! - amortized O(1) `push_front`, `push_back`, `view_front`, `view_back`
//! - O(log min(i, n-i)) `get`, `set`, `insert`, `erase`, `split`
//! - O(log min(m, n)) concatenation
//! - O(log n + k) slicing
//! - O(n) construction from an iterator
//!
//! All operations return new sequences without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use phalanx::PersistentSequence;
//!
//! let sequence: PersistentSequence<i32> = (1..=3).collect();
//! let extended = sequence.push_back(4);
//!
//! assert_eq!(extended.to_vec(), vec![1, 2, 3, 4]);
//! assert_eq!(sequence.len(), 3); // Original unchanged
//!
//! let (left, right) = extended.split_at(2);
//! assert_eq!(left.to_vec(), vec![1, 2]);
//! assert_eq!(right.to_vec(), vec![3, 4]);
//! ```
//!
//! # References
//!
//! - Hinze & Paterson, "Finger Trees: A Simple General-purpose Data
//!   Structure" (2006)
//! - Okasaki, "Purely Functional Data Structures" (1998)

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Bound, Mul, RangeBounds};

use crate::error::SequenceError;
use crate::util;

mod digit;
pub(crate) mod evolver;
mod iter;
mod node;
mod tree;

pub use evolver::SequenceEvolver;
pub use iter::PersistentSequenceIntoIterator;
pub use iter::PersistentSequenceIterator;

use tree::Tree;

/// One entry of a multi-point [`view`](PersistentSequence::view): the
/// sequences between the requested indices alternate with the elements at
/// them, ending with the trailing chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceView<T> {
    /// The elements strictly between two requested indices.
    Chunk(PersistentSequence<T>),
    /// The element at a requested index.
    Element(T),
}

/// A persistent (immutable) random-access sequence.
///
/// Implemented as a size-annotated 2-3 finger tree: cheap at both ends,
/// logarithmic everywhere else, and every operation leaves the original
/// value intact.
///
/// # Time Complexity
///
/// | Operation | Complexity |
/// |-----------|------------|
/// | `new` / `singleton` | O(1) |
/// | `push_front` / `push_back` | O(1) amortized |
/// | `front` / `back` | O(1) |
/// | `view_front` / `view_back` | O(1) amortized |
/// | `get` / `set` / `insert` / `erase` | O(log min(i, n-i)) |
/// | `concat` | O(log min(m, n)) |
/// | `split` / `split_at` / `take_front` / `drop_front` | O(log min(i, n-i)) |
/// | `get_slice` | O(log n + k) |
/// | `repeat(k)` | O(log k · log n) |
/// | `reverse` / `transform` | O(n) |
/// | `from_iterable` (`collect`) | O(n) |
///
/// # Examples
///
/// ```rust
/// use phalanx::PersistentSequence;
///
/// let sequence = PersistentSequence::new()
///     .push_back(1)
///     .push_back(2)
///     .push_back(3);
///
/// assert_eq!(sequence.front(), Some(&1));
/// assert_eq!(sequence.back(), Some(&3));
/// assert_eq!(sequence.get(1), Some(&2));
/// assert_eq!(sequence.get(-1), Some(&3));
/// ```
pub struct PersistentSequence<T> {
    tree: Tree<T>,
}

impl<T> Clone for PersistentSequence<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T> PersistentSequence<T> {
    /// Creates a new empty sequence.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = PersistentSequence::new();
    /// assert!(sequence.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { tree: Tree::Empty }
    }

    /// Creates a sequence containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self {
            tree: Tree::Single(node::Node::leaf(element)),
        }
    }

    /// Creates a sequence from a slice.
    #[must_use]
    pub fn from_slice(elements: &[T]) -> Self
    where
        T: Clone,
    {
        elements.iter().cloned().collect()
    }

    /// Returns the number of elements in the sequence.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if the sequence contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns a reference to the first element, if any.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        match &self.tree {
            Tree::Empty => None,
            Tree::Single(node) => Some(node.value()),
            Tree::Deep { prefix, .. } => Some(prefix.head().value()),
        }
    }

    /// Returns a reference to the last element, if any.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        match &self.tree {
            Tree::Empty => None,
            Tree::Single(node) => Some(node.value()),
            Tree::Deep { suffix, .. } => Some(suffix.last().value()),
        }
    }

    /// Prepends an element.
    ///
    /// Amortized O(1).
    #[must_use]
    pub fn push_front(&self, element: T) -> Self {
        Self {
            tree: self.tree.push_front(node::Node::leaf(element)),
        }
    }

    /// Appends an element.
    ///
    /// Amortized O(1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=3).collect();
    /// assert_eq!(sequence.push_back(4).to_vec(), vec![1, 2, 3, 4]);
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        Self {
            tree: self.tree.push_back(node::Node::leaf(element)),
        }
    }

    /// Detaches the first element, returning it with the rest.
    ///
    /// Amortized O(1). Returns `None` on an empty sequence.
    #[must_use]
    pub fn view_front(&self) -> Option<(T, Self)>
    where
        T: Clone,
    {
        let (node, rest) = self.tree.view_front()?;
        Some((node.value().clone(), Self { tree: rest }))
    }

    /// Detaches the last element, returning the rest with it.
    ///
    /// Amortized O(1). Returns `None` on an empty sequence.
    #[must_use]
    pub fn view_back(&self) -> Option<(Self, T)>
    where
        T: Clone,
    {
        let (rest, node) = self.tree.view_back()?;
        Some((Self { tree: rest }, node.value().clone()))
    }

    /// Returns the element at `index`, if in range.
    ///
    /// A negative index counts from the end: `-1` is the last element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=5).collect();
    /// assert_eq!(sequence.get(2), Some(&3));
    /// assert_eq!(sequence.get(-2), Some(&4));
    /// assert_eq!(sequence.get(9), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: isize) -> Option<&T> {
        let index = util::check_index(self.len(), index).ok()?;
        Some(self.tree.get(index))
    }

    /// Replaces the element at `index`.
    ///
    /// A negative index counts from the end.
    ///
    /// # Errors
    ///
    /// [`SequenceError::IndexOutOfRange`] when `index` is out of range.
    pub fn set(&self, index: isize, value: T) -> Result<Self, SequenceError> {
        let index = util::check_index(self.len(), index)?;
        Ok(Self {
            tree: self.tree.set(index, value),
        })
    }

    /// Replaces the elements in `[left, right)` with `values`.
    ///
    /// Both bounds may be negative and are clamped into range; the
    /// replacement may have any length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=5).collect();
    /// let replaced = sequence.set_range(1, 4, [-1, -2, -3]);
    /// assert_eq!(replaced.to_vec(), vec![1, -1, -2, -3, 5]);
    /// ```
    #[must_use]
    pub fn set_range<I>(&self, left: isize, right: isize, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let left = util::clamp_index(self.len(), left);
        let right = util::clamp_index(self.len(), right).max(left);
        let middle: Self = values.into_iter().collect();
        self.take_front(left)
            .concat(&middle)
            .concat(&self.drop_front(right))
    }

    /// Replaces the elements selected by `(left, right, step)` with
    /// `values`, which must have exactly as many elements as the slice
    /// selects.
    ///
    /// A unit step delegates to [`set_range`](Self::set_range), which
    /// accepts any replacement length.
    ///
    /// # Errors
    ///
    /// [`SequenceError::ZeroStep`] when `step` is zero,
    /// [`SequenceError::LengthMismatch`] when the replacement length does
    /// not match the selection.
    pub fn set_slice<I>(
        &self,
        left: isize,
        right: isize,
        step: isize,
        values: I,
    ) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = T>,
    {
        let bounds = util::adjust_slice(self.len(), left, right, step)?;
        if step == 1 {
            return Ok(self.set_range(left, right, values));
        }
        if bounds.count == 0 {
            return Ok(self.clone());
        }
        let mut replacement: Vec<T> = values.into_iter().collect();
        if replacement.len() != bounds.count {
            return Err(SequenceError::LengthMismatch {
                expected: bounds.count,
                actual: replacement.len(),
            });
        }
        if bounds.reversed {
            replacement.reverse();
        }
        let pairs: Vec<(usize, T)> = replacement
            .into_iter()
            .enumerate()
            .map(|(offset, value)| (bounds.start + offset * bounds.step, value))
            .collect();
        Ok(self.set_pairs(pairs))
    }

    /// Applies multiple single-index assignments in one structural pass.
    ///
    /// Negative indices count from the end. When the same index appears
    /// more than once, the last assignment wins.
    ///
    /// # Errors
    ///
    /// [`SequenceError::IndexOutOfRange`] when any index is out of range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=4).collect();
    /// let updated = sequence.mset([(2, 0), (3, 5)]).unwrap();
    /// assert_eq!(updated.to_vec(), vec![1, 2, 0, 5]);
    /// ```
    pub fn mset<I>(&self, entries: I) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = (isize, T)>,
    {
        let mut pairs = Vec::new();
        for (index, value) in entries {
            pairs.push((util::check_index(self.len(), index)?, value));
        }
        pairs.sort_by_key(|(index, _)| *index);
        let mut deduped: Vec<(usize, T)> = Vec::with_capacity(pairs.len());
        for (index, value) in pairs {
            match deduped.last_mut() {
                Some(last) if last.0 == index => last.1 = value,
                _ => deduped.push((index, value)),
            }
        }
        Ok(self.set_pairs(deduped))
    }

    /// Single tree walk applying ascending, deduplicated assignments.
    fn set_pairs(&self, pairs: Vec<(usize, T)>) -> Self {
        if pairs.is_empty() {
            return self.clone();
        }
        let mut pairs = pairs.into_iter().peekable();
        Self {
            tree: self.tree.set_many(0, &mut pairs),
        }
    }

    /// Inserts an element before position `index`.
    ///
    /// The index is clamped into `[0, len]`; a negative index counts from
    /// the end before clamping.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=3).collect();
    /// assert_eq!(sequence.insert(1, 9).to_vec(), vec![1, 9, 2, 3]);
    /// assert_eq!(sequence.insert(100, 9).to_vec(), vec![1, 2, 3, 9]);
    /// ```
    #[must_use]
    pub fn insert(&self, index: isize, value: T) -> Self {
        let index = util::clamp_index(self.len(), index);
        if index == 0 {
            return self.push_front(value);
        }
        if index == self.len() {
            return self.push_back(value);
        }
        Self {
            tree: self.tree.insert(index, value),
        }
    }

    /// Removes the element at `index`.
    ///
    /// A negative index counts from the end.
    ///
    /// # Errors
    ///
    /// [`SequenceError::IndexOutOfRange`] when `index` is out of range.
    pub fn erase(&self, index: isize) -> Result<Self, SequenceError> {
        let index = util::check_index(self.len(), index)?;
        Ok(self.erase_index(index))
    }

    fn erase_index(&self, index: usize) -> Self {
        let (full, tree) = self.tree.erase(index);
        if full {
            Self { tree }
        } else {
            debug_assert!(tree.is_empty());
            Self::new()
        }
    }

    /// Removes the elements in `[left, right)`; bounds are clamped.
    #[must_use]
    pub fn erase_range(&self, left: isize, right: isize) -> Self {
        let left = util::clamp_index(self.len(), left);
        let right = util::clamp_index(self.len(), right);
        if left >= right {
            return self.clone();
        }
        if left == 0 {
            return self.drop_front(right);
        }
        if right >= self.len() {
            return self.take_front(left);
        }
        self.take_front(left).concat(&self.drop_front(right))
    }

    /// Removes the elements selected by `(left, right, step)`.
    ///
    /// # Errors
    ///
    /// [`SequenceError::ZeroStep`] when `step` is zero.
    pub fn erase_slice(
        &self,
        left: isize,
        right: isize,
        step: isize,
    ) -> Result<Self, SequenceError> {
        let bounds = util::adjust_slice(self.len(), left, right, step)?;
        if bounds.count == 0 {
            return Ok(self.clone());
        }
        if bounds.step == 1 {
            return Ok(self
                .take_front(bounds.start)
                .concat(&self.drop_front(bounds.stop)));
        }
        let (mut keep, _, mut rest) = self.tree.split(bounds.start);
        for _ in 1..bounds.count {
            let (chunk, _, remainder) = rest.split(bounds.step - 1);
            keep = keep.append(&chunk);
            rest = remainder;
        }
        Ok(Self {
            tree: keep.append(&rest),
        })
    }

    /// Removes the first occurrence of `value`.
    ///
    /// # Errors
    ///
    /// [`SequenceError::ValueNotFound`] when `value` is absent.
    pub fn remove(&self, value: &T) -> Result<Self, SequenceError>
    where
        T: PartialEq,
    {
        let index = self.index_of(value, ..)?;
        Ok(self.erase_index(index))
    }

    /// Returns the position of the first occurrence of `value` within
    /// `range`.
    ///
    /// # Errors
    ///
    /// [`SequenceError::ValueNotFound`] when `value` does not occur there.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=5).collect();
    /// assert_eq!(sequence.index_of(&3, ..), Ok(2));
    /// assert!(sequence.index_of(&3, 3..).is_err());
    /// ```
    pub fn index_of<R>(&self, value: &T, range: R) -> Result<usize, SequenceError>
    where
        T: PartialEq,
        R: RangeBounds<usize>,
    {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start + 1,
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(&stop) => stop + 1,
            Bound::Excluded(&stop) => stop,
            Bound::Unbounded => self.len(),
        }
        .min(self.len());
        if start < stop {
            let mut iterator = self.iter();
            iterator.advance(start);
            for (offset, element) in iterator.take(stop - start).enumerate() {
                if element == value {
                    return Ok(start + offset);
                }
            }
        }
        Err(SequenceError::ValueNotFound)
    }

    /// Counts the occurrences of `value`.
    #[must_use]
    pub fn count_value(&self, value: &T) -> usize
    where
        T: PartialEq,
    {
        self.iter().filter(|element| *element == value).count()
    }

    /// Concatenates two sequences.
    ///
    /// O(log min(m, n)).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let left: PersistentSequence<i32> = (1..=3).collect();
    /// let right: PersistentSequence<i32> = (4..=6).collect();
    /// assert_eq!(left.concat(&right).to_vec(), vec![1, 2, 3, 4, 5, 6]);
    /// ```
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            tree: self.tree.append(&other.tree),
        }
    }

    /// Repeats the sequence `times` times by doubling.
    ///
    /// O(log times · log n) time and space.
    #[must_use]
    pub fn repeat(&self, times: usize) -> Self {
        if times == 0 {
            return Self::new();
        }
        let mut result = Tree::Empty;
        let mut tree = self.tree.clone();
        let mut times = times;
        loop {
            if times & 1 == 1 {
                result = tree.append(&result);
            }
            times >>= 1;
            if times == 0 {
                break;
            }
            tree = tree.append(&tree);
        }
        Self { tree: result }
    }

    /// Splits at `index` into the elements before, the element at the
    /// index, and the elements after.
    ///
    /// # Errors
    ///
    /// [`SequenceError::IndexOutOfRange`] when `index` is out of range.
    pub fn split(&self, index: isize) -> Result<(Self, T, Self), SequenceError>
    where
        T: Clone,
    {
        let index = util::check_index(self.len(), index)?;
        let (left, node, right) = self.tree.split(index);
        Ok((
            Self { tree: left },
            node.value().clone(),
            Self { tree: right },
        ))
    }

    /// Splits into the elements before `index` and the rest.
    ///
    /// The index is clamped into `[0, len]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=5).collect();
    /// let (left, right) = sequence.split_at(2);
    /// assert_eq!(left.to_vec(), vec![1, 2]);
    /// assert_eq!(right.to_vec(), vec![3, 4, 5]);
    /// ```
    #[must_use]
    pub fn split_at(&self, index: isize) -> (Self, Self) {
        let index = util::clamp_index(self.len(), index);
        if index >= self.len() {
            return (self.clone(), Self::new());
        }
        let (left, node, right) = self.tree.split(index);
        (
            Self { tree: left },
            Self {
                tree: right.push_front(node),
            },
        )
    }

    /// Keeps the first `count` elements; `count` is clamped.
    #[must_use]
    pub fn take_front(&self, count: usize) -> Self {
        if count == 0 {
            return Self::new();
        }
        if count >= self.len() {
            return self.clone();
        }
        Self {
            tree: self.tree.take_front(count).0,
        }
    }

    /// Keeps the last `count` elements; `count` is clamped.
    #[must_use]
    pub fn take_back(&self, count: usize) -> Self {
        if count == 0 {
            return Self::new();
        }
        if count >= self.len() {
            return self.clone();
        }
        Self {
            tree: self.tree.take_back(count).1,
        }
    }

    /// Removes the first `count` elements; `count` is clamped.
    #[must_use]
    pub fn drop_front(&self, count: usize) -> Self {
        self.take_back(self.len() - count.min(self.len()))
    }

    /// Removes the last `count` elements; `count` is clamped.
    #[must_use]
    pub fn drop_back(&self, count: usize) -> Self {
        self.take_front(self.len() - count.min(self.len()))
    }

    /// Returns the elements in `[left, right)`; bounds are clamped and
    /// `left` is raised to at most `right`.
    #[must_use]
    pub fn get_range(&self, left: usize, right: usize) -> Self {
        let right = right.min(self.len());
        let left = left.min(right);
        self.take_front(right).drop_front(left)
    }

    /// Returns the elements selected by `(left, right, step)`.
    ///
    /// Negative bounds wrap, out-of-range bounds clamp, and a negative
    /// step selects back to front.
    ///
    /// # Errors
    ///
    /// [`SequenceError::ZeroStep`] when `step` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=5).collect();
    /// assert_eq!(sequence.get_slice(1, 4, 1).unwrap().to_vec(), vec![2, 3, 4]);
    /// assert_eq!(sequence.get_slice(-4, -1, 1).unwrap().to_vec(), vec![2, 3, 4]);
    /// assert_eq!(sequence.get_slice(1, 5, 2).unwrap().to_vec(), vec![2, 4]);
    /// assert_eq!(sequence.get_slice(4, 0, -2).unwrap().to_vec(), vec![5, 3]);
    /// ```
    pub fn get_slice(&self, left: isize, right: isize, step: isize) -> Result<Self, SequenceError>
    where
        T: Clone,
    {
        let bounds = util::adjust_slice(self.len(), left, right, step)?;
        if bounds.count == 0 {
            return Ok(Self::new());
        }
        let selected = if bounds.step == 1 {
            self.get_range(bounds.start, bounds.stop)
        } else {
            let mut iterator = self.iter();
            iterator.advance(bounds.start);
            let mut stepped = SteppedValues {
                iterator,
                step: bounds.step,
            };
            Self {
                tree: Tree::from_counted(bounds.count, 0, &mut stepped),
            }
        };
        Ok(if bounds.reversed {
            selected.reverse()
        } else {
            selected
        })
    }

    /// Returns the sequence in reverse order. O(n).
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            tree: self.tree.reverse(),
        }
    }

    /// Applies `function` to every element, producing a sequence of
    /// identical shape. O(n).
    #[must_use]
    pub fn transform<B, F>(&self, mut function: F) -> PersistentSequence<B>
    where
        F: FnMut(&T) -> B,
    {
        PersistentSequence {
            tree: self.tree.transform(&mut function),
        }
    }

    /// Splits out the elements at the given strictly ascending indices,
    /// returning the chunks between them alternating with the elements at
    /// them, ending with the trailing chunk.
    ///
    /// # Errors
    ///
    /// [`SequenceError::IndexOutOfRange`] when an index is out of range,
    /// [`SequenceError::UnsortedIndices`] when the indices are not
    /// strictly ascending.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::{PersistentSequence, SequenceView};
    ///
    /// let sequence: PersistentSequence<i32> = (1..=4).collect();
    /// let parts = sequence.view(&[1, 3]).unwrap();
    /// assert_eq!(parts.len(), 5);
    /// assert_eq!(parts[1], SequenceView::Element(2));
    /// assert_eq!(parts[3], SequenceView::Element(4));
    /// ```
    pub fn view(&self, indices: &[isize]) -> Result<Vec<SequenceView<T>>, SequenceError>
    where
        T: Clone,
    {
        let length = self.len();
        let mut parts = Vec::with_capacity(indices.len() * 2 + 1);
        let mut rest = self.clone();
        let mut consumed = 0;
        for &raw in indices {
            let index = util::check_index(length, raw)?;
            if index < consumed {
                return Err(SequenceError::UnsortedIndices);
            }
            let (left, node, right) = rest.tree.split(index - consumed);
            parts.push(SequenceView::Chunk(Self { tree: left }));
            parts.push(SequenceView::Element(node.value().clone()));
            rest = Self { tree: right };
            consumed = index + 1;
        }
        parts.push(SequenceView::Chunk(rest));
        Ok(parts)
    }

    /// Splits the sequence into chunks of `size` elements; the last chunk
    /// may be smaller.
    ///
    /// # Errors
    ///
    /// [`SequenceError::BadChunkSize`] when `size` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSequence;
    ///
    /// let sequence: PersistentSequence<i32> = (1..=8).collect();
    /// let chunks = sequence.chunks_of(3).unwrap();
    /// assert_eq!(chunks.len(), 3);
    /// assert_eq!(chunks.get(2).unwrap().to_vec(), vec![7, 8]);
    /// ```
    pub fn chunks_of(&self, size: usize) -> Result<PersistentSequence<Self>, SequenceError> {
        if size == 0 {
            return Err(SequenceError::BadChunkSize);
        }
        let mut chunks = Vec::with_capacity(self.len().div_ceil(size));
        let mut rest = self.clone();
        while !rest.is_empty() {
            chunks.push(rest.take_front(size));
            rest = rest.drop_front(size);
        }
        Ok(chunks.into_iter().collect())
    }

    /// Materializes the sequence in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Creates a forward iterator over references to the elements.
    #[must_use]
    pub fn iter(&self) -> PersistentSequenceIterator<'_, T> {
        PersistentSequenceIterator::new(&self.tree, false)
    }

    /// Creates a reverse iterator over references to the elements.
    #[must_use]
    pub fn reverse_iter(&self) -> PersistentSequenceIterator<'_, T> {
        PersistentSequenceIterator::new(&self.tree, true)
    }

    /// Creates an evolver editing a snapshot of this sequence.
    #[must_use]
    pub fn evolver(&self) -> SequenceEvolver<T> {
        SequenceEvolver::new(self.clone())
    }

    #[doc(hidden)]
    pub fn check_invariants(&self) {
        let (size, _) = self.tree.check_invariants();
        assert_eq!(size, self.len(), "cached sequence size mismatch");
    }
}

/// Creates a [`PersistentSequence`] containing the arguments.
///
/// # Examples
///
/// ```rust
/// use phalanx::sequence;
///
/// let sequence = sequence![1, 2, 3];
/// assert_eq!(sequence.to_vec(), vec![1, 2, 3]);
///
/// let empty: phalanx::PersistentSequence<i32> = sequence![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! sequence {
    () => {
        $crate::PersistentSequence::new()
    };
    ($($element:expr),+ $(,)?) => {
        [$($element),+]
            .into_iter()
            .collect::<$crate::PersistentSequence<_>>()
    };
}

/// Clones every `step`-th element out of a borrowed iterator.
struct SteppedValues<'a, T> {
    iterator: PersistentSequenceIterator<'a, T>,
    step: usize,
}

impl<T: Clone> Iterator for SteppedValues<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.iterator.next()?.clone();
        self.iterator.advance(self.step - 1);
        Some(value)
    }
}

impl<T> Default for PersistentSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for PersistentSequence<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        util::equal_iterators(self.iter(), other.iter())
    }
}

impl<T: Eq> Eq for PersistentSequence<T> {}

impl<T: PartialOrd> PartialOrd for PersistentSequence<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        util::partial_compare_iterators(self.iter(), other.iter())
    }
}

impl<T: Ord> Ord for PersistentSequence<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        util::compare_iterators(self.iter(), other.iter())
    }
}

impl<T: Hash> Hash for PersistentSequence<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(util::hash_iterable(self.iter()));
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for PersistentSequence<T> {
    /// Builds the sequence bottom-up in O(n).
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let values: Vec<T> = iter.into_iter().collect();
        let count = values.len();
        let mut values = values.into_iter();
        Self {
            tree: Tree::from_counted(count, 0, &mut values),
        }
    }
}

impl<T: Clone> IntoIterator for PersistentSequence<T> {
    type Item = T;
    type IntoIter = PersistentSequenceIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentSequenceIntoIterator { sequence: self }
    }
}

impl<'a, T> IntoIterator for &'a PersistentSequence<T> {
    type Item = &'a T;
    type IntoIter = PersistentSequenceIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Add for PersistentSequence<T> {
    type Output = Self;

    /// Concatenation, mirroring [`concat`](Self::concat).
    fn add(self, other: Self) -> Self {
        self.concat(&other)
    }
}

impl<T> Mul<usize> for PersistentSequence<T> {
    type Output = Self;

    /// Repetition, mirroring [`repeat`](Self::repeat).
    fn mul(self, times: usize) -> Self {
        self.repeat(times)
    }
}

// =============================================================================
// Serde
// =============================================================================

#[cfg(feature = "serde")]
impl<T> serde::Serialize for PersistentSequence<T>
where
    T: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentSequenceVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentSequenceVisitor<T>
where
    T: serde::Deserialize<'de>,
{
    type Value = PersistentSequence<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut elements = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(element) = access.next_element()? {
            elements.push(element);
        }
        Ok(elements.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentSequence<T>
where
    T: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentSequenceVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sequence(range: std::ops::Range<i32>) -> PersistentSequence<i32> {
        range.collect()
    }

    mod structure {
        use super::*;

        #[rstest]
        fn test_bulk_build_preserves_invariants() {
            for count in 0..200 {
                let sequence = sequence(0..count);
                sequence.check_invariants();
                assert_eq!(sequence.len(), count.unsigned_abs() as usize);
            }
        }

        #[rstest]
        fn test_push_preserves_invariants() {
            let mut sequence = PersistentSequence::new();
            for element in 0..100 {
                sequence = if element % 2 == 0 {
                    sequence.push_back(element)
                } else {
                    sequence.push_front(element)
                };
                sequence.check_invariants();
            }
        }

        #[rstest]
        fn test_insert_erase_preserve_invariants() {
            let mut sequence = sequence(0..50);
            for step in 0_i32..25 {
                sequence = sequence.insert(isize::try_from(step).unwrap() * 2, -step);
                sequence.check_invariants();
            }
            for _ in 0..30 {
                let middle = isize::try_from(sequence.len() / 2).unwrap() - 1;
                sequence = sequence.erase(middle).unwrap();
                sequence.check_invariants();
            }
        }

        #[rstest]
        fn test_concat_preserves_invariants() {
            for left in [0, 1, 3, 9, 40] {
                for right in [0, 1, 4, 27, 60] {
                    let combined = sequence(0..left).concat(&sequence(0..right));
                    combined.check_invariants();
                    assert_eq!(combined.len(), (left + right) as usize);
                }
            }
        }

        #[rstest]
        fn test_split_preserves_invariants() {
            let original = sequence(0..81);
            for index in 0..81 {
                let (left, value, right) = original.split(index).unwrap();
                left.check_invariants();
                right.check_invariants();
                assert_eq!(value, i32::try_from(index).unwrap());
            }
        }
    }

    mod ends {
        use super::*;

        #[rstest]
        fn test_front_back_empty() {
            let sequence: PersistentSequence<i32> = PersistentSequence::new();
            assert_eq!(sequence.front(), None);
            assert_eq!(sequence.back(), None);
        }

        #[rstest]
        fn test_front_back() {
            let sequence = sequence(1..6);
            assert_eq!(sequence.front(), Some(&1));
            assert_eq!(sequence.back(), Some(&5));
        }

        #[rstest]
        fn test_view_front_round_trip() {
            let mut rest = sequence(0..40);
            let mut collected = Vec::new();
            while let Some((element, remainder)) = rest.view_front() {
                collected.push(element);
                rest = remainder;
            }
            assert_eq!(collected, (0..40).collect::<Vec<_>>());
        }

        #[rstest]
        fn test_view_back_round_trip() {
            let mut rest = sequence(0..40);
            let mut collected = Vec::new();
            while let Some((remainder, element)) = rest.view_back() {
                collected.push(element);
                rest = remainder;
            }
            assert_eq!(collected, (0..40).rev().collect::<Vec<_>>());
        }
    }

    mod indexing {
        use super::*;

        #[rstest]
        fn test_get_positive_and_negative() {
            let sequence = sequence(0..10);
            assert_eq!(sequence.get(0), Some(&0));
            assert_eq!(sequence.get(9), Some(&9));
            assert_eq!(sequence.get(-1), Some(&9));
            assert_eq!(sequence.get(-10), Some(&0));
            assert_eq!(sequence.get(10), None);
            assert_eq!(sequence.get(-11), None);
        }

        #[rstest]
        fn test_set() {
            let sequence = sequence(0..10);
            let updated = sequence.set(3, 99).unwrap();
            assert_eq!(updated.get(3), Some(&99));
            assert_eq!(sequence.get(3), Some(&3));
            updated.check_invariants();
        }

        #[rstest]
        fn test_set_out_of_range() {
            let sequence = sequence(0..3);
            assert_eq!(
                sequence.set(3, 0),
                Err(SequenceError::IndexOutOfRange {
                    index: 3,
                    length: 3
                })
            );
        }

        #[rstest]
        fn test_insert_middle_everywhere() {
            let original = sequence(0..30);
            for index in 0..=30 {
                let inserted = original.insert(index, 99);
                inserted.check_invariants();
                assert_eq!(inserted.len(), 31);
                assert_eq!(inserted.get(index), Some(&99));
            }
        }

        #[rstest]
        fn test_erase_everywhere() {
            let original = sequence(0..30);
            for index in 0..30 {
                let erased = original.erase(index).unwrap();
                erased.check_invariants();
                assert_eq!(erased.len(), 29);
                let mut expected: Vec<i32> = (0..30).collect();
                expected.remove(index.unsigned_abs());
                assert_eq!(erased.to_vec(), expected);
            }
        }

        #[rstest]
        fn test_erase_last_element_gives_empty() {
            let sequence = PersistentSequence::singleton(7);
            assert!(sequence.erase(0).unwrap().is_empty());
        }
    }

    mod iterator {
        use super::*;

        #[rstest]
        fn test_iter_matches_to_vec() {
            let sequence = sequence(0..100);
            let collected: Vec<i32> = sequence.iter().copied().collect();
            assert_eq!(collected, sequence.to_vec());
        }

        #[rstest]
        fn test_reverse_iter() {
            let sequence = sequence(0..50);
            let collected: Vec<i32> = sequence.reverse_iter().copied().collect();
            assert_eq!(collected, (0..50).rev().collect::<Vec<_>>());
        }

        #[rstest]
        fn test_advance_matches_get() {
            let sequence = sequence(0..64);
            for index in 0..64 {
                let mut iterator = sequence.iter();
                iterator.advance(index);
                assert_eq!(iterator.next(), sequence.get(index as isize));
            }
        }

        #[rstest]
        fn test_iterator_equality() {
            let sequence = sequence(0..20);
            let mut first = sequence.iter();
            let mut second = sequence.iter();
            assert_eq!(first, second);
            first.next();
            assert_ne!(first, second);
            second.next();
            assert_eq!(first, second);
        }

        #[rstest]
        fn test_exhausted_iterators_equal() {
            let left = sequence(0..3);
            let right = sequence(5..9);
            let mut left_iterator = left.iter();
            let mut right_iterator = right.iter();
            while left_iterator.next().is_some() {}
            while right_iterator.next().is_some() {}
            assert_eq!(left_iterator, right_iterator);
        }
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[rstest]
        fn test_round_trip() {
            let sequence = sequence(0..20);
            let encoded = serde_json::to_string(&sequence).unwrap();
            let decoded: PersistentSequence<i32> = serde_json::from_str(&encoded).unwrap();
            assert_eq!(sequence, decoded);
        }

        #[rstest]
        fn test_serializes_as_list() {
            let sequence = sequence(1..4);
            assert_eq!(serde_json::to_string(&sequence).unwrap(), "[1,2,3]");
        }
    }
}
