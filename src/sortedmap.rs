//! Persistent (immutable) sorted map based on a weight-balanced tree.
//!
//! This module provides [`PersistentSortedMap`], an immutable ordered map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentSortedMap` is a bounded-balance binary search tree in the
//! style of Adams' "Efficient sets: a balancing act" (1993): every node
//! caches its subtree size, and rebalancing keeps either subtree within a
//! factor Δ of the other. Set algebra uses the hedge variants of
//! union/intersection/difference, which split one tree by the other's
//! root and rejoin the partitions.
//!
//! - O(log n) `get`, `insert`, `remove`, `split`, `view_min`/`view_max`
//! - O(m log(n/m + 1)) `union`, `intersection`, `difference`
//! - O(1) `len` and `is_empty`
//!
//! All operations return new maps without modifying the original, and
//! structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use phalanx::PersistentSortedMap;
//!
//! let map = PersistentSortedMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert(1, "ONE");
//! assert_eq!(map.get(&1), Some(&"one"));
//! assert_eq!(updated.get(&1), Some(&"ONE"));
//! ```
//!
//! # Internal Structure
//!
//! The tree maintains two invariants at every node:
//!
//! 1. In-order traversal yields strictly ascending keys
//! 2. Neither subtree exceeds Δ times the other plus one (Δ = 4), with
//!    single vs double rotations selected by Γ = 2
//!
//! These invariants keep the tree height O(log n).

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ReferenceCounter;

/// Rebalance threshold: neither subtree may exceed Δ·(other + 1).
const DELTA: usize = 4;
/// Rotation selector: single rotation while the inner grandchild stays
/// below Γ times the outer one.
const GAMMA: usize = 2;

type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;

/// Internal node structure for the weight-balanced tree.
struct Node<K, V> {
    key: K,
    value: V,
    size: usize,
    left: Option<NodeRef<K, V>>,
    right: Option<NodeRef<K, V>>,
}

impl<K, V> Node<K, V> {
    /// Creates a node, computing the cached size from the children.
    fn new(
        key: K,
        value: V,
        left: Option<NodeRef<K, V>>,
        right: Option<NodeRef<K, V>>,
    ) -> NodeRef<K, V> {
        let size = 1 + size_of(left.as_ref()) + size_of(right.as_ref());
        ReferenceCounter::new(Self {
            key,
            value,
            size,
            left,
            right,
        })
    }
}

/// Size of an optional subtree.
fn size_of<K, V>(node: Option<&NodeRef<K, V>>) -> usize {
    node.map_or(0, |node| node.size)
}

/// A persistent (immutable) ordered map based on a weight-balanced tree.
///
/// Keys must implement `Ord`. The map maintains entries in sorted key
/// order, enabling ordered iteration and efficient splitting and merging.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log n)          |
/// | `insert`       | O(log n)          |
/// | `remove` / `pop` | O(log n)        |
/// | `view_min` / `view_max` | O(log n) |
/// | `split` / `join` | O(log n)        |
/// | `union` / `intersection` / `difference` | O(m log(n/m + 1)) |
/// | `len` / `is_empty` | O(1)          |
///
/// # Examples
///
/// ```rust
/// use phalanx::PersistentSortedMap;
///
/// let map = PersistentSortedMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
/// ```
pub struct PersistentSortedMap<K, V> {
    /// Root node of the tree.
    root: Option<NodeRef<K, V>>,
}

impl<K, V> Clone for PersistentSortedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> PersistentSortedMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, String> = PersistentSortedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        size_of(self.root.as_ref())
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns a reference to the value for `key`, if present.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key
    /// type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new().insert("hello".to_string(), 42);
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_ref();
        while let Some(node) = current {
            match key.cmp(node.key.borrow()) {
                Ordering::Less => current = node.left.as_ref(),
                Ordering::Greater => current = node.right.as_ref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// Returns `true` if the map contains `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the smallest key and its value.
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_ref()?;
        while let Some(left) = current.left.as_ref() {
            current = left;
        }
        Some((&current.key, &current.value))
    }

    /// Returns the largest key and its value.
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_ref()?;
        while let Some(right) = current.right.as_ref() {
            current = right;
        }
        Some((&current.key, &current.value))
    }

    /// Creates an iterator over the entries in ascending key order.
    #[must_use]
    pub fn iter(&self) -> PersistentSortedMapIterator<'_, K, V> {
        let mut entries = Vec::with_capacity(self.len());
        collect_entries(self.root.as_ref(), &mut entries);
        PersistentSortedMapIterator {
            entries,
            current_index: 0,
        }
    }

    /// Creates an iterator over the keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Creates an iterator over the values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K: Clone + Ord, V: Clone> PersistentSortedMap<K, V> {
    /// Creates a map containing a single entry.
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self {
            root: Some(Node::new(key, value, None, None)),
        }
    }

    /// Inserts an entry, replacing the value if the key exists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSortedMap;
    ///
    /// let map1 = PersistentSortedMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        Self {
            root: Some(Self::insert_into_node(self.root.as_ref(), key, value)),
        }
    }

    /// Removes `key`, returning a map without it.
    ///
    /// Returns an equivalent map when the key is absent.
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.pop(key).1
    }

    /// Removes `key`, returning the old value alongside the new map.
    #[must_use]
    pub fn pop<Q>(&self, key: &Q) -> (Option<V>, Self)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (value, root) = Self::pop_from_node(self.root.as_ref(), key);
        (value, Self { root })
    }

    /// Detaches the smallest entry.
    #[must_use]
    pub fn view_min(&self) -> Option<((K, V), Self)> {
        let root = self.root.as_ref()?;
        let (key, value, rest) = Self::view_min_node(root);
        Some(((key, value), Self { root: rest }))
    }

    /// Detaches the largest entry.
    #[must_use]
    pub fn view_max(&self) -> Option<((K, V), Self)> {
        let root = self.root.as_ref()?;
        let (key, value, rest) = Self::view_max_node(root);
        Some(((key, value), Self { root: rest }))
    }

    /// Splits into the entries below `key`, the value at `key` (if any),
    /// and the entries above.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phalanx::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (1..=5).map(|k| (k, k * 10)).collect();
    /// let (less, value, greater) = map.split(&3);
    /// assert_eq!(value, Some(30));
    /// assert_eq!(less.len(), 2);
    /// assert_eq!(greater.len(), 2);
    /// ```
    #[must_use]
    pub fn split<Q>(&self, key: &Q) -> (Self, Option<V>, Self)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (less, value, greater) = Self::split_node(self.root.as_ref(), key);
        (Self { root: less }, value, Self { root: greater })
    }

    /// Joins an entry with maps of strictly smaller and strictly larger
    /// keys, the inverse of [`split`](Self::split).
    #[must_use]
    pub fn join(key: K, value: V, less: &Self, greater: &Self) -> Self {
        Self {
            root: Some(Self::join_nodes(
                key,
                value,
                less.root.clone(),
                greater.root.clone(),
            )),
        }
    }

    /// Left-biased union: on a key collision the value from `self` wins.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.union_with(other, |_, left, _| left.clone())
    }

    /// Union with a combiner applied to colliding keys.
    ///
    /// The combiner receives the key, this map's value, and the other
    /// map's value.
    #[must_use]
    pub fn union_with<F>(&self, other: &Self, mut combine: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        Self {
            root: Self::union_node(
                self.root.as_ref(),
                other.root.as_ref(),
                &mut combine,
                None,
                None,
            ),
        }
    }

    /// Keeps the keys present in both maps, with values from `self`.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.intersection_with(other, |_, left, _| left.clone())
    }

    /// Intersection with a combiner applied to each shared key.
    #[must_use]
    pub fn intersection_with<F>(&self, other: &Self, mut combine: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        Self {
            root: Self::intersection_node(self.root.as_ref(), other.root.as_ref(), &mut combine),
        }
    }

    /// Keeps the keys of `self` that are absent from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.difference_with(other, |_, _, _| None)
    }

    /// Difference with a combiner deciding the fate of shared keys.
    ///
    /// For each key in both maps the combiner receives the key and both
    /// values; returning `Some(value)` keeps the key with that value,
    /// `None` drops it. Keys only in `self` are always kept.
    #[must_use]
    pub fn difference_with<F>(&self, other: &Self, mut combine: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> Option<V>,
    {
        Self {
            root: Self::difference_node(
                self.root.as_ref(),
                other.root.as_ref(),
                &mut combine,
                None,
                None,
            ),
        }
    }

    #[doc(hidden)]
    pub fn check_invariants(&self) {
        Self::check_node(self.root.as_ref(), None, None);
    }

    // =========================================================================
    // Node-level algorithms
    // =========================================================================

    /// Rebuilds a node from parts, restoring the weight balance.
    ///
    /// With both subtrees within the Δ bound the node is built directly.
    /// A heavy side is rotated up: a single rotation while its inner
    /// grandchild is lighter than Γ times its outer one, a double
    /// rotation otherwise.
    fn balance(
        key: K,
        value: V,
        left: Option<NodeRef<K, V>>,
        right: Option<NodeRef<K, V>>,
    ) -> NodeRef<K, V> {
        let left_size = size_of(left.as_ref());
        let right_size = size_of(right.as_ref());
        if left_size + right_size <= 1 {
            return Node::new(key, value, left, right);
        }
        if right_size >= DELTA * left_size {
            let Some(heavy) = right else {
                unreachable!("heavy side without a node")
            };
            if size_of(heavy.left.as_ref()) < GAMMA * size_of(heavy.right.as_ref()) {
                return Node::new(
                    heavy.key.clone(),
                    heavy.value.clone(),
                    Some(Node::new(key, value, left, heavy.left.clone())),
                    heavy.right.clone(),
                );
            }
            let Some(inner) = heavy.left.as_ref() else {
                unreachable!("double rotation without an inner grandchild")
            };
            return Node::new(
                inner.key.clone(),
                inner.value.clone(),
                Some(Node::new(key, value, left, inner.left.clone())),
                Some(Node::new(
                    heavy.key.clone(),
                    heavy.value.clone(),
                    inner.right.clone(),
                    heavy.right.clone(),
                )),
            );
        }
        if left_size >= DELTA * right_size {
            let Some(heavy) = left else {
                unreachable!("heavy side without a node")
            };
            if size_of(heavy.right.as_ref()) < GAMMA * size_of(heavy.left.as_ref()) {
                return Node::new(
                    heavy.key.clone(),
                    heavy.value.clone(),
                    heavy.left.clone(),
                    Some(Node::new(key, value, heavy.right.clone(), right)),
                );
            }
            let Some(inner) = heavy.right.as_ref() else {
                unreachable!("double rotation without an inner grandchild")
            };
            return Node::new(
                inner.key.clone(),
                inner.value.clone(),
                Some(Node::new(
                    heavy.key.clone(),
                    heavy.value.clone(),
                    heavy.left.clone(),
                    inner.left.clone(),
                )),
                Some(Node::new(key, value, inner.right.clone(), right)),
            );
        }
        Node::new(key, value, left, right)
    }

    fn insert_into_node(node: Option<&NodeRef<K, V>>, key: K, value: V) -> NodeRef<K, V> {
        let Some(node) = node else {
            return Node::new(key, value, None, None);
        };
        match key.cmp(&node.key) {
            Ordering::Less => Self::balance(
                node.key.clone(),
                node.value.clone(),
                Some(Self::insert_into_node(node.left.as_ref(), key, value)),
                node.right.clone(),
            ),
            Ordering::Greater => Self::balance(
                node.key.clone(),
                node.value.clone(),
                node.left.clone(),
                Some(Self::insert_into_node(node.right.as_ref(), key, value)),
            ),
            Ordering::Equal => ReferenceCounter::new(Node {
                key,
                value,
                size: node.size,
                left: node.left.clone(),
                right: node.right.clone(),
            }),
        }
    }

    /// Detaches the minimum entry, rebuilding the spine.
    fn view_min_node(node: &NodeRef<K, V>) -> (K, V, Option<NodeRef<K, V>>) {
        node.left.as_ref().map_or_else(
            || (node.key.clone(), node.value.clone(), node.right.clone()),
            |left| {
                let (key, value, rest) = Self::view_min_node(left);
                (
                    key,
                    value,
                    Some(Node::new(
                        node.key.clone(),
                        node.value.clone(),
                        rest,
                        node.right.clone(),
                    )),
                )
            },
        )
    }

    /// Detaches the maximum entry, rebuilding the spine.
    fn view_max_node(node: &NodeRef<K, V>) -> (K, V, Option<NodeRef<K, V>>) {
        node.right.as_ref().map_or_else(
            || (node.key.clone(), node.value.clone(), node.left.clone()),
            |right| {
                let (key, value, rest) = Self::view_max_node(right);
                (
                    key,
                    value,
                    Some(Node::new(
                        node.key.clone(),
                        node.value.clone(),
                        node.left.clone(),
                        rest,
                    )),
                )
            },
        )
    }

    /// Fuses two trees separated by a removed root, promoting the larger
    /// side's extreme entry.
    fn glue(
        left: Option<NodeRef<K, V>>,
        right: Option<NodeRef<K, V>>,
    ) -> Option<NodeRef<K, V>> {
        match (left, right) {
            (None, other) | (other, None) => other,
            (Some(left), Some(right)) => {
                if left.size > right.size {
                    let (key, value, rest) = Self::view_max_node(&left);
                    Some(Self::balance(key, value, rest, Some(right)))
                } else {
                    let (key, value, rest) = Self::view_min_node(&right);
                    Some(Self::balance(key, value, Some(left), rest))
                }
            }
        }
    }

    fn pop_from_node<Q>(
        node: Option<&NodeRef<K, V>>,
        key: &Q,
    ) -> (Option<V>, Option<NodeRef<K, V>>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(node) = node else {
            return (None, None);
        };
        match key.cmp(node.key.borrow()) {
            Ordering::Less => {
                let (value, rest) = Self::pop_from_node(node.left.as_ref(), key);
                (
                    value,
                    Some(Self::balance(
                        node.key.clone(),
                        node.value.clone(),
                        rest,
                        node.right.clone(),
                    )),
                )
            }
            Ordering::Greater => {
                let (value, rest) = Self::pop_from_node(node.right.as_ref(), key);
                (
                    value,
                    Some(Self::balance(
                        node.key.clone(),
                        node.value.clone(),
                        node.left.clone(),
                        rest,
                    )),
                )
            }
            Ordering::Equal => (
                Some(node.value.clone()),
                Self::glue(node.left.clone(), node.right.clone()),
            ),
        }
    }

    /// Merges trees whose key ranges do not overlap.
    fn merge(
        left: Option<NodeRef<K, V>>,
        right: Option<NodeRef<K, V>>,
    ) -> Option<NodeRef<K, V>> {
        match (left, right) {
            (None, other) | (other, None) => other,
            (Some(left), Some(right)) => {
                if DELTA * left.size <= right.size {
                    Some(Self::balance(
                        right.key.clone(),
                        right.value.clone(),
                        Self::merge(Some(left), right.left.clone()),
                        right.right.clone(),
                    ))
                } else if DELTA * right.size <= left.size {
                    Some(Self::balance(
                        left.key.clone(),
                        left.value.clone(),
                        left.left.clone(),
                        Self::merge(left.right.clone(), Some(right)),
                    ))
                } else {
                    Self::glue(Some(left), Some(right))
                }
            }
        }
    }

    /// `balance` generalized to siblings of arbitrary size: descends the
    /// heavier side until the Δ bound holds, then links the entry there.
    fn join_nodes(
        key: K,
        value: V,
        left: Option<NodeRef<K, V>>,
        right: Option<NodeRef<K, V>>,
    ) -> NodeRef<K, V> {
        match (left, right) {
            (None, other) | (other, None) => Self::insert_into_node(other.as_ref(), key, value),
            (Some(left), Some(right)) => {
                if DELTA * left.size <= right.size {
                    Self::balance(
                        right.key.clone(),
                        right.value.clone(),
                        Some(Self::join_nodes(key, value, Some(left), right.left.clone())),
                        right.right.clone(),
                    )
                } else if DELTA * right.size <= left.size {
                    Self::balance(
                        left.key.clone(),
                        left.value.clone(),
                        left.left.clone(),
                        Some(Self::join_nodes(key, value, left.right.clone(), Some(right))),
                    )
                } else {
                    Node::new(key, value, Some(left), Some(right))
                }
            }
        }
    }

    fn split_node<Q>(
        node: Option<&NodeRef<K, V>>,
        key: &Q,
    ) -> (Option<NodeRef<K, V>>, Option<V>, Option<NodeRef<K, V>>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(node) = node else {
            return (None, None, None);
        };
        match key.cmp(node.key.borrow()) {
            Ordering::Less => {
                let (less, value, greater) = Self::split_node(node.left.as_ref(), key);
                (
                    less,
                    value,
                    Some(Self::join_nodes(
                        node.key.clone(),
                        node.value.clone(),
                        greater,
                        node.right.clone(),
                    )),
                )
            }
            Ordering::Greater => {
                let (less, value, greater) = Self::split_node(node.right.as_ref(), key);
                (
                    Some(Self::join_nodes(
                        node.key.clone(),
                        node.value.clone(),
                        node.left.clone(),
                        less,
                    )),
                    value,
                    greater,
                )
            }
            Ordering::Equal => (
                node.left.clone(),
                Some(node.value.clone()),
                node.right.clone(),
            ),
        }
    }

    /// Hedge trim: returns the topmost subtree whose root lies strictly
    /// within `(low, high)`, together with the value stored at `low`.
    fn trim(
        node: Option<&NodeRef<K, V>>,
        low: Option<&K>,
        high: Option<&K>,
    ) -> (Option<V>, Option<NodeRef<K, V>>) {
        let Some(node) = node else {
            return (None, None);
        };
        match low {
            None => {
                if high.is_none_or(|high| node.key < *high) {
                    (None, Some(node.clone()))
                } else {
                    Self::trim(node.left.as_ref(), low, high)
                }
            }
            Some(low_key) => match low_key.cmp(&node.key) {
                Ordering::Less => {
                    if high.is_none_or(|high| node.key < *high) {
                        (Self::lookup_value(Some(node), low_key), Some(node.clone()))
                    } else {
                        Self::trim(node.left.as_ref(), low, high)
                    }
                }
                Ordering::Greater => Self::trim(node.right.as_ref(), low, high),
                Ordering::Equal => (
                    Some(node.value.clone()),
                    Self::trim(node.right.as_ref(), low, high).1,
                ),
            },
        }
    }

    fn lookup_value(node: Option<&NodeRef<K, V>>, key: &K) -> Option<V> {
        let mut current = node;
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_ref(),
                Ordering::Greater => current = node.right.as_ref(),
                Ordering::Equal => return Some(node.value.clone()),
            }
        }
        None
    }

    /// Bounds a subtree rooted at `node` by `(low, high)` exclusive.
    fn bound_subtree(
        node: &NodeRef<K, V>,
        low: Option<&K>,
        high: Option<&K>,
    ) -> NodeRef<K, V> {
        let lesser = low.map_or_else(
            || node.left.clone(),
            |low| Self::split_node(node.left.as_ref(), low).2,
        );
        let greater = high.map_or_else(
            || node.right.clone(),
            |high| Self::split_node(node.right.as_ref(), high).0,
        );
        Self::join_nodes(node.key.clone(), node.value.clone(), lesser, greater)
    }

    /// Hedge union: recurses along `left`, trimming `right` to the key
    /// window of each branch and rejoining with `join`.
    fn union_node<F>(
        left: Option<&NodeRef<K, V>>,
        right: Option<&NodeRef<K, V>>,
        combine: &mut F,
        low: Option<&K>,
        high: Option<&K>,
    ) -> Option<NodeRef<K, V>>
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let Some(right) = right else {
            return left.cloned();
        };
        let Some(left) = left else {
            return Some(Self::bound_subtree(right, low, high));
        };
        let lesser = Self::trim(Some(right), low, Some(&left.key)).1;
        let (collision, greater) = Self::trim(Some(right), Some(&left.key), high);
        let value = collision.map_or_else(
            || left.value.clone(),
            |right_value| combine(&left.key, &left.value, &right_value),
        );
        let below = Self::union_node(left.left.as_ref(), lesser.as_ref(), combine, low, Some(&left.key));
        let above = Self::union_node(
            left.right.as_ref(),
            greater.as_ref(),
            combine,
            Some(&left.key),
            high,
        );
        Some(Self::join_nodes(left.key.clone(), value, below, above))
    }

    /// Split-based intersection: partitions `left` by each `right` root.
    fn intersection_node<F>(
        left: Option<&NodeRef<K, V>>,
        right: Option<&NodeRef<K, V>>,
        combine: &mut F,
    ) -> Option<NodeRef<K, V>>
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let (Some(_), Some(right)) = (left, right) else {
            return None;
        };
        let (lesser, collision, greater) = Self::split_node(left, &right.key);
        let below = Self::intersection_node(lesser.as_ref(), right.left.as_ref(), combine);
        let above = Self::intersection_node(greater.as_ref(), right.right.as_ref(), combine);
        match collision {
            None => Self::merge(below, above),
            Some(left_value) => Some(Self::join_nodes(
                right.key.clone(),
                combine(&right.key, &left_value, &right.value),
                below,
                above,
            )),
        }
    }

    /// Hedge difference: recurses along `right`, trimming `left` to each
    /// key window; the combiner decides the fate of shared keys.
    fn difference_node<F>(
        left: Option<&NodeRef<K, V>>,
        right: Option<&NodeRef<K, V>>,
        combine: &mut F,
        low: Option<&K>,
        high: Option<&K>,
    ) -> Option<NodeRef<K, V>>
    where
        F: FnMut(&K, &V, &V) -> Option<V>,
    {
        let Some(left) = left else {
            return None;
        };
        let Some(right) = right else {
            return Some(Self::bound_subtree(left, low, high));
        };
        let lesser = Self::trim(Some(left), low, Some(&right.key)).1;
        let (collision, greater) = Self::trim(Some(left), Some(&right.key), high);
        let below = Self::difference_node(lesser.as_ref(), right.left.as_ref(), combine, low, Some(&right.key));
        let above = Self::difference_node(
            greater.as_ref(),
            right.right.as_ref(),
            combine,
            Some(&right.key),
            high,
        );
        let kept = collision.and_then(|left_value| combine(&right.key, &left_value, &right.value));
        match kept {
            None => Self::merge(below, above),
            Some(value) => Some(Self::join_nodes(right.key.clone(), value, below, above)),
        }
    }

    /// Recomputes sizes and checks ordering and the balance bound.
    fn check_node(node: Option<&NodeRef<K, V>>, low: Option<&K>, high: Option<&K>) -> usize {
        let Some(node) = node else {
            return 0;
        };
        if let Some(low) = low {
            assert!(*low < node.key, "keys out of order");
        }
        if let Some(high) = high {
            assert!(node.key < *high, "keys out of order");
        }
        let left_size = Self::check_node(node.left.as_ref(), low, Some(&node.key));
        let right_size = Self::check_node(node.right.as_ref(), Some(&node.key), high);
        assert_eq!(node.size, left_size + right_size + 1, "cached size mismatch");
        assert!(
            left_size <= DELTA * (right_size + 1) && right_size <= DELTA * (left_size + 1),
            "balance bound violated"
        );
        node.size
    }
}

fn collect_entries<'a, K, V>(
    node: Option<&'a NodeRef<K, V>>,
    entries: &mut Vec<(&'a K, &'a V)>,
) {
    if let Some(node) = node {
        collect_entries(node.left.as_ref(), entries);
        entries.push((&node.key, &node.value));
        collect_entries(node.right.as_ref(), entries);
    }
}

impl<K, V> Default for PersistentSortedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for PersistentSortedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|(x, y)| x == y)
    }
}

impl<K: Eq, V: Eq> Eq for PersistentSortedMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentSortedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash, V: Hash> Hash for PersistentSortedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(crate::util::hash_iterable(self.iter()));
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for PersistentSortedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (key, value)| map.insert(key, value))
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentSortedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentSortedMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentSortedMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentSortedMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentSortedMapIntoIterator {
            entries,
            current_index: 0,
        }
    }
}

/// A borrowing iterator over the entries of a [`PersistentSortedMap`] in
/// ascending key order.
pub struct PersistentSortedMapIterator<'a, K, V> {
    entries: Vec<(&'a K, &'a V)>,
    current_index: usize,
}

impl<'a, K, V> Iterator for PersistentSortedMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.current_index).copied()?;
        self.current_index += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapIterator<'_, K, V> {}

/// An owning iterator over the entries of a [`PersistentSortedMap`].
pub struct PersistentSortedMapIntoIterator<K, V> {
    entries: Vec<(K, V)>,
    current_index: usize,
}

impl<K: Clone, V: Clone> Iterator for PersistentSortedMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.current_index).cloned()?;
        self.current_index += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for PersistentSortedMapIntoIterator<K, V> {}

// =============================================================================
// Serde
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentSortedMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentSortedMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentSortedMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentSortedMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = PersistentSortedMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentSortedMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentSortedMapVisitor {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
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

    fn map(entries: impl IntoIterator<Item = (i32, i32)>) -> PersistentSortedMap<i32, i32> {
        entries.into_iter().collect()
    }

    mod structure {
        use super::*;

        #[rstest]
        fn test_insert_keeps_balance() {
            let mut ascending = PersistentSortedMap::new();
            let mut descending = PersistentSortedMap::new();
            for key in 0..200 {
                ascending = ascending.insert(key, key);
                descending = descending.insert(-key, key);
                ascending.check_invariants();
                descending.check_invariants();
            }
            assert_eq!(ascending.len(), 200);
        }

        #[rstest]
        fn test_remove_keeps_balance() {
            let mut current = map((0..100).map(|key| (key, key)));
            for key in (0..100).step_by(2) {
                current = current.remove(&key);
                current.check_invariants();
            }
            assert_eq!(current.len(), 50);
        }

        #[rstest]
        fn test_set_algebra_keeps_balance() {
            let left = map((0..60).map(|key| (key, key)));
            let right = map((30..90).map(|key| (key, -key)));
            for combined in [
                left.union(&right),
                left.intersection(&right),
                left.difference(&right),
            ] {
                combined.check_invariants();
            }
        }
    }

    mod operations {
        use super::*;

        #[rstest]
        fn test_insert_then_get_returns_last_written() {
            let current = map([(1, 10)]).insert(1, 20);
            assert_eq!(current.get(&1), Some(&20));
            assert_eq!(current.len(), 1);
        }

        #[rstest]
        fn test_remove_then_get_is_absent() {
            let current = map([(1, 10), (2, 20)]).remove(&1);
            assert_eq!(current.get(&1), None);
            assert_eq!(current.get(&2), Some(&20));
        }

        #[rstest]
        fn test_pop_returns_old_value() {
            let (value, rest) = map([(1, 10), (2, 20)]).pop(&2);
            assert_eq!(value, Some(20));
            assert_eq!(rest.len(), 1);
            let (missing, same) = rest.pop(&9);
            assert_eq!(missing, None);
            assert_eq!(same.len(), 1);
        }

        #[rstest]
        fn test_view_min_max() {
            let current = map([(3, 30), (1, 10), (2, 20)]);
            let ((min_key, min_value), rest) = current.view_min().unwrap();
            assert_eq!((min_key, min_value), (1, 10));
            assert_eq!(rest.len(), 2);
            let ((max_key, _), rest) = current.view_max().unwrap();
            assert_eq!(max_key, 3);
            assert_eq!(rest.len(), 2);
        }

        #[rstest]
        fn test_split_then_join_reconstructs() {
            let current = map((0..50).map(|key| (key, key * 2)));
            let (less, value, greater) = current.split(&20);
            assert_eq!(value, Some(40));
            let rebuilt = PersistentSortedMap::join(20, 40, &less, &greater);
            rebuilt.check_invariants();
            assert_eq!(rebuilt, current);
        }

        #[rstest]
        fn test_union_is_left_biased() {
            let left = map([(1, 10), (2, 20)]);
            let right = map([(2, -20), (3, -30)]);
            let combined = left.union(&right);
            assert_eq!(combined.get(&1), Some(&10));
            assert_eq!(combined.get(&2), Some(&20));
            assert_eq!(combined.get(&3), Some(&-30));
        }

        #[rstest]
        fn test_union_with_combiner() {
            let left = map([(1, 1), (2, 2)]);
            let right = map([(2, 20), (3, 30)]);
            let combined = left.union_with(&right, |_, x, y| x + y);
            assert_eq!(combined.get(&2), Some(&22));
        }

        #[rstest]
        fn test_intersection() {
            let left = map([(1, 10), (2, 20), (3, 30)]);
            let right = map([(2, 0), (3, 0), (4, 0)]);
            let shared = left.intersection(&right);
            assert_eq!(shared.len(), 2);
            assert_eq!(shared.get(&2), Some(&20));
            assert_eq!(shared.get(&4), None);
        }

        #[rstest]
        fn test_difference() {
            let left = map([(1, 10), (2, 20), (3, 30)]);
            let right = map([(2, 0)]);
            let rest = left.difference(&right);
            assert_eq!(rest.len(), 2);
            assert_eq!(rest.get(&2), None);
        }

        #[rstest]
        fn test_difference_with_keeps_chosen() {
            let left = map([(1, 10), (2, 20)]);
            let right = map([(1, 1), (2, 2)]);
            let rest = left.difference_with(&right, |key, x, y| {
                if *key == 1 { Some(x - y) } else { None }
            });
            assert_eq!(rest.get(&1), Some(&9));
            assert_eq!(rest.get(&2), None);
        }

        #[rstest]
        fn test_iter_sorted() {
            let current = map([(3, 0), (1, 0), (2, 0)]);
            let keys: Vec<&i32> = current.keys().collect();
            assert_eq!(keys, vec![&1, &2, &3]);
        }

        #[rstest]
        fn test_borrowed_key_lookup() {
            let current: PersistentSortedMap<String, i32> =
                [("one".to_string(), 1)].into_iter().collect();
            assert_eq!(current.get("one"), Some(&1));
        }
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[rstest]
        fn test_round_trip() {
            let current: PersistentSortedMap<String, i32> = [("a".to_string(), 1), ("b".to_string(), 2)]
                .into_iter()
                .collect();
            let encoded = serde_json::to_string(&current).unwrap();
            let decoded: PersistentSortedMap<String, i32> =
                serde_json::from_str(&encoded).unwrap();
            assert_eq!(current, decoded);
        }
    }
}
