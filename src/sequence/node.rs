//! 2-3 nodes of the finger tree.
//!
//! A node is either a single element (`Leaf`, depth 0) or a branch of two
//! or three equal-depth children with a cached subtree size. The 2-vs-3
//! shape is what lets insertion and deletion rebalance locally: a 2-branch
//! can absorb an extra child, a 3-branch splits into two 2-branches.

use std::fmt;
use std::iter::Peekable;

use crate::ReferenceCounter;

pub(crate) type NodeRef<T> = ReferenceCounter<Node<T>>;

/// A leaf element or a 2/3-ary internal node with cached subtree size.
pub(crate) enum Node<T> {
    Leaf(T),
    Branch2 {
        size: usize,
        first: NodeRef<T>,
        second: NodeRef<T>,
    },
    Branch3 {
        size: usize,
        first: NodeRef<T>,
        second: NodeRef<T>,
        third: NodeRef<T>,
    },
}

/// Result of erasing a leaf from a subtree.
///
/// `Full` keeps the original arity; `Partial` is an underflow the caller
/// must absorb: the payload sits one level below the erased subtree, and is
/// `None` exactly when the subtree was a single leaf.
pub(crate) enum Erased<T> {
    Full(NodeRef<T>),
    Partial(Option<NodeRef<T>>),
}

impl<T> Node<T> {
    pub(crate) fn leaf(value: T) -> NodeRef<T> {
        ReferenceCounter::new(Self::Leaf(value))
    }

    pub(crate) fn branch2(first: NodeRef<T>, second: NodeRef<T>) -> NodeRef<T> {
        debug_assert_eq!(first.depth(), second.depth());
        ReferenceCounter::new(Self::Branch2 {
            size: first.size() + second.size(),
            first,
            second,
        })
    }

    pub(crate) fn branch3(first: NodeRef<T>, second: NodeRef<T>, third: NodeRef<T>) -> NodeRef<T> {
        debug_assert_eq!(first.depth(), second.depth());
        debug_assert_eq!(first.depth(), third.depth());
        ReferenceCounter::new(Self::Branch3 {
            size: first.size() + second.size() + third.size(),
            first,
            second,
            third,
        })
    }

    pub(crate) const fn size(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch2 { size, .. } | Self::Branch3 { size, .. } => *size,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Branch2 { first, .. } | Self::Branch3 { first, .. } => first.depth() + 1,
        }
    }

    /// The element held by a leaf.
    pub(crate) fn value(&self) -> &T {
        match self {
            Self::Leaf(value) => value,
            Self::Branch2 { .. } | Self::Branch3 { .. } => {
                unreachable!("value called on a branch node")
            }
        }
    }

    pub(crate) fn get(&self, index: usize) -> &T {
        match self {
            Self::Leaf(value) => {
                debug_assert_eq!(index, 0);
                value
            }
            Self::Branch2 { first, second, .. } => {
                if index < first.size() {
                    first.get(index)
                } else {
                    second.get(index - first.size())
                }
            }
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let mut index = index;
                if index < first.size() {
                    return first.get(index);
                }
                index -= first.size();
                if index < second.size() {
                    return second.get(index);
                }
                third.get(index - second.size())
            }
        }
    }

    pub(crate) fn set(&self, index: usize, value: T) -> NodeRef<T> {
        match self {
            Self::Leaf(_) => {
                debug_assert_eq!(index, 0);
                Self::leaf(value)
            }
            Self::Branch2 { first, second, .. } => {
                if index < first.size() {
                    Self::branch2(first.set(index, value), second.clone())
                } else {
                    Self::branch2(first.clone(), second.set(index - first.size(), value))
                }
            }
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let mut index = index;
                if index < first.size() {
                    return Self::branch3(first.set(index, value), second.clone(), third.clone());
                }
                index -= first.size();
                if index < second.size() {
                    return Self::branch3(first.clone(), second.set(index, value), third.clone());
                }
                Self::branch3(
                    first.clone(),
                    second.clone(),
                    third.set(index - second.size(), value),
                )
            }
        }
    }

    /// Inserts a new leaf before position `index` within this subtree.
    ///
    /// Returns the rebuilt node and, when a 3-branch had to split, an
    /// overflow node of the same depth for the caller to place.
    pub(crate) fn insert(
        node: &NodeRef<T>,
        index: usize,
        value: T,
    ) -> (NodeRef<T>, Option<NodeRef<T>>) {
        debug_assert!(index < node.size());
        match &**node {
            Self::Leaf(_) => (Self::leaf(value), Some(node.clone())),
            Self::Branch2 { first, second, .. } => {
                if index < first.size() {
                    let (inserted, extra) = Self::insert(first, index, value);
                    match extra {
                        None => (Self::branch2(inserted, second.clone()), None),
                        Some(extra) => (Self::branch3(inserted, extra, second.clone()), None),
                    }
                } else {
                    let (inserted, extra) = Self::insert(second, index - first.size(), value);
                    match extra {
                        None => (Self::branch2(first.clone(), inserted), None),
                        Some(extra) => (Self::branch3(first.clone(), inserted, extra), None),
                    }
                }
            }
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let mut index = index;
                if index < first.size() {
                    let (inserted, extra) = Self::insert(first, index, value);
                    return match extra {
                        None => (
                            Self::branch3(inserted, second.clone(), third.clone()),
                            None,
                        ),
                        Some(extra) => (
                            Self::branch2(inserted, extra),
                            Some(Self::branch2(second.clone(), third.clone())),
                        ),
                    };
                }
                index -= first.size();
                if index < second.size() {
                    let (inserted, extra) = Self::insert(second, index, value);
                    return match extra {
                        None => (Self::branch3(first.clone(), inserted, third.clone()), None),
                        Some(extra) => (
                            Self::branch2(first.clone(), inserted),
                            Some(Self::branch2(extra, third.clone())),
                        ),
                    };
                }
                let (inserted, extra) = Self::insert(third, index - second.size(), value);
                match extra {
                    None => (Self::branch3(first.clone(), second.clone(), inserted), None),
                    Some(extra) => (
                        Self::branch2(first.clone(), second.clone()),
                        Some(Self::branch2(inserted, extra)),
                    ),
                }
            }
        }
    }

    /// Merges a one-level-shallower orphan into the left edge of `node`.
    pub(crate) fn merge_left(
        left: Option<&NodeRef<T>>,
        node: &NodeRef<T>,
    ) -> (NodeRef<T>, Option<NodeRef<T>>) {
        let Some(left) = left else {
            return (node.clone(), None);
        };
        debug_assert_eq!(left.depth() + 1, node.depth());
        match &**node {
            Self::Leaf(_) => unreachable!("merge_left into a leaf"),
            Self::Branch2 { first, second, .. } => (
                Self::branch3(left.clone(), first.clone(), second.clone()),
                None,
            ),
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => (
                Self::branch2(left.clone(), first.clone()),
                Some(Self::branch2(second.clone(), third.clone())),
            ),
        }
    }

    /// Merges a one-level-shallower orphan into the right edge of `node`.
    pub(crate) fn merge_right(
        node: &NodeRef<T>,
        right: Option<&NodeRef<T>>,
    ) -> (NodeRef<T>, Option<NodeRef<T>>) {
        let Some(right) = right else {
            return (node.clone(), None);
        };
        debug_assert_eq!(node.depth(), right.depth() + 1);
        match &**node {
            Self::Leaf(_) => unreachable!("merge_right into a leaf"),
            Self::Branch2 { first, second, .. } => (
                Self::branch3(first.clone(), second.clone(), right.clone()),
                None,
            ),
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => (
                Self::branch2(first.clone(), second.clone()),
                Some(Self::branch2(third.clone(), right.clone())),
            ),
        }
    }

    /// Attaches a merge result to an optional left sibling.
    pub(crate) fn meld_left(
        node: Option<&NodeRef<T>>,
        merge: (NodeRef<T>, Option<NodeRef<T>>),
    ) -> Erased<T> {
        let (merged, extra) = merge;
        match (node, extra) {
            (Some(node), Some(extra)) => Erased::Full(Self::branch3(node.clone(), merged, extra)),
            (None, Some(extra)) => Erased::Full(Self::branch2(merged, extra)),
            (Some(node), None) => Erased::Full(Self::branch2(node.clone(), merged)),
            (None, None) => Erased::Partial(Some(merged)),
        }
    }

    /// Attaches a merge result to an optional right sibling.
    pub(crate) fn meld_right(
        merge: (NodeRef<T>, Option<NodeRef<T>>),
        node: Option<&NodeRef<T>>,
    ) -> Erased<T> {
        let (merged, extra) = merge;
        match (extra, node) {
            (Some(extra), Some(node)) => Erased::Full(Self::branch3(merged, extra, node.clone())),
            (Some(extra), None) => Erased::Full(Self::branch2(merged, extra)),
            (None, Some(node)) => Erased::Full(Self::branch2(merged, node.clone())),
            (None, None) => Erased::Partial(Some(merged)),
        }
    }

    /// Removes the leaf at `index`, rebalancing with adjacent siblings.
    pub(crate) fn erase(&self, index: usize) -> Erased<T> {
        debug_assert!(index < self.size());
        match self {
            Self::Leaf(_) => Erased::Partial(None),
            Self::Branch2 { first, second, .. } => {
                if index < first.size() {
                    match first.erase(index) {
                        Erased::Full(node) => Erased::Full(Self::branch2(node, second.clone())),
                        Erased::Partial(partial) => {
                            Self::meld_right(Self::merge_left(partial.as_ref(), second), None)
                        }
                    }
                } else {
                    match second.erase(index - first.size()) {
                        Erased::Full(node) => Erased::Full(Self::branch2(first.clone(), node)),
                        Erased::Partial(partial) => {
                            Self::meld_right(Self::merge_right(first, partial.as_ref()), None)
                        }
                    }
                }
            }
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let mut index = index;
                if index < first.size() {
                    return match first.erase(index) {
                        Erased::Full(node) => {
                            Erased::Full(Self::branch3(node, second.clone(), third.clone()))
                        }
                        Erased::Partial(partial) => Self::meld_right(
                            Self::merge_left(partial.as_ref(), second),
                            Some(third),
                        ),
                    };
                }
                index -= first.size();
                if index < second.size() {
                    return match second.erase(index) {
                        Erased::Full(node) => {
                            Erased::Full(Self::branch3(first.clone(), node, third.clone()))
                        }
                        Erased::Partial(partial) => Self::meld_right(
                            Self::merge_right(first, partial.as_ref()),
                            Some(third),
                        ),
                    };
                }
                match third.erase(index - second.size()) {
                    Erased::Full(node) => {
                        Erased::Full(Self::branch3(first.clone(), second.clone(), node))
                    }
                    Erased::Partial(partial) => {
                        Self::meld_left(Some(first), Self::merge_right(second, partial.as_ref()))
                    }
                }
            }
        }
    }

    /// Swaps child order recursively.
    pub(crate) fn reverse(node: &NodeRef<T>) -> NodeRef<T> {
        match &**node {
            Self::Leaf(_) => node.clone(),
            Self::Branch2 { first, second, .. } => {
                Self::branch2(Self::reverse(second), Self::reverse(first))
            }
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => Self::branch3(
                Self::reverse(third),
                Self::reverse(second),
                Self::reverse(first),
            ),
        }
    }

    /// Structure-preserving map over the leaves.
    pub(crate) fn transform<B, F>(&self, function: &mut F) -> NodeRef<B>
    where
        F: FnMut(&T) -> B,
    {
        match self {
            Self::Leaf(value) => Node::leaf(function(value)),
            Self::Branch2 { first, second, .. } => Node::branch2(
                first.transform(function),
                second.transform(function),
            ),
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => Node::branch3(
                first.transform(function),
                second.transform(function),
                third.transform(function),
            ),
        }
    }

    /// Applies ascending `(index, value)` assignments in one pass.
    ///
    /// `pairs` must be sorted by index with no duplicates; entries outside
    /// this subtree's index window are left for the caller.
    pub(crate) fn set_many<I>(
        node: &NodeRef<T>,
        offset: usize,
        pairs: &mut Peekable<I>,
    ) -> NodeRef<T>
    where
        I: Iterator<Item = (usize, T)>,
    {
        match pairs.peek() {
            None => return node.clone(),
            Some((index, _)) if *index >= offset + node.size() => return node.clone(),
            Some(_) => {}
        }
        match &**node {
            Self::Leaf(_) => {
                let Some((index, value)) = pairs.next() else {
                    unreachable!("peeked pair vanished")
                };
                debug_assert_eq!(index, offset);
                Self::leaf(value)
            }
            Self::Branch2 { first, second, .. } => Self::branch2(
                Self::set_many(first, offset, pairs),
                Self::set_many(second, offset + first.size(), pairs),
            ),
            Self::Branch3 {
                first,
                second,
                third,
                ..
            } => Self::branch3(
                Self::set_many(first, offset, pairs),
                Self::set_many(second, offset + first.size(), pairs),
                Self::set_many(third, offset + first.size() + second.size(), pairs),
            ),
        }
    }

    /// Recomputes size and depth, asserting the cached values.
    pub(crate) fn check_invariants(&self) -> (usize, usize) {
        match self {
            Self::Leaf(_) => (1, 0),
            Self::Branch2 {
                size,
                first,
                second,
            } => {
                let (first_size, first_depth) = first.check_invariants();
                let (second_size, second_depth) = second.check_invariants();
                assert_eq!(first_depth, second_depth, "branch children depth mismatch");
                assert_eq!(*size, first_size + second_size, "branch size mismatch");
                (*size, first_depth + 1)
            }
            Self::Branch3 {
                size,
                first,
                second,
                third,
            } => {
                let (first_size, first_depth) = first.check_invariants();
                let (second_size, second_depth) = second.check_invariants();
                let (third_size, third_depth) = third.check_invariants();
                assert_eq!(first_depth, second_depth, "branch children depth mismatch");
                assert_eq!(first_depth, third_depth, "branch children depth mismatch");
                assert_eq!(
                    *size,
                    first_size + second_size + third_size,
                    "branch size mismatch"
                );
                (*size, first_depth + 1)
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => f.debug_tuple("Leaf").field(value).finish(),
            Self::Branch2 {
                size,
                first,
                second,
            } => f
                .debug_struct("Branch2")
                .field("size", size)
                .field("first", first)
                .field("second", second)
                .finish(),
            Self::Branch3 {
                size,
                first,
                second,
                third,
            } => f
                .debug_struct("Branch3")
                .field("size", size)
                .field("first", first)
                .field("second", second)
                .field("third", third)
                .finish(),
        }
    }
}
