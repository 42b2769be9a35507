//! The 2-3 finger tree behind [`PersistentSequence`](super::PersistentSequence).
//!
//! A tree is `Empty`, a `Single` node, or `Deep`: a prefix digit, a middle
//! tree of one-level-deeper nodes, and a suffix digit, with the total size
//! cached. The digits give amortized O(1) access to both ends; the
//! size annotations give O(log n) indexed access, splitting, and
//! concatenation.
//!
//! Invariants maintained by every operation on a `Deep` tree:
//!
//! - `prefix.depth() == suffix.depth()`
//! - `middle.depth() == prefix.depth() + 1` (or `middle` is empty)
//! - `size == prefix.size() + middle.size() + suffix.size()`

use std::fmt;
use std::iter::Peekable;

use crate::ReferenceCounter;

use super::digit::{Digit, DigitErased};
use super::node::{Erased, Node, NodeRef};

pub(crate) type TreeRef<T> = ReferenceCounter<Tree<T>>;

/// A size-annotated 2-3 finger tree.
pub(crate) enum Tree<T> {
    Empty,
    Single(NodeRef<T>),
    Deep {
        size: usize,
        prefix: Digit<T>,
        middle: TreeRef<T>,
        suffix: Digit<T>,
    },
}

impl<T> Clone for Tree<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Single(node) => Self::Single(node.clone()),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => Self::Deep {
                size: *size,
                prefix: prefix.clone(),
                middle: middle.clone(),
                suffix: suffix.clone(),
            },
        }
    }
}

impl<T> Tree<T> {
    pub(crate) const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(node) => node.size(),
            Self::Deep { size, .. } => *size,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(node) => node.depth(),
            Self::Deep { prefix, .. } => prefix.depth(),
        }
    }

    /// Moves this tree behind a shared pointer.
    pub(crate) fn share(self) -> TreeRef<T> {
        ReferenceCounter::new(self)
    }

    pub(crate) fn empty_ref() -> TreeRef<T> {
        ReferenceCounter::new(Self::Empty)
    }

    /// Builds a `Deep` tree, computing the cached size.
    pub(crate) fn deep(prefix: Digit<T>, middle: TreeRef<T>, suffix: Digit<T>) -> Self {
        debug_assert_eq!(prefix.depth(), suffix.depth());
        debug_assert!(middle.is_empty() || middle.depth() == prefix.depth() + 1);
        Self::Deep {
            size: prefix.size() + middle.size() + suffix.size(),
            prefix,
            middle,
            suffix,
        }
    }

    /// Rebuilds a tree from the nodes of a dissolving digit.
    pub(crate) fn from_digit(digit: &Digit<T>) -> Self {
        match digit {
            Digit::One(first) => Self::Single(first.clone()),
            Digit::Two(first, second) => Self::deep(
                Digit::One(first.clone()),
                Self::empty_ref(),
                Digit::One(second.clone()),
            ),
            Digit::Three(first, second, third) => Self::deep(
                Digit::Two(first.clone(), second.clone()),
                Self::empty_ref(),
                Digit::One(third.clone()),
            ),
            Digit::Four(first, second, third, fourth) => Self::deep(
                Digit::Two(first.clone(), second.clone()),
                Self::empty_ref(),
                Digit::Two(third.clone(), fourth.clone()),
            ),
        }
    }

    /// Builds a tree from at most four same-depth nodes.
    pub(crate) fn from_nodes(nodes: &[NodeRef<T>]) -> Self {
        match nodes {
            [] => Self::Empty,
            [first] => Self::Single(first.clone()),
            [first, second] => Self::deep(
                Digit::One(first.clone()),
                Self::empty_ref(),
                Digit::One(second.clone()),
            ),
            [first, second, third] => Self::deep(
                Digit::One(first.clone()),
                Self::empty_ref(),
                Digit::Two(second.clone(), third.clone()),
            ),
            [first, second, third, fourth] => Self::deep(
                Digit::Two(first.clone(), second.clone()),
                Self::empty_ref(),
                Digit::Two(third.clone(), fourth.clone()),
            ),
            _ => unreachable!("tree from {} nodes", nodes.len()),
        }
    }

    /// Builds a tree from a merge result.
    pub(crate) fn from_merge(node: NodeRef<T>, extra: Option<NodeRef<T>>) -> Self {
        match extra {
            None => Self::Single(node),
            Some(extra) => Self::deep(Digit::One(node), Self::empty_ref(), Digit::One(extra)),
        }
    }

    pub(crate) fn push_front(&self, node: NodeRef<T>) -> Self {
        match self {
            Self::Empty => Self::Single(node),
            Self::Single(existing) => Self::deep(
                Digit::One(node),
                Self::empty_ref(),
                Digit::One(existing.clone()),
            ),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                if let Digit::Four(first, second, third, fourth) = prefix {
                    let spilled = Node::branch3(second.clone(), third.clone(), fourth.clone());
                    Self::deep(
                        Digit::Two(node, first.clone()),
                        middle.push_front(spilled).share(),
                        suffix.clone(),
                    )
                } else {
                    Self::deep(prefix.push_front(node), middle.clone(), suffix.clone())
                }
            }
        }
    }

    pub(crate) fn push_back(&self, node: NodeRef<T>) -> Self {
        match self {
            Self::Empty => Self::Single(node),
            Self::Single(existing) => Self::deep(
                Digit::One(existing.clone()),
                Self::empty_ref(),
                Digit::One(node),
            ),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                if let Digit::Four(first, second, third, fourth) = suffix {
                    let spilled = Node::branch3(first.clone(), second.clone(), third.clone());
                    Self::deep(
                        prefix.clone(),
                        middle.push_back(spilled).share(),
                        Digit::Two(fourth.clone(), node),
                    )
                } else {
                    Self::deep(prefix.clone(), middle.clone(), suffix.push_back(node))
                }
            }
        }
    }

    /// Detaches the first node.
    pub(crate) fn view_front(&self) -> Option<(NodeRef<T>, Self)> {
        match self {
            Self::Empty => None,
            Self::Single(node) => Some((node.clone(), Self::Empty)),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                if prefix.order() == 1 {
                    Some((prefix.head().clone(), middle.pull_left(suffix)))
                } else {
                    let (head, rest) = prefix.view_front();
                    Some((head, Self::deep(rest, middle.clone(), suffix.clone())))
                }
            }
        }
    }

    /// Detaches the last node.
    pub(crate) fn view_back(&self) -> Option<(Self, NodeRef<T>)> {
        match self {
            Self::Empty => None,
            Self::Single(node) => Some((Self::Empty, node.clone())),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                if suffix.order() == 1 {
                    Some((middle.pull_right(prefix), suffix.head().clone()))
                } else {
                    let (rest, last) = suffix.view_back();
                    Some((Self::deep(prefix.clone(), middle.clone(), rest), last))
                }
            }
        }
    }

    /// Restores a deep tree whose prefix was consumed, borrowing from this
    /// middle or collapsing it into the remaining suffix.
    pub(crate) fn pull_left(&self, suffix: &Digit<T>) -> Self {
        if self.is_empty() {
            return Self::from_digit(suffix);
        }
        let Some((node, rest)) = self.view_front() else {
            unreachable!("non-empty tree without a front")
        };
        Self::deep(Digit::from_branch(&node), rest.share(), suffix.clone())
    }

    /// Mirror image of [`Tree::pull_left`] for a consumed suffix.
    pub(crate) fn pull_right(&self, prefix: &Digit<T>) -> Self {
        if self.is_empty() {
            return Self::from_digit(prefix);
        }
        let Some((rest, node)) = self.view_back() else {
            unreachable!("non-empty tree without a back")
        };
        Self::deep(prefix.clone(), rest.share(), Digit::from_branch(&node))
    }

    pub(crate) fn get(&self, index: usize) -> &T {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("get on an empty tree"),
            Self::Single(node) => node.get(index),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < prefix.size() {
                    return prefix.get(index);
                }
                index -= prefix.size();
                if index < middle.size() {
                    return middle.get(index);
                }
                suffix.get(index - middle.size())
            }
        }
    }

    pub(crate) fn set(&self, index: usize, value: T) -> Self {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("set on an empty tree"),
            Self::Single(node) => Self::Single(node.set(index, value)),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => {
                let mut index = index;
                if index < prefix.size() {
                    return Self::Deep {
                        size: *size,
                        prefix: prefix.set(index, value),
                        middle: middle.clone(),
                        suffix: suffix.clone(),
                    };
                }
                index -= prefix.size();
                if index < middle.size() {
                    return Self::Deep {
                        size: *size,
                        prefix: prefix.clone(),
                        middle: middle.set(index, value).share(),
                        suffix: suffix.clone(),
                    };
                }
                Self::Deep {
                    size: *size,
                    prefix: prefix.clone(),
                    middle: middle.clone(),
                    suffix: suffix.set(index - middle.size(), value),
                }
            }
        }
    }

    /// Inserts a leaf before position `index`.
    pub(crate) fn insert(&self, index: usize, value: T) -> Self {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("insert into an empty tree"),
            Self::Single(node) => {
                let (inserted, extra) = Node::insert(node, index, value);
                Self::from_merge(inserted, extra)
            }
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < prefix.size() {
                    let (digit, extra) = prefix.insert(index, value, true);
                    let middle = extra.map_or_else(
                        || middle.clone(),
                        |extra| middle.push_front(extra).share(),
                    );
                    return Self::deep(digit, middle, suffix.clone());
                }
                index -= prefix.size();
                if index < middle.size() {
                    return Self::deep(
                        prefix.clone(),
                        middle.insert(index, value).share(),
                        suffix.clone(),
                    );
                }
                let (digit, extra) = suffix.insert(index - middle.size(), value, false);
                let middle = extra.map_or_else(
                    || middle.clone(),
                    |extra| middle.push_back(extra).share(),
                );
                Self::deep(prefix.clone(), middle, digit)
            }
        }
    }

    /// Removes the leaf at `index`.
    ///
    /// The flag is `false` only when the result lives one level below this
    /// tree's nodes; at the top of a sequence that means the tree emptied.
    pub(crate) fn erase(&self, index: usize) -> (bool, Self) {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("erase on an empty tree"),
            Self::Single(node) => match node.erase(index) {
                Erased::Full(node) => (true, Self::Single(node)),
                Erased::Partial(None) => (false, Self::Empty),
                Erased::Partial(Some(node)) => (false, Self::Single(node)),
            },
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < prefix.size() {
                    return (true, Self::erase_in_prefix(prefix, middle, suffix, index));
                }
                index -= prefix.size();
                if index < middle.size() {
                    return (true, Self::erase_in_middle(prefix, middle, suffix, index));
                }
                index -= middle.size();
                (true, Self::erase_in_suffix(prefix, middle, suffix, index))
            }
        }
    }

    fn erase_in_prefix(
        prefix: &Digit<T>,
        middle: &TreeRef<T>,
        suffix: &Digit<T>,
        index: usize,
    ) -> Self {
        match prefix.erase(index) {
            DigitErased::Digit(digit) => Self::deep(digit, middle.clone(), suffix.clone()),
            DigitErased::Partial(partial) => {
                if middle.is_empty() {
                    let merge = Node::merge_left(partial.as_ref(), suffix.head());
                    if suffix.order() == 1 {
                        Self::from_merge(merge.0, merge.1)
                    } else {
                        Self::deep(
                            Digit::from_merge(merge),
                            Self::empty_ref(),
                            suffix.view_front().1,
                        )
                    }
                } else {
                    let Some((head, tail)) = middle.view_front() else {
                        unreachable!("non-empty middle without a front")
                    };
                    Self::deep(
                        Digit::merge_left(partial.as_ref(), &head),
                        tail.share(),
                        suffix.clone(),
                    )
                }
            }
        }
    }

    fn erase_in_middle(
        prefix: &Digit<T>,
        middle: &TreeRef<T>,
        suffix: &Digit<T>,
        index: usize,
    ) -> Self {
        let (full, meld) = middle.erase(index);
        if full {
            return Self::deep(prefix.clone(), meld.share(), suffix.clone());
        }
        // The middle collapsed to a node one level down, which now fits
        // alongside the prefix nodes.
        let Self::Single(node) = meld else {
            unreachable!("underfull middle that is not a single node")
        };
        if let Digit::Four(first, second, third, fourth) = prefix {
            return Self::deep(
                Digit::Two(first.clone(), second.clone()),
                Self::Single(Node::branch3(third.clone(), fourth.clone(), node)).share(),
                suffix.clone(),
            );
        }
        let mut nodes = prefix.to_vec();
        nodes.push(node);
        Self::deep(Digit::from_slice(&nodes), Self::empty_ref(), suffix.clone())
    }

    fn erase_in_suffix(
        prefix: &Digit<T>,
        middle: &TreeRef<T>,
        suffix: &Digit<T>,
        index: usize,
    ) -> Self {
        match suffix.erase(index) {
            DigitErased::Digit(digit) => Self::deep(prefix.clone(), middle.clone(), digit),
            DigitErased::Partial(partial) => {
                if middle.is_empty() {
                    let merge = Node::merge_right(prefix.last(), partial.as_ref());
                    if prefix.order() == 1 {
                        Self::from_merge(merge.0, merge.1)
                    } else {
                        Self::deep(
                            prefix.view_back().0,
                            Self::empty_ref(),
                            Digit::from_merge(merge),
                        )
                    }
                } else {
                    let Some((init, last)) = middle.view_back() else {
                        unreachable!("non-empty middle without a back")
                    };
                    Self::deep(
                        prefix.clone(),
                        init.share(),
                        Digit::merge_right(&last, partial.as_ref()),
                    )
                }
            }
        }
    }

    /// Concatenates two trees of same-depth nodes.
    pub(crate) fn append(&self, that: &Self) -> Self {
        match (self, that) {
            (Self::Empty, _) => that.clone(),
            (_, Self::Empty) => self.clone(),
            (Self::Single(node), _) => that.push_front(node.clone()),
            (_, Self::Single(node)) => self.push_back(node.clone()),
            (
                Self::Deep {
                    prefix: left_prefix,
                    middle: left_middle,
                    suffix: left_suffix,
                    ..
                },
                Self::Deep {
                    prefix: right_prefix,
                    middle: right_middle,
                    suffix: right_suffix,
                    ..
                },
            ) => {
                let mut boundary = left_suffix.to_vec();
                boundary.extend(right_prefix.to_vec());
                let mut middle = (**right_middle).clone();
                for branch in Self::regroup(&boundary).into_iter().rev() {
                    middle = middle.push_front(branch);
                }
                Self::deep(
                    left_prefix.clone(),
                    left_middle.append(&middle).share(),
                    right_suffix.clone(),
                )
            }
        }
    }

    /// Packs the 2..8 boundary nodes of a concatenation into branches.
    fn regroup(nodes: &[NodeRef<T>]) -> Vec<NodeRef<T>> {
        let two = |i: usize| Node::branch2(nodes[i].clone(), nodes[i + 1].clone());
        let three =
            |i: usize| Node::branch3(nodes[i].clone(), nodes[i + 1].clone(), nodes[i + 2].clone());
        match nodes.len() {
            2 => vec![two(0)],
            3 => vec![three(0)],
            4 => vec![two(0), two(2)],
            5 => vec![three(0), two(3)],
            6 => vec![three(0), three(3)],
            7 => vec![three(0), two(3), two(5)],
            8 => vec![two(0), three(2), three(5)],
            count => unreachable!("regroup of {count} boundary nodes"),
        }
    }

    /// Splits at `index` into the tree before, the node containing the
    /// index, and the tree after. Precondition: `index < size`.
    pub(crate) fn split(&self, index: usize) -> (Self, NodeRef<T>, Self) {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("split on an empty tree"),
            Self::Single(node) => (Self::Empty, node.clone(), Self::Empty),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < prefix.size() {
                    let nodes = prefix.to_vec();
                    let mut at = 0;
                    while index >= nodes[at].size() {
                        index -= nodes[at].size();
                        at += 1;
                    }
                    let right = if at + 1 == nodes.len() {
                        middle.pull_left(suffix)
                    } else {
                        Self::deep(
                            Digit::from_slice(&nodes[at + 1..]),
                            middle.clone(),
                            suffix.clone(),
                        )
                    };
                    return (Self::from_nodes(&nodes[..at]), nodes[at].clone(), right);
                }
                index -= prefix.size();
                if index < middle.size() {
                    return Self::split_in_middle(prefix, middle, suffix, index);
                }
                index -= middle.size();
                let nodes = suffix.to_vec();
                let mut at = 0;
                while index >= nodes[at].size() {
                    index -= nodes[at].size();
                    at += 1;
                }
                let left = if at == 0 {
                    middle.pull_right(prefix)
                } else {
                    Self::deep(
                        prefix.clone(),
                        middle.clone(),
                        Digit::from_slice(&nodes[..at]),
                    )
                };
                (left, nodes[at].clone(), Self::from_nodes(&nodes[at + 1..]))
            }
        }
    }

    fn split_in_middle(
        prefix: &Digit<T>,
        middle: &TreeRef<T>,
        suffix: &Digit<T>,
        index: usize,
    ) -> (Self, NodeRef<T>, Self) {
        let (left_tree, node, right_tree) = middle.split(index);
        let mut index = index - left_tree.size();
        match &*node {
            Node::Leaf(_) => unreachable!("leaf node inside a middle tree"),
            Node::Branch2 { first, second, .. } => {
                if index < first.size() {
                    (
                        left_tree.pull_right(prefix),
                        first.clone(),
                        Self::deep(
                            Digit::One(second.clone()),
                            right_tree.share(),
                            suffix.clone(),
                        ),
                    )
                } else {
                    (
                        Self::deep(prefix.clone(), left_tree.share(), Digit::One(first.clone())),
                        second.clone(),
                        right_tree.pull_left(suffix),
                    )
                }
            }
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                if index < first.size() {
                    return (
                        left_tree.pull_right(prefix),
                        first.clone(),
                        Self::deep(
                            Digit::Two(second.clone(), third.clone()),
                            right_tree.share(),
                            suffix.clone(),
                        ),
                    );
                }
                index -= first.size();
                if index < second.size() {
                    return (
                        Self::deep(prefix.clone(), left_tree.share(), Digit::One(first.clone())),
                        second.clone(),
                        Self::deep(
                            Digit::One(third.clone()),
                            right_tree.share(),
                            suffix.clone(),
                        ),
                    );
                }
                (
                    Self::deep(
                        prefix.clone(),
                        left_tree.share(),
                        Digit::Two(first.clone(), second.clone()),
                    ),
                    third.clone(),
                    right_tree.pull_left(suffix),
                )
            }
        }
    }

    /// One-sided split keeping only the first `index` elements, plus the
    /// node containing position `index`. Precondition: `index < size`.
    pub(crate) fn take_front(&self, index: usize) -> (Self, NodeRef<T>) {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("take_front on an empty tree"),
            Self::Single(node) => (Self::Empty, node.clone()),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < prefix.size() {
                    let nodes = prefix.to_vec();
                    let mut at = 0;
                    while index >= nodes[at].size() {
                        index -= nodes[at].size();
                        at += 1;
                    }
                    return (Self::from_nodes(&nodes[..at]), nodes[at].clone());
                }
                index -= prefix.size();
                if index < middle.size() {
                    let (tree, node) = middle.take_front(index);
                    index -= tree.size();
                    return Self::take_front_in_branch(prefix, tree, &node, index);
                }
                index -= middle.size();
                let nodes = suffix.to_vec();
                let mut at = 0;
                while index >= nodes[at].size() {
                    index -= nodes[at].size();
                    at += 1;
                }
                if at == 0 {
                    (middle.pull_right(prefix), nodes[0].clone())
                } else {
                    (
                        Self::deep(
                            prefix.clone(),
                            middle.clone(),
                            Digit::from_slice(&nodes[..at]),
                        ),
                        nodes[at].clone(),
                    )
                }
            }
        }
    }

    fn take_front_in_branch(
        prefix: &Digit<T>,
        tree: Self,
        node: &NodeRef<T>,
        index: usize,
    ) -> (Self, NodeRef<T>) {
        let mut index = index;
        match &**node {
            Node::Leaf(_) => unreachable!("leaf node inside a middle tree"),
            Node::Branch2 { first, second, .. } => {
                if index < first.size() {
                    (tree.pull_right(prefix), first.clone())
                } else {
                    (
                        Self::deep(prefix.clone(), tree.share(), Digit::One(first.clone())),
                        second.clone(),
                    )
                }
            }
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                if index < first.size() {
                    return (tree.pull_right(prefix), first.clone());
                }
                index -= first.size();
                if index < second.size() {
                    return (
                        Self::deep(prefix.clone(), tree.share(), Digit::One(first.clone())),
                        second.clone(),
                    );
                }
                (
                    Self::deep(
                        prefix.clone(),
                        tree.share(),
                        Digit::Two(first.clone(), second.clone()),
                    ),
                    third.clone(),
                )
            }
        }
    }

    /// One-sided split keeping only the last `index` elements; `index`
    /// counts from the back. Precondition: `index < size`.
    pub(crate) fn take_back(&self, index: usize) -> (NodeRef<T>, Self) {
        debug_assert!(index < self.size());
        match self {
            Self::Empty => unreachable!("take_back on an empty tree"),
            Self::Single(node) => (node.clone(), Self::Empty),
            Self::Deep {
                prefix,
                middle,
                suffix,
                ..
            } => {
                let mut index = index;
                if index < suffix.size() {
                    let nodes = suffix.to_vec();
                    let mut at = nodes.len() - 1;
                    while index >= nodes[at].size() {
                        index -= nodes[at].size();
                        at -= 1;
                    }
                    return (nodes[at].clone(), Self::from_nodes(&nodes[at + 1..]));
                }
                index -= suffix.size();
                if index < middle.size() {
                    let (node, tree) = middle.take_back(index);
                    index -= tree.size();
                    return Self::take_back_in_branch(suffix, tree, &node, index);
                }
                index -= middle.size();
                let nodes = prefix.to_vec();
                let mut at = nodes.len() - 1;
                while index >= nodes[at].size() {
                    index -= nodes[at].size();
                    at -= 1;
                }
                if at + 1 == nodes.len() {
                    (nodes[at].clone(), middle.pull_left(suffix))
                } else {
                    (
                        nodes[at].clone(),
                        Self::deep(
                            Digit::from_slice(&nodes[at + 1..]),
                            middle.clone(),
                            suffix.clone(),
                        ),
                    )
                }
            }
        }
    }

    fn take_back_in_branch(
        suffix: &Digit<T>,
        tree: Self,
        node: &NodeRef<T>,
        index: usize,
    ) -> (NodeRef<T>, Self) {
        let mut index = index;
        match &**node {
            Node::Leaf(_) => unreachable!("leaf node inside a middle tree"),
            Node::Branch2 { first, second, .. } => {
                if index < second.size() {
                    (second.clone(), tree.pull_left(suffix))
                } else {
                    (
                        first.clone(),
                        Self::deep(Digit::One(second.clone()), tree.share(), suffix.clone()),
                    )
                }
            }
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                if index < third.size() {
                    return (third.clone(), tree.pull_left(suffix));
                }
                index -= third.size();
                if index < second.size() {
                    return (
                        second.clone(),
                        Self::deep(Digit::One(third.clone()), tree.share(), suffix.clone()),
                    );
                }
                (
                    first.clone(),
                    Self::deep(
                        Digit::Two(second.clone(), third.clone()),
                        tree.share(),
                        suffix.clone(),
                    ),
                )
            }
        }
    }

    /// Reverses the tree.
    pub(crate) fn reverse(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Single(node) => Self::Single(Node::reverse(node)),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => Self::Deep {
                size: *size,
                prefix: suffix.reverse(),
                middle: middle.reverse().share(),
                suffix: prefix.reverse(),
            },
        }
    }

    /// Structure-preserving map over the leaves.
    pub(crate) fn transform<B, F>(&self, function: &mut F) -> Tree<B>
    where
        F: FnMut(&T) -> B,
    {
        match self {
            Self::Empty => Tree::Empty,
            Self::Single(node) => Tree::Single(node.transform(function)),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => Tree::Deep {
                size: *size,
                prefix: prefix.transform(function),
                middle: middle.transform(function).share(),
                suffix: suffix.transform(function),
            },
        }
    }

    /// Applies ascending `(index, value)` assignments in one pass.
    pub(crate) fn set_many<I>(&self, offset: usize, pairs: &mut Peekable<I>) -> Self
    where
        I: Iterator<Item = (usize, T)>,
    {
        match pairs.peek() {
            None => return self.clone(),
            Some((index, _)) if *index >= offset + self.size() => return self.clone(),
            Some(_) => {}
        }
        match self {
            Self::Empty => Self::Empty,
            Self::Single(node) => Self::Single(Node::set_many(node, offset, pairs)),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => {
                let prefix = prefix.set_many(offset, pairs);
                let middle = middle
                    .set_many(offset + prefix.size(), pairs)
                    .share();
                let suffix = suffix.set_many(offset + prefix.size() + middle.size(), pairs);
                Self::Deep {
                    size: *size,
                    prefix,
                    middle,
                    suffix,
                }
            }
        }
    }

    /// Full 3-ary subtree of the given depth, consuming `3^depth` values.
    fn build_node<I>(depth: usize, values: &mut I) -> NodeRef<T>
    where
        I: Iterator<Item = T>,
    {
        if depth == 0 {
            let Some(value) = values.next() else {
                unreachable!("bulk builder ran out of values")
            };
            return Node::leaf(value);
        }
        let first = Self::build_node(depth - 1, values);
        let second = Self::build_node(depth - 1, values);
        let third = Self::build_node(depth - 1, values);
        Node::branch3(first, second, third)
    }

    /// Bottom-up bulk constructor: builds a tree of `count` depth-`depth`
    /// nodes in O(count) by packing values into 3-wide branches and
    /// recursing one level deeper until at most eight nodes remain.
    pub(crate) fn from_counted<I>(count: usize, depth: usize, values: &mut I) -> Self
    where
        I: Iterator<Item = T>,
    {
        if count == 0 {
            return Self::Empty;
        }
        if count <= 8 {
            let nodes: Vec<NodeRef<T>> =
                (0..count).map(|_| Self::build_node(depth, values)).collect();
            return match count {
                1 => Self::Single(nodes[0].clone()),
                2..=4 => Self::from_nodes(&nodes),
                _ => Self::deep(
                    Digit::from_slice(&nodes[..count / 2]),
                    Self::empty_ref(),
                    Digit::from_slice(&nodes[count / 2..]),
                ),
            };
        }
        let prefix = Digit::Three(
            Self::build_node(depth, values),
            Self::build_node(depth, values),
            Self::build_node(depth, values),
        );
        let middle = Self::from_counted((count + 2) / 3 - 2, depth + 1, values);
        let tail = match count % 3 {
            0 => 3,
            remainder => remainder,
        };
        let suffix_nodes: Vec<NodeRef<T>> =
            (0..tail).map(|_| Self::build_node(depth, values)).collect();
        Self::deep(prefix, middle.share(), Digit::from_slice(&suffix_nodes))
    }

    /// Recomputes size and depth, asserting every cached annotation and
    /// the deep-tree depth invariants.
    pub(crate) fn check_invariants(&self) -> (usize, usize) {
        match self {
            Self::Empty => (0, 0),
            Self::Single(node) => node.check_invariants(),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => {
                let (prefix_size, prefix_depth) = prefix.check_invariants();
                let (middle_size, middle_depth) = middle.check_invariants();
                let (suffix_size, suffix_depth) = suffix.check_invariants();
                assert_eq!(prefix_depth, suffix_depth, "deep digit depth mismatch");
                assert!(
                    middle.is_empty() || middle_depth == prefix_depth + 1,
                    "middle depth is not one below the digits"
                );
                assert_eq!(
                    *size,
                    prefix_size + middle_size + suffix_size,
                    "deep size mismatch"
                );
                (*size, prefix_depth)
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Single(node) => f.debug_tuple("Single").field(node).finish(),
            Self::Deep {
                size,
                prefix,
                middle,
                suffix,
            } => f
                .debug_struct("Deep")
                .field("size", size)
                .field("prefix", prefix)
                .field("middle", middle)
                .field("suffix", suffix)
                .finish(),
        }
    }
}
