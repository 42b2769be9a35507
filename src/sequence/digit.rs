//! Digits: the 1..4-wide boundary buffers of a deep finger tree.
//!
//! A digit holds one to four nodes of equal depth. Pushing into a full
//! digit is routed through the tree, which packs three of the four nodes
//! into a fresh branch and spills it into the middle.

use std::fmt;

use super::node::{Erased, Node, NodeRef};

/// An ordered buffer of 1..4 same-depth nodes.
pub(crate) enum Digit<T> {
    One(NodeRef<T>),
    Two(NodeRef<T>, NodeRef<T>),
    Three(NodeRef<T>, NodeRef<T>, NodeRef<T>),
    Four(NodeRef<T>, NodeRef<T>, NodeRef<T>, NodeRef<T>),
}

/// Result of erasing from a digit.
///
/// `Partial` means the digit dissolved entirely: the remainder (if any)
/// lives one level below and the tree must be reshaped around it.
pub(crate) enum DigitErased<T> {
    Digit(Digit<T>),
    Partial(Option<NodeRef<T>>),
}

impl<T> Clone for Digit<T> {
    fn clone(&self) -> Self {
        match self {
            Self::One(first) => Self::One(first.clone()),
            Self::Two(first, second) => Self::Two(first.clone(), second.clone()),
            Self::Three(first, second, third) => {
                Self::Three(first.clone(), second.clone(), third.clone())
            }
            Self::Four(first, second, third, fourth) => {
                Self::Four(first.clone(), second.clone(), third.clone(), fourth.clone())
            }
        }
    }
}

impl<T> Digit<T> {
    pub(crate) const fn order(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(..) => 2,
            Self::Three(..) => 3,
            Self::Four(..) => 4,
        }
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            Self::One(first) => first.size(),
            Self::Two(first, second) => first.size() + second.size(),
            Self::Three(first, second, third) => first.size() + second.size() + third.size(),
            Self::Four(first, second, third, fourth) => {
                first.size() + second.size() + third.size() + fourth.size()
            }
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.head().depth()
    }

    pub(crate) const fn head(&self) -> &NodeRef<T> {
        match self {
            Self::One(first)
            | Self::Two(first, _)
            | Self::Three(first, _, _)
            | Self::Four(first, _, _, _) => first,
        }
    }

    pub(crate) const fn last(&self) -> &NodeRef<T> {
        match self {
            Self::One(first) => first,
            Self::Two(_, second) => second,
            Self::Three(_, _, third) => third,
            Self::Four(_, _, _, fourth) => fourth,
        }
    }

    pub(crate) fn to_vec(&self) -> Vec<NodeRef<T>> {
        match self {
            Self::One(first) => vec![first.clone()],
            Self::Two(first, second) => vec![first.clone(), second.clone()],
            Self::Three(first, second, third) => {
                vec![first.clone(), second.clone(), third.clone()]
            }
            Self::Four(first, second, third, fourth) => {
                vec![first.clone(), second.clone(), third.clone(), fourth.clone()]
            }
        }
    }

    pub(crate) fn from_slice(nodes: &[NodeRef<T>]) -> Self {
        match nodes {
            [first] => Self::One(first.clone()),
            [first, second] => Self::Two(first.clone(), second.clone()),
            [first, second, third] => Self::Three(first.clone(), second.clone(), third.clone()),
            [first, second, third, fourth] => Self::Four(
                first.clone(),
                second.clone(),
                third.clone(),
                fourth.clone(),
            ),
            _ => unreachable!("digit from {} nodes", nodes.len()),
        }
    }

    /// Unpacks a branch node into a digit of its children.
    pub(crate) fn from_branch(node: &NodeRef<T>) -> Self {
        match &**node {
            Node::Leaf(_) => unreachable!("digit from a leaf node"),
            Node::Branch2 { first, second, .. } => Self::Two(first.clone(), second.clone()),
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => Self::Three(first.clone(), second.clone(), third.clone()),
        }
    }

    /// Packs a merge result into a one- or two-node digit.
    pub(crate) fn from_merge(merge: (NodeRef<T>, Option<NodeRef<T>>)) -> Self {
        let (node, extra) = merge;
        match extra {
            None => Self::One(node),
            Some(extra) => Self::Two(node, extra),
        }
    }

    pub(crate) fn push_front(&self, node: NodeRef<T>) -> Self {
        match self {
            Self::One(first) => Self::Two(node, first.clone()),
            Self::Two(first, second) => Self::Three(node, first.clone(), second.clone()),
            Self::Three(first, second, third) => {
                Self::Four(node, first.clone(), second.clone(), third.clone())
            }
            Self::Four(..) => unreachable!("push_front into a full digit"),
        }
    }

    pub(crate) fn push_back(&self, node: NodeRef<T>) -> Self {
        match self {
            Self::One(first) => Self::Two(first.clone(), node),
            Self::Two(first, second) => Self::Three(first.clone(), second.clone(), node),
            Self::Three(first, second, third) => {
                Self::Four(first.clone(), second.clone(), third.clone(), node)
            }
            Self::Four(..) => unreachable!("push_back into a full digit"),
        }
    }

    /// Splits off the first node. Precondition: order >= 2.
    pub(crate) fn view_front(&self) -> (NodeRef<T>, Self) {
        match self {
            Self::One(_) => unreachable!("view_front on a single-node digit"),
            Self::Two(first, second) => (first.clone(), Self::One(second.clone())),
            Self::Three(first, second, third) => {
                (first.clone(), Self::Two(second.clone(), third.clone()))
            }
            Self::Four(first, second, third, fourth) => (
                first.clone(),
                Self::Three(second.clone(), third.clone(), fourth.clone()),
            ),
        }
    }

    /// Splits off the last node. Precondition: order >= 2.
    pub(crate) fn view_back(&self) -> (Self, NodeRef<T>) {
        match self {
            Self::One(_) => unreachable!("view_back on a single-node digit"),
            Self::Two(first, second) => (Self::One(first.clone()), second.clone()),
            Self::Three(first, second, third) => {
                (Self::Two(first.clone(), second.clone()), third.clone())
            }
            Self::Four(first, second, third, fourth) => (
                Self::Three(first.clone(), second.clone(), third.clone()),
                fourth.clone(),
            ),
        }
    }

    pub(crate) fn get(&self, index: usize) -> &T {
        debug_assert!(index < self.size());
        let mut index = index;
        match self {
            Self::One(first) => first.get(index),
            Self::Two(first, second) => {
                if index < first.size() {
                    first.get(index)
                } else {
                    second.get(index - first.size())
                }
            }
            Self::Three(first, second, third) => {
                if index < first.size() {
                    return first.get(index);
                }
                index -= first.size();
                if index < second.size() {
                    return second.get(index);
                }
                third.get(index - second.size())
            }
            Self::Four(first, second, third, fourth) => {
                if index < first.size() {
                    return first.get(index);
                }
                index -= first.size();
                if index < second.size() {
                    return second.get(index);
                }
                index -= second.size();
                if index < third.size() {
                    return third.get(index);
                }
                fourth.get(index - third.size())
            }
        }
    }

    pub(crate) fn set(&self, index: usize, value: T) -> Self {
        debug_assert!(index < self.size());
        let mut nodes = self.to_vec();
        let mut index = index;
        let mut mid = 0;
        while index >= nodes[mid].size() {
            index -= nodes[mid].size();
            mid += 1;
        }
        nodes[mid] = nodes[mid].set(index, value);
        Self::from_slice(&nodes)
    }

    /// Inserts a leaf before position `index`.
    ///
    /// When the digit would grow to five nodes, two of them spill as a
    /// fresh branch: the rightmost pair when `spill_back` is set (prefix
    /// digits spill toward the middle on their right), otherwise the
    /// leftmost pair.
    pub(crate) fn insert(
        &self,
        index: usize,
        value: T,
        spill_back: bool,
    ) -> (Self, Option<NodeRef<T>>) {
        debug_assert!(index < self.size());
        let mut nodes = self.to_vec();
        let mut index = index;
        let mut mid = 0;
        while index >= nodes[mid].size() {
            index -= nodes[mid].size();
            mid += 1;
        }
        let (inserted, extra) = Node::insert(&nodes[mid], index, value);
        nodes[mid] = inserted;
        if let Some(extra) = extra {
            nodes.insert(mid + 1, extra);
        }
        if nodes.len() <= 4 {
            return (Self::from_slice(&nodes), None);
        }
        if spill_back {
            (
                Self::from_slice(&nodes[..3]),
                Some(Node::branch2(nodes[3].clone(), nodes[4].clone())),
            )
        } else {
            (
                Self::from_slice(&nodes[2..]),
                Some(Node::branch2(nodes[0].clone(), nodes[1].clone())),
            )
        }
    }

    /// Removes the leaf at `index`, rebalancing with an adjacent sibling.
    pub(crate) fn erase(&self, index: usize) -> DigitErased<T> {
        debug_assert!(index < self.size());
        let mut nodes = self.to_vec();
        let mut index = index;
        let mut mid = 0;
        while index >= nodes[mid].size() {
            index -= nodes[mid].size();
            mid += 1;
        }
        match nodes[mid].erase(index) {
            Erased::Full(node) => {
                nodes[mid] = node;
                DigitErased::Digit(Self::from_slice(&nodes))
            }
            Erased::Partial(partial) => {
                if nodes.len() == 1 {
                    return DigitErased::Partial(partial);
                }
                if mid + 1 == nodes.len() {
                    let (merged, extra) = Node::merge_right(&nodes[mid - 1], partial.as_ref());
                    nodes[mid - 1] = merged;
                    match extra {
                        Some(extra) => nodes[mid] = extra,
                        None => {
                            nodes.remove(mid);
                        }
                    }
                } else {
                    let (merged, extra) = Node::merge_left(partial.as_ref(), &nodes[mid + 1]);
                    nodes[mid] = merged;
                    match extra {
                        Some(extra) => nodes[mid + 1] = extra,
                        None => {
                            nodes.remove(mid + 1);
                        }
                    }
                }
                DigitErased::Digit(Self::from_slice(&nodes))
            }
        }
    }

    /// Merges a two-levels-shallower orphan into the left edge of `node`,
    /// producing a digit over the node's children.
    pub(crate) fn merge_left(left: Option<&NodeRef<T>>, node: &NodeRef<T>) -> Self {
        let Some(left) = left else {
            return Self::from_branch(node);
        };
        debug_assert_eq!(left.depth() + 2, node.depth());
        match &**node {
            Node::Leaf(_) => unreachable!("merge_left into a leaf"),
            Node::Branch2 { first, second, .. } => {
                let (merged, extra) = Node::merge_left(Some(left), first);
                match extra {
                    None => Self::Two(merged, second.clone()),
                    Some(extra) => Self::Three(merged, extra, second.clone()),
                }
            }
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let (merged, extra) = Node::merge_left(Some(left), first);
                match extra {
                    None => Self::Three(merged, second.clone(), third.clone()),
                    Some(extra) => Self::Four(merged, extra, second.clone(), third.clone()),
                }
            }
        }
    }

    /// Merges a two-levels-shallower orphan into the right edge of `node`.
    pub(crate) fn merge_right(node: &NodeRef<T>, right: Option<&NodeRef<T>>) -> Self {
        let Some(right) = right else {
            return Self::from_branch(node);
        };
        debug_assert_eq!(node.depth(), right.depth() + 2);
        match &**node {
            Node::Leaf(_) => unreachable!("merge_right into a leaf"),
            Node::Branch2 { first, second, .. } => {
                let (merged, extra) = Node::merge_right(second, Some(right));
                match extra {
                    None => Self::Two(first.clone(), merged),
                    Some(extra) => Self::Three(first.clone(), merged, extra),
                }
            }
            Node::Branch3 {
                first,
                second,
                third,
                ..
            } => {
                let (merged, extra) = Node::merge_right(third, Some(right));
                match extra {
                    None => Self::Three(first.clone(), second.clone(), merged),
                    Some(extra) => Self::Four(first.clone(), second.clone(), merged, extra),
                }
            }
        }
    }

    /// Reverses node order and every node within.
    pub(crate) fn reverse(&self) -> Self {
        match self {
            Self::One(first) => Self::One(Node::reverse(first)),
            Self::Two(first, second) => Self::Two(Node::reverse(second), Node::reverse(first)),
            Self::Three(first, second, third) => Self::Three(
                Node::reverse(third),
                Node::reverse(second),
                Node::reverse(first),
            ),
            Self::Four(first, second, third, fourth) => Self::Four(
                Node::reverse(fourth),
                Node::reverse(third),
                Node::reverse(second),
                Node::reverse(first),
            ),
        }
    }

    /// Structure-preserving map over the leaves.
    pub(crate) fn transform<B, F>(&self, function: &mut F) -> Digit<B>
    where
        F: FnMut(&T) -> B,
    {
        match self {
            Self::One(first) => Digit::One(first.transform(function)),
            Self::Two(first, second) => {
                Digit::Two(first.transform(function), second.transform(function))
            }
            Self::Three(first, second, third) => Digit::Three(
                first.transform(function),
                second.transform(function),
                third.transform(function),
            ),
            Self::Four(first, second, third, fourth) => Digit::Four(
                first.transform(function),
                second.transform(function),
                third.transform(function),
                fourth.transform(function),
            ),
        }
    }

    /// Applies ascending `(index, value)` assignments in one pass.
    pub(crate) fn set_many<I>(
        &self,
        offset: usize,
        pairs: &mut std::iter::Peekable<I>,
    ) -> Self
    where
        I: Iterator<Item = (usize, T)>,
    {
        let mut nodes = self.to_vec();
        let mut offset = offset;
        for node in &mut nodes {
            let size = node.size();
            *node = Node::set_many(node, offset, pairs);
            offset += size;
        }
        Self::from_slice(&nodes)
    }

    /// Recomputes size and depth, asserting child-depth agreement.
    pub(crate) fn check_invariants(&self) -> (usize, usize) {
        let mut size = 0;
        let mut depth = None;
        for node in self.to_vec() {
            let (node_size, node_depth) = node.check_invariants();
            size += node_size;
            match depth {
                None => depth = Some(node_depth),
                Some(expected) => {
                    assert_eq!(expected, node_depth, "digit children depth mismatch");
                }
            }
        }
        (size, depth.unwrap_or(0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Digit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple(match self {
            Self::One(_) => "One",
            Self::Two(..) => "Two",
            Self::Three(..) => "Three",
            Self::Four(..) => "Four",
        });
        for node in self.to_vec() {
            tuple.field(&node);
        }
        tuple.finish()
    }
}
