//! Node layout for the domain suffix trie.
//!
//! Internal nodes carry one child link per alphabet symbol plus an inline
//! skip sequence of up to [`MAX_SKIP`] symbols that must match before the
//! node's transition is taken. Leaves carry the group id of a pattern.

use std::num::NonZeroU32;

use super::alphabet::ARITY;
use crate::types::GroupId;

/// Maximum number of symbols held inline by a skip sequence.
pub const MAX_SKIP: usize = 6;

/// Label positions described by a [`Rank`]. A 256-byte name has at most
/// 128 labels.
pub const RANK_LABELS: usize = 128;

/// Index of a node in its arena.
///
/// Stores `slot + 1` so that `Option<NodeIndex>` stays four bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(NonZeroU32);

impl NodeIndex {
    pub(crate) fn from_slot(slot: usize) -> Option<Self> {
        u32::try_from(slot + 1).ok().and_then(NonZeroU32::new).map(NodeIndex)
    }

    #[inline(always)]
    pub(crate) fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Compressed run of symbols matched before a node's transition.
///
/// Symbols are stored in string order and consumed from the back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipSeq {
    len: u8,
    symbols: [u8; MAX_SKIP],
}

impl SkipSeq {
    pub const EMPTY: SkipSeq = SkipSeq {
        len: 0,
        symbols: [0; MAX_SKIP],
    };

    /// Build from symbols given in consumption order.
    pub fn from_consumed(consumed: &[u8]) -> Self {
        debug_assert!(consumed.len() <= MAX_SKIP);
        let len = consumed.len().min(MAX_SKIP);
        let mut symbols = [0u8; MAX_SKIP];
        for (i, &sym) in consumed[..len].iter().enumerate() {
            symbols[len - 1 - i] = sym;
        }
        Self {
            len: len as u8,
            symbols,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Symbols in string order.
    pub fn as_slice(&self) -> &[u8] {
        &self.symbols[..self.len()]
    }

    /// Symbols in the order a lookup consumes them.
    #[inline]
    pub fn consumption(&self) -> impl Iterator<Item = u8> + '_ {
        self.as_slice().iter().rev().copied()
    }

    /// Split at consumption position `at` into the head matched before it,
    /// the symbol at `at` and the tail after it.
    pub fn split(&self, at: usize) -> (SkipSeq, u8, SkipSeq) {
        debug_assert!(at < self.len());
        let consumed: Vec<u8> = self.consumption().collect();
        (
            SkipSeq::from_consumed(&consumed[..at]),
            consumed[at],
            SkipSeq::from_consumed(&consumed[at + 1..]),
        )
    }
}

/// Internal (branching) node.
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub(crate) children: [Option<NodeIndex>; ARITY],
    pub(crate) n_children: u8,
    pub(crate) skip: SkipSeq,
}

impl InternalNode {
    pub fn new(skip: SkipSeq) -> Self {
        Self {
            children: [None; ARITY],
            n_children: 0,
            skip,
        }
    }

    /// Child reached through `symbol`.
    #[inline(always)]
    pub fn child(&self, symbol: u8) -> Option<NodeIndex> {
        self.children.get(symbol as usize).copied().flatten()
    }

    /// Occupied slots in symbol order.
    pub fn children(&self) -> impl Iterator<Item = (u8, NodeIndex)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(sym, child)| child.map(|c| (sym as u8, c)))
    }

    pub fn n_children(&self) -> usize {
        self.n_children as usize
    }

    pub fn skip(&self) -> &SkipSeq {
        &self.skip
    }

    /// Store `child` in the slot for `symbol` and return the previous
    /// occupant. Reference counts are the caller's business.
    pub(crate) fn replace_child(
        &mut self,
        symbol: u8,
        child: Option<NodeIndex>,
    ) -> Option<NodeIndex> {
        let old = std::mem::replace(&mut self.children[symbol as usize], child);
        match (old.is_some(), child.is_some()) {
            (false, true) => self.n_children += 1,
            (true, false) => self.n_children -= 1,
            _ => {}
        }
        old
    }

    /// Move every child out, leaving the node empty.
    pub(crate) fn take_children(&mut self) -> ([Option<NodeIndex>; ARITY], u8) {
        let n = std::mem::take(&mut self.n_children);
        (std::mem::replace(&mut self.children, [None; ARITY]), n)
    }
}

/// Specificity of a pattern, compared label by label from the right.
///
/// Every label position holds a two-bit code: a literal label beats an
/// interior `*`, which beats the position where a leading wildcard starts
/// or the pattern ends. Position 0 (the rightmost label) is the most
/// significant, so the derived ordering is the per-label comparison. Two
/// patterns matching the same name only compare equal when they are
/// identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank {
    labels: [u64; 4],
    /// No wildcard at all; re-inserting the pattern replaces its group
    exact: bool,
}

impl Rank {
    /// Code of an open position: a leading wildcard or the end of the pattern.
    pub const OPEN: u8 = 0;
    /// Code of an interior `*` label.
    pub const WILDCARD: u8 = 1;
    /// Code of a literal label.
    pub const LITERAL: u8 = 2;

    /// Build from label codes, rightmost label first.
    pub fn from_codes(codes: impl IntoIterator<Item = u8>, exact: bool) -> Self {
        let mut labels = [0u64; 4];
        for (pos, code) in codes.into_iter().take(RANK_LABELS).enumerate() {
            labels[pos / 32] |= u64::from(code & 0b11) << (62 - 2 * (pos % 32));
        }
        Self { labels, exact }
    }

    /// Code at label position `pos`, counted from the right.
    pub fn code(&self, pos: usize) -> u8 {
        if pos >= RANK_LABELS {
            return Self::OPEN;
        }
        ((self.labels[pos / 32] >> (62 - 2 * (pos % 32))) & 0b11) as u8
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }
}

/// Terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    pub target: GroupId,
    /// Precedence against other leaves met on the same path.
    pub rank: Rank,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Internal(InternalNode),
    Leaf(LeafNode),
}

/// Arena slot payload: a node and the number of references to it.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) ref_cnt: u32,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn internal(skip: SkipSeq) -> Self {
        Self {
            ref_cnt: 1,
            kind: NodeKind::Internal(InternalNode::new(skip)),
        }
    }

    pub fn leaf(target: GroupId, rank: Rank) -> Self {
        Self {
            ref_cnt: 1,
            kind: NodeKind::Leaf(LeafNode { target, rank }),
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_cnt
    }

    #[inline(always)]
    pub fn as_internal(&self) -> Option<&InternalNode> {
        match &self.kind {
            NodeKind::Internal(node) => Some(node),
            NodeKind::Leaf(_) => None,
        }
    }

    #[inline(always)]
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }
}

impl From<InternalNode> for Node {
    fn from(node: InternalNode) -> Self {
        Self {
            ref_cnt: 1,
            kind: NodeKind::Internal(node),
        }
    }
}
