//! Slot arena owning every trie node.
//!
//! Nodes are addressed by [`NodeIndex`] and reference counted explicitly.
//! Freed slots are threaded onto a free list and recycled; storage never
//! shrinks. While a rewrite pass is open (see [`NodeArena::begin_defer`]),
//! freed slots are parked instead of recycled so that indices remembered by
//! the pass cannot be handed out again before it ends.

use super::iter::SubtreeWalk;
use super::node::{InternalNode, LeafNode, Node, NodeIndex, NodeKind};
use crate::error::{Result, SniError};

#[derive(Debug)]
enum Slot {
    Occupied(Node),
    Vacant { next_free: Option<NodeIndex> },
}

/// Node storage with a free list and an optional node limit.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free_head: Option<NodeIndex>,
    live: usize,
    max_nodes: Option<usize>,
    defer_depth: u32,
    deferred: Vec<NodeIndex>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena that preallocates `initial_capacity` slots and refuses to hold
    /// more than `max_nodes` live nodes.
    pub fn with_limits(max_nodes: Option<usize>, initial_capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(initial_capacity),
            max_nodes,
            ..Self::default()
        }
    }

    /// Store `node` (its count starts at 1) and return its index.
    pub fn allocate(&mut self, node: Node) -> Result<NodeIndex> {
        if let Some(max) = self.max_nodes {
            if self.live >= max {
                return Err(SniError::ArenaExhausted { capacity: max });
            }
        }

        let index = match self.free_head {
            Some(index) => {
                let next = match self.slots[index.slot()] {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(_) => unreachable!("free list points at a live node"),
                };
                self.free_head = next;
                self.slots[index.slot()] = Slot::Occupied(node);
                index
            }
            None => {
                let index = NodeIndex::from_slot(self.slots.len()).ok_or(
                    SniError::ArenaExhausted {
                        capacity: self.slots.len(),
                    },
                )?;
                self.slots.push(Slot::Occupied(node));
                index
            }
        };

        self.live += 1;
        Ok(index)
    }

    /// # Panics
    ///
    /// Panics if `index` refers to a freed slot.
    #[inline(always)]
    pub fn get(&self, index: NodeIndex) -> &Node {
        match &self.slots[index.slot()] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => panic!("access to freed node {:?}", index),
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, index: NodeIndex) -> &mut Node {
        match &mut self.slots[index.slot()] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => panic!("access to freed node {:?}", index),
        }
    }

    #[inline(always)]
    pub fn internal(&self, index: NodeIndex) -> Option<&InternalNode> {
        self.get(index).as_internal()
    }

    /// # Panics
    ///
    /// Panics if `index` is a leaf.
    pub fn internal_mut(&mut self, index: NodeIndex) -> &mut InternalNode {
        match &mut self.get_mut(index).kind {
            NodeKind::Internal(node) => node,
            NodeKind::Leaf(_) => panic!("node {:?} is a leaf", index),
        }
    }

    pub fn leaf(&self, index: NodeIndex) -> Option<&LeafNode> {
        self.get(index).as_leaf()
    }

    pub fn leaf_mut(&mut self, index: NodeIndex) -> Option<&mut LeafNode> {
        match &mut self.get_mut(index).kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn is_leaf(&self, index: NodeIndex) -> bool {
        self.get(index).is_leaf()
    }

    pub fn ref_count(&self, index: NodeIndex) -> u32 {
        self.get(index).ref_cnt
    }

    #[inline]
    pub fn retain(&mut self, index: NodeIndex) {
        self.get_mut(index).ref_cnt += 1;
    }

    /// Drop one reference to `index`. When the count reaches zero the node is
    /// freed along with every descendant that loses its last reference.
    pub fn release(&mut self, index: NodeIndex) {
        if !self.decrement(index) {
            return;
        }

        let mut doomed = vec![index];
        let mut walk = SubtreeWalk::new(index);
        while let Some(edge) = walk.next_edge(self) {
            if self.decrement(edge.child) {
                doomed.push(edge.child);
            } else {
                walk.prune();
            }
        }

        for index in doomed {
            self.free(index);
        }
    }

    fn decrement(&mut self, index: NodeIndex) -> bool {
        let node = self.get_mut(index);
        debug_assert!(node.ref_cnt > 0, "reference count underflow on {:?}", index);
        node.ref_cnt = node.ref_cnt.saturating_sub(1);
        node.ref_cnt == 0
    }

    fn free(&mut self, index: NodeIndex) {
        self.live -= 1;
        if self.defer_depth > 0 {
            self.slots[index.slot()] = Slot::Vacant { next_free: None };
            self.deferred.push(index);
        } else {
            self.push_free(index);
        }
    }

    fn push_free(&mut self, index: NodeIndex) {
        self.slots[index.slot()] = Slot::Vacant {
            next_free: self.free_head,
        };
        self.free_head = Some(index);
    }

    /// Open a pass: slots freed from now on are not recycled until the
    /// matching [`end_defer`](Self::end_defer). Passes nest.
    pub fn begin_defer(&mut self) {
        self.defer_depth += 1;
    }

    pub fn end_defer(&mut self) {
        debug_assert!(self.defer_depth > 0);
        self.defer_depth = self.defer_depth.saturating_sub(1);
        if self.defer_depth == 0 {
            for index in std::mem::take(&mut self.deferred) {
                self.push_free(index);
            }
        }
    }

    /// Number of nodes currently allocated.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Number of slots ever created (live or free).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn max_nodes(&self) -> Option<usize> {
        self.max_nodes
    }

    /// Indices of every live node.
    pub fn live_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, s)| match s {
            Slot::Occupied(_) => NodeIndex::from_slot(slot),
            Slot::Vacant { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::node::{Rank, SkipSeq};
    use crate::types::GroupId;

    fn leaf(arena: &mut NodeArena, id: u64) -> NodeIndex {
        arena.allocate(Node::leaf(GroupId(id), Rank::default())).unwrap()
    }

    fn attach(arena: &mut NodeArena, parent: NodeIndex, symbol: u8, child: NodeIndex) {
        arena.internal_mut(parent).replace_child(symbol, Some(child));
    }

    #[test]
    fn test_allocate_and_free_recycles_slots() {
        let mut arena = NodeArena::new();
        let a = leaf(&mut arena, 1);
        let b = leaf(&mut arena, 2);
        assert_eq!(arena.live_nodes(), 2);

        arena.release(a);
        assert_eq!(arena.live_nodes(), 1);

        let c = leaf(&mut arena, 3);
        assert_eq!(c, a, "freed slot should be reused");
        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.leaf(b).unwrap().target, GroupId(2));
    }

    #[test]
    fn test_max_nodes() {
        let mut arena = NodeArena::with_limits(Some(2), 0);
        leaf(&mut arena, 1);
        leaf(&mut arena, 2);
        let err = arena.allocate(Node::leaf(GroupId(3), Rank::default())).unwrap_err();
        assert!(matches!(err, SniError::ArenaExhausted { capacity: 2 }));
    }

    #[test]
    fn test_release_frees_subtree() {
        let mut arena = NodeArena::new();
        let root = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let mid = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let l1 = leaf(&mut arena, 1);
        let l2 = leaf(&mut arena, 2);
        attach(&mut arena, root, 1, mid);
        attach(&mut arena, mid, 2, l1);
        attach(&mut arena, mid, 3, l2);
        assert_eq!(arena.live_nodes(), 4);

        arena.release(root);
        assert_eq!(arena.live_nodes(), 0);
    }

    #[test]
    fn test_release_keeps_shared_children() {
        let mut arena = NodeArena::new();
        let a = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let b = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let shared = leaf(&mut arena, 7);
        attach(&mut arena, a, 1, shared);
        attach(&mut arena, b, 1, shared);
        arena.retain(shared);

        arena.release(a);
        assert_eq!(arena.ref_count(shared), 1);
        assert_eq!(arena.live_nodes(), 2);

        arena.release(b);
        assert_eq!(arena.live_nodes(), 0);
    }

    #[test]
    fn test_release_shared_node_reached_twice() {
        let mut arena = NodeArena::new();
        let root = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let shared = arena.allocate(Node::internal(SkipSeq::EMPTY)).unwrap();
        let l = leaf(&mut arena, 1);
        attach(&mut arena, shared, 0, l);
        attach(&mut arena, root, 1, shared);
        attach(&mut arena, root, 2, shared);
        arena.retain(shared);

        arena.release(root);
        assert_eq!(arena.live_nodes(), 0);
    }

    #[test]
    fn test_deferred_slots_not_reused() {
        let mut arena = NodeArena::new();
        let a = leaf(&mut arena, 1);

        arena.begin_defer();
        arena.release(a);
        let b = leaf(&mut arena, 2);
        assert_ne!(a, b);
        arena.end_defer();

        let c = leaf(&mut arena, 3);
        assert_eq!(c, a);
    }

    #[test]
    fn test_live_indices() {
        let mut arena = NodeArena::new();
        let a = leaf(&mut arena, 1);
        let b = leaf(&mut arena, 2);
        arena.release(a);
        assert_eq!(arena.live_indices().collect::<Vec<_>>(), vec![b]);
    }
}
