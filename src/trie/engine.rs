//! Domain suffix trie: insertion with default-target grafting and
//! single-pass lookup.
//!
//! Keys are consumed from the right end of the name. Wildcard coverage is
//! resolved entirely at insertion time by wiring default leaves (and, for
//! interior wildcards, shared label chains) into every slot a more specific
//! pattern does not claim, so a lookup never backtracks.
//!
//! Every leaf carries a [`Rank`]: its pattern's labels compared from the
//! right, a literal beating an interior `*` beating the start of a leading
//! wildcard. Whenever two patterns compete for the same slot the higher rank
//! wins. Competing patterns match a common name, so they only tie when they
//! are identical, which makes the result independent of registration order.
//! Inserting an exact pattern again replaces its group; inserting an
//! identical wildcard again keeps the first group.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::alphabet::{
    is_label_symbol, label_symbols, Alphabet, ARITY, DOT, INVALID_SYMBOL, TERMINATOR,
};
use super::arena::NodeArena;
use super::iter::{Edge, SubtreeWalk};
use super::node::{InternalNode, Node, NodeIndex, Rank, SkipSeq, MAX_SKIP};
use super::prepare::{strip_root_dot, PreparedKey, MAX_LABEL_LEN, MAX_NAME_LEN};
use crate::error::{Result, SniError};
use crate::types::GroupId;

/// Sizing options for a trie's node arena.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieOptions {
    /// Upper bound on live nodes (`None` for unbounded)
    pub max_nodes: Option<usize>,
    /// Arena slots reserved up front
    pub initial_capacity: usize,
}

impl TrieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of live nodes.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    /// Reserve arena slots up front.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

/// Shape of the reachable tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrieStats {
    /// Distinct nodes reachable from the root
    pub reachable: usize,
    pub internal: usize,
    pub leaves: usize,
    /// Reachable nodes with more than one reference
    pub shared: usize,
    /// Nodes allocated in the arena
    pub live: usize,
}

/// Compressed, reference-counted suffix trie mapping domain patterns to
/// group ids.
#[derive(Debug, Default)]
pub struct DomainTrie {
    arena: NodeArena,
    root: Option<NodeIndex>,
    patterns: usize,
}

impl DomainTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: &TrieOptions) -> Self {
        Self {
            arena: NodeArena::with_limits(options.max_nodes, options.initial_capacity),
            root: None,
            patterns: 0,
        }
    }

    /// Insert a pattern (`a.b.com`, `*.b.com`, `a.*.b.com`).
    ///
    /// On error the trie may retain part of the pattern; use
    /// [`PatternTable`](crate::PatternTable) for all-or-nothing updates.
    pub fn insert(&mut self, pattern: &str, group: GroupId) -> Result<()> {
        let key = PreparedKey::from_pattern(pattern)?;
        self.insert_key(&key, group)
    }

    pub fn insert_key(&mut self, key: &PreparedKey, group: GroupId) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.arena.allocate(Node::internal(SkipSeq::EMPTY))?;
                self.root = Some(root);
                root
            }
        };
        Builder::new(&mut self.arena).insert(root, key, group)?;
        self.patterns += 1;
        Ok(())
    }

    /// Build a new tree from `keys` next to the current one and swap it in.
    /// On failure the partial tree is released and the current one is kept.
    pub(crate) fn rebuild<'k, I>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'k PreparedKey, GroupId)>,
    {
        let root = self.arena.allocate(Node::internal(SkipSeq::EMPTY))?;
        let mut count = 0;
        let built = {
            let mut builder = Builder::new(&mut self.arena);
            keys.into_iter().try_for_each(|(key, group)| {
                count += 1;
                builder.insert(root, key, group)
            })
        };

        if let Err(err) = built {
            self.arena.release(root);
            return Err(err);
        }

        if let Some(old) = self.root.replace(root) {
            self.arena.release(old);
        }
        self.patterns = count;
        Ok(())
    }

    /// Group id of the most specific pattern matching `name`.
    #[inline]
    pub fn search(&self, name: &str) -> Option<GroupId> {
        self.search_bytes(name.as_bytes())
    }

    /// Byte-slice form of [`search`](Self::search). Never allocates.
    ///
    /// Names with an empty label (`.b.com`, `a..b.com`) never match.
    pub fn search_bytes(&self, name: &[u8]) -> Option<GroupId> {
        let name = strip_root_dot(name);
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return None;
        }
        if name.first() == Some(&b'.')
            || name.last() == Some(&b'.')
            || name.windows(2).any(|pair| pair == b"..")
        {
            return None;
        }

        let alphabet = Alphabet::get();
        if name
            .iter()
            .any(|&b| matches!(alphabet.symbol_or_invalid(b), INVALID_SYMBOL | TERMINATOR))
        {
            return None;
        }

        // position 0 is the implicit terminator, position i > 0 is name[i - 1]
        let symbol_at = |i: usize| {
            if i == 0 {
                TERMINATOR
            } else {
                alphabet.symbol_or_invalid(name[i - 1])
            }
        };

        let mut node = self.root?;
        let mut remaining = name.len() + 1;
        loop {
            let internal = self.arena.internal(node)?;
            for expected in internal.skip.consumption() {
                if remaining == 0 {
                    return None;
                }
                remaining -= 1;
                if symbol_at(remaining) != expected {
                    return None;
                }
            }

            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let child = internal.child(symbol_at(remaining))?;
            match self.arena.get(child).as_leaf() {
                Some(leaf) => return Some(leaf.target),
                None => node = child,
            }
        }
    }

    /// Release the whole tree. Arena storage is kept for reuse.
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            self.arena.release(root);
        }
        self.patterns = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of patterns inserted since the last clear or rebuild.
    pub fn pattern_count(&self) -> usize {
        self.patterns
    }

    pub fn live_nodes(&self) -> usize {
        self.arena.live_nodes()
    }

    /// Root of the tree, for walking it with [`SubtreeWalk`].
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn stats(&self) -> TrieStats {
        let mut stats = TrieStats {
            live: self.arena.live_nodes(),
            ..TrieStats::default()
        };
        let Some(root) = self.root else {
            return stats;
        };

        let mut visited = HashSet::new();
        visited.insert(root);
        self.count_node(root, &mut stats);

        let mut walk = SubtreeWalk::new(root);
        while let Some(edge) = walk.next_edge(&self.arena) {
            if visited.insert(edge.child) {
                self.count_node(edge.child, &mut stats);
            } else {
                walk.prune();
            }
        }
        stats
    }

    fn count_node(&self, index: NodeIndex, stats: &mut TrieStats) {
        let node = self.arena.get(index);
        stats.reachable += 1;
        if node.is_leaf() {
            stats.leaves += 1;
        } else {
            stats.internal += 1;
        }
        if node.ref_count() > 1 {
            stats.shared += 1;
        }
    }

    /// Recount every reference from the reachable graph and compare it with
    /// the stored counts. Also fails if the arena holds unreachable nodes.
    pub fn verify(&self) -> Result<TrieStats> {
        let stats = self.stats();
        let mut incoming: HashMap<NodeIndex, u32> = HashMap::new();

        if let Some(root) = self.root {
            incoming.insert(root, 1);
            let mut visited = HashSet::new();
            visited.insert(root);
            let mut walk = SubtreeWalk::new(root);
            while let Some(edge) = walk.next_edge(&self.arena) {
                *incoming.entry(edge.child).or_default() += 1;
                if !visited.insert(edge.child) {
                    walk.prune();
                }
            }

            for &index in &visited {
                if let Some(node) = self.arena.internal(index) {
                    let occupied = node.children().count();
                    if occupied != node.n_children() {
                        return Err(SniError::InvariantViolation(format!(
                            "node {:?} records {} children but has {}",
                            index,
                            node.n_children(),
                            occupied
                        )));
                    }
                    if node.skip().len() > MAX_SKIP {
                        return Err(SniError::InvariantViolation(format!(
                            "node {:?} has an oversized skip",
                            index
                        )));
                    }
                }
            }
        }

        for (&index, &expected) in &incoming {
            let actual = self.arena.ref_count(index);
            if actual != expected {
                return Err(SniError::InvariantViolation(format!(
                    "node {:?} has count {} but {} references",
                    index, actual, expected
                )));
            }
        }

        if stats.reachable != stats.live {
            return Err(SniError::InvariantViolation(format!(
                "{} live nodes but only {} reachable",
                stats.live, stats.reachable
            )));
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy)]
struct LeafSpec {
    target: GroupId,
    rank: Rank,
}

/// Where a descent for a key stopped.
enum Stop {
    /// Every key symbol was consumed; positioned on `node` after its skip.
    Exhausted { node: NodeIndex },
    /// The slot for `symbol` under `parent` is empty.
    Vacant {
        parent: NodeIndex,
        symbol: u8,
        rest_from: usize,
    },
    /// The slot for `symbol` under `parent` holds `leaf`.
    Leaf {
        parent: NodeIndex,
        symbol: u8,
        leaf: NodeIndex,
        rest_from: usize,
    },
}

/// Memo key role for default propagation.
const FILL_ROLE: u8 = 0;
/// Memo key role for continuation merges below a `.` slot.
const MERGE_ROLE: u8 = u8::MAX;

/// State of one multi-node rewrite.
#[derive(Default)]
struct Pass {
    /// Shared node (and role) to the private copy made in this pass
    copies: HashMap<(NodeIndex, u8), NodeIndex>,
    /// Nodes already rewritten, or built, by this pass
    fresh: HashSet<NodeIndex>,
    /// References dropped when the pass ends
    retained: Vec<NodeIndex>,
}

/// Continuation node and the 63 label nodes that lead to it for one
/// default leaf.
struct ChainSet {
    cont: NodeIndex,
    links: Vec<NodeIndex>,
}

impl ChainSet {
    /// Node reached after `depth` symbols of the wildcard label.
    fn link(&self, depth: usize) -> NodeIndex {
        self.links[depth - 1]
    }
}

struct LabelPass<'k> {
    tail: &'k [Vec<u8>],
    spec: LeafSpec,
    chains: HashMap<Option<NodeIndex>, ChainSet>,
    pass: Pass,
}

struct Builder<'a> {
    arena: &'a mut NodeArena,
}

impl<'a> Builder<'a> {
    fn new(arena: &'a mut NodeArena) -> Self {
        Self { arena }
    }

    fn insert(&mut self, root: NodeIndex, key: &PreparedKey, target: GroupId) -> Result<()> {
        let segments = key.segments();
        let spec = LeafSpec {
            target,
            rank: key.rank(),
        };
        self.insert_segments(root, &segments, spec)
    }

    fn child(&self, node: NodeIndex, symbol: u8) -> Option<NodeIndex> {
        self.arena.internal(node).and_then(|n| n.child(symbol))
    }

    fn skip(&self, node: NodeIndex) -> SkipSeq {
        self.arena.internal(node).map(|n| n.skip).unwrap_or_default()
    }

    fn leaf_rank(&self, node: NodeIndex) -> Option<Rank> {
        self.arena.leaf(node).map(|leaf| leaf.rank)
    }

    fn alloc_internal(&mut self, skip: SkipSeq) -> Result<NodeIndex> {
        self.arena.allocate(Node::internal(skip))
    }

    fn alloc_leaf(&mut self, spec: LeafSpec) -> Result<NodeIndex> {
        self.arena.allocate(Node::leaf(spec.target, spec.rank))
    }

    /// Point `parent[symbol]` at `child`, taking a new reference.
    fn set_child(&mut self, parent: NodeIndex, symbol: u8, child: NodeIndex) {
        self.arena.retain(child);
        self.adopt_child(parent, symbol, child);
    }

    /// Point `parent[symbol]` at `child`, consuming the caller's reference.
    fn adopt_child(&mut self, parent: NodeIndex, symbol: u8, child: NodeIndex) {
        let old = self
            .arena
            .internal_mut(parent)
            .replace_child(symbol, Some(child));
        if let Some(old) = old {
            self.arena.release(old);
        }
    }

    fn clone_internal(&mut self, node: NodeIndex) -> Result<NodeIndex> {
        let mut copy = self.arena.get(node).clone();
        copy.ref_cnt = 1;
        let children = copy.as_internal().map(|n| n.children);
        let index = self.arena.allocate(copy)?;
        for child in children.into_iter().flatten().flatten() {
            self.arena.retain(child);
        }
        Ok(index)
    }

    /// Copy `child` if other paths share it, so it can be edited in place.
    fn make_exclusive(
        &mut self,
        parent: NodeIndex,
        symbol: u8,
        child: NodeIndex,
    ) -> Result<NodeIndex> {
        if self.arena.ref_count(child) <= 1 {
            return Ok(child);
        }
        let copy = self.clone_internal(child)?;
        self.adopt_child(parent, symbol, copy);
        Ok(copy)
    }

    /// Keep the first `at` skip symbols on `node` and move the rest, with the
    /// children, below a new node reached through skip symbol `at`.
    fn split_skip(&mut self, node: NodeIndex, at: usize) -> Result<()> {
        let (head, branch, tail_skip) = self.skip(node).split(at);
        let tail = self.alloc_internal(tail_skip)?;

        let (children, n_children) = self.arena.internal_mut(node).take_children();
        let moved = self.arena.internal_mut(tail);
        moved.children = children;
        moved.n_children = n_children;

        let head_node = self.arena.internal_mut(node);
        head_node.skip = head;
        head_node.replace_child(branch, Some(tail));
        Ok(())
    }

    /// Descend from `start` along `key`, splitting skips and copying shared
    /// nodes on the way.
    fn locate(&mut self, start: NodeIndex, key: &[u8]) -> Result<Stop> {
        let mut node = start;
        let mut pos = 0;
        loop {
            let skip = self.skip(node);
            let matched = skip
                .consumption()
                .zip(key[pos..].iter())
                .take_while(|&(expected, &symbol)| expected == symbol)
                .count();

            if matched < skip.len() {
                self.split_skip(node, matched)?;
                pos += matched;
                if pos == key.len() {
                    return Ok(Stop::Exhausted { node });
                }
                return Ok(Stop::Vacant {
                    parent: node,
                    symbol: key[pos],
                    rest_from: pos + 1,
                });
            }

            pos += matched;
            if pos == key.len() {
                return Ok(Stop::Exhausted { node });
            }

            let symbol = key[pos];
            match self.child(node, symbol) {
                None => {
                    return Ok(Stop::Vacant {
                        parent: node,
                        symbol,
                        rest_from: pos + 1,
                    })
                }
                Some(child) if self.arena.is_leaf(child) => {
                    return Ok(Stop::Leaf {
                        parent: node,
                        symbol,
                        leaf: child,
                        rest_from: pos + 1,
                    })
                }
                Some(child) => {
                    node = self.make_exclusive(node, symbol, child)?;
                    pos += 1;
                }
            }
        }
    }

    fn insert_segments(
        &mut self,
        start: NodeIndex,
        segments: &[Vec<u8>],
        spec: LeafSpec,
    ) -> Result<()> {
        let Some((first, tail)) = segments.split_first() else {
            return Ok(());
        };
        if tail.is_empty() {
            return self.insert_path(start, first, spec);
        }

        let anchor = match self.locate(start, first)? {
            Stop::Exhausted { node } => node,
            Stop::Vacant {
                parent,
                symbol,
                rest_from,
            } => self.build_node_chain(parent, symbol, &first[rest_from..])?,
            Stop::Leaf {
                parent,
                symbol,
                leaf,
                rest_from,
            } => {
                if self.leaf_rank(leaf) > Some(spec.rank) {
                    return Ok(());
                }
                self.arena.retain(leaf);
                let grafted = self.graft_path(parent, symbol, leaf, &first[rest_from..]);
                self.arena.release(leaf);
                grafted?
            }
        };
        self.graft_label_wildcard(anchor, tail, spec)
    }

    fn insert_path(&mut self, start: NodeIndex, key: &[u8], spec: LeafSpec) -> Result<()> {
        match self.locate(start, key)? {
            Stop::Vacant {
                parent,
                symbol,
                rest_from,
            } => self.build_leaf_chain(parent, symbol, &key[rest_from..], spec),
            Stop::Leaf {
                parent,
                symbol,
                leaf,
                rest_from,
            } => self.graft(parent, symbol, leaf, &key[rest_from..], spec),
            Stop::Exhausted { node } => self.install_default(node, spec),
        }
    }

    /// Continue `key` below an existing leaf.
    fn graft(
        &mut self,
        parent: NodeIndex,
        symbol: u8,
        leaf: NodeIndex,
        rest: &[u8],
        spec: LeafSpec,
    ) -> Result<()> {
        let existing = self.leaf_rank(leaf).unwrap_or_default();

        let Some((&last, path)) = rest.split_last() else {
            let replace = existing < spec.rank || (existing.is_exact() && spec.rank.is_exact());
            if !replace {
                return Ok(());
            }
            if self.arena.ref_count(leaf) == 1 {
                if let Some(node) = self.arena.leaf_mut(leaf) {
                    node.target = spec.target;
                    node.rank = spec.rank;
                }
            } else {
                let fresh = self.alloc_leaf(spec)?;
                self.adopt_child(parent, symbol, fresh);
            }
            return Ok(());
        };

        if existing > spec.rank {
            return Ok(());
        }

        self.arena.retain(leaf);
        let result = self.graft_path(parent, symbol, leaf, path).and_then(|node| {
            let fresh = self.alloc_leaf(spec)?;
            self.adopt_child(node, last, fresh);
            Ok(())
        });
        self.arena.release(leaf);
        result
    }

    /// Replace `parent[symbol]` with a run of single-symbol nodes spelling
    /// `path`, each defaulting every slot to `default`. Returns the last node.
    fn graft_path(
        &mut self,
        parent: NodeIndex,
        symbol: u8,
        default: NodeIndex,
        path: &[u8],
    ) -> Result<NodeIndex> {
        let mut node = self.defaulted_node(default)?;
        self.adopt_child(parent, symbol, node);
        for &next_symbol in path {
            let next = self.defaulted_node(default)?;
            self.adopt_child(node, next_symbol, next);
            node = next;
        }
        Ok(node)
    }

    fn defaulted_node(&mut self, default: NodeIndex) -> Result<NodeIndex> {
        let mut node = InternalNode::new(SkipSeq::EMPTY);
        node.children = [Some(default); ARITY];
        node.n_children = ARITY as u8;
        let index = self.arena.allocate(Node::from(node))?;
        for _ in 0..ARITY {
            self.arena.retain(default);
        }
        Ok(index)
    }

    /// Skip-compressed path for `rest` ending in a new leaf.
    fn build_leaf_chain(
        &mut self,
        parent: NodeIndex,
        symbol: u8,
        rest: &[u8],
        spec: LeafSpec,
    ) -> Result<()> {
        let (mut parent, mut symbol, mut rest) = (parent, symbol, rest);
        while !rest.is_empty() {
            let n = (rest.len() - 1).min(MAX_SKIP);
            let node = self.alloc_internal(SkipSeq::from_consumed(&rest[..n]))?;
            self.adopt_child(parent, symbol, node);
            parent = node;
            symbol = rest[n];
            rest = &rest[n + 1..];
        }
        let leaf = self.alloc_leaf(spec)?;
        self.adopt_child(parent, symbol, leaf);
        Ok(())
    }

    /// Skip-compressed path for `rest` ending on an internal node, which is
    /// returned positioned after its skip.
    fn build_node_chain(
        &mut self,
        parent: NodeIndex,
        symbol: u8,
        rest: &[u8],
    ) -> Result<NodeIndex> {
        let (mut parent, mut symbol, mut rest) = (parent, symbol, rest);
        loop {
            let n = rest.len().min(MAX_SKIP);
            let node = self.alloc_internal(SkipSeq::from_consumed(&rest[..n]))?;
            self.adopt_child(parent, symbol, node);
            if rest.len() <= MAX_SKIP {
                return Ok(node);
            }
            parent = node;
            symbol = rest[n];
            rest = &rest[n + 1..];
        }
    }

    fn begin_pass(&mut self) -> Pass {
        self.arena.begin_defer();
        Pass::default()
    }

    fn finish_pass(&mut self, pass: Pass) {
        for index in pass.retained {
            self.arena.release(index);
        }
        self.arena.end_defer();
    }

    /// Make `edge.child` private to this pass. Returns `None` when the child
    /// was already handled (its slot is pointed at the existing copy).
    fn claim(&mut self, edge: Edge, role: u8, pass: &mut Pass) -> Result<Option<NodeIndex>> {
        let Edge {
            parent,
            symbol,
            child,
        } = edge;
        if pass.fresh.contains(&child) {
            return Ok(None);
        }
        if let Some(&copy) = pass.copies.get(&(child, role)) {
            self.set_child(parent, symbol, copy);
            return Ok(None);
        }
        if self.arena.ref_count(child) == 1 {
            pass.fresh.insert(child);
            return Ok(Some(child));
        }

        let copy = self.clone_internal(child)?;
        self.arena.retain(child);
        pass.retained.push(child);
        self.adopt_child(parent, symbol, copy);
        pass.copies.insert((child, role), copy);
        pass.fresh.insert(copy);
        Ok(Some(copy))
    }

    /// Turn `node`'s skip into single-symbol nodes so every boundary can hold
    /// its own transitions. Returns the node now holding the old children.
    fn expand_skip(
        &mut self,
        node: NodeIndex,
        default: Option<(NodeIndex, Rank)>,
    ) -> Result<NodeIndex> {
        let skip = self.skip(node);
        if skip.is_empty() {
            return Ok(node);
        }
        let consumed: Vec<u8> = skip.consumption().collect();

        let mut run = Vec::with_capacity(consumed.len());
        for _ in 0..consumed.len() {
            match self.alloc_internal(SkipSeq::EMPTY) {
                Ok(index) => run.push(index),
                Err(err) => {
                    for index in run {
                        self.arena.release(index);
                    }
                    return Err(err);
                }
            }
        }

        let (children, n_children) = self.arena.internal_mut(node).take_children();
        self.arena.internal_mut(node).skip = SkipSeq::EMPTY;

        let mut prev = node;
        for (&symbol, &next) in consumed.iter().zip(&run) {
            self.arena.internal_mut(prev).replace_child(symbol, Some(next));
            if let Some((leaf, rank)) = default {
                self.fill_defaults(prev, leaf, rank);
            }
            prev = next;
        }

        let last = self.arena.internal_mut(prev);
        last.children = children;
        last.n_children = n_children;
        Ok(prev)
    }

    /// Point empty slots, and slots holding lower-ranked leaves, at `leaf`.
    fn fill_defaults(&mut self, node: NodeIndex, leaf: NodeIndex, rank: Rank) {
        for symbol in 0..ARITY as u8 {
            let replace = match self.child(node, symbol) {
                None => true,
                Some(child) => self.leaf_rank(child).is_some_and(|r| r < rank),
            };
            if replace {
                self.set_child(node, symbol, leaf);
            }
        }
    }

    fn install_default(&mut self, node: NodeIndex, spec: LeafSpec) -> Result<()> {
        let leaf = self.alloc_leaf(spec)?;
        let result = self.fill_subtree(node, leaf);
        self.arena.release(leaf);
        result
    }

    /// Install `leaf` as the default target of `node` and everything below.
    fn fill_subtree(&mut self, node: NodeIndex, leaf: NodeIndex) -> Result<()> {
        let mut pass = self.begin_pass();
        let result = self.fill_walk(node, leaf, &mut pass);
        self.finish_pass(pass);
        result
    }

    fn fill_walk(&mut self, node: NodeIndex, leaf: NodeIndex, pass: &mut Pass) -> Result<()> {
        let rank = self.leaf_rank(leaf).unwrap_or_default();
        self.fill_defaults(node, leaf, rank);

        let mut walk = SubtreeWalk::new(node);
        while let Some(edge) = walk.next_edge(self.arena) {
            if self.arena.is_leaf(edge.child) {
                walk.prune();
                continue;
            }
            match self.claim(edge, FILL_ROLE, pass)? {
                None => walk.prune(),
                Some(child) => {
                    let last = self.expand_skip(child, Some((leaf, rank)))?;
                    self.fill_defaults(last, leaf, rank);
                    walk.redirect(last);
                }
            }
        }
        Ok(())
    }

    /// Make any single label after `anchor` lead on to `tail`.
    fn graft_label_wildcard(
        &mut self,
        anchor: NodeIndex,
        tail: &[Vec<u8>],
        spec: LeafSpec,
    ) -> Result<()> {
        let mut labels = LabelPass {
            tail,
            spec,
            chains: HashMap::new(),
            pass: self.begin_pass(),
        };
        let result = self.label_walk(anchor, &mut labels);
        self.finish_pass(labels.pass);
        result
    }

    fn label_walk(&mut self, anchor: NodeIndex, labels: &mut LabelPass<'_>) -> Result<()> {
        labels.pass.fresh.insert(anchor);
        self.label_fill(anchor, 0, labels)?;

        let mut walk = SubtreeWalk::new(anchor);
        while let Some(edge) = walk.next_edge(self.arena) {
            let depth = walk.depth() + 1;
            if !is_label_symbol(edge.symbol)
                || depth > MAX_LABEL_LEN
                || self.arena.is_leaf(edge.child)
            {
                walk.prune();
                continue;
            }
            match self.claim(edge, depth as u8, &mut labels.pass)? {
                None => walk.prune(),
                Some(node) => {
                    self.expand_skip(node, None)?;
                    self.label_fill(node, depth, labels)?;
                    walk.redirect(node);
                }
            }
        }
        Ok(())
    }

    /// Wire the label chain and continuation into a node `depth` symbols
    /// into the wildcard label.
    fn label_fill(
        &mut self,
        node: NodeIndex,
        depth: usize,
        labels: &mut LabelPass<'_>,
    ) -> Result<()> {
        if depth < MAX_LABEL_LEN {
            for symbol in label_symbols() {
                let default = match self.child(node, symbol) {
                    None => None,
                    Some(child) if self.arena.is_leaf(child) => Some(child),
                    Some(_) => continue,
                };
                let link = self.chain_set(labels, default)?.link(depth + 1);
                self.set_child(node, symbol, link);
            }
        }

        if depth == 0 {
            return Ok(());
        }

        match self.child(node, DOT) {
            None => {
                let cont = self.chain_set(labels, None)?.cont;
                self.set_child(node, DOT, cont);
            }
            Some(child) => match self.leaf_rank(child) {
                // a more specific pattern already owns names through here
                Some(rank) if rank > labels.spec.rank => {}
                Some(_) => {
                    let cont = self.chain_set(labels, Some(child))?.cont;
                    self.set_child(node, DOT, cont);
                }
                None => {
                    let edge = Edge {
                        parent: node,
                        symbol: DOT,
                        child,
                    };
                    if let Some(target) = self.claim(edge, MERGE_ROLE, &mut labels.pass)? {
                        self.insert_segments(target, labels.tail, labels.spec)?;
                    }
                }
            },
        }
        Ok(())
    }

    fn chain_set<'l>(
        &mut self,
        labels: &'l mut LabelPass<'_>,
        default: Option<NodeIndex>,
    ) -> Result<&'l ChainSet> {
        use std::collections::hash_map::Entry;

        match labels.chains.entry(default) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let set =
                    self.build_chain_set(labels.tail, labels.spec, default, &mut labels.pass)?;
                Ok(entry.insert(set))
            }
        }
    }

    fn build_chain_set(
        &mut self,
        tail: &[Vec<u8>],
        spec: LeafSpec,
        default: Option<NodeIndex>,
        pass: &mut Pass,
    ) -> Result<ChainSet> {
        let cont = self.alloc_internal(SkipSeq::EMPTY)?;
        pass.retained.push(cont);
        self.insert_segments(cont, tail, spec)?;
        if let Some(leaf) = default {
            self.fill_subtree(cont, leaf)?;
        }

        let mut links = Vec::with_capacity(MAX_LABEL_LEN);
        let mut next = default;
        for _ in 0..MAX_LABEL_LEN {
            let link = self.alloc_internal(SkipSeq::EMPTY)?;
            pass.retained.push(link);
            pass.fresh.insert(link);
            if let Some(next) = next {
                for symbol in label_symbols() {
                    self.set_child(link, symbol, next);
                }
            }
            self.set_child(link, DOT, cont);
            if let Some(leaf) = default {
                self.set_child(link, TERMINATOR, leaf);
            }
            links.push(link);
            next = Some(link);
        }
        links.reverse();

        Ok(ChainSet { cont, links })
    }
}
