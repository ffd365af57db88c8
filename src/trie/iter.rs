//! Explicit-stack, pre-order traversal of a trie subtree.

use super::alphabet::ARITY;
use super::arena::NodeArena;
use super::node::NodeIndex;

/// A parent-to-child link produced by [`SubtreeWalk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub parent: NodeIndex,
    pub symbol: u8,
    pub child: NodeIndex,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIndex,
    next_symbol: u8,
}

/// Depth-first walk yielding every edge below a start node in symbol order.
///
/// The walk keeps no borrow of the arena between calls to
/// [`next_edge`](Self::next_edge), so callers may rewrite nodes in between.
/// The child of the last yielded edge is entered on the next call (if it is
/// an internal node) unless the caller [`prune`](Self::prune)s it or
/// [`redirect`](Self::redirect)s the descent elsewhere.
///
/// Shared nodes are reached once per incoming edge; callers that must visit
/// each node once keep their own visited set.
#[derive(Debug)]
pub struct SubtreeWalk {
    stack: Vec<Frame>,
    pending: Option<NodeIndex>,
}

impl SubtreeWalk {
    pub fn new(start: NodeIndex) -> Self {
        Self {
            stack: vec![Frame {
                node: start,
                next_symbol: 0,
            }],
            pending: None,
        }
    }

    pub fn next_edge(&mut self, arena: &NodeArena) -> Option<Edge> {
        if let Some(child) = self.pending.take() {
            if arena.internal(child).is_some() {
                self.stack.push(Frame {
                    node: child,
                    next_symbol: 0,
                });
            }
        }

        while let Some(frame) = self.stack.last_mut() {
            if let Some(node) = arena.internal(frame.node) {
                while (frame.next_symbol as usize) < ARITY {
                    let symbol = frame.next_symbol;
                    frame.next_symbol += 1;
                    if let Some(child) = node.child(symbol) {
                        self.pending = Some(child);
                        return Some(Edge {
                            parent: frame.node,
                            symbol,
                            child,
                        });
                    }
                }
            }
            self.stack.pop();
        }
        None
    }

    /// Do not descend into the child of the last yielded edge.
    pub fn prune(&mut self) {
        self.pending = None;
    }

    /// Descend into `node` instead of the child of the last yielded edge.
    pub fn redirect(&mut self, node: NodeIndex) {
        self.pending = Some(node);
    }

    /// Depth of the parent of the last yielded edge, the start node being 0.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }
}
