//! Reference-counted domain suffix trie.
//!
//! Names are matched right to left over a 39-symbol alphabet. Wildcard
//! coverage is resolved when patterns are inserted, so lookups are a single
//! pass with no backtracking.
//!
//! ## Example
//!
//! ```
//! use sni_router_r::trie::DomainTrie;
//! use sni_router_r::GroupId;
//!
//! let mut trie = DomainTrie::new();
//! trie.insert("*.example.com", GroupId(1)).unwrap();
//! trie.insert("api.example.com", GroupId(2)).unwrap();
//!
//! assert_eq!(trie.search("www.example.com"), Some(GroupId(1)));
//! assert_eq!(trie.search("api.example.com"), Some(GroupId(2)));
//! assert_eq!(trie.search("example.com"), None);
//! ```

pub mod alphabet;
mod arena;
mod engine;
mod iter;
mod node;
mod prepare;

pub use arena::NodeArena;
pub use engine::{DomainTrie, TrieOptions, TrieStats};
pub use iter::{Edge, SubtreeWalk};
pub use node::{InternalNode, LeafNode, Node, NodeIndex, NodeKind, SkipSeq, MAX_SKIP};
pub use prepare::{PreparedKey, MAX_LABEL_LEN, MAX_NAME_LEN};
