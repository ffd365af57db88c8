//! Append-only pattern registry with batch commit.
//!
//! Registration only validates and records; the trie is rebuilt from every
//! record on [`PatternTable::commit`].

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::trie::{DomainTrie, PreparedKey, TrieOptions};
use crate::types::GroupId;

/// Registered patterns plus the tree built from them by the last commit.
#[derive(Debug, Default)]
pub struct PatternTable {
    records: Vec<(PreparedKey, GroupId)>,
    trie: DomainTrie,
    committed: usize,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose in-place tree uses the given arena limits.
    pub fn with_options(options: TrieOptions) -> Self {
        Self {
            records: Vec::new(),
            trie: DomainTrie::with_options(&options),
            committed: 0,
        }
    }

    /// Validate `pattern` and record it for the next commit.
    pub fn register(&mut self, pattern: &str, group: GroupId) -> Result<()> {
        let key = PreparedKey::from_pattern(pattern)?;
        debug!(pattern = %key, group = %group, "Registered pattern");
        self.records.push((key, group));
        Ok(())
    }

    /// Rebuild the tree from every record. On failure the previously
    /// committed tree stays in place.
    pub fn commit(&mut self) -> Result<()> {
        let records = dedup_records(&self.records);
        match self.trie.rebuild(records) {
            Ok(()) => {
                self.committed = self.records.len();
                info!(
                    patterns = self.trie.pattern_count(),
                    nodes = self.trie.live_nodes(),
                    "Committed pattern table"
                );
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Commit failed, keeping previous tree");
                Err(err)
            }
        }
    }

    /// Group of the most specific committed pattern matching `name`.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<GroupId> {
        self.trie.search(name)
    }

    /// Build a standalone tree from every record in a fresh arena.
    pub fn build_trie(&self, options: &TrieOptions) -> Result<DomainTrie> {
        let mut trie = DomainTrie::with_options(options);
        trie.rebuild(dedup_records(&self.records))?;
        Ok(trie)
    }

    /// Number of registered records (committed or not).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records registered since the last successful commit.
    pub fn pending(&self) -> usize {
        self.records.len().saturating_sub(self.committed)
    }

    /// Drop every record and the committed tree.
    pub fn clear(&mut self) {
        self.records.clear();
        self.trie.clear();
        self.committed = 0;
    }

    /// Tree built by the last successful commit.
    pub fn trie(&self) -> &DomainTrie {
        &self.trie
    }
}

/// Records in registration order, keeping only the last registration of
/// each key.
fn dedup_records(
    records: &[(PreparedKey, GroupId)],
) -> impl Iterator<Item = (&PreparedKey, GroupId)> {
    let mut last: HashMap<&PreparedKey, usize> = HashMap::with_capacity(records.len());
    for (i, (key, _)) in records.iter().enumerate() {
        last.insert(key, i);
    }
    records
        .iter()
        .enumerate()
        .filter(move |(i, (key, _))| last.get(key) == Some(i))
        .map(|(_, (key, group))| (key, *group))
}
