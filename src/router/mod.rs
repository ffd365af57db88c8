//! Router module.
//!
//! Maps client-presented hostnames (TLS SNI) to backend groups. Patterns are
//! staged in a [`PatternTable`]; each commit builds a fresh trie and publishes
//! it atomically, so lookups always see a complete tree.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SniError};
use crate::parser::{parse_routes, parse_routes_from_file};
use crate::table::PatternTable;
use crate::trie::{DomainTrie, TrieOptions};
use crate::types::{GroupId, RouteRule};

/// Router builder options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Arena limits for every published trie
    pub trie: TrieOptions,
}

impl RouterOptions {
    /// Create new router options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trie arena options.
    pub fn with_trie_options(mut self, trie: TrieOptions) -> Self {
        self.trie = trie;
        self
    }

    /// Parse options from JSON, e.g. `{"trie": {"max_nodes": 100000}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SniError::ConfigError(format!("Invalid router options: {}", e)))
    }
}

/// Outcome of a successful [`SniRouter::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    /// Distinct patterns in the published tree
    pub patterns: usize,
    /// Live nodes in the published tree
    pub nodes: usize,
    pub elapsed: Duration,
}

/// Thread-safe SNI router.
///
/// Registration and commit are serialized; lookups only hold the read lock
/// long enough to walk the published tree.
pub struct SniRouter {
    table: Mutex<PatternTable>,
    published: RwLock<Arc<DomainTrie>>,
    options: RouterOptions,
}

impl SniRouter {
    /// Create an empty router. Nothing matches until the first commit.
    pub fn new(options: RouterOptions) -> Self {
        Self {
            table: Mutex::new(PatternTable::new()),
            published: RwLock::new(Arc::new(DomainTrie::new())),
            options,
        }
    }

    /// Create a router from rule text and commit it.
    ///
    /// Group names are looked up case-insensitively in `groups`; a name that
    /// is not in the map must be a decimal group id.
    pub fn from_rules(
        rules: &str,
        groups: &HashMap<String, GroupId>,
        options: RouterOptions,
    ) -> Result<Self> {
        let parsed = parse_routes(rules)?;
        Self::from_parsed(&parsed, groups, options)
    }

    /// Create a router from a rule file and commit it.
    pub fn from_file(
        path: impl AsRef<Path>,
        groups: &HashMap<String, GroupId>,
        options: RouterOptions,
    ) -> Result<Self> {
        let parsed = parse_routes_from_file(path)?;
        Self::from_parsed(&parsed, groups, options)
    }

    fn from_parsed(
        rules: &[RouteRule],
        groups: &HashMap<String, GroupId>,
        options: RouterOptions,
    ) -> Result<Self> {
        let groups = groups_to_map(groups);
        let router = Self::new(options);
        {
            let mut table = router.table.lock();
            for rule in rules {
                let group = resolve_group(&rule.group, &groups).map_err(|e| {
                    SniError::ParseErrorAtLine {
                        line: rule.line_num,
                        message: e.to_string(),
                    }
                })?;
                table
                    .register(&rule.pattern, group)
                    .map_err(|e| SniError::ParseErrorAtLine {
                        line: rule.line_num,
                        message: e.to_string(),
                    })?;
            }
        }
        router.commit()?;
        Ok(router)
    }

    /// Stage a pattern for the next commit.
    pub fn register(&self, pattern: &str, group: GroupId) -> Result<()> {
        self.table.lock().register(pattern, group)
    }

    /// Build a new trie from every registered pattern and publish it.
    /// On failure the current tree stays published.
    pub fn commit(&self) -> Result<CommitStats> {
        let started = Instant::now();
        let trie = {
            let table = self.table.lock();
            debug!(records = table.len(), "Building trie");
            table.build_trie(&self.options.trie).map_err(|e| {
                warn!(error = %e, "Trie build failed, keeping published tree");
                e
            })?
        };

        let stats = CommitStats {
            patterns: trie.pattern_count(),
            nodes: trie.live_nodes(),
            elapsed: started.elapsed(),
        };
        *self.published.write() = Arc::new(trie);

        info!(
            patterns = stats.patterns,
            nodes = stats.nodes,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "Published routing trie"
        );
        Ok(stats)
    }

    /// Backend group for `name`, or `None` if no committed pattern matches.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<GroupId> {
        self.published.read().search(name)
    }

    /// Currently published tree.
    pub fn snapshot(&self) -> Arc<DomainTrie> {
        self.published.read().clone()
    }

    /// Number of patterns in the published tree.
    pub fn pattern_count(&self) -> usize {
        self.published.read().pattern_count()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }
}

impl Default for SniRouter {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

/// Lowercase group names for case-insensitive lookups.
fn groups_to_map(groups: &HashMap<String, GroupId>) -> HashMap<String, GroupId> {
    groups
        .iter()
        .map(|(name, id)| (name.to_lowercase(), *id))
        .collect()
}

/// Resolve a rule's group through the name map, falling back to a decimal id.
fn resolve_group(name: &str, groups: &HashMap<String, GroupId>) -> Result<GroupId> {
    if let Some(id) = groups.get(&name.to_lowercase()) {
        return Ok(*id);
    }
    name.parse::<u64>()
        .map(GroupId)
        .map_err(|_| SniError::UnknownGroup(name.to_string()))
}
