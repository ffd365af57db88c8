use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque backend-group identifier returned by a successful match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl GroupId {
    /// Raw identifier value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        GroupId(id)
    }
}

impl From<GroupId> for u64 {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed text rule before group resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Backend group name or numeric id
    pub group: String,
    /// Domain pattern (exact, `*.suffix` or with interior `*` labels)
    pub pattern: String,
    /// Line number in the original text (for error reporting)
    pub line_num: usize,
}
