//! SNI Router - A domain suffix trie for routing TLS hostnames to backend groups
//!
//! This library provides:
//! - Exact domain patterns (`api.example.com`)
//! - Leading wildcards (`*.example.com`, one or more extra labels)
//! - Interior wildcards (`1547.*.sc.example.com`, exactly one label)
//! - Single-pass, allocation-free lookups
//! - Batch commit with atomic publication
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use sni_router_r::{GroupId, RouterOptions, SniRouter};
//!
//! let rules = "
//! web(*.example.com)      # every subdomain
//! api(api.example.com)    # more specific, wins over the wildcard
//! 200(1547.*.sc.ciscoplus.com)
//! ";
//!
//! let mut groups = HashMap::new();
//! groups.insert("web".to_string(), GroupId(1));
//! groups.insert("api".to_string(), GroupId(2));
//!
//! let router = SniRouter::from_rules(rules, &groups, RouterOptions::new()).unwrap();
//!
//! assert_eq!(router.lookup("www.example.com"), Some(GroupId(1)));
//! assert_eq!(router.lookup("api.example.com"), Some(GroupId(2)));
//! assert_eq!(router.lookup("1547.lax.sc.ciscoplus.com"), Some(GroupId(200)));
//! assert_eq!(router.lookup("example.com"), None);
//! ```
//!
//! # Rule Syntax
//!
//! ```text
//! group(pattern)
//! ```
//!
//! | Pattern | Example | Matches |
//! |---------|---------|---------|
//! | Exact | `a.b.com` | `a.b.com` only |
//! | Wildcard | `*.b.com` | `x.b.com`, `x.y.b.com`, not `b.com` |
//! | Interior | `a.*.com` | `a.x.com`, not `a.x.y.com` |
//! | Catch-all | `*` | everything |
//!
//! `group` is a name from the caller's group map or a decimal id. `#` starts
//! a comment and `file: <path>` includes another rule file.

pub mod error;
pub mod parser;
pub mod router;
pub mod table;
pub mod trie;
pub mod types;

// Re-export commonly used items
pub use error::{ErrorKind, Result, SniError};
pub use parser::{parse_routes, parse_routes_from_file};
pub use router::{CommitStats, RouterOptions, SniRouter};
pub use table::PatternTable;
pub use trie::{DomainTrie, PreparedKey, TrieOptions, TrieStats};
pub use types::{GroupId, RouteRule};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_full_workflow() {
        let rules_text = r#"
# Default web tier
web(*.example.com)

# Dedicated API tier
api(api.example.com)
api(*.api.example.com)

# Regional collectors
200(1547.*.sc.ciscoplus.com)
300(usw1.*.sc.*.cisco.com)
"#;

        let rules = parse_routes(rules_text).unwrap();
        assert_eq!(rules.len(), 5);

        let mut groups = HashMap::new();
        groups.insert("web".to_string(), GroupId(1));
        groups.insert("api".to_string(), GroupId(2));

        let router = SniRouter::from_rules(rules_text, &groups, RouterOptions::new()).unwrap();
        assert_eq!(router.pattern_count(), 5);

        // Wildcard -> web
        assert_eq!(router.lookup("www.example.com"), Some(GroupId(1)));
        assert_eq!(router.lookup("a.b.example.com"), Some(GroupId(1)));

        // Exact and deeper wildcard -> api
        assert_eq!(router.lookup("api.example.com"), Some(GroupId(2)));
        assert_eq!(router.lookup("v1.api.example.com"), Some(GroupId(2)));

        // Interior wildcards
        assert_eq!(router.lookup("1547.iad.sc.ciscoplus.com"), Some(GroupId(200)));
        assert_eq!(router.lookup("usw1.lax.sc.zproxy.cisco.com"), Some(GroupId(300)));

        // Unmatched
        assert_eq!(router.lookup("example.com"), None);
        assert_eq!(router.lookup("unknown.org"), None);

        router.snapshot().verify().unwrap();
    }
}
