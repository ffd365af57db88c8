//! Integration tests for PatternTable and DomainTrie through the public API

use sni_router_r::{DomainTrie, GroupId, PatternTable, SniError, TrieOptions};

fn table(patterns: &[(&str, u64)]) -> PatternTable {
    let mut table = PatternTable::new();
    for &(pattern, id) in patterns {
        table.register(pattern, GroupId(id)).unwrap();
    }
    table.commit().unwrap();
    table.trie().verify().unwrap();
    table
}

fn group(table: &PatternTable, name: &str) -> Option<u64> {
    table.lookup(name).map(GroupId::get)
}

#[test]
fn test_exact_precedence_over_wildcard() {
    let table = table(&[("*.b.com", 1), ("a.b.com", 2)]);
    assert_eq!(group(&table, "a.b.com"), Some(2));
    assert_eq!(group(&table, "x.b.com"), Some(1));
}

#[test]
fn test_wildcard_does_not_match_bare_suffix() {
    let table = table(&[("*.b.com", 1)]);
    assert_eq!(group(&table, "b.com"), None);
    assert_eq!(group(&table, "deep.x.b.com"), Some(1));
}

#[test]
fn test_wildcard_fan_out() {
    let table = table(&[("1547.*.sc.ciscoplus.com", 200)]);
    for label in ["a", "lax", "iad-2", "x0", "zz9-abc"] {
        let name = format!("1547.{}.sc.ciscoplus.com", label);
        assert_eq!(group(&table, &name), Some(200), "{}", name);
    }
    assert_eq!(group(&table, "1547.sc.ciscoplus.com"), None);
    assert_eq!(group(&table, "x.1547.a.sc.ciscoplus.com"), None);
}

#[test]
fn test_multiple_independent_wildcards() {
    let table = table(&[("usw1.*.sc.*.cisco.com", 300)]);
    assert_eq!(group(&table, "usw1.lax.sc.zproxy.cisco.com"), Some(300));
    assert_eq!(group(&table, "usw1.ord.sc.edge.cisco.com"), Some(300));
    assert_eq!(group(&table, "usw1.lax.sc.cisco.com"), None);
    assert_eq!(group(&table, "usw1.lax.sd.zproxy.cisco.com"), None);
}

#[test]
fn test_disjoint_exact_matches() {
    let table = table(&[("abc.def.hg.com", 12), ("123.def.hg.com", 23)]);
    assert_eq!(group(&table, "abc.def.hg.com"), Some(12));
    assert_eq!(group(&table, "123.def.hg.com"), Some(23));
    assert_eq!(group(&table, "xyz.def.hg.com"), None);
}

#[test]
fn test_rebuild_idempotence() {
    let mut table = table(&[
        ("*.b.com", 1),
        ("a.b.com", 2),
        ("1547.*.sc.ciscoplus.com", 200),
        ("usw1.*.sc.*.cisco.com", 300),
    ]);
    let names = [
        "a.b.com",
        "x.b.com",
        "b.com",
        "1547.lax.sc.ciscoplus.com",
        "usw1.lax.sc.zproxy.cisco.com",
        "nothing.example",
    ];
    let first: Vec<_> = names.iter().map(|n| table.lookup(n)).collect();
    let nodes = table.trie().live_nodes();

    table.commit().unwrap();
    let second: Vec<_> = names.iter().map(|n| table.lookup(n)).collect();
    assert_eq!(first, second);
    assert_eq!(table.trie().live_nodes(), nodes);
}

#[test]
fn test_reference_counts_return_to_baseline() {
    let mut trie = DomainTrie::new();
    for (pattern, id) in [
        ("*.com", 1),
        ("*.b.com", 2),
        ("a.b.com", 3),
        ("x.*.com", 4),
        ("1547.*.sc.ciscoplus.com", 200),
        ("usw1.*.sc.*.cisco.com", 300),
    ] {
        trie.insert(pattern, GroupId(id)).unwrap();
        trie.verify().unwrap();
    }
    trie.clear();
    assert_eq!(trie.live_nodes(), 0);
    trie.verify().unwrap();
}

#[test]
fn test_invalid_input() {
    let mut table = PatternTable::new();
    assert!(table.register("a b.com", GroupId(1)).is_err());
    assert!(table.register("", GroupId(1)).is_err());
    assert!(table.register("a.*b.com", GroupId(1)).is_err());
    assert!(matches!(
        table.register(&"a".repeat(300), GroupId(1)),
        Err(SniError::NameTooLong { len: 300, max: 256 })
    ));

    table.register("a.com", GroupId(1)).unwrap();
    table.commit().unwrap();
    assert_eq!(table.lookup("a b.com"), None);
    assert_eq!(table.lookup("\u{e9}.com"), None);
    assert_eq!(table.lookup(&"a.".repeat(200)), None);
}

#[test]
fn test_arena_limit_keeps_previous_tree() {
    let mut table = PatternTable::with_options(TrieOptions::new().with_max_nodes(50));
    table.register("a.b.com", GroupId(1)).unwrap();
    table.commit().unwrap();
    let before = table.trie().live_nodes();

    table.register("usw1.*.sc.*.cisco.com", GroupId(300)).unwrap();
    assert!(matches!(table.commit(), Err(SniError::ArenaExhausted { .. })));
    assert_eq!(table.trie().live_nodes(), before);
    assert_eq!(group(&table, "a.b.com"), Some(1));
}

#[test]
fn test_many_sibling_domains_share_suffix() {
    let patterns: Vec<(String, u64)> = (0..200)
        .map(|i| (format!("host{}.svc.cluster.local", i), i as u64))
        .collect();
    let mut table = PatternTable::new();
    for (pattern, id) in &patterns {
        table.register(pattern, GroupId(*id)).unwrap();
    }
    table.register("*.cluster.local", GroupId(999)).unwrap();
    table.commit().unwrap();
    table.trie().verify().unwrap();

    for (pattern, id) in &patterns {
        assert_eq!(group(&table, pattern), Some(*id));
    }
    assert_eq!(group(&table, "host1000.svc.cluster.local"), Some(999));
    assert_eq!(group(&table, "svc.cluster.local"), Some(999));
    assert_eq!(group(&table, "cluster.local"), None);
}

#[test]
fn test_walk_public_tree() {
    use sni_router_r::trie::SubtreeWalk;

    let table = table(&[("*.b.com", 1), ("a.b.com", 2)]);
    let trie = table.trie();
    let root = trie.root().unwrap();

    let mut walk = SubtreeWalk::new(root);
    let mut leaves = std::collections::HashSet::new();
    while let Some(edge) = walk.next_edge(trie.arena()) {
        if let Some(leaf) = trie.arena().leaf(edge.child) {
            leaves.insert(leaf.target);
        }
    }
    assert_eq!(leaves.len(), 2);
    assert!(leaves.contains(&GroupId(1)) && leaves.contains(&GroupId(2)));
}
