use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sni_router_r::{GroupId, PatternTable, RouterOptions, SniRouter};

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789-";
const LABELS: usize = 4;
const LABEL_LEN: std::ops::Range<usize> = 3..63;

fn random_label(rng: &mut StdRng) -> String {
    let len = rng.gen_range(LABEL_LEN);
    let mut label: String = (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    // labels may not start or end with a hyphen
    label.replace_range(0..1, "a");
    label.replace_range(len - 1..len, "z");
    label
}

/// Random four-label domains, up to 255 bytes each.
fn generate_domains(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            (0..LABELS)
                .map(|_| random_label(&mut rng))
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect()
}

/// `*.` plus the three rightmost labels of each domain.
fn wildcard_patterns(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .map(|d| match d.split_once('.') {
            Some((_, suffix)) => format!("*.{}", suffix),
            None => format!("*.{}", d),
        })
        .collect()
}

fn committed_table(patterns: &[String]) -> PatternTable {
    let mut table = PatternTable::new();
    for (i, pattern) in patterns.iter().enumerate() {
        table.register(pattern, GroupId(i as u64)).unwrap();
    }
    table.commit().unwrap();
    table
}

/// Bulk registration followed by a single commit.
fn bench_register_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_commit");
    group.sample_size(10);

    for size in [1_000, 10_000, 20_000].iter() {
        let domains = generate_domains(*size, 7);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("exact", size), size, |b, _| {
            b.iter(|| black_box(committed_table(&domains)));
        });

        let mixed: Vec<String> = domains
            .iter()
            .zip(wildcard_patterns(&domains))
            .enumerate()
            .map(|(i, (exact, wildcard))| if i % 4 == 0 { wildcard } else { exact.clone() })
            .collect();
        group.bench_with_input(BenchmarkId::new("mixed", size), size, |b, _| {
            b.iter(|| black_box(committed_table(&mixed)));
        });
    }

    group.finish();
}

/// Lookups against a committed table, one iteration per name batch.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1_000, 10_000, 20_000].iter() {
        let domains = generate_domains(*size, 7);
        let misses = generate_domains(*size, 11);
        let exact = committed_table(&domains);
        let wildcards = committed_table(&wildcard_patterns(&domains));
        let covered: Vec<String> = domains.iter().map(|d| format!("x{}", d)).collect();
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("exact_hit", size), size, |b, _| {
            b.iter(|| {
                for name in &domains {
                    black_box(exact.lookup(name));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("miss", size), size, |b, _| {
            b.iter(|| {
                for name in &misses {
                    black_box(exact.lookup(name));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("wildcard_hit", size), size, |b, _| {
            b.iter(|| {
                for name in &covered {
                    black_box(wildcards.lookup(name));
                }
            });
        });

        let router = SniRouter::new(RouterOptions::new());
        for (i, name) in domains.iter().enumerate() {
            router.register(name, GroupId(i as u64)).unwrap();
        }
        router.commit().unwrap();
        group.bench_with_input(BenchmarkId::new("router_hit", size), size, |b, _| {
            b.iter(|| {
                for name in &domains {
                    black_box(router.lookup(name));
                }
            });
        });
    }

    group.finish();
}

/// Interior-wildcard patterns graft label chains at commit time.
fn bench_interior_wildcards(c: &mut Criterion) {
    let mut group = c.benchmark_group("interior_wildcard");
    group.sample_size(10);

    for count in [10, 100].iter() {
        let patterns: Vec<String> = generate_domains(*count, 3)
            .iter()
            .map(|d| {
                let labels: Vec<&str> = d.split('.').collect();
                format!("{}.*.{}.{}", labels[0], labels[2], labels[3])
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("commit", count), count, |b, _| {
            b.iter(|| black_box(committed_table(&patterns)));
        });

        let table = committed_table(&patterns);
        let names: Vec<String> = patterns.iter().map(|p| p.replace('*', "edge")).collect();
        group.bench_with_input(BenchmarkId::new("lookup", count), count, |b, _| {
            b.iter(|| {
                for name in &names {
                    black_box(table.lookup(name));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_register_commit,
    bench_lookup,
    bench_interior_wildcards
);
criterion_main!(benches);
