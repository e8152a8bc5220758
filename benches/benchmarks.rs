//! Performance benchmarks for pwtable
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pwtable::digest::DigestAlgorithm;
use pwtable::rules::{Lexicon, Rule, parse_rule};
use pwtable::table::{BucketHash, DiskHashTable, TableLayout, TableReader};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn rule(text: &str) -> Rule {
    let spec = parse_rule(text).expect("Failed to parse rule");
    let words = Lexicon::from_words(["password", "dragon", "letmein", "monkey", "shadow"]);
    Rule::build(&spec, Arc::new(words)).expect("Failed to build rule")
}

fn layout(value_width: u32) -> TableLayout {
    TableLayout {
        bucket_count: 4096,
        value_width,
        ..TableLayout::default()
    }
}

/// Build a table of every `#5` password, for read benchmarks
fn create_benchmark_table() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let prefix = temp_dir.path().join("digits");
    let rule = rule("#5");

    let mut table = DiskHashTable::create(&prefix, layout(5), DigestAlgorithm::Md5, BucketHash::Fx)
        .expect("Failed to create table");
    table.load_directory_cache().expect("Failed to load directory");
    let mut cursor = rule.cursor();
    let mut password = Vec::new();
    while cursor.next_password(&mut password).unwrap().is_some() {
        let digest = DigestAlgorithm::Md5.digest(&password).unwrap();
        table.append(digest.as_bytes(), &password).unwrap();
    }
    table.close().expect("Failed to close table");

    (temp_dir, prefix)
}

fn bench_rule_parsing(c: &mut Criterion) {
    let rules = ["#8", "@4#4", "$#2&$@1&.3", "#1&#2&#3&#4&#5&#6&#7&#8"];

    let mut group = c.benchmark_group("rule_parsing");
    for text in rules {
        group.bench_with_input(BenchmarkId::from_parameter(text), &text, |b, &t| {
            b.iter(|| parse_rule(black_box(t)))
        });
    }
    group.finish();
}

fn bench_kth(c: &mut Criterion) {
    let mut group = c.benchmark_group("kth");
    for text in ["#8", "@3.3", "$#4", "#2&@2&.2&$"] {
        let rule = rule(text);
        let ranks: Vec<u64> = (0..1024u64).map(|i| i.wrapping_mul(2_654_435_761) % rule.size()).collect();
        let mut out = Vec::with_capacity(rule.max_len());
        group.bench_function(text, |b| {
            b.iter(|| {
                for &rank in &ranks {
                    let _ = rule.kth(black_box(rank), &mut out, false);
                }
            })
        });
    }
    group.finish();
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");
    for algorithm in DigestAlgorithm::ALL {
        group.bench_function(algorithm.name(), |b| {
            b.iter(|| algorithm.digest(black_box(b"correct horse battery")))
        });
    }
    group.finish();
}

fn bench_table_insert(c: &mut Criterion) {
    let rule = rule("#4");
    let mut group = c.benchmark_group("table_insert");
    group.sample_size(10);

    for unique in [false, true] {
        let name = if unique { "insert_unique_10k" } else { "append_10k" };
        group.bench_function(name, |b| {
            b.iter_with_setup(
                || {
                    let dir = TempDir::new().unwrap();
                    let mut table = DiskHashTable::create(
                        &dir.path().join("t"),
                        layout(4),
                        DigestAlgorithm::Sha1,
                        BucketHash::DigestPrefix,
                    )
                    .unwrap();
                    table.load_directory_cache().unwrap();
                    (dir, table)
                },
                |(_dir, mut table)| {
                    let mut password = Vec::new();
                    for rank in 0..rule.size() {
                        rule.kth(rank, &mut password, false).unwrap();
                        let digest = DigestAlgorithm::Sha1.digest(&password).unwrap();
                        if unique {
                            table.insert_unique(digest.as_bytes(), &password).unwrap();
                        } else {
                            table.append(digest.as_bytes(), &password).unwrap();
                        }
                    }
                    table.close().unwrap()
                },
            )
        });
    }
    group.finish();
}

fn bench_table_lookup(c: &mut Criterion) {
    let (_temp_dir, prefix) = create_benchmark_table();
    let reader = TableReader::open(&prefix).expect("Failed to open table");
    let keys: Vec<_> = ["00000", "31337", "99999", "12345"]
        .iter()
        .map(|p| DigestAlgorithm::Md5.digest(p.as_bytes()).unwrap())
        .collect();

    c.bench_function("table_lookup", |b| {
        b.iter(|| {
            for key in &keys {
                let _ = reader.lookup(black_box(key.as_bytes()));
            }
        })
    });

    c.bench_function("table_open", |b| b.iter(|| TableReader::open(black_box(&prefix))));
}

criterion_group!(
    benches,
    bench_rule_parsing,
    bench_kth,
    bench_digest,
    bench_table_insert,
    bench_table_lookup,
);

criterion_main!(benches);
