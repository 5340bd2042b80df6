//! Criterion benchmarks for the end-to-end search pipeline (C4 + C6 + C8).
//!
//! Run with:
//!   cargo bench --bench pipeline

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;
use xsearch::executor::Executor;
use xsearch::provider::{BlockProvider, DataProvider, MappedBlockProvider};
use xsearch::searcher::{SearchMode, Searcher};

fn corpus_file(lines: usize) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut contents = String::new();
    for i in 0..lines {
        if i % 97 == 0 {
            contents.push_str("the quick brown fox jumps over the lazy dog\n");
        } else {
            contents.push_str("just another ordinary line of corpus text\n");
        }
    }
    std::fs::write(file.path(), contents).unwrap();
    file
}

fn bench_count_matches_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_matches_block_provider");
    for &lines in &[10_000usize, 100_000] {
        let file = corpus_file(lines);
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &file, |b, file| {
            b.iter(|| {
                let provider: Arc<dyn DataProvider> =
                    Arc::new(BlockProvider::open(file.path(), 1 << 16, 1 << 12).unwrap());
                let searcher = Arc::new(
                    Searcher::new("fox", false, false, true, SearchMode::CountMatches).unwrap(),
                );
                let exec = Executor::spawn(provider, vec![], searcher, SearchMode::CountMatches, 4, false);
                exec.join().unwrap()
            })
        });
    }
    group.finish();
}

fn bench_count_matches_mapped(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_matches_mapped_provider");
    for &lines in &[10_000usize, 100_000] {
        let file = corpus_file(lines);
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &file, |b, file| {
            b.iter(|| {
                let provider: Arc<dyn DataProvider> =
                    Arc::new(MappedBlockProvider::open(file.path(), 1 << 16, 1 << 12).unwrap());
                let searcher = Arc::new(
                    Searcher::new("fox", false, false, true, SearchMode::CountMatches).unwrap(),
                );
                let exec = Executor::spawn(provider, vec![], searcher, SearchMode::CountMatches, 4, false);
                exec.join().unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_count_matches_block, bench_count_matches_mapped);
criterion_main!(benches);
