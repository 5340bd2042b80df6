//! Criterion benchmarks for the SIMD scan primitives (C1).
//!
//! Run with:
//!   cargo bench --bench simd

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xsearch::simd::{find_char, find_substr, to_lower_ascii};

fn haystack(size: usize) -> Vec<u8> {
    let mut data = vec![b'x'; size];
    // Plant a needle near the end so every scan walks almost the full length.
    let tail = b"NEEDLE";
    let at = size.saturating_sub(tail.len() + 1);
    data[at..at + tail.len()].copy_from_slice(tail);
    data
}

fn bench_find_char(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_char");
    for &size in &[256usize, 4096, 1 << 20] {
        let data = haystack(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("find_char", size), &data, |b, data| {
            b.iter(|| find_char(black_box(data), b'E'))
        });
    }
    group.finish();
}

fn bench_find_substr(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_substr");
    for &size in &[256usize, 4096, 1 << 20] {
        let data = haystack(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("find_substr", size), &data, |b, data| {
            b.iter(|| find_substr(black_box(data), b"NEEDLE"))
        });
    }
    group.finish();
}

fn bench_to_lower_ascii(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_lower_ascii");
    for &size in &[256usize, 4096, 1 << 20] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("to_lower_ascii", size), &size, |b, &size| {
            b.iter_batched(
                || vec![b'A'; size],
                |mut data| to_lower_ascii(black_box(&mut data)),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_char, bench_find_substr, bench_to_lower_ascii);
criterion_main!(benches);
