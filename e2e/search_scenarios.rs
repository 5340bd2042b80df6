// e2e/search_scenarios.rs — end-to-end search-pipeline scenarios.
//
// Drives the full DataProvider -> InplaceProcessor -> Searcher -> Executor
// pipeline against a synthetic multi-chunk file and checks its output
// against a naive, whole-buffer reference computed independently in each
// test, rather than against hardcoded fixture numbers this crate has no way
// to reproduce. Small `min_size`/`chunk_size` values force many chunks
// across several workers so these are real multi-chunk, multi-threaded runs.

use regex::bytes::Regex;

use xsearch::chunk::ChunkMeta;
use xsearch::executor::{Executor, SearchResults};
use xsearch::processor::{InplaceProcessor, NewLineIndexer};
use xsearch::provider::{BlockProvider, DataProvider, MappedBlockProvider};
use xsearch::searcher::{SearchMode, Searcher};
use xsearch::Error;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// A deterministic multi-line corpus mixing `"over"`, the near-miss
/// `"ovir"` (which a `[e|i]` character-class regex also matches, since that
/// class contains `e`, `|`, and `i` literally — not an alternation), and
/// filler lines, so literal and regex searches disagree by a known amount.
fn corpus() -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..400u32 {
        match i % 11 {
            0 => out.extend_from_slice(format!("line {i}: moreover and over again\n").as_bytes()),
            3 => out.extend_from_slice(format!("line {i}: the ovir variant shows up here\n").as_bytes()),
            7 => out.extend_from_slice(format!("line {i}: over and over and over\n").as_bytes()),
            _ => out.extend_from_slice(format!("line {i}: nothing relevant on this one\n").as_bytes()),
        }
    }
    out
}

fn write_corpus(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("corpus.txt");
    fs::write(&path, corpus()).unwrap();
    path
}

/// Runs `searcher` over `provider` with an optional ordered processor stack
/// across `num_threads` workers and returns the joined result.
fn run(
    provider: Arc<dyn DataProvider>,
    processors: Vec<Arc<dyn InplaceProcessor>>,
    searcher: Searcher,
    mode: SearchMode,
    num_threads: usize,
) -> Arc<SearchResults> {
    let exec = Executor::spawn(provider, processors, Arc::new(searcher), mode, num_threads, true);
    exec.join().unwrap()
}

// ── S1: literal vs. regex match/line counts ─────────────────────────────────

#[test]
fn literal_count_matches_equals_naive_non_overlapping_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();

    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let searcher = Searcher::new("over", false, false, true, SearchMode::CountMatches).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::CountMatches, 4);
    match &*result {
        SearchResults::Count(r) => assert_eq!(r.total(), naive),
        _ => panic!("expected Count"),
    }
}

#[test]
fn regex_count_matches_whole_buffer_regex_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();

    let re = Regex::new("ov[e|i]r").unwrap();
    let naive = re.find_iter(&data).count() as u64;
    // The corpus only ever produces "over" or "ovir" for this class, never
    // the literal '|' byte, so the regex count must exceed the plain-literal
    // "over" count by exactly the number of "ovir" occurrences.
    let naive_over = String::from_utf8_lossy(&data).matches("over").count() as u64;
    let naive_ovir = String::from_utf8_lossy(&data).matches("ovir").count() as u64;
    assert_eq!(naive, naive_over + naive_ovir);

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let searcher = Searcher::new("ov[e|i]r", true, false, true, SearchMode::CountMatches).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::CountMatches, 4);
    match &*result {
        SearchResults::Count(r) => assert_eq!(r.total(), naive),
        _ => panic!("expected Count"),
    }
}

#[test]
fn count_lines_counts_each_matching_line_once_regardless_of_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();
    let text = String::from_utf8_lossy(&data);

    let naive_lines = text.lines().filter(|l| l.contains("over")).count() as u64;

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let searcher = Searcher::new("over", false, false, true, SearchMode::CountLines).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::CountLines, 4);
    match &*result {
        SearchResults::Count(r) => assert_eq!(r.total(), naive_lines),
        _ => panic!("expected Count"),
    }
}

// ── S2: match byte offsets ───────────────────────────────────────────────────

#[test]
fn match_offsets_are_ascending_and_match_single_buffer_find_iter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();

    let naive: Vec<u64> = {
        let mut offsets = Vec::new();
        let mut pos = 0usize;
        while let Some(rel) = data[pos..].windows(4).position(|w| w == b"over") {
            offsets.push((pos + rel) as u64);
            pos += rel + 4;
        }
        offsets
    };
    assert!(!naive.is_empty());

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let searcher = Searcher::new("over", false, false, true, SearchMode::MatchOffsets).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::MatchOffsets, 4);
    match &*result {
        SearchResults::Offsets(r) => {
            let got: Vec<u64> = r.iter().collect();
            assert_eq!(got, naive);
            assert!(got.windows(2).all(|w| w[0] < w[1]), "offsets must be strictly ascending");
        }
        _ => panic!("expected Offsets"),
    }
}

// ── S3: line byte offsets (deduplicated per line) ────────────────────────────

#[test]
fn line_offsets_report_each_matching_line_start_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();

    let naive: Vec<u64> = {
        let mut offsets = Vec::new();
        let mut line_start = 0usize;
        for line in data.split_inclusive(|&b| b == b'\n') {
            if line.windows(4).any(|w| w == b"over") {
                offsets.push(line_start as u64);
            }
            line_start += line.len();
        }
        offsets
    };
    assert!(!naive.is_empty());

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let searcher = Searcher::new("over", false, false, true, SearchMode::LineOffsets).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::LineOffsets, 4);
    match &*result {
        SearchResults::Offsets(r) => assert_eq!(r.iter().collect::<Vec<_>>(), naive),
        _ => panic!("expected Offsets"),
    }
}

// ── S4-style: mapped provider on small files, chunk boundaries land on \n ───

#[test]
fn mapped_block_provider_small_chunks_preserve_total_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let data = b"What did you do?\n- Nothing?\n- Oh, nothing much over here.\n- Fair enough.\n".to_vec();
    let path = dir.path().join("small.txt");
    fs::write(&path, &data).unwrap();

    let naive = String::from_utf8_lossy(&data).matches("o").count() as u64;

    let provider: Arc<dyn DataProvider> = Arc::new(MappedBlockProvider::open(&path, 10, 40).unwrap());
    let searcher = Searcher::new("o", false, false, true, SearchMode::CountMatches).unwrap();
    let result = run(provider, vec![], searcher, SearchMode::CountMatches, 2);
    match &*result {
        SearchResults::Count(r) => assert_eq!(r.total(), naive),
        _ => panic!("expected Count"),
    }
}

// ── S5-style: metaless mapped reader overflow on an unbroken long line ──────

#[test]
fn mapped_block_provider_overflows_on_line_without_newline_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = vec![b'a'; 50];
    data.push(b'\n');
    data.extend(std::iter::repeat(b'b').take(200));
    let path = dir.path().join("overflow.txt");
    fs::write(&path, &data).unwrap();

    let provider = MappedBlockProvider::open(&path, 50, 5).unwrap();
    let (first, idx0) = provider.next().unwrap().unwrap();
    assert_eq!(idx0, 0);
    assert_eq!(first.size(), 51);

    let err = provider.next().unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }));
}

// ── S6: ordered pipeline determinism with the new-line indexer ─────────────

#[test]
fn ordered_line_indices_survive_four_way_parallel_execution() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();
    let text = String::from_utf8_lossy(&data);

    let naive: Vec<u64> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| l.contains("over"))
        .map(|(i, _)| i as u64)
        .collect();
    assert!(naive.len() > 10, "fixture should produce a substantial match set");

    let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, 96, 256).unwrap());
    let processors: Vec<Arc<dyn InplaceProcessor>> = vec![Arc::new(NewLineIndexer::new(64))];
    let searcher = Searcher::new("over", false, false, true, SearchMode::LineIndices).unwrap();
    let result = run(provider, processors, searcher, SearchMode::LineIndices, 4);
    match &*result {
        SearchResults::Offsets(r) => {
            let got: Vec<u64> = r.iter().collect();
            assert_eq!(got, naive, "ordered result must match file order without external sorting");
            assert!(got.windows(2).all(|w| w[0] < w[1]));
        }
        _ => panic!("expected Offsets"),
    }
}

// ── Invariant #1 style: chunking never drops or duplicates a byte ──────────

#[test]
fn chunked_execution_sees_every_match_exactly_once_regardless_of_chunk_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    let data = corpus();
    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    for chunk_size in [32usize, 128, 1024, 1 << 16] {
        let provider: Arc<dyn DataProvider> = Arc::new(BlockProvider::open(&path, chunk_size, 4096).unwrap());
        let searcher = Searcher::new("over", false, false, true, SearchMode::CountMatches).unwrap();
        let result = run(provider, vec![], searcher, SearchMode::CountMatches, 3);
        match &*result {
            SearchResults::Count(r) => assert_eq!(r.total(), naive, "chunk_size={chunk_size}"),
            _ => panic!("expected Count"),
        }
    }
}

#[test]
fn contract_error_on_line_indices_without_line_mapping() {
    let meta = ChunkMeta::uncompressed(0, 0, 2);
    let chunk = xsearch::chunk::Chunk::from_vec(b"x\n".to_vec(), meta);
    let searcher = Searcher::new("x", false, false, true, SearchMode::LineIndices).unwrap();
    let err = searcher.process(&chunk).unwrap_err();
    assert!(matches!(err, Error::Contract { .. }));
}
