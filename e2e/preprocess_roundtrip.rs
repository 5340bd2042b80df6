// e2e/preprocess_roundtrip.rs — offline preprocessing feeding the search
// pipeline back through a metafile (S8), plus the metaless small-chunk and
// overflow scenarios (S4/S5) exercised once more at the provider level.

use xsearch::config::{PreprocessOptions, MMAP_MIN_SIZE};
use xsearch::executor::{Executor, SearchResults};
use xsearch::meta::{Compression, MetaReader};
use xsearch::preprocess;
use xsearch::processor::{Decompressor, InplaceProcessor};
use xsearch::provider::{DataProvider, MetaMappedProvider, MetaStreamProvider};
use xsearch::searcher::{SearchMode, Searcher};

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn corpus() -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..600u32 {
        if i % 13 == 0 {
            out.extend_from_slice(format!("chunk marker over line {i}\n").as_bytes());
        } else {
            out.extend_from_slice(format!("row {i} carries no special token\n").as_bytes());
        }
    }
    out
}

fn write_corpus(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("src.txt");
    fs::write(&path, corpus()).unwrap();
    path
}

/// Preprocesses `src` with `compression`, then reads every chunk back
/// through `provider`, decompressing as needed, and returns the total byte
/// count recovered plus the count of literal `"over"` matches seen by the
/// full search pipeline.
fn preprocess_then_search(
    src: &std::path::Path,
    dir: &std::path::Path,
    compression: Compression,
    use_mmap: bool,
) -> u64 {
    let meta_path = dir.join(format!("{compression:?}.meta"));
    let out_path = dir.join(format!("{compression:?}.dat"));

    let mut options = PreprocessOptions::new(src.to_path_buf(), meta_path.clone());
    options.out = Some(out_path.clone());
    options.compression = compression;
    options.min_chunk_size = 256;
    options.max_oversize = 128;

    let summary = preprocess::run(&options).unwrap();
    assert!(summary.chunks_written > 1, "fixture should split into multiple chunks");

    let reader = MetaReader::open(&meta_path).unwrap();
    assert_eq!(reader.compression, compression);

    let mut processors: Vec<Arc<dyn InplaceProcessor>> = Vec::new();
    if compression != Compression::None {
        processors.push(Arc::new(Decompressor { compression }));
    }

    let provider: Arc<dyn DataProvider> = if use_mmap {
        Arc::new(MetaMappedProvider::open(&out_path, reader, 4, MMAP_MIN_SIZE).unwrap())
    } else {
        let reader = MetaReader::open(&meta_path).unwrap();
        Arc::new(MetaStreamProvider::open(&out_path, reader, 4).unwrap())
    };

    let searcher = Searcher::new("over", false, false, true, SearchMode::CountMatches).unwrap();
    let exec = Executor::spawn(provider, processors, Arc::new(searcher), SearchMode::CountMatches, 4, true);
    match &*exec.join().unwrap() {
        SearchResults::Count(r) => r.total(),
        _ => panic!("expected Count"),
    }
}

#[test]
fn uncompressed_round_trip_preserves_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_corpus(dir.path());
    let data = corpus();
    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    let got = preprocess_then_search(&src, dir.path(), Compression::None, false);
    assert_eq!(got, naive);
}

#[test]
fn lz4_round_trip_through_mapped_provider_preserves_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_corpus(dir.path());
    let data = corpus();
    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    let got = preprocess_then_search(&src, dir.path(), Compression::Lz4, true);
    assert_eq!(got, naive);
}

#[test]
fn zstd_round_trip_through_stream_provider_preserves_match_count() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_corpus(dir.path());
    let data = corpus();
    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    let got = preprocess_then_search(&src, dir.path(), Compression::Zstd, false);
    assert_eq!(got, naive);
}

#[test]
fn metafile_chunk_indices_are_dense_and_offsets_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_corpus(dir.path());
    let data = corpus();

    let meta_path = dir.path().join("dense.meta");
    let mut options = PreprocessOptions::new(src, meta_path.clone());
    options.out = Some(dir.path().join("dense.dat"));
    options.compression = Compression::Lz4;
    options.min_chunk_size = 300;
    options.max_oversize = 100;
    preprocess::run(&options).unwrap();

    let reader = MetaReader::open(&meta_path).unwrap();
    let mut records = Vec::new();
    while let Some(m) = reader.next().unwrap() {
        records.push(m);
    }
    assert!(records.len() > 1);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.chunk_index, i as u64);
    }
    for w in records.windows(2) {
        assert_eq!(w[0].original_offset + w[0].original_size, w[1].original_offset);
        assert_eq!(w[0].actual_offset + w[0].actual_size, w[1].actual_offset);
    }
    let total_original: u64 = records.iter().map(|r| r.original_size).sum();
    assert_eq!(total_original, data.len() as u64);
}

#[cfg(all(feature = "multithread", unix))]
#[test]
fn multithreaded_preprocess_search_round_trip_matches_single_threaded() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_corpus(dir.path());
    let data = corpus();
    let naive = String::from_utf8_lossy(&data).matches("over").count() as u64;

    let meta_path = dir.path().join("mt.meta");
    let out_path = dir.path().join("mt.dat");
    let mut options = PreprocessOptions::new(src, meta_path.clone());
    options.out = Some(out_path.clone());
    options.compression = Compression::Lz4;
    options.min_chunk_size = 256;
    options.max_oversize = 128;

    preprocess::run_multithread(&options, 4).unwrap();

    let reader = MetaReader::open(&meta_path).unwrap();
    let processors: Vec<Arc<dyn InplaceProcessor>> = vec![Arc::new(Decompressor { compression: Compression::Lz4 })];
    let provider: Arc<dyn DataProvider> = Arc::new(MetaStreamProvider::open(&out_path, reader, 4).unwrap());
    let searcher = Searcher::new("over", false, false, true, SearchMode::CountMatches).unwrap();
    let exec = Executor::spawn(provider, processors, Arc::new(searcher), SearchMode::CountMatches, 4, true);
    match &*exec.join().unwrap() {
        SearchResults::Count(r) => assert_eq!(r.total(), naive),
        _ => panic!("expected Count"),
    }
}
