//! Named defaults and the settings surfaces passed to the executor and the
//! preprocessor. Centralising these as named constants — rather than magic
//! numbers at call sites — mirrors how the LZ4 reference port keeps its own
//! tunables (compression level, worker count, block size) in one place.

use std::path::PathBuf;

use crate::meta::Compression;

/// Preprocessor target chunk size before compression.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 1 << 20; // 1 MiB
/// How far a chunk may grow past `DEFAULT_MIN_CHUNK_SIZE` while looking for a
/// line boundary before the preprocessor or a metaless reader gives up.
pub const DEFAULT_MAX_OVERSIZE: usize = 64 << 10; // 64 KiB
/// Byte spacing between consecutive line-mapping anchors.
pub const DEFAULT_ANCHOR_DISTANCE: u64 = 4 << 10; // 4 KiB
/// Default max-concurrent-reads semaphore permits for a DataProvider.
pub const DEFAULT_MAX_READERS: usize = 4;
/// Below this `actual_size`, mapped readers fall back to a `pread`-based read.
pub const MMAP_MIN_SIZE: usize = 1 << 20; // 1 MiB
/// Bounded FIFO depth for the MetaFile reader.
pub const METAFILE_READ_BUFFER_RECORDS: usize = 64;
/// Default Zstandard compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Number of worker threads to use when the caller does not request a
/// specific count. Mirrors the physical-core-minus-spared-core heuristic:
/// leave one core (plus one per eight) free for I/O and the OS.
pub fn default_num_workers() -> usize {
    let nb_cores = num_cpus::get_physical() as i32;
    let spared = 1 + (nb_cores >> 3);
    let workers = if nb_cores <= spared { 1 } else { nb_cores - spared };
    workers as usize
}

/// Settings for a search run: which DataProvider/InplaceProcessor stack and
/// ReturnProcessor to build, and how many workers to fan across.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub pattern: String,
    pub regex: bool,
    pub ignore_case: bool,
    pub utf8: bool,
    pub num_threads: usize,
    pub max_readers: usize,
    pub chunk_size: usize,
    pub use_mmap: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            pattern: String::new(),
            regex: false,
            ignore_case: false,
            utf8: true,
            num_threads: default_num_workers().max(1),
            max_readers: DEFAULT_MAX_READERS,
            chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            use_mmap: true,
        }
    }
}

/// Settings for an offline preprocessing run.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub src: PathBuf,
    pub out: Option<PathBuf>,
    pub meta: PathBuf,
    pub compression: Compression,
    pub level: i32,
    pub min_chunk_size: usize,
    pub max_oversize: usize,
    pub anchor_distance: u64,
}

impl PreprocessOptions {
    pub fn new(src: PathBuf, meta: PathBuf) -> Self {
        PreprocessOptions {
            src,
            out: None,
            meta,
            compression: Compression::None,
            level: DEFAULT_ZSTD_LEVEL,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_oversize: DEFAULT_MAX_OVERSIZE,
            anchor_distance: DEFAULT_ANCHOR_DISTANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_num_workers_at_least_one() {
        assert!(default_num_workers() >= 1);
    }

    #[test]
    fn search_options_default_uses_mmap() {
        let opts = SearchOptions::default();
        assert!(opts.use_mmap);
        assert_eq!(opts.max_readers, DEFAULT_MAX_READERS);
    }
}
