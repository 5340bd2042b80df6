//! Command-line argument surfaces for the `xgrep` and `xprep` binaries
//! (C12), plus the shared exit-code/error-reporting policy (§6, §7): both
//! binaries route every user-facing failure through [`report_error`] so the
//! exit-code mapping lives in one place instead of being reimplemented at
//! each call site.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{PreprocessOptions, SearchOptions};
use crate::diagnostic;
use crate::diagnostics::{self, Level};
use crate::error::Error;
use crate::meta::Compression;
use crate::searcher::SearchMode;

/// `xgrep PATTERN FILE [METAFILE]` — omit `METAFILE` to search the raw file
/// directly (no preprocessing pass required).
#[derive(Parser, Debug)]
#[command(name = "xgrep", version, about = "Parallel, chunk-oriented text search")]
pub struct XgrepArgs {
    pub pattern: String,
    pub file: PathBuf,
    pub metafile: Option<PathBuf>,

    /// Count matching lines instead of printing them.
    #[arg(short = 'c', long = "count")]
    pub count: bool,
    /// Prefix each result with its (global, zero-based) line index.
    #[arg(short = 'n', long = "line-number")]
    pub line_number: bool,
    /// Report byte offsets instead of line content.
    #[arg(short = 'b', long = "byte-offset")]
    pub byte_offset: bool,
    /// Combined with `-b`, report the offset of each match rather than each matching line.
    #[arg(short = 'o', long = "only-matching")]
    pub only_matching: bool,
    #[arg(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,
    /// Treat PATTERN as a literal string rather than a regex.
    #[arg(short = 'F', long = "fixed-strings")]
    pub fixed_strings: bool,
    #[arg(short = 'j', long = "threads")]
    pub threads: Option<usize>,
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    #[arg(long = "no-mmap")]
    pub no_mmap: bool,

    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Picks the single [`SearchMode`] that best matches the flag combination.
/// The ReturnProcessor produces one typed result per chunk, so a CLI
/// invocation settles on exactly one mode; `-c` takes priority (matching
/// grep's own `-c` overriding `-o`/`-n`), then byte-offset flavors, then
/// line-number mode, falling back to printing whole matching lines.
pub fn resolve_search_mode(args: &XgrepArgs) -> SearchMode {
    if args.count {
        SearchMode::CountLines
    } else if args.byte_offset && args.only_matching {
        SearchMode::MatchOffsets
    } else if args.byte_offset {
        SearchMode::LineOffsets
    } else if args.line_number {
        SearchMode::LineIndices
    } else {
        SearchMode::Lines
    }
}

/// Picks the `SearchOptions::utf8` flag per §9's "cheap is-ascii test over
/// the pattern": for a fixed-string, ASCII-only pattern the ASCII fast path
/// applies (`utf8 = false`, SIMD lowercase via C5's `AsciiToLower` + a
/// literal scan); everything else (a regex, or a literal with non-ASCII
/// bytes) delegates case folding to the regex engine (`utf8 = true`).
fn search_is_ascii_fast_path(args: &XgrepArgs) -> bool {
    args.fixed_strings && args.pattern.is_ascii()
}

pub fn build_search_options(args: &XgrepArgs) -> SearchOptions {
    let mut options = SearchOptions {
        pattern: args.pattern.clone(),
        regex: !args.fixed_strings,
        ignore_case: args.ignore_case,
        utf8: !search_is_ascii_fast_path(args),
        ..SearchOptions::default()
    };
    if let Some(threads) = args.threads {
        options.num_threads = threads.max(1);
    }
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    options.use_mmap = !args.no_mmap;
    options
}

/// `xprep INPUT [-o OUT] [-m META] [-a lz4|zstd|none] [-l LEVEL] [--chunk-size S] [-d D]`
#[derive(Parser, Debug)]
#[command(name = "xprep", version, about = "Offline chunk + metafile preprocessor")]
pub struct XprepArgs {
    pub input: PathBuf,

    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,
    #[arg(short = 'm', long = "meta")]
    pub meta: Option<PathBuf>,
    #[arg(short = 'a', long = "algorithm", value_enum, default_value_t = CompressionArg::None)]
    pub compression: CompressionArg,
    #[arg(short = 'l', long = "level")]
    pub level: Option<i32>,
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    #[arg(short = 'd', long = "distance")]
    pub anchor_distance: Option<u64>,

    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Compress chunks across a bounded worker pool instead of sequentially.
    /// Only available when built with the `multithread` feature.
    #[cfg(feature = "multithread")]
    #[arg(short = 'j', long = "threads")]
    pub threads: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionArg {
    Lz4,
    Zstd,
    None,
}

impl From<CompressionArg> for Compression {
    fn from(a: CompressionArg) -> Compression {
        match a {
            CompressionArg::Lz4 => Compression::Lz4,
            CompressionArg::Zstd => Compression::Zstd,
            CompressionArg::None => Compression::None,
        }
    }
}

/// Companion-metafile default: `INPUT` with a `.xmeta` extension appended,
/// used when `-m`/`--meta` is omitted.
fn default_meta_path(input: &std::path::Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".xmeta");
    PathBuf::from(name)
}

pub fn build_preprocess_options(args: &XprepArgs) -> PreprocessOptions {
    let meta = args.meta.clone().unwrap_or_else(|| default_meta_path(&args.input));
    let mut options = PreprocessOptions::new(args.input.clone(), meta);
    options.out = args.out.clone();
    options.compression = args.compression.into();
    if let Some(level) = args.level {
        options.level = level;
    }
    if let Some(chunk_size) = args.chunk_size {
        options.min_chunk_size = chunk_size;
    }
    if let Some(distance) = args.anchor_distance {
        options.anchor_distance = distance;
    }
    options
}

/// Raises or lowers the process-wide diagnostic level from `-q`/`-v`
/// repetition counts. `-q` pins the level at `ERROR`; each `-v` raises it by
/// one step above the default `WARN`.
pub fn apply_verbosity(quiet: bool, verbose: u8) {
    if quiet {
        diagnostics::set_level(Level::Error);
        return;
    }
    let level = match verbose {
        0 => Level::Warn,
        1 => Level::Info,
        _ => Level::Debug,
    };
    diagnostics::set_level(level);
}

/// Prints a one-line diagnostic for a pipeline [`Error`] and returns the
/// exit code callers should propagate (§7's "one-line diagnostic and a
/// non-zero exit code; no partial result is silently committed").
pub fn report_error(program: &str, err: &Error) -> i32 {
    diagnostic!(Level::Error, "{program}: {err}");
    err.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_flag_takes_priority_over_others() {
        let args = XgrepArgs {
            pattern: "x".into(),
            file: "f".into(),
            metafile: None,
            count: true,
            line_number: true,
            byte_offset: true,
            only_matching: true,
            ignore_case: false,
            fixed_strings: false,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        assert_eq!(resolve_search_mode(&args), SearchMode::CountLines);
    }

    #[test]
    fn byte_offset_with_only_matching_yields_match_offsets() {
        let args = XgrepArgs {
            pattern: "x".into(),
            file: "f".into(),
            metafile: None,
            count: false,
            line_number: false,
            byte_offset: true,
            only_matching: true,
            ignore_case: false,
            fixed_strings: false,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        assert_eq!(resolve_search_mode(&args), SearchMode::MatchOffsets);
    }

    #[test]
    fn default_meta_path_appends_xmeta_extension() {
        let path = default_meta_path(std::path::Path::new("/tmp/data.log"));
        assert_eq!(path, PathBuf::from("/tmp/data.log.xmeta"));
    }

    #[test]
    fn fixed_strings_flag_disables_regex() {
        let args = XgrepArgs {
            pattern: "a.b".into(),
            file: "f".into(),
            metafile: None,
            count: false,
            line_number: false,
            byte_offset: false,
            only_matching: false,
            ignore_case: false,
            fixed_strings: true,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        let options = build_search_options(&args);
        assert!(!options.regex);
    }

    #[test]
    fn ascii_fixed_string_picks_fast_path() {
        let args = XgrepArgs {
            pattern: "over".into(),
            file: "f".into(),
            metafile: None,
            count: false,
            line_number: false,
            byte_offset: false,
            only_matching: false,
            ignore_case: true,
            fixed_strings: true,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        let options = build_search_options(&args);
        assert!(!options.utf8);
    }

    #[test]
    fn non_ascii_fixed_string_falls_back_to_unicode_path() {
        let args = XgrepArgs {
            pattern: "caf\u{e9}".into(),
            file: "f".into(),
            metafile: None,
            count: false,
            line_number: false,
            byte_offset: false,
            only_matching: false,
            ignore_case: true,
            fixed_strings: true,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        let options = build_search_options(&args);
        assert!(options.utf8);
    }

    #[test]
    fn regex_mode_defaults_utf8_true() {
        let args = XgrepArgs {
            pattern: "a.b".into(),
            file: "f".into(),
            metafile: None,
            count: false,
            line_number: false,
            byte_offset: false,
            only_matching: false,
            ignore_case: true,
            fixed_strings: false,
            threads: None,
            chunk_size: None,
            no_mmap: false,
            quiet: false,
            verbose: 0,
        };
        let options = build_search_options(&args);
        assert!(options.utf8);
    }
}
