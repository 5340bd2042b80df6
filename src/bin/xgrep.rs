//! `xgrep` — the search-time CLI front end over C1-C8 (§6).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use xsearch::cli::{self, XgrepArgs};
use xsearch::config::{DEFAULT_ANCHOR_DISTANCE, DEFAULT_MAX_OVERSIZE, MMAP_MIN_SIZE};
use xsearch::error::{Error, Result};
use xsearch::executor::{Executor, SearchResults};
use xsearch::meta::{Compression, MetaReader};
use xsearch::processor::{AsciiToLower, Decompressor, InplaceProcessor, NewLineIndexer};
use xsearch::provider::{BlockProvider, DataProvider, MappedBlockProvider, MetaMappedProvider, MetaStreamProvider};
use xsearch::searcher::{SearchMode, Searcher};

fn main() -> ExitCode {
    let args = match XgrepArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // clap reserves 0 for --help/--version; anything else is a usage
            // error, which §6 maps to exit 1 rather than clap's own default.
            return ExitCode::from(if e.exit_code() == 0 { 0 } else { 1 });
        }
    };
    cli::apply_verbosity(args.quiet, args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code as u8),
        // A malformed --fixed-strings-less regex is a usage error (exit 1);
        // everything else (I/O, a corrupt metafile, a codec failure) is 2.
        Err(e @ Error::Contract { .. }) => {
            cli::report_error("xgrep", &e);
            ExitCode::from(1)
        }
        Err(e) => ExitCode::from(cli::report_error("xgrep", &e) as u8),
    }
}

fn run(args: &XgrepArgs) -> Result<i32> {
    let options = cli::build_search_options(args);
    let mode = cli::resolve_search_mode(args);

    // Built in §4.5 pipeline order: decompress (if the metafile says the
    // source is compressed) before anything else touches the bytes, then
    // the ASCII fast-path lowercase, then line-mapping.
    let mut processors: Vec<Arc<dyn InplaceProcessor>> = Vec::new();

    let provider: Arc<dyn DataProvider> = if let Some(metafile) = &args.metafile {
        let reader = MetaReader::open(metafile)?;
        if !matches!(reader.compression, Compression::None | Compression::Unknown) {
            processors.push(Arc::new(Decompressor { compression: reader.compression }));
        }
        // ASCII fast path (§4.6, §9): case-insensitive + non-utf8 means the
        // CLI picked a fixed-string, all-ASCII pattern, so lowercase the
        // (now-decompressed) chunk data here and let the searcher match a
        // pre-lowercased literal instead of paying for a regex engine.
        if options.ignore_case && !options.regex && !options.utf8 {
            processors.push(Arc::new(AsciiToLower));
        }
        if options.use_mmap {
            Arc::new(MetaMappedProvider::open(&args.file, reader, options.max_readers, MMAP_MIN_SIZE)?)
        } else {
            Arc::new(MetaStreamProvider::open(&args.file, reader, options.max_readers)?)
        }
    } else {
        // No compressed source to decompress first; the ASCII fast path
        // still lowercases ahead of line-mapping, matching the order above.
        if options.ignore_case && !options.regex && !options.utf8 {
            processors.push(Arc::new(AsciiToLower));
        }
        // Without a metafile no chunk carries line-mapping anchors; build
        // them on the fly when the requested mode needs them.
        if mode == SearchMode::LineIndices {
            processors.push(Arc::new(NewLineIndexer::new(DEFAULT_ANCHOR_DISTANCE)));
        }
        if options.use_mmap {
            Arc::new(MappedBlockProvider::open(&args.file, options.chunk_size, DEFAULT_MAX_OVERSIZE)?)
        } else {
            Arc::new(BlockProvider::open(&args.file, options.chunk_size, DEFAULT_MAX_OVERSIZE)?)
        }
    };

    let searcher = Arc::new(Searcher::new(&options.pattern, options.regex, options.ignore_case, options.utf8, mode)?);
    let exec = Executor::spawn(provider, processors, searcher, mode, options.num_threads, true);
    let result = exec.join()?;
    Ok(print_results(&result))
}

/// Streams the ordered result straight to stdout as it drains, then returns
/// the exit code: count modes always succeed; the remaining modes exit 1 on
/// zero results, matching grep's own "no lines selected" convention.
fn print_results(result: &SearchResults) -> i32 {
    match result {
        SearchResults::Count(r) => {
            println!("{}", r.total());
            0
        }
        SearchResults::Offsets(r) => {
            let mut any = false;
            for offset in r.iter() {
                any = true;
                println!("{offset}");
            }
            if any {
                0
            } else {
                1
            }
        }
        SearchResults::Lines(r) => {
            let mut any = false;
            for line in r.iter() {
                any = true;
                print!("{line}");
                if !line.ends_with('\n') {
                    println!();
                }
            }
            if any {
                0
            } else {
                1
            }
        }
    }
}
