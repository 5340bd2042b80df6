//! `xprep` — the offline preprocessing CLI front end over C9 (§6).

use std::process::ExitCode;

use clap::Parser;

use xsearch::cli::{self, XprepArgs};
use xsearch::diagnostics::Level;
use xsearch::{diagnostic, preprocess};

fn main() -> ExitCode {
    let args = match XprepArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.exit_code() == 0 { 0 } else { 1 });
        }
    };
    cli::apply_verbosity(args.quiet, args.verbose);

    let options = cli::build_preprocess_options(&args);
    let result = run_preprocess(&args, &options);
    match result {
        Ok(summary) => {
            diagnostic!(
                Level::Warn,
                "xprep: wrote {} chunks, {} bytes -> {} bytes",
                summary.chunks_written,
                summary.original_bytes,
                summary.actual_bytes
            );
            ExitCode::from(0)
        }
        Err(e) => ExitCode::from(cli::report_error("xprep", &e) as u8),
    }
}

#[cfg(all(feature = "multithread", unix))]
fn run_preprocess(args: &XprepArgs, options: &xsearch::config::PreprocessOptions) -> xsearch::error::Result<preprocess::PreprocessSummary> {
    match args.threads {
        Some(n) if n > 1 => preprocess::run_multithread(options, n),
        _ => preprocess::run(options),
    }
}

#[cfg(not(all(feature = "multithread", unix)))]
fn run_preprocess(_args: &XprepArgs, options: &xsearch::config::PreprocessOptions) -> xsearch::error::Result<preprocess::PreprocessSummary> {
    preprocess::run(options)
}
