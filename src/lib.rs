//! `xsearch` — an external, parallel, chunk-oriented text search engine.
//!
//! The pipeline, leaves-first:
//! - [`simd`] — vectorized byte-slice primitives (`find_char`, `find_substr`, `to_lower_ascii`).
//! - [`chunk`] — [`chunk::Chunk`] and [`chunk::ChunkMeta`], the unit of work that flows
//!   through the pipeline.
//! - [`meta`] — the side-car `MetaFile` codec.
//! - [`codec`] — one-shot per-chunk LZ4/Zstd compress/decompress.
//! - [`provider`] — the four [`provider::DataProvider`] variants.
//! - [`processor`] — the [`processor::InplaceProcessor`] stack: decompression,
//!   ASCII lowercasing, new-line indexing, compression.
//! - [`searcher`] — the [`searcher::Searcher`] ReturnProcessor and the byte-offset
//!   to line-index map.
//! - [`result`] — the thread-safe, optionally ordered result aggregate.
//! - [`executor`] — spawns workers and drives `read -> process -> search -> add`.
//! - [`preprocess`] — the offline chunker that produces a companion file plus metafile.
//!
//! [`config`] holds named defaults and the `SearchOptions`/`PreprocessOptions`
//! settings surfaces; [`error`] is the crate-wide error type; [`diagnostics`]
//! is leveled stderr output independent of search results on stdout.

pub mod block;
pub mod chunk;
pub mod cli;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod meta;
pub mod preprocess;
pub mod processor;
pub mod provider;
pub mod result;
pub mod searcher;
pub mod simd;
pub mod threadpool;

pub use chunk::{Chunk, ChunkMeta};
pub use config::{PreprocessOptions, SearchOptions};
pub use error::{Error, Result};
pub use executor::Executor;
pub use meta::Compression;
pub use result::PartialResult;
