//! Per-chunk in-place transforms: decompression, ASCII lowercasing,
//! new-line indexing (search-time), and compression (preprocess-time).
//!
//! A processor consumes `&mut Chunk` and replaces its buffer and/or mutates
//! its meta. Unordered processors may run on chunks in any order; ordered
//! processors must observe `chunk_index` in ascending order and use
//! [`barrier::OrderedBarrier`] to enforce it.

pub mod barrier;
pub mod compression;
pub mod lowercase;
pub mod newline;

use crate::chunk::Chunk;
use crate::error::Result;

/// A stage that transforms a chunk's buffer or metadata in place without
/// producing a value of its own.
pub trait InplaceProcessor: Send + Sync {
    fn process(&self, chunk: &mut Chunk) -> Result<()>;

    /// `true` if this processor's side effects must land in ascending
    /// `chunk_index` order (see [`barrier::OrderedBarrier`]).
    fn is_ordered(&self) -> bool {
        false
    }
}

pub use compression::{Compressor, Decompressor};
pub use lowercase::AsciiToLower;
pub use newline::NewLineIndexer;
