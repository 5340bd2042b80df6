//! LZ4 block compression and decompression.
//!
//! This module contains the core LZ4 block-format engine, used here as the
//! one-shot codec backing [`crate::codec`]'s `Compression::Lz4` arm. The
//! streaming and HC variants the reference port also carried are not needed
//! by a per-chunk compress-once/decompress-once pipeline and were dropped.

pub mod compress;
pub mod decompress_api;
pub mod decompress_core;
pub mod types;

// Re-export the items codec.rs and error.rs actually consume.
pub use compress::{compress_bound, compress_default, Lz4Error};
pub use decompress_api::{decompress_safe, BlockDecompressError};
