//! The compression/decompression `InplaceProcessor`s.
//!
//! Decompression is unordered: each chunk's `actual_size` at `actual_offset`
//! came straight from its own `ChunkMeta` record, so decoding one chunk never
//! depends on another having been decoded first. Compression (preprocessing)
//! is ordered: the compressed companion file is a flat concatenation with no
//! per-chunk framing of its own, so a chunk's `actual_offset` can only be
//! known once every earlier chunk's encoded size has been committed — hence
//! the [`super::barrier::OrderedBarrier`] keyed on `chunk_index`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::chunk::Chunk;
use crate::codec;
use crate::error::{Error, Result};
use crate::meta::Compression;

use super::barrier::OrderedBarrier;
use super::InplaceProcessor;

/// Unordered: decodes `chunk.as_slice()` (the on-disk, possibly-compressed
/// bytes) into a fresh buffer of `chunk.meta.original_size` bytes, then
/// folds `actual_*` back onto `original_*` since the chunk is now logically
/// uncompressed.
pub struct Decompressor {
    pub compression: Compression,
}

impl InplaceProcessor for Decompressor {
    fn process(&self, chunk: &mut Chunk) -> Result<()> {
        if self.compression == Compression::None || self.compression == Compression::Unknown {
            return Ok(());
        }
        let decoded = codec::decompress(
            chunk.as_slice(),
            self.compression,
            chunk.meta.original_size as usize,
        )
        .map_err(|e| match e {
            Error::Compression { codec, reason } => Error::Compression {
                codec,
                reason: format!("chunk {}: {reason}", chunk.meta.chunk_index),
            },
            other => other,
        })?;
        chunk.replace_owned(decoded);
        chunk.meta.actual_offset = chunk.meta.original_offset;
        chunk.meta.actual_size = chunk.meta.original_size;
        Ok(())
    }
}

/// Ordered: encodes the chunk, waits for its `chunk_index` to come up, then
/// claims the next slice of the flat companion file via `running_offset`.
pub struct Compressor {
    pub compression: Compression,
    pub level: i32,
    barrier: OrderedBarrier,
    running_offset: AtomicU64,
}

impl Compressor {
    pub fn new(compression: Compression, level: i32) -> Self {
        Compressor {
            compression,
            level,
            barrier: OrderedBarrier::new(),
            running_offset: AtomicU64::new(0),
        }
    }
}

impl InplaceProcessor for Compressor {
    fn process(&self, chunk: &mut Chunk) -> Result<()> {
        let original_offset = chunk.meta.original_offset;
        let original_size = chunk.meta.original_size;
        let encoded = codec::compress(chunk.as_slice(), self.compression, self.level)?;
        let encoded_size = encoded.len() as u64;

        self.barrier.wait_until(chunk.meta.chunk_index);
        let actual_offset = self.running_offset.load(Ordering::SeqCst);
        self.running_offset.store(actual_offset + encoded_size, Ordering::SeqCst);
        self.barrier.advance();

        chunk.meta.original_offset = original_offset;
        chunk.meta.original_size = original_size;
        chunk.meta.actual_offset = actual_offset;
        chunk.meta.actual_size = encoded_size;
        chunk.replace_owned(encoded);
        Ok(())
    }

    fn is_ordered(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMeta;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn decompressor_roundtrips_lz4_chunk() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = codec::compress(&data, Compression::Lz4, 1).unwrap();
        let meta = ChunkMeta {
            chunk_index: 0,
            original_offset: 0,
            original_size: data.len() as u64,
            actual_offset: 0,
            actual_size: compressed.len() as u64,
            line_mapping: Vec::new(),
        };
        let mut chunk = Chunk::from_vec(compressed, meta);
        Decompressor { compression: Compression::Lz4 }.process(&mut chunk).unwrap();
        assert_eq!(chunk.as_slice(), data.as_slice());
        assert_eq!(chunk.meta.actual_size, chunk.meta.original_size);
    }

    #[test]
    fn decompressor_none_is_noop() {
        let meta = ChunkMeta::uncompressed(0, 0, 4);
        let mut chunk = Chunk::from_vec(b"abcd".to_vec(), meta);
        Decompressor { compression: Compression::None }.process(&mut chunk).unwrap();
        assert_eq!(chunk.as_slice(), b"abcd");
    }

    #[test]
    fn compressor_assigns_offsets_in_chunk_index_order_under_reversed_arrival() {
        let compressor = Arc::new(Compressor::new(Compression::Lz4, 1));
        let results = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for idx in (0..4u64).rev() {
            let compressor = Arc::clone(&compressor);
            let results = Arc::clone(&results);
            handles.push(thread::spawn(move || {
                let meta = ChunkMeta::uncompressed(idx, idx * 10, 10);
                let mut chunk = Chunk::from_vec(vec![b'a'; 10], meta);
                compressor.process(&mut chunk).unwrap();
                results.lock().unwrap().push((idx, chunk.meta.actual_offset));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut got = results.lock().unwrap().clone();
        got.sort_by_key(|(idx, _)| *idx);
        // actual_offset must be strictly increasing with chunk_index.
        for w in got.windows(2) {
            assert!(w[0].1 < w[1].1);
        }
    }
}
