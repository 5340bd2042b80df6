//! The new-line indexer: builds each chunk's `line_mapping` anchors.
//!
//! Scanning for `\n` and recording local `(offset, line)` pairs is purely a
//! function of the chunk's own bytes and can run on any chunk as soon as it
//! arrives. Turning those *local* line indices into *global* ones cannot:
//! it needs the running total of newlines seen in every chunk before this
//! one, so that fold-in step is gated by [`super::barrier::OrderedBarrier`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::chunk::{Anchor, Chunk};
use crate::error::Result;
use crate::simd::find_char;

use super::barrier::OrderedBarrier;
use super::InplaceProcessor;

/// Ordered: records a `(global_byte_offset, global_line_index)` anchor at
/// the first byte of the chunk and again every time at least `distance`
/// bytes have elapsed since the previous anchor.
pub struct NewLineIndexer {
    distance: u64,
    barrier: OrderedBarrier,
    global_line_base: AtomicU64,
}

impl NewLineIndexer {
    pub fn new(distance: u64) -> Self {
        NewLineIndexer {
            distance: distance.max(1),
            barrier: OrderedBarrier::new(),
            global_line_base: AtomicU64::new(0),
        }
    }
}

/// Local scan over one chunk's bytes: anchors at chunk-relative line numbers
/// (0-based, as if this chunk started at global line 0), plus the number of
/// newlines found. Shared by [`NewLineIndexer::process`] (search-time,
/// ordered across workers) and the preprocessor (offline, already
/// sequential, so it folds in its own running line count directly).
pub fn scan_anchors(data: &[u8], base_offset: u64, distance: u64) -> (Vec<Anchor>, u64) {
    let distance = distance.max(1);
    let mut anchors: Vec<Anchor> = Vec::new();
    let mut local_line: u64 = 0;
    let mut last_anchor_at: i64 = -(distance as i64) - 1;
    if !data.is_empty() {
        anchors.push((base_offset, local_line));
        last_anchor_at = 0;
    }

    let mut pos = 0usize;
    while let Some(rel) = find_char(&data[pos..], b'\n') {
        let nl = pos + rel;
        local_line += 1;
        pos = nl + 1;
        if pos < data.len() && (pos as i64 - last_anchor_at) as u64 >= distance {
            anchors.push((base_offset + pos as u64, local_line));
            last_anchor_at = pos as i64;
        }
    }
    (anchors, local_line)
}

impl InplaceProcessor for NewLineIndexer {
    fn process(&self, chunk: &mut Chunk) -> Result<()> {
        let base_offset = chunk.meta.original_offset;
        let data = chunk.as_slice();

        let (mut anchors, local_line_count) = scan_anchors(data, base_offset, self.distance);

        self.barrier.wait_until(chunk.meta.chunk_index);
        let base_line = self.global_line_base.load(Ordering::SeqCst);
        for (_, line) in anchors.iter_mut() {
            *line += base_line;
        }
        self.global_line_base.store(base_line + local_line_count, Ordering::SeqCst);
        self.barrier.advance();

        chunk.meta.line_mapping = anchors;
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

    fn chunk_of(idx: u64, offset: u64, data: &[u8]) -> Chunk {
        let meta = ChunkMeta::uncompressed(idx, offset, data.len() as u64);
        Chunk::from_vec(data.to_vec(), meta)
    }

    #[test]
    fn first_anchor_is_chunk_start() {
        let indexer = NewLineIndexer::new(1 << 20);
        let mut chunk = chunk_of(0, 0, b"one\ntwo\nthree\n");
        indexer.process(&mut chunk).unwrap();
        assert_eq!(chunk.meta.line_mapping[0], (0, 0));
    }

    #[test]
    fn global_line_base_advances_across_chunks_in_order() {
        let indexer = NewLineIndexer::new(1 << 20);
        let mut c0 = chunk_of(0, 0, b"a\nb\nc\n"); // 3 lines
        indexer.process(&mut c0).unwrap();
        assert_eq!(c0.meta.line_mapping, vec![(0, 0)]);

        let mut c1 = chunk_of(1, 6, b"d\ne\n");
        indexer.process(&mut c1).unwrap();
        // c1 starts at global line 3 (after 3 newlines in c0).
        assert_eq!(c1.meta.line_mapping, vec![(6, 3)]);
    }

    #[test]
    fn anchors_spaced_by_distance() {
        let indexer = NewLineIndexer::new(4);
        let mut chunk = chunk_of(0, 0, b"a\nbb\nccc\ndddd\n");
        indexer.process(&mut chunk).unwrap();
        // An anchor at offset 0, then further anchors only after >=4 bytes
        // have elapsed since the previous one.
        assert_eq!(chunk.meta.line_mapping[0], (0, 0));
        for w in chunk.meta.line_mapping.windows(2) {
            assert!(w[1].0 - w[0].0 >= 4);
        }
    }

    #[test]
    fn empty_chunk_has_no_anchors() {
        let indexer = NewLineIndexer::new(1 << 20);
        let mut chunk = chunk_of(0, 0, b"");
        indexer.process(&mut chunk).unwrap();
        assert!(chunk.meta.line_mapping.is_empty());
    }
}
