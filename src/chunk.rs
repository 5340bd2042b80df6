//! [`Chunk`]: the owned-or-mapped byte buffer that flows through the
//! pipeline, and [`ChunkMeta`]: its offset/size/line-mapping descriptor.
//!
//! A chunk is a sum over two storage disciplines — an owned allocation it
//! frees on drop, or a memory-mapped view it unmaps on drop — behind one
//! type, so every pipeline stage can call `as_slice()` without caring which.

use memmap2::Mmap;

/// A `(global_byte_offset, global_line_index)` anchor, recorded every
/// `anchor_distance` bytes during preprocessing to bound offset-to-line
/// lookups to a local scan.
pub type Anchor = (u64, u64);

/// Per-chunk descriptor: where it lives in the logical and on-disk file,
/// and the line-mapping anchors that fall within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub chunk_index: u64,
    pub original_offset: u64,
    pub original_size: u64,
    pub actual_offset: u64,
    pub actual_size: u64,
    pub line_mapping: Vec<Anchor>,
}

impl ChunkMeta {
    pub fn uncompressed(chunk_index: u64, offset: u64, size: u64) -> Self {
        ChunkMeta {
            chunk_index,
            original_offset: offset,
            original_size: size,
            actual_offset: offset,
            actual_size: size,
            line_mapping: Vec::new(),
        }
    }
}

enum Storage {
    Owned(Vec<u8>),
    Mapped {
        mmap: Mmap,
        offset: usize,
        len: usize,
    },
}

/// An owned or memory-mapped contiguous byte buffer plus its [`ChunkMeta`].
pub struct Chunk {
    storage: Storage,
    pub meta: ChunkMeta,
}

impl Chunk {
    /// Allocates an uninitialized buffer of `size` bytes. Callers must
    /// overwrite the full buffer (e.g. via a `read_exact`) before any byte
    /// is observed; nothing here zero-fills.
    pub fn new_owned(size: usize, meta: ChunkMeta) -> Chunk {
        let mut data: Vec<u8> = Vec::with_capacity(size);
        #[allow(clippy::uninit_vec)]
        unsafe {
            data.set_len(size);
        }
        Chunk {
            storage: Storage::Owned(data),
            meta,
        }
    }

    /// Wraps an already-populated owned buffer.
    pub fn from_vec(data: Vec<u8>, meta: ChunkMeta) -> Chunk {
        Chunk {
            storage: Storage::Owned(data),
            meta,
        }
    }

    /// Takes ownership of a mapping; `offset`/`len` select the logically
    /// valid window within the page-aligned mapping.
    pub fn from_mmap(mmap: Mmap, offset: usize, len: usize, meta: ChunkMeta) -> Chunk {
        Chunk {
            storage: Storage::Mapped { mmap, offset, len },
            meta,
        }
    }

    /// Logical length — never the mapping's page-aligned length.
    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.len(),
            Storage::Mapped { len, .. } => *len,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped { .. })
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mapped { mmap, offset, len } => &mmap[*offset..*offset + *len],
        }
    }

    /// `None` when mapped — mapped views are read-only; call
    /// [`Chunk::ensure_owned`] first if in-place mutation is required.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Owned(v) => Some(v.as_mut_slice()),
            Storage::Mapped { .. } => None,
        }
    }

    /// Copies a mapped view into an owned buffer in place; a no-op if
    /// already owned. Used by processors (e.g. `AsciiToLower`) that mutate
    /// the buffer in place.
    pub fn ensure_owned(&mut self) {
        if let Storage::Mapped { mmap, offset, len } = &self.storage {
            let data = mmap[*offset..*offset + *len].to_vec();
            self.storage = Storage::Owned(data);
        }
    }

    /// Swaps in a freshly decoded buffer, discarding any prior storage
    /// (owned or mapped). Used by the decompression processors.
    pub fn replace_owned(&mut self, data: Vec<u8>) {
        self.storage = Storage::Owned(data);
    }

    /// Shrinks the logical size of an owned chunk without reallocating.
    /// A silent no-op on a mapped chunk, matching the mapped-buffer
    /// contract (mappings cannot be resized).
    pub fn resize(&mut self, n: usize) {
        if let Storage::Owned(v) = &mut self.storage {
            v.truncate(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_chunk_size_and_resize() {
        let meta = ChunkMeta::uncompressed(0, 0, 10);
        let mut chunk = Chunk::new_owned(10, meta);
        assert_eq!(chunk.size(), 10);
        assert!(!chunk.is_mapped());
        chunk.resize(4);
        assert_eq!(chunk.size(), 4);
    }

    #[test]
    fn from_vec_round_trips_contents() {
        let meta = ChunkMeta::uncompressed(1, 0, 3);
        let chunk = Chunk::from_vec(vec![1, 2, 3], meta);
        assert_eq!(chunk.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn ensure_owned_on_owned_chunk_is_noop() {
        let meta = ChunkMeta::uncompressed(0, 0, 3);
        let mut chunk = Chunk::from_vec(vec![9, 8, 7], meta);
        chunk.ensure_owned();
        assert_eq!(chunk.as_slice(), &[9, 8, 7]);
    }
}
