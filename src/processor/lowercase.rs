//! Unordered in-place ASCII lowercasing, backed by [`crate::simd::to_lower_ascii`].

use crate::chunk::Chunk;
use crate::error::Result;
use crate::simd::to_lower_ascii;

use super::InplaceProcessor;

/// Lowercases a chunk's buffer in place so a case-insensitive literal search
/// can run as a plain literal SIMD scan against an already-lowercased
/// pattern, instead of paying for a regex engine.
pub struct AsciiToLower;

impl InplaceProcessor for AsciiToLower {
    fn process(&self, chunk: &mut Chunk) -> Result<()> {
        chunk.ensure_owned();
        if let Some(buf) = chunk.as_mut_slice() {
            to_lower_ascii(buf);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMeta;

    #[test]
    fn lowercases_mapped_chunk_in_place() {
        let meta = ChunkMeta::uncompressed(0, 0, 5);
        let mut chunk = Chunk::from_vec(b"HeLLo".to_vec(), meta);
        AsciiToLower.process(&mut chunk).unwrap();
        assert_eq!(chunk.as_slice(), b"hello");
    }

    #[test]
    fn is_unordered() {
        assert!(!AsciiToLower.is_ordered());
    }
}
