//! One-shot per-chunk compress/decompress, dispatched on [`Compression`].
//!
//! LZ4 reuses the block-format engine's own one-shot `compress_default` /
//! `decompress_safe` functions directly — no new LZ4 dependency is needed.
//! Zstandard goes through the external `zstd` crate's simple buffer API.

use crate::block::compress::compress_bound;
use crate::error::{Error, Result};
use crate::meta::Compression;

/// LZ4's block format encodes sizes as a signed 32-bit int; a chunk whose
/// compressed bound would overflow that cannot be compressed as one block.
pub const LZ4_MAX_CHUNK_SIZE: usize = i32::MAX as usize;

pub fn compress(data: &[u8], compression: Compression, level: i32) -> Result<Vec<u8>> {
    match compression {
        Compression::None | Compression::Unknown => Ok(data.to_vec()),
        Compression::Lz4 => {
            if data.len() > LZ4_MAX_CHUNK_SIZE {
                return Err(Error::compression(
                    "lz4",
                    format!("chunk of {} bytes exceeds LZ4's INT_MAX framing limit", data.len()),
                ));
            }
            let bound = compress_bound(data.len() as i32);
            if bound <= 0 {
                return Err(Error::compression("lz4", "input too large for LZ4 block format"));
            }
            let mut dst = vec![0u8; bound as usize];
            let written = crate::block::compress::compress_default(data, &mut dst)?;
            dst.truncate(written);
            Ok(dst)
        }
        Compression::Zstd => {
            zstd::encode_all(data, level).map_err(|e| Error::compression("zstd", e.to_string()))
        }
    }
}

pub fn decompress(data: &[u8], compression: Compression, original_size: usize) -> Result<Vec<u8>> {
    match compression {
        Compression::None | Compression::Unknown => Ok(data.to_vec()),
        Compression::Lz4 => {
            let mut dst = vec![0u8; original_size];
            let written = crate::block::decompress_api::decompress_safe(data, &mut dst)?;
            if written != original_size {
                return Err(Error::compression(
                    "lz4",
                    format!("decoded {written} bytes, expected {original_size}"),
                ));
            }
            Ok(dst)
        }
        Compression::Zstd => {
            let out = zstd::decode_all(data).map_err(|e| Error::compression("zstd", e.to_string()))?;
            if out.len() != original_size {
                return Err(Error::compression(
                    "zstd",
                    format!("decoded {} bytes, expected {original_size}", out.len()),
                ));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz4_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(&data, Compression::Lz4, 1).unwrap();
        let decompressed = decompress(&compressed, Compression::Lz4, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn zstd_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(&data, Compression::Zstd, 3).unwrap();
        let decompressed = decompress(&compressed, Compression::Zstd, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn none_is_identity() {
        let data = b"raw bytes".to_vec();
        let compressed = compress(&data, Compression::None, 0).unwrap();
        assert_eq!(compressed, data);
        let decompressed = decompress(&compressed, Compression::None, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }
}
