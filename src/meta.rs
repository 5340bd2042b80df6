//! The side-car `MetaFile`: a one-byte compression tag followed by a
//! sequence of binary `ChunkMeta` records, read sequentially at search time
//! and written append-only during preprocessing.
//!
//! Layout (little-endian), matching the external format in the search
//! engine's wire-format contract:
//! ```text
//! u8    compression_tag        // 0=Unknown 1=None 2=Zstd 3=Lz4
//! repeat until EOF:
//!   u64 original_offset
//!   u64 actual_offset
//!   u64 original_size
//!   u64 actual_size
//!   u64 mapping_len
//!   mapping_len × { u64 global_byte_offset; u64 global_line_index }
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::chunk::ChunkMeta;
use crate::config::METAFILE_READ_BUFFER_RECORDS;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    Unknown = 0,
    None = 1,
    Zstd = 2,
    Lz4 = 3,
}

impl Compression {
    pub fn from_tag(tag: u8) -> Option<Compression> {
        match tag {
            0 => Some(Compression::Unknown),
            1 => Some(Compression::None),
            2 => Some(Compression::Zstd),
            3 => Some(Compression::Lz4),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

fn read_u64<R: Read>(r: &mut R, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|e| Error::io(path.to_path_buf(), e))?;
    Ok(u64::from_le_bytes(buf))
}

fn write_u64<W: Write>(w: &mut W, v: u64, path: &Path) -> Result<()> {
    w.write_all(&v.to_le_bytes())
        .map_err(|e| Error::io(path.to_path_buf(), e))
}

/// Deserializes one `ChunkMeta` record (without its `chunk_index`, which the
/// reader assigns from the running count of records yielded). Returns
/// `Ok(None)` at a clean EOF before any field of the record was read.
fn read_record<R: Read>(r: &mut R, path: &Path) -> Result<Option<(u64, u64, u64, u64, Vec<(u64, u64)>)>> {
    let mut first = [0u8; 8];
    match r.read(&mut first) {
        Ok(0) => return Ok(None),
        Ok(n) if n < 8 => {
            r.read_exact(&mut first[n..])
                .map_err(|e| Error::io(path.to_path_buf(), e))?;
        }
        Ok(_) => {}
        Err(e) => return Err(Error::io(path.to_path_buf(), e)),
    }
    let original_offset = u64::from_le_bytes(first);
    let actual_offset = read_u64(r, path)?;
    let original_size = read_u64(r, path)?;
    let actual_size = read_u64(r, path)?;
    let mapping_len = read_u64(r, path)?;

    // A record claiming billions of anchors from a corrupt/truncated file
    // would otherwise drive an unbounded allocation before the read fails.
    const MAX_SANE_MAPPING_LEN: u64 = 1 << 32;
    if mapping_len > MAX_SANE_MAPPING_LEN {
        return Err(Error::format(
            path.to_path_buf(),
            format!("mapping_len {mapping_len} exceeds sane bound"),
        ));
    }

    let mut line_mapping = Vec::with_capacity(mapping_len as usize);
    for _ in 0..mapping_len {
        let byte_offset = read_u64(r, path)?;
        let line_index = read_u64(r, path)?;
        line_mapping.push((byte_offset, line_index));
    }
    Ok(Some((original_offset, actual_offset, original_size, actual_size, line_mapping)))
}

/// Append-only MetaFile writer. Serializes one record at a time under a
/// mutex so concurrent ordered compressors can each write their own chunk's
/// metadata without external synchronization.
pub struct MetaWriter {
    path: PathBuf,
    inner: Mutex<BufWriter<File>>,
}

impl MetaWriter {
    pub fn create(path: impl Into<PathBuf>, compression: Compression) -> Result<MetaWriter> {
        let path = path.into();
        let mut file = File::create(&path).map_err(|e| Error::io(path.clone(), e))?;
        file.write_all(&[compression.tag()])
            .map_err(|e| Error::io(path.clone(), e))?;
        Ok(MetaWriter {
            path: path.clone(),
            inner: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn write_chunk_meta(&self, meta: &ChunkMeta) -> Result<()> {
        let mut w = self.inner.lock().expect("metafile writer mutex poisoned");
        write_u64(&mut *w, meta.original_offset, &self.path)?;
        write_u64(&mut *w, meta.actual_offset, &self.path)?;
        write_u64(&mut *w, meta.original_size, &self.path)?;
        write_u64(&mut *w, meta.actual_size, &self.path)?;
        write_u64(&mut *w, meta.line_mapping.len() as u64, &self.path)?;
        for (byte_offset, line_index) in &meta.line_mapping {
            write_u64(&mut *w, *byte_offset, &self.path)?;
            write_u64(&mut *w, *line_index, &self.path)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.inner
            .lock()
            .expect("metafile writer mutex poisoned")
            .flush()
            .map_err(|e| Error::io(self.path.clone(), e))
    }
}

/// Sequential MetaFile reader. Buffers up to
/// [`METAFILE_READ_BUFFER_RECORDS`] decoded records in a bounded FIFO;
/// `next()` pops one, refilling from disk when the buffer runs dry, and
/// assigns `chunk_index` as the running count of records yielded so far.
pub struct MetaReader {
    path: PathBuf,
    pub compression: Compression,
    inner: Mutex<MetaReaderState>,
}

struct MetaReaderState {
    file: BufReader<File>,
    buffer: VecDeque<ChunkMeta>,
    next_chunk_index: u64,
    eof: bool,
}

impl MetaReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<MetaReader> {
        let path = path.into();
        let mut file = BufReader::new(File::open(&path).map_err(|e| Error::io(path.clone(), e))?);
        let mut tag = [0u8; 1];
        file.read_exact(&mut tag)
            .map_err(|e| Error::io(path.clone(), e))?;
        let compression = Compression::from_tag(tag[0])
            .ok_or_else(|| Error::format(path.clone(), format!("unknown compression tag {}", tag[0])))?;
        Ok(MetaReader {
            path: path.clone(),
            compression,
            inner: Mutex::new(MetaReaderState {
                file,
                buffer: VecDeque::new(),
                next_chunk_index: 0,
                eof: false,
            }),
        })
    }

    fn refill(&self, state: &mut MetaReaderState) -> Result<()> {
        while state.buffer.len() < METAFILE_READ_BUFFER_RECORDS && !state.eof {
            match read_record(&mut state.file, &self.path)? {
                None => {
                    state.eof = true;
                }
                Some((original_offset, actual_offset, original_size, actual_size, line_mapping)) => {
                    let meta = ChunkMeta {
                        chunk_index: state.next_chunk_index,
                        original_offset,
                        actual_offset,
                        original_size,
                        actual_size,
                        line_mapping,
                    };
                    state.next_chunk_index += 1;
                    state.buffer.push_back(meta);
                }
            }
        }
        Ok(())
    }

    /// Returns the next `ChunkMeta` in file order, or `None` at EOF.
    pub fn next(&self) -> Result<Option<ChunkMeta>> {
        let mut state = self.inner.lock().expect("metafile reader mutex poisoned");
        if state.buffer.is_empty() {
            self.refill(&mut state)?;
        }
        Ok(state.buffer.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_meta(idx: u64) -> ChunkMeta {
        ChunkMeta {
            chunk_index: idx,
            original_offset: idx * 100,
            actual_offset: idx * 90,
            original_size: 100,
            actual_size: 90,
            line_mapping: vec![(idx * 100 + 5, idx * 2), (idx * 100 + 50, idx * 2 + 1)],
        }
    }

    #[test]
    fn write_then_read_round_trips_records() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let writer = MetaWriter::create(&path, Compression::Lz4).unwrap();
        let records: Vec<ChunkMeta> = (0..5).map(sample_meta).collect();
        for r in &records {
            writer.write_chunk_meta(r).unwrap();
        }
        writer.flush().unwrap();

        let reader = MetaReader::open(&path).unwrap();
        assert_eq!(reader.compression, Compression::Lz4);
        let mut read_back = Vec::new();
        while let Some(m) = reader.next().unwrap() {
            read_back.push(m);
        }
        assert_eq!(read_back, records);
    }

    #[test]
    fn empty_mapping_len_is_valid() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let writer = MetaWriter::create(&path, Compression::None).unwrap();
        let meta = ChunkMeta::uncompressed(0, 0, 42);
        writer.write_chunk_meta(&meta).unwrap();
        writer.flush().unwrap();

        let reader = MetaReader::open(&path).unwrap();
        let got = reader.next().unwrap().unwrap();
        assert_eq!(got, meta);
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn chunk_index_assigned_by_running_count() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let writer = MetaWriter::create(&path, Compression::None).unwrap();
        for i in 0..3u64 {
            let mut m = sample_meta(i);
            m.chunk_index = 999; // writer does not persist chunk_index
            writer.write_chunk_meta(&m).unwrap();
        }
        writer.flush().unwrap();

        let reader = MetaReader::open(&path).unwrap();
        for expected in 0..3u64 {
            let got = reader.next().unwrap().unwrap();
            assert_eq!(got.chunk_index, expected);
        }
    }

    #[test]
    fn unknown_compression_tag_is_format_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [42u8]).unwrap();
        let err = MetaReader::open(file.path()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
