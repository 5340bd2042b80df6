//! The four [`DataProvider`] variants: meta-driven (pread or mmap) and
//! metaless/raw-block (pread or mmap). All four hand out `(Chunk,
//! chunk_index)` pairs in submission order and gate their actual I/O behind
//! a `max_readers`-permit semaphore so spinning disks never see more than
//! `max_readers` reads in flight at once.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use memmap2::MmapOptions;

use crate::chunk::{Chunk, ChunkMeta};
use crate::error::{Error, Result};
use crate::meta::MetaReader;

/// Produces `(Chunk, chunk_index)` pairs in submission order; returns `None`
/// at EOF. Implementations are safe to call `next()` on from multiple
/// worker threads concurrently.
pub trait DataProvider: Send + Sync {
    fn next(&self) -> Result<Option<(Chunk, u64)>>;
}

/// A counting semaphore built the same way [`crate::threadpool::TPool`]
/// builds its queue-slot semaphore: pre-fill a bounded channel with one
/// token per permit, `acquire` blocks on `recv`, `release` sends a token back.
struct ReadSemaphore {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ReadSemaphore {
    fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        let (tx, rx) = bounded(permits);
        for _ in 0..permits {
            tx.send(()).expect("freshly created channel cannot be full");
        }
        ReadSemaphore { tx, rx }
    }

    fn acquire(&self) -> ReadPermit<'_> {
        self.rx.recv().expect("semaphore channel disconnected");
        ReadPermit { sem: self }
    }
}

struct ReadPermit<'a> {
    sem: &'a ReadSemaphore,
}

impl Drop for ReadPermit<'_> {
    fn drop(&mut self) {
        let _ = self.sem.tx.send(());
    }
}

fn page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf(_SC_PAGESIZE) has no preconditions and always
        // returns a positive value on a real system.
        let v = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if v > 0 {
            return v as u64;
        }
    }
    4096
}

fn pread_exact(file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(buf, offset)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut pos = offset;
        let mut rest = buf;
        while !rest.is_empty() {
            let n = file.seek_read(rest, pos)?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
            }
            pos += n as u64;
            rest = &mut rest[n..];
        }
        Ok(())
    }
}

// ── (a) Meta-driven stream reader ───────────────────────────────────────────

/// Reads each chunk's bytes from `src` via a positioned read at its
/// `ChunkMeta`'s `actual_offset`/`actual_size`. The chunk inherits `meta`
/// verbatim, line-mapping anchors included.
pub struct MetaStreamProvider {
    path: PathBuf,
    file: File,
    meta: MetaReader,
    sem: ReadSemaphore,
}

impl MetaStreamProvider {
    pub fn open(src: impl AsRef<Path>, meta: MetaReader, max_readers: usize) -> Result<Self> {
        let path = src.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(path.clone(), e))?;
        Ok(MetaStreamProvider {
            path,
            file,
            meta,
            sem: ReadSemaphore::new(max_readers),
        })
    }
}

impl DataProvider for MetaStreamProvider {
    fn next(&self) -> Result<Option<(Chunk, u64)>> {
        let meta = match self.meta.next()? {
            Some(m) => m,
            None => return Ok(None),
        };
        let _permit = self.sem.acquire();
        let mut chunk = Chunk::new_owned(meta.actual_size as usize, meta.clone());
        if let Some(buf) = chunk.as_mut_slice() {
            pread_exact(&self.file, meta.actual_offset, buf)
                .map_err(|e| Error::io(self.path.clone(), e))?;
        }
        let idx = meta.chunk_index;
        Ok(Some((chunk, idx)))
    }
}

// ── (b) Meta-driven mapped reader ───────────────────────────────────────────

/// Same metadata flow as [`MetaStreamProvider`], but maps the page-aligned
/// window covering `[actual_offset, actual_offset + actual_size)` instead of
/// reading it into an owned buffer. Falls back to a positioned read when
/// `actual_size` is small or the mapping fails.
pub struct MetaMappedProvider {
    path: PathBuf,
    file: File,
    meta: MetaReader,
    sem: ReadSemaphore,
    mmap_min_size: usize,
}

impl MetaMappedProvider {
    pub fn open(
        src: impl AsRef<Path>,
        meta: MetaReader,
        max_readers: usize,
        mmap_min_size: usize,
    ) -> Result<Self> {
        let path = src.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(path.clone(), e))?;
        Ok(MetaMappedProvider {
            path,
            file,
            meta,
            sem: ReadSemaphore::new(max_readers),
            mmap_min_size,
        })
    }
}

impl DataProvider for MetaMappedProvider {
    fn next(&self) -> Result<Option<(Chunk, u64)>> {
        let meta = match self.meta.next()? {
            Some(m) => m,
            None => return Ok(None),
        };
        let _permit = self.sem.acquire();

        if (meta.actual_size as usize) < self.mmap_min_size {
            let mut chunk = Chunk::new_owned(meta.actual_size as usize, meta.clone());
            if let Some(buf) = chunk.as_mut_slice() {
                pread_exact(&self.file, meta.actual_offset, buf)
                    .map_err(|e| Error::io(self.path.clone(), e))?;
            }
            return Ok(Some((chunk, meta.chunk_index)));
        }

        let page = page_size();
        let page_offset = meta.actual_offset - (meta.actual_offset % page);
        let window_offset = (meta.actual_offset - page_offset) as usize;
        let map_len = window_offset + meta.actual_size as usize;

        let mapped = unsafe {
            MmapOptions::new()
                .offset(page_offset)
                .len(map_len)
                .map(&self.file)
        };
        match mapped {
            Ok(mmap) => {
                let idx = meta.chunk_index;
                let chunk = Chunk::from_mmap(mmap, window_offset, meta.actual_size as usize, meta);
                Ok(Some((chunk, idx)))
            }
            Err(_) => {
                let mut chunk = Chunk::new_owned(meta.actual_size as usize, meta.clone());
                if let Some(buf) = chunk.as_mut_slice() {
                    pread_exact(&self.file, meta.actual_offset, buf)
                        .map_err(|e| Error::io(self.path.clone(), e))?;
                }
                Ok(Some((chunk, meta.chunk_index)))
            }
        }
    }
}

// ── (c) Metaless block reader ────────────────────────────────────────────────

struct BlockCursorState {
    file: File,
    offset: u64,
    chunk_index: u64,
    eof: bool,
}

/// No side-car metadata: reads a target minimum of `min_size` bytes, then,
/// unless already at EOF or already ending on `\n`, grows the read
/// byte-by-byte up to `max_oversize` looking for a line boundary. Single
/// reader only — every call serializes on the cursor mutex, since the next
/// chunk's start depends on exactly where this one stopped.
pub struct BlockProvider {
    path: PathBuf,
    min_size: usize,
    max_oversize: usize,
    state: Mutex<BlockCursorState>,
}

impl BlockProvider {
    pub fn open(src: impl AsRef<Path>, min_size: usize, max_oversize: usize) -> Result<Self> {
        let path = src.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(path.clone(), e))?;
        Ok(BlockProvider {
            path,
            min_size,
            max_oversize,
            state: Mutex::new(BlockCursorState {
                file,
                offset: 0,
                chunk_index: 0,
                eof: false,
            }),
        })
    }
}

impl DataProvider for BlockProvider {
    fn next(&self) -> Result<Option<(Chunk, u64)>> {
        let mut state = self.state.lock().expect("block provider cursor poisoned");
        if state.eof {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.min_size];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = state
                .file
                .read(&mut buf[filled..])
                .map_err(|e| Error::io(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        let mut hit_eof = filled < self.min_size;
        if !hit_eof && buf.last() != Some(&b'\n') {
            let mut extra = 0usize;
            loop {
                if extra >= self.max_oversize {
                    return Err(Error::Overflow {
                        chunk_index: state.chunk_index,
                        have: buf.len(),
                        limit: self.min_size + self.max_oversize,
                    });
                }
                let mut byte = [0u8; 1];
                let n = state
                    .file
                    .read(&mut byte)
                    .map_err(|e| Error::io(self.path.clone(), e))?;
                if n == 0 {
                    hit_eof = true;
                    break;
                }
                buf.push(byte[0]);
                extra += 1;
                if byte[0] == b'\n' {
                    break;
                }
            }
        }

        if buf.is_empty() {
            state.eof = true;
            return Ok(None);
        }

        let original_offset = state.offset;
        let original_size = buf.len() as u64;
        let chunk_index = state.chunk_index;
        state.offset += original_size;
        state.chunk_index += 1;
        if hit_eof {
            state.eof = true;
        }
        drop(state);

        let meta = ChunkMeta::uncompressed(chunk_index, original_offset, original_size);
        Ok(Some((Chunk::from_vec(buf, meta), chunk_index)))
    }
}

// ── (d) Metaless mapped reader ───────────────────────────────────────────────

struct MappedCursorState {
    file: File,
    offset: u64,
    chunk_index: u64,
    eof: bool,
}

/// No side-car metadata, mapped variant: maps a page-aligned window of
/// `round_up(min_size + max_oversize, page_size)` bytes starting at the
/// current cursor, then scans forward from `min_size` for `\n` (or EOF) to
/// pick the chunk's end. Falls back to [`BlockProvider`]-style reads when
/// the mapping fails.
pub struct MappedBlockProvider {
    path: PathBuf,
    min_size: usize,
    max_oversize: usize,
    state: Mutex<MappedCursorState>,
}

impl MappedBlockProvider {
    pub fn open(src: impl AsRef<Path>, min_size: usize, max_oversize: usize) -> Result<Self> {
        let path = src.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(path.clone(), e))?;
        Ok(MappedBlockProvider {
            path,
            min_size,
            max_oversize,
            state: Mutex::new(MappedCursorState {
                file,
                offset: 0,
                chunk_index: 0,
                eof: false,
            }),
        })
    }

    fn fallback_read(&self, state: &mut MappedCursorState) -> Result<Option<(Chunk, u64)>> {
        state
            .file
            .seek(SeekFrom::Start(state.offset))
            .map_err(|e| Error::io(self.path.clone(), e))?;
        let mut buf = vec![0u8; self.min_size];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = state
                .file
                .read(&mut buf[filled..])
                .map_err(|e| Error::io(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        let mut hit_eof = filled < self.min_size;
        if !hit_eof && buf.last() != Some(&b'\n') {
            let mut extra = 0usize;
            loop {
                if extra >= self.max_oversize {
                    return Err(Error::Overflow {
                        chunk_index: state.chunk_index,
                        have: buf.len(),
                        limit: self.min_size + self.max_oversize,
                    });
                }
                let mut byte = [0u8; 1];
                let n = state
                    .file
                    .read(&mut byte)
                    .map_err(|e| Error::io(self.path.clone(), e))?;
                if n == 0 {
                    hit_eof = true;
                    break;
                }
                buf.push(byte[0]);
                extra += 1;
                if byte[0] == b'\n' {
                    break;
                }
            }
        }
        if buf.is_empty() {
            state.eof = true;
            return Ok(None);
        }
        let original_offset = state.offset;
        let original_size = buf.len() as u64;
        let chunk_index = state.chunk_index;
        state.offset += original_size;
        state.chunk_index += 1;
        if hit_eof {
            state.eof = true;
        }
        let meta = ChunkMeta::uncompressed(chunk_index, original_offset, original_size);
        Ok(Some((Chunk::from_vec(buf, meta), chunk_index)))
    }
}

impl DataProvider for MappedBlockProvider {
    fn next(&self) -> Result<Option<(Chunk, u64)>> {
        let mut state = self.state.lock().expect("mapped provider cursor poisoned");
        if state.eof {
            return Ok(None);
        }

        let page = page_size();
        let window = round_up(self.min_size + self.max_oversize, page as usize) as u64;
        let page_offset = state.offset - (state.offset % page);
        let in_page_start = (state.offset - page_offset) as usize;
        let want_len = in_page_start + window as usize;

        let mapped = unsafe { MmapOptions::new().offset(page_offset).len(want_len).map(&state.file) };
        let mmap = match mapped {
            Ok(m) => m,
            Err(_) => return self.fallback_read(&mut state),
        };

        let available = mmap.len() - in_page_start;
        let scan_from = in_page_start + self.min_size.min(available);
        let search_region = &mmap[scan_from..mmap.len().min(in_page_start + self.min_size + self.max_oversize)];

        let mut end_in_mmap;
        let mut hit_eof = false;
        if available <= self.min_size {
            // Not enough bytes left for a full min_size read: this is the final chunk.
            end_in_mmap = mmap.len();
            hit_eof = true;
        } else if let Some(rel) = crate::simd::find_char(search_region, b'\n') {
            end_in_mmap = scan_from + rel + 1;
        } else {
            return Err(Error::Overflow {
                chunk_index: state.chunk_index,
                have: search_region.len() + self.min_size,
                limit: self.min_size + self.max_oversize,
            });
        }
        if end_in_mmap >= mmap.len() {
            end_in_mmap = mmap.len();
            hit_eof = true;
        }

        let len = end_in_mmap - in_page_start;
        if len == 0 {
            state.eof = true;
            return Ok(None);
        }

        let original_offset = state.offset;
        let original_size = len as u64;
        let chunk_index = state.chunk_index;
        state.offset += original_size;
        state.chunk_index += 1;
        if hit_eof {
            state.eof = true;
        }
        drop(state);

        let meta = ChunkMeta::uncompressed(chunk_index, original_offset, original_size);
        Ok(Some((Chunk::from_mmap(mmap, in_page_start, len, meta), chunk_index)))
    }
}

fn round_up(n: usize, multiple: usize) -> usize {
    n.div_ceil(multiple) * multiple
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Compression, MetaWriter};
    use tempfile::NamedTempFile;

    fn write_file(contents: &[u8]) -> NamedTempFile {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), contents).unwrap();
        f
    }

    #[test]
    fn block_provider_walks_small_file_line_by_line() {
        let f = write_file(b"abcdefghij\nklmno\n");
        let provider = BlockProvider::open(f.path(), 5, 20).unwrap();
        let (c0, idx0) = provider.next().unwrap().unwrap();
        assert_eq!(idx0, 0);
        assert!(c0.as_slice().ends_with(b"\n"));
        let (c1, idx1) = provider.next().unwrap().unwrap();
        assert_eq!(idx1, 1);
        assert_eq!(c1.meta.original_offset, c0.meta.original_offset + c0.meta.original_size);
        assert!(provider.next().unwrap().is_none());
    }

    #[test]
    fn block_provider_overflow_when_no_newline_within_budget() {
        let mut data = vec![b'a'; 50];
        data.push(b'\n');
        data.extend(vec![b'b'; 200]);
        let f = write_file(&data);
        let provider = BlockProvider::open(f.path(), 50, 5).unwrap();
        let (c0, _) = provider.next().unwrap().unwrap();
        assert_eq!(c0.size(), 51);
        let err = provider.next().unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
    }

    #[test]
    fn meta_stream_provider_reads_chunk_verbatim() {
        let f = write_file(b"hello world\n");
        let meta_file = NamedTempFile::new().unwrap();
        let writer = MetaWriter::create(meta_file.path(), Compression::None).unwrap();
        writer.write_chunk_meta(&ChunkMeta::uncompressed(0, 0, 12)).unwrap();
        writer.flush().unwrap();

        let reader = MetaReader::open(meta_file.path()).unwrap();
        let provider = MetaStreamProvider::open(f.path(), reader, 2).unwrap();
        let (chunk, idx) = provider.next().unwrap().unwrap();
        assert_eq!(idx, 0);
        assert_eq!(chunk.as_slice(), b"hello world\n");
        assert!(provider.next().unwrap().is_none());
    }

    #[test]
    fn mapped_block_provider_matches_block_provider_on_small_file() {
        let data = b"What did you do?\n- Nothing?\n- Oh.\n".to_vec();
        let f = write_file(&data);
        let provider = MappedBlockProvider::open(f.path(), 10, 40).unwrap();
        let mut collected = Vec::new();
        while let Some((chunk, _)) = provider.next().unwrap() {
            collected.extend_from_slice(chunk.as_slice());
        }
        assert_eq!(collected, data);
    }
}
