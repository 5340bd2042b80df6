//! The preprocessor (C9): chunks a source file into a companion file plus a
//! [`MetaFile`](crate::meta), splitting on line boundaries near a target
//! chunk size and optionally compressing each chunk. Offline and
//! single-producer, so unlike [`crate::processor::NewLineIndexer`] it folds
//! its running line count in directly rather than through an
//! [`crate::processor::barrier::OrderedBarrier`].

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::chunk::ChunkMeta;
use crate::codec;
use crate::codec::LZ4_MAX_CHUNK_SIZE;
use crate::config::PreprocessOptions;
use crate::diagnostic;
use crate::diagnostics::Level;
use crate::error::{Error, Result};
use crate::meta::{Compression, MetaWriter};
use crate::processor::newline::scan_anchors;

/// Summary returned on a successful run, for the `xprep` CLI's final line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub chunks_written: u64,
    pub original_bytes: u64,
    pub actual_bytes: u64,
}

/// Default companion-file path when `options.out` is unset: the source path
/// with a `.xdat` extension appended.
fn default_out_path(src: &std::path::Path) -> PathBuf {
    let mut name = src.as_os_str().to_owned();
    name.push(".xdat");
    PathBuf::from(name)
}

/// LZ4's block format frames sizes as a signed 32-bit int; a chunk larger
/// than `INT_MAX` cannot be compressed as one block. Per §9 Open Question 2,
/// rather than fail outright we clamp `min_chunk_size` down so no buffer can
/// reach that size, with a one-time diagnostic (this is a single sequential
/// run, so a local flag suffices — there is no concurrent writer to race).
fn effective_min_chunk_size(options: &PreprocessOptions) -> usize {
    if options.compression != Compression::Lz4 {
        return options.min_chunk_size;
    }
    let max_buffer = options.min_chunk_size.saturating_add(options.max_oversize);
    if max_buffer <= LZ4_MAX_CHUNK_SIZE {
        return options.min_chunk_size;
    }
    let clamped = LZ4_MAX_CHUNK_SIZE.saturating_sub(options.max_oversize);
    diagnostic!(
        Level::Warn,
        "xprep: min_chunk_size + max_oversize ({max_buffer}) exceeds LZ4's INT_MAX framing \
         limit; clamping min_chunk_size to {clamped}"
    );
    clamped
}

/// Runs the preprocessor to completion, writing the companion file and the
/// metafile. On any error the metafile and companion file may be partially
/// written; callers must discard both rather than resume.
pub fn run(options: &PreprocessOptions) -> Result<PreprocessSummary> {
    let src_file = File::open(&options.src).map_err(|e| Error::io(options.src.clone(), e))?;
    let mut reader = BufReader::new(src_file);

    let out_path = options.out.clone().unwrap_or_else(|| default_out_path(&options.src));
    let out_file = File::create(&out_path).map_err(|e| Error::io(out_path.clone(), e))?;
    let mut writer = BufWriter::new(out_file);

    let meta_writer = MetaWriter::create(&options.meta, options.compression)?;

    let min_chunk_size = effective_min_chunk_size(options) as u64;
    let max_oversize = options.max_oversize as u64;

    let mut chunk_index = 0u64;
    let mut original_offset = 0u64;
    let mut actual_offset = 0u64;
    let mut line_base = 0u64;
    let mut buffer: Vec<u8> = Vec::new();
    let mut summary = PreprocessSummary::default();

    loop {
        buffer.clear();
        loop {
            let n = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|e| Error::io(options.src.clone(), e))?;
            if n == 0 || buffer.len() as u64 >= min_chunk_size {
                break;
            }
        }
        if buffer.is_empty() {
            break;
        }
        if buffer.len() as u64 > min_chunk_size + max_oversize {
            return Err(Error::Overflow {
                chunk_index,
                have: buffer.len(),
                limit: (min_chunk_size + max_oversize) as usize,
            });
        }

        let original_size = buffer.len() as u64;
        let (mut anchors, local_lines) = scan_anchors(&buffer, original_offset, options.anchor_distance);
        for (_, line) in anchors.iter_mut() {
            *line += line_base;
        }
        line_base += local_lines;

        let encoded = codec::compress(&buffer, options.compression, options.level)?;
        writer
            .write_all(&encoded)
            .map_err(|e| Error::io(out_path.clone(), e))?;
        let actual_size = encoded.len() as u64;

        meta_writer.write_chunk_meta(&ChunkMeta {
            chunk_index,
            original_offset,
            original_size,
            actual_offset,
            actual_size,
            line_mapping: anchors,
        })?;

        summary.chunks_written += 1;
        summary.original_bytes += original_size;
        summary.actual_bytes += actual_size;

        original_offset += original_size;
        actual_offset += actual_size;
        chunk_index += 1;
    }

    writer.flush().map_err(|e| Error::io(out_path.clone(), e))?;
    meta_writer.flush()?;
    Ok(summary)
}

/// Multithreaded preprocessing (§5 "Preprocessor parallelism"): the line
/// buffering and anchor scan stay single-threaded (they are cheap and the
/// reader is inherently sequential), but each chunk's compression is handed
/// to a [`crate::threadpool::TPool`] job. Jobs race to compress, then
/// serialize on an [`crate::processor::barrier::OrderedBarrier`] keyed on
/// `chunk_index` — the same ordering primitive [`crate::processor::compression::Compressor`]
/// uses at search time — so the companion file and metafile still end up
/// written in strictly ascending chunk order despite out-of-order
/// compression completion. Requires the `multithread` feature; the
/// positioned-write companion-file commit uses `pwrite`, so this is
/// currently unix-only.
#[cfg(all(feature = "multithread", unix))]
pub fn run_multithread(options: &PreprocessOptions, num_threads: usize) -> Result<PreprocessSummary> {
    use std::os::unix::fs::FileExt;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::processor::barrier::OrderedBarrier;
    use crate::threadpool::TPool;

    let src_file = File::open(&options.src).map_err(|e| Error::io(options.src.clone(), e))?;
    let mut reader = BufReader::new(src_file);

    let out_path = options.out.clone().unwrap_or_else(|| default_out_path(&options.src));
    let out_file = Arc::new(File::create(&out_path).map_err(|e| Error::io(out_path.clone(), e))?);

    let meta_writer = Arc::new(MetaWriter::create(&options.meta, options.compression)?);

    let min_chunk_size = effective_min_chunk_size(options) as u64;
    let max_oversize = options.max_oversize as u64;

    let pool = TPool::new(num_threads.max(1), num_threads.max(1) * 2)
        .ok_or_else(|| Error::compression("lz4", "failed to start preprocessor thread pool"))?;
    let barrier = Arc::new(OrderedBarrier::new());
    let running_offset = Arc::new(AtomicU64::new(0));
    let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
    let summary = Arc::new(Mutex::new(PreprocessSummary::default()));

    let mut chunk_index = 0u64;
    let mut original_offset = 0u64;
    let mut line_base = 0u64;
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        buffer.clear();
        loop {
            let n = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|e| Error::io(options.src.clone(), e))?;
            if n == 0 || buffer.len() as u64 >= min_chunk_size {
                break;
            }
        }
        if buffer.is_empty() {
            break;
        }
        if buffer.len() as u64 > min_chunk_size + max_oversize {
            return Err(Error::Overflow {
                chunk_index,
                have: buffer.len(),
                limit: (min_chunk_size + max_oversize) as usize,
            });
        }

        let original_size = buffer.len() as u64;
        let (mut anchors, local_lines) = scan_anchors(&buffer, original_offset, options.anchor_distance);
        for (_, line) in anchors.iter_mut() {
            *line += line_base;
        }
        line_base += local_lines;

        let job_buffer = std::mem::take(&mut buffer);
        let compression = options.compression;
        let level = options.level;
        let out_file = Arc::clone(&out_file);
        let job_out_path = out_path.clone();
        let meta_writer = Arc::clone(&meta_writer);
        let barrier = Arc::clone(&barrier);
        let running_offset = Arc::clone(&running_offset);
        let first_error = Arc::clone(&first_error);
        let summary = Arc::clone(&summary);

        pool.submit_job(Box::new(move || {
            let encoded = match codec::compress(&job_buffer, compression, level) {
                Ok(e) => e,
                Err(e) => {
                    barrier.wait_until(chunk_index);
                    first_error.lock().expect("preprocess error mutex poisoned").get_or_insert(e);
                    barrier.advance();
                    return;
                }
            };
            let actual_size = encoded.len() as u64;

            barrier.wait_until(chunk_index);
            let actual_offset = running_offset.load(Ordering::SeqCst);
            running_offset.store(actual_offset + actual_size, Ordering::SeqCst);

            if let Err(e) = out_file.write_all_at(&encoded, actual_offset).map_err(|e| Error::io(job_out_path.clone(), e)) {
                first_error.lock().expect("preprocess error mutex poisoned").get_or_insert(e);
                barrier.advance();
                return;
            }
            let meta = ChunkMeta {
                chunk_index,
                original_offset,
                original_size,
                actual_offset,
                actual_size,
                line_mapping: anchors,
            };
            if let Err(e) = meta_writer.write_chunk_meta(&meta) {
                first_error.lock().expect("preprocess error mutex poisoned").get_or_insert(e);
                barrier.advance();
                return;
            }
            let mut s = summary.lock().expect("preprocess summary mutex poisoned");
            s.chunks_written += 1;
            s.original_bytes += original_size;
            s.actual_bytes += actual_size;
            barrier.advance();
        }));

        original_offset += original_size;
        chunk_index += 1;
    }

    pool.jobs_completed();
    meta_writer.flush()?;

    if let Some(e) = first_error.lock().expect("preprocess error mutex poisoned").take() {
        return Err(e);
    }
    Ok(*summary.lock().expect("preprocess summary mutex poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaReader;
    use tempfile::tempdir;

    fn write_src(dir: &std::path::Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn splits_on_line_boundaries_near_target_size() {
        let dir = tempdir().unwrap();
        let lines: Vec<u8> = (0..50).flat_map(|i| format!("line-{i}\n").into_bytes()).collect();
        let src = write_src(dir.path(), "src.txt", &lines);
        let mut options = PreprocessOptions::new(src.clone(), dir.path().join("meta.bin"));
        options.out = Some(dir.path().join("out.dat"));
        options.min_chunk_size = 64;
        options.max_oversize = 64;

        let summary = run(&options).unwrap();
        assert!(summary.chunks_written > 1);
        assert_eq!(summary.original_bytes, lines.len() as u64);

        // Every chunk must end exactly on a line boundary (or at EOF).
        let reader = MetaReader::open(&options.meta).unwrap();
        let mut total = 0u64;
        while let Some(m) = reader.next().unwrap() {
            let end = m.original_offset + m.original_size;
            assert!(end == lines.len() as u64 || lines[(end - 1) as usize] == b'\n');
            total += m.original_size;
        }
        assert_eq!(total, lines.len() as u64);
    }

    #[test]
    fn round_trip_reproduces_original_bytes_lz4() {
        let dir = tempdir().unwrap();
        let contents: Vec<u8> = (0..500).flat_map(|i| format!("row {i} of data\n").into_bytes()).collect();
        let src = write_src(dir.path(), "src.txt", &contents);
        let mut options = PreprocessOptions::new(src, dir.path().join("meta.bin"));
        options.out = Some(dir.path().join("out.dat"));
        options.compression = Compression::Lz4;
        options.min_chunk_size = 512;
        options.max_oversize = 256;

        run(&options).unwrap();

        let reader = MetaReader::open(&options.meta).unwrap();
        let mut rebuilt = Vec::new();
        let compressed = std::fs::read(options.out.unwrap()).unwrap();
        while let Some(m) = reader.next().unwrap() {
            let slice = &compressed[m.actual_offset as usize..(m.actual_offset + m.actual_size) as usize];
            let decoded = codec::decompress(slice, reader.compression, m.original_size as usize).unwrap();
            rebuilt.extend_from_slice(&decoded);
        }
        assert_eq!(rebuilt, contents);
    }

    #[test]
    fn oversized_line_without_break_is_overflow_error() {
        let dir = tempdir().unwrap();
        let mut contents = vec![b'a'; 50];
        contents.push(b'\n');
        contents.extend(std::iter::repeat(b'b').take(200));
        let src = write_src(dir.path(), "src.txt", &contents);
        let mut options = PreprocessOptions::new(src, dir.path().join("meta.bin"));
        options.out = Some(dir.path().join("out.dat"));
        options.min_chunk_size = 50;
        options.max_oversize = 5;

        let err = run(&options).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
    }

    #[test]
    fn anchors_carry_running_line_base_across_chunks() {
        let dir = tempdir().unwrap();
        let lines: Vec<u8> = (0..20).flat_map(|i| format!("l{i}\n").into_bytes()).collect();
        let src = write_src(dir.path(), "src.txt", &lines);
        let mut options = PreprocessOptions::new(src, dir.path().join("meta.bin"));
        options.out = Some(dir.path().join("out.dat"));
        options.min_chunk_size = 20;
        options.max_oversize = 20;
        options.anchor_distance = 1;

        run(&options).unwrap();

        let reader = MetaReader::open(&options.meta).unwrap();
        let mut last_line = None;
        while let Some(m) = reader.next().unwrap() {
            if let Some((_, first_line)) = m.line_mapping.first() {
                if let Some(last) = last_line {
                    assert!(*first_line > last, "line anchors must strictly advance across chunks");
                }
            }
            last_line = m.line_mapping.last().map(|&(_, l)| l);
        }
    }

    #[test]
    fn default_out_path_appends_xdat_extension() {
        let dir = tempdir().unwrap();
        let src = write_src(dir.path(), "src.txt", b"a\n");
        let mut options = PreprocessOptions::new(src.clone(), dir.path().join("meta.bin"));
        options.min_chunk_size = 1;
        run(&options).unwrap();
        assert!(default_out_path(&src).exists());
    }

    #[cfg(all(feature = "multithread", unix))]
    #[test]
    fn multithreaded_run_matches_single_threaded_round_trip() {
        let dir = tempdir().unwrap();
        let contents: Vec<u8> = (0..2000).flat_map(|i| format!("row {i} of data\n").into_bytes()).collect();
        let src = write_src(dir.path(), "src.txt", &contents);
        let mut options = PreprocessOptions::new(src, dir.path().join("meta.bin"));
        options.out = Some(dir.path().join("out.dat"));
        options.compression = Compression::Lz4;
        options.min_chunk_size = 256;
        options.max_oversize = 128;

        let summary = run_multithread(&options, 4).unwrap();
        assert_eq!(summary.original_bytes, contents.len() as u64);

        let reader = MetaReader::open(&options.meta).unwrap();
        let mut records = Vec::new();
        while let Some(m) = reader.next().unwrap() {
            records.push(m);
        }
        // chunk_index must be dense and ascending even though jobs completed
        // out of order; the ordered barrier is what guarantees this.
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.chunk_index, i as u64);
        }
        for w in records.windows(2) {
            assert_eq!(w[0].original_offset + w[0].original_size, w[1].original_offset);
            assert_eq!(w[0].actual_offset + w[0].actual_size, w[1].actual_offset);
        }

        let compressed = std::fs::read(options.out.unwrap()).unwrap();
        let mut rebuilt = Vec::new();
        for m in &records {
            let slice = &compressed[m.actual_offset as usize..(m.actual_offset + m.actual_size) as usize];
            let decoded = codec::decompress(slice, reader.compression, m.original_size as usize).unwrap();
            rebuilt.extend_from_slice(&decoded);
        }
        assert_eq!(rebuilt, contents);
    }
}
