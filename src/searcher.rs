//! The searcher (ReturnProcessor / C6): turns a chunk into a typed
//! [`PartialResult`], plus the byte-offset-to-line-index map (§4.7) that
//! backs `LineIndices` mode.

use regex::bytes::{Regex, RegexBuilder};

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::result::PartialResult;
use crate::simd::find_substr;

/// Which shape of partial result a [`Searcher`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    CountMatches,
    CountLines,
    MatchOffsets,
    LineOffsets,
    LineIndices,
    Lines,
}

enum Matcher {
    /// Case-sensitive literal, or a pre-lowercased literal paired with a
    /// pipeline that lowercases chunk data via [`crate::processor::AsciiToLower`].
    Literal(Vec<u8>),
    Regex(Box<Regex>),
}

/// Parameters are fixed at construction; see §4.6's pattern-preparation
/// rules for how `regex`/`ignore_case`/`utf8` pick a [`Matcher`].
pub struct Searcher {
    matcher: Matcher,
    mode: SearchMode,
}

impl Searcher {
    /// `regex` → compile the regex as given, case-insensitive per
    /// `ignore_case`. Non-regex with `utf8 && ignore_case` → escape the
    /// literal and delegate Unicode case folding to the regex engine.
    /// Non-regex with `ignore_case` only (the ASCII fast path) → lowercase
    /// the pattern here; the caller is expected to run
    /// [`crate::processor::AsciiToLower`] ahead of this stage so chunk data
    /// is lowercased too. Otherwise → a plain literal SIMD search.
    pub fn new(pattern: &str, regex: bool, ignore_case: bool, utf8: bool, mode: SearchMode) -> Result<Searcher> {
        let matcher = if regex {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|e| Error::contract(format!("invalid regex {pattern:?}: {e}")))?;
            Matcher::Regex(Box::new(re))
        } else if ignore_case && utf8 {
            let escaped = regex::escape(pattern);
            let re = RegexBuilder::new(&escaped)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::contract(format!("invalid escaped literal {pattern:?}: {e}")))?;
            Matcher::Regex(Box::new(re))
        } else if ignore_case {
            Matcher::Literal(pattern.as_bytes().to_ascii_lowercase())
        } else {
            Matcher::Literal(pattern.as_bytes().to_vec())
        };
        Ok(Searcher { matcher, mode })
    }

    fn find_at(&self, data: &[u8], pos: usize) -> Option<(usize, usize)> {
        if pos > data.len() {
            return None;
        }
        match &self.matcher {
            Matcher::Literal(needle) => {
                if needle.is_empty() {
                    return None;
                }
                find_substr(&data[pos..], needle).map(|i| (pos + i, pos + i + needle.len()))
            }
            Matcher::Regex(re) => re.find_at(data, pos).map(|m| (m.start(), m.end())),
        }
    }

    /// Runs this searcher against one chunk, producing the [`PartialResult`]
    /// shape that matches `self.mode`.
    pub fn process(&self, chunk: &Chunk) -> Result<PartialResult> {
        let data = chunk.as_slice();
        let base = chunk.meta.original_offset;

        match self.mode {
            SearchMode::CountMatches | SearchMode::MatchOffsets => {
                let mut offsets = Vec::new();
                let mut pos = 0usize;
                while let Some((start, end)) = self.find_at(data, pos) {
                    offsets.push(base + start as u64);
                    pos = if end > start { end } else { start + 1 };
                }
                Ok(match self.mode {
                    SearchMode::CountMatches => PartialResult::Count(offsets.len() as u64),
                    _ => PartialResult::MatchByteOffsets(offsets),
                })
            }
            SearchMode::CountLines | SearchMode::LineOffsets | SearchMode::Lines => {
                let spans = self.line_spans(data)?;
                Ok(match self.mode {
                    SearchMode::CountLines => PartialResult::Count(spans.len() as u64),
                    SearchMode::LineOffsets => {
                        PartialResult::LineByteOffsets(spans.iter().map(|&(s, _)| base + s as u64).collect())
                    }
                    SearchMode::Lines => PartialResult::Lines(
                        spans
                            .iter()
                            .map(|&(s, e)| String::from_utf8_lossy(&data[s..e]).into_owned())
                            .collect(),
                    ),
                    _ => unreachable!(),
                })
            }
            SearchMode::LineIndices => {
                let spans = self.line_spans(data)?;
                if !spans.is_empty() && chunk.meta.line_mapping.is_empty() {
                    return Err(Error::contract(format!(
                        "chunk {} has matching lines but no line_mapping anchors",
                        chunk.meta.chunk_index
                    )));
                }
                let locals: Vec<u64> = spans.iter().map(|&(s, _)| s as u64).collect();
                let indices = map_offsets_to_line_indices(data, base, &chunk.meta.line_mapping, &locals);
                Ok(PartialResult::LineIndices(indices))
            }
        }
    }

    /// Finds every line that contains at least one match, returning each as
    /// a chunk-local `[line_start, line_end)` span (`line_end` includes the
    /// trailing `\n`, or is `data.len()` at EOF without one). A line with
    /// several matches is reported once: once a match is found, the cursor
    /// jumps past the line's `\n` before resuming the scan.
    fn line_spans(&self, data: &[u8]) -> Result<Vec<(usize, usize)>> {
        let mut spans = Vec::new();
        let mut pos = 0usize;
        while let Some((start, end)) = self.find_at(data, pos) {
            let line_start = data[..start].iter().rposition(|&b| b == b'\n').map(|p| p + 1).unwrap_or(0);

            let line_end = match crate::simd::find_char(&data[end..], b'\n') {
                Some(rel) => end + rel + 1,
                None => data.len(),
            };
            spans.push((line_start, line_end));
            pos = line_end;
            if pos >= data.len() {
                break;
            }
        }
        Ok(spans)
    }
}

/// Maps ascending chunk-local byte offsets to global zero-based line
/// indices using the chunk's `line_mapping` anchors, per §4.7: keep a
/// monotonically-advancing anchor cursor across the (ascending) target
/// list, then count newlines between the current anchor and each target.
pub fn map_offsets_to_line_indices(data: &[u8], original_offset: u64, anchors: &[(u64, u64)], targets_local: &[u64]) -> Vec<u64> {
    if anchors.is_empty() {
        return Vec::new();
    }
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(targets_local.len());
    for &b in targets_local {
        let target_global = original_offset + b;
        while cursor + 1 < anchors.len() && anchors[cursor + 1].0 <= target_global {
            cursor += 1;
        }
        let (anchor_global, anchor_line) = anchors[cursor];
        let anchor_local = (anchor_global - original_offset) as usize;
        let b_usize = b as usize;
        let mut line = anchor_line;
        if anchor_local <= b_usize {
            for &byte in &data[anchor_local..b_usize] {
                if byte == b'\n' {
                    line += 1;
                }
            }
        } else {
            for &byte in &data[b_usize..anchor_local] {
                if byte == b'\n' {
                    line -= 1;
                }
            }
        }
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMeta;

    fn chunk(data: &[u8], offset: u64) -> Chunk {
        Chunk::from_vec(data.to_vec(), ChunkMeta::uncompressed(0, offset, data.len() as u64))
    }

    #[test]
    fn count_matches_literal() {
        let s = Searcher::new("over", false, false, true, SearchMode::CountMatches).unwrap();
        let c = chunk(b"over and over, moreover", 0);
        assert_eq!(s.process(&c).unwrap(), PartialResult::Count(3));
    }

    #[test]
    fn match_offsets_are_global() {
        let s = Searcher::new("ab", false, false, true, SearchMode::MatchOffsets).unwrap();
        let c = chunk(b"xxabxxab", 100);
        match s.process(&c).unwrap() {
            PartialResult::MatchByteOffsets(v) => assert_eq!(v, vec![102, 106]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_offsets_dedupe_multiple_matches_per_line() {
        let s = Searcher::new("a", false, false, true, SearchMode::LineOffsets).unwrap();
        let c = chunk(b"aa\nb\na\n", 0);
        match s.process(&c).unwrap() {
            PartialResult::LineByteOffsets(v) => assert_eq!(v, vec![0, 5]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lines_mode_extracts_newline_terminated_lines() {
        let s = Searcher::new("b", false, false, true, SearchMode::Lines).unwrap();
        let c = chunk(b"aa\nbb\ncc\n", 0);
        match s.process(&c).unwrap() {
            PartialResult::Lines(v) => assert_eq!(v, vec!["bb\n".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ignore_case_ascii_assumes_pre_lowercased_data() {
        let s = Searcher::new("OVER", false, true, false, SearchMode::CountMatches).unwrap();
        let c = chunk(b"lowercased over text", 0); // pipeline would have lowercased this already
        assert_eq!(s.process(&c).unwrap(), PartialResult::Count(1));
    }

    #[test]
    fn regex_mode_matches_alternation() {
        let s = Searcher::new("ov[e|i]r", true, false, true, SearchMode::CountMatches).unwrap();
        let c = chunk(b"over and ovir and ovwr", 0);
        assert_eq!(s.process(&c).unwrap(), PartialResult::Count(2));
    }

    #[test]
    fn line_indices_uses_anchor_mapping() {
        let s = Searcher::new("x", false, false, true, SearchMode::LineIndices).unwrap();
        let data = b"a\nb\nx\nc\n";
        let mut c = chunk(data, 0);
        c.meta.line_mapping = vec![(0, 10)]; // chunk starts at global line 10
        match s.process(&c).unwrap() {
            PartialResult::LineIndices(v) => assert_eq!(v, vec![12]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_indices_without_mapping_is_contract_error() {
        let s = Searcher::new("x", false, false, true, SearchMode::LineIndices).unwrap();
        let c = chunk(b"x\n", 0);
        let err = s.process(&c).unwrap_err();
        assert!(matches!(err, Error::Contract { .. }));
    }

    #[test]
    fn map_offsets_to_line_indices_matches_naive_count() {
        let data = b"one\ntwo\nthree\nfour\nfive\n";
        let anchors = vec![(0u64, 100u64)];
        let targets: Vec<u64> = vec![0, 4, 8, 14, 19];
        let got = map_offsets_to_line_indices(data, 0, &anchors, &targets);
        let naive: Vec<u64> = targets
            .iter()
            .map(|&b| 100 + data[..b as usize].iter().filter(|&&c| c == b'\n').count() as u64)
            .collect();
        assert_eq!(got, naive);
    }
}
