//! Boundary-aware text chunking.
//!
//! Two modes are provided:
//! - [`TextChunker::chunk`]: a sliding window of roughly `chunk_size`
//!   characters whose edges snap to paragraph breaks, then sentence ends, then
//!   word boundaries. Consecutive chunks overlap by at most `chunk_overlap`.
//! - [`TextChunker::chunk_by_paragraphs`]: greedy packing of whole paragraphs
//!   up to `chunk_size`.
//!
//! All sizes and offsets are in characters (Unicode scalar values) of the
//! trimmed input.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Chunk, Meta};

/// How far (in characters) the split search looks around the target.
const SPLIT_SEARCH_RADIUS: usize = 200;
/// Word-boundary fallback radius.
const WORD_SEARCH_RADIUS: usize = 50;
const PARAGRAPH_JOINER: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub respect_sentences: bool,
    pub respect_paragraphs: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            min_chunk_size: 100,
            respect_sentences: true,
            respect_paragraphs: true,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        // A minimum past the split search reach would drop every non-final slice.
        if self.min_chunk_size > self.chunk_size + SPLIT_SEARCH_RADIUS {
            return Err(Error::InvalidConfig(format!(
                "min_chunk_size ({}) exceeds chunk_size ({}) + {SPLIT_SEARCH_RADIUS}",
                self.min_chunk_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Inclusive range of positions a split point may land on.
#[derive(Debug, Clone, Copy)]
struct Window {
    lo: usize,
    hi: usize,
}

impl Window {
    fn admits(self, pos: usize) -> bool {
        self.lo <= pos && pos <= self.hi
    }
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Non-final slices shorter than `min_chunk_size` after trimming are
    /// dropped. The final slice is always emitted so trailing content is
    /// never lost.
    pub fn chunk(&self, text: &str, metadata: Option<&Meta>) -> Vec<Chunk> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = trimmed.chars().collect();
        let len = chars.len();
        let cfg = &self.config;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < len {
            let naive_end = start + cfg.chunk_size;
            let end = if naive_end >= len {
                len
            } else {
                self.find_split_point(&chars, naive_end, Window { lo: start + 1, hi: len })
            };
            let is_final = end >= len;

            let slice: String = chars[start..end].iter().collect();
            let piece = slice.trim();
            let piece_len = piece.chars().count();
            if piece_len > 0 && (is_final || piece_len >= cfg.min_chunk_size) {
                chunks.push(Chunk {
                    text: piece.to_string(),
                    index: chunks.len(),
                    start_char: start,
                    end_char: end,
                    metadata: with_method(metadata, "semantic"),
                });
            } else {
                debug!(start, end, piece_len, "dropping undersized chunk");
            }

            if is_final {
                break;
            }

            // The next window starts inside [end - overlap, end] so the overlap
            // bound holds and no content between chunks is skipped.
            let overlap_start = end.saturating_sub(cfg.chunk_overlap);
            start = if overlap_start <= start {
                end
            } else {
                self.find_split_point(&chars, overlap_start, Window { lo: overlap_start, hi: end })
            };
        }

        debug!("Created {} semantic chunks from {} chars", chunks.len(), len);
        chunks
    }

    /// Pack whole paragraphs into chunks of at most `chunk_size` characters.
    ///
    /// A paragraph that alone exceeds `chunk_size` becomes its own chunk.
    /// Every packed buffer, including the last one, must reach
    /// `min_chunk_size` to be emitted.
    pub fn chunk_by_paragraphs(&self, text: &str, metadata: Option<&Meta>) -> Vec<Chunk> {
        let chars: Vec<char> = text.trim().chars().collect();
        let cfg = &self.config;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut buffer: Option<Packed> = None;

        for (a, b) in paragraph_spans(&chars) {
            let para: String = chars[a..b].iter().collect();
            let para_len = b - a;
            match buffer.as_mut() {
                Some(cur) if cur.len + para_len + PARAGRAPH_JOINER.len() <= cfg.chunk_size => {
                    cur.text.push_str(PARAGRAPH_JOINER);
                    cur.text.push_str(&para);
                    cur.len += para_len + PARAGRAPH_JOINER.len();
                    cur.end = b;
                }
                _ => {
                    if let Some(done) = buffer.take() {
                        self.flush_packed(done, metadata, &mut chunks);
                    }
                    buffer = Some(Packed { text: para, len: para_len, start: a, end: b });
                }
            }
        }
        if let Some(done) = buffer.take() {
            self.flush_packed(done, metadata, &mut chunks);
        }
        chunks
    }

    fn flush_packed(&self, packed: Packed, metadata: Option<&Meta>, chunks: &mut Vec<Chunk>) {
        if packed.len < self.config.min_chunk_size {
            debug!(len = packed.len, "dropping undersized paragraph chunk");
            return;
        }
        chunks.push(Chunk {
            text: packed.text,
            index: chunks.len(),
            start_char: packed.start,
            end_char: packed.end,
            metadata: with_method(metadata, "paragraph"),
        });
    }

    /// Best split position near `target`, restricted to `window`.
    ///
    /// Candidates are tried in priority order: paragraph break, sentence end
    /// (`.`, `!` or `?` followed by a space), word boundary. Within each class
    /// the search alternates forward then backward at growing offsets. Falls
    /// back to `target` itself.
    fn find_split_point(&self, chars: &[char], target: usize, window: Window) -> usize {
        let len = chars.len();
        let range = SPLIT_SEARCH_RADIUS.min(len.saturating_sub(target)).min(target);

        if self.config.respect_paragraphs {
            for offset in 0..range {
                let pos = target + offset;
                if pos + 1 < len && chars[pos] == '\n' && chars[pos + 1] == '\n' && window.admits(pos + 2) {
                    return pos + 2;
                }
                let pos = target - offset;
                if pos >= 2 && chars[pos - 2] == '\n' && chars[pos - 1] == '\n' && window.admits(pos) {
                    return pos;
                }
            }
        }

        if self.config.respect_sentences {
            for offset in 0..range {
                let pos = target + offset;
                if pos + 1 < len && is_sentence_end(chars[pos]) && chars[pos + 1] == ' ' && window.admits(pos + 2) {
                    return pos + 2;
                }
                let pos = target - offset;
                if pos > 0 && pos < len && is_sentence_end(chars[pos - 1]) && chars[pos] == ' ' && window.admits(pos) {
                    return pos;
                }
            }
        }

        for offset in 0..WORD_SEARCH_RADIUS.min(range) {
            let pos = target + offset;
            if pos < len && chars[pos] == ' ' && window.admits(pos + 1) {
                return pos + 1;
            }
            let pos = target - offset;
            if pos > 0 && pos < len && chars[pos] == ' ' && window.admits(pos + 1) {
                return pos + 1;
            }
        }

        target
    }
}

struct Packed {
    text: String,
    len: usize,
    start: usize,
    end: usize,
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn with_method(metadata: Option<&Meta>, method: &str) -> Meta {
    let mut meta = metadata.cloned().unwrap_or_default();
    meta.insert("chunk_method".to_string(), serde_json::Value::String(method.to_string()));
    meta
}

/// Trimmed, non-empty paragraph spans. A separator is a newline, any run of
/// whitespace, then another newline.
fn paragraph_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut seg_start = 0usize;
    let mut i = 0usize;
    while i < len {
        if chars[i] == '\n' {
            let mut j = i + 1;
            let mut last_newline = None;
            while j < len && chars[j].is_whitespace() {
                if chars[j] == '\n' {
                    last_newline = Some(j);
                }
                j += 1;
            }
            if let Some(nl) = last_newline {
                push_trimmed(chars, seg_start, i, &mut spans);
                seg_start = nl + 1;
                i = nl + 1;
                continue;
            }
        }
        i += 1;
    }
    push_trimmed(chars, seg_start, len, &mut spans);
    spans
}

fn push_trimmed(chars: &[char], mut a: usize, mut b: usize, spans: &mut Vec<(usize, usize)>) {
    while a < b && chars[a].is_whitespace() {
        a += 1;
    }
    while b > a && chars[b - 1].is_whitespace() {
        b -= 1;
    }
    if a < b {
        spans.push((a, b));
    }
}

/// Split `text` into trimmed, non-empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    paragraph_spans(&chars)
        .into_iter()
        .map(|(a, b)| chars[a..b].iter().collect())
        .collect()
}
