//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text hierarchically by paragraphs, lines, words and finally single
//! characters, then prefixes every chunk after the first with context copied
//! from the end of the text before it.
//!
//! All sizes are counted in characters (Unicode scalar values). Chunks are
//! always exact substrings of the source text, so a chunk's text minus its
//! leading `overlap` characters tiles the document without gaps.

use std::ops::Range;

use uuid::Uuid;

use crate::document::{Chunk, Document};

/// Separators tried in priority order: paragraph, line, word, character.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Settings that change where documents are cut.
    ///
    /// Two chunkers with equal settings must split any text the same way.
    fn settings(&self) -> String {
        String::new()
    }
}

/// One piece of text produced by [`RecursiveChunker::split`].
///
/// Offsets are in characters relative to the split input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplit<'a> {
    /// The chunk text, borrowed from the input.
    pub text: &'a str,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Leading characters repeated from the previous split.
    pub overlap: usize,
}

/// Splits text hierarchically: paragraphs → lines → words → characters.
///
/// The first separator that occurs in a segment is used to cut it into
/// pieces; pieces are merged greedily up to `chunk_size - chunk_overlap`
/// characters, and a piece that is still too large is cut again with the
/// remaining separators. Each chunk after the first then receives at least
/// `chunk_overlap` characters of preceding context, widened backwards to a
/// word start when the chunk still fits `chunk_size`.
///
/// Chunk IDs are random UUIDs. Each chunk inherits the parent document's
/// metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(3000, 500);
/// let splits = chunker.split("Revenue was $100M in Q1 and $120M in Q2.");
/// assert_eq!(splits.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk (at least 1)
    /// * `chunk_overlap`: characters repeated between consecutive chunks,
    ///   clamped below `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy.
    ///
    /// Empty separators in the list are dropped and a single trailing empty
    /// separator is always appended, so splitting can fall back to single
    /// characters.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).filter(|s| !s.is_empty()).collect();
        self.separators.push(String::new());
        self
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters repeated between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into ordered, overlapping pieces.
    ///
    /// Text of at most `chunk_size` characters comes back as a single piece
    /// equal to the input. Blank text yields no pieces.
    pub fn split<'a>(&self, text: &'a str) -> Vec<TextSplit<'a>> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let total = text.chars().count();
        if total <= self.chunk_size {
            return vec![TextSplit { text, start: 0, end: total, overlap: 0 }];
        }

        let budget = self.chunk_size - self.chunk_overlap;
        let mut cores = Vec::new();
        split_and_merge(text, 0..text.len(), &self.separators, budget, &mut cores);

        let mut splits = Vec::with_capacity(cores.len());
        let mut cursor = 0;
        for (index, core) in cores.into_iter().enumerate() {
            let core_chars = char_len(&text[core.clone()]);
            let (start_byte, overlap) =
                if index == 0 { (core.start, 0) } else { self.overlap_start(text, core.start, core_chars) };

            splits.push(TextSplit {
                text: &text[start_byte..core.end],
                start: cursor - overlap,
                end: cursor + core_chars,
                overlap,
            });
            cursor += core_chars;
        }

        splits
    }

    /// Find where the context prefix for a chunk whose fresh text starts at
    /// `core_start` begins. Returns the byte offset and the prefix length in
    /// characters.
    fn overlap_start(&self, text: &str, core_start: usize, core_chars: usize) -> (usize, usize) {
        let mut start = core_start;
        let mut taken = 0;
        for (byte, _) in text[..core_start].char_indices().rev() {
            if taken == self.chunk_overlap {
                break;
            }
            start = byte;
            taken += 1;
        }

        let room = self.chunk_size.saturating_sub(core_chars + taken);
        let (widened, extra) = widen_to_word_start(text, start, room);
        (widened, taken + extra)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, split)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk {
                    id: Uuid::new_v4().to_string(),
                    text: split.text.to_string(),
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                    start: split.start,
                    end: split.end,
                    overlap: split.overlap,
                }
            })
            .collect()
    }

    fn settings(&self) -> String {
        format!("recursive:{}:{}:{:?}", self.chunk_size, self.chunk_overlap, self.separators)
    }
}

/// Cut `range` of `text` with the first applicable separator, then merge the
/// pieces into byte ranges of at most `budget` characters. Pieces that exceed
/// the budget on their own are cut again with the remaining separators.
fn split_and_merge(
    text: &str,
    range: Range<usize>,
    separators: &[String],
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    let segment = &text[range.clone()];
    let (separator, remaining) = pick_separator(segment, separators);
    let pieces = if separator.is_empty() {
        split_chars(segment, range.start)
    } else {
        split_keeping_separator(segment, range.start, separator)
    };

    let mut current: Option<(Range<usize>, usize)> = None;
    for piece in pieces {
        let len = char_len(&text[piece.clone()]);

        if len > budget {
            if let Some((done, _)) = current.take() {
                out.push(done);
            }
            if remaining.is_empty() {
                out.extend(split_chars_by_budget(text, piece, budget));
            } else {
                split_and_merge(text, piece, remaining, budget, out);
            }
            continue;
        }

        let fits = current.as_ref().is_some_and(|(_, n)| n + len <= budget);
        if fits {
            if let Some((merged, n)) = current.as_mut() {
                merged.end = piece.end;
                *n += len;
            }
        } else if let Some((done, _)) = current.replace((piece, len)) {
            out.push(done);
        }
    }

    if let Some((done, _)) = current {
        out.push(done);
    }
}

/// Pick the first separator present in `segment`; the empty separator always
/// applies. Returns the separator and the lower-priority ones after it.
fn pick_separator<'s>(segment: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || segment.contains(separator.as_str()) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split at a separator while keeping the separator attached to the preceding
/// segment. Ranges are absolute byte offsets (`offset` is added).
fn split_keeping_separator(segment: &str, offset: usize, separator: &str) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = segment[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(offset + start..offset + end);
        start = end;
    }

    if start < segment.len() {
        result.push(offset + start..offset + segment.len());
    }

    result
}

/// One range per character.
fn split_chars(segment: &str, offset: usize) -> Vec<Range<usize>> {
    segment.char_indices().map(|(i, c)| offset + i..offset + i + c.len_utf8()).collect()
}

/// Fixed-width character windows; only reached with a custom separator list
/// whose pieces outlast every separator.
fn split_chars_by_budget(text: &str, range: Range<usize>, budget: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut start = range.start;
    let mut count = 0;
    for (i, _) in text[range.clone()].char_indices() {
        if count == budget {
            windows.push(start..range.start + i);
            start = range.start + i;
            count = 0;
        }
        count += 1;
    }
    if start < range.end {
        windows.push(start..range.end);
    }
    windows
}

/// Move `start` backwards to the beginning of the word it cuts through,
/// adding at most `room` characters. Returns the new byte offset and the
/// number of characters added.
fn widen_to_word_start(text: &str, start: usize, room: usize) -> (usize, usize) {
    if start == 0 || room == 0 {
        return (start, 0);
    }
    let before = &text[..start];
    let cuts_word = before.chars().next_back().is_some_and(|c| !c.is_whitespace())
        && text[start..].chars().next().is_some_and(|c| !c.is_whitespace());
    if !cuts_word {
        return (start, 0);
    }

    let mut skipped = 0;
    for (byte, c) in before.char_indices().rev() {
        if skipped > room {
            return (start, 0);
        }
        if c.is_whitespace() {
            return (byte + c.len_utf8(), skipped);
        }
        skipped += 1;
    }
    if skipped <= room { (0, skipped) } else { (start, 0) }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
