//! Recursive character splitter tuned for markdown notes and Chinese prose.
//!
//! The text is cut at the highest-priority separator it contains. Pieces keep
//! their separator at the front, are merged back together up to `chunk_size`
//! characters with `chunk_overlap` characters carried into the next chunk, and
//! any piece that is still too long is split again with the remaining
//! separators. Lengths are counted in characters, not bytes.

use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::debug;

use crate::loader::Document;

/// Separator priority: markdown headings, bracketed schedule entries, blank
/// lines, lines, then sentence ends.
pub const DEFAULT_SEPARATORS: [&str; 9] = [
    "\n# ", "\n## ", "\n### ", "\n【", "\n\n", "\n", "。", "！", "？",
];

/// One piece of a source document, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: PathBuf,
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Split every document, numbering chunks per source.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(|(index, text)| Chunk {
                        source: doc.source.clone(),
                        index,
                        text,
                    })
            })
            .collect()
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                if let Some(chunk) = join_trimmed(&[piece]) {
                    chunks.push(chunk);
                }
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    debug!(size = total, limit = self.chunk_size, "Chunk exceeds configured size");
                }
                if !window.is_empty() {
                    if let Some(chunk) = join_trimmed(window.make_contiguous()) {
                        chunks.push(chunk);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        let Some(front) = window.pop_front() else {
                            break;
                        };
                        total -= char_len(front);
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(window.make_contiguous()) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Split before every occurrence of `separator`; an empty separator splits
/// into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(parts: &[&str]) -> Option<String> {
    let joined = parts.concat();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
