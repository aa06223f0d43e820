
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Separators tried in order: paragraphs, lines, words, characters
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for content chunking and window selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
    /// First chunk of the positional window
    pub window_start: usize,
    /// Number of chunks kept for indexing
    pub window_len: usize,
    /// Text marking where the product description begins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_anchor: Option<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 200,
            window_start: 18,
            window_len: 6,
            window_anchor: Some("Product Description".to_string()),
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=8000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        if !(1..=100).contains(&self.window_len) {
            return Err(ConfigError::InvalidWindowLength(self.window_len));
        }
        if self
            .window_anchor
            .as_deref()
            .is_some_and(|anchor| anchor.trim().is_empty())
        {
            return Err(ConfigError::EmptyField("window_anchor"));
        }
        Ok(())
    }
}

/// A chunk of cleaned page text and its position in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub position: usize,
}

/// Recursive character splitter.
///
/// Splits on the first separator present in the text, keeps each separator at
/// the start of the piece that follows it, recurses into pieces that are still
/// too long, and greedily merges small pieces back together with overlap.
/// Lengths are measured in characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl RecursiveSplitter {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.to_vec(),
        }
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into ordered, overlapping chunks
    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.split_recursive(text, &self.separators, &mut chunks);
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                self.merge(&good, out);
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }

        if !good.is_empty() {
            self.merge(&good, out);
        }
    }

    /// Greedily pack pieces into chunks, carrying up to `chunk_overlap` characters forward
    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !current.is_empty() {
                    push_joined(&current, out);
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0)
                    {
                        let Some(front) = current.pop_front() else {
                            break;
                        };
                        total -= char_len(front);
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        push_joined(&current, out);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_joined(pieces: &VecDeque<&str>, out: &mut Vec<String>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching it to the start of each following piece.
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut boundaries: Vec<usize> = if separator.is_empty() {
        text.char_indices().map(|(i, _)| i).collect()
    } else {
        std::iter::once(0)
            .chain(text.match_indices(separator).map(|(i, _)| i))
            .collect()
    };
    boundaries.push(text.len());
    boundaries.dedup();

    boundaries
        .windows(2)
        .filter_map(|pair| text.get(pair[0]..pair[1]))
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Split cleaned page text into positioned chunks
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = RecursiveSplitter::from_config(config)
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(position, text)| Chunk { text, position })
        .collect();

    debug!(
        "Split {} chars into {} chunks (size {}, overlap {})",
        text.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );
    chunks
}

/// Pick the run of chunks most likely to hold the product description.
///
/// Starts at the first chunk containing the anchor (case-insensitive) if there
/// is one, otherwise at `window_start`, and keeps up to `window_len` chunks.
/// A page that ends before the window starts contributes its last `window_len`
/// chunks instead.
#[inline]
pub fn select_window<'a>(chunks: &'a [Chunk], config: &ChunkingConfig) -> &'a [Chunk] {
    let anchored = config.window_anchor.as_deref().and_then(|anchor| {
        let needle = anchor.to_lowercase();
        chunks
            .iter()
            .position(|chunk| chunk.text.to_lowercase().contains(&needle))
    });

    let wanted_start = match anchored {
        Some(position) => {
            debug!("Description anchor found in chunk {}", position);
            position
        }
        None => config.window_start,
    };
    let start = if wanted_start < chunks.len() {
        wanted_start
    } else {
        let start = chunks.len().saturating_sub(config.window_len);
        debug!(
            "Page has only {} chunks, window moved from {} to {}",
            chunks.len(),
            wanted_start,
            start
        );
        start
    };
    let end = start.saturating_add(config.window_len).min(chunks.len());

    chunks.get(start..end).unwrap_or(&[])
}
