//! Recursive character splitter.
//!
//! Tries each separator in order (`"\n\n"`, `"\n"`, `" "`, `""`), splitting on
//! the first one the text contains. Pieces under `chunk_size` characters are
//! merged back together up to the limit; oversized pieces recurse with the
//! remaining separators. Consecutive chunks carry up to `chunk_overlap`
//! characters of trailing context. Lengths are counted in chars, not bytes.

use std::collections::VecDeque;

use anyhow::{bail, Result};
use tracing::warn;

use crate::ingest::{Chunk, Document};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if chunk_overlap > chunk_size {
            bail!("chunk_overlap ({chunk_overlap}) is larger than chunk_size ({chunk_size})");
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Splits every document, numbering chunks contiguously from 0 per document.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
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

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator present; "" always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut short: Vec<String> = Vec::new();

        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge_splits(&short, separator));
                short.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge_splits(&short, separator));
        }
        chunks
    }

    /// Greedily joins pieces with `separator` into chunks of at most `chunk_size`.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            let joined_sep = if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_sep > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !current.is_empty() {
                    push_joined(&mut docs, &current, separator);

                    // Carry at most chunk_overlap chars into the next chunk
                    loop {
                        let next_sep = if current.is_empty() { 0 } else { sep_len };
                        let must_drop = total > self.chunk_overlap
                            || (total > 0 && total + len + next_sep > self.chunk_size);
                        if !must_drop {
                            break;
                        }
                        let Some(front) = current.pop_front() else {
                            break;
                        };
                        let dropped_sep = if current.is_empty() { 0 } else { sep_len };
                        total -= char_len(front) + dropped_sep;
                    }
                }
            }

            current.push_back(piece);
            total += len;
            if current.len() > 1 {
                total += sep_len;
            }
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = TextSplitter::new(500, 30).unwrap();
        let chunks = splitter.split_text("Our goal is $10,000.");
        assert_eq!(chunks, vec!["Our goal is $10,000."]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(500, 30).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n\n\n").is_empty());
    }

    #[test]
    fn test_paragraphs_merged_up_to_limit() {
        let splitter = TextSplitter::new(20, 0).unwrap();
        let chunks = splitter.split_text("aaaa\n\nbbbb\n\ncccccccccccccccc");
        // "aaaa\n\nbbbb" is 10 chars; adding 2 + 16 would exceed 20
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccccccccccccccc"]);
    }

    #[test]
    fn test_chunks_never_exceed_chunk_size() {
        let text = (0..200)
            .map(|i| format!("Donor number {i} gave generously."))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(100, 10).unwrap();
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 100, "chunk too long: {}", char_len(chunk));
        }
    }

    #[test]
    fn test_overlap_carries_trailing_words() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        let chunks = splitter.split_text("aa bb cc dd ee");
        assert_eq!(chunks, vec!["aa bb cc", "cc dd ee"]);
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = TextSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_multibyte_counts_chars() {
        let splitter = TextSplitter::new(3, 0).unwrap();
        let chunks = splitter.split_text("ééééé");
        assert_eq!(chunks, vec!["ééé", "éé"]);
    }

    #[test]
    fn test_overlap_larger_than_size_rejected() {
        assert!(TextSplitter::new(10, 11).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
    }

    #[test]
    fn test_split_documents_indices_contiguous() {
        let splitter = TextSplitter::new(20, 0).unwrap();
        let docs = vec![Document {
            source: "https://example.org".to_string(),
            text: "first paragraph\n\nsecond paragraph\n\nthird paragraph".to_string(),
        }];
        let chunks = splitter.split_documents(&docs);
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.source, "https://example.org");
        }
    }
}
