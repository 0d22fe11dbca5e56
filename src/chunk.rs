//! Recursive character text splitter.
//!
//! Splits contract text into overlapping [`Chunk`]s of at most
//! `chunk_size` characters. The splitter tries the coarsest separator
//! first (paragraphs), then lines, then words, then single characters,
//! so chunks break on the most natural boundary that fits.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in `["\n\n", "\n", " ", ""]` that occurs in
//!    the text and split on it, keeping the separator at the start of the
//!    following piece.
//! 2. Pieces shorter than `chunk_size` are merged greedily; when the next
//!    piece would overflow, the buffer is emitted and trailing pieces
//!    totalling at most `chunk_overlap` characters are carried over.
//! 3. Pieces that are too long on their own recurse with the remaining,
//!    finer separators.
//! 4. Emitted chunks are trimmed; blank chunks are dropped.
//!
//! Lengths are measured in characters, not bytes.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split text into overlapping pieces. Blank input yields no pieces.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let splitter = Splitter {
        chunk_size,
        chunk_overlap,
    };
    splitter.split(text, &SEPARATORS)
}

/// Split a contract's text into [`Chunk`]s with contiguous indices from 0.
pub fn chunk_contract(contract_id: i64, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text(text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(contract_id, i as i64, piece))
        .collect()
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(contract_id: i64, index: i64, text: String) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        contract_id,
        chunk_index: index,
        hash: hash_text(&text),
        text,
    }
}

struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Coarsest separator present in the text; "" always matches.
        let mut separator = separators[separators.len() - 1];
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split(piece, finer));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }

        out
    }

    /// Greedily pack pieces into chunks, carrying an overlap tail forward.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `sep`, keeping each separator at the start of the piece after it.
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keep_start<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(sep) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = split_text("This Agreement is made between Acme and Beta.", 2000, 200);
        assert_eq!(chunks, vec!["This Agreement is made between Acme and Beta."]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(split_text("", 2000, 200).is_empty());
        assert!(split_text("  \n\n \n ", 2000, 200).is_empty());
    }

    #[test]
    fn chunks_never_exceed_size() {
        let text = (0..200)
            .map(|i| format!("Clause {} shall survive termination of this Agreement.", i))
            .collect::<Vec<_>>()
            .join("\n");
        for chunk in split_text(&text, 300, 50) {
            assert!(chunk.chars().count() <= 300, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn neighbouring_chunks_overlap() {
        let text = (0..40)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 60, 20);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected '{}' carried into next chunk: {:?}",
                last_word,
                pair
            );
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para_a = "a".repeat(30);
        let para_b = "b".repeat(30);
        let text = format!("{}\n\n{}", para_a, para_b);
        let chunks = split_text(&text, 40, 0);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn unbroken_run_falls_back_to_characters() {
        let text = "x".repeat(95);
        let chunks = split_text(&text, 40, 10);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn multibyte_text_measured_in_chars() {
        let text = "é".repeat(30);
        let chunks = split_text(&text, 40, 5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 30);
    }

    #[test]
    fn chunk_contract_indices_contiguous() {
        let cfg = ChunkingConfig {
            chunk_size: 50,
            chunk_overlap: 10,
        };
        let text = (0..30)
            .map(|i| format!("Section {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_contract(7, &text, &cfg);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.contract_id, 7);
            assert_eq!(c.hash, hash_text(&c.text));
        }
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta.\n\nGamma delta epsilon.\nZeta eta theta iota.";
        assert_eq!(split_text(text, 15, 5), split_text(text, 15, 5));
    }
}
