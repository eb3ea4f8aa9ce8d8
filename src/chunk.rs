//! Sliding-window text chunker for knowledge ingestion.
//!
//! Splits extracted document text into overlapping windows of at most
//! `max_chars` characters. Each cut prefers a paragraph break (`\n\n`), then
//! a sentence end, then a space, searching backward from the limit; only when
//! the window has no such boundary does it cut mid-word. Consecutive windows
//! overlap by `overlap_chars` so sentences straddling a cut stay searchable.
//!
//! Each chunk carries a SHA-256 hash of its text for dedup and staleness
//! checks.

use sha2::{Digest, Sha256};

/// One window of knowledge text, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: i64,
    pub text: String,
    pub hash: String,
}

/// Split text into overlapping chunks. Whitespace-only input yields no
/// chunks. Indices are contiguous starting at 0.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut index: i64 = 0;
    let mut start = 0usize;
    let len = text.len();

    while start < len {
        let mut end = floor_char_boundary(text, (start + max_chars).min(len));
        if end <= start {
            // max_chars smaller than one multibyte char; take the whole char
            // rather than spinning.
            end = next_char_boundary(text, start + 1);
        }
        if end < len {
            end = find_break(text, start, end);
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(index, piece));
            index += 1;
        }

        if end >= len {
            break;
        }

        // Step back by the overlap, but always advance so the loop terminates
        // even when overlap_chars >= the window we just emitted.
        let candidate = floor_char_boundary(text, end.saturating_sub(overlap_chars));
        start = if candidate > start { candidate } else { end };
    }

    chunks
}

/// Pick the cut point inside `text[start..end]`: last paragraph break, else
/// last sentence end, else last space. A boundary in the first half of the
/// window is ignored so chunks never degenerate to a few characters.
fn find_break(text: &str, start: usize, end: usize) -> usize {
    let window = &text[start..end];
    let min_pos = window.len() / 2;

    if let Some(pos) = window.rfind("\n\n") {
        if pos >= min_pos {
            return start + pos + 2;
        }
    }
    for pat in [". ", "! ", "? ", "\n"] {
        if let Some(pos) = window.rfind(pat) {
            if pos >= min_pos {
                return start + pos + pat.len();
            }
        }
    }
    if let Some(pos) = window.rfind(' ') {
        if pos >= min_pos {
            return start + pos + 1;
        }
    }
    end
}

fn floor_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn next_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos.min(text.len())
}

fn make_chunk(index: i64, text: &str) -> TextChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    TextChunk {
        index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_and_whitespace_yield_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   \n\n\t  ", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 100, "chunk too long: {}", c.text.len());
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..80)
            .map(|i| format!("Paragraph number {} with a bit of filler text.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, 200, 40);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i as i64, "index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let first = "A".repeat(60);
        let second = "B".repeat(60);
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks[0].text, first);
    }

    #[test]
    fn test_overlap_repeats_tail_text() {
        let text = "one two three four five six seven eight nine ten ".repeat(20);
        let chunks = chunk_text(&text, 120, 40);
        assert!(chunks.len() > 1);
        // Some tail of each chunk reappears at the head of the next one.
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().rev().take(10).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].text.contains(tail.trim()),
                "no overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn test_unbroken_text_hard_cuts() {
        let text = "x".repeat(2500);
        let chunks = chunk_text(&text, 1000, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[2].text.len(), 500);
    }

    #[test]
    fn test_multibyte_text_never_splits_codepoints() {
        let text = "Öl und Wasser mischen sich nicht. ".repeat(100);
        let chunks = chunk_text(&text, 97, 13);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.is_char_boundary(0));
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn test_tiny_max_chars_still_terminates() {
        let chunks = chunk_text("Ööö", 1, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text == "Ö"));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma. ".repeat(50);
        let a = chunk_text(&text, 150, 30);
        let b = chunk_text(&text, 150, 30);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.index, y.index);
        }
    }

    #[test]
    fn test_hash_tracks_text() {
        let a = make_chunk(0, "same text");
        let b = make_chunk(1, "same text");
        let c = make_chunk(0, "other text");
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
    }
}
