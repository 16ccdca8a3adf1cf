//! Fixed-window text chunker with overlap.
//!
//! Splits extracted text into windows of `window` characters, each
//! starting `window - overlap` characters after the previous one. Offsets
//! are Unicode scalar values, not bytes or tokens, so multi-byte text is
//! never split inside a character.
//!
//! Emission stops as soon as a window reaches the end of the text. For
//! non-empty text the chunk count is
//! `max(1, ceil((len - overlap) / (window - overlap)))`, and stripping the
//! first `overlap` characters from every chunk after the first and
//! concatenating reconstructs the input exactly (see [`reassemble`]).

use crate::error::{Error, Result};

/// Validated window/overlap pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    window: usize,
    overlap: usize,
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self {
            window: 500,
            overlap: 50,
        }
    }
}

impl ChunkWindow {
    /// Rejects settings that would never advance.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::Config("chunk window must be > 0".to_string()));
        }
        if overlap >= window {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than window ({})",
                overlap, window
            )));
        }
        Ok(Self { window, overlap })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.window - self.overlap
    }

    /// Split `text` into overlapping windows, in emission order.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let len = bounds.len();
        bounds.push(text.len());

        let mut chunks = Vec::with_capacity(self.expected_count(len));
        let mut start = 0;
        loop {
            let end = (start + self.window).min(len);
            chunks.push(text[bounds[start]..bounds[end]].to_string());
            if end == len {
                break;
            }
            start += self.step();
        }
        chunks
    }

    /// Number of chunks [`chunk`](Self::chunk) yields for text of `len` chars.
    pub fn expected_count(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let remaining = len.saturating_sub(self.overlap);
        remaining.div_ceil(self.step()).max(1)
    }

    /// Inverse of [`chunk`](Self::chunk).
    pub fn reassemble<S: AsRef<str>>(&self, chunks: &[S]) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk = chunk.as_ref();
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(self.overlap));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(ChunkWindow::default().chunk("").is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = ChunkWindow::default().chunk("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn text_exactly_one_window_is_single_chunk() {
        let text = "a".repeat(500);
        let chunks = ChunkWindow::default().chunk(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 500);
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let w = ChunkWindow::new(10, 3).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = w.chunk(text);
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert_eq!(chunks[2], "opqrstuvwx");
        assert_eq!(chunks[3], "vwxyz");
        assert_eq!(chunks.len(), 4);
        assert_eq!(w.expected_count(text.len()), 4);
    }

    #[test]
    fn thousand_chars_default_window() {
        let text: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = ChunkWindow::default().chunk(&text);
        // starts at 0, 450, 900 ; the third reaches the end
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 100);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let w = ChunkWindow::new(4, 1).unwrap();
        let text = "héllo wörld ✓✓✓";
        let chunks = w.chunk(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(w.reassemble(&chunks), text);
    }

    #[test]
    fn invalid_windows_rejected() {
        assert!(ChunkWindow::new(0, 0).is_err());
        assert!(ChunkWindow::new(10, 10).is_err());
        assert!(ChunkWindow::new(10, 11).is_err());
        assert!(ChunkWindow::new(10, 9).is_ok());
    }

    proptest! {
        #[test]
        fn chunks_reassemble_to_input(
            text in "\\PC{0,400}",
            window in 1usize..64,
            overlap_seed in 0usize..64,
        ) {
            let overlap = overlap_seed % window;
            let w = ChunkWindow::new(window, overlap).unwrap();
            let chunks = w.chunk(&text);
            prop_assert_eq!(chunks.len(), w.expected_count(text.chars().count()));
            prop_assert_eq!(w.reassemble(&chunks), text);
        }
    }
}
