//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;

/// Characters a chunk prefers to end on.
const SEPARATORS: &[char] = &['\n', '.', '!', '?'];

/// Chunk text into overlapping segments of at most `chunk_size` bytes.
///
/// Each chunk ends right after the last separator found in the second half of
/// its window; when there is none the window is cut at `chunk_size`. The next
/// chunk starts `overlap` bytes before the previous end.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkCandidate> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let mut chunks = Vec::new();
    let mut position = 0u32;
    let mut start = 0;

    loop {
        let mut window_end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        if window_end <= start {
            // chunk_size is narrower than the character at `start`
            window_end = ceil_char_boundary(text, start + 1);
        }

        let end = if window_end >= text.len() {
            text.len()
        } else {
            find_break(text, start, window_end, chunk_size)
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(ChunkCandidate {
                position,
                text: piece.to_string(),
            });
            position += 1;
        }

        if end >= text.len() {
            break;
        }

        let mut next_start = ceil_char_boundary(text, end.saturating_sub(overlap));
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

fn find_break(text: &str, start: usize, window_end: usize, chunk_size: usize) -> usize {
    let earliest = start + chunk_size / 2;

    text[..window_end]
        .char_indices()
        .rev()
        .take_while(|(i, _)| *i >= earliest)
        .find(|(_, c)| SEPARATORS.contains(c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(window_end)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_short_input_is_one_chunk() {
        let chunks = chunk_text("Solar panels convert light.", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[0].text, "Solar panels convert light.");
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   ", 100, 10).is_empty());
    }

    #[test]
    fn test_chunks_prefer_sentence_ends() {
        let text = "First sentence here. Second sentence here. Third one follows now.";
        let chunks = chunk_text(text, 30, 0);

        assert_eq!(chunks[0].text, "First sentence here.");
        assert_eq!(chunks[1].text, "Second sentence here.");
        assert!(chunks.iter().all(|c| c.text.len() <= 30));
    }

    #[test]
    fn test_chunk_text_no_separators_cuts_at_size() {
        let text = "a".repeat(300);
        let chunks = chunk_text(&text, 100, 0);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.len() == 100));
    }

    #[test]
    fn test_chunk_text_with_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(4);
        let chunks = chunk_text(&text, 50, 10);

        assert!(chunks.len() >= 2);
        let tail = &chunks[0].text[chunks[0].text.len() - 10..];
        assert!(chunks[1].text.starts_with(tail));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i as u32);
        }
    }

    #[test]
    fn test_chunk_text_utf8_safety() {
        let text = "é".repeat(100);
        let chunks = chunk_text(&text, 15, 3);

        assert!(!chunks.is_empty());
        let joined: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert!(joined >= 100);
    }
}
