//! Overlapping character chunker for corpus documents.
//!
//! Splitting strategy per chunk window:
//! 1. Prefer a paragraph boundary (blank line) in the back half of the window
//! 2. Then a single newline
//! 3. Then a space
//! 4. Last resort: hard cut at the character budget
//!
//! Consecutive chunks share a configurable character overlap so that
//! sentences spanning a cut remain retrievable from either side.

/// Default characters per chunk.
pub const CHUNK_SIZE: usize = 2000;

/// Default characters carried over between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 100;

/// Split text with the default chunk size and overlap.
pub fn split_text(text: &str) -> Vec<String> {
    split_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
pub fn split_with(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(overlap < chunk_size);

    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start, hard_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        // Step back by the overlap, but always make forward progress
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Find a natural break position in `[start, hard_end)`, scanning backwards
/// from the budget. Restricted to the back half of the window so a boundary
/// near the front cannot produce a near-empty chunk.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;

    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' && i > 0 && chars[i - 1] == '\n' {
            return i + 1;
        }
    }
    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' {
            return i + 1;
        }
    }
    for i in (floor..hard_end).rev() {
        if chars[i] == ' ' {
            return i + 1;
        }
    }
    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(split_text("").is_empty());
        assert!(split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split_text("The NIST framework has five functions.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "The NIST framework has five functions.");
    }

    #[test]
    fn test_chunks_respect_budget() {
        let text = "word ".repeat(2000);
        let chunks = split_with(&text, 200, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
        }
    }

    #[test]
    fn test_overlap_carried_between_chunks() {
        // No break characters, so cuts land exactly at the budget
        let text = "abcdefghijklmnopqrst";
        let chunks = split_with(text, 10, 3);
        assert_eq!(chunks[0], "abcdefghij");
        // Next chunk starts 3 characters before the previous end
        assert!(chunks[1].starts_with("hij"));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let para1 = "alpha ".repeat(20); // 120 chars
        let para2 = "beta ".repeat(20);
        let text = format!("{}\n\n{}", para1.trim(), para2.trim());
        let chunks = split_with(&text, 150, 10);
        // First cut should land at the blank line, not mid-paragraph
        assert!(chunks[0].ends_with("alpha"));
    }

    #[test]
    fn test_no_whitespace_only_chunks() {
        let text = format!("{}\n\n\n\n{}", "x".repeat(300), "y".repeat(300));
        let chunks = split_with(&text, 100, 10);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
    }
}
