//! Paragraph-boundary text chunker for corpus documents.
//!
//! Splits a document body into pieces that respect a `max_tokens` budget,
//! breaking on paragraph boundaries (`\n\n`) so each chunk stays
//! semantically coherent. Chunk ordinals are contiguous from 0 and stable
//! for identical input, which keeps citation tokens reproducible.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunk bodies on paragraph boundaries, respecting
/// `max_tokens`. Always returns at least one chunk.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;

    if text.trim().is_empty() {
        return vec![text.trim().to_string()];
    }

    let mut pieces = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let combined = if buf.is_empty() {
            trimmed.len()
        } else {
            buf.len() + 2 + trimmed.len()
        };

        if combined > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if trimmed.len() > max_chars {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
        }
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    if pieces.is_empty() {
        pieces.push(text.trim().to_string());
    }

    pieces
}

/// Split an oversized paragraph at the last newline or space before the
/// budget, falling back to a hard cut.
fn hard_split(text: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = text;
    while !remaining.is_empty() {
        let budget = remaining.len().min(max_chars.max(1));
        let cut = floor_char_boundary(remaining, budget);
        let cut = if cut < remaining.len() {
            remaining[..cut]
                .rfind('\n')
                .or_else(|| remaining[..cut].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(cut)
        } else {
            cut
        };
        out.push(remaining[..cut].trim().to_string());
        remaining = &remaining[cut..];
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index.max(1).min(s.len())
}
