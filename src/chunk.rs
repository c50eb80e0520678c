//! Sentence-boundary text chunker.
//!
//! Splits raw document text into bounded, overlapping segments for
//! embedding. Splitting prefers sentence-like boundaries (CJK and Latin
//! terminators, newlines) so each chunk stays semantically coherent, and
//! consecutive chunks share an `overlap`-character window to preserve
//! context across the cut.
//!
//! # Algorithm
//!
//! 1. Normalize line endings to `\n`, collapse runs of horizontal
//!    whitespace to a single space, and trim.
//! 2. Scan character-by-character, closing a sentence-like unit at each
//!    terminator (`。！？!?;` or newline). A trailing partial unit is
//!    kept; empty units are dropped.
//! 3. Greedily pack units into a chunk while the accumulated length fits
//!    `chunk_size` — or while the chunk is still empty, which guarantees
//!    forward progress even for a single oversized unit.
//! 4. On overflow, close the current chunk and seed the next one with the
//!    last `overlap` characters of the closed chunk, followed by the
//!    overflowing unit.
//! 5. Hard-split any chunk still exceeding `chunk_size` into fixed-size
//!    windows with stride `chunk_size − overlap` (falling back to
//!    `chunk_size` when that would not be positive).
//! 6. Drop empty results.
//!
//! All lengths are counted in characters, never bytes, so multi-byte
//! text cannot be split mid-scalar.

/// Characters that close a sentence-like unit.
const UNIT_TERMINATORS: [char; 7] = ['。', '！', '？', '!', '?', ';', '\n'];

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `overlap` characters carried over between consecutive chunks.
///
/// Deterministic and stateless: the same input always produces the same
/// output.
///
/// # Guarantees
///
/// - Empty input produces an empty vector.
/// - Every returned chunk is non-empty and at most `chunk_size`
///   characters long.
/// - Concatenating the chunks preserves every non-whitespace character
///   present after normalization (overlap may duplicate some).
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = normalize(text);
    if text.is_empty() {
        return Vec::new();
    }

    let units = split_units(&text);

    // Greedy packing with overlap seeding.
    let mut chunks: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for unit in units {
        let unit_len = unit.chars().count();
        if cur.is_empty() || cur_len + unit_len <= chunk_size {
            cur.push_str(&unit);
            cur_len += unit_len;
        } else {
            let closed = cur.trim().to_string();
            let tail = if overlap > 0 && !closed.is_empty() {
                tail_chars(&closed, overlap)
            } else {
                String::new()
            };
            chunks.push(closed);
            cur_len = tail.chars().count() + unit_len;
            cur = tail;
            cur.push_str(&unit);
        }
    }
    let trailing = cur.trim();
    if !trailing.is_empty() {
        chunks.push(trailing.to_string());
    }

    // Hard-split fallback for chunks that still exceed the limit
    // (a single unit longer than chunk_size).
    let stride = if chunk_size > overlap {
        chunk_size - overlap
    } else {
        chunk_size
    }
    .max(1);

    let mut finished: Vec<String> = Vec::new();
    for chunk in chunks {
        let len = chunk.chars().count();
        if len <= chunk_size {
            if !chunk.is_empty() {
                finished.push(chunk);
            }
            continue;
        }
        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0usize;
        while start < len {
            let end = (start + chunk_size).min(len);
            let piece: String = chars[start..end].iter().collect();
            if !piece.is_empty() {
                finished.push(piece);
            }
            start += stride;
        }
    }

    finished
}

/// Normalize line endings to `\n`, collapse runs of spaces and tabs to a
/// single space, and trim surrounding whitespace.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut in_gap = false;
    for ch in unified.chars() {
        if ch == ' ' || ch == '\t' {
            if !in_gap {
                out.push(' ');
            }
            in_gap = true;
        } else {
            in_gap = false;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Split normalized text into trimmed sentence-like units, keeping the
/// terminator with its unit. A trailing partial unit is emitted as-is.
fn split_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut buf = String::new();
    for ch in text.chars() {
        buf.push(ch);
        if UNIT_TERMINATORS.contains(&ch) {
            let unit = buf.trim();
            if !unit.is_empty() {
                units.push(unit.to_string());
            }
            buf.clear();
        }
    }
    let last = buf.trim();
    if !last.is_empty() {
        units.push(last.to_string());
    }
    units
}

/// The last `count` characters of `s` (the whole string if shorter).
fn tail_chars(s: &str, count: usize) -> String {
    let len = s.chars().count();
    s.chars().skip(len.saturating_sub(count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", 500, 50).is_empty());
        assert!(chunk_text("   \t\n  ", 500, 50).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world.", 500, 50);
        assert_eq!(chunks, vec!["Hello, world.".to_string()]);
    }

    #[test]
    fn test_normalization_collapses_whitespace() {
        let chunks = chunk_text("a \t  b\r\nc\rd", 500, 0);
        assert_eq!(chunks.len(), 1);
        // Runs of spaces/tabs become one space; \r\n and \r become unit
        // boundaries, and units are joined without separators.
        assert_eq!(chunks[0], "a bcd");
    }

    #[test]
    fn test_sentence_boundary_packing() {
        // Three 10-char sentences; chunk_size fits two of them.
        let text = "aaaaaaaaa!bbbbbbbbb?ccccccccc!";
        let chunks = chunk_text(text, 20, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "aaaaaaaaa!bbbbbbbbb?");
        assert_eq!(chunks[1], "ccccccccc!");
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let text = "aaaaaaaaa!bbbbbbbbb?ccccccccc!";
        let chunks = chunk_text(text, 20, 5);
        assert_eq!(chunks.len(), 2);
        // Second chunk starts with the last 5 chars of the first.
        assert_eq!(chunks[1], "bbbb?ccccccccc!");
    }

    #[test]
    fn test_cjk_terminators() {
        let text = "你好世界。再见世界！问题吗？";
        let chunks = chunk_text(text, 6, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "你好世界。");
        assert_eq!(chunks[1], "再见世界！");
        assert_eq!(chunks[2], "问题吗？");
    }

    #[test]
    fn test_oversized_unit_hard_split() {
        // One unit with no terminators, longer than chunk_size.
        let text = "x".repeat(95);
        let chunks = chunk_text(&text, 30, 10);
        for c in &chunks {
            assert!(c.chars().count() <= 30, "chunk exceeds limit: {}", c.len());
        }
        // Stride 20 over 95 chars: windows start at 0, 20, 40, 60, 80.
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].chars().count(), 30);
        assert_eq!(chunks[4].chars().count(), 15);
    }

    #[test]
    fn test_stride_guard_when_overlap_ge_chunk_size() {
        // overlap >= chunk_size must not loop forever; stride falls back
        // to chunk_size.
        let text = "y".repeat(50);
        let chunks = chunk_text(&text, 10, 10);
        assert_eq!(chunks.len(), 5);
        for c in &chunks {
            assert_eq!(c.chars().count(), 10);
        }
    }

    #[test]
    fn test_non_whitespace_preserved() {
        let text = "First sentence. Second one!  Third, longer sentence here?\nA new line.";
        let chunks = chunk_text(text, 25, 0);
        let joined: String = chunks.concat();
        let wanted: String = normalize(text)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let got: String = joined.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(got, wanted);
    }

    #[test]
    fn test_all_chunks_bounded() {
        let text =
            "短句。".repeat(40) + &"long unbroken run without any terminator at all ".repeat(8);
        for (size, overlap) in [(500, 50), (30, 5), (12, 4)] {
            for c in chunk_text(&text, size, overlap) {
                assert!(c.chars().count() <= size);
                assert!(!c.is_empty());
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta! Epsilon?";
        assert_eq!(chunk_text(text, 12, 3), chunk_text(text, 12, 3));
    }
}
