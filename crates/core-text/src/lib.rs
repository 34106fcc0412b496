//! Text offset primitives shared by the mention engine.
//!
//! Every offset handled by the engine is a UTF-8 byte offset into a plain
//! `&str` buffer owned by the host input surface. Hosts may hand us offsets
//! that are past the end of the buffer or that land inside a multi-byte
//! sequence (stale selections, programmatic edits); callers are expected to run
//! them through [`clamp_offset`] / [`clamp_range`] before slicing so that no
//! operation panics on ordinary input.
//!
//! Grapheme stepping (`prev_grapheme_boundary` / `next_grapheme_boundary`) is
//! used by hosts that emulate the native single-step Backspace/Delete when the
//! span tracker declines to intercept an edit.

use unicode_segmentation::GraphemeCursor;

pub mod segment;
pub mod span;

pub use segment::{Segment, SegmentKind, segment_mentions};
pub use span::MentionSpan;

/// Clamp `offset` into `0..=text.len()` and floor it to the nearest char boundary.
pub fn clamp_offset(text: &str, offset: usize) -> usize {
    let mut idx = offset.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Clamp both ends of a (possibly reversed) range and return it ordered.
pub fn clamp_range(text: &str, a: usize, b: usize) -> (usize, usize) {
    let a = clamp_offset(text, a);
    let b = clamp_offset(text, b);
    if a <= b { (a, b) } else { (b, a) }
}

/// Replace `[start, end)` with `replacement`, returning the new buffer.
///
/// The range is clamped first, so out-of-range input degrades to an insertion
/// at the nearest valid position instead of panicking.
pub fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let (start, end) = clamp_range(text, start, end);
    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

/// Byte offset of the grapheme boundary preceding `offset` (0 at the start).
pub fn prev_grapheme_boundary(text: &str, offset: usize) -> usize {
    let offset = clamp_offset(text, offset);
    if offset == 0 {
        return 0;
    }
    let mut cursor = GraphemeCursor::new(offset, text.len(), true);
    match cursor.prev_boundary(text, 0) {
        Ok(Some(idx)) => idx,
        Ok(None) => 0,
        // Whole text supplied as one chunk; fall back to the previous char.
        Err(_) => clamp_offset(text, offset - 1),
    }
}

/// Byte offset of the grapheme boundary following `offset` (`text.len()` at the end).
pub fn next_grapheme_boundary(text: &str, offset: usize) -> usize {
    let offset = clamp_offset(text, offset);
    if offset >= text.len() {
        return text.len();
    }
    let mut cursor = GraphemeCursor::new(offset, text.len(), true);
    match cursor.next_boundary(text, 0) {
        Ok(Some(idx)) => idx,
        Ok(None) => text.len(),
        Err(_) => text[offset..]
            .chars()
            .next()
            .map(|c| offset + c.len_utf8())
            .unwrap_or(text.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_offset_floors_to_char_boundary() {
        let s = "a\u{e9}b"; // two-byte char at 1..3
        assert_eq!(clamp_offset(s, 2), 1);
        assert_eq!(clamp_offset(s, 3), 3);
        assert_eq!(clamp_offset(s, 99), s.len());
    }

    #[test]
    fn clamp_range_orders_reversed_input() {
        assert_eq!(clamp_range("hello", 4, 1), (1, 4));
        assert_eq!(clamp_range("hello", 3, 40), (3, 5));
    }

    #[test]
    fn splice_replaces_and_clamps() {
        assert_eq!(splice("Hi @Jo there", 3, 6, "@Jo Ng"), "Hi @Jo Ng there");
        assert_eq!(splice("abc", 10, 12, "!"), "abc!");
    }

    #[test]
    fn grapheme_boundaries_step_over_clusters() {
        let s = "xe\u{0301}y"; // e + combining acute forms a single cluster
        assert_eq!(next_grapheme_boundary(s, 1), 4);
        assert_eq!(prev_grapheme_boundary(s, 4), 1);
        assert_eq!(prev_grapheme_boundary(s, 0), 0);
        assert_eq!(next_grapheme_boundary(s, s.len()), s.len());
    }
}
