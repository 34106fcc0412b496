//! Mention span geometry.
//!
//! Stateless helpers over `[MentionSpan]` slices: which spans a byte range
//! touches, how a deletion must be widened so that no mention is cut in half,
//! shifting spans after an edit, and validating spans against a buffer.
//!
//! Ranges are half-open `[start, end)` byte ranges. A span "touches" a range
//! when the two share at least one byte; an empty range touches nothing.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::Range;

/// A mention's canonical text position inside one buffer.
///
/// Valid while `text[start..end] == display_name`; the tracker drops a span the
/// moment that stops holding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MentionSpan {
    pub user_id: String,
    pub start: usize,
    pub end: usize,
    pub display_name: String,
}

impl MentionSpan {
    pub fn new(
        user_id: impl Into<String>,
        start: usize,
        display_name: impl Into<String>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            user_id: user_id.into(),
            start,
            end: start + display_name.len(),
            display_name,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the span shares at least one byte with `[start, end)`.
    pub fn touches(&self, start: usize, end: usize) -> bool {
        start < end && self.start < end && start < self.end
    }

    /// Backspace at `caret` would remove a byte of this span.
    pub fn hit_by_backspace(&self, caret: usize) -> bool {
        self.start < caret && caret <= self.end
    }

    /// Forward delete at `caret` would remove a byte of this span.
    pub fn hit_by_delete(&self, caret: usize) -> bool {
        self.start <= caret && caret < self.end
    }

    /// Text-agreement check: in range, on char boundaries, and spelling `display_name`.
    pub fn agrees_with(&self, text: &str) -> bool {
        self.start < self.end
            && self.end - self.start == self.display_name.len()
            && text.get(self.start..self.end) == Some(self.display_name.as_str())
    }
}

/// Indices of every span touching `[start, end)`.
pub fn touching(spans: &[MentionSpan], start: usize, end: usize) -> SmallVec<[usize; 4]> {
    spans
        .iter()
        .enumerate()
        .filter(|(_, s)| s.touches(start, end))
        .map(|(i, _)| i)
        .collect()
}

/// Smallest range covering `[start, end)` and every span it touches.
///
/// Returns `None` when no span is touched, i.e. the edit can proceed natively.
pub fn widen_to_spans(spans: &[MentionSpan], start: usize, end: usize) -> Option<Range<usize>> {
    let hit = touching(spans, start, end);
    if hit.is_empty() {
        return None;
    }
    let lo = hit.iter().map(|&i| spans[i].start).fold(start, usize::min);
    let hi = hit.iter().map(|&i| spans[i].end).fold(end, usize::max);
    Some(lo..hi)
}

/// Shift every span starting at or after `from` by `delta` bytes.
///
/// Offsets saturate at zero; a span pushed out of shape this way fails the
/// next agreement check instead of wrapping.
pub fn shift_from(spans: &mut [MentionSpan], from: usize, delta: isize) {
    if delta == 0 {
        return;
    }
    for span in spans.iter_mut().filter(|s| s.start >= from) {
        span.start = span.start.saturating_add_signed(delta);
        span.end = span.end.saturating_add_signed(delta);
    }
}

/// Apply the removal of `removed` to a span list.
///
/// Spans after the range shift left, spans before it stay, and any span sharing
/// a byte with the range is dropped whole. Returns how many were dropped.
pub fn apply_removal(spans: &mut Vec<MentionSpan>, removed: Range<usize>) -> usize {
    let before = spans.len();
    spans.retain(|s| !s.touches(removed.start, removed.end));
    let len = removed.end - removed.start;
    for span in spans.iter_mut().filter(|s| s.start >= removed.end) {
        span.start -= len;
        span.end -= len;
    }
    before - spans.len()
}

/// Drop every span that no longer agrees with `text`. Returns how many were dropped.
pub fn retain_valid(spans: &mut Vec<MentionSpan>, text: &str) -> usize {
    let before = spans.len();
    spans.retain(|s| s.agrees_with(text));
    before - spans.len()
}

/// True when no two spans share a byte.
pub fn is_disjoint(spans: &[MentionSpan]) -> bool {
    let mut ranges: SmallVec<[(usize, usize); 8]> =
        spans.iter().map(|s| (s.start, s.end)).collect();
    ranges.sort_unstable();
    ranges.windows(2).all(|w| w[0].1 <= w[1].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ann_lee() -> (String, Vec<MentionSpan>) {
        let text = "Hi @Ann Lee how are you".to_string();
        let spans = vec![MentionSpan::new("u-ann", 3, "@Ann Lee")];
        (text, spans)
    }

    #[test]
    fn new_derives_end_from_display_name() {
        let span = MentionSpan::new("u1", 3, "@Ann Lee");
        assert_eq!(span.range(), 3..11);
        assert_eq!(span.len(), 8);
    }

    #[test]
    fn caret_hit_rules_are_asymmetric() {
        let (_, spans) = ann_lee();
        let s = &spans[0];
        assert!(!s.hit_by_backspace(3));
        assert!(s.hit_by_backspace(11));
        assert!(s.hit_by_delete(3));
        assert!(!s.hit_by_delete(11));
    }

    #[test]
    fn widen_covers_grazed_span() {
        let (_, spans) = ann_lee();
        assert_eq!(widen_to_spans(&spans, 5, 7), Some(3..11));
        assert_eq!(widen_to_spans(&spans, 0, 4), Some(0..11));
        assert_eq!(widen_to_spans(&spans, 11, 15), None);
        assert_eq!(widen_to_spans(&spans, 5, 5), None);
    }

    #[test]
    fn empty_range_touches_nothing() {
        let span = MentionSpan::new("u-ann", 3, "@Ann Lee");
        assert!(!span.touches(5, 5));
        assert!(!span.touches(3, 3));
        assert!(span.touches(5, 6));
        assert!(touching(&[span], 7, 7).is_empty());
    }

    #[test]
    fn removal_drops_touched_and_shifts_rest() {
        let mut spans = vec![
            MentionSpan::new("a", 0, "@Ann"),
            MentionSpan::new("b", 8, "@Bob"),
            MentionSpan::new("c", 14, "@Cy"),
        ];
        let dropped = apply_removal(&mut spans, 8..12);
        assert_eq!(dropped, 1);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].range(), 0..4);
        assert_eq!(spans[1].range(), 10..13);
    }

    #[test]
    fn shift_only_moves_spans_at_or_after_pivot() {
        let mut spans = vec![MentionSpan::new("a", 0, "@Ann"), MentionSpan::new("b", 8, "@Bob")];
        shift_from(&mut spans, 4, 6);
        assert_eq!(spans[0].range(), 0..4);
        assert_eq!(spans[1].range(), 14..18);
        shift_from(&mut spans, 0, -20);
        assert_eq!(spans[0].range(), 0..0);
    }

    #[test]
    fn agreement_rejects_drift_and_bad_boundaries() {
        let (text, mut spans) = ann_lee();
        assert!(spans[0].agrees_with(&text));
        spans[0].start += 1;
        assert!(!spans[0].agrees_with(&text));
        let odd = MentionSpan {
            user_id: "x".into(),
            start: 1,
            end: 2,
            display_name: "?".into(),
        };
        assert!(!odd.agrees_with("a\u{e9}b"));
    }

    #[test]
    fn retain_valid_is_idempotent() {
        let (text, mut spans) = ann_lee();
        spans.push(MentionSpan::new("ghost", 15, "@Nobody"));
        assert_eq!(retain_valid(&mut spans, &text), 1);
        let snapshot = spans.clone();
        assert_eq!(retain_valid(&mut spans, &text), 0);
        assert_eq!(spans, snapshot);
    }

    #[test]
    fn disjointness() {
        let a = MentionSpan::new("a", 0, "@Ann");
        let b = MentionSpan::new("b", 4, "@Bob");
        let c = MentionSpan::new("c", 2, "@Cy");
        assert!(is_disjoint(&[b.clone(), a.clone()]));
        assert!(!is_disjoint(&[a, b, c]));
    }
}
