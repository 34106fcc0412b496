//! Highlight segmentation for rendering mention chips.
//!
//! Contract:
//! - Input: the buffer and the current span list (any order).
//! - Output: contiguous segments in buffer order covering the entire string.
//!   Mention segments correspond one-to-one with spans that agree with the
//!   text; everything else is `Plain`.
//! - Spans that fail the agreement check or overlap an earlier span are
//!   rendered as plain text rather than trusted.
//! - Safety: segments carry offsets only, never copies of the text.

use crate::span::MentionSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Plain,
    Mention { user_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: usize, // byte offset (inclusive)
    pub end: usize,   // byte offset (exclusive)
}

impl Segment {
    pub fn is_mention(&self) -> bool {
        matches!(self.kind, SegmentKind::Mention { .. })
    }

    pub fn text<'a>(&self, buffer: &'a str) -> &'a str {
        buffer.get(self.start..self.end).unwrap_or("")
    }
}

/// Split `text` into plain and mention runs.
pub fn segment_mentions(text: &str, spans: &[MentionSpan]) -> Vec<Segment> {
    let mut ordered: Vec<&MentionSpan> = spans.iter().filter(|s| s.agrees_with(text)).collect();
    ordered.sort_by_key(|s| s.start);

    let mut out = Vec::with_capacity(ordered.len() * 2 + 1);
    let mut cursor = 0usize;
    for span in ordered {
        if span.start < cursor {
            continue;
        }
        if span.start > cursor {
            out.push(Segment {
                kind: SegmentKind::Plain,
                start: cursor,
                end: span.start,
            });
        }
        out.push(Segment {
            kind: SegmentKind::Mention {
                user_id: span.user_id.clone(),
            },
            start: span.start,
            end: span.end,
        });
        cursor = span.end;
    }
    if cursor < text.len() {
        out.push(Segment {
            kind: SegmentKind::Plain,
            start: cursor,
            end: text.len(),
        });
    }
    out
}
