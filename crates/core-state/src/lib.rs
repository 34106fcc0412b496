//! Mention span tracker: the mutable span list for one text buffer.
//!
//! The tracker is the only place spans are created or destroyed. It keeps
//! three promises after every public call:
//! * every span satisfies `text[start..end] == display_name` for the latest
//!   buffer the tracker has seen;
//! * no two spans share a byte;
//! * a mention is never left half-erased by a deletion the tracker handled.
//!
//! Edit paths:
//! * `on_external_text_change`: blunt validation after a native edit the
//!   tracker did not perform (typing, paste, programmatic set). Spans are never
//!   shifted or repaired here, only kept or dropped.
//! * `intercept_deletion`: consulted before a Backspace/Delete applies
//!   natively. Returns `None` when the native edit cannot cut a mention;
//!   otherwise performs the (possibly widened) removal itself and returns the
//!   next text and caret for the host to apply in one step.
//! * `insert_mention`: splices canonical `@First Last` text over an `@query`
//!   token and registers the span. Spans overlapping the replaced token or
//!   straddling its anchor are dropped; later spans shift by the length delta.
//!
//! Offsets are UTF-8 byte offsets. Out-of-range input is clamped via
//! `core_text::clamp_range` before any slicing.
//!
//! Telemetry: atomic deletions and dropped spans bump the relaxed counters in
//! `core_events`; trace events use target `state.spans` and never carry text.

use core_events::{ATOMIC_DELETIONS, SPANS_DROPPED};
use core_text::span::{self, MentionSpan};
use core_text::{clamp_offset, clamp_range, splice};
use std::ops::Range;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

mod records;
pub use records::{MentionRecord, UserCandidate};

/// Which side of the caret a deletion key removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteDirection {
    /// Backspace: the grapheme left of the caret.
    Backward,
    /// Delete: the grapheme right of the caret.
    Forward,
}

/// Result of a deletion the tracker performed instead of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub text: String,
    pub caret: usize,
    /// Byte range removed from the buffer the host supplied.
    pub removed: Range<usize>,
}

/// Result of committing a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub text: String,
    pub caret: usize,
    pub span: MentionSpan,
}

#[derive(Debug, Clone, Default)]
pub struct SpanTracker {
    spans: Vec<MentionSpan>,
}

impl SpanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current spans in insertion order.
    pub fn spans(&self) -> &[MentionSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Spans ordered by `start`.
    pub fn sorted_spans(&self) -> Vec<MentionSpan> {
        let mut out = self.spans.clone();
        out.sort_by_key(|s| s.start);
        out
    }

    /// Submission triples ordered by `start`.
    pub fn mention_records(&self) -> Vec<MentionRecord> {
        self.sorted_spans()
            .into_iter()
            .map(|s| MentionRecord {
                user_id: s.user_id,
                start: s.start,
                end: s.end,
            })
            .collect()
    }

    /// Keep only spans that still agree with `new_text`.
    pub fn on_external_text_change(&mut self, new_text: &str, caret: usize) -> &[MentionSpan] {
        self.validate(new_text, caret, "external_change");
        &self.spans
    }

    /// Decide whether a Backspace/Delete must be performed atomically.
    ///
    /// * Collapsed caret: a span hit by the key (`start < caret <= end` for
    ///   Backspace, `start <= caret < end` for Delete) is removed whole.
    /// * Selection: the range widens to cover every span it touches.
    ///
    /// Returns `None` when no span is affected and the native edit should run.
    pub fn intercept_deletion(
        &mut self,
        buffer: &str,
        selection_start: usize,
        selection_end: usize,
        direction: DeleteDirection,
    ) -> Option<Splice> {
        let (a, b) = clamp_range(buffer, selection_start, selection_end);
        // Spans must describe this buffer before they can steer the deletion.
        self.validate(buffer, b, "pre_deletion");

        let removed = if a == b {
            let hit = self.spans.iter().find(|s| match direction {
                DeleteDirection::Backward => s.hit_by_backspace(a),
                DeleteDirection::Forward => s.hit_by_delete(a),
            })?;
            hit.range()
        } else {
            span::widen_to_spans(&self.spans, a, b)?
        };

        let text = splice(buffer, removed.start, removed.end, "");
        let removed_spans = span::apply_removal(&mut self.spans, removed.clone());
        ATOMIC_DELETIONS.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "state.spans",
            ?direction,
            sel_start = a,
            sel_end = b,
            removed_start = removed.start,
            removed_end = removed.end,
            widened = removed.start < a || removed.end > b,
            removed_spans,
            remaining = self.spans.len(),
            "atomic_deletion"
        );
        self.validate(&text, removed.start, "post_deletion");
        Some(Splice {
            text,
            caret: removed.start,
            removed,
        })
    }

    /// Replace `[anchor, anchor + 1 + query_len)` with `user`'s canonical mention text.
    pub fn insert_mention(
        &mut self,
        buffer: &str,
        anchor: usize,
        query_len: usize,
        user: &UserCandidate,
    ) -> Insertion {
        let start = clamp_offset(buffer, anchor);
        let end = clamp_offset(buffer, start.saturating_add(1).saturating_add(query_len));
        let inserted = user.mention_text();
        let text = splice(buffer, start, end, &inserted);
        let delta = inserted.len() as isize - (end - start) as isize;

        let before = self.spans.len();
        self.spans
            .retain(|s| !s.touches(start, end) && !(s.start < start && start < s.end));
        let straddling = before - self.spans.len();
        if straddling > 0 {
            SPANS_DROPPED.fetch_add(straddling as u64, Ordering::Relaxed);
        }
        span::shift_from(&mut self.spans, start, delta);

        let span = MentionSpan::new(user.user_id.clone(), start, inserted);
        self.spans.push(span.clone());
        trace!(
            target: "state.spans",
            anchor = start,
            replaced_len = end - start,
            inserted_len = span.len(),
            delta,
            straddling,
            total = self.spans.len(),
            "mention_inserted"
        );
        self.validate(&text, span.end, "post_insert");
        Insertion {
            caret: span.end,
            text,
            span,
        }
    }

    /// Load persisted spans for an existing buffer (editing a saved post).
    ///
    /// Fails closed: a span that disagrees with `text` or overlaps an earlier
    /// restored span is dropped. Returns how many were dropped.
    pub fn restore(&mut self, text: &str, spans: impl IntoIterator<Item = MentionSpan>) -> usize {
        self.spans.clear();
        let mut dropped = 0usize;
        for candidate in spans {
            let overlaps = self
                .spans
                .iter()
                .any(|s| s.touches(candidate.start, candidate.end));
            if candidate.agrees_with(text) && !overlaps {
                self.spans.push(candidate);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            SPANS_DROPPED.fetch_add(dropped as u64, Ordering::Relaxed);
        }
        debug!(target: "state.spans", restored = self.spans.len(), dropped, "spans_restored");
        dropped
    }

    /// Restore from backend triples, reading display names back out of `text`.
    ///
    /// A record only qualifies when its range is valid and the covered text
    /// starts with the `@` trigger.
    pub fn restore_records(
        &mut self,
        text: &str,
        records: impl IntoIterator<Item = MentionRecord>,
    ) -> usize {
        let mut rejected = 0usize;
        let mut spans = Vec::new();
        for rec in records {
            match text.get(rec.start..rec.end) {
                Some(name) if rec.start < rec.end && name.starts_with('@') => {
                    spans.push(MentionSpan::new(rec.user_id, rec.start, name));
                }
                _ => rejected += 1,
            }
        }
        if rejected > 0 {
            SPANS_DROPPED.fetch_add(rejected as u64, Ordering::Relaxed);
        }
        rejected + self.restore(text, spans)
    }

    fn validate(&mut self, text: &str, caret: usize, phase: &'static str) {
        let dropped = span::retain_valid(&mut self.spans, text);
        if dropped > 0 {
            SPANS_DROPPED.fetch_add(dropped as u64, Ordering::Relaxed);
            debug!(
                target: "state.spans",
                phase,
                dropped,
                remaining = self.spans.len(),
                caret,
                text_len = text.len(),
                "spans_invalidated"
            );
        }
    }
}
