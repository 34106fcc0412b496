//! Per-surface mention model.
//!
//! `MentionInput` binds one text buffer to its `SpanTracker` and
//! `QueryController`. Hosts forward native notifications into it and apply the
//! returned [`Edit`] (next text + next caret) atomically, so the caret never
//! has to be re-synced after the engine rewrites the buffer.
//!
//! Invariants after every public call:
//! * `caret <= text.len()` and sits on a char boundary;
//! * the tracker's spans describe `text`;
//! * the controller's token (if any) was detected against `text`.
//!
//! Events are logged under target `model.input` with lengths and offsets only.

use core_events::{CloseReason, KeyCode, Selection};
use core_query::{
    DropdownView, KeyDisposition, QueryController, QueryEffect, QueryState, Resolution,
    SearchError, SearchRequest,
};
use core_state::{DeleteDirection, Insertion, MentionRecord, SpanTracker, UserCandidate};
use core_text::{MentionSpan, Segment, clamp_offset, segment_mentions};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

pub use core_config::SearchSettings;

/// Text and caret the host must apply in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub text: String,
    pub caret: usize,
}

/// Result of routing a key through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    /// The engine consumed the key; the host must suppress its default action.
    pub handled: bool,
    pub edit: Option<Edit>,
    pub effect: QueryEffect,
}

impl KeyOutcome {
    fn pass() -> Self {
        Self {
            handled: false,
            edit: None,
            effect: QueryEffect::None,
        }
    }

    fn consumed(effect: QueryEffect) -> Self {
        Self {
            handled: true,
            edit: None,
            effect,
        }
    }
}

/// Outbound payload: the raw text plus mention triples positioned against it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Submission {
    pub text: String,
    pub mentions: Vec<MentionRecord>,
}

/// Callback invoked with every newly committed mention.
pub type CommitHook = Box<dyn FnMut(&MentionSpan) + Send>;

#[derive(Default)]
pub struct MentionInput {
    text: String,
    caret: usize,
    tracker: SpanTracker,
    query: QueryController,
    on_commit: Option<CommitHook>,
}

impl fmt::Debug for MentionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MentionInput")
            .field("text_len", &self.text.len())
            .field("caret", &self.caret)
            .field("spans", &self.tracker.len())
            .field("query", &self.query.state())
            .finish()
    }
}

impl MentionInput {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            text: String::new(),
            caret: 0,
            tracker: SpanTracker::new(),
            query: QueryController::new(settings),
            on_commit: None,
        }
    }

    pub fn with_commit_hook(mut self, hook: impl FnMut(&MentionSpan) + Send + 'static) -> Self {
        self.on_commit = Some(Box::new(hook));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn spans(&self) -> &[MentionSpan] {
        self.tracker.spans()
    }

    pub fn query_state(&self) -> QueryState {
        self.query.state()
    }

    pub fn view(&self) -> DropdownView<'_> {
        self.query.view()
    }

    /// Plain and mention runs covering the whole buffer, for chip rendering.
    pub fn highlight_segments(&self) -> Vec<Segment> {
        segment_mentions(&self.text, self.tracker.spans())
    }

    /// Native edit or caret move reported by the host.
    pub fn on_text_change(&mut self, text: impl Into<String>, caret: usize) -> QueryEffect {
        self.text = text.into();
        self.caret = clamp_offset(&self.text, caret);
        self.tracker.on_external_text_change(&self.text, self.caret);
        self.redetect()
    }

    /// Route a key before the host applies its default action.
    pub fn on_key(&mut self, key: KeyCode, selection: Selection) -> KeyOutcome {
        if key.is_deletion() {
            let direction = if key == KeyCode::Backspace {
                DeleteDirection::Backward
            } else {
                DeleteDirection::Forward
            };
            let (start, end) = selection.ordered();
            let Some(splice) = self
                .tracker
                .intercept_deletion(&self.text, start, end, direction)
            else {
                return KeyOutcome::pass();
            };
            debug!(
                target: "model.input",
                %key,
                removed_start = splice.removed.start,
                removed_end = splice.removed.end,
                "deletion_handled"
            );
            self.text = splice.text;
            self.caret = splice.caret;
            let effect = self.redetect();
            return KeyOutcome {
                handled: true,
                edit: Some(self.edit()),
                effect,
            };
        }

        match self.query.handle_key(key, &self.text, &mut self.tracker) {
            KeyDisposition::PassThrough => KeyOutcome::pass(),
            KeyDisposition::Navigated { .. } => KeyOutcome::consumed(QueryEffect::None),
            KeyDisposition::Closed { effect } => KeyOutcome::consumed(effect),
            KeyDisposition::Committed(ins) => KeyOutcome {
                handled: true,
                edit: Some(self.apply_insertion(ins)),
                effect: QueryEffect::None,
            },
        }
    }

    /// Pointer selection of the candidate at `index` in the open dropdown.
    pub fn commit_candidate(&mut self, index: usize) -> Option<Edit> {
        let ins = self.query.commit_at(index, &self.text, &mut self.tracker)?;
        Some(self.apply_insertion(ins))
    }

    pub fn on_blur(&mut self) -> QueryEffect {
        self.query.close(CloseReason::Blur)
    }

    pub fn on_outside_click(&mut self) -> QueryEffect {
        self.query.close(CloseReason::OutsideClick)
    }

    pub fn on_debounce_elapsed(&mut self, seq: u64) -> Option<SearchRequest> {
        self.query.on_debounce_elapsed(seq)
    }

    pub fn on_search_resolved(
        &mut self,
        seq: u64,
        result: Result<Vec<UserCandidate>, SearchError>,
    ) -> Resolution {
        self.query.on_search_resolved(seq, result)
    }

    /// Load a saved post for editing. Mentions that do not match `text` are
    /// dropped; returns how many, plus the effect of closing any open query.
    pub fn restore(
        &mut self,
        text: impl Into<String>,
        mentions: impl IntoIterator<Item = MentionRecord>,
    ) -> (usize, QueryEffect) {
        let effect = self.query.close(CloseReason::PatternLost);
        self.text = text.into();
        self.caret = self.text.len();
        let dropped = self.tracker.restore_records(&self.text, mentions);
        debug!(
            target: "model.input",
            text_len = self.text.len(),
            spans = self.tracker.len(),
            dropped,
            "input_restored"
        );
        (dropped, effect)
    }

    pub fn submission(&self) -> Submission {
        Submission {
            text: self.text.clone(),
            mentions: self.tracker.mention_records(),
        }
    }

    /// Clear text, spans and any open query (e.g. after a successful post).
    pub fn reset(&mut self) -> QueryEffect {
        self.text.clear();
        self.caret = 0;
        self.tracker.clear();
        self.query.close(CloseReason::PatternLost)
    }

    fn redetect(&mut self) -> QueryEffect {
        self.query
            .on_text_change(&self.text, self.caret, self.tracker.spans())
    }

    fn edit(&self) -> Edit {
        Edit {
            text: self.text.clone(),
            caret: self.caret,
        }
    }

    fn apply_insertion(&mut self, ins: Insertion) -> Edit {
        self.text = ins.text;
        self.caret = ins.caret;
        trace!(
            target: "model.input",
            start = ins.span.start,
            end = ins.span.end,
            text_len = self.text.len(),
            "mention_applied"
        );
        if let Some(hook) = self.on_commit.as_mut() {
            hook(&ins.span);
        }
        self.edit()
    }
}
