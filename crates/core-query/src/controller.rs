//! Live-search state machine for the suggestion dropdown.
//!
//! States: `Idle -> Searching -> Open -> (commit | close) -> Idle`.
//!
//! * `Searching` holds the token that triggered it and a sequence number. Every
//!   new token bumps the sequence and asks the host to (re)arm the debounce
//!   timer; timers and responses carrying an older sequence are ignored.
//! * `Open` holds the accepted candidate list and the wrapping selection.
//!
//! The controller owns no clock and no tasks. It reports what the host must do
//! through [`QueryEffect`] and is driven back by `on_debounce_elapsed` and
//! `on_search_resolved`, which keeps it deterministic under test.

use crate::token::{QueryToken, detect_token};
use crate::{SearchError, SearchRequest};
use core_config::SearchSettings;
use core_events::{CloseReason, KeyCode, SEARCH_FAILURES, STALE_RESPONSES};
use core_state::{Insertion, SpanTracker, UserCandidate};
use core_text::MentionSpan;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Coarse state for hosts rendering the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    Idle,
    Searching,
    Open,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Searching {
        token: QueryToken,
        seq: u64,
        fired: bool,
    },
    Open {
        token: QueryToken,
        seq: u64,
        candidates: Vec<UserCandidate>,
        selected: usize,
    },
}

/// Timer bookkeeping the host performs on the controller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEffect {
    None,
    /// Replace any pending debounce timer with one firing `seq` after `delay`.
    Schedule { seq: u64, delay: Duration },
    /// Drop the pending debounce timer.
    Cancel,
}

/// What happened to a search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Not ours; the host applies its default behavior.
    PassThrough,
    Navigated { selected: usize },
    Closed { effect: QueryEffect },
    Committed(Insertion),
}

/// Read-only view of the dropdown for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropdownView<'a> {
    pub state: QueryState,
    pub token: Option<&'a QueryToken>,
    pub candidates: &'a [UserCandidate],
    pub selected: Option<usize>,
}

#[derive(Debug)]
pub struct QueryController {
    phase: Phase,
    next_seq: u64,
    debounce: Duration,
    max_candidates: usize,
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(SearchSettings::default())
    }
}

impl QueryController {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            phase: Phase::Idle,
            next_seq: 0,
            debounce: settings.debounce,
            max_candidates: settings.max_candidates.max(1),
        }
    }

    pub fn state(&self) -> QueryState {
        match self.phase {
            Phase::Idle => QueryState::Idle,
            Phase::Searching { .. } => QueryState::Searching,
            Phase::Open { .. } => QueryState::Open,
        }
    }

    pub fn token(&self) -> Option<&QueryToken> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Searching { token, .. } | Phase::Open { token, .. } => Some(token),
        }
    }

    /// Sequence number of the request the controller is waiting on or showing.
    pub fn live_seq(&self) -> Option<u64> {
        match self.phase {
            Phase::Idle => None,
            Phase::Searching { seq, .. } | Phase::Open { seq, .. } => Some(seq),
        }
    }

    pub fn candidates(&self) -> &[UserCandidate] {
        match &self.phase {
            Phase::Open { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn selected(&self) -> Option<usize> {
        match &self.phase {
            Phase::Open {
                candidates,
                selected,
                ..
            } if !candidates.is_empty() => Some(*selected),
            _ => None,
        }
    }

    pub fn view(&self) -> DropdownView<'_> {
        DropdownView {
            state: self.state(),
            token: self.token(),
            candidates: self.candidates(),
            selected: self.selected(),
        }
    }

    /// Re-detect the token after any text or caret change.
    pub fn on_text_change(
        &mut self,
        text: &str,
        caret: usize,
        spans: &[MentionSpan],
    ) -> QueryEffect {
        let Some(token) = detect_token(text, caret, spans) else {
            return self.close(CloseReason::PatternLost);
        };
        if self.token() == Some(&token) {
            return QueryEffect::None;
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        debug!(
            target: "query.controller",
            seq,
            anchor = token.anchor,
            query_len = token.query.len(),
            from = ?self.state(),
            "search_scheduled"
        );
        self.phase = Phase::Searching {
            token,
            seq,
            fired: false,
        };
        QueryEffect::Schedule {
            seq,
            delay: self.debounce,
        }
    }

    /// The debounce timer for `seq` fired. Only the live, unfired sequence yields a request.
    pub fn on_debounce_elapsed(&mut self, seq: u64) -> Option<SearchRequest> {
        let live = self.live_seq();
        if let Phase::Searching {
            token,
            seq: pending,
            fired,
        } = &mut self.phase
            && *pending == seq
            && !*fired
        {
            *fired = true;
            trace!(target: "query.controller", seq, query_len = token.query.len(), "search_fired");
            return Some(SearchRequest {
                seq,
                prefix: token.query.clone(),
            });
        }
        trace!(target: "query.controller", seq, ?live, "timer_ignored");
        None
    }

    /// Apply a search response. Anything not answering the live request is stale.
    pub fn on_search_resolved(
        &mut self,
        seq: u64,
        result: Result<Vec<UserCandidate>, SearchError>,
    ) -> Resolution {
        let awaiting = matches!(
            self.phase,
            Phase::Searching { seq: live, fired: true, .. } if live == seq
        );
        if !awaiting {
            STALE_RESPONSES.fetch_add(1, Ordering::Relaxed);
            debug!(target: "query.search", seq, live = ?self.live_seq(), "stale_response_dropped");
            return Resolution::Stale;
        }
        let Phase::Searching { token, .. } = std::mem::take(&mut self.phase) else {
            return Resolution::Stale;
        };
        match result {
            Ok(mut candidates) => {
                candidates.truncate(self.max_candidates);
                debug!(target: "query.search", seq, results = candidates.len(), "dropdown_open");
                self.phase = Phase::Open {
                    token,
                    seq,
                    candidates,
                    selected: 0,
                };
                Resolution::Applied
            }
            Err(error) => {
                SEARCH_FAILURES.fetch_add(1, Ordering::Relaxed);
                warn!(target: "query.search", seq, %error, "search_failed");
                debug!(target: "query.controller", reason = CloseReason::SearchFailed.as_str(), "dropdown_closed");
                Resolution::Failed
            }
        }
    }

    /// Keyboard handling. Navigation and commit only apply while `Open`;
    /// Escape also aborts a pending search.
    pub fn handle_key(
        &mut self,
        key: KeyCode,
        buffer: &str,
        tracker: &mut SpanTracker,
    ) -> KeyDisposition {
        let state = self.state();
        let len = self.candidates().len();
        let listing = state == QueryState::Open && len > 0;
        match key {
            KeyCode::Down | KeyCode::Up if listing => {
                let Phase::Open { selected, .. } = &mut self.phase else {
                    return KeyDisposition::PassThrough;
                };
                *selected = if key == KeyCode::Down {
                    (*selected + 1) % len
                } else {
                    (*selected + len - 1) % len
                };
                let selected = *selected;
                trace!(target: "query.controller", selected, len, "selection_moved");
                KeyDisposition::Navigated { selected }
            }
            KeyCode::Enter | KeyCode::Tab if listing => {
                match self.commit_selected(buffer, tracker) {
                    Some(ins) => KeyDisposition::Committed(ins),
                    None => KeyDisposition::PassThrough,
                }
            }
            KeyCode::Esc if state != QueryState::Idle => KeyDisposition::Closed {
                effect: self.close(CloseReason::Escape),
            },
            _ => KeyDisposition::PassThrough,
        }
    }

    /// Commit the highlighted candidate.
    pub fn commit_selected(
        &mut self,
        buffer: &str,
        tracker: &mut SpanTracker,
    ) -> Option<Insertion> {
        let index = self.selected()?;
        self.commit_at(index, buffer, tracker)
    }

    /// Commit the candidate at `index` (pointer selection in the popup).
    pub fn commit_at(
        &mut self,
        index: usize,
        buffer: &str,
        tracker: &mut SpanTracker,
    ) -> Option<Insertion> {
        let (token, user) = match &self.phase {
            Phase::Open {
                token, candidates, ..
            } => (token.clone(), candidates.get(index)?.clone()),
            _ => return None,
        };
        self.phase = Phase::Idle;
        let ins = tracker.insert_mention(buffer, token.anchor, token.query.len(), &user);
        debug!(
            target: "query.controller",
            index,
            anchor = token.anchor,
            replaced_len = token.replaced_len(),
            inserted_len = ins.span.len(),
            reason = CloseReason::Committed.as_str(),
            "mention_committed"
        );
        Some(ins)
    }

    /// Force `Idle`. Returns `Cancel` when a debounce timer was still pending.
    pub fn close(&mut self, reason: CloseReason) -> QueryEffect {
        let effect = match self.phase {
            Phase::Idle => return QueryEffect::None,
            Phase::Searching { fired: false, .. } => QueryEffect::Cancel,
            _ => QueryEffect::None,
        };
        debug!(target: "query.controller", reason = reason.as_str(), live = ?self.live_seq(), "dropdown_closed");
        self.phase = Phase::Idle;
        effect
    }
}
