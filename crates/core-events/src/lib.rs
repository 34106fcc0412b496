//! Input event vocabulary shared between the host surface and the mention engine.
//!
//! The engine never talks to a concrete widget toolkit. Hosts translate their
//! native text-change, key, and focus notifications into [`InputEvent`]s and
//! feed them to one `MentionInput` per text field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicU64;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Each session owns one bounded mpsc channel. Producers are the host (input events) plus the
// session's own debounce timer and search tasks; all of them await `send`, so a slow consumer
// applies backpressure instead of dropping keystrokes. Timer/search tasks exit quietly when the
// channel has closed.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, process-wide. They are diagnostics only; engine behavior never reads
// them back.
// -------------------------------------------------------------------------------------------------
pub static SEARCHES_ISSUED: AtomicU64 = AtomicU64::new(0); // directory calls actually spawned
pub static SEARCHES_DEDUPED: AtomicU64 = AtomicU64::new(0); // requests folded into an in-flight call
pub static SEARCH_CACHE_HITS: AtomicU64 = AtomicU64::new(0);
pub static SEARCH_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static STALE_RESPONSES: AtomicU64 = AtomicU64::new(0); // responses discarded by seq check
pub static ATOMIC_DELETIONS: AtomicU64 = AtomicU64::new(0); // deletions widened to whole mentions
pub static SPANS_DROPPED: AtomicU64 = AtomicU64::new(0); // spans discarded by validation

/// Keys the engine may intercept. Everything printable arrives as `Char` and
/// always passes through to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
}

impl KeyCode {
    pub fn is_deletion(&self) -> bool {
        matches!(self, KeyCode::Backspace | KeyCode::Delete)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Printable keys are user content; only the discriminant is shown.
            KeyCode::Char(_) => f.write_str("Char"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Host selection as two byte offsets. `start == end` is a collapsed caret.
///
/// Hosts may report the anchor after the focus (backwards drag); consumers
/// normalize through [`Selection::ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn ordered(&self) -> (usize, usize) {
        if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        }
    }
}

/// Why the suggestion dropdown closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    Escape,
    Blur,
    OutsideClick,
    /// The `@query` token no longer ends at the caret.
    PatternLost,
    Committed,
    /// The search backing the dropdown failed.
    SearchFailed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Escape => "escape",
            CloseReason::Blur => "blur",
            CloseReason::OutsideClick => "outside_click",
            CloseReason::PatternLost => "pattern_lost",
            CloseReason::Committed => "committed",
            CloseReason::SearchFailed => "search_failed",
        }
    }
}

/// Normalized host notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// The buffer changed natively (typing, paste, programmatic set).
    TextChanged { text: String, caret: usize },
    /// A key press observed before its native default action. Without a
    /// selection the key applies at the surface's current caret.
    Key {
        key: KeyCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection: Option<Selection>,
    },
    Blur,
    OutsideClick,
}

impl InputEvent {
    pub fn text(text: impl Into<String>, caret: usize) -> Self {
        InputEvent::TextChanged {
            text: text.into(),
            caret,
        }
    }

    pub fn key(key: KeyCode, selection: Selection) -> Self {
        InputEvent::Key {
            key,
            selection: Some(selection),
        }
    }

    /// Key press at whatever the caret is when the event is processed.
    pub fn key_at_caret(key: KeyCode) -> Self {
        InputEvent::Key {
            key,
            selection: None,
        }
    }

    /// Stable label for logging without leaking buffer content.
    pub fn label(&self) -> &'static str {
        match self {
            InputEvent::TextChanged { .. } => "text_changed",
            InputEvent::Key { .. } => "key",
            InputEvent::Blur => "blur",
            InputEvent::OutsideClick => "outside_click",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_orders_backwards_drag() {
        let sel = Selection::new(9, 4);
        assert_eq!(sel.ordered(), (4, 9));
        assert!(!sel.is_collapsed());
        assert!(Selection::caret(3).is_collapsed());
    }

    #[test]
    fn key_display_hides_printable_content() {
        assert_eq!(format!("{}", KeyCode::Char('s')), "Char");
        assert_eq!(format!("{}", KeyCode::Backspace), "Backspace");
    }

    #[test]
    fn input_event_json_shape() {
        let ev: InputEvent =
            serde_json::from_str(r#"{"type":"key","key":"Backspace","selection":{"start":3,"end":3}}"#)
                .unwrap();
        assert_eq!(ev, InputEvent::key(KeyCode::Backspace, Selection::caret(3)));
        let ev: InputEvent = serde_json::from_str(r#"{"type":"text_changed","text":"hi @a","caret":5}"#)
            .unwrap();
        assert_eq!(ev.label(), "text_changed");
        let ev: InputEvent = serde_json::from_str(r#"{"type":"key","key":"Delete"}"#).unwrap();
        assert_eq!(ev, InputEvent::key_at_caret(KeyCode::Delete));
        let ev: InputEvent = serde_json::from_str(r#"{"type":"blur"}"#).unwrap();
        assert_eq!(ev, InputEvent::Blur);
    }
}
