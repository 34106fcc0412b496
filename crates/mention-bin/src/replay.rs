//! Script replay: a tiny emulated input surface driving one `MentionSession`.
//!
//! The surface plays the host's part. It owns the visible text and caret,
//! routes every key through the session first, applies engine edits verbatim
//! and otherwise performs the native default (insert, single-grapheme delete,
//! caret move) before reporting the change back.

use anyhow::{Context, Result};
use core_events::{KeyCode, Selection};
use core_input::{MentionSession, UserDirectory};
use core_model::{Edit, SearchSettings, Submission};
use core_state::{MentionRecord, UserCandidate};
use core_text::{clamp_offset, clamp_range, next_grapheme_boundary, prev_grapheme_boundary, splice};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Replace the whole buffer (paste, programmatic set). Caret defaults to the end.
    Text {
        text: String,
        #[serde(default)]
        caret: Option<usize>,
    },
    /// Type each char at the caret as separate native edits.
    Type { text: String },
    /// A key press; the selection defaults to the collapsed caret.
    Key {
        key: KeyCode,
        #[serde(default)]
        selection: Option<Selection>,
    },
    Wait { ms: u64 },
    Blur,
    OutsideClick,
    /// Pointer commit of the dropdown row at `index`.
    Click { index: usize },
    Restore {
        text: String,
        #[serde(default)]
        mentions: Vec<MentionRecord>,
    },
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))
}

pub fn load_users(path: &Path) -> Result<Vec<UserCandidate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading users {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing users {}", path.display()))
}

#[derive(Debug, Default)]
struct Surface {
    text: String,
    caret: usize,
}

impl Surface {
    fn apply(&mut self, edit: Edit) {
        self.text = edit.text;
        self.caret = edit.caret;
    }

    /// Native default for a key the engine let through. Returns whether the
    /// text or caret changed.
    fn native_key(&mut self, key: KeyCode, selection: Selection) -> bool {
        let (a, b) = clamp_range(&self.text, selection.start, selection.end);
        let (lo, hi, insert) = match key {
            KeyCode::Char(c) => (a, b, Some(c)),
            KeyCode::Enter => (a, b, Some('\n')),
            KeyCode::Backspace if a == b => (prev_grapheme_boundary(&self.text, a), a, None),
            KeyCode::Delete if a == b => (a, next_grapheme_boundary(&self.text, a), None),
            KeyCode::Backspace | KeyCode::Delete => (a, b, None),
            KeyCode::Left => {
                self.caret = if a == b { prev_grapheme_boundary(&self.text, a) } else { a };
                return true;
            }
            KeyCode::Right => {
                self.caret = if a == b { next_grapheme_boundary(&self.text, b) } else { b };
                return true;
            }
            KeyCode::Esc | KeyCode::Tab | KeyCode::Up | KeyCode::Down => return false,
        };
        if lo == hi && insert.is_none() {
            return false;
        }
        let replacement = insert.map(String::from).unwrap_or_default();
        self.text = splice(&self.text, lo, hi, &replacement);
        self.caret = lo + replacement.len();
        true
    }
}

/// Replay `steps` and return the final submission. The session is disposed
/// before returning.
pub async fn replay<D: UserDirectory>(
    directory: Arc<D>,
    settings: SearchSettings,
    steps: Vec<Step>,
) -> Submission {
    let mut session = MentionSession::new(directory, settings);
    let mut surface = Surface::default();

    for (index, step) in steps.into_iter().enumerate() {
        trace!(target: "runtime", index, "replay_step");
        match step {
            Step::Text { text, caret } => {
                surface.caret = clamp_offset(&text, caret.unwrap_or(text.len()));
                surface.text = text;
                session.text_changed(surface.text.clone(), surface.caret);
            }
            Step::Type { text } => {
                for ch in text.chars() {
                    let sel = Selection::caret(surface.caret);
                    route_key(&mut session, &mut surface, KeyCode::Char(ch), sel);
                }
            }
            Step::Key { key, selection } => {
                let sel = selection.unwrap_or(Selection::caret(surface.caret));
                route_key(&mut session, &mut surface, key, sel);
            }
            Step::Wait { ms } => session.settle_for(Duration::from_millis(ms)).await,
            Step::Blur => session.blur(),
            Step::OutsideClick => session.outside_click(),
            Step::Click { index } => {
                if let Some(edit) = session.commit_candidate(index) {
                    surface.apply(edit);
                }
            }
            Step::Restore { text, mentions } => {
                let dropped = session.restore(text.clone(), mentions);
                surface.caret = text.len();
                surface.text = text;
                debug!(target: "runtime", dropped, "replay_restore");
            }
        }
    }

    session.dispose();
    session.submission()
}

fn route_key<D: UserDirectory>(
    session: &mut MentionSession<D>,
    surface: &mut Surface,
    key: KeyCode,
    selection: Selection,
) {
    let outcome = session.key(key, selection);
    if let Some(edit) = outcome.edit {
        surface.apply(edit);
        return;
    }
    if !outcome.handled && surface.native_key(key, selection) {
        session.text_changed(surface.text.clone(), surface.caret);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_input::StaticDirectory;
    use pretty_assertions::assert_eq;

    fn directory() -> Arc<StaticDirectory> {
        Arc::new(StaticDirectory::new(vec![
            UserCandidate::new("u-ann", "Ann", "Lee"),
            UserCandidate::new("u-cher", "Cher", ""),
        ]))
    }

    fn settings() -> SearchSettings {
        SearchSettings {
            debounce: Duration::from_millis(100),
            max_candidates: 8,
            cache_capacity: 8,
        }
    }

    fn steps(json: &str) -> Vec<Step> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn native_backspace_removes_one_grapheme() {
        let mut s = Surface {
            text: "ae\u{301}".into(),
            caret: 4,
        };
        assert!(s.native_key(KeyCode::Backspace, Selection::caret(4)));
        assert_eq!(s.text, "a");
        assert_eq!(s.caret, 1);
        assert!(!s.native_key(KeyCode::Delete, Selection::caret(1)));
    }

    #[test]
    fn native_char_replaces_selection() {
        let mut s = Surface {
            text: "hello".into(),
            caret: 5,
        };
        s.native_key(KeyCode::Char('J'), Selection::new(0, 1));
        assert_eq!(s.text, "Jello");
        assert_eq!(s.caret, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn typed_mention_commits_and_backspace_is_atomic() {
        let script = steps(
            r#"[
                {"op":"type","text":"hi @ch"},
                {"op":"wait","ms":200},
                {"op":"key","key":"Enter"},
                {"op":"type","text":" yo"},
                {"op":"key","key":"Backspace"},
                {"op":"key","key":"Backspace"},
                {"op":"key","key":"Backspace"},
                {"op":"key","key":"Backspace"}
            ]"#,
        );
        let sub = replay(directory(), settings(), script).await;
        assert_eq!(sub.text, "hi ");
        assert!(sub.mentions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submission_positions_match_final_text() {
        let script = steps(
            r#"[
                {"op":"type","text":"@a"},
                {"op":"wait","ms":200},
                {"op":"key","key":"Tab"},
                {"op":"type","text":" and @c"},
                {"op":"wait","ms":200},
                {"op":"click","index":0},
                {"op":"type","text":"!"}
            ]"#,
        );
        let sub = replay(directory(), settings(), script).await;
        assert_eq!(sub.text, "@Ann Lee and @Cher!");
        let ranges: Vec<_> = sub.mentions.iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(ranges, [(0, 8), (13, 18)]);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_and_restore() {
        let script = steps(
            r#"[
                {"op":"restore","text":"cc @Cher","mentions":[{"user_id":"u-cher","start":3,"end":8}]},
                {"op":"type","text":" @a"},
                {"op":"wait","ms":200},
                {"op":"key","key":"Esc"},
                {"op":"key","key":"Enter"}
            ]"#,
        );
        let sub = replay(directory(), settings(), script).await;
        assert_eq!(sub.text, "cc @Cher @a\n");
        assert_eq!(sub.mentions.len(), 1);
        assert_eq!(sub.mentions[0].user_id, "u-cher");
    }
}
