//! `@query` token detection.
//!
//! A token exists when the text immediately left of the caret is an `@`
//! followed by zero or more word characters (`@\w*`), with no whitespace in
//! between. The `@` of a committed mention never opens a token, otherwise
//! parking the caret after `@Cher` would reopen the dropdown.

use core_text::{MentionSpan, clamp_offset};
use regex::Regex;
use std::sync::LazyLock;

static TRAILING_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w*)\z").expect("static pattern"));

/// The live `@query` under the caret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryToken {
    /// Byte offset of the triggering `@`.
    pub anchor: usize,
    /// Text between the `@` and the caret.
    pub query: String,
}

impl QueryToken {
    /// Byte length of `@` plus the query, i.e. the range a commit replaces.
    pub fn replaced_len(&self) -> usize {
        1 + self.query.len()
    }
}

/// Find the token ending at `caret`, ignoring `@`s that belong to `spans`.
pub fn detect_token(text: &str, caret: usize, spans: &[MentionSpan]) -> Option<QueryToken> {
    let caret = clamp_offset(text, caret);
    let before = &text[..caret];
    let caps = TRAILING_QUERY.captures(before)?;
    let whole = caps.get(0)?;
    let anchor = whole.start();
    if spans.iter().any(|s| s.start <= anchor && anchor < s.end) {
        return None;
    }
    let query = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Some(QueryToken {
        anchor,
        query: query.to_string(),
    })
}
