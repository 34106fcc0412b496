use serde::{Deserialize, Serialize};

/// A user returned by the host's prefix search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserCandidate {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserCandidate {
    pub fn new(
        user_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Name without the trigger, e.g. `Ann Lee`. Empty parts are skipped so a
    /// user without a last name never yields a trailing space.
    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{first} {last}"),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => self.user_id.clone(),
        }
    }

    /// Canonical buffer text for a committed mention, e.g. `@Ann Lee`.
    pub fn mention_text(&self) -> String {
        format!("@{}", self.full_name())
    }
}

/// Outbound `{user_id, start, end}` triple submitted alongside the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MentionRecord {
    pub user_id: String,
    pub start: usize,
    pub end: usize,
}
