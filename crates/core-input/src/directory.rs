use core_query::SearchError;
use core_state::UserCandidate;
use std::future::Future;
use std::time::Duration;

/// Host-provided prefix search over the user directory.
///
/// Implementations may be slow or fail; the session never blocks on them and
/// ignores any answer that arrives after the user moved on.
pub trait UserDirectory: Send + Sync + 'static {
    fn search_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<UserCandidate>, SearchError>> + Send;
}

/// In-memory directory matching case-insensitively on first name, last name
/// or full name. Used by the replay binary and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: Vec<UserCandidate>,
    latency: Duration,
}

impl StaticDirectory {
    pub fn new(users: Vec<UserCandidate>) -> Self {
        Self {
            users,
            latency: Duration::ZERO,
        }
    }

    /// Simulated round-trip time applied to every search.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn matching(&self, prefix: &str) -> Vec<UserCandidate> {
        let needle = prefix.to_lowercase();
        self.users
            .iter()
            .filter(|u| {
                [&u.first_name, &u.last_name, &u.full_name()]
                    .iter()
                    .any(|name| name.to_lowercase().starts_with(&needle))
            })
            .cloned()
            .collect()
    }
}

impl UserDirectory for StaticDirectory {
    fn search_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<UserCandidate>, SearchError>> + Send {
        let hits = self.matching(prefix);
        let latency = self.latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(hits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> StaticDirectory {
        StaticDirectory::new(vec![
            UserCandidate::new("1", "Ann", "Lee"),
            UserCandidate::new("2", "Bob", "Annex"),
            UserCandidate::new("3", "Cher", ""),
        ])
    }

    #[test]
    fn matches_any_name_part_case_insensitively() {
        let ids: Vec<_> = dir().matching("AN").into_iter().map(|u| u.user_id).collect();
        assert_eq!(ids, ["1", "2"]);
        assert!(dir().matching("lee").iter().any(|u| u.user_id == "1"));
        assert!(dir().matching("ann l").iter().any(|u| u.user_id == "1"));
    }

    #[test]
    fn empty_prefix_lists_everyone() {
        assert_eq!(dir().matching("").len(), 3);
    }

    #[tokio::test]
    async fn search_resolves_matches() {
        let hits = dir().search_prefix("ch").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].mention_text(), "@Cher");
    }
}
