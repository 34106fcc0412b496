//! Mention query layer: `@query` detection, the debounced search state
//! machine, and the per-session result cache.
//!
//! Everything here is synchronous. Timers and the user directory live in the
//! async session (`core-input`), which feeds timer expiry and search results
//! back in tagged with the sequence number they were issued under.

pub mod cache;
pub mod controller;
pub mod token;

pub use cache::SearchCache;
pub use controller::{
    DropdownView, KeyDisposition, QueryController, QueryEffect, QueryState, Resolution,
};
pub use token::{QueryToken, detect_token};

use thiserror::Error;

/// Why a directory lookup produced no results.
///
/// Messages are operator facing and must not echo the query prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
    #[error("user search failed: {0}")]
    Failed(String),
    #[error("user search timed out")]
    Timeout,
}

/// A search the host must run once the debounce interval has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seq: u64,
    pub prefix: String,
}
