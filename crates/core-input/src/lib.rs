//! Async mention session: runs one `MentionInput` on tokio, owning its
//! debounce timer, the user-directory calls, a scoped result cache and the
//! in-flight request table.
//!
//! The session is a single logical writer. Timers and searches are spawned
//! tasks that only post [`SessionEvent`]s back into the session's bounded
//! channel; every response carries the sequence it answers and the query
//! controller discards anything that is no longer live.
//!
//! Drive it either directly (`text_changed` / `key` / `settle_for`), which is
//! what the replay binary and tests do, or by spawning [`MentionSession::run`]
//! and feeding it through a [`SessionHandle`].

mod directory;
mod session;

pub use directory::{StaticDirectory, UserDirectory};
pub use session::{
    DropdownSnapshot, MentionSession, SEARCH_TIMEOUT, SessionEvent, SessionHandle, SessionUpdate,
};
