use crate::directory::UserDirectory;
use ahash::AHashMap;
use core_config::SearchSettings;
use core_events::{
    EVENT_CHANNEL_CAP, InputEvent, KeyCode, SEARCH_CACHE_HITS, SEARCHES_DEDUPED, SEARCHES_ISSUED,
    Selection,
};
use core_model::{Edit, KeyOutcome, MentionInput, Submission};
use core_query::{QueryEffect, QueryState, SearchCache, SearchError, SearchRequest};
use core_state::{MentionRecord, UserCandidate};
use core_text::MentionSpan;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Upper bound on one directory call; a slower lookup resolves as
/// [`SearchError::Timeout`].
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the session loop consumes. Hosts send `Input`, `Restore` and
/// `CommitCandidate`; timers and search tasks post the rest.
#[derive(Debug)]
pub enum SessionEvent {
    Input(InputEvent),
    Restore {
        text: String,
        mentions: Vec<MentionRecord>,
    },
    /// Pointer selection in the dropdown.
    CommitCandidate(usize),
    DebounceElapsed(u64),
    SearchResolved {
        /// Sequence the directory call was issued under.
        seq: u64,
        prefix: String,
        result: Result<Vec<UserCandidate>, SearchError>,
    },
    Shutdown,
}

/// Dropdown contents as last published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownSnapshot {
    pub state: QueryState,
    pub candidates: Vec<UserCandidate>,
    pub selected: Option<usize>,
}

/// Outbound notifications for hosts driving the session through [`MentionSession::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Key(KeyOutcome),
    Edit(Edit),
    Dropdown(DropdownSnapshot),
}

/// Cloneable sender half for hosts feeding a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
    stop: Arc<Notify>,
}

impl SessionHandle {
    /// Returns `false` once the session has stopped.
    pub async fn send(&self, event: InputEvent) -> bool {
        self.tx.send(SessionEvent::Input(event)).await.is_ok()
    }

    pub async fn restore(&self, text: impl Into<String>, mentions: Vec<MentionRecord>) -> bool {
        self.tx
            .send(SessionEvent::Restore {
                text: text.into(),
                mentions,
            })
            .await
            .is_ok()
    }

    pub async fn commit_candidate(&self, index: usize) -> bool {
        self.tx
            .send(SessionEvent::CommitCandidate(index))
            .await
            .is_ok()
    }

    /// Queue a shutdown behind already-sent events.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionEvent::Shutdown).await;
    }

    /// Stop immediately, skipping queued events.
    pub fn abort(&self) {
        self.stop.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    Shutdown,
    Aborted,
    ChannelClosed,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::Shutdown => "shutdown",
            ExitReason::Aborted => "aborted",
            ExitReason::ChannelClosed => "channel_closed",
        }
    }
}

/// One input surface on the async runtime: its `MentionInput`, debounce
/// timer, scoped search cache and in-flight request table.
///
/// All state changes happen on the task that owns the session. Timers and
/// directory calls run as detached tasks that only post events back.
pub struct MentionSession<D: UserDirectory> {
    input: MentionInput,
    directory: Arc<D>,
    cache: SearchCache,
    /// prefix -> newest seq waiting on the call already in flight
    in_flight: AHashMap<String, u64>,
    debounce: Option<JoinHandle<()>>,
    tx: mpsc::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionEvent>,
    stop: Arc<Notify>,
    updates: Option<mpsc::Sender<SessionUpdate>>,
    last_dropdown: Option<DropdownSnapshot>,
}

impl<D: UserDirectory> MentionSession<D> {
    pub fn new(directory: Arc<D>, settings: SearchSettings) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAP);
        Self {
            input: MentionInput::new(settings),
            directory,
            cache: SearchCache::new(settings.cache_capacity),
            in_flight: AHashMap::new(),
            debounce: None,
            tx,
            rx,
            stop: Arc::new(Notify::new()),
            updates: None,
            last_dropdown: None,
        }
    }

    pub fn with_commit_hook(mut self, hook: impl FnMut(&MentionSpan) + Send + 'static) -> Self {
        self.input = std::mem::take(&mut self.input).with_commit_hook(hook);
        self
    }

    /// Publish key outcomes, edits and dropdown changes while `run` is active.
    pub fn with_updates(mut self, updates: mpsc::Sender<SessionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
            stop: self.stop.clone(),
        }
    }

    pub fn input(&self) -> &MentionInput {
        &self.input
    }

    pub fn submission(&self) -> Submission {
        self.input.submission()
    }

    pub fn cached_prefixes(&self) -> usize {
        self.cache.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn text_changed(&mut self, text: impl Into<String>, caret: usize) {
        let effect = self.input.on_text_change(text, caret);
        self.apply_effect(effect);
    }

    pub fn key(&mut self, key: KeyCode, selection: Selection) -> KeyOutcome {
        let outcome = self.input.on_key(key, selection);
        self.apply_effect(outcome.effect);
        outcome
    }

    pub fn blur(&mut self) {
        let effect = self.input.on_blur();
        self.apply_effect(effect);
    }

    pub fn outside_click(&mut self) {
        let effect = self.input.on_outside_click();
        self.apply_effect(effect);
    }

    pub fn commit_candidate(&mut self, index: usize) -> Option<Edit> {
        self.input.commit_candidate(index)
    }

    /// Returns how many mentions failed validation against `text`.
    pub fn restore(&mut self, text: impl Into<String>, mentions: Vec<MentionRecord>) -> usize {
        let (dropped, effect) = self.input.restore(text, mentions);
        self.apply_effect(effect);
        dropped
    }

    /// Process timer and search events for `window` of (possibly paused) time.
    /// Direct drivers use this between host notifications.
    pub async fn settle_for(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.process(event);
        }
    }

    /// Consume events until `Shutdown` or `abort`, then dispose. Returns the
    /// final submission.
    pub async fn run(mut self) -> Submission {
        info!(target: "session.loop", "session_started");
        let stop = self.stop.clone();
        let mut exit = ExitReason::Running;
        while exit == ExitReason::Running {
            let next = tokio::select! {
                biased;
                _ = stop.notified() => {
                    exit = ExitReason::Aborted;
                    continue;
                }
                next = self.rx.recv() => next,
            };
            match next {
                None => exit = ExitReason::ChannelClosed,
                Some(SessionEvent::Shutdown) => exit = ExitReason::Shutdown,
                Some(event) => {
                    let update = self.process(event);
                    self.publish(update).await;
                }
            }
        }
        self.dispose();
        info!(target: "session.loop", reason = exit.as_str(), "session_stopped");
        self.input.submission()
    }

    /// Cancel the timer and drop cached and in-flight search state.
    pub fn dispose(&mut self) {
        self.cancel_debounce();
        self.blur();
        let cached = self.cache.len();
        let pending = self.in_flight.len();
        self.cache.clear();
        self.in_flight.clear();
        debug!(target: "session.loop", cached, pending, "session_disposed");
    }

    fn process(&mut self, event: SessionEvent) -> Option<SessionUpdate> {
        match event {
            SessionEvent::Input(input) => {
                trace!(target: "session.loop", event = input.label(), "input_event");
                match input {
                    InputEvent::TextChanged { text, caret } => self.text_changed(text, caret),
                    InputEvent::Key { key, selection } => {
                        let selection =
                            selection.unwrap_or_else(|| Selection::caret(self.input.caret()));
                        return Some(SessionUpdate::Key(self.key(key, selection)));
                    }
                    InputEvent::Blur => self.blur(),
                    InputEvent::OutsideClick => self.outside_click(),
                }
            }
            SessionEvent::Restore { text, mentions } => {
                self.restore(text, mentions);
            }
            SessionEvent::CommitCandidate(index) => {
                return self.commit_candidate(index).map(SessionUpdate::Edit);
            }
            SessionEvent::DebounceElapsed(seq) => {
                if let Some(req) = self.input.on_debounce_elapsed(seq) {
                    self.dispatch(req);
                }
            }
            SessionEvent::SearchResolved {
                seq,
                prefix,
                result,
            } => {
                let waiting = self.in_flight.remove(&prefix).unwrap_or(seq);
                if let Ok(candidates) = &result {
                    self.cache.insert(&prefix, candidates.clone());
                }
                let resolution = self.input.on_search_resolved(waiting, result);
                trace!(target: "session.loop", issued = seq, waiting, ?resolution, "search_delivered");
            }
            SessionEvent::Shutdown => {}
        }
        None
    }

    async fn publish(&mut self, update: Option<SessionUpdate>) {
        let Some(updates) = self.updates.clone() else {
            return;
        };
        if let Some(update) = update {
            let _ = updates.send(update).await;
        }
        let view = self.input.view();
        let snapshot = DropdownSnapshot {
            state: view.state,
            candidates: view.candidates.to_vec(),
            selected: view.selected,
        };
        if self.last_dropdown.as_ref() != Some(&snapshot) {
            self.last_dropdown = Some(snapshot.clone());
            let _ = updates.send(SessionUpdate::Dropdown(snapshot)).await;
        }
    }

    fn dispatch(&mut self, req: SearchRequest) {
        if let Some(hit) = self.cache.get(&req.prefix) {
            SEARCH_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
            let resolution = self.input.on_search_resolved(req.seq, Ok(hit));
            debug!(target: "session.loop", seq = req.seq, ?resolution, "search_served_from_cache");
            return;
        }
        if let Some(waiting) = self.in_flight.get_mut(&req.prefix) {
            SEARCHES_DEDUPED.fetch_add(1, Ordering::Relaxed);
            debug!(target: "session.loop", seq = req.seq, replaced = *waiting, "search_deduped");
            *waiting = req.seq;
            return;
        }

        SEARCHES_ISSUED.fetch_add(1, Ordering::Relaxed);
        debug!(target: "session.loop", seq = req.seq, prefix_len = req.prefix.len(), "search_issued");
        self.in_flight.insert(req.prefix.clone(), req.seq);
        let directory = self.directory.clone();
        let tx = self.tx.clone();
        let SearchRequest { seq, prefix } = req;
        tokio::spawn(async move {
            let mut lookup = {
                let prefix = prefix.clone();
                tokio::spawn(async move { directory.search_prefix(&prefix).await })
            };
            // Every outcome posts a resolution so the in-flight entry is released.
            let result = match tokio::time::timeout(SEARCH_TIMEOUT, &mut lookup).await {
                Ok(Ok(result)) => result,
                Ok(Err(join)) => {
                    let why = if join.is_panic() { "panicked" } else { "cancelled" };
                    Err(SearchError::Failed(format!("directory task {why}")))
                }
                Err(_) => {
                    lookup.abort();
                    Err(SearchError::Timeout)
                }
            };
            if tx
                .send(SessionEvent::SearchResolved {
                    seq,
                    prefix,
                    result,
                })
                .await
                .is_err()
            {
                trace!(target: "session.loop", seq, "search_result_unclaimed");
            }
        });
    }

    fn apply_effect(&mut self, effect: QueryEffect) {
        match effect {
            QueryEffect::None => {}
            QueryEffect::Schedule { seq, delay } => {
                self.cancel_debounce();
                let tx = self.tx.clone();
                self.debounce = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(SessionEvent::DebounceElapsed(seq)).await.is_err() {
                        trace!(target: "session.loop", seq, "debounce_unclaimed");
                    }
                }));
            }
            QueryEffect::Cancel => self.cancel_debounce(),
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
    }
}

impl<D: UserDirectory> Drop for MentionSession<D> {
    fn drop(&mut self) {
        self.cancel_debounce();
    }
}

