//! The playback window: which part of a remote collection is queued locally
//!
//! A session materializes a small window of tracks around the playing one.
//! Advancing near either edge loads more tracks on that side and evicts the
//! ones that fell behind the other side. Loads are single-flight: while one
//! is running, every other load request is rejected, not queued.
//!
//! Linear sessions remember how far each direction has been probed with two
//! cursor stacks. The newest forward cursor is the last position requested
//! ahead; the newest backward cursor is where the next load behind ends.
//! Shuffled sessions draw positions from a [`ShufflePool`] instead.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::collaborators::EntryId;
use super::context::SessionGuard;
use super::fetcher::{FetchedPage, RemotePageFetcher};
use super::resolver::SourceResolver;
use super::shuffle::ShufflePool;
use crate::config::WindowConfig;
use crate::model::{CollectionRequest, LoadDirection, PlaybackSource, ResolvedSource, Track};

/// Parameters for a new session
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub collection: CollectionRequest,
    pub source: PlaybackSource,
    pub shuffle: bool,
    pub repeat: bool,
    pub market: Option<String>,
}

/// What a completed load achieved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadReport {
    pub direction: LoadDirection,
    /// Tracks the load set out to materialize
    pub requested: usize,
    /// Tracks the catalog returned, across continuations
    pub fetched: usize,
    /// Tracks that reached the queue
    pub materialized: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Another load held the single-flight flag
    Rejected,
    /// A newer session took over mid-load
    Stale,
    Done(LoadReport),
}

impl LoadOutcome {
    /// True when the whole requested span reached the queue
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Done(report) if report.materialized >= report.requested)
    }

    pub fn report(&self) -> Option<&LoadReport> {
        match self {
            LoadOutcome::Done(report) => Some(report),
            _ => None,
        }
    }
}

/// What an advance notification led to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The session's own auto-start, or a collection too small to page
    Ignored,
    /// The entry is not part of this window
    UnknownEntry,
    /// Comfortably inside the window
    Idle,
    /// End of a shuffled pass with repeat off
    RepeatBlocked,
    Loaded {
        direction: LoadDirection,
        outcome: LoadOutcome,
        evicted: usize,
    },
}

/// Read-only copy of the window state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub total: usize,
    pub entry_ids: Vec<EntryId>,
    pub currently_playing: Option<EntryId>,
    pub forward_cursor: Vec<usize>,
    pub backward_cursor: Vec<usize>,
    pub shuffle_remaining: usize,
    pub failures: usize,
    pub loading: bool,
    pub repeat: bool,
    pub repeat_blocked: bool,
}

struct WindowState {
    total: usize,
    forward_cursor: VecDeque<usize>,
    backward_cursor: VecDeque<usize>,
    shuffle_pool: ShufflePool,
    entry_ids: Vec<EntryId>,
    currently_playing: Option<EntryId>,
    failures: usize,
    loading: bool,
    first_advance: bool,
    repeat: bool,
    repeat_blocked: bool,
}

/// An edge load decided by [`PlaybackSession::plan_advance`]
#[derive(Clone, Debug)]
pub struct AdvancePlan {
    entry_id: EntryId,
    index: usize,
    edge: EdgePlan,
}

impl AdvancePlan {
    pub fn direction(&self) -> LoadDirection {
        match self.edge {
            EdgePlan::Backward(..) => LoadDirection::Backward,
            _ => LoadDirection::Forward,
        }
    }
}

/// What an advance asks of the window
#[derive(Clone, Copy, Debug)]
enum EdgePlan {
    Forward(usize, usize),
    Backward(usize, usize),
    Stay,
    Blocked,
}

/// One pass of a load: what it asked for and where a continuation would go
struct Step {
    limit: usize,
    fetched: usize,
    materialized: usize,
    next: Option<(usize, usize)>,
}

/// One playback context over a remote collection
///
/// Cheap to clone; clones share the same window.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    guard: SessionGuard,
    shuffle: bool,
    config: WindowConfig,
    fetcher: RemotePageFetcher,
    resolver: SourceResolver,
    state: Mutex<WindowState>,
}

impl PlaybackSession {
    pub fn new(guard: SessionGuard, request: SessionRequest, config: WindowConfig) -> Self {
        let fetcher = RemotePageFetcher::new(
            guard.clone(),
            request.collection.kind,
            request.collection.tracks_href.clone(),
            request.market.clone(),
        );
        let resolver = SourceResolver::for_source(request.source, guard.clone(), config.stream_timeout());

        let key = guard.context().next_loading_key();
        guard.report_message("", key);

        tracing::info!(
            generation = guard.generation(),
            kind = ?request.collection.kind,
            source = %request.source,
            shuffle = request.shuffle,
            total = request.collection.total,
            "Playback session created"
        );

        Self {
            inner: Arc::new(SessionInner {
                guard,
                shuffle: request.shuffle,
                config,
                fetcher,
                resolver,
                state: Mutex::new(WindowState {
                    total: request.collection.total,
                    forward_cursor: VecDeque::new(),
                    backward_cursor: VecDeque::from([0]),
                    shuffle_pool: ShufflePool::new(),
                    entry_ids: Vec::new(),
                    currently_playing: None,
                    failures: 0,
                    loading: false,
                    first_advance: true,
                    repeat: request.repeat,
                    repeat_blocked: false,
                }),
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.guard.generation()
    }

    pub fn is_current(&self) -> bool {
        self.inner.guard.is_current()
    }

    pub fn source(&self) -> PlaybackSource {
        self.inner.resolver.source()
    }

    pub fn is_shuffling(&self) -> bool {
        self.inner.shuffle
    }

    pub async fn snapshot(&self) -> WindowSnapshot {
        let state = self.inner.state.lock().await;
        WindowSnapshot {
            total: state.total,
            entry_ids: state.entry_ids.clone(),
            currently_playing: state.currently_playing.clone(),
            forward_cursor: state.forward_cursor.iter().copied().collect(),
            backward_cursor: state.backward_cursor.iter().copied().collect(),
            shuffle_remaining: state.shuffle_pool.len(),
            failures: state.failures,
            loading: state.loading,
            repeat: state.repeat,
            repeat_blocked: state.repeat_blocked,
        }
    }

    /// Load the opening window
    pub async fn start(&self) -> LoadOutcome {
        let initial = self.inner.config.initial_tracks.max(1);
        self.load_forward(0, initial - 1).await
    }

    /// Append positions `start..=end` to the end of the queue
    pub async fn load_forward(&self, start: usize, end: usize) -> LoadOutcome {
        if !self.begin_load().await {
            tracing::debug!(start, end, "Forward load rejected, another load is running");
            return LoadOutcome::Rejected;
        }

        let key = self.inner.guard.context().next_loading_key();
        self.inner.guard.loading_started(key);
        let outcome = self.forward_with_continuations(start, end, key).await;
        self.inner.guard.loading_finished(key);

        self.end_load().await;
        outcome
    }

    /// Prepend positions `start..=end` to the front of the queue
    pub async fn load_backward(&self, start: usize, end: usize) -> LoadOutcome {
        if !self.begin_load().await {
            tracing::debug!(start, end, "Backward load rejected, another load is running");
            return LoadOutcome::Rejected;
        }

        let key = self.inner.guard.context().next_loading_key();
        self.inner.guard.loading_started(key);
        let outcome = self.backward_with_catch_up(start, end, key).await;
        self.inner.guard.loading_finished(key);

        self.end_load().await;
        outcome
    }

    /// React to the queue moving to `entry_id`
    pub async fn on_advance(&self, entry_id: &str) -> AdvanceOutcome {
        match self.plan_advance(entry_id).await {
            Ok(plan) => self.run_advance(plan).await,
            Err(outcome) => outcome,
        }
    }

    /// Record the move and decide whether an edge load is needed, without loading
    ///
    /// Must be called in notification order; the load itself may run later
    /// through [`PlaybackSession::run_advance`].
    pub async fn plan_advance(&self, entry_id: &str) -> Result<AdvancePlan, AdvanceOutcome> {
        let mut state = self.inner.state.lock().await;

        if state.first_advance {
            state.first_advance = false;
            return Err(AdvanceOutcome::Ignored);
        }
        if state.total < self.inner.config.initial_tracks + 1 {
            return Err(AdvanceOutcome::Ignored);
        }
        let Some(index) = state.entry_ids.iter().position(|id| id == entry_id) else {
            tracing::debug!(entry_id, "Advance to an entry outside the window");
            return Err(AdvanceOutcome::UnknownEntry);
        };

        state.currently_playing = Some(entry_id.to_string());

        match self.plan_edge_load(&mut state, index) {
            EdgePlan::Stay => Err(AdvanceOutcome::Idle),
            EdgePlan::Blocked => Err(AdvanceOutcome::RepeatBlocked),
            edge => {
                tracing::debug!(entry_id, index, plan = ?edge, "Advance reached a window edge");
                Ok(AdvancePlan {
                    entry_id: entry_id.to_string(),
                    index,
                    edge,
                })
            }
        }
    }

    /// Run the edge load a plan asked for, then evict on the opposite side
    pub async fn run_advance(&self, plan: AdvancePlan) -> AdvanceOutcome {
        let AdvancePlan { entry_id, index, edge } = plan;
        let buffer = self.inner.config.buffer_from_load;

        match edge {
            EdgePlan::Forward(start, end) => {
                let outcome = self.load_forward(start, end).await;
                let evicted = if outcome.is_loaded() && index > buffer {
                    self.evict_front(&entry_id).await
                } else {
                    0
                };
                AdvanceOutcome::Loaded {
                    direction: LoadDirection::Forward,
                    outcome,
                    evicted,
                }
            }
            EdgePlan::Backward(start, end) => {
                let outcome = self.load_backward(start, end).await;
                let evicted = if outcome.is_loaded() && index < buffer {
                    self.evict_tail(&entry_id).await
                } else {
                    0
                };
                AdvanceOutcome::Loaded {
                    direction: LoadDirection::Backward,
                    outcome,
                    evicted,
                }
            }
            EdgePlan::Stay | EdgePlan::Blocked => AdvanceOutcome::Idle,
        }
    }

    /// Drop an entry the queue could not open
    ///
    /// Unknown ids are ignored: neither the queue nor the failure count changes.
    pub async fn item_failed_to_open(&self, entry_id: &str) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            let Some(position) = state.entry_ids.iter().position(|id| id == entry_id) else {
                tracing::debug!(entry_id, "Failed entry is not in the window");
                return false;
            };
            state.entry_ids.remove(position);
        }

        tracing::warn!(entry_id, "Queue entry failed to open");
        self.inner.guard.remove_from_queue(entry_id).await;

        let key = self.inner.guard.context().next_loading_key();
        self.inner.guard.loading_started(key);
        self.add_failures(1, key).await;
        self.inner.guard.loading_finished(key);
        true
    }

    /// Repeat was switched; lifts the end-of-pass block whichever way it went
    pub async fn toggle_repeat(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        state.repeat = enabled;
        state.repeat_blocked = false;
        tracing::debug!(enabled, "Repeat toggled");
    }

    async fn begin_load(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.loading {
            return false;
        }
        state.loading = true;
        true
    }

    async fn end_load(&self) {
        self.inner.state.lock().await.loading = false;
    }

    fn plan_edge_load(&self, state: &mut WindowState, index: usize) -> EdgePlan {
        let config = &self.inner.config;
        let buffer = config.buffer_from_load;
        let per_request = config.tracks_per_request.max(1);
        let near_tail = index + buffer >= state.entry_ids.len();
        let near_head = index < buffer;

        if self.inner.shuffle {
            let remaining = state.shuffle_pool.len();
            if near_tail && remaining > 0 {
                EdgePlan::Forward(0, per_request - 1)
            } else if near_tail && state.repeat {
                EdgePlan::Forward(0, per_request.saturating_sub(2))
            } else if near_tail {
                state.repeat_blocked = true;
                tracing::info!("Shuffle pass finished with repeat off");
                EdgePlan::Blocked
            } else if near_head
                && remaining < state.total.saturating_sub(config.initial_tracks)
                && !state.repeat_blocked
            {
                EdgePlan::Backward(0, per_request - 1)
            } else {
                EdgePlan::Stay
            }
        } else {
            let Some(&next) = state.forward_cursor.front() else {
                return EdgePlan::Stay;
            };
            let prev = state.backward_cursor.front().copied().unwrap_or(0);
            let last = state.total.saturating_sub(1);

            if near_tail && next < last {
                EdgePlan::Forward(next + 1, next + per_request)
            } else if near_tail && state.repeat {
                EdgePlan::Forward(0, per_request - 1)
            } else if near_head && prev != 0 {
                EdgePlan::Backward(prev.saturating_sub(per_request), prev - 1)
            } else {
                EdgePlan::Stay
            }
        }
    }

    /// Trim consumed entries ahead of the buffer, oldest first
    async fn evict_front(&self, entry_id: &str) -> usize {
        let buffer = self.inner.config.buffer_from_load;
        let removed: Vec<EntryId> = {
            let mut state = self.inner.state.lock().await;
            let Some(position) = state.entry_ids.iter().position(|id| id == entry_id) else {
                return 0;
            };
            if !self.inner.shuffle {
                state.backward_cursor.pop_front();
            }
            let count = position.saturating_sub(buffer);
            state.entry_ids.drain(..count).collect()
        };

        for id in &removed {
            self.inner.guard.remove_from_queue(id).await;
        }
        if !removed.is_empty() {
            tracing::info!(evicted = removed.len(), "Evicted played entries from the window front");
        }
        removed.len()
    }

    /// Trim entries more than the buffer past the current one, newest first
    async fn evict_tail(&self, entry_id: &str) -> usize {
        let buffer = self.inner.config.buffer_from_load;
        let removed: Vec<EntryId> = {
            let mut state = self.inner.state.lock().await;
            let Some(position) = state.entry_ids.iter().position(|id| id == entry_id) else {
                return 0;
            };
            if !self.inner.shuffle {
                state.forward_cursor.pop_front();
            }
            let keep = (position + 1 + buffer).min(state.entry_ids.len());
            let mut removed: Vec<EntryId> = state.entry_ids.drain(keep..).collect();
            removed.reverse();
            removed
        };

        for id in &removed {
            self.inner.guard.remove_from_queue(id).await;
        }
        if !removed.is_empty() {
            tracing::info!(evicted = removed.len(), "Evicted upcoming entries from the window tail");
        }
        removed.len()
    }

    async fn forward_with_continuations(&self, start: usize, end: usize, key: u64) -> LoadOutcome {
        let mut report = LoadReport {
            direction: LoadDirection::Forward,
            requested: 0,
            fetched: 0,
            materialized: 0,
        };
        let mut span = (start, end);
        let mut first = true;

        loop {
            let Some(step) = self.forward_step(span.0, span.1, key).await else {
                tracing::warn!(generation = self.generation(), "Forward load abandoned, session is stale");
                return LoadOutcome::Stale;
            };
            if first {
                report.requested = step.limit;
                first = false;
            }
            report.fetched += step.fetched;
            report.materialized += step.materialized;

            match step.next {
                Some(next) => {
                    tracing::debug!(start = next.0, end = next.1, "Continuing forward load to cover shortfall");
                    span = next;
                }
                None => break,
            }
        }

        tracing::info!(
            requested = report.requested,
            fetched = report.fetched,
            materialized = report.materialized,
            "Forward load finished"
        );
        LoadOutcome::Done(report)
    }

    async fn backward_with_catch_up(&self, start: usize, end: usize, key: u64) -> LoadOutcome {
        let Some(step) = self.backward_step(start, end, key).await else {
            tracing::warn!(generation = self.generation(), "Backward load abandoned, session is stale");
            return LoadOutcome::Stale;
        };

        let mut report = LoadReport {
            direction: LoadDirection::Backward,
            requested: step.limit,
            fetched: step.fetched,
            materialized: step.materialized,
        };

        // A short backward load is made up by loading forward from the computed position
        if let Some((catch_start, catch_end)) = step.next {
            tracing::debug!(start = catch_start, end = catch_end, "Backward load short, catching up forward");
            match self.forward_with_continuations(catch_start, catch_end, key).await {
                LoadOutcome::Done(catch_up) => {
                    report.fetched += catch_up.fetched;
                    report.materialized += catch_up.materialized;
                }
                other => return other,
            }
        }

        tracing::info!(
            requested = report.requested,
            fetched = report.fetched,
            materialized = report.materialized,
            "Backward load finished"
        );
        LoadOutcome::Done(report)
    }

    /// Size a forward request, recording cursors for linear sessions
    async fn plan_forward(&self, start: usize, mut end: usize) -> usize {
        let mut state = self.inner.state.lock().await;
        if self.inner.shuffle {
            if state.shuffle_pool.is_empty() {
                let total = state.total;
                state.shuffle_pool.refill(total);
                tracing::debug!(total, "Shuffle pool refilled");
            }
            span_len(start, end).min(state.shuffle_pool.len())
        } else {
            if state.total > 0 && end >= state.total {
                end = state.total - 1;
            }
            state.forward_cursor.push_front(end);
            let probed = if start == 0 { start + self.inner.config.tracks_per_request } else { start };
            state.backward_cursor.push_back(probed);
            span_len(start, end)
        }
    }

    async fn forward_step(&self, start: usize, end: usize, key: u64) -> Option<Step> {
        let guard = &self.inner.guard;
        let source = self.source();
        let mut limit = self.plan_forward(start, end).await;
        let end = if self.inner.shuffle { end } else { start + limit.max(1) - 1 };

        guard.report_progress(source, 0, limit, key);
        if !guard.is_current() {
            return None;
        }
        if limit == 0 {
            return Some(Step {
                limit,
                fetched: 0,
                materialized: 0,
                next: None,
            });
        }

        let page = self.fetch(start, limit).await;
        let total = self.apply_total(&page).await;
        let tracks = page.tracks;
        let fetched = tracks.len();

        if total > 0 && fetched == total {
            limit = total;
            guard.report_progress(source, 0, limit, key);
        }
        if fetched < limit {
            self.add_failures(limit - fetched, key).await;
        }

        let sources = self.resolve_all(tracks, limit, key).await?;
        let materialized = self.enqueue_all(sources, LoadDirection::Forward).await?;

        let shortfall = limit.saturating_sub(materialized);
        let next = if shortfall == 0 {
            None
        } else if self.inner.shuffle {
            let pool_left = !self.inner.state.lock().await.shuffle_pool.is_empty();
            pool_left.then(|| (0, shortfall - 1))
        } else {
            let total = self.inner.state.lock().await.total;
            (end + 1 < total).then(|| (end + 1, end + shortfall))
        };

        Some(Step {
            limit,
            fetched,
            materialized,
            next,
        })
    }

    async fn backward_step(&self, start: usize, end: usize, key: u64) -> Option<Step> {
        let guard = &self.inner.guard;
        let source = self.source();

        let limit = {
            let mut state = self.inner.state.lock().await;
            if self.inner.shuffle {
                if state.shuffle_pool.is_empty() {
                    let total = state.total;
                    state.shuffle_pool.refill(total);
                    tracing::debug!(total, "Shuffle pool refilled");
                }
                span_len(start, end).min(state.shuffle_pool.len())
            } else {
                state.forward_cursor.push_back(end);
                state.backward_cursor.push_front(start);
                span_len(start, end)
            }
        };

        guard.report_progress(source, 0, limit, key);
        if !guard.is_current() {
            return None;
        }
        if limit == 0 {
            return Some(Step {
                limit,
                fetched: 0,
                materialized: 0,
                next: None,
            });
        }

        let page = self.fetch(start, limit).await;
        self.apply_total(&page).await;
        let tracks = page.tracks;
        let fetched = tracks.len();
        if fetched < limit {
            self.add_failures(limit - fetched, key).await;
        }

        let sources = self.resolve_all(tracks, limit, key).await?;
        let materialized = self.enqueue_all(sources, LoadDirection::Backward).await?;

        let shortfall = limit.saturating_sub(materialized);
        let next = if shortfall == 0 {
            None
        } else if self.inner.shuffle {
            let pool_left = !self.inner.state.lock().await.shuffle_pool.is_empty();
            pool_left.then(|| (0, shortfall - 1))
        } else if start > 0 {
            let behind = limit + (limit - fetched);
            Some((start.saturating_sub(behind), start + limit))
        } else {
            None
        };

        Some(Step {
            limit,
            fetched,
            materialized,
            next,
        })
    }

    async fn fetch(&self, start: usize, limit: usize) -> FetchedPage {
        if self.inner.shuffle {
            let positions = self.inner.state.lock().await.shuffle_pool.take(limit);
            tracing::debug!(?positions, "Drawing shuffled positions");
            self.inner.fetcher.fetch_random(&positions).await
        } else {
            let total = self.inner.state.lock().await.total;
            self.inner.fetcher.fetch_range(start, limit, total).await
        }
    }

    async fn apply_total(&self, page: &FetchedPage) -> usize {
        let mut state = self.inner.state.lock().await;
        if let Some(total) = page.total {
            state.total = total;
        }
        state.total
    }

    /// Resolve in request order; `None` when the session went stale
    async fn resolve_all(&self, tracks: Vec<Track>, limit: usize, key: u64) -> Option<Vec<ResolvedSource>> {
        let guard = &self.inner.guard;
        let source = self.source();
        let missing = limit.saturating_sub(tracks.len());
        let mut sources = Vec::with_capacity(tracks.len());

        for (i, track) in tracks.into_iter().enumerate() {
            if !guard.is_current() {
                return None;
            }
            let resolved = self.inner.resolver.resolve(track, key).await;
            if resolved.is_resolved() {
                sources.push(resolved);
            } else {
                tracing::warn!(track_id = %resolved.track.id, track = %resolved.track.name, "Track failed to resolve");
                self.add_failures(1, key).await;
            }
            guard.report_progress(source, i + 1 + missing, limit, key);
            tracing::trace!(completed = i + 1 + missing, limit, "Resolve progress");
        }
        Some(sources)
    }

    /// Push sources into the queue; `None` when the session went stale
    async fn enqueue_all(&self, sources: Vec<ResolvedSource>, direction: LoadDirection) -> Option<usize> {
        let guard = &self.inner.guard;
        let mut materialized = 0;
        let mut first_play = false;

        let ordered: Vec<ResolvedSource> = match direction {
            LoadDirection::Forward => sources,
            LoadDirection::Backward => sources.into_iter().rev().collect(),
        };

        for source in ordered {
            let entry_id = source.entry_id().to_string();
            if self.inner.state.lock().await.entry_ids.contains(&entry_id) {
                tracing::debug!(entry_id, "Track already in the window, skipping");
                continue;
            }

            let assigned = match direction {
                LoadDirection::Forward => guard.enqueue_end(source).await?,
                LoadDirection::Backward => guard.enqueue_front(source).await?,
            };

            let mut state = self.inner.state.lock().await;
            if !state.entry_ids.contains(&assigned) {
                match direction {
                    LoadDirection::Forward => state.entry_ids.push(assigned.clone()),
                    LoadDirection::Backward => state.entry_ids.insert(0, assigned.clone()),
                }
            }
            materialized += 1;

            if direction == LoadDirection::Forward && state.currently_playing.is_none() {
                state.currently_playing = Some(assigned);
                first_play = true;
            }
        }

        if first_play {
            tracing::info!(generation = self.generation(), "First track queued, starting playback");
            guard.start_playback().await;
        }
        Some(materialized)
    }

    async fn add_failures(&self, count: usize, key: u64) {
        let failures = {
            let mut state = self.inner.state.lock().await;
            state.failures += count;
            state.failures
        };
        let message = format!("{} track{} failed to match", failures, if failures == 1 { "" } else { "s" });
        self.inner.guard.report_message(&message, key);
    }
}

/// Number of positions in `start..=end`
fn span_len(start: usize, end: usize) -> usize {
    if end < start { 0 } else { end - start + 1 }
}
