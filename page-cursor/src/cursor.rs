// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Windowed cursor engine.
//!
//! Owns the sparse cache, the current position, fetch watermarks, and
//! in-flight fetch coordination. Fetches run as spawned tasks; a caller
//! that cannot be served from cache parks on the single waiter slot until
//! the current fetch settles.

use std::{ops::Range, sync::Arc};

use log::debug;
use parking_lot::Mutex;
use tokio::{
    sync::{oneshot, watch},
    task::yield_now,
};

use crate::{
    config::CursorConfig,
    error::{FetchError, FetchResult},
    metrics::CursorMetrics,
    source::PageSource,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Direction claims held by an in-flight fetch. The initial fetch issued by
/// `reset` claims both directions at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Claim {
    Forward,
    Backward,
    Both,
}

impl Claim {
    fn covers(self, dir: Direction) -> bool {
        matches!(
            (self, dir),
            (Claim::Both, _)
                | (Claim::Forward, Direction::Forward)
                | (Claim::Backward, Direction::Backward)
        )
    }
}

#[derive(Clone, Copy, Debug)]
enum FetchState {
    Idle,
    InFlight { claim: Claim, ticket: u64 },
}

type Waiter = oneshot::Sender<FetchResult<usize>>;

struct CursorState<T, P> {
    /// Sparse cache indexed by absolute position; `None` slots are unknown.
    data: Vec<Option<T>>,
    cursor: usize,
    /// Lowest position known to start a contiguous fetched region.
    offset: usize,
    exhausted: bool,
    fetch: FetchState,
    waiter: Option<Waiter>,
    params: Option<P>,
    /// Bumped by every reset; stale fetch results are discarded on mismatch.
    generation: u64,
    /// Distinguishes the current fetch from superseded ones.
    ticket: u64,
}

impl<T: Clone, P> CursorState<T, P> {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            offset: 0,
            exhausted: false,
            fetch: FetchState::Idle,
            waiter: None,
            params: None,
            generation: 0,
            ticket: 0,
        }
    }

    fn element_at(&self, index: usize) -> Option<T> {
        self.data.get(index).cloned().flatten()
    }

    /// Merge fetched rows at `[start, start + rows.len())`, growing the
    /// cache as needed. Slots already holding an element are left alone.
    fn write_rows(&mut self, start: usize, rows: Vec<T>) {
        if rows.is_empty() {
            return;
        }
        let end = start + rows.len();
        if self.data.len() < end {
            self.data.resize_with(end, || None);
        }
        for (i, row) in rows.into_iter().enumerate() {
            let slot = &mut self.data[start + i];
            if slot.is_none() {
                *slot = Some(row);
            }
        }
    }
}

struct Shared<S: PageSource> {
    source: S,
    state: Mutex<CursorState<S::Item, S::Params>>,
    /// Bumped after every fetch settles; displaced waiters watch this to
    /// know when to re-examine the cache.
    completions: watch::Sender<u64>,
    metrics: CursorMetrics,
}

enum Step<T> {
    Ready(Option<T>),
    Wait(oneshot::Receiver<FetchResult<usize>>),
}

/// Bidirectional lazily fetching cursor over a limit/offset page source.
///
/// Not a multi-consumer structure: one logical consumer drives it, and the
/// underlying source is assumed not to mutate between fetches.
pub struct PageCursor<S: PageSource> {
    shared: Arc<Shared<S>>,
    config: CursorConfig,
}

impl<S: PageSource> PageCursor<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, CursorConfig::default())
    }

    pub fn with_config(source: S, config: CursorConfig) -> Self {
        let (completions, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                source,
                state: Mutex::new(CursorState::new()),
                completions,
                metrics: CursorMetrics::new(),
            }),
            config,
        }
    }

    pub fn metrics(&self) -> CursorMetrics {
        self.shared.metrics.clone()
    }

    /// Start a new session at position 0. See [`PageCursor::reset_at`].
    pub async fn reset(&self, params: S::Params) -> FetchResult<Option<S::Item>> {
        self.reset_at(params, 0).await
    }

    /// Replace all cache, position, and exhaustion state and center the
    /// initial fetch window on `index`. Any fetch still in flight from the
    /// previous session is orphaned; its eventual result is discarded.
    ///
    /// Resolves to the element at `index`, or `None` if the source ended
    /// before it.
    pub async fn reset_at(&self, params: S::Params, index: usize) -> FetchResult<Option<S::Item>> {
        let rx = {
            let mut st = self.shared.state.lock();
            st.generation += 1;
            st.data.clear();
            st.cursor = index;
            st.offset = index.saturating_sub(self.config.high_water_mark / 2);
            st.exhausted = false;
            st.params = Some(params);
            let (tx, rx) = oneshot::channel();
            st.waiter = Some(tx);
            let range = st.offset..st.offset + self.config.high_water_mark;
            self.spawn_fetch(&mut st, Claim::Both, range);
            rx
        };
        match rx.await {
            Ok(Ok(_merged)) => {
                let st = self.shared.state.lock();
                Ok(st.element_at(st.cursor))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(FetchError::Superseded),
        }
    }

    /// Step to the next element, fetching forward if the cache ends at the
    /// cursor. Resolves to `None` once the source is exhausted.
    pub async fn advance(&self) -> FetchResult<Option<S::Item>> {
        loop {
            let mut completions = self.shared.completions.subscribe();
            let step = {
                let mut st = self.shared.state.lock();
                if st.params.is_none() {
                    return Err(FetchError::NotReset);
                }
                if st.exhausted {
                    if st.cursor + 1 < st.data.len() {
                        st.cursor += 1;
                        self.shared.metrics.record_cache_hit();
                        Step::Ready(st.element_at(st.cursor))
                    } else {
                        Step::Ready(None)
                    }
                } else if st.cursor + 1 >= st.data.len() {
                    let (tx, rx) = oneshot::channel();
                    let range = st.data.len()..st.cursor + self.config.high_water_mark + 1;
                    self.request_fetch(&mut st, Direction::Forward, range, Some(tx));
                    Step::Wait(rx)
                } else {
                    st.cursor += 1;
                    if st.cursor + self.config.low_water_mark >= st.data.len() {
                        let range = st.data.len()..st.cursor + self.config.high_water_mark + 1;
                        self.request_fetch(&mut st, Direction::Forward, range, None);
                    }
                    self.shared.metrics.record_cache_hit();
                    Step::Ready(st.element_at(st.cursor))
                }
            };
            match step {
                Step::Ready(elem) => {
                    yield_now().await;
                    return Ok(elem);
                }
                Step::Wait(rx) => match rx.await {
                    Ok(Ok(merged)) => {
                        let mut st = self.shared.state.lock();
                        if merged == 0 {
                            return Ok(None);
                        }
                        st.cursor += 1;
                        return Ok(st.element_at(st.cursor));
                    }
                    Ok(Err(err)) => return Err(err),
                    Err(_) => {
                        // Waiter slot was taken over; once the fetch that
                        // owns it settles, re-run against the fresh state.
                        let _ = completions.changed().await;
                    }
                },
            }
        }
    }

    /// Step to the previous element, fetching backward if the cursor sits
    /// at or behind the known window start. Resolves to `None` at position 0.
    pub async fn retreat(&self) -> FetchResult<Option<S::Item>> {
        loop {
            let mut completions = self.shared.completions.subscribe();
            let step = {
                let mut st = self.shared.state.lock();
                if st.params.is_none() {
                    return Err(FetchError::NotReset);
                }
                if st.cursor == 0 {
                    Step::Ready(None)
                } else if st.cursor <= st.offset {
                    let (tx, rx) = oneshot::channel();
                    let range =
                        st.cursor.saturating_sub(self.config.high_water_mark)..st.offset;
                    self.request_fetch(&mut st, Direction::Backward, range, Some(tx));
                    Step::Wait(rx)
                } else {
                    st.cursor -= 1;
                    if st.cursor < st.offset + self.config.low_water_mark && st.offset > 0 {
                        let range =
                            st.cursor.saturating_sub(self.config.high_water_mark)..st.offset;
                        self.request_fetch(&mut st, Direction::Backward, range, None);
                    }
                    self.shared.metrics.record_cache_hit();
                    Step::Ready(st.element_at(st.cursor))
                }
            };
            match step {
                Step::Ready(elem) => {
                    yield_now().await;
                    return Ok(elem);
                }
                Step::Wait(rx) => match rx.await {
                    Ok(Ok(_merged)) => {
                        let mut st = self.shared.state.lock();
                        st.cursor = st.cursor.saturating_sub(1);
                        return Ok(st.element_at(st.cursor));
                    }
                    Ok(Err(err)) => return Err(err),
                    Err(_) => {
                        let _ = completions.changed().await;
                    }
                },
            }
        }
    }

    /// Install `waiter` as the sole pending waiter and make sure a fetch
    /// covering `dir` is in flight. A request in an already-fetching
    /// direction coalesces into the in-flight fetch; a request in the other
    /// direction supersedes it, leaving the old fetch to finish as
    /// fire-and-forget.
    fn request_fetch(
        &self,
        st: &mut CursorState<S::Item, S::Params>,
        dir: Direction,
        range: Range<usize>,
        waiter: Option<Waiter>,
    ) {
        if range.start >= range.end {
            return;
        }
        st.waiter = waiter;
        if let FetchState::InFlight { claim, .. } = st.fetch {
            if claim.covers(dir) {
                self.shared.metrics.record_fetch_coalesced();
                return;
            }
        }
        let claim = match dir {
            Direction::Forward => Claim::Forward,
            Direction::Backward => Claim::Backward,
        };
        self.spawn_fetch(st, claim, range);
    }

    fn spawn_fetch(
        &self,
        st: &mut CursorState<S::Item, S::Params>,
        claim: Claim,
        range: Range<usize>,
    ) {
        let Some(params) = st.params.clone() else {
            return;
        };
        st.ticket += 1;
        let ticket = st.ticket;
        let generation = st.generation;
        st.fetch = FetchState::InFlight { claim, ticket };
        let start = range.start;
        let limit = range.end - range.start;
        debug!("issuing {claim:?} fetch: start={start} limit={limit}");
        self.shared.metrics.record_fetch_issued();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = shared.source.fetch_page(limit, start, &params).await;
            let mut st = shared.state.lock();
            if st.generation != generation {
                debug!("discarding fetch result from a previous session: start={start}");
                shared.metrics.record_stale_discarded();
                drop(st);
                shared.completions.send_modify(|seq| *seq = seq.wrapping_add(1));
                return;
            }
            let current =
                matches!(st.fetch, FetchState::InFlight { ticket: t, .. } if t == ticket);
            let waiter = if current {
                st.fetch = FetchState::Idle;
                st.waiter.take()
            } else {
                None
            };
            match result {
                Ok(rows) => {
                    let merged = rows.len();
                    if merged < limit {
                        st.exhausted = true;
                    }
                    st.write_rows(start, rows);
                    if start < st.offset {
                        st.offset = start;
                    }
                    debug!("merged {merged} rows at {start}, cache now {} slots", st.data.len());
                    drop(st);
                    if let Some(tx) = waiter {
                        let _ = tx.send(Ok(merged));
                    }
                }
                Err(err) => {
                    shared.metrics.record_fetch_error();
                    drop(st);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(Err(err));
                        }
                        None => debug!("superseded fetch at {start} failed: {err}"),
                    }
                }
            }
            shared.completions.send_modify(|seq| *seq = seq.wrapping_add(1));
        });
    }
}
