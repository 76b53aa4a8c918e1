// ── Historical log pagination ──
//
// Cursor-based paging over `GET /api/logs`. `refresh()` replaces the
// history, `load_more()` appends the next page. At most one `load_more()`
// is in flight; a `refresh()` always proceeds and supersedes whatever is
// pending, whose result is then discarded. Dropping a pending call
// releases the in-flight slot, so a later `load_more()` can retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use vigil_api::ApiClient;

use crate::convert::history_record;
use crate::error::CoreError;
use crate::model::DeviceDirectory;
use crate::store::FeedStore;

/// What a paging call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page arrived and was applied.
    Loaded { records: usize },
    /// No request was issued: one is pending or no pages remain.
    Skipped,
    /// The page arrived after a newer `refresh()` and was discarded.
    Stale,
}

#[derive(Debug, Default)]
struct PagingState {
    next_cursor: Option<String>,
    in_flight: bool,
    /// Bumped by every `refresh()`; results tagged with an older value
    /// are ignored.
    generation: u64,
    last_error: Option<String>,
}

/// Paginated historical event log.
pub struct HistoryLog {
    api: ApiClient,
    store: Arc<FeedStore>,
    directory: Arc<DeviceDirectory>,
    page_size: u32,
    state: Mutex<PagingState>,
}

impl HistoryLog {
    pub fn new(
        api: ApiClient,
        store: Arc<FeedStore>,
        directory: Arc<DeviceDirectory>,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            store,
            directory,
            page_size,
            state: Mutex::new(PagingState::default()),
        }
    }

    /// Fetch the first page and replace the history with it.
    pub async fn refresh(&self) -> Result<LoadOutcome, CoreError> {
        let generation = {
            let mut state = self.lock();
            state.generation = state.generation.wrapping_add(1);
            state.in_flight = true;
            state.generation
        };
        let slot = InFlight::new(&self.state, generation);
        debug!(generation, "refreshing history");
        self.fetch(slot, None).await
    }

    /// Fetch the page after the current cursor and append it.
    ///
    /// Returns [`LoadOutcome::Skipped`] without a request when a fetch is
    /// already pending or the server reported no further pages.
    pub async fn load_more(&self) -> Result<LoadOutcome, CoreError> {
        let (generation, cursor) = {
            let mut state = self.lock();
            if state.in_flight {
                debug!("load_more skipped: fetch in flight");
                return Ok(LoadOutcome::Skipped);
            }
            let Some(cursor) = state.next_cursor.clone() else {
                debug!("load_more skipped: no more pages");
                return Ok(LoadOutcome::Skipped);
            };
            state.in_flight = true;
            (state.generation, cursor)
        };
        let slot = InFlight::new(&self.state, generation);
        self.fetch(slot, Some(cursor)).await
    }

    async fn fetch(
        &self,
        mut slot: InFlight<'_>,
        cursor: Option<String>,
    ) -> Result<LoadOutcome, CoreError> {
        let generation = slot.generation;
        let appending = cursor.is_some();
        let result = self.api.fetch_log_page(self.page_size, cursor.as_deref()).await;

        let mut state = self.lock();
        slot.release(&mut state);
        if state.generation != generation {
            debug!(generation, current = state.generation, "discarding stale page");
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(page) => {
                let next = page.next_cursor().map(str::to_owned);
                let records: Vec<_> = page
                    .logs
                    .into_iter()
                    .map(|r| history_record(r, &self.directory))
                    .collect();
                let count = records.len();

                if appending {
                    self.store.append_history(records);
                } else {
                    self.store.replace_history(records);
                }
                state.next_cursor = next;
                state.last_error = None;
                info!(records = count, has_more = state.next_cursor.is_some(), "history page loaded");
                Ok(LoadOutcome::Loaded { records: count })
            }
            Err(e) => {
                let err = CoreError::from(e);
                warn!(error = %err, "history fetch failed");
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Whether the server reported a further page.
    pub fn has_more(&self) -> bool {
        self.lock().next_cursor.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight
    }

    /// Message of the most recent failed fetch, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn lock(&self) -> MutexGuard<'_, PagingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the in-flight flag for one fetch of one generation.
///
/// Cleared either by [`release`](Self::release) once the response is in,
/// or on drop when the fetch future is abandoned. A newer generation's flag
/// is never touched.
struct InFlight<'a> {
    state: &'a Mutex<PagingState>,
    generation: u64,
    held: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Mutex<PagingState>, generation: u64) -> Self {
        Self {
            state,
            generation,
            held: true,
        }
    }

    fn release(&mut self, state: &mut PagingState) {
        if self.held && state.generation == self.generation {
            state.in_flight = false;
        }
        self.held = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            debug!(generation = self.generation, "history fetch abandoned");
            state.in_flight = false;
        }
        self.held = false;
    }
}
