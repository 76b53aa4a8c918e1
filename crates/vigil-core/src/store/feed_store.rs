// ── Memoized feed store ──
//
// Both sources live behind one mutex. Every mutation rebuilds the affected
// snapshots and the merged feed before the lock is released, so a read
// that follows a mutation always sees the merged result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::ring::BoundedRing;
use crate::feed::merge;
use crate::model::EventRecord;
use crate::stream::SnapshotStream;

/// Immutable, cheaply cloned list of records.
pub type Snapshot = Arc<Vec<Arc<EventRecord>>>;

/// Live events kept in memory.
pub const LIVE_CAPACITY: usize = 50;

struct Sources {
    live: BoundedRing<Arc<EventRecord>>,
    history: Vec<Arc<EventRecord>>,
}

/// Live ring + history list + the merged feed derived from them.
pub struct FeedStore {
    sources: Mutex<Sources>,
    live: watch::Sender<Snapshot>,
    history: watch::Sender<Snapshot>,
    feed: watch::Sender<Snapshot>,
    latest: watch::Sender<Option<Arc<EventRecord>>>,
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStore {
    pub fn new() -> Self {
        Self::with_live_capacity(LIVE_CAPACITY)
    }

    pub fn with_live_capacity(capacity: usize) -> Self {
        let empty = || Arc::new(Vec::new());
        let (live, _) = watch::channel(empty());
        let (history, _) = watch::channel(empty());
        let (feed, _) = watch::channel(empty());
        let (latest, _) = watch::channel(None);

        Self {
            sources: Mutex::new(Sources {
                live: BoundedRing::new(capacity),
                history: Vec::new(),
            }),
            live,
            history,
            feed,
            latest,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Put a live record at the head of the ring.
    pub fn push_live(&self, record: EventRecord) -> Arc<EventRecord> {
        let record = Arc::new(record);
        let mut sources = self.lock();
        sources.live.push_front(Arc::clone(&record));
        self.publish_live(&sources);
        self.publish_feed(&sources);
        record
    }

    /// Drop every live record.
    pub fn clear_live(&self) {
        let mut sources = self.lock();
        sources.live.clear();
        self.publish_live(&sources);
        self.publish_feed(&sources);
    }

    /// Replace the history with a freshly fetched first page.
    pub fn replace_history(&self, records: Vec<EventRecord>) {
        let mut sources = self.lock();
        sources.history = records.into_iter().map(Arc::new).collect();
        self.publish_history(&sources);
        self.publish_feed(&sources);
    }

    /// Append a further page to the history, preserving page order.
    pub fn append_history(&self, records: Vec<EventRecord>) {
        let mut sources = self.lock();
        sources.history.extend(records.into_iter().map(Arc::new));
        self.publish_history(&sources);
        self.publish_feed(&sources);
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// The merged feed, newest first.
    pub fn feed(&self) -> Snapshot {
        self.feed.borrow().clone()
    }

    /// Live records, newest first.
    pub fn live(&self) -> Snapshot {
        self.live.borrow().clone()
    }

    /// Historical records in page order.
    pub fn history(&self) -> Snapshot {
        self.history.borrow().clone()
    }

    /// The most recently received live record.
    pub fn latest(&self) -> Option<Arc<EventRecord>> {
        self.latest.borrow().clone()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_feed(&self) -> SnapshotStream<EventRecord> {
        SnapshotStream::new(self.feed.subscribe())
    }

    pub fn subscribe_live(&self) -> SnapshotStream<EventRecord> {
        SnapshotStream::new(self.live.subscribe())
    }

    /// Fires whenever the head of the live ring changes.
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<Arc<EventRecord>>> {
        self.latest.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_live(&self, sources: &Sources) {
        let live: Vec<Arc<EventRecord>> = sources.live.iter().cloned().collect();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.live.send_replace(Arc::new(live));
        self.latest.send_replace(sources.live.front().cloned());
    }

    fn publish_history(&self, sources: &Sources) {
        self.history.send_replace(Arc::new(sources.history.clone()));
    }

    fn publish_feed(&self, sources: &Sources) {
        let live = self.live.borrow().clone();
        let merged = merge(&live, &sources.history);
        self.feed.send_replace(Arc::new(merged));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Origin, Timestamp};

    fn record(id: &str, ms: i64, is_live: bool) -> EventRecord {
        EventRecord {
            id: id.into(),
            origin: Origin::Device,
            message: String::new(),
            timestamp: Timestamp::Millis(ms),
            device_id: None,
            device_name: None,
            door_open: None,
            is_live,
        }
    }

    #[test]
    fn reads_after_mutation_see_merged_feed() {
        let store = FeedStore::new();
        store.replace_history(vec![record("h1", 100, false), record("h2", 50, false)]);
        store.push_live(record("l1", 75, true));

        let feed = store.feed();
        let ids: Vec<&str> = feed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "l1", "h2"]);
        assert_eq!(store.latest().unwrap().id, "l1");
    }

    #[test]
    fn ring_bound_applies_to_live_snapshot() {
        let store = FeedStore::new();
        for i in 0..60 {
            store.push_live(record(&format!("l{i}"), i, true));
        }

        let live = store.live();
        assert_eq!(live.len(), LIVE_CAPACITY);
        assert_eq!(live[0].id, "l59");
        assert_eq!(live[LIVE_CAPACITY - 1].id, "l10");
        assert_eq!(store.feed().len(), LIVE_CAPACITY);
    }

    #[test]
    fn append_extends_and_replace_resets() {
        let store = FeedStore::new();
        store.replace_history(vec![record("a", 3, false)]);
        store.append_history(vec![record("b", 2, false), record("c", 1, false)]);
        assert_eq!(store.history().len(), 3);

        store.replace_history(vec![record("z", 9, false)]);
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.feed()[0].id, "z");
    }

    #[test]
    fn clear_live_resets_latest() {
        let store = FeedStore::new();
        store.push_live(record("l", 1, true));
        store.clear_live();

        assert!(store.live().is_empty());
        assert!(store.latest().is_none());
        assert!(store.feed().is_empty());
    }

    #[tokio::test]
    async fn subscribers_are_notified() {
        let store = FeedStore::new();
        let mut feed = store.subscribe_feed();
        let mut latest = store.subscribe_latest();

        store.push_live(record("l", 1, true));

        let snap = feed.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        latest.changed().await.unwrap();
        assert_eq!(latest.borrow().as_ref().unwrap().id, "l");
    }
}
