// ── Feed merge ──
//
// Pure function from (live ring, history list) to the ordered feed.
// `FeedStore` calls it on every mutation; nothing here holds state.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::EventRecord;

/// Merge live and historical records into one feed.
///
/// Live records come first, then history; the first record seen for an id
/// wins. The result is stable-sorted newest first, so equal timestamps keep
/// live-before-history order. Records whose timestamp cannot be parsed sort
/// as the oldest.
pub fn merge(live: &[Arc<EventRecord>], history: &[Arc<EventRecord>]) -> Vec<Arc<EventRecord>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(live.len() + history.len());
    let mut feed: Vec<Arc<EventRecord>> = live
        .iter()
        .chain(history)
        .filter(|record| seen.insert(record.id.as_str()))
        .cloned()
        .collect();

    // `Option` orders `None` below every `Some`, so reversing the
    // comparison also puts unparseable timestamps last.
    feed.sort_by_cached_key(|record| std::cmp::Reverse(record.instant()));
    feed
}
