// ── Feed storage ──
//
// `FeedStore` owns the live ring and the history list and publishes the
// merged feed through `watch` channels.

mod feed_store;
mod ring;

pub use feed_store::{FeedStore, Snapshot};
pub use ring::BoundedRing;
