// ── Domain model ──
//
// Canonical types the feed is built from. Both the REST history and the
// live broker payloads are converted into `EventRecord`.

pub mod device;
pub mod event;

pub use device::DeviceDirectory;
pub use event::{EventRecord, Origin, Timestamp};
