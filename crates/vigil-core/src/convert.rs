// ── Wire → domain conversion ──
//
// Turns `vigil_api::models` records into `EventRecord`s. Live payloads get a
// generated id and "now" as fallback timestamp; history records keep what
// the server sent.

use chrono::Utc;
use uuid::Uuid;
use vigil_api::models::{LiveLogPayload, LogRecord, WireTimestamp};

use crate::model::{DeviceDirectory, EventRecord, Origin, Timestamp};

pub(crate) fn timestamp_from_wire(wire: WireTimestamp) -> Timestamp {
    match wire {
        WireTimestamp::Millis(ms) => Timestamp::Millis(ms),
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        WireTimestamp::Fractional(ms) => Timestamp::Millis(ms.round() as i64),
        WireTimestamp::Text(text) => Timestamp::Text(text),
    }
}

/// `live-{epoch_ms}-{uuid}`: unique per process, roughly time-sortable.
pub(crate) fn live_id() -> String {
    format!("live-{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple())
}

pub(crate) fn live_record(payload: LiveLogPayload, directory: &DeviceDirectory) -> EventRecord {
    let device_name = directory.resolve(payload.device_id.as_deref());
    EventRecord {
        id: live_id(),
        origin: payload
            .origin
            .as_deref()
            .map_or(Origin::Device, Origin::from_wire),
        message: payload.msg.unwrap_or_default(),
        timestamp: payload
            .timestamp
            .map_or_else(Timestamp::now, timestamp_from_wire),
        device_id: payload.device_id,
        device_name,
        door_open: payload.is_open,
        is_live: true,
    }
}

pub(crate) fn history_record(record: LogRecord, directory: &DeviceDirectory) -> EventRecord {
    let device_name = record
        .device_name
        .or_else(|| directory.resolve(record.device_id.as_deref()));
    EventRecord {
        id: record
            .id
            .unwrap_or_else(|| format!("history-{}", Uuid::new_v4().simple())),
        origin: record
            .origin
            .as_deref()
            .map_or(Origin::Unknown, Origin::from_wire),
        message: record.msg.unwrap_or_default(),
        timestamp: record
            .timestamp
            .map_or_else(|| Timestamp::Text(String::new()), timestamp_from_wire),
        device_id: record.device_id,
        device_name,
        door_open: record.is_open,
        is_live: false,
    }
}
