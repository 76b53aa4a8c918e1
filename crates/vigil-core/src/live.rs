// ── Live event normalizer ──
//
// Bridges the broker session and the feed store: keeps a subscription to
// `system/logs` while the session is up and turns each payload into a live
// `EventRecord` at the head of the ring.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use thiserror::Error;
use tracing::{debug, info, warn};
use vigil_api::models::LiveLogPayload;
use vigil_api::{
    BrokerConnection, ConnectionEventKind, InboundMessage, ListenerHandle, Payload, QoS,
};

use crate::convert::live_record;
use crate::model::{DeviceDirectory, EventRecord};
use crate::store::FeedStore;

/// Topic carrying live event notifications.
pub const LIVE_TOPIC: &str = "system/logs";

/// Why a live payload was dropped. Logged, never surfaced to callers.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not JSON: {preview:?}")]
    NotJson { preview: String },

    #[error("payload is JSON but not an object")]
    NotAnObject,

    #[error("payload fields have unexpected types: {0}")]
    Fields(#[from] serde_json::Error),
}

/// Turns `system/logs` traffic into live feed records.
pub struct LiveEventNormalizer {
    store: Arc<FeedStore>,
    directory: Arc<DeviceDirectory>,
    handles: Mutex<Vec<ListenerHandle>>,
}

impl LiveEventNormalizer {
    pub fn new(store: Arc<FeedStore>, directory: Arc<DeviceDirectory>) -> Arc<Self> {
        Arc::new(Self {
            store,
            directory,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Register with `connection`: subscribe on every connect, best-effort
    /// unsubscribe on disconnect, and ingest messages on [`LIVE_TOPIC`].
    ///
    /// Listeners hold only weak references; dropping the normalizer or
    /// calling [`detach`](Self::detach) stops ingestion.
    pub fn attach(self: &Arc<Self>, connection: &BrokerConnection) {
        let weak_self: Weak<Self> = Arc::downgrade(self);
        let on_message = connection.on_message(move |message| {
            if let Some(this) = weak_self.upgrade() {
                this.handle_message(message);
            }
        });

        let weak_conn = connection.downgrade();
        let on_connect = connection.on_connection_event(ConnectionEventKind::Connect, move |_| {
            let Some(connection) = weak_conn.upgrade() else {
                return;
            };
            if connection.subscriptions().iter().any(|t| t == LIVE_TOPIC) {
                debug!(topic = LIVE_TOPIC, "live topic already subscribed");
                return;
            }
            tokio::spawn(async move {
                match connection.subscribe(LIVE_TOPIC, QoS::AtMostOnce).await {
                    Ok(()) => info!(topic = LIVE_TOPIC, "listening for live events"),
                    Err(e) => warn!(topic = LIVE_TOPIC, error = %e, "live subscription failed"),
                }
            });
        });

        let weak_conn = connection.downgrade();
        let on_disconnect =
            connection.on_connection_event(ConnectionEventKind::Disconnect, move |_| {
                let Some(connection) = weak_conn.upgrade() else {
                    return;
                };
                // The session is already gone when Disconnect fires, so this
                // normally fails with NotConnected. The topic stays in
                // `subscriptions()` and is restored on reconnect.
                tokio::spawn(async move {
                    if let Err(e) = connection.unsubscribe(LIVE_TOPIC).await {
                        debug!(topic = LIVE_TOPIC, error = %e, "unsubscribe during teardown failed");
                    }
                });
            });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.extend([on_message, on_connect, on_disconnect]);
    }

    /// Unregister every listener installed by [`attach`](Self::attach).
    pub fn detach(&self) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Ingest one inbound message. Messages on other topics are ignored;
    /// undecodable payloads are logged and dropped.
    pub fn handle_message(&self, message: &InboundMessage) -> Option<Arc<EventRecord>> {
        if message.topic != LIVE_TOPIC {
            return None;
        }

        match self.normalize(&message.payload) {
            Ok(record) => {
                debug!(id = %record.id, device = ?record.device_id, "live event");
                Some(self.store.push_live(record))
            }
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "dropping malformed live payload");
                None
            }
        }
    }

    /// Decode a payload into a live record without storing it.
    pub fn normalize(&self, payload: &Payload) -> Result<EventRecord, DecodeError> {
        let value = match payload {
            Payload::Json(value) if value.is_object() => value.clone(),
            Payload::Json(_) => return Err(DecodeError::NotAnObject),
            Payload::Text(text) => {
                return Err(DecodeError::NotJson {
                    preview: text.chars().take(64).collect(),
                });
            }
        };
        let wire: LiveLogPayload = serde_json::from_value(value)?;
        Ok(live_record(wire, &self.directory))
    }

    /// Drop all live records.
    pub fn clear(&self) {
        self.store.clear_live();
    }

    pub fn live(&self) -> crate::store::Snapshot {
        self.store.live()
    }

    pub fn latest(&self) -> Option<Arc<EventRecord>> {
        self.store.latest()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::model::{Origin, Timestamp};

    fn normalizer() -> (Arc<FeedStore>, Arc<LiveEventNormalizer>) {
        let store = Arc::new(FeedStore::new());
        let live = LiveEventNormalizer::new(Arc::clone(&store), Arc::new(DeviceDirectory::default()));
        (store, live)
    }

    fn message(topic: &str, body: &[u8]) -> InboundMessage {
        InboundMessage {
            topic: topic.into(),
            payload: Payload::decode(body),
            raw: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn motion_event_is_enriched_and_heads_the_feed() {
        let (store, live) = normalizer();
        store.replace_history(vec![EventRecord {
            id: "h1".into(),
            origin: Origin::System,
            message: "System armed".into(),
            timestamp: Timestamp::Text("2023-11-14T20:00:00Z".into()),
            device_id: None,
            device_name: None,
            door_open: None,
            is_live: false,
        }]);

        let body = json!({
            "origin": "device",
            "msg": "Motion detected",
            "deviceId": "d254",
            "timestamp": 1_700_000_000_000_i64
        });
        let record = live
            .handle_message(&message(LIVE_TOPIC, body.to_string().as_bytes()))
            .unwrap();

        assert_eq!(record.device_name.as_deref(), Some("Motion Detector"));
        assert!(record.is_live);
        assert_eq!(record.origin, Origin::Device);
        assert_eq!(record.timestamp, Timestamp::Millis(1_700_000_000_000));

        let feed = store.feed();
        assert_eq!(feed[0].id, record.id);
        assert_eq!(feed[1].id, "h1");
        assert_eq!(live.latest().unwrap().id, record.id);
    }

    #[test]
    fn malformed_payload_leaves_buffer_unchanged() {
        let (store, live) = normalizer();
        live.handle_message(&message(LIVE_TOPIC, br#"{"msg":"ok"}"#));
        assert_eq!(store.live().len(), 1);

        assert!(live.handle_message(&message(LIVE_TOPIC, b"{not json")).is_none());
        assert!(live.handle_message(&message(LIVE_TOPIC, b"[1,2,3]")).is_none());
        assert!(live.handle_message(&message(LIVE_TOPIC, br#"{"msg":42}"#)).is_none());
        assert!(live.handle_message(&message(LIVE_TOPIC, br#"{"deviceId":7}"#)).is_none());

        assert_eq!(store.live().len(), 1);
    }

    #[test]
    fn other_topics_are_ignored() {
        let (store, live) = normalizer();
        assert!(live.handle_message(&message("system/status", br#"{"msg":"x"}"#)).is_none());
        assert!(store.live().is_empty());
    }

    #[test]
    fn door_state_and_unknown_devices_pass_through() {
        let (_store, live) = normalizer();
        let record = live
            .normalize(&Payload::Json(json!({ "deviceId": "d777", "isOpen": true, "origin": "gadget" })))
            .unwrap();

        assert_eq!(record.device_name.as_deref(), Some("d777"));
        assert_eq!(record.door_open, Some(true));
        assert_eq!(record.origin, Origin::Unknown);
    }

    #[test]
    fn sixty_events_keep_fifty_newest() {
        let (store, live) = normalizer();
        for i in 0..60 {
            let body = json!({ "msg": format!("event {i}"), "timestamp": 1_000 + i });
            live.handle_message(&message(LIVE_TOPIC, body.to_string().as_bytes()));
        }

        let ring = store.live();
        assert_eq!(ring.len(), 50);
        assert_eq!(ring[0].message, "event 59");
        assert_eq!(ring[49].message, "event 10");
    }

    #[test]
    fn clear_empties_the_ring() {
        let (_store, live) = normalizer();
        live.handle_message(&message(LIVE_TOPIC, br#"{"msg":"a"}"#));
        live.clear();
        assert!(live.live().is_empty());
        assert!(live.latest().is_none());
    }
}
