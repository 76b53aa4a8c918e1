// Broker connection manager.
//
// One `BrokerConnection` owns one logical session: it coalesces concurrent
// connects onto a single dial, restores the subscription set after a
// reconnect, and fans inbound traffic out to registered listeners. After an
// unexpected loss it schedules exactly one reconnect attempt.

mod listeners;
mod message;
mod mqtt;
mod session;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionError, SubscriptionError};

use self::listeners::ListenerRegistry;
pub use self::listeners::ListenerHandle;
pub use self::message::{InboundMessage, Payload};
pub use self::mqtt::MqttDialer;
pub use self::session::{
    BrokerConfig, BrokerDialer, BrokerEndpoint, BrokerSession, DialedSession, QoS, RawMessage,
    SessionEvent, SessionOptions,
};

// ── Public state & events ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Lifecycle notification delivered to `on_connection_event` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    /// `reason` is `None` for an explicit `disconnect()`.
    Disconnected { reason: Option<String> },
    Error(ConnectionError),
}

impl ConnectionEvent {
    pub fn kind(&self) -> ConnectionEventKind {
        match self {
            Self::Connected => ConnectionEventKind::Connect,
            Self::Disconnected { .. } => ConnectionEventKind::Disconnect,
            Self::Error(_) => ConnectionEventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEventKind {
    Connect,
    Disconnect,
    Error,
}

// ── Connection ──────────────────────────────────────────────────────

type ConnectAttempt = Shared<BoxFuture<'static, Result<(), ConnectionError>>>;

/// The single broker session of a dashboard.
///
/// Cheap to clone; clones share the session. Construct one per process
/// and hand clones to whoever needs to subscribe or publish.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<Inner>,
}

struct Inner {
    options: SessionOptions,
    reconnect_delay: Duration,
    dialer: Arc<dyn BrokerDialer>,
    state: watch::Sender<ConnectionState>,
    live: Mutex<LiveSlot>,
    subscriptions: Mutex<IndexMap<String, QoS>>,
    messages: ListenerRegistry<InboundMessage>,
    events: ListenerRegistry<ConnectionEvent>,
}

/// Mutable session bookkeeping. `epoch` advances on every explicit
/// `disconnect()` so late results of an overtaken attempt are discarded.
#[derive(Default)]
struct LiveSlot {
    session: Option<Arc<dyn BrokerSession>>,
    attempt: Option<ConnectAttempt>,
    epoch: u64,
    driver: Option<CancellationToken>,
    reconnect: Option<CancellationToken>,
}

impl BrokerConnection {
    /// Build a connection that dials through `dialer`. Nothing is dialed
    /// until [`connect`](Self::connect).
    pub fn new(config: BrokerConfig, dialer: Arc<dyn BrokerDialer>) -> Self {
        let client_id = format!("vigil_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let options = SessionOptions {
            endpoint: config.endpoint,
            client_id,
            username: config.username,
            password: config.password,
            keep_alive: config.keep_alive,
            ack_timeout: config.ack_timeout,
        };
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                options,
                reconnect_delay: config.reconnect_delay,
                dialer,
                state,
                live: Mutex::new(LiveSlot::default()),
                subscriptions: Mutex::new(IndexMap::new()),
                messages: ListenerRegistry::new(),
                events: ListenerRegistry::new(),
            }),
        }
    }

    /// Build a connection speaking MQTT over WebSockets.
    pub fn mqtt(config: BrokerConfig) -> Self {
        Self::new(config, Arc::new(MqttDialer::default()))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Establish the session.
    ///
    /// Returns immediately when already connected. Concurrent callers share
    /// one in-flight attempt and all observe its outcome.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let attempt = {
            let mut live = lock(&self.inner.live);
            if live.session.is_some() {
                return Ok(());
            }
            if let Some(attempt) = live.attempt.clone() {
                attempt
            } else {
                let attempt = Arc::clone(&self.inner).spawn_attempt(live.epoch);
                live.attempt = Some(attempt.clone());
                self.inner.state.send_replace(ConnectionState::Connecting);
                attempt
            }
        };
        attempt.await
    }

    /// Close the session and cancel any pending automatic reconnect.
    ///
    /// An in-flight `connect()` resolves with [`ConnectionError::Cancelled`].
    pub async fn disconnect(&self) {
        let session = {
            let mut live = lock(&self.inner.live);
            live.epoch = live.epoch.wrapping_add(1);
            if let Some(timer) = live.reconnect.take() {
                timer.cancel();
            }
            if let Some(driver) = live.driver.take() {
                driver.cancel();
            }
            live.attempt = None;
            live.session.take()
        };

        let previous = self.inner.state.send_replace(ConnectionState::Disconnected);
        if let Some(session) = session {
            session.close().await;
        }
        if previous != ConnectionState::Disconnected {
            info!(client_id = %self.client_id(), "disconnected from broker");
            self.inner
                .events
                .emit(&ConnectionEvent::Disconnected { reason: None });
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SubscriptionError> {
        let session = self.require_session(topic)?;
        session.subscribe(topic, qos).await?;
        lock(&self.inner.subscriptions).insert(topic.to_owned(), qos);
        debug!(topic, ?qos, "subscribed");
        Ok(())
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), SubscriptionError> {
        let session = self.require_session(topic)?;
        session.unsubscribe(topic).await?;
        lock(&self.inner.subscriptions).shift_remove(topic);
        debug!(topic, "unsubscribed");
        Ok(())
    }

    /// Topics currently in the subscription set, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.inner.subscriptions).keys().cloned().collect()
    }

    // ── Publishing ───────────────────────────────────────────────────

    /// Hand a message to the transport. Returns `false` when not connected
    /// or when the transport refuses it; nothing is queued.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>, qos: QoS, retained: bool) -> bool {
        let Some(session) = lock(&self.inner.live).session.clone() else {
            warn!(topic, "publish while not connected; message dropped");
            return false;
        };

        match session.publish(topic, payload.into(), qos, retained) {
            Ok(()) => {
                debug!(topic, "published");
                true
            }
            Err(e) => {
                warn!(topic, error = %e, "publish failed");
                false
            }
        }
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Observe every inbound message, in transport order.
    pub fn on_message(
        &self,
        listener: impl Fn(&InboundMessage) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner.messages.register(listener)
    }

    /// Observe connection events of one kind.
    pub fn on_connection_event(
        &self,
        kind: ConnectionEventKind,
        listener: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner.events.register(move |event: &ConnectionEvent| {
            if event.kind() == kind {
                listener(event);
            }
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Client identity presented to the broker; stable across reconnects.
    pub fn client_id(&self) -> &str {
        &self.inner.options.client_id
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.inner.options.endpoint
    }

    /// A non-owning handle, for listeners that need to call back into the
    /// connection without keeping it alive.
    pub fn downgrade(&self) -> WeakBrokerConnection {
        WeakBrokerConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn require_session(&self, topic: &str) -> Result<Arc<dyn BrokerSession>, SubscriptionError> {
        lock(&self.inner.live)
            .session
            .clone()
            .ok_or_else(|| SubscriptionError::NotConnected {
                topic: topic.to_owned(),
            })
    }
}

impl fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("client_id", &self.client_id())
            .field("endpoint", &self.inner.options.endpoint.url())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Weak counterpart of [`BrokerConnection`].
#[derive(Clone, Debug)]
pub struct WeakBrokerConnection {
    inner: Weak<Inner>,
}

impl WeakBrokerConnection {
    pub fn upgrade(&self) -> Option<BrokerConnection> {
        self.inner.upgrade().map(|inner| BrokerConnection { inner })
    }
}

// ── Session driving ─────────────────────────────────────────────────

impl Inner {
    fn spawn_attempt(self: Arc<Self>, epoch: u64) -> ConnectAttempt {
        let task = tokio::spawn(self.establish(epoch));
        async move {
            task.await.unwrap_or_else(|e| {
                Err(ConnectionError::Protocol {
                    message: format!("connect task aborted: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }

    async fn establish(self: Arc<Self>, epoch: u64) -> Result<(), ConnectionError> {
        debug!(
            client_id = %self.options.client_id,
            endpoint = %self.options.endpoint,
            "dialing broker"
        );

        let dialed = match self.dialer.dial(&self.options).await {
            Ok(dialed) => dialed,
            Err(err) => {
                let current = {
                    let mut live = lock(&self.live);
                    let current = live.epoch == epoch;
                    if current {
                        live.attempt = None;
                    }
                    current
                };
                if current {
                    self.state.send_replace(ConnectionState::Disconnected);
                    warn!(error = %err, "broker connection failed");
                    self.events.emit(&ConnectionEvent::Error(err.clone()));
                }
                return Err(err);
            }
        };

        let DialedSession { session, events } = dialed;
        let driver = CancellationToken::new();
        let accepted = {
            let mut live = lock(&self.live);
            let accepted = live.epoch == epoch;
            if accepted {
                live.attempt = None;
                live.session = Some(Arc::clone(&session));
                live.driver = Some(driver.clone());
            }
            accepted
        };
        if !accepted {
            debug!("connect attempt overtaken by disconnect; closing session");
            session.close().await;
            return Err(ConnectionError::Cancelled);
        }

        self.state.send_replace(ConnectionState::Connected);
        info!(
            client_id = %self.options.client_id,
            endpoint = %self.options.endpoint,
            "connected to broker"
        );
        tokio::spawn(drive(Arc::downgrade(&self), epoch, events, driver));

        self.restore_subscriptions(session.as_ref()).await;
        self.events.emit(&ConnectionEvent::Connected);
        Ok(())
    }

    async fn restore_subscriptions(&self, session: &dyn BrokerSession) {
        let topics: Vec<(String, QoS)> = lock(&self.subscriptions)
            .iter()
            .map(|(topic, qos)| (topic.clone(), *qos))
            .collect();

        for (topic, qos) in topics {
            match session.subscribe(&topic, qos).await {
                Ok(()) => debug!(topic, "subscription restored"),
                Err(e) => warn!(topic, error = %e, "failed to restore subscription"),
            }
        }
    }

    /// React to an unexpected session loss: publish `Disconnected` and
    /// schedule the single automatic reconnect.
    fn handle_loss(self: &Arc<Self>, epoch: u64, reason: String) {
        let (session, timer) = {
            let mut live = lock(&self.live);
            if live.epoch != epoch || live.session.is_none() {
                return;
            }
            live.driver = None;
            let timer = CancellationToken::new();
            if let Some(previous) = live.reconnect.replace(timer.clone()) {
                previous.cancel();
            }
            (live.session.take(), timer)
        };

        self.state.send_replace(ConnectionState::Disconnected);
        warn!(reason = %reason, "broker connection lost");
        self.events.emit(&ConnectionEvent::Disconnected {
            reason: Some(reason),
        });

        if let Some(session) = session {
            tokio::spawn(async move { session.close().await });
        }

        let weak = Arc::downgrade(self);
        let delay = self.reconnect_delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            let Some(inner) = weak.upgrade() else { return };
            lock(&inner.live).reconnect = None;
            let connection = BrokerConnection { inner };
            if connection.is_connected() {
                return;
            }

            info!("attempting automatic reconnect");
            if let Err(e) = connection.connect().await {
                warn!(error = %e, "automatic reconnect failed; staying disconnected");
            }
        });
    }
}

/// Forward one session's events to listeners until it dies or is cancelled.
async fn drive(
    weak: Weak<Inner>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            event = events.recv() => event,
        };

        let Some(inner) = weak.upgrade() else { return };
        match event {
            Some(SessionEvent::Message(raw)) => {
                let message = InboundMessage::decode(raw);
                debug!(topic = %message.topic, bytes = message.raw.len(), "message received");
                inner.messages.emit(&message);
            }
            Some(SessionEvent::Lost { reason }) => {
                inner.handle_loss(epoch, reason);
                return;
            }
            None => {
                inner.handle_loss(epoch, "session event stream closed".into());
                return;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
