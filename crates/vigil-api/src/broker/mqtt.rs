// MQTT 3.1.1 over WebSockets, backed by rumqttc.
//
// rumqttc drives the protocol from a single `EventLoop`. We poll it until
// CONNACK during `dial`, then hand it to a driver task that forwards
// publishes and resolves SUBACK / UNSUBACK waiters in request order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeReasonCode, Transport,
};
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::session::{
    BrokerDialer, BrokerSession, DialedSession, QoS, RawMessage, SessionEvent, SessionOptions,
};
use crate::error::{ConnectionError, SubscriptionError};

/// How long `close` waits for the DISCONNECT to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── Dialer ──────────────────────────────────────────────────────────

/// Production [`BrokerDialer`]: clean session, username/password auth,
/// `wss://` (or `ws://`) transport.
#[derive(Debug, Clone)]
pub struct MqttDialer {
    /// Bound of rumqttc's outgoing request channel.
    request_capacity: usize,
}

impl Default for MqttDialer {
    fn default() -> Self {
        Self {
            request_capacity: 10,
        }
    }
}

impl MqttDialer {
    fn mqtt_options(options: &SessionOptions) -> MqttOptions {
        let endpoint = &options.endpoint;
        let mut mqtt = MqttOptions::new(&options.client_id, endpoint.url(), endpoint.port);
        mqtt.set_transport(if endpoint.use_tls {
            Transport::wss_with_default_config()
        } else {
            Transport::Ws
        });
        mqtt.set_keep_alive(options.keep_alive);
        mqtt.set_clean_session(true);
        if let Some(username) = &options.username {
            let password = options
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_owned())
                .unwrap_or_default();
            mqtt.set_credentials(username, password);
        }
        mqtt
    }
}

#[async_trait]
impl BrokerDialer for MqttDialer {
    async fn dial(&self, options: &SessionOptions) -> Result<DialedSession, ConnectionError> {
        let (client, mut eventloop) =
            AsyncClient::new(Self::mqtt_options(options), self.request_capacity);

        match tokio::time::timeout(options.ack_timeout, await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ConnectionError::Network {
                    message: format!(
                        "no CONNACK from {} within {:?}",
                        options.endpoint, options.ack_timeout
                    ),
                });
            }
        }
        debug!(endpoint = %options.endpoint, "CONNACK received");

        let (tx, rx) = mpsc::unbounded_channel();
        let acks = Arc::new(AckQueues::default());
        let closing = Arc::new(AtomicBool::new(false));
        let stop = CancellationToken::new();
        let finished = CancellationToken::new();

        tokio::spawn(drive_eventloop(
            eventloop,
            tx,
            Arc::clone(&acks),
            Arc::clone(&closing),
            stop.clone(),
            finished.clone(),
        ));

        let session = MqttSession {
            client,
            acks,
            ack_timeout: options.ack_timeout,
            request_order: tokio::sync::Mutex::new(()),
            closing,
            stop,
            finished,
        };

        Ok(DialedSession {
            session: Arc::new(session),
            events: rx,
        })
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(refused(ack.code))
                };
            }
            Ok(event) => trace!(?event, "pre-CONNACK event"),
            Err(e) => return Err(map_connection_error(e)),
        }
    }
}

fn refused(code: ConnectReturnCode) -> ConnectionError {
    match code {
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            ConnectionError::Authentication {
                message: format!("broker refused connection: {code:?}"),
            }
        }
        other => ConnectionError::Protocol {
            message: format!("broker refused connection: {other:?}"),
        },
    }
}

fn map_connection_error(err: rumqttc::ConnectionError) -> ConnectionError {
    match err {
        rumqttc::ConnectionError::ConnectionRefused(code) => refused(code),
        rumqttc::ConnectionError::MqttState(e) => ConnectionError::Protocol {
            message: e.to_string(),
        },
        rumqttc::ConnectionError::NotConnAck(packet) => ConnectionError::Protocol {
            message: format!("expected CONNACK, got {packet:?}"),
        },
        other => ConnectionError::Network {
            message: other.to_string(),
        },
    }
}

// ── Acknowledgement tracking ────────────────────────────────────────

#[derive(Debug)]
enum AckOutcome {
    Granted,
    Refused,
    Failed(String),
}

/// Waiters for SUBACK / UNSUBACK. The broker acknowledges in request order,
/// so each queue is strictly FIFO.
#[derive(Default)]
struct AckQueues {
    subscribe: Mutex<VecDeque<oneshot::Sender<AckOutcome>>>,
    unsubscribe: Mutex<VecDeque<oneshot::Sender<AckOutcome>>>,
}

impl AckQueues {
    fn resolve(queue: &Mutex<VecDeque<oneshot::Sender<AckOutcome>>>, outcome: AckOutcome) {
        match lock(queue).pop_front() {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => debug!(?outcome, "acknowledgement with no waiter"),
        }
    }

    fn fail_all(&self, reason: &str) {
        for queue in [&self.subscribe, &self.unsubscribe] {
            for waiter in lock(queue).drain(..) {
                let _ = waiter.send(AckOutcome::Failed(reason.to_owned()));
            }
        }
    }
}

async fn drive_eventloop(
    mut eventloop: EventLoop,
    events: mpsc::UnboundedSender<SessionEvent>,
    acks: Arc<AckQueues>,
    closing: Arc<AtomicBool>,
    stop: CancellationToken,
    finished: CancellationToken,
) {
    loop {
        let polled = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = RawMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                    qos: publish.qos,
                    retain: publish.retain,
                };
                if events.send(SessionEvent::Message(message)).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let outcome = if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    AckOutcome::Refused
                } else {
                    AckOutcome::Granted
                };
                AckQueues::resolve(&acks.subscribe, outcome);
            }
            Ok(Event::Incoming(Packet::UnsubAck(_))) => {
                AckQueues::resolve(&acks.unsubscribe, AckOutcome::Granted);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT sent; stopping event loop");
                break;
            }
            Ok(event) => trace!(?event, "mqtt event"),
            Err(e) => {
                let reason = e.to_string();
                acks.fail_all(&reason);
                if !closing.load(Ordering::SeqCst) {
                    let _ = events.send(SessionEvent::Lost { reason });
                }
                break;
            }
        }
    }

    acks.fail_all("session closed");
    finished.cancel();
}

// ── Session ─────────────────────────────────────────────────────────

struct MqttSession {
    client: AsyncClient,
    acks: Arc<AckQueues>,
    ack_timeout: Duration,
    /// Keeps "enqueue waiter" and "send request" atomic so waiter order
    /// matches wire order.
    request_order: tokio::sync::Mutex<()>,
    closing: Arc<AtomicBool>,
    stop: CancellationToken,
    finished: CancellationToken,
}

impl MqttSession {
    async fn await_ack(
        &self,
        topic: &str,
        rx: oneshot::Receiver<AckOutcome>,
        packet: &str,
    ) -> Result<(), SubscriptionError> {
        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(AckOutcome::Granted)) => Ok(()),
            Ok(Ok(AckOutcome::Refused)) => Err(SubscriptionError::Rejected {
                topic: topic.to_owned(),
            }),
            Ok(Ok(AckOutcome::Failed(message))) => Err(SubscriptionError::Transport {
                topic: topic.to_owned(),
                message,
            }),
            Ok(Err(_)) => Err(SubscriptionError::Transport {
                topic: topic.to_owned(),
                message: "session closed before acknowledgement".into(),
            }),
            Err(_) => Err(SubscriptionError::Transport {
                topic: topic.to_owned(),
                message: format!("no {packet} within {:?}", self.ack_timeout),
            }),
        }
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SubscriptionError> {
        let (tx, rx) = oneshot::channel();
        {
            let _order = self.request_order.lock().await;
            lock(&self.acks.subscribe).push_back(tx);
            self.client
                .subscribe(topic, qos)
                .await
                .map_err(|e| SubscriptionError::Transport {
                    topic: topic.to_owned(),
                    message: e.to_string(),
                })?;
        }
        self.await_ack(topic, rx, "SUBACK").await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), SubscriptionError> {
        let (tx, rx) = oneshot::channel();
        {
            let _order = self.request_order.lock().await;
            lock(&self.acks.unsubscribe).push_back(tx);
            self.client
                .unsubscribe(topic)
                .await
                .map_err(|e| SubscriptionError::Transport {
                    topic: topic.to_owned(),
                    message: e.to_string(),
                })?;
        }
        self.await_ack(topic, rx, "UNSUBACK").await
    }

    fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<(), String> {
        self.client
            .try_publish(topic, qos, retain, Vec::from(payload))
            .map_err(|e| e.to_string())
    }

    async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "DISCONNECT could not be queued");
        }
        if tokio::time::timeout(CLOSE_GRACE, self.finished.cancelled())
            .await
            .is_err()
        {
            warn!("event loop did not stop after DISCONNECT; cancelling");
        }
        self.stop.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
