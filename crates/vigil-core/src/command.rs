// ── Outbound commands ──
//
// Fire-and-forget publishes over the shared broker session. No
// acknowledgement exists beyond the transport accepting the message.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use vigil_api::{BrokerConnection, QoS};

/// Topic the backend listens on for arm/disarm requests.
pub const SET_MODE_TOPIC: &str = "system/cmd/setMode";

/// A typed command understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Arm (`true`) or disarm (`false`) the system.
    SetMode { is_armed: bool },
}

impl Command {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::SetMode { .. } => SET_MODE_TOPIC,
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::SetMode { is_armed } => json!({ "isArmed": is_armed }),
        }
    }
}

/// Serializes commands and hands them to the broker connection.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    connection: BrokerConnection,
}

impl CommandPublisher {
    pub fn new(connection: BrokerConnection) -> Self {
        Self { connection }
    }

    /// Publish a typed command. `false` means it was not handed to the
    /// transport and nothing changed on the backend.
    pub fn send(&self, command: Command) -> bool {
        self.send_command(command.topic(), &command.payload())
    }

    /// Serialize `command` and publish it on `topic` at QoS 0.
    ///
    /// JSON strings are sent as their raw text; everything else as JSON.
    pub fn send_command<T: Serialize + ?Sized>(&self, topic: &str, command: &T) -> bool {
        let body = match serde_json::to_value(command) {
            Ok(serde_json::Value::String(text)) => text.into_bytes(),
            Ok(value) => value.to_string().into_bytes(),
            Err(e) => {
                warn!(topic, error = %e, "command could not be serialized");
                return false;
            }
        };

        let accepted = self.connection.publish(topic, body, QoS::AtMostOnce, false);
        debug!(topic, accepted, "command published");
        accepted
    }
}
