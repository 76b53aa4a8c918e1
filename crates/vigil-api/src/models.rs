// Wire types for the REST API and the live broker payloads.
//
// Field names follow the backend's camelCase JSON; everything the server
// may omit is optional so a sparse record still decodes.

use serde::{Deserialize, Serialize};

/// A timestamp exactly as the backend sent it.
///
/// Historical records carry ISO-8601 strings; live events from devices
/// usually carry epoch milliseconds, sometimes stringified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

/// One record of the paginated log, `GET /api/logs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default, rename = "dName")]
    pub device_name: Option<String>,
    #[serde(default)]
    pub is_open: Option<bool>,
}

/// Response envelope of `GET /api/logs?limit=&cursor=`.
///
/// A `null`, absent, or empty `nextCursor` means there are no more pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    #[serde(default)]
    pub logs: Vec<LogRecord>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl LogPage {
    /// The cursor for the following page, treating `""` as absent.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Payload published on the `system/logs` topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveLogPayload {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub is_open: Option<bool>,
}

/// One entry of `GET /api/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "dName")]
    pub name: String,
    #[serde(default, rename = "dType")]
    pub device_type: Option<String>,
    /// Everything else the backend attaches to a device.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemName {
    #[serde(default)]
    pub sys_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMode {
    #[serde(default)]
    pub is_armed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RenameDeviceRequest<'a> {
    #[serde(rename = "dName")]
    pub current: &'a str,
    #[serde(rename = "newdName")]
    pub new_name: &'a str,
}
