// Async REST client for the vigil backend.
//
// Endpoints live under `{base}/api/`. Responses are plain JSON objects, no
// envelope; any non-2xx status becomes `Error::Http` with the body text.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{DeviceList, DeviceRecord, LogPage, RenameDeviceRequest, SystemMode, SystemName};
use crate::transport::TransportConfig;

/// Client for the backend's REST endpoints.
///
/// Cheap to clone; the inner `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` (e.g. `https://vigil.example.com`).
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url)
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Log history ──────────────────────────────────────────────────

    /// Fetch one page of historical events, newest first.
    ///
    /// `cursor` is the opaque `nextCursor` of the previous page; `None`
    /// requests the first page.
    pub async fn fetch_log_page(&self, limit: u32, cursor: Option<&str>) -> Result<LogPage, Error> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_owned()));
        }
        self.get_with_params("logs", &params).await
    }

    // ── Devices & system ─────────────────────────────────────────────

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let list: DeviceList = self.get("devices").await?;
        Ok(list.devices)
    }

    pub async fn system_name(&self) -> Result<Option<String>, Error> {
        let name: SystemName = self.get("sysName").await?;
        Ok(name.sys_name)
    }

    pub async fn rename_system(&self, new_name: &str) -> Result<(), Error> {
        let body = SystemName {
            sys_name: Some(new_name.to_owned()),
        };
        self.patch("sysName", &body).await
    }

    pub async fn rename_device(&self, current: &str, new_name: &str) -> Result<(), Error> {
        let body = RenameDeviceRequest { current, new_name };
        self.patch("dName", &body).await
    }

    /// Current arm state as reported by the backend.
    pub async fn system_mode(&self) -> Result<SystemMode, Error> {
        self.get("sysMode").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/api/{path}")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        Self::handle_response(resp).await
    }

    async fn patch<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = self.url(path);
        debug!("PATCH {url}");

        let resp = self.http.patch(url).json(body).send().await?;
        Self::handle_empty(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::status_error(status, resp).await);
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::status_error(status, resp).await)
        }
    }

    async fn status_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let body = resp.text().await.unwrap_or_default();
        Error::Http {
            status: status.as_u16(),
            body,
        }
    }
}
