//! reqwest-backed [`Connection`] for the SIMPLON HTTP API.

use async_trait::async_trait;
use eiger_core::{Connection, ConnectionError, Connector, ParameterResponse};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default detector address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default SIMPLON port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Address and timeout of the detector's HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl HttpSettings {
    /// Settings for `host:port` with the default timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// HTTP/JSON connection to one detector.
///
/// Reads are `GET {base}/{path}`; writes are `PUT {base}/{path}` with body
/// `{"value": ...}`. The underlying client pools sockets, so one connection
/// serves any number of concurrent requests.
pub struct HttpConnection {
    base_url: String,
    timeout: Duration,
    // None once closed
    client: RwLock<Option<Client>>,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("closed", &self.client.read().is_none())
            .finish()
    }
}

impl HttpConnection {
    /// Build a connection from settings. No request is made until first use.
    pub fn open(settings: &HttpSettings) -> Result<Self, ConnectionError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectionError::Request {
                path: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: settings.base_url(),
            timeout: settings.timeout(),
            client: RwLock::new(Some(client)),
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn client(&self) -> Result<Client, ConnectionError> {
        self.client.read().clone().ok_or(ConnectionError::Closed)
    }

    fn request_error(path: &str, err: reqwest::Error) -> ConnectionError {
        ConnectionError::Request {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    fn check_status(path: &str, response: &reqwest::Response) -> Result<(), ConnectionError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ConnectionError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn get(&self, path: &str) -> Result<ParameterResponse, ConnectionError> {
        let client = self.client()?;
        let url = self.url(path);
        debug!(%url, "GET");

        let response = client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::request_error(path, e))?;
        Self::check_status(path, &response)?;

        response
            .json::<ParameterResponse>()
            .await
            .map_err(|e| ConnectionError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    async fn put(&self, path: &str, value: Value) -> Result<(), ConnectionError> {
        let client = self.client()?;
        let url = self.url(path);
        debug!(%url, %value, "PUT");

        let response = client
            .put(&url)
            .timeout(self.timeout)
            .json(&json!({ "value": value }))
            .send()
            .await
            .map_err(|e| Self::request_error(path, e))?;
        Self::check_status(path, &response)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // Dropping the client releases its pooled sockets
        if self.client.write().take().is_some() {
            debug!(base_url = %self.base_url, "HTTP connection closed");
        }
        Ok(())
    }
}

/// Opens [`HttpConnection`]s to one detector.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    settings: HttpSettings,
}

impl HttpConnector {
    /// Connector for the detector described by `settings`.
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        let connection = HttpConnection::open(&self.settings)?;
        info!(base_url = %connection.base_url(), "Opened HTTP connection");
        Ok(Arc::new(connection))
    }

    fn endpoint(&self) -> String {
        self.settings.base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_path() {
        let connection = HttpConnection::open(&HttpSettings::new("10.0.0.5", 80)).unwrap();
        assert_eq!(
            connection.url("detector/api/1.8.0/status/state"),
            "http://10.0.0.5:80/detector/api/1.8.0/status/state"
        );
        assert_eq!(
            connection.url("/stream/api/1.8.0/config/keys"),
            "http://10.0.0.5:80/stream/api/1.8.0/config/keys"
        );
    }

    #[test]
    fn settings_default_to_local_simulator() {
        let settings = HttpSettings::default();
        assert_eq!(settings.base_url(), "http://127.0.0.1:8080");
        assert_eq!(settings.timeout(), Duration::from_millis(2000));
    }
}
