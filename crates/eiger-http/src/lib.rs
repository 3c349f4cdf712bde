//! HTTP/JSON transport for the Eiger SIMPLON API.
//!
//! Implements [`eiger_core::Connection`] over `reqwest`. Every device path is
//! resolved against `http://{host}:{port}/`; reads decode the
//! `{value, value_type, access_mode}` body, writes send `{"value": ...}`.
//!
//! ```rust,ignore
//! use eiger_core::Connector;
//! use eiger_http::{HttpConnector, HttpSettings};
//!
//! let connector = HttpConnector::new(HttpSettings::new("192.168.1.50", 80));
//! let connection = connector.connect().await?;
//! let state = connection.get("detector/api/1.8.0/status/state").await?;
//! connection.close().await?;
//! ```

mod connection;

pub use connection::{
    HttpConnection, HttpConnector, HttpSettings, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_MS,
};
