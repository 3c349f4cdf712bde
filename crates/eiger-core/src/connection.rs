//! Transport abstraction.
//!
//! The engine never talks HTTP directly. It sees a [`Connection`] offering
//! request/response `get` and `put` on device paths, and a [`Connector`] that
//! opens fresh connections. The controller opens two over its lifetime: one
//! for discovery (closed once initialization finishes) and one shared by all
//! steady-state pollers.
//!
//! Implementations must tolerate concurrent requests on one connection;
//! discovery fans out metadata fetches and every attribute polls
//! independently.

use crate::error::ConnectionError;
use crate::parameter::ParameterResponse;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Request/response client for device paths.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fetch the value (and metadata, if the endpoint reports it) at `path`.
    async fn get(&self, path: &str) -> Result<ParameterResponse, ConnectionError>;

    /// Write `value` to `path`.
    async fn put(&self, path: &str, value: Value) -> Result<(), ConnectionError>;

    /// Release the underlying transport.
    ///
    /// Calling more than once is allowed and has no further effect. Requests
    /// issued after closing fail with [`ConnectionError::Closed`].
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Opens connections to one device.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new, independent connection.
    async fn connect(&self) -> Result<Arc<dyn Connection>, ConnectionError>;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
