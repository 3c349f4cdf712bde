//! In-memory detector with failure injection.
//!
//! [`MockDetector`] holds a parameter table keyed by device path and answers
//! `keys` requests from the order parameters were added in. It hands out
//! [`MockConnection`]s through the [`Connector`] trait and counts how many
//! were opened and closed, so tests can assert on connection lifecycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use eiger_core::{Mode, ParameterResponse, Subsystem};
//! use eiger_driver_mock::MockDetector;
//!
//! let detector = MockDetector::new()
//!     .with_parameter(Subsystem::Detector, Mode::Status, "state",
//!         ParameterResponse::with_metadata("na", "State", "r"))
//!     .with_parameter(Subsystem::Detector, Mode::Config, "count_time",
//!         ParameterResponse::with_metadata(0.5, "float", "rw"));
//!
//! detector.fail_get("detector/api/1.8.0/config/count_time");
//! ```

use crate::connection::MockConnection;
use async_trait::async_trait;
use eiger_core::{
    keys_path, parameter_path, Connection, ConnectionError, Connector, Mode, ParameterResponse,
    Subsystem, DETECTOR_STATE_PATH, INITIALIZE_COMMAND_PATH,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// State reported after a successful `initialize` command.
pub const INITIALIZED_STATE: &str = "idle";

#[derive(Default, Debug)]
struct DetectorState {
    /// Parameter table by device path
    parameters: HashMap<String, ParameterResponse>,
    /// Parameter names per pair, in insertion order
    keys: BTreeMap<(Subsystem, Mode), Vec<String>>,
    /// Every accepted write, in order
    writes: Vec<(String, Value)>,
    /// Paths whose reads fail
    failing_gets: HashSet<String>,
    /// Paths whose writes fail
    failing_puts: HashSet<String>,
    /// Every request fails
    communication_lost: bool,
    /// `connect()` fails
    refuse_connections: bool,
    opened: usize,
    closed: usize,
}

/// Simulated detector shared by every connection it opens.
///
/// Clones share state.
#[derive(Clone, Default, Debug)]
pub struct MockDetector {
    state: Arc<Mutex<DetectorState>>,
    latency: Duration,
}

impl MockDetector {
    /// Empty detector: every pair reports no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter under `subsystem/mode`.
    pub fn with_parameter(
        self,
        subsystem: Subsystem,
        mode: Mode,
        name: &str,
        response: ParameterResponse,
    ) -> Self {
        {
            let mut state = self.state.lock();
            let path = parameter_path(subsystem, mode, name);
            let names = state.keys.entry((subsystem, mode)).or_default();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            state.parameters.insert(path, response);
        }
        self
    }

    /// Delay every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Change a parameter's value, as the hardware would on its own.
    pub fn set_value(&self, path: &str, value: impl Into<Value>) {
        if let Some(parameter) = self.state.lock().parameters.get_mut(path) {
            parameter.value = value.into();
        }
    }

    /// Current value at `path`, if the parameter exists.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.state.lock().parameters.get(path).map(|p| p.value.clone())
    }

    /// Make reads of `path` fail.
    pub fn fail_get(&self, path: &str) {
        self.state.lock().failing_gets.insert(path.to_string());
    }

    /// Make writes to `path` fail.
    pub fn fail_put(&self, path: &str) {
        self.state.lock().failing_puts.insert(path.to_string());
    }

    /// Clear injected failures for `path`.
    pub fn heal(&self, path: &str) {
        let mut state = self.state.lock();
        state.failing_gets.remove(path);
        state.failing_puts.remove(path);
    }

    /// Simulate losing (or regaining) the network link.
    pub fn set_communication_lost(&self, lost: bool) {
        self.state.lock().communication_lost = lost;
    }

    /// Make `connect()` fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().writes.clone()
    }

    /// Accepted writes to `path`.
    pub fn writes_to(&self, path: &str) -> Vec<Value> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Number of connections closed so far.
    pub fn connections_closed(&self) -> usize {
        self.state.lock().closed
    }

    pub(crate) fn record_close(&self) {
        self.state.lock().closed += 1;
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub(crate) async fn handle_get(&self, path: &str) -> Result<ParameterResponse, ConnectionError> {
        self.simulate_latency().await;
        let state = self.state.lock();
        if state.communication_lost || state.failing_gets.contains(path) {
            return Err(injected(path));
        }

        if let Some(response) = state.parameters.get(path) {
            return Ok(response.clone());
        }

        let listing = state
            .keys
            .iter()
            .find(|((subsystem, mode), _)| keys_path(*subsystem, *mode) == path)
            .map(|(_, names)| names.clone());
        match listing {
            Some(names) => Ok(ParameterResponse::value(names)),
            None if is_keys_path(path) => Ok(ParameterResponse::value(Vec::<String>::new())),
            None => Err(ConnectionError::Status {
                path: path.to_string(),
                status: 404,
            }),
        }
    }

    pub(crate) async fn handle_put(&self, path: &str, value: Value) -> Result<(), ConnectionError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        if state.communication_lost || state.failing_puts.contains(path) {
            return Err(injected(path));
        }

        if path == INITIALIZE_COMMAND_PATH {
            if let Some(detector_state) = state.parameters.get_mut(DETECTOR_STATE_PATH) {
                detector_state.value = Value::from(INITIALIZED_STATE);
            }
            tracing::debug!("Mock detector initialized");
        } else {
            let parameter = state.parameters.get_mut(path).ok_or_else(|| ConnectionError::Status {
                path: path.to_string(),
                status: 404,
            })?;
            if parameter.access_mode.as_deref() != Some("rw") {
                return Err(ConnectionError::Status {
                    path: path.to_string(),
                    status: 405,
                });
            }
            parameter.value = value.clone();
        }

        state.writes.push((path.to_string(), value));
        Ok(())
    }
}

#[async_trait]
impl Connector for MockDetector {
    async fn connect(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(ConnectionError::Request {
                path: String::new(),
                message: "connection refused".to_string(),
            });
        }
        state.opened += 1;
        Ok(Arc::new(MockConnection::new(self.clone())))
    }

    fn endpoint(&self) -> String {
        "mock://eiger".to_string()
    }
}

fn injected(path: &str) -> ConnectionError {
    ConnectionError::Request {
        path: path.to_string(),
        message: "injected failure".to_string(),
    }
}

fn is_keys_path(path: &str) -> bool {
    eiger_core::SUBSYSTEM_ORDER
        .iter()
        .any(|(subsystem, mode)| keys_path(*subsystem, *mode) == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> MockDetector {
        MockDetector::new()
            .with_parameter(
                Subsystem::Detector,
                Mode::Status,
                "state",
                ParameterResponse::with_metadata("na", "State", "r"),
            )
            .with_parameter(
                Subsystem::Detector,
                Mode::Config,
                "count_time",
                ParameterResponse::with_metadata(0.5, "float", "rw"),
            )
    }

    #[tokio::test]
    async fn keys_follow_insertion_order() {
        let detector = detector().with_parameter(
            Subsystem::Detector,
            Mode::Status,
            "humidity",
            ParameterResponse::with_metadata(0.1, "float", "r"),
        );
        let response = detector
            .handle_get("detector/api/1.8.0/status/keys")
            .await
            .unwrap();
        assert_eq!(response.value, json!(["state", "humidity"]));

        let empty = detector
            .handle_get("monitor/api/1.8.0/config/keys")
            .await
            .unwrap();
        assert_eq!(empty.value, json!([]));
    }

    #[tokio::test]
    async fn writes_update_read_write_parameters_only() {
        let detector = detector();
        detector
            .handle_put("detector/api/1.8.0/config/count_time", json!(2.0))
            .await
            .unwrap();
        assert_eq!(
            detector.value("detector/api/1.8.0/config/count_time"),
            Some(json!(2.0))
        );

        let err = detector
            .handle_put(DETECTOR_STATE_PATH, json!("idle"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Status { status: 405, .. }));
    }

    #[tokio::test]
    async fn initialize_moves_state_out_of_na() {
        let detector = detector();
        detector
            .handle_put(INITIALIZE_COMMAND_PATH, json!(""))
            .await
            .unwrap();
        assert_eq!(detector.value(DETECTOR_STATE_PATH), Some(json!("idle")));
        assert_eq!(detector.writes_to(INITIALIZE_COMMAND_PATH), vec![json!("")]);
    }

    #[tokio::test]
    async fn injected_failures_can_be_healed() {
        let detector = detector();
        detector.fail_get(DETECTOR_STATE_PATH);
        assert!(detector.handle_get(DETECTOR_STATE_PATH).await.is_err());

        detector.heal(DETECTOR_STATE_PATH);
        assert!(detector.handle_get(DETECTOR_STATE_PATH).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let err = detector()
            .handle_get("detector/api/1.8.0/status/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Status { status: 404, .. }));
    }
}
