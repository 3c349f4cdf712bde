//! Simulated Eiger detector for testing without hardware.
//!
//! All operations are async-safe (latency uses `tokio::time::sleep`).
//!
//! - [`MockDetector`]: parameter table, write log, failure injection and
//!   connection counting; implements [`eiger_core::Connector`]
//! - [`MockConnection`]: the [`eiger_core::Connection`] it hands out
//! - [`MockDetector::simulated`]: a representative EIGER2 parameter surface,
//!   used by the binary's mock mode

mod connection;
mod detector;
mod simulated;

pub use connection::MockConnection;
pub use detector::{MockDetector, INITIALIZED_STATE};
