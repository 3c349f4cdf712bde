//! `eiger-controller`
//!
//! Discovers an Eiger detector's parameters over a [`Connection`] and keeps
//! a typed, uniquely named mirror of them in sync.
//!
//! ## Modules
//!
//! - [`discovery`]: the discovery pass and collision-resolving fold
//! - [`registry`]: the immutable result of discovery
//! - [`reservation`]: names claimed before discovery runs
//! - [`attribute`]: live attributes and their typed caches
//! - [`handler`]: per-attribute poll and write
//! - [`controller`]: lifecycle orchestration
//! - [`scan`]: one periodic poll task per attribute
//!
//! ## Example
//!
//! ```rust,ignore
//! use eiger_controller::{ControllerOptions, EigerController, ScanRunner};
//!
//! let mut controller = EigerController::new(ControllerOptions::default());
//! controller.initialise(&connector).await?;
//!
//! let scans = ScanRunner::start(controller.attributes());
//! // ...
//! scans.stop().await;
//! controller.close().await?;
//! ```
//!
//! [`Connection`]: eiger_core::Connection

pub mod attribute;
pub mod controller;
pub mod discovery;
pub mod handler;
pub mod registry;
pub mod reservation;
pub mod scan;

pub use attribute::{Attribute, AttributeCache, AttributeReceiver};
pub use controller::{ControllerOptions, ControllerState, EigerController};
pub use discovery::{
    discover, fetch_parameters, initialize_if_needed, resolve, DiscardReason, Discovery,
    DiscoveryDecision, RenamePolicy, SkipReason,
};
pub use handler::{PollOutcome, UpdateHandler, DEFAULT_POLL_PERIOD};
pub use registry::AttributeRegistry;
pub use reservation::{StaticReservations, DETECTOR_STATE};
pub use scan::ScanRunner;
