//! `eiger-core`
//!
//! Core types and traits for mirroring an Eiger detector's parameter surface.
//!
//! The crate is transport-agnostic: it defines what a device connection must
//! offer ([`Connection`], [`Connector`]), how device metadata is represented
//! ([`ParameterResponse`], [`ParameterDescriptor`]), how device value types
//! map onto the four control-side datatypes ([`map_value_type`]), and the
//! observable cell attributes publish through ([`Observable`]).
//!
//! ## Key Types
//!
//! - [`SUBSYSTEM_ORDER`]: the fixed (subsystem, mode) walk used by discovery
//! - [`AttributeDescriptor`]: the final name, datatype, mode and device path
//! - [`AttributeValue`]: a typed value decoded from device JSON
//! - [`EigerError`]: application error, wrapping [`ConnectionError`]

pub mod attribute;
pub mod connection;
pub mod datatype;
pub mod error;
pub mod observable;
pub mod parameter;
pub mod subsystem;

pub use attribute::{AttributeDescriptor, AttributeMode};
pub use connection::{Connection, Connector};
pub use datatype::{map_value_type, AttributeDatatype, AttributeValue, UnrecognizedValueType, ValueType};
pub use error::{ConnectionError, EigerError, EigerResult};
pub use observable::{Observable, ObservableMetadata};
pub use parameter::{AccessMode, ParameterDescriptor, ParameterResponse};
pub use subsystem::{
    keys_path, parameter_path, Mode, Subsystem, API_VERSION, DETECTOR_STATE_PATH,
    INITIALIZE_COMMAND_PATH, MODES, SUBSYSTEMS, SUBSYSTEM_ORDER, UNINITIALIZED_STATE,
};
