//! Device-reported parameter metadata.
//!
//! A `GET` on a parameter path returns a [`ParameterResponse`]. Discovery
//! pairs it with the name and path it asked for to form a
//! [`ParameterDescriptor`], an immutable snapshot of one parameter at fetch
//! time.

use crate::subsystem::{parameter_path, Mode, Subsystem};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a parameter `GET`.
///
/// `value_type` and `access_mode` are absent on plain value endpoints such as
/// `keys`; discovery treats their absence like an unrecognized tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterResponse {
    /// Current value
    #[serde(default)]
    pub value: Value,
    /// Device value type tag (`float`, `State`, `string[]`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Device access mode tag (`r`, `rw`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,
}

impl ParameterResponse {
    /// Response carrying only a value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Response carrying value and metadata.
    pub fn with_metadata(
        value: impl Into<Value>,
        value_type: impl Into<String>,
        access_mode: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            value_type: Some(value_type.into()),
            access_mode: Some(access_mode.into()),
        }
    }
}

/// Device access mode of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// `r`
    Read,
    /// `rw`
    ReadWrite,
}

impl AccessMode {
    /// Parse a device tag. Anything but `r` and `rw` is unrecognized.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "r" => Some(AccessMode::Read),
            "rw" => Some(AccessMode::ReadWrite),
            _ => None,
        }
    }
}

/// One parameter as discovered on the device.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Device-reported (bare) name
    pub name: String,
    /// Subsystem the parameter was found in
    pub subsystem: Subsystem,
    /// Mode the parameter was found in
    pub mode: Mode,
    /// `{subsystem}/api/1.8.0/{mode}/{name}`
    pub device_path: String,
    /// Raw `value_type` tag, if reported
    pub value_type: Option<String>,
    /// Raw `access_mode` tag, if reported
    pub access_mode: Option<String>,
    /// Value at fetch time
    pub value: Value,
}

impl ParameterDescriptor {
    /// Build a descriptor from the response to `GET device_path`.
    pub fn new(
        subsystem: Subsystem,
        mode: Mode,
        name: impl Into<String>,
        response: ParameterResponse,
    ) -> Self {
        let name = name.into();
        Self {
            device_path: parameter_path(subsystem, mode, &name),
            name,
            subsystem,
            mode,
            value_type: response.value_type,
            access_mode: response.access_mode,
            value: response.value,
        }
    }
}
