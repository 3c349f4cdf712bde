//! Attribute descriptors: the final, named, typed mirror of a parameter.

use crate::datatype::AttributeDatatype;
use crate::parameter::AccessMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access mode of a control-side attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeMode {
    /// Polled only
    Readable,
    /// Polled and accepts write commands
    ReadWritable,
}

impl AttributeMode {
    /// True if write commands are accepted.
    pub fn is_writable(self) -> bool {
        matches!(self, AttributeMode::ReadWritable)
    }
}

impl From<AccessMode> for AttributeMode {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Read => AttributeMode::Readable,
            AccessMode::ReadWrite => AttributeMode::ReadWritable,
        }
    }
}

impl fmt::Display for AttributeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeMode::Readable => f.write_str("r"),
            AttributeMode::ReadWritable => f.write_str("rw"),
        }
    }
}

/// Static description of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Unique, final attribute name
    pub name: String,
    /// Control-side datatype
    pub datatype: AttributeDatatype,
    /// Read or read-write
    pub mode: AttributeMode,
    /// Device path polled and written
    pub device_path: String,
}

impl AttributeDescriptor {
    /// Create a descriptor.
    pub fn new(
        name: impl Into<String>,
        datatype: AttributeDatatype,
        mode: AttributeMode,
        device_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            datatype,
            mode,
            device_path: device_path.into(),
        }
    }

    /// Same descriptor under another name.
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }
}
