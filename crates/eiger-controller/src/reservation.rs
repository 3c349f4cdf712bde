//! Attribute names the controller claims before discovery runs.

use eiger_core::{
    AttributeDatatype, AttributeDescriptor, AttributeMode, DETECTOR_STATE_PATH,
};
use std::collections::BTreeMap;

/// Name of the statically declared detector state attribute.
pub const DETECTOR_STATE: &str = "detector_state";

/// Statically declared attributes.
///
/// Discovery never writes over a reserved name: a discovered parameter whose
/// final name is reserved is discarded instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticReservations {
    attributes: BTreeMap<String, AttributeDescriptor>,
}

impl StaticReservations {
    /// No reservations.
    pub fn new() -> Self {
        Self::default()
    }

    /// The reservations every Eiger controller declares: `detector_state`,
    /// a readable string mirroring `detector/api/1.8.0/status/state`.
    pub fn eiger() -> Self {
        Self::new().with(AttributeDescriptor::new(
            DETECTOR_STATE,
            AttributeDatatype::String,
            AttributeMode::Readable,
            DETECTOR_STATE_PATH,
        ))
    }

    /// Reserve `descriptor.name`. A later reservation of the same name
    /// replaces the earlier one.
    pub fn with(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes.insert(descriptor.name.clone(), descriptor);
        self
    }

    /// True if `name` is reserved.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Reserved descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Reserved descriptors, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }

    /// Device path polled to decide whether the detector needs initializing.
    pub fn detector_state_path(&self) -> &str {
        self.get(DETECTOR_STATE)
            .map(|descriptor| descriptor.device_path.as_str())
            .unwrap_or(DETECTOR_STATE_PATH)
    }
}
