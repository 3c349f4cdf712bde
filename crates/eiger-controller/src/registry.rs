//! The finished set of discovered attributes.

use eiger_core::AttributeDescriptor;
use serde::Serialize;
use std::collections::BTreeMap;

/// Discovered attribute descriptors keyed by final name.
///
/// Built once by [`resolve`](crate::discovery::resolve) and read-only
/// afterwards: there is no public way to insert, remove or rename entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeRegistry {
    entries: BTreeMap<String, AttributeDescriptor>,
}

impl AttributeRegistry {
    pub(crate) fn from_entries(entries: BTreeMap<String, AttributeDescriptor>) -> Self {
        Self { entries }
    }

    /// Descriptor registered under `name`.
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.entries.get(name)
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if discovery registered nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Descriptors, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.entries.values()
    }
}

impl<'a> IntoIterator for &'a AttributeRegistry {
    type Item = &'a AttributeDescriptor;
    type IntoIter = std::collections::btree_map::Values<'a, String, AttributeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
