//! Observable values
//!
//! Reactive value cell built on `tokio::sync::watch`. Every attribute
//! publishes its polled value through one of these, and the controller
//! publishes its lifecycle state the same way, so any number of consumers
//! (scan loggers, a control-system adapter, tests) can wait for changes
//! without polling.
//!
//! # Example
//!
//! ```rust,ignore
//! let temperature = Observable::new("temperature", 0.0)
//!     .read_only();
//!
//! let mut rx = temperature.subscribe();
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("temperature is now {}", *rx.borrow());
//!     }
//! });
//!
//! temperature.set(21.5);
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;

/// Descriptive metadata attached to an [`Observable`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableMetadata {
    /// Name, unique within its owner.
    pub name: String,

    /// Human-readable description.
    pub description: Option<String>,

    /// Whether consumers may request writes.
    pub read_only: bool,

    /// Datatype hint: `"float"`, `"int"`, `"bool"` or `"string"`.
    ///
    /// Empty string means unknown.
    #[serde(default)]
    pub dtype: String,
}

/// A thread-safe, observable value with change notifications.
///
/// Clones share the same channel and metadata.
pub struct Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: watch::Sender<T>,
    // parking_lot: metadata reads are short and must not need an async context
    metadata: Arc<RwLock<ObservableMetadata>>,
}

impl<T: Clone + Send + Sync + 'static> Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("metadata", &*self.metadata.read())
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new observable with an initial value.
    pub fn new(name: impl Into<String>, initial_value: T) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self {
            sender,
            metadata: Arc::new(RwLock::new(ObservableMetadata {
                name: name.into(),
                ..Default::default()
            })),
        }
    }

    /// Set description.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.metadata.write().description = Some(description.into());
        self
    }

    /// Set the datatype hint.
    pub fn with_dtype(self, dtype: impl Into<String>) -> Self {
        self.metadata.write().dtype = dtype.into();
        self
    }

    /// Mark as read-only.
    pub fn read_only(self) -> Self {
        self.metadata.write().read_only = true;
        self
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Get the name.
    pub fn name(&self) -> String {
        self.metadata.read().name.clone()
    }

    /// Get the metadata (returns a clone).
    pub fn metadata(&self) -> ObservableMetadata {
        self.metadata.read().clone()
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Store `value`, notifying subscribers only if it differs from the
    /// current one. Returns whether it changed.
    ///
    /// Pollers republish the same reading every tick; this keeps watchers
    /// from waking for nothing.
    pub fn set_if_changed(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_latest_value() {
        let obs = Observable::new("count_time", 0.5);
        assert_eq!(obs.get(), 0.5);
        obs.set(1.0);
        assert_eq!(obs.get(), 1.0);
    }

    #[test]
    fn metadata_is_shared_between_clones() {
        let obs = Observable::new("humidity", 0.0)
            .with_description("detector/api/1.8.0/status/humidity")
            .with_dtype("float")
            .read_only();
        let clone = obs.clone();

        let metadata = clone.metadata();
        assert_eq!(metadata.name, "humidity");
        assert_eq!(
            metadata.description.as_deref(),
            Some("detector/api/1.8.0/status/humidity")
        );
        assert_eq!(metadata.dtype, "float");
        assert!(metadata.read_only);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let obs = Observable::new("state", String::from("na"));
        let mut rx = obs.subscribe();

        obs.set("idle".to_string());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "idle");
    }

    #[test]
    fn set_if_changed_skips_identical_values() {
        let obs = Observable::new("nimages", 1i64);
        let rx = obs.subscribe();

        assert!(!obs.set_if_changed(1));
        assert!(!rx.has_changed().unwrap());

        assert!(obs.set_if_changed(10));
        assert!(rx.has_changed().unwrap());
        assert_eq!(obs.get(), 10);
    }

    #[test]
    fn set_without_subscribers_still_stores() {
        let obs = Observable::new("mode", false);
        obs.set(true);
        assert!(obs.get());
    }
}
