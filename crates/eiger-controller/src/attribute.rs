//! Live attributes: typed value caches bound to a device path.
//!
//! An [`Attribute`] is what a control system sees of one detector
//! parameter. Its value lives in a typed [`AttributeCache`] (an
//! [`Observable`] of the matching Rust type), which the attribute's
//! [`UpdateHandler`] refreshes on every poll. Subscribers get a
//! notification whenever a poll publishes a different value.

use crate::handler::{PollOutcome, UpdateHandler};
use eiger_core::{
    AttributeDatatype, AttributeDescriptor, AttributeMode, AttributeValue, Connection,
    EigerError, EigerResult, Observable,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Typed value cell of one attribute.
#[derive(Debug, Clone)]
pub enum AttributeCache {
    /// Float attribute
    Float(Observable<f64>),
    /// Integer attribute
    Int(Observable<i64>),
    /// Boolean attribute
    Bool(Observable<bool>),
    /// String attribute
    String(Observable<String>),
}

fn observable<T>(descriptor: &AttributeDescriptor, initial: T) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    let observable = Observable::new(descriptor.name.clone(), initial)
        .with_description(descriptor.device_path.clone())
        .with_dtype(descriptor.datatype.as_str());
    if descriptor.mode.is_writable() {
        observable
    } else {
        observable.read_only()
    }
}

impl AttributeCache {
    /// Cache holding the datatype's default value.
    pub fn new(descriptor: &AttributeDescriptor) -> Self {
        match descriptor.datatype.default_value() {
            AttributeValue::Float(v) => AttributeCache::Float(observable(descriptor, v)),
            AttributeValue::Int(v) => AttributeCache::Int(observable(descriptor, v)),
            AttributeValue::Bool(v) => AttributeCache::Bool(observable(descriptor, v)),
            AttributeValue::String(v) => AttributeCache::String(observable(descriptor, v)),
        }
    }

    /// Datatype of the cached value.
    pub fn datatype(&self) -> AttributeDatatype {
        match self {
            AttributeCache::Float(_) => AttributeDatatype::Float,
            AttributeCache::Int(_) => AttributeDatatype::Int,
            AttributeCache::Bool(_) => AttributeDatatype::Bool,
            AttributeCache::String(_) => AttributeDatatype::String,
        }
    }

    /// Name of the attribute this cache belongs to.
    pub fn name(&self) -> String {
        match self {
            AttributeCache::Float(o) => o.name(),
            AttributeCache::Int(o) => o.name(),
            AttributeCache::Bool(o) => o.name(),
            AttributeCache::String(o) => o.name(),
        }
    }

    /// Current value.
    pub fn get(&self) -> AttributeValue {
        match self {
            AttributeCache::Float(o) => AttributeValue::Float(o.get()),
            AttributeCache::Int(o) => AttributeValue::Int(o.get()),
            AttributeCache::Bool(o) => AttributeValue::Bool(o.get()),
            AttributeCache::String(o) => AttributeValue::String(o.get()),
        }
    }

    /// Store `value`, notifying subscribers if it differs from the current
    /// one. Returns whether it did.
    pub fn publish(&self, value: AttributeValue) -> EigerResult<bool> {
        match (self, value) {
            (AttributeCache::Float(o), AttributeValue::Float(v)) => Ok(o.set_if_changed(v)),
            (AttributeCache::Int(o), AttributeValue::Int(v)) => Ok(o.set_if_changed(v)),
            (AttributeCache::Bool(o), AttributeValue::Bool(v)) => Ok(o.set_if_changed(v)),
            (AttributeCache::String(o), AttributeValue::String(v)) => Ok(o.set_if_changed(v)),
            (cache, value) => Err(EigerError::TypeMismatch {
                name: cache.name(),
                expected: cache.datatype().as_str(),
                found: value.datatype().as_str(),
            }),
        }
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> AttributeReceiver {
        match self {
            AttributeCache::Float(o) => AttributeReceiver::Float(o.subscribe()),
            AttributeCache::Int(o) => AttributeReceiver::Int(o.subscribe()),
            AttributeCache::Bool(o) => AttributeReceiver::Bool(o.subscribe()),
            AttributeCache::String(o) => AttributeReceiver::String(o.subscribe()),
        }
    }
}

/// Change notifications from an [`AttributeCache`].
#[derive(Debug)]
pub enum AttributeReceiver {
    /// Float attribute
    Float(watch::Receiver<f64>),
    /// Integer attribute
    Int(watch::Receiver<i64>),
    /// Boolean attribute
    Bool(watch::Receiver<bool>),
    /// String attribute
    String(watch::Receiver<String>),
}

impl AttributeReceiver {
    /// Wait for the next change. `None` once the attribute is gone.
    pub async fn changed(&mut self) -> Option<AttributeValue> {
        match self {
            AttributeReceiver::Float(rx) => {
                rx.changed().await.ok()?;
                Some(AttributeValue::Float(*rx.borrow_and_update()))
            }
            AttributeReceiver::Int(rx) => {
                rx.changed().await.ok()?;
                Some(AttributeValue::Int(*rx.borrow_and_update()))
            }
            AttributeReceiver::Bool(rx) => {
                rx.changed().await.ok()?;
                Some(AttributeValue::Bool(*rx.borrow_and_update()))
            }
            AttributeReceiver::String(rx) => {
                rx.changed().await.ok()?;
                Some(AttributeValue::String(rx.borrow_and_update().clone()))
            }
        }
    }

    /// Latest value, without waiting.
    pub fn current(&self) -> AttributeValue {
        match self {
            AttributeReceiver::Float(rx) => AttributeValue::Float(*rx.borrow()),
            AttributeReceiver::Int(rx) => AttributeValue::Int(*rx.borrow()),
            AttributeReceiver::Bool(rx) => AttributeValue::Bool(*rx.borrow()),
            AttributeReceiver::String(rx) => AttributeValue::String(rx.borrow().clone()),
        }
    }
}

/// One live attribute: descriptor, cache, update handler and the shared
/// steady-state connection.
pub struct Attribute {
    descriptor: AttributeDescriptor,
    cache: AttributeCache,
    handler: UpdateHandler,
    connection: Arc<dyn Connection>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("descriptor", &self.descriptor)
            .field("value", &self.cache.get())
            .field("poll_period", &self.handler.poll_period())
            .finish_non_exhaustive()
    }
}

impl Attribute {
    /// Bind `descriptor` to `connection`, polling every `poll_period`.
    pub fn new(
        descriptor: AttributeDescriptor,
        connection: Arc<dyn Connection>,
        poll_period: Duration,
    ) -> Self {
        Self {
            cache: AttributeCache::new(&descriptor),
            handler: UpdateHandler::new(descriptor.device_path.clone())
                .with_poll_period(poll_period),
            descriptor,
            connection,
        }
    }

    /// Final attribute name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Control-side datatype.
    pub fn datatype(&self) -> AttributeDatatype {
        self.descriptor.datatype
    }

    /// Read or read-write.
    pub fn mode(&self) -> AttributeMode {
        self.descriptor.mode
    }

    /// Device path polled and written.
    pub fn device_path(&self) -> &str {
        &self.descriptor.device_path
    }

    /// Static description.
    pub fn descriptor(&self) -> &AttributeDescriptor {
        &self.descriptor
    }

    /// Interval between scans.
    pub fn poll_period(&self) -> Duration {
        self.handler.poll_period()
    }

    /// Last published value (the datatype's default before the first poll).
    pub fn read(&self) -> AttributeValue {
        self.cache.get()
    }

    /// Change notifications for this attribute.
    pub fn subscribe(&self) -> AttributeReceiver {
        self.cache.subscribe()
    }

    /// Poll the device once and publish the result.
    pub async fn update(&self) -> PollOutcome {
        self.handler
            .poll_and_publish(self.connection.as_ref(), &self.cache)
            .await
    }

    /// Send `value` to the device.
    ///
    /// Read-only attributes and values of the wrong datatype are rejected
    /// before any request is made. The cache is not touched; the next poll
    /// reports what the device accepted.
    pub async fn write(&self, value: AttributeValue) -> EigerResult<()> {
        if !self.descriptor.mode.is_writable() {
            return Err(EigerError::ReadOnly(self.descriptor.name.clone()));
        }
        if value.datatype() != self.descriptor.datatype {
            return Err(EigerError::TypeMismatch {
                name: self.descriptor.name.clone(),
                expected: self.descriptor.datatype.as_str(),
                found: value.datatype().as_str(),
            });
        }
        self.handler.write(self.connection.as_ref(), &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eiger_core::{Connector, Mode, ParameterResponse, Subsystem};
    use eiger_driver_mock::MockDetector;
    use serde_json::json;

    const COUNT_TIME: &str = "detector/api/1.8.0/config/count_time";
    const HUMIDITY: &str = "detector/api/1.8.0/status/humidity";

    fn detector() -> MockDetector {
        MockDetector::new()
            .with_parameter(
                Subsystem::Detector,
                Mode::Config,
                "count_time",
                ParameterResponse::with_metadata(0.5, "float", "rw"),
            )
            .with_parameter(
                Subsystem::Detector,
                Mode::Status,
                "humidity",
                ParameterResponse::with_metadata(3.5, "float", "r"),
            )
    }

    async fn attribute(
        detector: &MockDetector,
        name: &str,
        datatype: AttributeDatatype,
        mode: AttributeMode,
        path: &str,
    ) -> Attribute {
        let connection = detector.connect().await.unwrap();
        Attribute::new(
            AttributeDescriptor::new(name, datatype, mode, path),
            connection,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn update_publishes_to_subscribers() {
        let detector = detector();
        let humidity = attribute(
            &detector,
            "humidity",
            AttributeDatatype::Float,
            AttributeMode::Readable,
            HUMIDITY,
        )
        .await;
        let mut rx = humidity.subscribe();
        assert_eq!(humidity.read(), AttributeValue::Float(0.0));

        assert!(humidity.update().await.is_published());
        assert_eq!(rx.changed().await, Some(AttributeValue::Float(3.5)));
        assert_eq!(humidity.read(), AttributeValue::Float(3.5));
    }

    #[tokio::test]
    async fn failed_poll_keeps_the_cached_value() {
        let detector = detector();
        let humidity = attribute(
            &detector,
            "humidity",
            AttributeDatatype::Float,
            AttributeMode::Readable,
            HUMIDITY,
        )
        .await;
        assert!(humidity.update().await.is_published());

        detector.fail_get(HUMIDITY);
        let outcome = humidity.update().await;
        assert!(matches!(outcome, PollOutcome::Failed(ref e) if e.is_transport()));
        assert_eq!(humidity.read(), AttributeValue::Float(3.5));

        detector.heal(HUMIDITY);
        detector.set_value(HUMIDITY, 4.0);
        assert!(humidity.update().await.is_published());
        assert_eq!(humidity.read(), AttributeValue::Float(4.0));
    }

    #[tokio::test]
    async fn undecodable_value_is_a_failed_poll() {
        let detector = detector();
        detector.set_value(HUMIDITY, "very humid");
        let humidity = attribute(
            &detector,
            "humidity",
            AttributeDatatype::Float,
            AttributeMode::Readable,
            HUMIDITY,
        )
        .await;

        let outcome = humidity.update().await;
        assert!(matches!(outcome, PollOutcome::Failed(EigerError::Decode { .. })));
        assert_eq!(humidity.read(), AttributeValue::Float(0.0));
    }

    #[tokio::test]
    async fn write_forwards_the_value() {
        let detector = detector();
        let count_time = attribute(
            &detector,
            "count_time",
            AttributeDatatype::Float,
            AttributeMode::ReadWritable,
            COUNT_TIME,
        )
        .await;

        count_time.write(AttributeValue::Float(2.0)).await.unwrap();
        assert_eq!(detector.writes_to(COUNT_TIME), vec![json!(2.0)]);
        // Writes are not echoed into the cache
        assert_eq!(count_time.read(), AttributeValue::Float(0.0));
    }

    #[tokio::test]
    async fn write_failure_surfaces_to_the_caller() {
        let detector = detector();
        let count_time = attribute(
            &detector,
            "count_time",
            AttributeDatatype::Float,
            AttributeMode::ReadWritable,
            COUNT_TIME,
        )
        .await;

        detector.fail_put(COUNT_TIME);
        let err = count_time.write(AttributeValue::Float(2.0)).await.unwrap_err();
        assert!(err.is_transport());
        assert!(detector.writes_to(COUNT_TIME).is_empty());
    }

    #[tokio::test]
    async fn invalid_writes_are_rejected_before_io() {
        let detector = detector();
        let humidity = attribute(
            &detector,
            "humidity",
            AttributeDatatype::Float,
            AttributeMode::Readable,
            HUMIDITY,
        )
        .await;
        let count_time = attribute(
            &detector,
            "count_time",
            AttributeDatatype::Float,
            AttributeMode::ReadWritable,
            COUNT_TIME,
        )
        .await;

        assert!(matches!(
            humidity.write(AttributeValue::Float(1.0)).await,
            Err(EigerError::ReadOnly(name)) if name == "humidity"
        ));
        assert!(matches!(
            count_time.write(AttributeValue::Bool(true)).await,
            Err(EigerError::TypeMismatch { expected: "float", found: "bool", .. })
        ));
        assert!(detector.writes().is_empty());
    }

    #[test]
    fn cache_metadata_follows_descriptor() {
        let cache = AttributeCache::new(&AttributeDescriptor::new(
            "humidity",
            AttributeDatatype::Float,
            AttributeMode::Readable,
            HUMIDITY,
        ));
        let AttributeCache::Float(observable) = &cache else {
            panic!("expected a float cache");
        };
        let metadata = observable.metadata();
        assert!(metadata.read_only);
        assert_eq!(metadata.dtype, "float");
        assert_eq!(metadata.description.as_deref(), Some(HUMIDITY));

        assert_eq!(cache.get(), AttributeDatatype::Float.default_value());
        assert!(cache.publish(AttributeValue::Int(1)).is_err());
        assert!(cache.publish(AttributeValue::Float(1.0)).unwrap());
        assert!(!cache.publish(AttributeValue::Float(1.0)).unwrap());
    }
}
