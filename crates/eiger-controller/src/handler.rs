//! Per-attribute poll and write logic.

use crate::attribute::AttributeCache;
use eiger_core::{AttributeValue, Connection, EigerError, EigerResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Poll period used when none is configured.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(200);

/// Result of one poll.
#[derive(Debug)]
#[must_use]
pub enum PollOutcome {
    /// The value was read, decoded and published.
    Published(AttributeValue),
    /// The poll failed; the cached value is unchanged.
    Failed(EigerError),
}

impl PollOutcome {
    /// True if the poll published a value.
    pub fn is_published(&self) -> bool {
        matches!(self, PollOutcome::Published(_))
    }
}

/// Moves values between one device path and one attribute cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHandler {
    device_path: String,
    poll_period: Duration,
}

impl UpdateHandler {
    /// Handler for `device_path` polling at [`DEFAULT_POLL_PERIOD`].
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            poll_period: DEFAULT_POLL_PERIOD,
        }
    }

    /// Poll at `period` instead. A zero period keeps the current one.
    pub fn with_poll_period(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            self.poll_period = period;
        }
        self
    }

    /// Device path polled and written.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Interval between polls.
    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    /// Send `value` to the device. Failures go to the caller.
    pub async fn write(&self, connection: &dyn Connection, value: &AttributeValue) -> EigerResult<()> {
        debug!(path = %self.device_path, %value, "Writing");
        connection.put(&self.device_path, value.to_json()).await?;
        Ok(())
    }

    /// Read the device value and publish it to `cache`.
    ///
    /// Never fails: errors are logged and returned as
    /// [`PollOutcome::Failed`], leaving the cache untouched.
    pub async fn poll_and_publish(
        &self,
        connection: &dyn Connection,
        cache: &AttributeCache,
    ) -> PollOutcome {
        match self.poll(connection, cache).await {
            Ok(value) => PollOutcome::Published(value),
            Err(error) => {
                warn!(path = %self.device_path, %error, "Update loop failed");
                PollOutcome::Failed(error)
            }
        }
    }

    async fn poll(&self, connection: &dyn Connection, cache: &AttributeCache) -> EigerResult<AttributeValue> {
        let response = connection.get(&self.device_path).await?;
        let value = cache.datatype().decode(&self.device_path, &response.value)?;
        cache.publish(value.clone())?;
        Ok(value)
    }
}
