//! Connection handed out by [`MockDetector`].

use crate::detector::MockDetector;
use async_trait::async_trait;
use eiger_core::{Connection, ConnectionError, ParameterResponse};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// One open connection to a [`MockDetector`].
#[derive(Debug)]
pub struct MockConnection {
    detector: MockDetector,
    closed: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new(detector: MockDetector) -> Self {
        Self {
            detector,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            Err(ConnectionError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn get(&self, path: &str) -> Result<ParameterResponse, ConnectionError> {
        self.ensure_open()?;
        self.detector.handle_get(path).await
    }

    async fn put(&self, path: &str, value: Value) -> Result<(), ConnectionError> {
        self.ensure_open()?;
        self.detector.handle_put(path, value).await
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // Only the first close counts
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.detector.record_close();
        }
        Ok(())
    }
}
