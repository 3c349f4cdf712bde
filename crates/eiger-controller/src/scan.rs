//! Periodic polling of live attributes.
//!
//! One task per attribute, each ticking at the attribute's own poll period.
//! A failed poll never affects another attribute's task.

use crate::attribute::Attribute;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Running scan tasks.
#[derive(Debug)]
pub struct ScanRunner {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ScanRunner {
    /// Spawn one scan task per attribute on the current runtime.
    pub fn start<'a>(attributes: impl IntoIterator<Item = &'a Arc<Attribute>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let tasks: Vec<_> = attributes
            .into_iter()
            .map(|attribute| tokio::spawn(scan(attribute.clone(), shutdown.subscribe())))
            .collect();

        info!(tasks = tasks.len(), "Scan tasks started");
        Self { shutdown, tasks }
    }

    /// Number of scan tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if there are no scan tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every task to stop and wait for them.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(error) = task.await {
                warn!(%error, "Scan task ended abnormally");
            }
        }
        info!("Scan tasks stopped");
    }
}

async fn scan(attribute: Arc<Attribute>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(attribute.poll_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failing = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let published = attribute.update().await.is_published();
                if published && failing {
                    info!(name = %attribute.name(), "Polling recovered");
                }
                failing = !published;
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(name = %attribute.name(), "Scan task stopped");
}
