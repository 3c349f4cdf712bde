//! Controller lifecycle.
//!
//! ```text
//! Uninitialized ──initialise()──▶ Discovering ──▶ Synchronizing ──close()──▶ Closed
//!        ▲                             │
//!        └──────── discovery error ────┘
//! ```
//!
//! [`EigerController::initialise`] opens a short-lived discovery connection,
//! builds the registry, sends `initialize` if the detector needs it, closes
//! that connection, then opens the steady-state connection every
//! [`Attribute`] shares for the rest of the process.

use crate::attribute::Attribute;
use crate::discovery::{discover, initialize_if_needed, Discovery, RenamePolicy};
use crate::handler::DEFAULT_POLL_PERIOD;
use crate::reservation::StaticReservations;
use eiger_core::{Connection, Connector, EigerError, EigerResult, Observable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lifecycle state of an [`EigerController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    /// Built, nothing discovered yet
    Uninitialized,
    /// Discovery pass running
    Discovering,
    /// Attributes live on the steady-state connection
    Synchronizing,
    /// Steady-state connection closed
    Closed,
}

impl ControllerState {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerState::Uninitialized => "uninitialized",
            ControllerState::Discovering => "discovering",
            ControllerState::Synchronizing => "synchronizing",
            ControllerState::Closed => "closed",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables applied at initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Interval between polls of each attribute
    pub poll_period: Duration,
    /// How colliding parameter names are made unique
    pub rename_policy: RenamePolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
            rename_policy: RenamePolicy::default(),
        }
    }
}

struct Live {
    connection: Arc<dyn Connection>,
    discovery: Discovery,
    attributes: BTreeMap<String, Arc<Attribute>>,
    sent_initialize: bool,
}

/// Mirror of one Eiger detector's parameter surface.
pub struct EigerController {
    options: ControllerOptions,
    reservations: StaticReservations,
    state: Observable<ControllerState>,
    live: Option<Live>,
    closed: AtomicBool,
}

impl fmt::Debug for EigerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EigerController")
            .field("state", &self.state.get())
            .field("options", &self.options)
            .field("attributes", &self.attributes().count())
            .finish_non_exhaustive()
    }
}

impl Default for EigerController {
    fn default() -> Self {
        Self::new(ControllerOptions::default())
    }
}

impl EigerController {
    /// Uninitialized controller with the standard Eiger reservations.
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            options,
            reservations: StaticReservations::eiger(),
            state: Observable::new("controller_state", ControllerState::Uninitialized)
                .with_description("Controller lifecycle state")
                .read_only(),
            live: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the static reservations. Only meaningful before
    /// [`initialise`](Self::initialise).
    pub fn with_reservations(mut self, reservations: StaticReservations) -> Self {
        self.reservations = reservations;
        self
    }

    /// Options applied at initialisation.
    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Names claimed before discovery.
    pub fn reservations(&self) -> &StaticReservations {
        &self.reservations
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state.get()
    }

    /// Lifecycle state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Discover the detector and bring every attribute online.
    ///
    /// A zero poll period is rejected before any connection is opened.
    /// On a discovery failure the discovery connection is closed, the
    /// controller returns to `Uninitialized` with no attributes and the
    /// error is returned.
    pub async fn initialise(&mut self, connector: &dyn Connector) -> EigerResult<()> {
        let current = self.state.get();
        if current != ControllerState::Uninitialized {
            return Err(EigerError::InvalidState {
                expected: ControllerState::Uninitialized.as_str(),
                actual: current.as_str(),
            });
        }
        if self.options.poll_period.is_zero() {
            return Err(EigerError::Configuration(
                "poll_period must be positive".to_string(),
            ));
        }

        info!(endpoint = %connector.endpoint(), policy = %self.options.rename_policy, "Initialising controller");
        self.state.set(ControllerState::Discovering);

        match self.start(connector).await {
            Ok(live) => {
                info!(
                    attributes = live.attributes.len(),
                    sent_initialize = live.sent_initialize,
                    "Controller synchronizing"
                );
                self.live = Some(live);
                self.state.set(ControllerState::Synchronizing);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "Controller initialisation failed");
                self.state.set(ControllerState::Uninitialized);
                Err(error)
            }
        }
    }

    async fn start(&self, connector: &dyn Connector) -> EigerResult<Live> {
        let (discovery, sent_initialize) = self.discovery_pass(connector).await?;

        let connection = connector.connect().await?;
        let attributes = self
            .reservations
            .iter()
            .chain(discovery.registry.iter())
            .map(|descriptor| {
                let attribute = Attribute::new(
                    descriptor.clone(),
                    connection.clone(),
                    self.options.poll_period,
                );
                (descriptor.name.clone(), Arc::new(attribute))
            })
            .collect();

        Ok(Live {
            connection,
            discovery,
            attributes,
            sent_initialize,
        })
    }

    async fn discovery_pass(&self, connector: &dyn Connector) -> EigerResult<(Discovery, bool)> {
        let connection = connector.connect().await?;

        let result = async {
            let discovery = discover(
                connection.as_ref(),
                &self.reservations,
                self.options.rename_policy,
            )
            .await?;
            let sent_initialize =
                initialize_if_needed(connection.as_ref(), &self.reservations).await?;
            Ok::<_, EigerError>((discovery, sent_initialize))
        }
        .await;

        // Closed whether or not discovery succeeded
        if let Err(error) = connection.close().await {
            warn!(%error, "Failed to close discovery connection");
        }
        result
    }

    /// Live attributes, static ones included, sorted by name. Empty until
    /// initialised.
    pub fn attributes(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.live
            .iter()
            .flat_map(|live| live.attributes.values())
    }

    /// Live attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.live.as_ref()?.attributes.get(name)
    }

    /// Result of the discovery pass, once initialised.
    pub fn discovery(&self) -> Option<&Discovery> {
        self.live.as_ref().map(|live| &live.discovery)
    }

    /// Whether initialisation had to send the `initialize` command.
    pub fn sent_initialize(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.sent_initialize)
    }

    /// Close the steady-state connection.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub async fn close(&self) -> EigerResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.state.set(ControllerState::Closed);
        if let Some(live) = &self.live {
            live.connection.close().await?;
            info!("Controller closed");
        }
        Ok(())
    }
}
