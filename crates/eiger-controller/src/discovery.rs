//! Parameter discovery and collision resolution.
//!
//! Discovery walks [`SUBSYSTEM_ORDER`] once. For each (subsystem, mode) pair
//! it fetches the key list, then every parameter's metadata concurrently, and
//! feeds the resulting [`ParameterDescriptor`]s, in order, through a pure
//! fold ([`resolve`]) that produces the [`AttributeRegistry`] plus a log of
//! every naming decision it made.
//!
//! # Collisions
//!
//! The device reuses bare names across subsystems (`state`, `error`,
//! `dropped`, ...). When a name is seen a second time the later occurrence
//! is stored under a prefixed name immediately, and a clash record is kept
//! for the first occurrence, which is renamed once all pairs have been
//! walked. Which prefix each side gets is the [`RenamePolicy`].
//!
//! A final name that is statically reserved ([`StaticReservations`]) or
//! already taken is never written over: the incoming entry is discarded and a
//! [`DiscoveryDecision::Discarded`] is recorded.
//!
//! # Failure policy
//!
//! Any transport failure while fetching key lists or metadata fails the whole
//! pass. An unrecognized value type or access mode only drops that parameter.

use crate::registry::AttributeRegistry;
use crate::reservation::StaticReservations;
use eiger_core::{
    keys_path, map_value_type, parameter_path, AccessMode, AttributeDescriptor, AttributeMode,
    Connection, EigerError, EigerResult, Mode, ParameterDescriptor, Subsystem,
    UnrecognizedValueType, INITIALIZE_COMMAND_PATH, SUBSYSTEM_ORDER, UNINITIALIZED_STATE,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// (subsystem, mode) a parameter was found under.
type Origin = (Subsystem, Mode);

/// How colliding bare names are made unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenamePolicy {
    /// Prefix every occurrence with the subsystem it actually came from.
    /// Collisions inside one subsystem are qualified with the mode as well
    /// (`{subsystem}_{mode}_{name}`).
    #[default]
    Origin,
    /// Prefix the first occurrence with the subsystem preceding the current
    /// one in [`SUBSYSTEM_ORDER`], wrapping from `detector` to `monitor`.
    Legacy,
}

impl RenamePolicy {
    /// Candidate for the first occurrence and name for the current one.
    fn clash_names(self, bare: &str, first: Origin, current: Origin) -> (String, String) {
        match self {
            RenamePolicy::Legacy => (
                prefixed(current.0.previous(), bare),
                prefixed(current.0, bare),
            ),
            RenamePolicy::Origin if first.0 == current.0 => {
                (qualified(first, bare), qualified(current, bare))
            }
            RenamePolicy::Origin => (prefixed(first.0, bare), prefixed(current.0, bare)),
        }
    }
}

impl fmt::Display for RenamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenamePolicy::Origin => f.write_str("origin"),
            RenamePolicy::Legacy => f.write_str("legacy"),
        }
    }
}

fn prefixed(subsystem: Subsystem, bare: &str) -> String {
    format!("{}_{}", subsystem, bare)
}

fn qualified((subsystem, mode): Origin, bare: &str) -> String {
    format!("{}_{}_{}", subsystem, mode, bare)
}

/// Why a parameter was skipped before naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tag", rename_all = "snake_case")]
pub enum SkipReason {
    /// `value_type` missing (`None`) or not one of the known tags
    UnrecognizedValueType(Option<String>),
    /// `access_mode` missing (`None`) or neither `r` nor `rw`
    UnrecognizedAccessMode(Option<String>),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnrecognizedValueType(Some(tag)) => {
                write!(f, "unrecognized value type '{}'", tag)
            }
            SkipReason::UnrecognizedValueType(None) => f.write_str("missing value type"),
            SkipReason::UnrecognizedAccessMode(Some(tag)) => {
                write!(f, "unrecognized access mode '{}'", tag)
            }
            SkipReason::UnrecognizedAccessMode(None) => f.write_str("missing access mode"),
        }
    }
}

/// Why a named entry was dropped instead of registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum DiscardReason {
    /// The final name is statically reserved
    Reserved(String),
    /// The final name is already held by another entry
    Taken(String),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Reserved(name) => write!(f, "'{}' is statically reserved", name),
            DiscardReason::Taken(name) => write!(f, "'{}' is already registered", name),
        }
    }
}

/// One entry in the discovery decision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DiscoveryDecision {
    /// Parameter dropped because its metadata could not be mapped.
    Skipped {
        /// Bare parameter name
        name: String,
        /// Device path
        path: String,
        /// What could not be mapped
        reason: SkipReason,
    },
    /// First occurrence of a colliding name moved to its unique name.
    Renamed {
        /// Bare name
        from: String,
        /// Final name
        to: String,
    },
    /// Parameter dropped because its final name could not be claimed.
    Discarded {
        /// Bare parameter name
        name: String,
        /// Device path
        path: String,
        /// Which name was unavailable
        reason: DiscardReason,
    },
}

/// Output of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovery {
    /// Final, uniquely named attribute descriptors
    pub registry: AttributeRegistry,
    /// Every skip, rename and discard, in the order they were decided
    pub decisions: Vec<DiscoveryDecision>,
}

struct Entry {
    descriptor: AttributeDescriptor,
    origin: Origin,
}

struct ClashRecord {
    original_name: String,
    candidate: String,
}

/// Accumulator of the discovery fold.
struct RegistryBuilder<'a> {
    reservations: &'a StaticReservations,
    policy: RenamePolicy,
    entries: BTreeMap<String, Entry>,
    clashes: Vec<ClashRecord>,
    decisions: Vec<DiscoveryDecision>,
}

impl<'a> RegistryBuilder<'a> {
    fn new(reservations: &'a StaticReservations, policy: RenamePolicy) -> Self {
        Self {
            reservations,
            policy,
            entries: BTreeMap::new(),
            clashes: Vec::new(),
            decisions: Vec::new(),
        }
    }

    fn push(&mut self, parameter: ParameterDescriptor) {
        let datatype = match parameter.value_type.as_deref().map(map_value_type) {
            Some(Ok(datatype)) => datatype,
            Some(Err(UnrecognizedValueType(tag))) => {
                self.skip(parameter, SkipReason::UnrecognizedValueType(Some(tag)));
                return;
            }
            None => {
                self.skip(parameter, SkipReason::UnrecognizedValueType(None));
                return;
            }
        };

        let origin = (parameter.subsystem, parameter.mode);
        let name = self.final_name(&parameter.name, origin);

        let mode = match parameter.access_mode.as_deref().and_then(AccessMode::parse) {
            Some(mode) => AttributeMode::from(mode),
            None => {
                let tag = parameter.access_mode.clone();
                self.skip(parameter, SkipReason::UnrecognizedAccessMode(tag));
                return;
            }
        };

        if self.reservations.contains(&name) {
            self.discard(parameter.name, parameter.device_path, DiscardReason::Reserved(name));
            return;
        }
        if self.entries.contains_key(&name) {
            self.discard(parameter.name, parameter.device_path, DiscardReason::Taken(name));
            return;
        }

        debug!(name = %name, path = %parameter.device_path, %datatype, %mode, "Registered parameter");
        self.entries.insert(
            name.clone(),
            Entry {
                descriptor: AttributeDescriptor::new(name, datatype, mode, parameter.device_path),
                origin,
            },
        );
    }

    /// Name the current occurrence of `bare` is stored under, recording a
    /// clash for the first occurrence if there is one.
    fn final_name(&mut self, bare: &str, origin: Origin) -> String {
        let Some(first) = self.entries.get(bare).map(|entry| entry.origin) else {
            return bare.to_string();
        };

        let (candidate, current) = self.policy.clash_names(bare, first, origin);
        if !self.clashes.iter().any(|clash| clash.original_name == bare) {
            self.clashes.push(ClashRecord {
                original_name: bare.to_string(),
                candidate,
            });
        }

        // A third occurrence can land on a prefix an earlier one already holds
        if self.policy == RenamePolicy::Origin && self.entries.contains_key(&current) {
            qualified(origin, bare)
        } else {
            current
        }
    }

    fn skip(&mut self, parameter: ParameterDescriptor, reason: SkipReason) {
        warn!(name = %parameter.name, path = %parameter.device_path, %reason, "Could not process parameter, skipping");
        self.decisions.push(DiscoveryDecision::Skipped {
            name: parameter.name,
            path: parameter.device_path,
            reason,
        });
    }

    fn discard(&mut self, name: String, path: String, reason: DiscardReason) {
        warn!(name = %name, path = %path, %reason, "Discarding colliding parameter");
        self.decisions
            .push(DiscoveryDecision::Discarded { name, path, reason });
    }

    fn finish(mut self) -> Discovery {
        for clash in std::mem::take(&mut self.clashes) {
            let Some(entry) = self.entries.remove(&clash.original_name) else {
                continue;
            };

            if self.reservations.contains(&clash.candidate) {
                self.discard(
                    clash.original_name,
                    entry.descriptor.device_path,
                    DiscardReason::Reserved(clash.candidate),
                );
            } else if self.entries.contains_key(&clash.candidate) {
                self.discard(
                    clash.original_name,
                    entry.descriptor.device_path,
                    DiscardReason::Taken(clash.candidate),
                );
            } else {
                info!(from = %clash.original_name, to = %clash.candidate, "Renamed colliding parameter");
                self.entries.insert(
                    clash.candidate.clone(),
                    Entry {
                        descriptor: entry.descriptor.renamed(clash.candidate.clone()),
                        origin: entry.origin,
                    },
                );
                self.decisions.push(DiscoveryDecision::Renamed {
                    from: clash.original_name,
                    to: clash.candidate,
                });
            }
        }

        let entries = self
            .entries
            .into_iter()
            .map(|(name, entry)| (name, entry.descriptor))
            .collect();

        Discovery {
            registry: AttributeRegistry::from_entries(entries),
            decisions: self.decisions,
        }
    }
}

/// Fold an ordered stream of discovered parameters into a registry.
///
/// `parameters` must arrive in [`SUBSYSTEM_ORDER`], and in key-list order
/// within each pair; the result depends on that order.
pub fn resolve(
    parameters: impl IntoIterator<Item = ParameterDescriptor>,
    reservations: &StaticReservations,
    policy: RenamePolicy,
) -> Discovery {
    parameters
        .into_iter()
        .fold(RegistryBuilder::new(reservations, policy), |mut builder, parameter| {
            builder.push(parameter);
            builder
        })
        .finish()
}

/// Fetch every parameter the device reports, in [`SUBSYSTEM_ORDER`].
///
/// Pairs are walked sequentially; metadata within a pair is fetched
/// concurrently. The first failure aborts the whole fetch.
pub async fn fetch_parameters(connection: &dyn Connection) -> EigerResult<Vec<ParameterDescriptor>> {
    let mut parameters = Vec::new();

    for (subsystem, mode) in SUBSYSTEM_ORDER {
        let names = fetch_keys(connection, subsystem, mode).await?;
        debug!(%subsystem, %mode, count = names.len(), "Fetched key list");

        let responses = try_join_all(names.iter().map(|name| {
            let path = parameter_path(subsystem, mode, name);
            async move { connection.get(&path).await }
        }))
        .await?;

        parameters.extend(
            names
                .into_iter()
                .zip(responses)
                .map(|(name, response)| ParameterDescriptor::new(subsystem, mode, name, response)),
        );
    }

    Ok(parameters)
}

async fn fetch_keys(
    connection: &dyn Connection,
    subsystem: Subsystem,
    mode: Mode,
) -> EigerResult<Vec<String>> {
    let path = keys_path(subsystem, mode);
    let response = connection.get(&path).await?;

    response
        .value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or(EigerError::InvalidKeyList { path })
}

/// Run a full discovery pass over `connection`.
pub async fn discover(
    connection: &dyn Connection,
    reservations: &StaticReservations,
    policy: RenamePolicy,
) -> EigerResult<Discovery> {
    let parameters = fetch_parameters(connection).await?;
    let fetched = parameters.len();
    let discovery = resolve(parameters, reservations, policy);

    info!(
        fetched,
        registered = discovery.registry.len(),
        decisions = discovery.decisions.len(),
        %policy,
        "Discovery complete"
    );
    Ok(discovery)
}

/// Send the initialize command if the detector reports itself uninitialized.
///
/// Reads the reserved detector state path once; if it reads `"na"`, issues
/// exactly one `initialize` command with an empty payload. Returns whether
/// the command was sent.
pub async fn initialize_if_needed(
    connection: &dyn Connection,
    reservations: &StaticReservations,
) -> EigerResult<bool> {
    let state = connection.get(reservations.detector_state_path()).await?;

    if state.value.as_str() == Some(UNINITIALIZED_STATE) {
        info!("Detector is uninitialized, sending initialize command");
        connection
            .put(INITIALIZE_COMMAND_PATH, Value::from(""))
            .await?;
        Ok(true)
    } else {
        debug!(state = %state.value, "Detector already initialized");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::DETECTOR_STATE;
    use eiger_core::{AttributeDatatype, ParameterResponse};
    use tracing_test::traced_test;

    use Mode::{Config, Status};
    use Subsystem::{Detector, Monitor, Stream};

    fn param(
        subsystem: Subsystem,
        mode: Mode,
        name: &str,
        value_type: &str,
        access_mode: &str,
    ) -> ParameterDescriptor {
        ParameterDescriptor::new(
            subsystem,
            mode,
            name,
            ParameterResponse::with_metadata(Value::Null, value_type, access_mode),
        )
    }

    fn float(subsystem: Subsystem, mode: Mode, name: &str) -> ParameterDescriptor {
        param(subsystem, mode, name, "float", "r")
    }

    fn names(discovery: &Discovery) -> Vec<&str> {
        discovery.registry.names().collect()
    }

    fn resolve_with(policy: RenamePolicy, parameters: Vec<ParameterDescriptor>) -> Discovery {
        resolve(parameters, &StaticReservations::eiger(), policy)
    }

    #[test]
    fn singly_seen_names_keep_their_bare_name() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                float(Detector, Status, "humidity"),
                param(Detector, Config, "count_time", "float", "rw"),
                param(Stream, Config, "header_detail", "string", "rw"),
                param(Monitor, Config, "buffer_size", "int", "rw"),
            ],
        );

        assert_eq!(
            names(&discovery),
            vec!["buffer_size", "count_time", "header_detail", "humidity"]
        );
        assert!(discovery.decisions.is_empty());

        let count_time = discovery.registry.get("count_time").unwrap();
        assert_eq!(count_time.device_path, "detector/api/1.8.0/config/count_time");
        assert_eq!(count_time.datatype, AttributeDatatype::Float);
        assert_eq!(count_time.mode, AttributeMode::ReadWritable);
    }

    #[test]
    fn cross_subsystem_collision_prefixes_both_occurrences() {
        for policy in [RenamePolicy::Origin, RenamePolicy::Legacy] {
            let discovery = resolve_with(
                policy,
                vec![
                    float(Detector, Status, "temperature"),
                    float(Stream, Status, "temperature"),
                ],
            );

            assert_eq!(
                names(&discovery),
                vec!["detector_temperature", "stream_temperature"],
                "policy {policy}"
            );
            assert!(!discovery.registry.contains("temperature"));
            assert_eq!(
                discovery.registry.get("detector_temperature").unwrap().device_path,
                "detector/api/1.8.0/status/temperature"
            );
            assert_eq!(
                discovery.registry.get("stream_temperature").unwrap().device_path,
                "stream/api/1.8.0/status/temperature"
            );
            assert_eq!(
                discovery.decisions,
                vec![DiscoveryDecision::Renamed {
                    from: "temperature".into(),
                    to: "detector_temperature".into(),
                }]
            );
        }
    }

    #[test]
    fn legacy_policy_wraps_prefix_inside_first_subsystem() {
        let discovery = resolve_with(
            RenamePolicy::Legacy,
            vec![
                float(Detector, Status, "temperature"),
                float(Detector, Config, "temperature"),
            ],
        );

        assert_eq!(
            names(&discovery),
            vec!["detector_temperature", "monitor_temperature"]
        );
        // The status occurrence ends up under the monitor prefix
        assert_eq!(
            discovery.registry.get("monitor_temperature").unwrap().device_path,
            "detector/api/1.8.0/status/temperature"
        );
    }

    #[test]
    fn origin_policy_qualifies_same_subsystem_collisions_with_mode() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                float(Detector, Status, "temperature"),
                float(Detector, Config, "temperature"),
            ],
        );

        assert_eq!(
            names(&discovery),
            vec!["detector_config_temperature", "detector_status_temperature"]
        );
        assert_eq!(
            discovery
                .registry
                .get("detector_status_temperature")
                .unwrap()
                .device_path,
            "detector/api/1.8.0/status/temperature"
        );
    }

    #[test]
    fn origin_policy_keeps_three_occurrences_apart() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                float(Detector, Status, "x"),
                float(Stream, Status, "x"),
                float(Stream, Config, "x"),
                float(Monitor, Status, "x"),
            ],
        );

        assert_eq!(
            names(&discovery),
            vec!["detector_x", "monitor_x", "stream_config_x", "stream_x"]
        );
        assert_eq!(
            discovery.registry.get("stream_config_x").unwrap().device_path,
            "stream/api/1.8.0/config/x"
        );
    }

    #[test]
    fn legacy_policy_discards_an_occurrence_whose_prefix_is_taken() {
        let discovery = resolve_with(
            RenamePolicy::Legacy,
            vec![
                float(Detector, Status, "x"),
                float(Stream, Status, "x"),
                float(Stream, Config, "x"),
            ],
        );

        assert_eq!(names(&discovery), vec!["detector_x", "stream_x"]);
        assert_eq!(
            discovery.registry.get("stream_x").unwrap().device_path,
            "stream/api/1.8.0/status/x"
        );
        assert!(discovery.decisions.contains(&DiscoveryDecision::Discarded {
            name: "x".into(),
            path: "stream/api/1.8.0/config/x".into(),
            reason: DiscardReason::Taken("stream_x".into()),
        }));
    }

    #[test]
    fn candidate_equal_to_static_reservation_is_discarded() {
        for policy in [RenamePolicy::Origin, RenamePolicy::Legacy] {
            let discovery = resolve_with(
                policy,
                vec![
                    param(Detector, Status, "state", "State", "r"),
                    param(Stream, Status, "state", "State", "r"),
                ],
            );

            assert_eq!(names(&discovery), vec!["stream_state"], "policy {policy}");
            assert!(!discovery.registry.contains(DETECTOR_STATE));
            assert!(!discovery.registry.contains("state"));
            assert!(discovery.decisions.contains(&DiscoveryDecision::Discarded {
                name: "state".into(),
                path: "detector/api/1.8.0/status/state".into(),
                reason: DiscardReason::Reserved(DETECTOR_STATE.into()),
            }));
        }
    }

    #[test]
    fn parameter_named_like_a_reservation_is_discarded() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![param(Detector, Status, DETECTOR_STATE, "string", "r")],
        );

        assert!(discovery.registry.is_empty());
        assert!(matches!(
            discovery.decisions.as_slice(),
            [DiscoveryDecision::Discarded {
                reason: DiscardReason::Reserved(_),
                ..
            }]
        ));
    }

    #[test]
    fn rename_never_writes_over_a_taken_name() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                float(Detector, Status, "temperature"),
                param(Stream, Status, "detector_temperature", "int", "r"),
                float(Monitor, Status, "temperature"),
            ],
        );

        assert_eq!(
            names(&discovery),
            vec!["detector_temperature", "monitor_temperature"]
        );
        // The stream parameter keeps its name; the clashing original is dropped
        assert_eq!(
            discovery.registry.get("detector_temperature").unwrap().datatype,
            AttributeDatatype::Int
        );
        assert!(discovery.decisions.contains(&DiscoveryDecision::Discarded {
            name: "temperature".into(),
            path: "detector/api/1.8.0/status/temperature".into(),
            reason: DiscardReason::Taken("detector_temperature".into()),
        }));
    }

    #[test]
    #[traced_test]
    fn unrecognized_value_type_is_a_logged_skip() {
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                param(Detector, Config, "blobby", "blob", "rw"),
                float(Detector, Status, "humidity"),
            ],
        );

        assert_eq!(names(&discovery), vec!["humidity"]);
        assert_eq!(
            discovery.decisions,
            vec![DiscoveryDecision::Skipped {
                name: "blobby".into(),
                path: "detector/api/1.8.0/config/blobby".into(),
                reason: SkipReason::UnrecognizedValueType(Some("blob".into())),
            }]
        );
        assert!(logs_contain("unrecognized value type 'blob'"));
    }

    #[test]
    fn unmappable_metadata_drops_only_that_parameter() {
        let missing_type = ParameterDescriptor::new(
            Detector,
            Status,
            "untyped",
            ParameterResponse::value(1),
        );
        let discovery = resolve_with(
            RenamePolicy::Origin,
            vec![
                missing_type,
                param(Detector, Config, "weird", "int", "w"),
                float(Detector, Status, "humidity"),
            ],
        );

        assert_eq!(names(&discovery), vec!["humidity"]);
        assert!(matches!(
            discovery.decisions.as_slice(),
            [
                DiscoveryDecision::Skipped {
                    reason: SkipReason::UnrecognizedValueType(None),
                    ..
                },
                DiscoveryDecision::Skipped {
                    reason: SkipReason::UnrecognizedAccessMode(Some(_)),
                    ..
                },
            ]
        ));
    }

    #[test]
    fn rename_policy_deserializes_lowercase() {
        let policy: RenamePolicy = serde_json::from_value(serde_json::json!("legacy")).unwrap();
        assert_eq!(policy, RenamePolicy::Legacy);
        assert_eq!(RenamePolicy::default(), RenamePolicy::Origin);
    }
}
