//! Subsystems, modes and the device path conventions of the SIMPLON API.
//!
//! The detector partitions its parameters into subsystems (`detector`,
//! `stream`, `monitor`), each split into `status` and `config` modes.
//! Discovery walks these pairs in a fixed order; the order feeds into
//! collision renaming, so [`SUBSYSTEM_ORDER`] must never be reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SIMPLON API version segment used in every device path.
pub const API_VERSION: &str = "1.8.0";

/// Command that initializes the detector.
pub const INITIALIZE_COMMAND_PATH: &str = "detector/api/1.8.0/command/initialize";

/// Device path of the detector state parameter.
pub const DETECTOR_STATE_PATH: &str = "detector/api/1.8.0/status/state";

/// Detector state value meaning "not initialized".
pub const UNINITIALIZED_STATE: &str = "na";

/// Logical partition of the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// Detector control and readout
    Detector,
    /// Data streaming interface
    Stream,
    /// Image monitor interface
    Monitor,
}

/// Partition within a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Live status readings
    Status,
    /// Configuration settings
    Config,
}

/// Subsystems in discovery order.
pub const SUBSYSTEMS: [Subsystem; 3] = [Subsystem::Detector, Subsystem::Stream, Subsystem::Monitor];

/// Modes in discovery order within each subsystem.
pub const MODES: [Mode; 2] = [Mode::Status, Mode::Config];

/// Every (subsystem, mode) pair, in the order discovery must visit them.
pub const SUBSYSTEM_ORDER: [(Subsystem, Mode); 6] = [
    (Subsystem::Detector, Mode::Status),
    (Subsystem::Detector, Mode::Config),
    (Subsystem::Stream, Mode::Status),
    (Subsystem::Stream, Mode::Config),
    (Subsystem::Monitor, Mode::Status),
    (Subsystem::Monitor, Mode::Config),
];

impl Subsystem {
    /// Path segment for this subsystem.
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Detector => "detector",
            Subsystem::Stream => "stream",
            Subsystem::Monitor => "monitor",
        }
    }

    /// Position in [`SUBSYSTEMS`].
    pub fn index(self) -> usize {
        match self {
            Subsystem::Detector => 0,
            Subsystem::Stream => 1,
            Subsystem::Monitor => 2,
        }
    }

    /// Subsystem visited immediately before this one.
    ///
    /// Wraps around: the predecessor of the first subsystem is the last.
    pub fn previous(self) -> Subsystem {
        let len = SUBSYSTEMS.len();
        SUBSYSTEMS[(self.index() + len - 1) % len]
    }
}

impl Mode {
    /// Path segment for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Status => "status",
            Mode::Config => "config",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GET` path listing the parameter names of a pair.
pub fn keys_path(subsystem: Subsystem, mode: Mode) -> String {
    format!("{}/api/{}/{}/keys", subsystem, API_VERSION, mode)
}

/// Path of a single parameter.
pub fn parameter_path(subsystem: Subsystem, mode: Mode, parameter: &str) -> String {
    format!("{}/api/{}/{}/{}", subsystem, API_VERSION, mode, parameter)
}
