//! A representative EIGER2 parameter table.
//!
//! Mirrors the shape of a real SIMPLON 1.8.0 surface closely enough to
//! exercise discovery end to end: `state`, `error` and `dropped` appear in
//! several subsystems, `mode` in two config namespaces, and the per-pixel
//! arrays carry value types the mapper does not support. The detector starts
//! uninitialized (`state = "na"`).

use crate::detector::MockDetector;
use eiger_core::{Mode, ParameterResponse, Subsystem};
use serde_json::{json, Value};

type Entry = (Subsystem, Mode, &'static str, Value, &'static str, &'static str);

fn table() -> Vec<Entry> {
    use Mode::{Config, Status};
    use Subsystem::{Detector, Monitor, Stream};

    vec![
        (Detector, Status, "state", json!("na"), "State", "r"),
        (Detector, Status, "error", json!([]), "string[]", "r"),
        (Detector, Status, "time", json!("2024-01-01T00:00:00.000+00:00"), "datetime", "r"),
        (Detector, Status, "humidity", json!(3.2), "float", "r"),
        (Detector, Status, "temperature", json!(24.6), "float", "r"),
        (Detector, Status, "link_0", json!("up"), "string", "r"),
        (Detector, Config, "count_time", json!(0.5), "float", "rw"),
        (Detector, Config, "frame_time", json!(0.5), "float", "rw"),
        (Detector, Config, "nimages", json!(1), "int", "rw"),
        (Detector, Config, "ntrigger", json!(1), "int", "rw"),
        (Detector, Config, "trigger_mode", json!("ints"), "string", "rw"),
        (Detector, Config, "photon_energy", json!(8041.0), "float", "rw"),
        (Detector, Config, "threshold_energy", json!(4020.5), "float", "rw"),
        (Detector, Config, "countrate_correction_applied", json!(true), "bool", "rw"),
        (Detector, Config, "description", json!("Dectris EIGER2 Si 1M"), "string", "r"),
        (Detector, Config, "x_pixel_size", json!(7.5e-5), "float", "r"),
        (Detector, Config, "flatfield", json!([[1.0, 1.0], [1.0, 1.0]]), "float[]", "rw"),
        (Detector, Config, "pixel_mask", json!([[0, 0], [0, 0]]), "uint[]", "rw"),
        (Stream, Status, "state", json!("disabled"), "State", "r"),
        (Stream, Status, "error", json!([]), "string[]", "r"),
        (Stream, Status, "dropped", json!(0), "int", "r"),
        (Stream, Config, "mode", json!("disabled"), "string", "rw"),
        (Stream, Config, "header_detail", json!("basic"), "string", "rw"),
        (Stream, Config, "header_appendix", json!(""), "string", "rw"),
        (Stream, Config, "image_appendix", json!(""), "string", "rw"),
        (Monitor, Status, "state", json!("normal"), "State", "r"),
        (Monitor, Status, "error", json!([]), "string[]", "r"),
        (Monitor, Status, "dropped", json!(0), "int", "r"),
        (Monitor, Config, "mode", json!("enabled"), "string", "rw"),
        (Monitor, Config, "buffer_size", json!(1), "int", "rw"),
        (Monitor, Config, "discard_new", json!(false), "bool", "rw"),
    ]
}

impl MockDetector {
    /// Detector preloaded with a representative EIGER2 parameter table.
    pub fn simulated() -> Self {
        table()
            .into_iter()
            .fold(MockDetector::new(), |detector, (subsystem, mode, name, value, value_type, access)| {
                detector.with_parameter(
                    subsystem,
                    mode,
                    name,
                    ParameterResponse::with_metadata(value, value_type, access),
                )
            })
    }
}
