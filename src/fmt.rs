//! Line renderers for snapshots: a compact human form and JSON objects.

use std::fmt::Write;

use serde_json::{Map, Value};

use crate::error::{Result, SysmonError};
use crate::snapshot::{MetricValue, Snapshot};

const HUMAN_SEPARATOR: &str = "  ";

fn write_value(out: &mut String, value: &MetricValue) {
    // Writing into a String cannot fail.
    let _ = match value {
        MetricValue::Double(v) => write!(out, "{:.2}", v),
        MetricValue::Int64(v) => write!(out, "{}", v),
        MetricValue::UInt64(v) => write!(out, "{}", v),
        MetricValue::String(v) => write!(out, "{}", v),
    };
}

/// Renders `name=value[unit]` pairs separated by two spaces.
///
/// ```
/// use sysmon::fmt::format_human;
/// use sysmon::snapshot::SnapshotBuilder;
///
/// let mut builder = SnapshotBuilder::new();
/// builder.add_double("cpu.usage_percent", Some("%"), 12.5).unwrap();
/// builder.add_string("network.interface", None, "eth0").unwrap();
/// let line = format_human(&builder.finalize());
/// assert_eq!(line, "cpu.usage_percent=12.50%  network.interface=eth0");
/// ```
pub fn format_human(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (idx, metric) in snapshot.iter().enumerate() {
        if idx > 0 {
            out.push_str(HUMAN_SEPARATOR);
        }
        out.push_str(metric.name());
        out.push('=');
        write_value(&mut out, metric.value());
        if let Some(unit) = metric.unit() {
            out.push_str(unit);
        }
    }
    out
}

fn json_value(value: &MetricValue) -> Value {
    match value {
        MetricValue::Double(v) => Value::from(*v),
        MetricValue::Int64(v) => Value::from(*v),
        MetricValue::UInt64(v) => Value::from(*v),
        MetricValue::String(v) => Value::from(v.as_str()),
    }
}

/// Builds a JSON object keyed by metric name, in snapshot order.
///
/// Non-finite doubles become `null`. If a name repeats, the first value wins,
/// matching [`Snapshot::find`].
pub fn to_json_object(snapshot: &Snapshot) -> Map<String, Value> {
    let mut object = Map::new();
    for metric in snapshot {
        object
            .entry(metric.name())
            .or_insert_with(|| json_value(metric.value()));
    }
    object
}

/// Renders one snapshot as a single-line JSON object.
pub fn format_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string(&to_json_object(snapshot))
        .map_err(|e| SysmonError::Internal(format!("failed to encode snapshot: {}", e)))
}
