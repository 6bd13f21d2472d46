//! Typed metric records and the snapshot produced by one poll round.
//!
//! Modules never construct a [`Snapshot`] directly. They append records into a
//! shared [`SnapshotBuilder`] and the engine finalizes it once the round is
//! complete:
//!
//! ```
//! use sysmon::snapshot::{MetricValue, SnapshotBuilder};
//!
//! let mut builder = SnapshotBuilder::new();
//! builder.add_double("x.a", Some("u"), 1.5).unwrap();
//! builder.add_uint64("x.b", None, 42).unwrap();
//!
//! let snapshot = builder.finalize();
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(snapshot.find("x.b").unwrap().value(), &MetricValue::UInt64(42));
//! assert!(builder.is_empty());
//! ```

use serde::Serialize;

use crate::error::{Result, SysmonError};

/// First allocation made by an empty builder; later growth doubles.
const INITIAL_CAPACITY: usize = 32;

/// Type tag of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Double,
    Int64,
    UInt64,
    String,
}

/// Value carried by a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Double(f64),
    Int64(i64),
    UInt64(u64),
    String(String),
}

impl MetricValue {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Double(_) => MetricType::Double,
            MetricValue::Int64(_) => MetricType::Int64,
            MetricValue::UInt64(_) => MetricType::UInt64,
            MetricValue::String(_) => MetricType::String,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetricValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(v) => Some(v),
            _ => None,
        }
    }
}

/// A single named, typed measurement.
///
/// Names are dot-namespaced by the module that produced them
/// (`cpu.usage_percent`, `network.rx_bytes`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    value: MetricValue,
}

impl Metric {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn metric_type(&self) -> MetricType {
        self.value.metric_type()
    }

    pub fn value(&self) -> &MetricValue {
        &self.value
    }
}

/// Immutable, ordered result of one poll round.
///
/// Iteration order is insertion order. Each module's metrics are contiguous
/// and modules appear in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    metrics: Vec<Metric>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Returns the metric at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<&Metric> {
        self.metrics.get(index)
    }

    /// Returns the first metric whose name equals `name` exactly.
    pub fn find(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Metric> {
        self.metrics.iter()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Metric;
    type IntoIter = std::slice::Iter<'a, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}

/// Append-only accumulator for one poll round.
///
/// Every name, unit and string value is copied into the builder, so callers
/// keep no borrow on what they pass in.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    metrics: Vec<Metric>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.metrics.capacity()
    }

    pub fn add_double(&mut self, name: &str, unit: Option<&str>, value: f64) -> Result<()> {
        self.push(name, unit, MetricValue::Double(value))
    }

    pub fn add_int64(&mut self, name: &str, unit: Option<&str>, value: i64) -> Result<()> {
        self.push(name, unit, MetricValue::Int64(value))
    }

    pub fn add_uint64(&mut self, name: &str, unit: Option<&str>, value: u64) -> Result<()> {
        self.push(name, unit, MetricValue::UInt64(value))
    }

    pub fn add_string(&mut self, name: &str, unit: Option<&str>, value: &str) -> Result<()> {
        let mut owned = String::new();
        owned.try_reserve_exact(value.len())?;
        owned.push_str(value);
        self.push(name, unit, MetricValue::String(owned))
    }

    /// Drops every metric appended after `mark` (a value previously returned
    /// by [`len`](Self::len)). Used to discard a module's partial output.
    pub fn rollback_to(&mut self, mark: usize) {
        self.metrics.truncate(mark);
    }

    /// Discards all accumulated metrics and releases the buffer.
    pub fn reset(&mut self) {
        self.metrics = Vec::new();
    }

    /// Moves the accumulated metrics into a [`Snapshot`], leaving the builder
    /// empty. A second call without new additions yields an empty snapshot.
    pub fn finalize(&mut self) -> Snapshot {
        Snapshot {
            metrics: std::mem::take(&mut self.metrics),
        }
    }

    fn push(&mut self, name: &str, unit: Option<&str>, value: MetricValue) -> Result<()> {
        if name.is_empty() {
            return Err(SysmonError::InvalidArgument(
                "metric name must not be empty".to_string(),
            ));
        }
        self.grow_if_full()?;
        self.metrics.push(Metric {
            name: copy_str(name)?,
            unit: unit.map(copy_str).transpose()?,
            value,
        });
        Ok(())
    }

    fn grow_if_full(&mut self) -> Result<()> {
        let len = self.metrics.len();
        let cap = self.metrics.capacity();
        if len < cap {
            return Ok(());
        }
        let new_cap = if cap == 0 {
            INITIAL_CAPACITY
        } else {
            cap.checked_mul(2).ok_or_else(|| {
                SysmonError::OutOfMemory("snapshot capacity overflow".to_string())
            })?
        };
        self.metrics
            .try_reserve_exact(new_cap - len)
            .map_err(|e| SysmonError::OutOfMemory(format!("growing snapshot metrics: {}", e)))
    }
}

fn copy_str(s: &str) -> Result<String> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}
