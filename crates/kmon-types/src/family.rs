//! Metric families and their data points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KmonError;
use crate::labels::Labels;

/// The shape of a metric family. Governs parse, merge and write rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
    Summary,
    Unknown,
    Info,
}

impl MetricKind {
    /// Kinds whose points can be added together across brokers.
    pub fn is_summable(self) -> bool {
        match self {
            MetricKind::Gauge | MetricKind::Counter | MetricKind::Unknown => true,
            MetricKind::Histogram | MetricKind::Summary | MetricKind::Info => false,
        }
    }

    /// Name used on `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
            MetricKind::Unknown => "untyped",
            MetricKind::Info => "info",
        }
    }

    /// Sample-name suffixes a family of this kind may carry.
    pub fn suffixes(self) -> &'static [SampleSuffix] {
        match self {
            MetricKind::Counter => &[SampleSuffix::Total, SampleSuffix::Created],
            MetricKind::Histogram => &[
                SampleSuffix::Bucket,
                SampleSuffix::Sum,
                SampleSuffix::Count,
                SampleSuffix::Created,
            ],
            MetricKind::Summary => &[
                SampleSuffix::Sum,
                SampleSuffix::Count,
                SampleSuffix::Created,
            ],
            MetricKind::Info => &[SampleSuffix::Info],
            MetricKind::Gauge | MetricKind::Unknown => &[],
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = KmonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" | "stateset" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            "histogram" | "gaugehistogram" => Ok(MetricKind::Histogram),
            "summary" => Ok(MetricKind::Summary),
            "untyped" | "unknown" => Ok(MetricKind::Unknown),
            "info" => Ok(MetricKind::Info),
            other => Err(KmonError::UnknownKind(other.to_string())),
        }
    }
}

/// Which compound sample line a point was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleSuffix {
    #[default]
    None,
    Total,
    Bucket,
    Sum,
    Count,
    Created,
    Info,
}

impl SampleSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleSuffix::None => "",
            SampleSuffix::Total => "_total",
            SampleSuffix::Bucket => "_bucket",
            SampleSuffix::Sum => "_sum",
            SampleSuffix::Count => "_count",
            SampleSuffix::Created => "_created",
            SampleSuffix::Info => "_info",
        }
    }
}

/// One observation within a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(default)]
    pub suffix: SampleSuffix,
    pub labels: Labels,
    pub value: f64,
    pub timestamp_ms: Option<i64>,
}

impl DataPoint {
    pub fn new(labels: Labels, value: f64) -> Self {
        Self {
            suffix: SampleSuffix::None,
            labels,
            value,
            timestamp_ms: None,
        }
    }

    pub fn with_suffix(mut self, suffix: SampleSuffix) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Two points collide inside a family when this returns true.
    pub fn same_identity(&self, other: &DataPoint) -> bool {
        self.suffix == other.suffix && self.labels == other.labels
    }

    /// Full sample name for this point inside `family`.
    pub fn sample_name(&self, family: &str) -> String {
        format!("{}{}", family, self.suffix.as_str())
    }
}

/// A named group of points sharing one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub unit: Option<String>,
    pub kind: MetricKind,
    pub points: Vec<DataPoint>,
}

impl MetricFamily {
    /// Create an empty family; help defaults to the name.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        let name = name.into();
        Self {
            help: name.clone(),
            name,
            unit: None,
            kind,
            points: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_point(mut self, point: DataPoint) -> Self {
        self.add_point(point);
        self
    }

    /// Append a point unless one with the same identity is already present.
    ///
    /// Returns whether the point was accepted.
    pub fn add_point(&mut self, point: DataPoint) -> bool {
        if self.points.iter().any(|p| p.same_identity(&point)) {
            return false;
        }
        self.points.push(point);
        true
    }

    /// Shorthand for a plain gauge point.
    pub fn gauge_point(&mut self, labels: Labels, value: f64) -> bool {
        self.add_point(DataPoint::new(labels, value))
    }

    /// Attach a label to every point.
    pub fn inject_label(&mut self, name: &str, value: &str) {
        for point in &mut self.points {
            point.labels.prepend(name, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
