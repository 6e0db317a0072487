//! Exposition text writer.

use kmon_types::{DataPoint, MetricFamily, MetricKind, SampleSuffix};
use std::fmt::Write;

/// Render families in order, one `HELP`/`TYPE` block per family.
pub fn write_exposition(families: &[MetricFamily]) -> String {
    let mut out = String::with_capacity(families.len() * 128);
    for family in families {
        write_family(&mut out, family);
    }
    out
}

/// Write one family.
///
/// The 0.0.4 text format has no `info` type, so an info family is written as a
/// gauge block named after its `_info` samples.
pub fn write_family(out: &mut String, family: &MetricFamily) {
    let (name, kind, suffixed) = match family.kind {
        MetricKind::Info => (
            format!("{}{}", family.name, SampleSuffix::Info.as_str()),
            MetricKind::Gauge,
            false,
        ),
        kind => (family.name.clone(), kind, true),
    };
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.help));
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
    if let Some(unit) = &family.unit {
        let _ = writeln!(out, "# UNIT {} {}", name, unit);
    }
    for point in &family.points {
        let suffix = if suffixed { point.suffix.as_str() } else { "" };
        write_point(out, &name, suffix, point);
    }
}

fn write_point(out: &mut String, family: &str, suffix: &str, point: &DataPoint) {
    out.push_str(family);
    out.push_str(suffix);
    if !point.labels.is_empty() {
        out.push('{');
        for (i, (name, value)) in point.labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
        }
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_value(point.value));
    if let Some(ts) = point.timestamp_ms {
        let _ = write!(out, " {}", ts);
    }
    out.push('\n');
}

/// Shortest text that reads back as the same `f64`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value)
    } else {
        format!("{:?}", value)
    }
}

pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
