//! Tolerant exposition text parser.
//!
//! A malformed external endpoint must never abort a scrape, so every line the
//! grammar does not cover is skipped and counted instead of failing the body.

use kmon_types::error::{validate_label_name, validate_metric_name};
use kmon_types::{DataPoint, Labels, MetricFamily, MetricKind, SampleSuffix};
use std::collections::HashMap;
use tracing::trace;

/// Families read from one body plus the number of lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub families: Vec<MetricFamily>,
    pub skipped_lines: usize,
}

/// Parse a whole body, discarding the skip count.
pub fn parse_exposition(text: &str) -> Vec<MetricFamily> {
    let mut parser = ExpositionParser::new();
    parser.feed_lines(text.lines());
    parser.finish().families
}

/// Incremental parser; feed lines in order, then call [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ExpositionParser {
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
    declared: HashMap<String, MetricKind>,
    skipped: usize,
    done: bool,
}

// Checked in this order when resolving a sample name to its family.
const SUFFIXES: [SampleSuffix; 6] = [
    SampleSuffix::Total,
    SampleSuffix::Created,
    SampleSuffix::Bucket,
    SampleSuffix::Sum,
    SampleSuffix::Count,
    SampleSuffix::Info,
];

impl ExpositionParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_lines<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            self.feed_line(line);
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        if self.done {
            return;
        }
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() {
            return;
        }
        let accepted = match line.strip_prefix('#') {
            Some(comment) => self.comment(comment),
            None => self.sample(line),
        };
        if !accepted {
            trace!(line, "skipping unparsable exposition line");
            self.skipped += 1;
        }
    }

    pub fn finish(self) -> ParseOutcome {
        ParseOutcome {
            families: self.families,
            skipped_lines: self.skipped,
        }
    }

    fn comment(&mut self, comment: &str) -> bool {
        let comment = comment.trim_start();
        if comment == "EOF" {
            self.done = true;
            return true;
        }
        let (keyword, rest) = split_word(comment);
        match keyword {
            "HELP" => {
                let (name, text) = split_word(rest);
                if validate_metric_name(name).is_err() {
                    return false;
                }
                let help = unescape_help(text);
                self.family_mut(name, None).help = help;
                true
            }
            "TYPE" => {
                let (name, kind) = split_word(rest);
                if validate_metric_name(name).is_err() {
                    return false;
                }
                let Ok(kind) = kind.trim().parse::<MetricKind>() else {
                    return false;
                };
                let family = self.family_mut(name, Some(kind));
                if !family.points.is_empty() && family.kind != kind {
                    return false;
                }
                family.kind = kind;
                self.declared.insert(name.to_string(), kind);
                true
            }
            "UNIT" => {
                let (name, unit) = split_word(rest);
                if validate_metric_name(name).is_err() {
                    return false;
                }
                let unit = unit.trim();
                if !unit.is_empty() {
                    self.family_mut(name, None).unit = Some(unit.to_string());
                }
                true
            }
            // free-form comment
            _ => true,
        }
    }

    fn sample(&mut self, line: &str) -> bool {
        let Some(sample) = parse_sample(line) else {
            return false;
        };
        let (family_name, suffix) = self.resolve(&sample.name);
        let kind = self.declared.get(&family_name).copied();
        let family = self.family_mut(&family_name, kind);
        let mut point = DataPoint::new(sample.labels, sample.value).with_suffix(suffix);
        point.timestamp_ms = sample.timestamp_ms;
        family.add_point(point)
    }

    fn resolve(&self, sample_name: &str) -> (String, SampleSuffix) {
        if self.declared.contains_key(sample_name) {
            return (sample_name.to_string(), SampleSuffix::None);
        }
        for suffix in SUFFIXES {
            let Some(base) = sample_name.strip_suffix(suffix.as_str()) else {
                continue;
            };
            if let Some(kind) = self.declared.get(base) {
                if kind.suffixes().contains(&suffix) {
                    return (base.to_string(), suffix);
                }
            }
        }
        (sample_name.to_string(), SampleSuffix::None)
    }

    fn family_mut(&mut self, name: &str, kind: Option<MetricKind>) -> &mut MetricFamily {
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                let family = MetricFamily::new(name, kind.unwrap_or(MetricKind::Unknown));
                self.index.insert(name.to_string(), self.families.len());
                self.families.push(family);
                self.families.len() - 1
            }
        };
        &mut self.families[slot]
    }
}

struct Sample {
    name: String,
    labels: Labels,
    value: f64,
    timestamp_ms: Option<i64>,
}

fn parse_sample(line: &str) -> Option<Sample> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    validate_metric_name(name).ok()?;

    let mut rest = &line[name_end..];
    let labels = if rest.starts_with('{') {
        let (labels, consumed) = parse_labels(&rest[1..])?;
        rest = &rest[1 + consumed..];
        labels
    } else {
        Labels::new()
    };

    // Exemplars follow a " # " marker.
    let rest = match rest.find(" # ") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut fields = rest.split_whitespace();
    let value = parse_value(fields.next()?)?;
    let timestamp_ms = match fields.next() {
        Some(ts) => Some(parse_timestamp(ts)?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
        timestamp_ms,
    })
}

/// Parse `k="v",...}` (the opening brace already consumed).
///
/// Returns the labels and the number of bytes consumed, closing brace included.
fn parse_labels(input: &str) -> Option<(Labels, usize)> {
    let mut labels = Labels::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'}' {
            return Some((labels, pos + 1));
        }

        let name_start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        let name = &input[name_start..pos];
        validate_label_name(name).ok()?;

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            return None;
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'"') {
            return None;
        }
        pos += 1;

        let mut value = String::new();
        let mut chars = input[pos..].char_indices();
        let mut closed = None;
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    closed = Some(pos + offset + 1);
                    break;
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return None,
                },
                _ => value.push(c),
            }
        }
        pos = closed?;
        if labels.get(name).is_some() {
            return None;
        }
        labels.insert(name, value);

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b'}') => return Some((labels, pos + 1)),
            _ => return None,
        }
    }
}

fn parse_value(text: &str) -> Option<f64> {
    match text {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => {
            // reject the spellings Rust accepts but the format does not
            let lower = text.to_ascii_lowercase();
            if lower.contains("inf") || lower.contains("nan") {
                return None;
            }
            text.parse().ok()
        }
    }
}

fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    // OpenMetrics timestamps are fractional seconds
    let secs: f64 = text.parse().ok()?;
    secs.is_finite().then(|| (secs * 1000.0).round() as i64)
}

fn unescape_help(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.char_indices().find(|(_, c)| c.is_ascii_whitespace()) {
        Some((idx, c)) => (&text[..idx], &text[idx + c.len_utf8()..]),
        None => (text, ""),
    }
}
