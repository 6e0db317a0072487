//! # kmon-types
//!
//! Core metric model shared by every kmon crate:
//! - `Labels`, `DataPoint`, `MetricFamily` and the closed `MetricKind` union
//! - `RawObservation` and grouping of untyped observations into families
//! - the cross-broker summarizer kept for older consumers
//! - the shared error type
//!
//! This crate has no I/O and no async runtime dependency so it can be used by
//! parsers, sinks and tests alike.

pub mod error;
pub mod family;
pub mod labels;
pub mod raw;
pub mod summarize;

pub use error::KmonError;
pub use family::{DataPoint, MetricFamily, MetricKind, SampleSuffix};
pub use labels::Labels;
pub use raw::{group_into_families, RawObservation};
#[allow(deprecated)]
pub use summarize::summarize_brokers;
