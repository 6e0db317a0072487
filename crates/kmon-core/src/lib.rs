//! # kmon-core
//!
//! Line-oriented exposition text format support:
//!
//! - [`exposition::parse_exposition`] turns a scraped body into families,
//!   skipping anything it cannot read
//! - [`exposition::write_exposition`] renders families back to text
//!
//! ## Usage
//!
//! ```rust
//! use kmon_core::exposition::{parse_exposition, write_exposition};
//!
//! let body = "# TYPE up gauge\nup{job=\"broker\"} 1\n";
//! let families = parse_exposition(body);
//! assert_eq!(families[0].name, "up");
//! assert!(write_exposition(&families).contains("up{job=\"broker\"} 1"));
//! ```

pub mod exposition;

pub use exposition::{parse_exposition, write_exposition, CONTENT_TYPE};
