//! Exposition text format.

mod parser;
mod writer;

pub use parser::{parse_exposition, ExpositionParser, ParseOutcome};
pub use writer::{escape_help, escape_label_value, format_value, write_exposition, write_family};

/// Content type served alongside rendered exposition text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
