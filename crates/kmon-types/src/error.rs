use thiserror::Error;

/// Errors raised by the metric model itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KmonError {
    #[error("Invalid metric name: {0:?}")]
    InvalidName(String),

    #[error("Invalid label name: {0:?}")]
    InvalidLabel(String),

    #[error("Unknown metric kind: {0}")]
    UnknownKind(String),

    #[error("Families are not mergeable: {name} ({left:?} vs {right:?})")]
    NotMergeable {
        name: String,
        left: crate::MetricKind,
        right: crate::MetricKind,
    },
}

/// Checks `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn validate_metric_name(name: &str) -> Result<(), KmonError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(KmonError::InvalidName(name.to_string()))
    }
}

/// Checks `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn validate_label_name(name: &str) -> Result<(), KmonError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(KmonError::InvalidLabel(name.to_string()))
    }
}
