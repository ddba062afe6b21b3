use thiserror::Error;

/// Failure to parse a stored or wire-level enum string.
///
/// `kind` names the enum, `value` is the offending input. Surfaces as a
/// conversion error in the store layer when a persisted column holds an
/// unknown value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
