use thiserror::Error;

/// Error taxonomy shared by the codec, the catalog mapping and the sync engine.
///
/// Cloneable so a single failure can be reported for every occurrence of a
/// duplicated id in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing field: {field}")]
    MissingField { field: String },

    #[error("type mismatch for {field}: expected {expected}, found {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled")]
    Cancelled,
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::MissingField { .. } => "missing_field",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn mismatch(field: impl Into<String>, expected: &'static str, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            actual: actual.into(),
        }
    }

    /// Prefix the field path of a field-level error, e.g. `seasonNumber`
    /// becomes `episodes[2].seasonNumber`. Other variants pass through.
    pub fn within(self, parent: &str) -> Self {
        match self {
            Self::MissingField { field } => Self::MissingField {
                field: format!("{parent}.{field}"),
            },
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => Self::TypeMismatch {
                field: format!("{parent}.{field}"),
                expected,
                actual,
            },
            other => other,
        }
    }

    /// True for errors raised by the remote side or the network, as opposed
    /// to malformed input.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Transport(_))
    }
}
