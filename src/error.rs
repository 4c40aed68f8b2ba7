//! Error type shared by every layer
//!
//! Each variant maps onto one HTTP status and one machine-readable code, so
//! handlers propagate with `?` and the API layer renders the body.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed JSON, from a request body or a data file
    #[error("JSON error: {0}")]
    Json(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Well-formed, but not allowed in the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The banking aggregator failed or rejected a call
    #[error("Aggregator error: {0}")]
    Aggregator(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

impl EnvelopeError {
    pub fn not_found(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Duplicate { .. })
    }

    /// HTTP status and error code for the response body
    fn classify(&self) -> (u16, &'static str) {
        match self {
            Self::Validation(_) | Self::Json(_) => (400, "VALIDATION_ERROR"),
            Self::Import(_) => (400, "IMPORT_ERROR"),
            Self::Unauthorized(_) => (401, "UNAUTHORIZED"),
            Self::Forbidden(_) => (403, "FORBIDDEN"),
            Self::NotFound { .. } => (404, "NOT_FOUND"),
            Self::Duplicate { .. } => (409, "DUPLICATE"),
            Self::Conflict(_) => (409, "CONFLICT"),
            Self::Aggregator(_) => (502, "AGGREGATOR_ERROR"),
            Self::Config(_)
            | Self::Io(_)
            | Self::Export(_)
            | Self::Encryption(_)
            | Self::Storage(_) => (500, "INTERNAL_ERROR"),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.classify().0
    }

    pub fn code(&self) -> &'static str {
        self.classify().1
    }
}

impl From<std::io::Error> for EnvelopeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for EnvelopeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Aggregator(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = EnvelopeError::not_found("Category Group", "grp-1234abcd");
        assert_eq!(err.to_string(), "Category Group not found: grp-1234abcd");
        assert!(err.is_not_found());
        assert_eq!((err.status_code(), err.code()), (404, "NOT_FOUND"));
    }

    #[test]
    fn test_classification() {
        let cases = [
            (EnvelopeError::Validation("x".into()), 400, "VALIDATION_ERROR"),
            (EnvelopeError::Import("x".into()), 400, "IMPORT_ERROR"),
            (EnvelopeError::Unauthorized("x".into()), 401, "UNAUTHORIZED"),
            (EnvelopeError::Forbidden("x".into()), 403, "FORBIDDEN"),
            (EnvelopeError::Conflict("x".into()), 409, "CONFLICT"),
            (
                EnvelopeError::Duplicate {
                    entity_type: "Category",
                    identifier: "Rent".into(),
                },
                409,
                "DUPLICATE",
            ),
            (EnvelopeError::Aggregator("x".into()), 502, "AGGREGATOR_ERROR"),
            (EnvelopeError::Storage("x".into()), 500, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
            assert_eq!(err.code(), code, "{}", err);
        }
    }

    #[test]
    fn test_conflict_covers_duplicates() {
        assert!(EnvelopeError::Conflict("locked".into()).is_conflict());
        assert!(EnvelopeError::Duplicate {
            entity_type: "Account",
            identifier: "Checking".into()
        }
        .is_conflict());
        assert!(!EnvelopeError::Validation("bad".into()).is_conflict());
    }

    #[test]
    fn test_io_errors_are_internal() {
        let err: EnvelopeError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, EnvelopeError::Io(_)));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
