use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by saved-search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Validation failed for one or more saved-search fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// A grouped search was attempted without any group partition.
    #[error(transparent)]
    GroupQuery(#[from] GroupQueryError),

    /// The HTTP call to Solr failed (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Solr answered, but not with a usable grouped response.
    #[error("backend protocol error (status {status:?}): {message}")]
    BackendProtocol { status: Option<u16>, message: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Invalid input supplied to a query or search operation.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl SearchError {
    pub(crate) fn protocol(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::BackendProtocol {
            status,
            message: message.into(),
        }
    }

    /// Transport and protocol failures are the ones the backend may swallow when
    /// configured to fail silently.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::BackendProtocol { .. })
    }
}

/// Raised when a grouped search has no group queries to partition by.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("group query error: {message}")]
pub struct GroupQueryError {
    pub message: String,
}

impl GroupQueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Collection of validation issues encountered while preparing a saved search.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true when any issue was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_reports_fields() {
        let err = ValidationError::single("name", "required", "name is required");
        assert!(!err.is_empty());
        assert!(err.has_field("name"));
        assert!(!err.has_field("title"));
    }

    #[test]
    fn group_query_error_converts_into_search_error() {
        let err: SearchError = GroupQueryError::new("You must specify at least one group query.").into();
        assert!(matches!(err, SearchError::GroupQuery(_)));
        assert!(!err.is_backend_failure());
        assert_eq!(
            err.to_string(),
            "group query error: You must specify at least one group query."
        );
    }

    #[test]
    fn protocol_errors_count_as_backend_failures() {
        let err = SearchError::protocol(Some(500), "boom");
        assert!(err.is_backend_failure());
    }
}
