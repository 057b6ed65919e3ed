//! Uniform operation envelope

use serde::Serialize;
use utoipa::ToSchema;

use crate::data::storage::StorageError;

/// Failure class, used to pick an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Conflict,
    InvalidInput,
    /// Retrying the whole operation may succeed
    Unavailable,
    Internal,
}

impl FailureKind {
    pub fn of(err: &StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound,
            StorageError::Conflict { .. } => Self::Conflict,
            StorageError::InvalidPath(_) => Self::InvalidInput,
            e if e.is_retryable() => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

/// Outcome of a file operation as seen by callers
///
/// Failures never escape as errors past the file service; they arrive here
/// with a message, optional diagnostic details and a retry hint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub details: Option<String>,
    pub retryable: bool,
    /// Soft failures on an otherwise successful operation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub kind: Option<FailureKind>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            retryable: false,
            warnings: Vec::new(),
            kind: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            details: None,
            retryable: kind == FailureKind::Unavailable,
            warnings: Vec::new(),
            kind: Some(kind),
        }
    }

    pub fn from_error(err: &StorageError) -> Self {
        let mut result = Self::failure(FailureKind::of(err), err.to_string());
        result.details = err.details();
        result.retryable = err.is_retryable();
        result
    }

    /// Transform the payload, keeping status, hints and warnings
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            details: self.details,
            retryable: self.retryable,
            warnings: self.warnings,
            kind: self.kind,
        }
    }
}
