//! Structured tool-error envelope.
//!
//! Every handler failure crosses the tool boundary as
//! `{"error": {"code", "message", "field"?}}` with codes 400/404/409/500.
//! Errors are data, not exceptions: handlers return them, the server
//! serialises them, and only the fatal kind is logged at error level.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong, independent of wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-supplied parameters failed validation (all issues listed).
    Validation,
    /// Target id does not exist or is soft-deleted.
    NotFound,
    /// Precondition violated by current row state (e.g. double delete).
    Conflict,
    /// Session-level prerequisite missing (no current project).
    Precondition,
    /// Pool or backpressure limit hit; retryable by the caller.
    Capacity,
    /// Upstream I/O failure that exhausted internal retries.
    Transient,
    /// Invariant violated; details are logged, not returned.
    Fatal,
}

impl ErrorKind {
    /// Wire code for the envelope. The closed set is {400, 404, 409, 500}.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation | Self::Precondition => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Capacity | Self::Transient | Self::Fatal => 500,
        }
    }

    /// Whether the caller may usefully retry the identical request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Capacity | Self::Transient)
    }
}

/// A handler failure, carried as a value through the call chain.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    /// The single offending field, when there is exactly one.
    pub field: Option<String>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// A validation error covering several fields at once. All issues are
    /// joined into one message; `field` stays empty.
    pub fn validation_multi(issues: &[String]) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: issues.join("; "),
            field: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Capacity, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Internal failure. The message returned to the caller is generic;
    /// log the detail at the site that constructs this.
    pub fn fatal() -> Self {
        Self::new(ErrorKind::Fatal, "Internal error")
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    /// The wire form handlers hand back to the tool-protocol layer.
    pub fn to_envelope(&self) -> ToolErrorEnvelope {
        ToolErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.message.clone(),
                field: self.field.clone(),
            },
        }
    }
}

/// Wire shape of a failed tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_closed_set() {
        assert_eq!(ErrorKind::Validation.code(), 400);
        assert_eq!(ErrorKind::Precondition.code(), 400);
        assert_eq!(ErrorKind::NotFound.code(), 404);
        assert_eq!(ErrorKind::Conflict.code(), 409);
        assert_eq!(ErrorKind::Capacity.code(), 500);
        assert_eq!(ErrorKind::Fatal.code(), 500);
    }

    #[test]
    fn envelope_serialises_field_only_when_present() {
        let err = ToolError::validation("reason is required", "reason");
        let json = serde_json::to_value(err.to_envelope()).unwrap();
        assert_eq!(json["error"]["code"], 400);
        assert_eq!(json["error"]["field"], "reason");

        let err = ToolError::not_found("Insight 9 not found");
        let json = serde_json::to_value(err.to_envelope()).unwrap();
        assert_eq!(json["error"]["code"], 404);
        assert!(json["error"].get("field").is_none());
    }

    #[test]
    fn multi_field_validation_joins_issues() {
        let err = ToolError::validation_multi(&[
            "date_from must be <= date_to".to_string(),
            "tags_filter items must be strings".to_string(),
        ]);
        assert!(err.message.contains("; "));
        assert_eq!(err.field, None);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Capacity.is_retryable());
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
    }
}
