use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// The error categories from the design: each maps to exactly one HTTP
/// status family at the API boundary, except `CompileFailure` which never
/// escapes as an HTTP error (it is reflected as `Session::status = error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    InvalidState,
    NotFound,
    CompileFailure,
    Fatal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    /// A path argument resolved outside a SandboxFS root.
    #[error("path '{path}' escapes sandbox root '{root}'")]
    EscapeAttempt { path: String, root: String },

    /// Malformed request, unsupported compiler, bad conversion spec, etc.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Mutating operation attempted on a session that is not `editable`.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Unknown session key, or an absent product/log.
    #[error("not found: {0}")]
    NotFound(String),

    /// Compiler produced no artifact, or rasterization produced != 1 new file.
    /// Never surfaced as an HTTP error; recorded on the Session as `status = error`.
    #[error("compile failure: {0}")]
    CompileFailure(String),

    /// Configuration errors or anything else that should abandon a background job.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::EscapeAttempt { .. } | ServiceError::InvalidRequest(_) => {
                ErrorCategory::InvalidRequest
            }
            ServiceError::InvalidState(_) => ErrorCategory::InvalidState,
            ServiceError::NotFound(_) => ErrorCategory::NotFound,
            ServiceError::CompileFailure(_) => ErrorCategory::CompileFailure,
            ServiceError::Fatal(_) | ServiceError::Io(_) | ServiceError::Json(_) => {
                ErrorCategory::Fatal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_attempt_categorizes_as_invalid_request() {
        let err = ServiceError::EscapeAttempt {
            path: "/tmp/evil".into(),
            root: "/working/abc".into(),
        };
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);
    }

    #[test]
    fn invalid_state_categorizes_correctly() {
        let err = ServiceError::InvalidState("session is not editable".into());
        assert_eq!(err.category(), ErrorCategory::InvalidState);
    }
}
