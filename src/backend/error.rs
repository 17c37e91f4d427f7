use std::fmt;

use thiserror::Error;

/// Operation status reported by the table service for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    BadRequest,
    Unauthorized,
    InternalError,
    Aborted,
    Unavailable,
    Overloaded,
    SchemeError,
    GenericError,
    Timeout,
    BadSession,
    PreconditionFailed,
    AlreadyExists,
    NotFound,
    SessionExpired,
    Cancelled,
    Undetermined,
    Unsupported,
    SessionBusy,
}

impl StatusCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::BadRequest => 400_010,
            Self::Unauthorized => 400_020,
            Self::InternalError => 400_030,
            Self::Aborted => 400_040,
            Self::Unavailable => 400_050,
            Self::Overloaded => 400_060,
            Self::SchemeError => 400_070,
            Self::GenericError => 400_080,
            Self::Timeout => 400_090,
            Self::BadSession => 400_100,
            Self::PreconditionFailed => 400_120,
            Self::AlreadyExists => 400_130,
            Self::NotFound => 400_140,
            Self::SessionExpired => 400_150,
            Self::Cancelled => 400_160,
            Self::Undetermined => 400_170,
            Self::Unsupported => 400_180,
            Self::SessionBusy => 400_190,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Aborted => "ABORTED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Overloaded => "OVERLOADED",
            Self::SchemeError => "SCHEME_ERROR",
            Self::GenericError => "GENERIC_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::BadSession => "BAD_SESSION",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Cancelled => "CANCELLED",
            Self::Undetermined => "UNDETERMINED",
            Self::Unsupported => "UNSUPPORTED",
            Self::SessionBusy => "SESSION_BUSY",
        }
    }
}

/// Transport-level failure code (the channel failed, not the operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl TransportCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Canceled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::DeadlineExceeded => 4,
            Self::NotFound => 5,
            Self::AlreadyExists => 6,
            Self::PermissionDenied => 7,
            Self::ResourceExhausted => 8,
            Self::FailedPrecondition => 9,
            Self::Aborted => 10,
            Self::OutOfRange => 11,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unavailable => 14,
            Self::DataLoss => 15,
            Self::Unauthenticated => 16,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Canceled => "CANCELED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    Operation(StatusCode),
    Transport(TransportCode),
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(status) => write!(f, "operation error {}", status.name()),
            Self::Transport(code) => write!(f, "transport error {}", code.name()),
        }
    }
}

/// Failure reported by the backend SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    pub fn operation(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Operation(status),
            message: message.into(),
        }
    }

    pub fn transport(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transport(code),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Numeric status code; operation and transport codes occupy disjoint ranges.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self.kind {
            BackendErrorKind::Operation(status) => status.code(),
            BackendErrorKind::Transport(code) => code.code(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.kind {
            BackendErrorKind::Operation(status) => Some(status),
            BackendErrorKind::Transport(_) => None,
        }
    }

    #[must_use]
    pub fn transport_code(&self) -> Option<TransportCode> {
        match self.kind {
            BackendErrorKind::Transport(code) => Some(code),
            BackendErrorKind::Operation(_) => None,
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, BackendErrorKind::Transport(_))
    }

    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.status() == Some(StatusCode::Overloaded)
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.status() == Some(StatusCode::Unavailable)
    }

    #[must_use]
    pub fn is_resource_exhausted(&self) -> bool {
        self.transport_code() == Some(TransportCode::ResourceExhausted)
    }

    /// Operation timeout or an expired transport deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::Operation(StatusCode::Timeout)
                | BackendErrorKind::Transport(TransportCode::DeadlineExceeded)
        )
    }

    #[must_use]
    pub fn is_scheme_error(&self) -> bool {
        self.status() == Some(StatusCode::SchemeError)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NotFound)
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(StatusCode::AlreadyExists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind_and_message() {
        let err = BackendError::operation(StatusCode::BadSession, "session gone");
        assert_eq!(err.to_string(), "operation error BAD_SESSION: session gone");
        let err = BackendError::transport(TransportCode::Unavailable, "conn reset");
        assert_eq!(err.to_string(), "transport error UNAVAILABLE: conn reset");
    }

    #[test]
    fn timeout_covers_both_layers() {
        assert!(BackendError::operation(StatusCode::Timeout, "").is_timeout());
        assert!(BackendError::transport(TransportCode::DeadlineExceeded, "").is_timeout());
        assert!(!BackendError::operation(StatusCode::Aborted, "").is_timeout());
    }
}
