use crate::backend::{BackendError, BackendErrorKind, StatusCode, TransportCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryClass {
    /// Safe to repeat only when the caller declared the work idempotent.
    RetryableIfIdempotent,
    Retryable,
    /// The session is unusable; the connection must be replaced.
    MustDeleteSession,
    Fatal,
}

/// Which backoff tier a retry waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffKind {
    None,
    Fast,
    Slow,
}

/// Retry decision for one failure, computed once by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: RetryClass,
    pub backoff: BackoffKind,
    /// Status code compared across attempts to reset the backoff index.
    pub status_code: i32,
}

impl Classification {
    const fn new(class: RetryClass, backoff: BackoffKind, status_code: i32) -> Self {
        Self {
            class,
            backoff,
            status_code,
        }
    }

    /// Classification carried by the bad-connection sentinel itself.
    #[must_use]
    pub const fn must_delete_session() -> Self {
        Self::new(RetryClass::MustDeleteSession, BackoffKind::None, -1)
    }

    #[must_use]
    pub fn is_must_delete_session(&self) -> bool {
        self.class == RetryClass::MustDeleteSession
    }

    #[must_use]
    pub fn must_retry(&self, idempotent: bool) -> bool {
        match self.class {
            RetryClass::Retryable => true,
            RetryClass::RetryableIfIdempotent => idempotent,
            RetryClass::MustDeleteSession | RetryClass::Fatal => false,
        }
    }
}

#[must_use]
pub fn classify(err: &BackendError) -> Classification {
    let code = err.code();
    let (class, backoff) = match err.kind() {
        BackendErrorKind::Operation(status) => match status {
            StatusCode::BadSession | StatusCode::SessionExpired | StatusCode::SessionBusy => {
                (RetryClass::MustDeleteSession, BackoffKind::None)
            }
            StatusCode::Aborted | StatusCode::Unavailable => {
                (RetryClass::Retryable, BackoffKind::Fast)
            }
            StatusCode::Overloaded => (RetryClass::Retryable, BackoffKind::Slow),
            StatusCode::Undetermined => (RetryClass::RetryableIfIdempotent, BackoffKind::Fast),
            _ => (RetryClass::Fatal, BackoffKind::None),
        },
        BackendErrorKind::Transport(transport) => match transport {
            TransportCode::ResourceExhausted => (RetryClass::Retryable, BackoffKind::Slow),
            // the channel broke mid-call; the session it was bound to cannot be trusted
            TransportCode::Canceled
            | TransportCode::Unknown
            | TransportCode::DeadlineExceeded
            | TransportCode::Aborted
            | TransportCode::Internal
            | TransportCode::Unavailable
            | TransportCode::DataLoss => (RetryClass::MustDeleteSession, BackoffKind::None),
            _ => (RetryClass::Fatal, BackoffKind::None),
        },
    };
    Classification::new(class, backoff, code)
}
