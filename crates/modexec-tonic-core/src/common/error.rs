//! Error types for the module execution service.
//!
//! [`Error`] is what an [`ExecutableModule`](crate::ExecutableModule) returns
//! when it cannot produce a result. Each variant names a machine-checkable
//! category that maps one-to-one onto a gRPC [`Code`], and carries the message
//! the caller will see. The `From<Error>` impl for [`Status`] performs that
//! mapping without adding any text of its own.
//!
//! ## Error Cases
//! - `InvalidArgument`: The params were not acceptable to the module.
//! - `NotFound`: Something the params referred to does not exist.
//! - `FailedPrecondition`: The module is not in a state to run this request.
//! - `Unavailable`: A dependency of the module (often its context) is
//!   unreachable.
//! - `DeadlineExceeded`: The module gave up waiting on its own work.
//! - `Cancelled`: The module's work was cancelled.
//! - `Internal`: Any other failure inside the module.
//! - `Remote`: A status returned by another gRPC service, forwarded as-is.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for module execution.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    DeadlineExceeded(String),

    #[error("{0}")]
    Cancelled(String),

    #[error("{0}")]
    Internal(String),

    /// A status produced by a downstream gRPC call made through the module's
    /// context.
    #[error("{}", .0.message())]
    Remote(#[from] Status),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::DeadlineExceeded(message.into())
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The gRPC code this error is reported under.
    pub fn code(&self) -> Code {
        match self {
            Error::InvalidArgument(_) => Code::InvalidArgument,
            Error::NotFound(_) => Code::NotFound,
            Error::FailedPrecondition(_) => Code::FailedPrecondition,
            Error::Unavailable(_) => Code::Unavailable,
            Error::DeadlineExceeded(_) => Code::DeadlineExceeded,
            Error::Cancelled(_) => Code::Cancelled,
            Error::Internal(_) => Code::Internal,
            Error::Remote(status) => status.code(),
        }
    }

    /// The human-readable message, exactly as the module reported it.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidArgument(m)
            | Error::NotFound(m)
            | Error::FailedPrecondition(m)
            | Error::Unavailable(m)
            | Error::DeadlineExceeded(m)
            | Error::Cancelled(m)
            | Error::Internal(m) => m,
            Error::Remote(status) => status.message(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Remote(status) => status,
            Error::InvalidArgument(m) => Status::invalid_argument(m),
            Error::NotFound(m) => Status::not_found(m),
            Error::FailedPrecondition(m) => Status::failed_precondition(m),
            Error::Unavailable(m) => Status::unavailable(m),
            Error::DeadlineExceeded(m) => Status::deadline_exceeded(m),
            Error::Cancelled(m) => Status::cancelled(m),
            Error::Internal(m) => Status::internal(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keeps_message_verbatim() {
        let status: Status = Error::invalid_argument("invalid argument").into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "invalid argument");
    }

    #[test]
    fn every_category_maps_to_its_code() {
        let cases = [
            (Error::invalid_argument("a"), Code::InvalidArgument),
            (Error::not_found("b"), Code::NotFound),
            (Error::failed_precondition("c"), Code::FailedPrecondition),
            (Error::unavailable("d"), Code::Unavailable),
            (Error::deadline_exceeded("e"), Code::DeadlineExceeded),
            (Error::cancelled("f"), Code::Cancelled),
            (Error::internal("g"), Code::Internal),
        ];
        for (err, code) in cases {
            let message = err.message().to_string();
            assert_eq!(err.code(), code);
            let status = Status::from(err);
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), message);
        }
    }

    #[test]
    fn remote_status_passes_through() {
        let err = Error::from(Status::resource_exhausted("quota hit"));
        assert_eq!(err.code(), Code::ResourceExhausted);
        assert_eq!(err.to_string(), "quota hit");

        let status = Status::from(err);
        assert_eq!(status.code(), Code::ResourceExhausted);
        assert_eq!(status.message(), "quota hit");
    }

    #[test]
    fn display_is_the_bare_message() {
        assert_eq!(Error::internal("boom").to_string(), "boom");
    }
}
