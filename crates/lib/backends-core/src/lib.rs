//! Core primitives shared by the superv persistence backends.

/// The common backend error.
///
/// Every transport or storage failure surfaces as one of these; callers treat
/// them all as "backend unavailable" and never retry on their own.
#[derive(Debug, thiserror::Error)]
pub enum BackendError<Inner = InnerError> {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Inner(Inner),

    #[error(transparent)]
    Serialization(serde_json::Error),
}

impl<Inner> BackendError<Inner> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[cfg(feature = "sqlx-error")]
pub type InnerError = sqlx::Error;

#[cfg(not(feature = "sqlx-error"))]
pub type InnerError = std::convert::Infallible;

/// Utility type alias for backend results.
pub type BackendResult<T, E = InnerError> = Result<T, BackendError<E>>;

#[cfg(feature = "sqlx-error")]
impl From<sqlx::Error> for BackendError<sqlx::Error> {
    fn from(value: sqlx::Error) -> Self {
        Self::Inner(value)
    }
}
