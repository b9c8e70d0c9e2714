//! Crate-level error type for bootstrap concerns
//!
//! Request-path failures are modelled by [`DaoError`](crate::dao::DaoError) and
//! [`ApiError`](crate::crud::ApiError). This type covers what happens around
//! them: loading configuration, installing the tracing subscriber and opening
//! storage connections.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bootstrap operations
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Storage bootstrap error (pool creation, connectivity)
    #[error("Database error: {0}")]
    Database(String),

    /// Tracing subscriber could not be installed
    #[error("Tracing error: {0}")]
    Tracing(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Sanitize a database URL by removing credentials
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            if scheme_end < at_pos {
                let scheme = &url[..scheme_end + 3];
                let after_at = &url[at_pos + 1..];
                return format!("{}<redacted>@{}", scheme, after_at);
            }
        }
    }
    url.to_string()
}
