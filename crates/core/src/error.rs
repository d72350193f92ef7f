//! Unified error types for pagewalk.
//!
//! Every variant renders with a stable upper-case code prefix so that
//! failures crossing the store protocol stay machine-readable.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the store, the fetch pipeline and the reader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request or argument (e.g., empty gallery id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Stored data could not be decoded.
    #[error("STORE_ERROR: corrupt record: {0}")]
    Corrupt(String),

    /// Migration failed to apply.
    #[error("MIGRATION_FAILED: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response or network failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// All fetch attempts failed.
    #[error("FETCH_EXHAUSTED: {url} after {attempts} attempts: {last}")]
    FetchExhausted { url: String, attempts: u32, last: String },

    /// Fetched document did not contain the expected markers.
    #[error("PARSE_FAILED: {0}")]
    ParseFailed(String),

    /// The store answered with a response shape that does not fit the request.
    #[error("PROTOCOL_ERROR: {0}")]
    Protocol(String),

    /// The background store is gone.
    #[error("CHANNEL_CLOSED: {0}")]
    ChannelClosed(String),
}

impl Error {
    /// Stable error code, the prefix of the `Display` form.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Database(_) | Error::Corrupt(_) => "STORE_ERROR",
            Error::MigrationFailed(_) => "MIGRATION_FAILED",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchExhausted { .. } => "FETCH_EXHAUSTED",
            Error::ParseFailed(_) => "PARSE_FAILED",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::ChannelClosed(_) => "CHANNEL_CLOSED",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("galleryId is required".to_string());
        assert!(err.to_string().starts_with("INVALID_INPUT"));
        assert!(err.to_string().contains("galleryId"));
    }

    #[test]
    fn test_error_code_matches_display_prefix() {
        let errors = [
            Error::InvalidInput("x".into()),
            Error::Corrupt("x".into()),
            Error::HttpError("status 503".into()),
            Error::FetchExhausted { url: "https://e.org".into(), attempts: 3, last: "status 503".into() },
            Error::ParseFailed("x".into()),
            Error::Protocol("x".into()),
            Error::ChannelClosed("x".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }
}
