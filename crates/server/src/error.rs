//! Transport-level errors for the stdio server.

use pagewalk_core::protocol::ErrorFrame;

/// A line that could not be turned into a store request.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON, or not a known request shape.
    #[error("INVALID_INPUT: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Line bytes are not UTF-8.
    #[error("INVALID_INPUT: request line is not UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

impl From<FrameError> for ErrorFrame {
    fn from(err: FrameError) -> Self {
        let code = match &err {
            FrameError::Malformed(_) | FrameError::Encoding(_) => "INVALID_INPUT",
        };
        ErrorFrame { error: pagewalk_core::protocol::ErrorBody { code: code.into(), message: err.to_string() } }
    }
}
