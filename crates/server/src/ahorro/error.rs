//! Belgrano Ahorro API errors.

use thiserror::Error;

/// Errors from a single API call.
#[derive(Debug, Error)]
pub enum AhorroError {
    /// The HTTP client could not be built.
    #[error("Ahorro client configuration error: {0}")]
    Config(String),

    /// Request timed out.
    #[error("Timeout en petición a {0}")]
    Timeout(String),

    /// Connection or transport failure.
    #[error("Ahorro request failed: {0}")]
    Request(String),

    /// Non-success status. Carries the API's `error` message when present.
    #[error("Error HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Body was not valid JSON.
    #[error("Ahorro response error: {0}")]
    Response(String),
}

impl From<reqwest::Error> for AhorroError {
    fn from(e: reqwest::Error) -> Self {
        let target = e
            .url()
            .map_or_else(|| "Belgrano Ahorro".to_string(), ToString::to_string);
        if e.is_timeout() {
            Self::Timeout(target)
        } else if e.is_decode() {
            Self::Response(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}
