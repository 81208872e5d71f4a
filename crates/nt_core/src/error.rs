use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Transport-level failures, as opposed to answers the server gave us.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Io(_) | Error::Unavailable(_))
    }

    /// Worth retrying an idempotent request after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } => *status >= 500,
            Error::Unavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::Api { status: 400, message: "Rating is required".to_string() };
        assert_eq!(err.to_string(), "API error (400): Rating is required");

        let err = Error::InvalidInput("article id 'abc' is not a number".to_string());
        assert_eq!(err.to_string(), "Invalid input: article id 'abc' is not a number");
    }

    #[test]
    fn test_retry_classification() {
        assert!(Error::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!Error::Api { status: 404, message: String::new() }.is_retryable());
        assert!(!Error::NotFound("article 3".to_string()).is_retryable());
        assert!(Error::Unavailable("offline".to_string()).is_transport());
        assert!(!Error::Decode("bad".to_string()).is_transport());
    }
}
