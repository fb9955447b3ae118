use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error(transparent)]
    #[diagnostic(
        code(depot_dl::transport),
        help("Check your internet connection or try again later")
    )]
    Transport(#[from] Box<ureq::Error>),

    #[error("Not found: {url}")]
    #[diagnostic(code(depot_dl::not_found))]
    NotFound { url: String },

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(depot_dl::bad_status))]
    BadStatus { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    #[diagnostic(code(depot_dl::malformed))]
    Malformed { url: String, reason: String },

    #[error("Invalid URL: {url}")]
    #[diagnostic(code(depot_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl From<ureq::Error> for ApiError {
    fn from(e: ureq::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}

impl ApiError {
    /// Maps a non-success status to `NotFound` (404) or `BadStatus`.
    pub fn from_status(status: u16, url: &str) -> Self {
        if status == 404 {
            Self::NotFound { url: url.into() }
        } else {
            Self::BadStatus {
                status,
                url: url.into(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        let err = ApiError::from_status(404, "https://crates.io/api/v1/crates/nope");
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert_eq!(err.to_string(), "Not found: https://crates.io/api/v1/crates/nope");

        let err = ApiError::from_status(503, "https://static.crates.io/x");
        assert_eq!(err.to_string(), "HTTP 503: https://static.crates.io/x");
    }

    #[test]
    fn test_from_ureq_error() {
        let err: ApiError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
