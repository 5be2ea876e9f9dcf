use petsseries_auth::AuthError;
use reqwest::StatusCode;
use thiserror::Error;

/// An error from a PetsSeries client operation
///
/// No error is retried by the client. The only automatic behavior is the token refresh that
/// precedes a request.
#[derive(Debug, Error)]
pub enum Error {
    /// A valid access token could not be produced
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Remote {
        /// The status returned by the backend
        status: StatusCode,
        /// The response body, for diagnostics
        body: String,
    },
    /// A success response did not have the expected shape
    #[error("backend response does not have the expected shape")]
    MalformedResponse(#[source] serde_json::Error),
    /// The request did not complete before its deadline
    #[error("request did not complete in time")]
    Timeout,
    /// The request could not be sent or its response could not be read
    #[error("error communicating with backend")]
    Transport(#[source] reqwest_middleware::Error),
    /// Settings were requested for a device the home does not list
    #[error("device `{0}` is not one of the home's devices")]
    DeviceNotFound(String),
    /// A meal without an identifier cannot be addressed
    #[error("meal has no identifier")]
    MissingMealId,
    /// A configured endpoint is not a valid URL
    #[error("invalid endpoint URL `{url}`")]
    InvalidUrl {
        /// The offending configuration value
        url: String,
        /// The parse failure
        #[source]
        source: url::ParseError,
    },
    /// A configured endpoint URL cannot carry a resource path
    #[error("endpoint URL `{0}` cannot be used as a base for resource paths")]
    NotABaseUrl(String),
    /// A configured or issued value cannot be used as an HTTP header
    #[error("value cannot be used as an HTTP header")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    /// The HTTP client could not be constructed
    #[error("unable to construct HTTP client")]
    Client(#[source] reqwest::Error),
}

impl Error {
    pub(crate) fn transport(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => Self::Timeout,
            error => Self::Transport(error),
        }
    }

    /// The status returned by the backend, if the backend rejected the request
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A result whose error is a PetsSeries client [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;
