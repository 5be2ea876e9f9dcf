use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// The access token could not be decoded into claims
///
/// These are structural defects in the token itself and are never worth retrying.
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    /// The token is not made of three dot-separated segments
    #[error("access token is not a three-segment JWT")]
    Malformed,
    /// The payload segment is not valid base64url
    #[error("access token payload is not valid base64url")]
    Base64(#[from] base64::DecodeError),
    /// The decoded payload is not a JSON object with the expected claim types
    #[error("access token payload is not a valid claims object")]
    Claims(#[from] serde_json::Error),
    /// A claim required by the client is absent
    #[error("access token has no `{0}` claim")]
    MissingClaim(&'static str),
}

/// A credential store could not produce or persist a credential record
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted document exists but cannot be parsed
    #[error("persisted credentials are not valid JSON")]
    Corrupt(#[source] serde_json::Error),
    /// The underlying storage could not be read or written
    #[error("unable to access credential storage")]
    Io(#[from] io::Error),
}

/// The refresh-token exchange with the identity provider failed
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The token endpoint answered with something other than `200 OK`
    #[error("token endpoint rejected the refresh ({status}): {body}")]
    Rejected {
        /// The status returned by the token endpoint
        status: StatusCode,
        /// The response body, for diagnostics
        body: String,
    },
    /// The exchange did not complete before the request deadline
    #[error("token endpoint did not respond in time")]
    Timeout,
    /// The request could not be sent
    #[error("error sending refresh request to token endpoint")]
    RequestSend(#[source] reqwest_middleware::Error),
    /// The response body could not be read
    #[error("error reading token endpoint response")]
    BodyRead(#[source] reqwest::Error),
    /// The response body is not a token response
    #[error("error deserializing token endpoint response")]
    TokenBody(#[from] serde_json::Error),
    /// The task running the exchange panicked or was aborted
    #[error("refresh exchange did not run to completion")]
    Interrupted(#[source] tokio::task::JoinError),
}

/// Failure to produce a valid access token
#[derive(Debug, Error)]
pub enum AuthError {
    /// Nothing is persisted and no tokens were supplied at construction
    #[error("no stored credentials and no tokens supplied")]
    NoCredentials,
    /// The persisted credential document is unparsable
    #[error("persisted credential document is corrupt")]
    CorruptStore(#[source] serde_json::Error),
    /// The credential store could not be read or written
    #[error("credential store I/O failed")]
    StoreIo(#[source] io::Error),
    /// The access token is structurally invalid
    #[error("unable to decode access token")]
    TokenDecode(#[from] TokenDecodeError),
    /// The refresh exchange failed; the previous tokens remain in place
    #[error("unable to refresh access token")]
    Refresh(#[from] RefreshError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(source) => Self::CorruptStore(source),
            StoreError::Io(source) => Self::StoreIo(source),
        }
    }
}
