//! Unverified access token claims
//!
//! The client never verifies the access token's signature: it has no key to verify with, and
//! the token is trusted because it came straight from the identity provider. The payload
//! segment is only decoded to learn when the token expires and which OAuth2 client it was
//! issued to, which is what the refresh exchange needs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

use crate::{clock::UnixTime, AccessTokenRef, ClientId, TokenDecodeError};

/// The claims of an access token that the client relies on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    /// The OAuth2 client the token was issued to
    pub client_id: ClientId,
    /// The instant at which the token stops being valid
    pub exp: UnixTime,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    client_id: Option<ClientId>,
    #[serde(default)]
    exp: Option<UnixTime>,
}

impl TokenClaims {
    /// Decodes the payload of `token` without checking its signature
    ///
    /// An expired token still decodes; expiry is a judgement made against a clock
    /// (see [`is_expired_at()`][Self::is_expired_at()]), not a decoding failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a three-segment JWT, if the payload is not
    /// base64url-encoded JSON, or if the `exp` or `client_id` claim is missing.
    pub fn decode(token: &AccessTokenRef) -> Result<Self, TokenDecodeError> {
        let mut segments = token.as_str().split('.');
        let payload = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(_header), Some(payload), Some(_signature), None) => payload,
            _ => return Err(TokenDecodeError::Malformed),
        };

        // Some issuers pad their segments even though RFC 7515 says not to
        let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        let claims: RawClaims = serde_json::from_slice(&raw)?;

        let exp = claims.exp.ok_or(TokenDecodeError::MissingClaim("exp"))?;
        let client_id = claims
            .client_id
            .filter(|id| !id.as_str().is_empty())
            .ok_or(TokenDecodeError::MissingClaim("client_id"))?;

        Ok(Self { client_id, exp })
    }

    /// Whether the token is expired as of `now`
    ///
    /// A token is already expired at the instant named by its `exp` claim.
    #[inline]
    pub fn is_expired_at(&self, now: UnixTime) -> bool {
        self.exp <= now
    }
}
