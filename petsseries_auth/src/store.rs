//! Durable storage for the credential pair

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AccessToken, RefreshToken, StoreError};

#[cfg(feature = "file")]
mod file;
mod in_memory;

#[cfg(feature = "file")]
#[cfg_attr(docsrs, doc(cfg(feature = "file")))]
pub use file::FileCredentialStore;
pub use in_memory::InMemoryCredentialStore;

/// The persisted OAuth2 state: an access token and the refresh token that renews it
///
/// A record is always complete. Stores never hand out or write half of a pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    /// The bearer token attached to requests
    pub access_token: AccessToken,
    /// The token traded for a new pair once the access token expires
    pub refresh_token: RefreshToken,
}

impl CredentialRecord {
    /// Constructs a record from its two tokens
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: AccessToken::new(access_token.into()),
            refresh_token: RefreshToken::new(refresh_token.into()),
        }
    }
}

/// The on-disk shape of a credential document
///
/// Either field may be missing from a hand-edited or truncated document, in which case the
/// document as a whole counts as absent.
#[derive(Deserialize)]
pub(crate) struct PersistedCredentials {
    #[serde(default)]
    access_token: Option<AccessToken>,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
}

impl PersistedCredentials {
    pub(crate) fn into_record(self) -> Option<CredentialRecord> {
        match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token))
                if !access_token.as_str().is_empty() && !refresh_token.as_str().is_empty() =>
            {
                Some(CredentialRecord {
                    access_token,
                    refresh_token,
                })
            }
            _ => {
                tracing::warn!("credential document is incomplete, treating it as absent");
                None
            }
        }
    }
}

/// An asynchronous, durable home for a [`CredentialRecord`]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the persisted record
    ///
    /// Returns `Ok(None)` when nothing usable has been persisted yet.
    async fn load(&mut self) -> Result<Option<CredentialRecord>, StoreError>;

    /// Replaces the persisted record with `record`
    ///
    /// After a successful save, [`load()`][Self::load()] returns exactly `record`. A failed
    /// save must leave the previously persisted record intact.
    async fn save(&mut self, record: &CredentialRecord) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Box<S> {
    async fn load(&mut self) -> Result<Option<CredentialRecord>, StoreError> {
        (**self).load().await
    }

    async fn save(&mut self, record: &CredentialRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }
}
