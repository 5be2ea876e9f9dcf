use std::{fmt, time::Duration};

use reqwest::{header, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{
    claims::TokenClaims,
    clock::{Clock, System},
    store::{CredentialRecord, CredentialStore},
    AccessToken, AccessTokenRef, AuthError, ClientIdRef, RefreshError, RefreshToken,
    RefreshTokenRef,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The freshness of the access token currently held by a [`TokenAuthority`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    /// The token may still be presented to the backend
    Valid,
    /// The token must be refreshed before it is presented again
    Expired,
}

/// A valid access token, tagged with the generation that produced it
///
/// The generation changes every time the authority installs a different access token, so
/// anything derived from the token (such as a prepared `Authorization` header) can be cached
/// against it.
#[derive(Clone, Copy, Debug)]
pub struct CurrentToken<'a> {
    access_token: &'a AccessTokenRef,
    generation: u64,
}

impl<'a> CurrentToken<'a> {
    /// The access token
    #[inline]
    pub fn access_token(&self) -> &'a AccessTokenRef {
        self.access_token
    }

    /// The generation of the access token
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

enum State {
    Uninitialized,
    Loaded(CredentialRecord),
}

/// A refresh exchange that runs on its own task
///
/// The exchange outlives the caller that started it. A caller that is cancelled while waiting
/// leaves the handle behind for the next caller, so a refresh token is never sent twice.
struct PendingRefresh {
    sent: RefreshToken,
    exchange: JoinHandle<Result<RefreshResponse, RefreshError>>,
}

/// Owns the credential pair and keeps the access token fresh
///
/// On first use, the authority loads the pair from its [`CredentialStore`], falling back to
/// tokens supplied through [`with_tokens()`][Self::with_tokens()]. Whenever the access token
/// has expired according to the authority's clock, it trades the refresh token for a new pair
/// at the token endpoint and persists the result.
///
/// A failed exchange leaves the previous pair in place and is not retried.
///
/// Refresh exchanges are spawned onto the tokio runtime, so an authority must be driven from
/// within one.
pub struct TokenAuthority<C = System> {
    store: Box<dyn CredentialStore>,
    seed: Option<CredentialRecord>,
    token_url: reqwest::Url,
    user_agent: Option<String>,
    timeout: Duration,
    clock: C,
    state: State,
    generation: u64,
    pending: Option<PendingRefresh>,
    unsaved: bool,
}

impl<C> fmt::Debug for TokenAuthority<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("token_url", &self.token_url.as_str())
            .field("loaded", &self.is_loaded())
            .field("generation", &self.generation)
            .field("refreshing", &self.pending.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TokenAuthority<System> {
    /// Constructs an authority that exchanges tokens at `token_url` and persists them to `store`
    pub fn new(token_url: reqwest::Url, store: impl CredentialStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            seed: None,
            token_url,
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            clock: System,
            state: State::Uninitialized,
            generation: 0,
            pending: None,
            unsaved: false,
        }
    }
}

impl<C> TokenAuthority<C> {
    /// Supplies tokens to use when the store holds nothing
    ///
    /// Supplied tokens are persisted the first time they are used. A pair already present in
    /// the store takes precedence over them.
    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.seed = Some(CredentialRecord::new(access_token, refresh_token));
        self
    }

    /// Sets the total deadline for a refresh exchange
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` sent to the token endpoint
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenAuthority<D> {
        TokenAuthority {
            store: self.store,
            seed: self.seed,
            token_url: self.token_url,
            user_agent: self.user_agent,
            timeout: self.timeout,
            clock,
            state: self.state,
            generation: self.generation,
            pending: self.pending,
            unsaved: self.unsaved,
        }
    }

    /// Whether a credential pair has been loaded into memory
    #[inline]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    /// The generation of the access token held in memory
    ///
    /// Zero until a pair has been loaded; incremented every time the access token changes.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The token endpoint used for refresh exchanges
    #[inline]
    pub fn token_url(&self) -> &reqwest::Url {
        &self.token_url
    }

    fn record(&self) -> Result<&CredentialRecord, AuthError> {
        match &self.state {
            State::Loaded(record) => Ok(record),
            State::Uninitialized => Err(AuthError::NoCredentials),
        }
    }

    fn current(&self) -> Result<CurrentToken<'_>, AuthError> {
        let record = self.record()?;
        Ok(CurrentToken {
            access_token: &record.access_token,
            generation: self.generation,
        })
    }

    fn install(&mut self, record: CredentialRecord) {
        self.state = State::Loaded(record);
        self.generation += 1;
    }

    /// Loads the credential pair into memory
    ///
    /// The store is consulted first. If it holds nothing, tokens supplied at construction
    /// are used and saved to the store right away.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::NoCredentials`] if neither source has a pair, and with a store
    /// error if the store cannot be read or the supplied tokens cannot be saved.
    #[tracing::instrument(err, skip(self), fields(token_url = %self.token_url))]
    pub async fn load(&mut self) -> Result<(), AuthError> {
        let record = match self.store.load().await? {
            Some(record) => {
                tracing::info!("loaded credentials from store");
                record
            }
            None => {
                let Some(seed) = self.seed.take() else {
                    tracing::error!("no stored credentials and no tokens supplied");
                    return Err(AuthError::NoCredentials);
                };

                tracing::warn!("no stored credentials, persisting supplied tokens");
                if let Err(error) = self.store.save(&seed).await {
                    self.seed = Some(seed);
                    return Err(error.into());
                }
                seed
            }
        };

        self.install(record);
        Ok(())
    }
}

impl<C: Clock> TokenAuthority<C> {
    /// Judges the freshness of the access token held in memory
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::NoCredentials`] if nothing has been loaded yet, and with
    /// [`AuthError::TokenDecode`] if the access token is not a decodable JWT.
    pub fn status(&self) -> Result<TokenStatus, AuthError> {
        let claims = TokenClaims::decode(&self.record()?.access_token)?;
        let now = self.clock.now();

        tracing::trace!(exp = %claims.exp, now = %now, "checked access token expiry");

        if claims.is_expired_at(now) {
            Ok(TokenStatus::Expired)
        } else {
            Ok(TokenStatus::Valid)
        }
    }

    /// Returns a valid access token, loading and refreshing as required
    ///
    /// When the token in memory is still valid this touches neither the store nor the
    /// network. A refresh left in flight by a cancelled call is joined rather than repeated.
    ///
    /// # Errors
    ///
    /// Propagates failures from loading, token decoding, the refresh exchange, and persisting
    /// the refreshed pair. If only persisting fails, the refreshed pair is still held in
    /// memory and is returned by the next call.
    pub async fn ensure_valid(
        &mut self,
        http: &ClientWithMiddleware,
    ) -> Result<CurrentToken<'_>, AuthError> {
        if !self.is_loaded() {
            self.load().await?;
        }

        if self.unsaved {
            tracing::warn!("previous save was interrupted, persisting credentials again");
            self.persist().await?;
        }

        if self.pending.is_some() || self.status()? == TokenStatus::Expired {
            self.refresh(http).await?;
        }

        self.current()
    }

    /// Trades the refresh token for a new credential pair
    ///
    /// The OAuth2 client identifier is taken from the current access token, even though that
    /// token has expired. If an exchange is already in flight, its result is awaited instead
    /// of starting another. On success the new pair replaces the old one in memory before it
    /// is persisted.
    ///
    /// # Errors
    ///
    /// On any failure of the exchange itself, the previous pair is left untouched.
    #[tracing::instrument(err, skip(self, http), fields(token_url = %self.token_url, generation = self.generation))]
    pub async fn refresh(&mut self, http: &ClientWithMiddleware) -> Result<(), AuthError> {
        let pending = match self.pending.take() {
            Some(pending) => {
                tracing::debug!("joining refresh already in flight");
                pending
            }
            None => self.start_refresh(http)?,
        };
        let pending = self.pending.insert(pending);

        let sent = pending.sent.clone();
        let joined = (&mut pending.exchange).await;
        self.pending = None;

        let response = joined.map_err(|error| {
            tracing::error!(%error, "refresh task did not run to completion");
            RefreshError::Interrupted(error)
        })??;

        let refresh_token = match response.refresh_token {
            Some(rt) if !rt.as_str().is_empty() => rt,
            _ => {
                tracing::debug!("token endpoint did not rotate the refresh token");
                sent
            }
        };

        self.install(CredentialRecord {
            access_token: response.access_token,
            refresh_token,
        });
        tracing::info!(generation = self.generation, "access token refreshed");

        self.persist().await
    }

    fn start_refresh(&self, http: &ClientWithMiddleware) -> Result<PendingRefresh, AuthError> {
        let record = self.record()?;
        let claims = TokenClaims::decode(&record.access_token)?;

        tracing::info!(client_id = %claims.client_id, "access token expired, refreshing");

        let sent = record.refresh_token.clone();
        let refresh_token = sent.clone();
        let http = http.clone();
        let token_url = self.token_url.clone();
        let user_agent = self.user_agent.clone();
        let timeout = self.timeout;

        let exchange = tokio::spawn(
            async move {
                let exchange = request_refresh(
                    &http,
                    &token_url,
                    user_agent.as_deref(),
                    &claims.client_id,
                    &refresh_token,
                );

                match tokio::time::timeout(timeout, exchange).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(?timeout, "token endpoint did not respond in time");
                        Err(RefreshError::Timeout)
                    }
                }
            }
            .in_current_span(),
        );

        Ok(PendingRefresh { sent, exchange })
    }

    /// Saves the pair held in memory
    ///
    /// The pair is marked unsaved until the store answers, so a save abandoned by a cancelled
    /// caller is repeated on the next call.
    async fn persist(&mut self) -> Result<(), AuthError> {
        let record = self.record()?.clone();

        self.unsaved = true;
        let saved = self.store.save(&record).await;
        self.unsaved = false;

        saved.map_err(AuthError::from)
    }
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: AccessToken,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
}

async fn request_refresh(
    http: &ClientWithMiddleware,
    token_url: &reqwest::Url,
    user_agent: Option<&str>,
    client_id: &ClientIdRef,
    refresh_token: &RefreshTokenRef,
) -> Result<RefreshResponse, RefreshError> {
    let grant = RefreshGrant {
        grant_type: "refresh_token",
        refresh_token: refresh_token.as_str(),
        client_id: client_id.as_str(),
    };

    let mut req = http
        .post(token_url.clone())
        .header(header::ACCEPT, "application/json")
        .form(&grant);

    if let Some(user_agent) = user_agent {
        req = req.header(header::USER_AGENT, user_agent);
    }

    let resp = req.send().await.map_err(|error| match error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => RefreshError::Timeout,
        error => RefreshError::RequestSend(error),
    })?;

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received token response from identity provider"
    );

    let body = resp.bytes().await.map_err(RefreshError::BodyRead)?;

    if status != StatusCode::OK {
        let body = String::from_utf8_lossy(&body).into_owned();
        tracing::error!(%status, %body, "token endpoint rejected the refresh");
        return Err(RefreshError::Rejected { status, body });
    }

    let resp: RefreshResponse = serde_json::from_slice(&body)?;

    tracing::info!(
        has_refresh_token = resp.refresh_token.is_some(),
        "received new tokens"
    );

    Ok(resp)
}
