use std::{fmt, sync::Arc};

use bytes::Bytes;
use petsseries_auth::{
    clock::{Clock, System},
    store::CredentialStore,
    TokenAuthority,
};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, StatusCode,
};
use reqwest_middleware::{ClientWithMiddleware, Middleware};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::{
    config::Endpoints,
    models::ItemList,
    session::{BearerHeaders, Session},
    Config, Error, Result,
};

mod account;
mod devices;
mod events;
mod meals;

const JSON_UTF8: &str = "application/json; charset=UTF-8";
#[cfg(feature = "file")]
const DEFAULT_CREDENTIAL_FILE: &str = "tokens.json";

/// A client for the PetsSeries cloud
///
/// Every operation obtains a valid access token first, refreshing it when it has expired.
/// The client can be shared between tasks (for example behind an [`Arc`]); concurrent
/// operations share one pooled connection and at most one refresh exchange is in flight at
/// any time.
pub struct PetsSeriesClient<C = System> {
    endpoints: Endpoints,
    auth: Mutex<TokenAuthority<C>>,
    session: Session,
}

impl<C> fmt::Debug for PetsSeriesClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PetsSeriesClient")
            .field("endpoints", &self.endpoints)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl PetsSeriesClient<System> {
    /// Starts configuring a client
    pub fn builder() -> ClientBuilder<System> {
        ClientBuilder::new()
    }
}

/// A response that passed status classification
pub(crate) struct Reply {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Reply {
    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|error| {
            tracing::error!(%error, "backend response does not have the expected shape");
            Error::MalformedResponse(error)
        })
    }
}

impl<C: Clock> PetsSeriesClient<C> {
    /// Loads the stored tokens, refreshing them if necessary, and prepares the request headers
    ///
    /// Calling this is optional: every operation performs the same preparation on its own.
    /// It is useful to surface credential problems early.
    pub async fn initialize(&self) -> Result<()> {
        self.authorize().await?;
        tracing::info!("client initialized");
        Ok(())
    }

    /// Closes the client and its connection pool
    pub fn close(self) {
        self.session.close();
    }

    async fn authorize(&self) -> Result<(&ClientWithMiddleware, Arc<BearerHeaders>)> {
        let http = self.session.http().await?;

        let mut auth = self.auth.lock().await;
        let token = auth.ensure_valid(http).await?;
        let headers = self.session.headers_for(token)?;

        Ok((http, headers))
    }

    /// Performs one authenticated request and classifies its response
    ///
    /// Non-success statuses become [`Error::Remote`]. Nothing is retried.
    #[tracing::instrument(err, skip(self, method, url, body), fields(method = %method, url = %url))]
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Reply> {
        let (http, headers) = self.authorize().await?;

        let mut req = http.request(method, url).headers(headers.headers.clone());
        if let Some(body) = body {
            req = req
                .header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8))
                .body(body.to_string());
        }

        let exchange = async {
            let resp = req.send().await.map_err(Error::transport)?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp
                .bytes()
                .await
                .map_err(|e| Error::transport(e.into()))?;
            Ok::<_, Error>(Reply {
                status,
                headers,
                body,
            })
        };

        let reply = match tokio::time::timeout(self.session.timeout(), exchange).await {
            Ok(reply) => reply?,
            Err(_) => {
                tracing::error!(timeout = ?self.session.timeout(), "backend did not respond in time");
                return Err(Error::Timeout);
            }
        };

        if !reply.status.is_success() {
            let body = String::from_utf8_lossy(&reply.body).into_owned();
            tracing::error!(status = %reply.status, %body, "backend rejected request");
            return Err(Error::Remote {
                status: reply.status,
                body,
            });
        }

        tracing::debug!(
            response.status = reply.status.as_u16(),
            "received backend response"
        );
        Ok(reply)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.execute(Method::GET, url, None).await?.json()
    }

    pub(crate) async fn get_items<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let list: ItemList<T> = self.get_json(url).await?;
        Ok(list.item)
    }
}

/// Configures and constructs a [`PetsSeriesClient`]
pub struct ClientBuilder<C = System> {
    config: Config,
    store: Option<Box<dyn CredentialStore>>,
    tokens: Option<(String, String)>,
    clock: C,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl<C: fmt::Debug> fmt::Debug for ClientBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.store.is_some())
            .field("tokens_supplied", &self.tokens.is_some())
            .field("clock", &self.clock)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl ClientBuilder<System> {
    fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
            tokens: None,
            clock: System,
            middleware: Vec::new(),
        }
    }
}

impl<C> ClientBuilder<C> {
    /// Replaces the endpoint and transport configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Persists credentials to a JSON document at `path`
    ///
    /// Without this or [`credential_store()`][Self::credential_store()], credentials are
    /// persisted to `tokens.json` in the working directory.
    #[cfg(feature = "file")]
    #[cfg_attr(docsrs, doc(cfg(feature = "file")))]
    pub fn credential_file(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.credential_store(petsseries_auth::store::FileCredentialStore::new(path))
    }

    /// Persists credentials to a custom store
    pub fn credential_store(mut self, store: impl CredentialStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Supplies tokens to use when the credential store holds none
    ///
    /// The tokens are saved to the store when first used.
    pub fn tokens(mut self, access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        self.tokens = Some((access_token.into(), refresh_token.into()));
        self
    }

    /// Sets a custom clock to judge token expiry
    ///
    /// Useful for testing purposes
    pub fn clock<D>(self, clock: D) -> ClientBuilder<D> {
        ClientBuilder {
            config: self.config,
            store: self.store,
            tokens: self.tokens,
            clock,
            middleware: self.middleware,
        }
    }

    /// Adds a middleware to the HTTP stack
    pub fn with(self, middleware: impl Middleware) -> Self {
        self.with_arc(Arc::new(middleware))
    }

    /// Adds a shared middleware to the HTTP stack
    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Constructs the client
    ///
    /// Nothing is loaded and no connection is opened until the first operation.
    ///
    /// # Errors
    ///
    /// Fails if a configured endpoint is not a valid URL or the user agent is not a valid
    /// header value.
    pub fn build(self) -> Result<PetsSeriesClient<C>> {
        let endpoints = Endpoints::resolve(&self.config)?;
        let user_agent = HeaderValue::from_str(&self.config.user_agent)?;
        let timeout = self.config.request_timeout();

        let store = self.store.unwrap_or_else(default_store);
        let mut authority = TokenAuthority::new(endpoints.token.clone(), store)
            .with_timeout(timeout)
            .with_user_agent(self.config.user_agent.clone());
        if let Some((access_token, refresh_token)) = self.tokens {
            authority = authority.with_tokens(access_token, refresh_token);
        }

        Ok(PetsSeriesClient {
            endpoints,
            auth: Mutex::new(authority.with_clock(self.clock)),
            session: Session::new(timeout, user_agent, self.middleware),
        })
    }
}

#[cfg(feature = "file")]
fn default_store() -> Box<dyn CredentialStore> {
    Box::new(petsseries_auth::store::FileCredentialStore::new(
        DEFAULT_CREDENTIAL_FILE,
    ))
}

#[cfg(not(feature = "file"))]
fn default_store() -> Box<dyn CredentialStore> {
    tracing::warn!("no credential store configured, credentials will not outlive the process");
    Box::new(petsseries_auth::store::InMemoryCredentialStore::new())
}
