use std::{fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use bytes::{BufMut, BytesMut};
use petsseries_auth::CurrentToken;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest_middleware::{ClientWithMiddleware, Middleware};
use tokio::sync::OnceCell;

use crate::{Error, Result};

/// The headers sent with every backend request, built for one access token generation
#[derive(Debug)]
pub(crate) struct BearerHeaders {
    pub(crate) generation: u64,
    pub(crate) headers: HeaderMap,
}

/// The connection context shared by every request of one client
///
/// The pooled HTTP client is created on first use. The bearer headers are rebuilt only when
/// the token authority reports a new token generation.
pub(crate) struct Session {
    timeout: Duration,
    user_agent: HeaderValue,
    middleware: Vec<Arc<dyn Middleware>>,
    http: OnceCell<ClientWithMiddleware>,
    headers: ArcSwapOption<BearerHeaders>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("timeout", &self.timeout)
            .field("middleware", &self.middleware.len())
            .field("connected", &self.http.initialized())
            .field(
                "generation",
                &self.headers.load_full().map(|h| h.generation),
            )
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        timeout: Duration,
        user_agent: HeaderValue,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        Self {
            timeout,
            user_agent,
            middleware,
            http: OnceCell::new(),
            headers: ArcSwapOption::empty(),
        }
    }

    #[inline]
    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The pooled HTTP client, created on first use
    pub(crate) async fn http(&self) -> Result<&ClientWithMiddleware> {
        self.http
            .get_or_try_init(|| async {
                let client = reqwest::Client::builder()
                    .timeout(self.timeout)
                    .gzip(true)
                    .build()
                    .map_err(Error::Client)?;

                let client = self
                    .middleware
                    .iter()
                    .fold(reqwest_middleware::ClientBuilder::new(client), |b, m| {
                        b.with_arc(m.clone())
                    })
                    .build();

                tracing::debug!("opened HTTP session");
                Ok::<_, Error>(client)
            })
            .await
    }

    /// Headers for `token`, reusing the cached set when the generation has not changed
    pub(crate) fn headers_for(&self, token: CurrentToken<'_>) -> Result<Arc<BearerHeaders>> {
        if let Some(cached) = self.headers.load_full() {
            if cached.generation == token.generation() {
                return Ok(cached);
            }
        }

        let headers = Arc::new(BearerHeaders {
            generation: token.generation(),
            headers: self.build_headers(token)?,
        });
        self.headers.store(Some(headers.clone()));

        tracing::debug!(generation = token.generation(), "rebuilt bearer headers");
        Ok(headers)
    }

    #[cfg(test)]
    pub(crate) fn cached_headers(&self) -> Option<Arc<BearerHeaders>> {
        self.headers.load_full()
    }

    fn build_headers(&self, token: CurrentToken<'_>) -> Result<HeaderMap> {
        const BEARER: &[u8] = b"Bearer ";
        let access_token = token.access_token().as_str().as_bytes();

        let mut bearer = BytesMut::with_capacity(BEARER.len() + access_token.len());
        bearer.put_slice(BEARER);
        bearer.put_slice(access_token);
        let mut authorization = HeaderValue::from_maybe_shared(bearer.freeze())?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        Ok(headers)
    }

    /// Tears the session down
    pub(crate) fn close(self) {
        if self.http.initialized() {
            tracing::info!("closed HTTP session");
        } else {
            tracing::debug!("closed client without opening an HTTP session");
        }
    }
}
