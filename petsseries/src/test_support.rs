//! A scripted stand-in for the identity provider and the PetsSeries backend

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use petsseries_auth::clock::UnixTime;
use reqwest::{header::HeaderMap, Method, Request, Response};
use reqwest_middleware::{Middleware, Next};
use serde_json::Value;

use crate::Config;

pub(crate) const NOW: UnixTime = UnixTime(1_700_000_000);
pub(crate) const TOKEN_PATH: &str = "/oidc/token";

const HOST: &str = "https://petsseries.test";

/// An unsigned JWT carrying the claims the token authority reads
pub(crate) fn jwt(client_id: &str, exp: UnixTime) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"client_id":"{client_id}","exp":{exp},"sub":"user"}}"#
    ));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub(crate) fn json(&self) -> Value {
        serde_json::from_slice(self.body.as_deref().unwrap_or_default()).unwrap()
    }

    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        let url = url::Url::parse(&format!("{HOST}/?{}", self.query.as_deref().unwrap_or("")))
            .unwrap();
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

#[derive(Clone)]
struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    delay: Option<Duration>,
}

/// Terminal middleware that answers requests from a routing table instead of the network
///
/// Unrouted requests are answered with `404 Not Found`.
#[derive(Default)]
pub(crate) struct MockBackend {
    routes: Mutex<HashMap<(Method, String), Canned>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A configuration whose endpoints all point at this backend
    pub(crate) fn config(&self) -> Config {
        Config::default()
            .with_token_url(format!("{HOST}{TOKEN_PATH}"))
            .with_user_info_url(format!("{HOST}/oidc/userinfo"))
            .with_consumer_url(format!("{HOST}/api/petsseries/consumer"))
            .with_homes_url(format!("{HOST}/api/v1/home-management/available-homes"))
            .with_base_url(HOST)
    }

    pub(crate) fn respond(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: impl Into<String>,
    ) {
        self.route(method, path, status, Vec::new(), body.into(), None);
    }

    pub(crate) fn respond_delayed(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: impl Into<String>,
        delay: Duration,
    ) {
        self.route(method, path, status, Vec::new(), body.into(), Some(delay));
    }

    pub(crate) fn respond_with_headers(
        &self,
        method: Method,
        path: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: impl Into<String>,
    ) {
        let headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        self.route(method, path, status, headers, body.into(), None);
    }

    fn route(
        &self,
        method: Method,
        path: &str,
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
        delay: Option<Duration>,
    ) {
        self.routes.lock().unwrap().insert(
            (method, path.to_owned()),
            Canned {
                status,
                headers,
                body,
                delay,
            },
        );
    }

    pub(crate) fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub(crate) fn calls(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub(crate) fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// The most recent request that did not go to the token endpoint
    pub(crate) fn last_backend_request(&self) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path != TOKEN_PATH)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Middleware for MockBackend {
    async fn handle(
        &self,
        req: Request,
        _: &mut http::Extensions,
        _: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let recorded = RecordedRequest {
            method: req.method().clone(),
            path: req.url().path().to_owned(),
            query: req.url().query().map(str::to_owned),
            headers: req.headers().clone(),
            body: req.body().and_then(|b| b.as_bytes()).map(<[u8]>::to_vec),
        };
        let key = (recorded.method.clone(), recorded.path.clone());
        self.requests.lock().unwrap().push(recorded);

        let canned = self.routes.lock().unwrap().get(&key).cloned();
        let Some(canned) = canned else {
            let resp = http::Response::builder()
                .status(404)
                .body(String::from("no route"))
                .unwrap();
            return Ok(resp.into());
        };

        if let Some(delay) = canned.delay {
            tokio::time::sleep(delay).await;
        }

        let mut resp = http::Response::builder().status(canned.status);
        for (name, value) in &canned.headers {
            resp = resp.header(name.as_str(), value.as_str());
        }
        Ok(resp.body(canned.body).unwrap().into())
    }
}
