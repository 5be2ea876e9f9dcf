use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

const TOKEN_URL: &str = "https://cdc.accounts.home.id/oidc/op/v1.0/4_JGZWlP8eQHpEqkvQElolbA/token";
const USER_INFO_URL: &str =
    "https://cdc.accounts.home.id/oidc/op/v1.0/4_JGZWlP8eQHpEqkvQElolbA/userinfo";
const CONSUMER_URL: &str = "https://nbx-discovery.prod.eu-hs.iot.versuni.com/api/petsseries/consumer";
const HOMES_URL: &str = "https://petsseries-backend.prod.eu-hs.iot.versuni.com/api/v1/home-management/available-homes";
const BASE_URL: &str = "https://petsseries-backend.prod.eu-hs.iot.versuni.com";
const USER_AGENT: &str = "UnofficialPetsSeriesClient/1.0";

/// Endpoints and transport settings for a [`PetsSeriesClient`][crate::PetsSeriesClient]
///
/// The default configuration points at the production PetsSeries cloud. Every field can be
/// overridden, either through the `with_*` methods or by deserializing a configuration file,
/// in which case missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The OAuth2 token endpoint used for refresh exchanges
    pub token_url: String,
    /// The OpenID Connect userinfo endpoint
    pub user_info_url: String,
    /// The consumer discovery endpoint
    pub consumer_url: String,
    /// The endpoint listing the homes available to the user
    pub homes_url: String,
    /// The root of the home, meal, device and event resources
    pub base_url: String,
    /// The total deadline for each request, in seconds
    pub request_timeout_secs: u64,
    /// The `User-Agent` sent with every request
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_owned(),
            user_info_url: USER_INFO_URL.to_owned(),
            consumer_url: CONSUMER_URL.to_owned(),
            homes_url: HOMES_URL.to_owned(),
            base_url: BASE_URL.to_owned(),
            request_timeout_secs: 10,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl Config {
    /// Sets the OAuth2 token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the userinfo endpoint
    pub fn with_user_info_url(mut self, url: impl Into<String>) -> Self {
        self.user_info_url = url.into();
        self
    }

    /// Sets the consumer discovery endpoint
    pub fn with_consumer_url(mut self, url: impl Into<String>) -> Self {
        self.consumer_url = url.into();
        self
    }

    /// Sets the available-homes endpoint
    pub fn with_homes_url(mut self, url: impl Into<String>) -> Self {
        self.homes_url = url.into();
        self
    }

    /// Sets the root of the resource endpoints
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the total deadline for each request
    ///
    /// Sub-second precision is discarded; a zero deadline is raised to one second.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Sets the `User-Agent` header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The total deadline for each request, never shorter than one second
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Parsed endpoint URLs
#[derive(Clone, Debug)]
pub(crate) struct Endpoints {
    pub(crate) token: Url,
    pub(crate) user_info: Url,
    pub(crate) consumer: Url,
    pub(crate) homes: Url,
    base: Url,
}

fn parse(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_owned(),
        source,
    })
}

impl Endpoints {
    pub(crate) fn resolve(config: &Config) -> Result<Self> {
        let base = parse(&config.base_url)?;
        if base.cannot_be_a_base() {
            return Err(Error::NotABaseUrl(config.base_url.clone()));
        }

        Ok(Self {
            token: parse(&config.token_url)?,
            user_info: parse(&config.user_info_url)?,
            consumer: parse(&config.consumer_url)?,
            homes: parse(&config.homes_url)?,
            base,
        })
    }

    /// Appends `segments` to the base URL's path, percent-encoding each one
    pub(crate) fn resource(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::NotABaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn home(&self, home_id: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["api", "homes", home_id];
        segments.extend_from_slice(rest);
        self.resource(&segments)
    }
}
