//! Token lifecycle management for the PetsSeries cloud client
//!
//! The PetsSeries backend authenticates every call with a short-lived bearer token issued by
//! an OpenID Connect provider. This crate owns everything needed to keep such a token usable:
//!
//! * a [`CredentialStore`][store::CredentialStore] that durably persists the
//!   `{access_token, refresh_token}` pair, with a file-backed implementation that replaces the
//!   document atomically,
//! * unverified decoding of the access token's [claims][claims::TokenClaims], which is how the
//!   client learns the token's expiry and the OAuth2 client identifier to refresh with,
//! * a [`TokenAuthority`] that loads tokens on first use, judges freshness against a
//!   [`Clock`][clock::Clock], and performs the refresh-token exchange when the access token has
//!   expired.
//!
//! The authority is not internally synchronized: it takes `&mut self` for every
//! state transition. A caller that shares it between tasks must put it behind a single
//! asynchronous lock so that at most one refresh exchange is ever in flight. Two concurrent
//! exchanges with the same refresh token can each invalidate the other's result at the provider.
//! The exchange itself runs on a spawned task, so a caller cancelled mid-refresh leaves it to
//! the next caller, which awaits the same exchange rather than sending the token again.
//!
//! ```
//! use petsseries_auth::{store::InMemoryCredentialStore, TokenAuthority};
//!
//! let token_url = reqwest::Url::parse("https://accounts.example.com/oidc/token").unwrap();
//! let authority = TokenAuthority::new(token_url, InMemoryCredentialStore::new())
//!     .with_tokens("access-token", "refresh-token");
//!
//! assert!(!authority.is_loaded());
//! ```
//!
//! # Features
//!
//! * `file` (default): provides [`FileCredentialStore`][store::FileCredentialStore].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authority;
mod braids;
pub mod claims;
pub mod clock;
mod error;
pub mod store;

pub use authority::{CurrentToken, TokenAuthority, TokenStatus};
pub use braids::*;
pub use error::{AuthError, RefreshError, StoreError, TokenDecodeError};
