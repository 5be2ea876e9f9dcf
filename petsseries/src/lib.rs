//! An unofficial async client for the PetsSeries pet feeder cloud
//!
//! The client authenticates with an OAuth2 access token issued to the PetsSeries mobile app
//! and keeps it fresh on its own: every operation first asks the crate's
//! [`TokenAuthority`][petsseries_auth::TokenAuthority] for a valid token, which is refreshed
//! with the stored refresh token when it has expired and persisted back to the configured
//! credential store.
//!
//! Refreshes are single-flight. When many operations run concurrently against one client
//! and the token has just expired, exactly one refresh exchange is performed and every
//! operation uses its result.
//!
//! ```no_run
//! use petsseries::PetsSeriesClient;
//!
//! # async fn run() -> petsseries::Result<()> {
//! let client = PetsSeriesClient::builder()
//!     .credential_file("tokens.json")
//!     .build()?;
//!
//! for home in client.get_homes().await? {
//!     for meal in client.get_meals(&home).await? {
//!         println!("{}: {} at {}", home.name, meal.name, meal.feed_time);
//!     }
//! }
//!
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `default-tls` (default): connect using the platform's native TLS stack.
//! * `rustls-tls`: connect using `rustls` with the platform's root certificates.
//! * `file` (default): persist credentials to a JSON file.

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

mod client;
mod config;
mod error;
pub mod events;
pub mod models;
mod session;

#[cfg(test)]
mod test_support;

pub use client::{ClientBuilder, PetsSeriesClient};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{Event, EventType};
pub use models::DeviceSetting;
pub use petsseries_auth as auth;
