//! Client for the Bloomreach Engagement (Exponea) private API.
//!
//! Covers the three calls the commerce bridge needs: transactional email,
//! transactional SMS and customer event tracking. Every request is a single
//! authenticated `POST` with a JSON body; optional fields left unset are never
//! serialized because the platform treats "omitted" and "empty" differently.
pub mod auth;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod types;

pub use auth::{Credentials, build_auth_header};
pub use client::{BloomreachClient, DEFAULT_API_BASE, EngagementApi};
pub use error::ApiError;
pub use types::*;
