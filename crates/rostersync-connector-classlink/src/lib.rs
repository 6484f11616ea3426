//! ClassLink OneRoster v1.1 backend.
//!
//! Implements the `RosterClient` contract against a OneRoster v1.1 server:
//!
//! - `OAuth2` client-credentials token exchange with cached expiry, or a
//!   pre-issued bearer token
//! - `limit`/`offset` paging with `Link` header relations (`next`, `last`)
//!   and the `x-count` remaining-count header
//! - name matching case-folded with all whitespace stripped (the server's
//!   display names are free-form; operators rarely type them exactly)
//! - resources: `classes`, `courses` (two-hop through each course's class
//!   listing), `schools`, plus the global user listings
//!
//! # Example
//!
//! ```ignore
//! use rostersync_connector::prelude::*;
//! use rostersync_connector_classlink::{ClasslinkClient, ClasslinkConfig};
//!
//! let config = ClasslinkConfig::new("https://district.oneroster.example/ims/oneroster/v1p1/")
//!     .with_client_credentials("client-id", "client-secret")
//!     .with_token_url("https://launchpad.classlink.example/oauth2/v2/token");
//! let client = ClasslinkClient::new(config)?;
//! let records = client
//!     .fetch_members(ResourceKind::Class, "algebra i - fall", RoleFilter::Students)
//!     .await?;
//! ```

mod auth;
mod client;
mod config;

pub use auth::{TokenCache, TokenSource};
pub use client::ClasslinkClient;
pub use config::ClasslinkConfig;
