//! Clever backend.
//!
//! Implements the `RosterClient` contract against the Clever API:
//!
//! - pre-issued district bearer token authentication
//! - cursor paging: each page's `links` carry a `next` relation whose URI
//!   embeds the `starting_after` cursor for the following request
//! - record envelope `{"data": [{"data": {...}}, ...]}`
//! - name matching case-folded with whitespace preserved; the match field is
//!   configurable (`name`, `sis_id`, `course`, ...)
//! - resources: `sections` (the dialect's native class kind), `schools`,
//!   `courses` (two-hop through each course's section listing)
//!
//! Clever has no aggregate member endpoint, so a `users` role filter is
//! answered by concatenating the students and teachers listings.
//!
//! # Example
//!
//! ```ignore
//! use rostersync_connector::prelude::*;
//! use rostersync_connector_clever::{CleverClient, CleverConfig};
//!
//! let config = CleverConfig::new("https://api.clever.example/v1.1/")
//!     .with_access_token("district-token");
//! let client = CleverClient::new(config)?;
//! let records = client
//!     .fetch_members(ResourceKind::Section, "class 202, homeroom - jones - 0", RoleFilter::Users)
//!     .await?;
//! ```

mod client;
mod config;

pub use client::CleverClient;
pub use config::CleverConfig;
