//! Clever connector configuration.

use secrecy::SecretString;
use serde::Deserialize;

use rostersync_connector::client::NameMatching;
use rostersync_connector::config::RosterConfig;
use rostersync_connector::error::{RosterError, RosterResult};
use rostersync_connector::spec::RosterDialect;

/// Configuration for a Clever connection.
#[derive(Debug, Clone, Deserialize)]
pub struct CleverConfig {
    /// Base URL of the Clever API, e.g. `https://api.clever.com/v1.1/`.
    pub host: String,

    /// Pre-issued district bearer token.
    pub access_token: SecretString,

    /// Record field holding the stable unique key.
    #[serde(default = "default_key_identifier")]
    pub key_identifier: String,

    /// Listing field compared against configured resource names.
    /// Sections can also be matched by `sis_id` or `course`.
    #[serde(default = "default_match_groups_by")]
    pub match_groups_by: String,

    /// Name normalization policy.
    #[serde(default = "default_name_matching")]
    pub name_matching: NameMatching,

    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Global record cap across member listings; zero means unlimited.
    #[serde(default)]
    pub max_records: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_key_identifier() -> String {
    "id".to_string()
}

fn default_match_groups_by() -> String {
    "name".to_string()
}

fn default_name_matching() -> NameMatching {
    NameMatching::FoldCase
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl CleverConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            access_token: SecretString::new(String::new()),
            key_identifier: default_key_identifier(),
            match_groups_by: default_match_groups_by(),
            name_matching: default_name_matching(),
            page_size: default_page_size(),
            max_records: 0,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Build from the shared connector configuration. Clever only accepts a
    /// pre-issued district token.
    pub fn from_roster(config: &RosterConfig) -> RosterResult<Self> {
        if config.platform != RosterDialect::Clever {
            return Err(RosterError::config(format!(
                "platform '{}' is not clever",
                config.platform
            )));
        }
        let Some(token) = &config.connection.access_token else {
            return Err(RosterError::config(
                "clever requires a pre-issued access_token",
            ));
        };
        let mut out = Self::new(config.connection.host.clone());
        out.access_token = token.clone();
        out.key_identifier = config.schema.key_identifier.clone();
        if let Some(field) = &config.schema.match_groups_by {
            out.match_groups_by = field.clone();
        }
        out.page_size = config.connection.page_size;
        out.max_records = config.connection.max_records;
        out.timeout_secs = config.connection.timeout_secs;
        Ok(out)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = SecretString::new(token.into());
        self
    }

    pub fn with_match_groups_by(mut self, field: impl Into<String>) -> Self {
        self.match_groups_by = field.into();
        self
    }

    pub fn with_name_matching(mut self, policy: NameMatching) -> Self {
        self.name_matching = policy;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Validate host, token, and paging settings.
    pub fn validate(&self) -> RosterResult<()> {
        use secrecy::ExposeSecret;

        if self.host.is_empty() {
            return Err(RosterError::config("host is required"));
        }
        url::Url::parse(&self.host)
            .map_err(|e| RosterError::config(format!("invalid host URL: {e}")))?;
        if self.access_token.expose_secret().is_empty() {
            return Err(RosterError::config("access_token is required"));
        }
        if self.page_size == 0 {
            return Err(RosterError::config("page_size must be positive"));
        }
        Ok(())
    }
}
