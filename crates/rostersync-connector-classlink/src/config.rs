//! ClassLink connector configuration.

use secrecy::SecretString;
use serde::Deserialize;

use rostersync_connector::client::NameMatching;
use rostersync_connector::config::RosterConfig;
use rostersync_connector::error::{RosterError, RosterResult};
use rostersync_connector::spec::{ResourceKind, RosterDialect};

/// Configuration for a ClassLink OneRoster v1.1 connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ClasslinkConfig {
    /// Base URL of the OneRoster API, e.g.
    /// `https://district.oneroster.example/ims/oneroster/v1p1/`.
    pub host: String,

    /// `OAuth2` token endpoint for the client-credentials exchange.
    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<SecretString>,

    /// Pre-issued bearer token; wins over client credentials.
    #[serde(default)]
    pub access_token: Option<SecretString>,

    /// Record field holding the stable unique key.
    #[serde(default = "default_key_identifier")]
    pub key_identifier: String,

    /// Listing field compared against configured resource names. `None`
    /// uses the kind default: `name` for schools, `title` for classes and
    /// courses.
    #[serde(default)]
    pub match_groups_by: Option<String>,

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
    "sourcedId".to_string()
}

fn default_name_matching() -> NameMatching {
    NameMatching::FoldCaseStripWhitespace
}

fn default_page_size() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClasslinkConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token_url: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            key_identifier: default_key_identifier(),
            match_groups_by: None,
            name_matching: default_name_matching(),
            page_size: default_page_size(),
            max_records: 0,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Build from the shared connector configuration.
    ///
    /// The token endpoint is not part of the shared surface; set it with
    /// [`with_token_url`](Self::with_token_url) when using client
    /// credentials.
    pub fn from_roster(config: &RosterConfig) -> RosterResult<Self> {
        if config.platform != RosterDialect::Classlink {
            return Err(RosterError::config(format!(
                "platform '{}' is not classlink",
                config.platform
            )));
        }
        let mut out = Self::new(config.connection.host.clone());
        out.client_id = config.connection.client_id.clone();
        out.client_secret = config.connection.client_secret.clone();
        out.access_token = config.connection.access_token.clone();
        out.key_identifier = config.schema.key_identifier.clone();
        out.match_groups_by = config.schema.match_groups_by.clone();
        out.page_size = config.connection.page_size;
        out.max_records = config.connection.max_records;
        out.timeout_secs = config.connection.timeout_secs;
        Ok(out)
    }

    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::new(token.into()));
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

    pub fn with_name_matching(mut self, policy: NameMatching) -> Self {
        self.name_matching = policy;
        self
    }

    pub fn with_match_groups_by(mut self, field: impl Into<String>) -> Self {
        self.match_groups_by = Some(field.into());
        self
    }

    /// The listing field matched against configured resource names.
    pub fn match_field(&self, kind: ResourceKind) -> &str {
        match &self.match_groups_by {
            Some(field) => field.as_str(),
            None => match kind {
                ResourceKind::School => "name",
                _ => "title",
            },
        }
    }

    /// Validate host, credentials, and paging settings.
    pub fn validate(&self) -> RosterResult<()> {
        if self.host.is_empty() {
            return Err(RosterError::config("host is required"));
        }
        url::Url::parse(&self.host)
            .map_err(|e| RosterError::config(format!("invalid host URL: {e}")))?;
        if self.page_size == 0 {
            return Err(RosterError::config("page_size must be positive"));
        }
        if self.access_token.is_none() {
            let has_credentials = self.client_id.is_some() && self.client_secret.is_some();
            if !has_credentials {
                return Err(RosterError::config(
                    "either client_id/client_secret or access_token is required",
                ));
            }
            if self.token_url.is_none() {
                return Err(RosterError::config(
                    "token_url is required for the client-credentials exchange",
                ));
            }
        }
        Ok(())
    }
}
