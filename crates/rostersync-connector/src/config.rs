//! Connector configuration value types.
//!
//! These structs are deserialized from the operator's connector settings and
//! validated before a run starts. Credentials stay wrapped in
//! [`secrecy::SecretString`] and are only exposed at the request-building
//! site.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{RosterError, RosterResult};
use crate::identity::IdentityType;
use crate::normalize::NormalizerOptions;
use crate::spec::{ResourceKind, RoleFilter, RosterDialect, SpecOptions};

/// Connection settings shared by both dialects.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the roster API.
    pub host: String,

    /// OAuth2 client id, for backends that exchange credentials for a token.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: Option<SecretString>,

    /// Pre-issued bearer token. Wins over client credentials when both are
    /// supplied.
    #[serde(default)]
    pub access_token: Option<SecretString>,

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

fn default_page_size() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client_id: None,
            client_secret: None,
            access_token: None,
            page_size: default_page_size(),
            max_records: 0,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set OAuth2 client credentials.
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set a pre-issued bearer token.
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

    /// Validate host and credential presence.
    pub fn validate(&self) -> RosterResult<()> {
        if self.host.is_empty() {
            return Err(RosterError::config("host is required"));
        }
        url::Url::parse(&self.host)
            .map_err(|e| RosterError::config(format!("invalid host URL: {e}")))?;
        if self.page_size == 0 {
            return Err(RosterError::config("page_size must be positive"));
        }
        let has_client_credentials = self.client_id.is_some() && self.client_secret.is_some();
        if !has_client_credentials && self.access_token.is_none() {
            return Err(RosterError::config(
                "either client_id/client_secret or access_token is required",
            ));
        }
        Ok(())
    }
}

/// Group-spec and record-schema settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Record field holding the stable unique key.
    #[serde(default = "default_key_identifier")]
    pub key_identifier: String,

    /// Listing field compared against configured resource names. `None`
    /// lets the backend pick its kind-specific default.
    #[serde(default)]
    pub match_groups_by: Option<String>,

    /// Role used for the unfiltered all-users pass.
    #[serde(default = "default_all_users_filter")]
    pub all_users_filter: String,

    /// Resource kind assigned to bare group specs.
    #[serde(default = "default_group_filter")]
    pub default_group_filter: String,

    /// Role filter assigned to bare group specs.
    #[serde(default = "default_user_filter")]
    pub default_user_filter: String,

    /// Delimiter between group spec parts.
    #[serde(default = "default_group_delimiter")]
    pub group_delimiter: String,

    /// Field → allowed-values inclusion filter.
    #[serde(default)]
    pub include_only: BTreeMap<String, String>,
}

fn default_key_identifier() -> String {
    "sourcedId".to_string()
}

fn default_all_users_filter() -> String {
    "users".to_string()
}

fn default_group_filter() -> String {
    "classes".to_string()
}

fn default_user_filter() -> String {
    "students".to_string()
}

fn default_group_delimiter() -> String {
    "::".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            key_identifier: default_key_identifier(),
            match_groups_by: None,
            all_users_filter: default_all_users_filter(),
            default_group_filter: default_group_filter(),
            default_user_filter: default_user_filter(),
            group_delimiter: default_group_delimiter(),
            include_only: BTreeMap::new(),
        }
    }
}

impl SchemaConfig {
    /// Resolve the all-users role filter.
    pub fn all_users_role(&self) -> RosterResult<RoleFilter> {
        RoleFilter::parse(&self.all_users_filter.to_lowercase()).ok_or_else(|| {
            RosterError::config(format!(
                "invalid all_users_filter '{}'",
                self.all_users_filter
            ))
        })
    }

    /// Build the spec parser options for a dialect.
    pub fn spec_options(&self, dialect: RosterDialect) -> RosterResult<SpecOptions> {
        let kind = ResourceKind::parse(&self.default_group_filter.to_lowercase())
            .ok_or_else(|| {
                RosterError::config(format!(
                    "invalid default_group_filter '{}'",
                    self.default_group_filter
                ))
            })?;
        let role = RoleFilter::parse(&self.default_user_filter.to_lowercase()).ok_or_else(|| {
            RosterError::config(format!(
                "invalid default_user_filter '{}'",
                self.default_user_filter
            ))
        })?;
        Ok(SpecOptions::new(dialect)
            .with_delimiter(self.group_delimiter.clone())
            .with_defaults(kind, role))
    }
}

/// Per-field template strings for the normalizer.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMappings {
    #[serde(default = "default_email_format")]
    pub user_email_format: Option<String>,
    #[serde(default = "default_given_name_format")]
    pub user_given_name_format: Option<String>,
    #[serde(default = "default_surname_format")]
    pub user_surname_format: Option<String>,
    #[serde(default)]
    pub user_country_code_format: Option<String>,
    #[serde(default)]
    pub user_username_format: Option<String>,
    #[serde(default)]
    pub user_domain_format: Option<String>,
    #[serde(default)]
    pub user_identity_type_format: Option<String>,
    /// Default identity type when the record renders none.
    #[serde(default)]
    pub user_identity_type: Option<String>,
    /// Default country code when the record renders none.
    #[serde(default)]
    pub default_country_code: Option<String>,
}

fn default_email_format() -> Option<String> {
    Some("{email}".to_string())
}

fn default_given_name_format() -> Option<String> {
    Some("{givenName}".to_string())
}

fn default_surname_format() -> Option<String> {
    Some("{familyName}".to_string())
}

impl Default for FieldMappings {
    fn default() -> Self {
        Self {
            user_email_format: default_email_format(),
            user_given_name_format: default_given_name_format(),
            user_surname_format: default_surname_format(),
            user_country_code_format: None,
            user_username_format: None,
            user_domain_format: None,
            user_identity_type_format: None,
            user_identity_type: None,
            default_country_code: None,
        }
    }
}

/// Complete connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    /// Backend dialect selection.
    pub platform: RosterDialect,

    pub connection: ConnectionConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(flatten)]
    pub fields: FieldMappings,
}

impl RosterConfig {
    pub fn new(platform: RosterDialect, connection: ConnectionConfig) -> Self {
        Self {
            platform,
            connection,
            schema: SchemaConfig::default(),
            fields: FieldMappings::default(),
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> RosterResult<()> {
        self.connection.validate()?;
        self.schema.all_users_role()?;
        self.schema.spec_options(self.platform)?;
        if let Some(identity) = &self.fields.user_identity_type {
            IdentityType::parse(identity)?;
        }
        Ok(())
    }

    /// Build the normalizer options, with the given extended attributes.
    pub fn normalizer_options(
        &self,
        extended_attributes: Vec<String>,
    ) -> RosterResult<NormalizerOptions> {
        let default_identity_type = self
            .fields
            .user_identity_type
            .as_deref()
            .map(IdentityType::parse)
            .transpose()?;
        Ok(NormalizerOptions {
            key_identifier: self.schema.key_identifier.clone(),
            email_format: self.fields.user_email_format.clone(),
            identity_type_format: self.fields.user_identity_type_format.clone(),
            username_format: self.fields.user_username_format.clone(),
            domain_format: self.fields.user_domain_format.clone(),
            given_name_format: self.fields.user_given_name_format.clone(),
            surname_format: self.fields.user_surname_format.clone(),
            country_format: self.fields.user_country_code_format.clone(),
            default_identity_type,
            default_country: self.fields.default_country_code.clone(),
            include_only: self.schema.include_only.clone(),
            extended_attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionConfig {
        ConnectionConfig::new("https://district.oneroster.example/ims/oneroster/v1p1/")
            .with_client_credentials("0fc7e35773c1fffd32579507", "10332e330b2e364020179021")
    }

    #[test]
    fn connection_requires_credentials() {
        let bare = ConnectionConfig::new("https://roster.example/api/");
        assert!(bare.validate().is_err());
        assert!(connection().validate().is_ok());

        let token = ConnectionConfig::new("https://roster.example/api/")
            .with_access_token("2ad79b29-af22-42be-8c15-f777369eb726");
        assert!(token.validate().is_ok());
    }

    #[test]
    fn connection_rejects_bad_hosts() {
        let config = ConnectionConfig::new("not-a-url").with_access_token("t");
        assert!(config.validate().is_err());
    }

    #[test]
    fn schema_defaults_match_the_connector_conventions() {
        let schema = SchemaConfig::default();
        assert_eq!(schema.key_identifier, "sourcedId");
        assert_eq!(schema.group_delimiter, "::");
        assert_eq!(schema.all_users_role().unwrap(), RoleFilter::Users);

        let options = schema.spec_options(RosterDialect::Classlink).unwrap();
        assert_eq!(options.default_kind, ResourceKind::Class);
        assert_eq!(options.default_role, RoleFilter::Students);
    }

    #[test]
    fn config_deserializes_from_settings_json() {
        let config: RosterConfig = serde_json::from_value(serde_json::json!({
            "platform": "classlink",
            "connection": {
                "host": "https://roster.example/ims/oneroster/v1p1/",
                "client_id": "id",
                "client_secret": "secret",
                "page_size": 500
            },
            "schema": {
                "key_identifier": "sourcedId",
                "include_only": {"role": "student"}
            },
            "user_email_format": "{email}",
            "user_identity_type": "federatedID"
        }))
        .unwrap();

        assert_eq!(config.platform, RosterDialect::Classlink);
        assert_eq!(config.connection.page_size, 500);
        assert!(config.validate().is_ok());

        let options = config.normalizer_options(vec!["sms".into()]).unwrap();
        assert_eq!(options.default_identity_type, Some(IdentityType::Federated));
        assert_eq!(options.extended_attributes, ["sms"]);
    }

    #[test]
    fn invalid_default_identity_type_fails_validation() {
        let mut config = RosterConfig::new(RosterDialect::Clever, connection());
        config.fields.user_identity_type = Some("ldap".into());
        assert!(config.validate().is_err());
    }
}
