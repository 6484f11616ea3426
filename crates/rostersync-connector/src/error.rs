//! Roster connector error types
//!
//! Error definitions with configuration/transport classification: configuration
//! errors abort the run before any fetch, transport errors abort the fetch in
//! progress, and everything softer is reported through `tracing` warnings
//! rather than this enum.

use thiserror::Error;

/// Error that can occur during roster ingestion.
#[derive(Debug, Error)]
pub enum RosterError {
    // Configuration errors (fatal to the run)
    /// A group spec contained the delimiter but did not split into three
    /// non-empty parts.
    #[error("invalid group spec syntax: '{spec}' (expected <kind>{delimiter}<name>{delimiter}<role>)")]
    InvalidSpecSyntax { spec: String, delimiter: String },

    /// The resource kind of a group spec is not in the closed set.
    #[error("unknown resource kind '{kind}' in group spec '{spec}', valid are: {allowed}")]
    UnknownResourceKind {
        kind: String,
        spec: String,
        allowed: String,
    },

    /// The role filter of a group spec is not in the closed set.
    #[error("unknown role filter '{role}' in group spec '{spec}', valid are: students, teachers, users")]
    UnknownRoleFilter { role: String, spec: String },

    /// An identity type value is not in the supported set.
    #[error("unrecognized identity type '{value}', valid are: federated, enterprise, standard")]
    InvalidIdentityType { value: String },

    /// Connector configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    // Transport errors (fatal to the fetch in progress)
    /// The roster API answered with a non-success status.
    #[error("roster API error: status {status}: {message}")]
    Api { status: u16, message: String },

    /// Token acquisition or refresh failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A required attribute value was not valid text.
    #[error("encoding error in value of attribute '{attribute}': {message}")]
    Encoding { attribute: String, message: String },
}

impl RosterError {
    /// True for errors caused by operator-supplied configuration; retrying
    /// the run without a config change cannot succeed.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RosterError::InvalidSpecSyntax { .. }
                | RosterError::UnknownResourceKind { .. }
                | RosterError::UnknownRoleFilter { .. }
                | RosterError::InvalidIdentityType { .. }
                | RosterError::Config(_)
        )
    }

    /// True for errors raised while talking to the roster API. These abort
    /// the fetch in progress; retry policy belongs to the caller.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RosterError::Api { .. }
                | RosterError::Auth(_)
                | RosterError::Http(_)
                | RosterError::Json(_)
        )
    }

    /// Create an API error from a status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        RosterError::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        RosterError::Config(message.into())
    }
}

/// Result type for roster operations.
pub type RosterResult<T> = Result<T, RosterError>;
