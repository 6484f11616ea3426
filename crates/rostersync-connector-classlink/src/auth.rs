//! `OAuth2` authentication for the OneRoster API.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use rostersync_connector::error::{RosterError, RosterResult};

/// `OAuth2` token response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Cached `OAuth2` access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True when the token is expired or expires within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the client-credentials flow.
#[derive(Debug)]
pub struct TokenCache {
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    /// Grace period before expiry that triggers a refresh.
    grace_period: Duration,
}

impl TokenCache {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            http_client,
            cached_token: RwLock::new(None),
            grace_period: Duration::minutes(5),
        }
    }

    /// Get a valid access token, refreshing when necessary.
    pub async fn get_token(&self) -> RosterResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("refreshing access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Acquire a new token with the client-credentials grant.
    async fn acquire_token(&self) -> RosterResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RosterError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RosterError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| RosterError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);
        debug!("acquired new token, expires at {expires_at}");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidate the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

/// Where the bearer token for API calls comes from.
#[derive(Debug)]
pub enum TokenSource {
    /// Operator-supplied token used as-is.
    Static(SecretString),
    /// Tokens exchanged and refreshed through the `OAuth2` endpoint.
    OAuth(TokenCache),
}

impl TokenSource {
    /// The bearer token to attach to the next request.
    pub async fn bearer(&self) -> RosterResult<String> {
        match self {
            TokenSource::Static(token) => Ok(token.expose_secret().clone()),
            TokenSource::OAuth(cache) => cache.get_token().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_token_expiry_honors_grace() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!token.is_expired(Duration::minutes(5)));
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn already_expired_token_is_expired() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(token.is_expired(Duration::minutes(0)));
    }

    #[tokio::test]
    async fn static_source_returns_the_supplied_token() {
        let source = TokenSource::Static(SecretString::new("fixed".into()));
        assert_eq!(source.bearer().await.unwrap(), "fixed");
    }
}
