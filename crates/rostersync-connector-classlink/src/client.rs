//! OneRoster v1.1 HTTP client with Link-header pagination.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use rostersync_connector::client::{is_last_page, RecordBudget, RosterClient};
use rostersync_connector::error::{RosterError, RosterResult};
use rostersync_connector::record::RawRecord;
use rostersync_connector::spec::{ResourceKind, RoleFilter, RosterDialect};

use crate::auth::{TokenCache, TokenSource};
use crate::config::ClasslinkConfig;

/// One page of a OneRoster listing.
#[derive(Debug)]
struct PageResponse {
    records: Vec<RawRecord>,
    /// `Link` header `next` relation, absolute or host-relative.
    next: Option<String>,
    /// `x-count` header; informational only, never a termination signal.
    remaining: Option<u64>,
}

/// ClassLink OneRoster v1.1 client.
#[derive(Debug)]
pub struct ClasslinkClient {
    http_client: reqwest::Client,
    config: ClasslinkConfig,
    tokens: TokenSource,
    budget: Mutex<RecordBudget>,
}

impl ClasslinkClient {
    /// Create a client, validating the configuration.
    pub fn new(config: ClasslinkConfig) -> RosterResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RosterError::config(format!("failed to create HTTP client: {e}")))?;

        let tokens = if let Some(token) = &config.access_token {
            if config.client_id.is_some() {
                warn!("access_token supplied, client credentials will not be used");
            }
            TokenSource::Static(token.clone())
        } else {
            let (Some(client_id), Some(client_secret), Some(token_url)) = (
                &config.client_id,
                &config.client_secret,
                &config.token_url,
            ) else {
                return Err(RosterError::config(
                    "either client_id/client_secret or access_token is required",
                ));
            };
            TokenSource::OAuth(TokenCache::new(
                token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
                http_client.clone(),
            ))
        };

        let budget = Mutex::new(if config.max_records > 0 {
            RecordBudget::new(config.max_records)
        } else {
            RecordBudget::unlimited()
        });

        Ok(Self {
            http_client,
            config,
            tokens,
            budget,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.host.trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn first_page(&self, path: &str) -> String {
        format!(
            "{}?limit={}&offset=0",
            self.endpoint(path),
            self.config.page_size
        )
    }

    fn absolute(&self, link: &str) -> RosterResult<String> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        Ok(url::Url::parse(&self.config.host)?.join(link)?.to_string())
    }

    async fn get_page(&self, url: &str) -> RosterResult<PageResponse> {
        let token = self.tokens.bearer().await?;
        debug!("fetching page: {url}");
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        let next = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header)
            .and_then(|mut rels| rels.remove("next"));
        let remaining = response
            .headers()
            .get("x-count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RosterError::api(status.as_u16(), message));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(PageResponse {
            records: collect_records(&body),
            next,
            remaining,
        })
    }

    /// Page through a listing until a last-page signal.
    ///
    /// `counted` marks member listings, which consume the global record
    /// budget; resource lookups never do.
    #[instrument(skip(self))]
    async fn list_pages(&self, path: &str, counted: bool) -> RosterResult<Vec<RawRecord>> {
        let mut url = self.first_page(path);
        let mut records = Vec::new();
        loop {
            if counted && self.budget.lock().unwrap().is_exhausted() {
                debug!("record cap reached, stopping pagination");
                break;
            }
            let page = self.get_page(&url).await?;
            let returned = page.records.len();
            if let Some(remaining) = page.remaining {
                debug!("page returned {returned} records, x-count {remaining}");
            }
            let admitted = if counted {
                self.budget.lock().unwrap().admit(page.records)
            } else {
                page.records
            };
            records.extend(admitted);

            let has_next = page.next.is_some();
            if is_last_page(returned, self.config.page_size, has_next) {
                break;
            }
            // has_next is true here
            url = self.absolute(&page.next.unwrap_or_default())?;
        }
        Ok(records)
    }

    /// Resolve a resource name to backend keys across the full listing.
    ///
    /// Every entry whose match field equals the name under the configured
    /// normalization contributes its key; ambiguity is permitted.
    #[instrument(skip(self))]
    async fn resolve_keys(&self, kind: ResourceKind, name: &str) -> RosterResult<Vec<String>> {
        let path = match kind {
            ResourceKind::Class | ResourceKind::Section => "classes",
            ResourceKind::Course => "courses",
            ResourceKind::School => "schools",
        };
        let listing = self.list_pages(path, false).await?;

        let field = self.config.match_field(kind);
        let policy = self.config.name_matching;
        let wanted = policy.normalize(name);

        let mut keys = Vec::new();
        for record in &listing {
            let Some(value) = record.scalar(field)? else {
                warn!("no property '{field}' found on {kind} for entity '{name}'");
                continue;
            };
            if policy.normalize(&value) != wanted {
                continue;
            }
            match record.scalar(&self.config.key_identifier)? {
                Some(key) => keys.push(key),
                None => warn!(
                    "no '{}' key on matching {kind} entry for '{name}'",
                    self.config.key_identifier
                ),
            }
        }
        if keys.is_empty() {
            warn!("no objects found for {kind}: {name}");
        }
        Ok(keys)
    }

    /// Keys of every class belonging to a course.
    async fn child_classes(&self, course_key: &str) -> RosterResult<Vec<String>> {
        let listing = self
            .list_pages(&format!("courses/{course_key}/classes"), false)
            .await?;
        let mut keys = Vec::new();
        for record in &listing {
            if let Some(key) = record.scalar(&self.config.key_identifier)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl RosterClient for ClasslinkClient {
    fn dialect(&self) -> RosterDialect {
        RosterDialect::Classlink
    }

    async fn fetch_members(
        &self,
        kind: ResourceKind,
        name: &str,
        role: RoleFilter,
    ) -> RosterResult<Vec<RawRecord>> {
        let mut members = Vec::new();
        match kind {
            ResourceKind::Course => {
                for course in self.resolve_keys(kind, name).await? {
                    for class in self.child_classes(&course).await? {
                        members.extend(
                            self.list_pages(&format!("classes/{class}/{role}"), true).await?,
                        );
                    }
                }
            }
            ResourceKind::School => {
                for school in self.resolve_keys(kind, name).await? {
                    members.extend(
                        self.list_pages(&format!("schools/{school}/{role}"), true).await?,
                    );
                }
            }
            ResourceKind::Class | ResourceKind::Section => {
                for class in self.resolve_keys(kind, name).await? {
                    members.extend(
                        self.list_pages(&format!("classes/{class}/{role}"), true).await?,
                    );
                }
            }
        }
        Ok(members)
    }

    async fn fetch_all_users(&self, role: RoleFilter) -> RosterResult<Vec<RawRecord>> {
        self.list_pages(role.as_str(), true).await
    }
}

/// Parse a `Link` header into its relation map.
fn parse_link_header(value: &str) -> BTreeMap<String, String> {
    let mut rels = BTreeMap::new();
    for part in value.split(',') {
        let mut pieces = part.split(';');
        let Some(url) = pieces.next() else { continue };
        let url = url.trim().trim_start_matches('<').trim_end_matches('>');
        for param in pieces {
            let param = param.trim();
            if let Some(rel) = param
                .strip_prefix("rel=")
                .map(|r| r.trim_matches('"').to_string())
            {
                rels.insert(rel, url.to_string());
            }
        }
    }
    rels
}

/// Collect records from a OneRoster response document.
///
/// Responses are keyed by resource-type name (`{"students": [...]}`,
/// `{"orgs": [...]}`); every top-level array contributes its objects.
fn collect_records(doc: &serde_json::Value) -> Vec<RawRecord> {
    let mut records = Vec::new();
    if let serde_json::Value::Object(map) = doc {
        for value in map.values() {
            if let serde_json::Value::Array(items) = value {
                records.extend(items.iter().map(RawRecord::from_json));
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn link_header_relations_are_parsed() {
        let header = "<https://roster.example/classes?limit=2&offset=2>; rel=\"next\", \
                      <https://roster.example/classes?limit=2&offset=4>; rel=\"last\"";
        let rels = parse_link_header(header);
        assert_eq!(
            rels.get("next").map(String::as_str),
            Some("https://roster.example/classes?limit=2&offset=2")
        );
        assert_eq!(
            rels.get("last").map(String::as_str),
            Some("https://roster.example/classes?limit=2&offset=4")
        );
    }

    #[test]
    fn link_header_without_quotes_is_parsed() {
        let rels = parse_link_header("<https://roster.example/users?offset=10>; rel=next");
        assert_eq!(
            rels.get("next").map(String::as_str),
            Some("https://roster.example/users?offset=10")
        );
    }

    #[test]
    fn records_are_collected_from_any_top_level_array() {
        let doc = json!({
            "students": [{"sourcedId": "1"}, {"sourcedId": "2"}],
        });
        assert_eq!(collect_records(&doc).len(), 2);

        let doc = json!({"orgs": [{"sourcedId": "3"}]});
        let records = collect_records(&doc);
        assert_eq!(records[0].scalar("sourcedId").unwrap(), Some("3".into()));

        assert!(collect_records(&json!({"statusInfo": {}})).is_empty());
    }
}
