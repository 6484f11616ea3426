//! Clever HTTP client with cursor pagination.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use rostersync_connector::client::{is_last_page, RecordBudget, RosterClient};
use rostersync_connector::error::{RosterError, RosterResult};
use rostersync_connector::record::RawRecord;
use rostersync_connector::spec::{ResourceKind, RoleFilter, RosterDialect};

use crate::config::CleverConfig;

/// Paged response envelope: each entry wraps its record in a `data` field,
/// and `links` carries the cursor for the next request.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<Entry>,
    #[serde(default)]
    links: Vec<LinkRel>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LinkRel {
    rel: String,
    uri: String,
}

#[derive(Debug)]
struct PageResponse {
    records: Vec<RawRecord>,
    /// `next` relation URI, carrying the `starting_after` cursor.
    next: Option<String>,
}

/// Clever API client.
#[derive(Debug)]
pub struct CleverClient {
    http_client: reqwest::Client,
    config: CleverConfig,
    budget: Mutex<RecordBudget>,
}

impl CleverClient {
    /// Create a client, validating the configuration.
    pub fn new(config: CleverConfig) -> RosterResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RosterError::config(format!("failed to create HTTP client: {e}")))?;

        let budget = Mutex::new(if config.max_records > 0 {
            RecordBudget::new(config.max_records)
        } else {
            RecordBudget::unlimited()
        });

        Ok(Self {
            http_client,
            config,
            budget,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.host.trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn first_page(&self, path: &str) -> String {
        format!("{}?limit={}", self.endpoint(path), self.config.page_size)
    }

    fn absolute(&self, link: &str) -> RosterResult<String> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        Ok(url::Url::parse(&self.config.host)?.join(link)?.to_string())
    }

    async fn get_page(&self, url: &str) -> RosterResult<PageResponse> {
        debug!("fetching page: {url}");
        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RosterError::api(status.as_u16(), message));
        }

        let envelope: Envelope = response.json().await?;
        let next = envelope
            .links
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| link.uri.clone());
        let records = envelope
            .data
            .iter()
            .map(|entry| RawRecord::from_json(&entry.data))
            .collect();
        Ok(PageResponse { records, next })
    }

    /// Follow the cursor until a last-page signal.
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
            url = self.absolute(&page.next.unwrap_or_default())?;
        }
        Ok(records)
    }

    /// Resolve a resource name to backend keys across the full listing.
    #[instrument(skip(self))]
    async fn resolve_keys(&self, kind: ResourceKind, name: &str) -> RosterResult<Vec<String>> {
        let path = match kind {
            ResourceKind::Class | ResourceKind::Section => "sections",
            ResourceKind::Course => "courses",
            ResourceKind::School => "schools",
        };
        let listing = self.list_pages(path, false).await?;

        let field = self.config.match_groups_by.as_str();
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

    /// Keys of every section belonging to a course.
    async fn child_sections(&self, course_key: &str) -> RosterResult<Vec<String>> {
        let listing = self
            .list_pages(&format!("courses/{course_key}/sections"), false)
            .await?;
        let mut keys = Vec::new();
        for record in &listing {
            if let Some(key) = record.scalar(&self.config.key_identifier)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Member endpoints answering one role filter. There is no aggregate
    /// endpoint, so `users` concatenates students and teachers.
    fn role_paths(role: RoleFilter) -> &'static [&'static str] {
        match role {
            RoleFilter::Students => &["students"],
            RoleFilter::Teachers => &["teachers"],
            RoleFilter::Users => &["students", "teachers"],
        }
    }

    async fn members_of(
        &self,
        base: &str,
        key: &str,
        role: RoleFilter,
    ) -> RosterResult<Vec<RawRecord>> {
        let mut members = Vec::new();
        for role_path in Self::role_paths(role) {
            members.extend(self.list_pages(&format!("{base}/{key}/{role_path}"), true).await?);
        }
        Ok(members)
    }
}

#[async_trait]
impl RosterClient for CleverClient {
    fn dialect(&self) -> RosterDialect {
        RosterDialect::Clever
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
                    for section in self.child_sections(&course).await? {
                        members.extend(self.members_of("sections", &section, role).await?);
                    }
                }
            }
            ResourceKind::School => {
                for school in self.resolve_keys(kind, name).await? {
                    members.extend(self.members_of("schools", &school, role).await?);
                }
            }
            ResourceKind::Class | ResourceKind::Section => {
                for section in self.resolve_keys(kind, name).await? {
                    members.extend(self.members_of("sections", &section, role).await?);
                }
            }
        }
        Ok(members)
    }

    async fn fetch_all_users(&self, role: RoleFilter) -> RosterResult<Vec<RawRecord>> {
        let mut members = Vec::new();
        for role_path in Self::role_paths(role) {
            members.extend(self.list_pages(role_path, true).await?);
        }
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_unwraps_nested_data() {
        let envelope: Envelope = serde_json::from_value(json!({
            "data": [
                {"data": {"id": "58da8c6b894273be680001fc", "name": "Class 003"}, "uri": "/v1.1/sections/58da8c6b894273be680001fc"},
                {"data": {"id": "58da8c6b894273be6800020a", "name": "Class 202"}}
            ],
            "links": [
                {"rel": "self", "uri": "/v1.1/sections?limit=2"},
                {"rel": "next", "uri": "/v1.1/sections?limit=2&starting_after=58da8c6b894273be6800020a"}
            ]
        }))
        .unwrap();

        assert_eq!(envelope.data.len(), 2);
        let record = RawRecord::from_json(&envelope.data[0].data);
        assert_eq!(
            record.scalar("id").unwrap(),
            Some("58da8c6b894273be680001fc".into())
        );
        assert_eq!(
            envelope.links.iter().find(|l| l.rel == "next").map(|l| l.uri.as_str()),
            Some("/v1.1/sections?limit=2&starting_after=58da8c6b894273be6800020a")
        );
    }

    #[test]
    fn envelope_tolerates_missing_links() {
        let envelope: Envelope = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(envelope.data.is_empty());
        assert!(envelope.links.is_empty());
    }

    #[test]
    fn role_paths_concatenate_for_users() {
        assert_eq!(CleverClient::role_paths(RoleFilter::Students), ["students"]);
        assert_eq!(
            CleverClient::role_paths(RoleFilter::Users),
            ["students", "teachers"]
        );
    }
}
