//! Ingestion coordination.
//!
//! Drives a [`TraversalPlan`] against one [`RosterClient`], normalizes every
//! fetched record, and merges the results into a single [`UserTable`]. The
//! table is owned exclusively by the coordinator during the run and handed to
//! the caller when the run completes.

use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::client::RosterClient;
use crate::error::RosterResult;
use crate::normalize::RecordNormalizer;
use crate::spec::{RoleFilter, TraversalPlan};
use crate::user::UserTable;

/// One sync run's orchestrator.
pub struct IngestionCoordinator<C> {
    client: C,
    normalizer: RecordNormalizer,
    /// Role used for the unfiltered all-users pass.
    all_users_role: RoleFilter,
    /// Global cap on the final table; zero means unlimited.
    max_records: usize,
}

impl<C: RosterClient> IngestionCoordinator<C> {
    pub fn new(client: C, normalizer: RecordNormalizer) -> Self {
        Self {
            client,
            normalizer,
            all_users_role: RoleFilter::Users,
            max_records: 0,
        }
    }

    pub fn with_all_users_role(mut self, role: RoleFilter) -> Self {
        self.all_users_role = role;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Execute the plan and return the merged user table.
    ///
    /// Each (kind, name) entry triggers one fetch per distinct role filter;
    /// every normalized record is merged under the membership tags whose
    /// specs selected that role. When `fetch_all_users` is set, one
    /// additional unfiltered fetch merges directory-wide users without
    /// adding any membership tag.
    #[instrument(skip(self, plan), fields(entries = plan.len()))]
    pub async fn run(
        &self,
        plan: &TraversalPlan,
        fetch_all_users: bool,
    ) -> RosterResult<UserTable> {
        let mut table = UserTable::new();

        for (kind, name, tags) in plan.entries() {
            // Invert tag → role so each distinct role is fetched once even
            // when several specs point at it.
            let mut roles: BTreeMap<RoleFilter, Vec<&str>> = BTreeMap::new();
            for (tag, role) in tags {
                roles.entry(*role).or_default().push(tag.as_str());
            }

            for (role, role_tags) in roles {
                let records = self.client.fetch_members(kind, name, role).await?;
                for record in &records {
                    if let Some(user) = self.normalizer.normalize(record)? {
                        table.merge(user, role_tags.iter().copied());
                    }
                }
            }
        }

        if fetch_all_users {
            let records = self.client.fetch_all_users(self.all_users_role).await?;
            for record in &records {
                if let Some(user) = self.normalizer.normalize(record)? {
                    table.merge(user, std::iter::empty());
                }
            }
        }

        let limited = self.max_records != 0 && table.len() > self.max_records;
        info!(
            "roster returned {} total users{}",
            table.len(),
            if limited { " (limit applied)" } else { "" }
        );
        if limited {
            warn!("enforcing record limit of {} users", self.max_records);
            table.truncate(self.max_records);
        }

        Ok(table)
    }
}
