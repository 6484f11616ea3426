//! Roster client capability trait and shared fetch plumbing.
//!
//! The two backend dialects differ in pagination signal and name-matching
//! normalization, not in control flow, so the contract is one capability
//! trait plus free functions for the shared pagination-loop decisions.

use async_trait::async_trait;

use crate::error::RosterResult;
use crate::record::RawRecord;
use crate::spec::{ResourceKind, RoleFilter, RosterDialect};

/// A client for one roster backend.
///
/// `fetch_members` executes the three-stage protocol for one (kind, name,
/// role) triple: resolve the named resource across the full listing, then
/// page through its member listing (for courses: through each child
/// section's member listing). An unresolvable name is not an error; it is
/// logged and contributes zero records.
#[async_trait]
pub trait RosterClient: Send + Sync {
    /// The dialect this client speaks.
    fn dialect(&self) -> RosterDialect;

    /// Fetch all members of the named resource matching the role filter.
    async fn fetch_members(
        &self,
        kind: ResourceKind,
        name: &str,
        role: RoleFilter,
    ) -> RosterResult<Vec<RawRecord>>;

    /// Fetch the global user listing filtered by role.
    async fn fetch_all_users(&self, role: RoleFilter) -> RosterResult<Vec<RawRecord>>;
}

/// Name-matching normalization policy, configurable per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    /// Case-insensitive, surrounding whitespace trimmed, internal whitespace
    /// significant.
    FoldCase,
    /// Case-insensitive with all whitespace removed before comparison.
    FoldCaseStripWhitespace,
}

impl NameMatching {
    /// Normalize a name for comparison under this policy.
    pub fn normalize(&self, name: &str) -> String {
        match self {
            NameMatching::FoldCase => name.trim().to_lowercase(),
            NameMatching::FoldCaseStripWhitespace => name
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase(),
        }
    }

    /// True when two names are equal under this policy.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

/// Decide whether a page ends the pagination loop.
///
/// Any of the three signals ends it: no next-page reference, an empty page,
/// or a page shorter than requested. Count headers are not consulted; some
/// backends omit them on cursor-based final pages.
pub fn is_last_page(returned: usize, requested: u32, has_next: bool) -> bool {
    !has_next || returned == 0 || returned < requested as usize
}

/// Global record cap over member-listing fetches.
///
/// Resource-lookup listings are never counted. A cap of zero is unlimited.
#[derive(Debug, Clone, Default)]
pub struct RecordBudget {
    cap: usize,
    fetched: usize,
}

impl RecordBudget {
    /// Budget with a cap; zero means unlimited.
    pub fn new(cap: usize) -> Self {
        Self { cap, fetched: 0 }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// True once the cumulative count has met the cap; no further page
    /// requests should be issued.
    pub fn is_exhausted(&self) -> bool {
        self.cap != 0 && self.fetched >= self.cap
    }

    /// Record a page of member records, truncating it to whatever budget
    /// remains.
    pub fn admit(&mut self, mut records: Vec<RawRecord>) -> Vec<RawRecord> {
        if self.cap != 0 {
            let remaining = self.cap.saturating_sub(self.fetched);
            records.truncate(remaining);
        }
        self.fetched += records.len();
        records
    }

    /// Cumulative admitted record count.
    pub fn fetched(&self) -> usize {
        self.fetched
    }
}
