//! # Roster Connector Framework
//!
//! Core abstractions for ingesting user and group-membership records from
//! paginated roster APIs and normalizing them for downstream provisioning.
//!
//! ## Architecture
//!
//! The pipeline is a chain of small value types, leaves first:
//!
//! - [`ValueTemplate`](template::ValueTemplate) - renders one normalized
//!   field from a raw record
//! - [`RecordNormalizer`](normalize::RecordNormalizer) - builds a
//!   [`NormalizedUser`](user::NormalizedUser) from a
//!   [`RawRecord`](record::RawRecord)
//! - [`TraversalPlan`](spec::TraversalPlan) - parsed group selectors
//!   organized for fetch dispatch
//! - [`RosterClient`](client::RosterClient) - capability trait implemented
//!   by each backend dialect
//! - [`IngestionCoordinator`](coordinator::IngestionCoordinator) - drives
//!   the plan and merges the results
//!
//! Backends live in their own crates (`rostersync-connector-classlink`,
//! `rostersync-connector-clever`); they share the pagination-termination and
//! record-budget logic from [`client`] rather than a base type, since the
//! dialects differ in pagination signal and name normalization, not in
//! control flow.
//!
//! ## Example
//!
//! ```ignore
//! use rostersync_connector::prelude::*;
//!
//! let options = SpecOptions::new(RosterDialect::Classlink);
//! let plan = TraversalPlan::parse(["classes::Algebra I - Fall::students"], &options)?;
//!
//! let normalizer = RecordNormalizer::new(NormalizerOptions::default());
//! let coordinator = IngestionCoordinator::new(client, normalizer);
//! let table = coordinator.run(&plan, true).await?;
//! for user in table {
//!     println!("{} {:?}", user.key, user.groups);
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - error types with configuration/transport classification
//! - [`record`] - raw records and the attribute value union
//! - [`template`] - attribute value templates
//! - [`spec`] - group spec parsing and traversal plans
//! - [`identity`] - supported identity types
//! - [`normalize`] - record normalization
//! - [`user`] - normalized users and the per-run accumulator
//! - [`client`] - the backend capability trait and shared fetch plumbing
//! - [`coordinator`] - run orchestration
//! - [`config`] - configuration value types

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod record;
pub mod spec;
pub mod template;
pub mod user;

/// Prelude module for convenient imports.
///
/// ```
/// use rostersync_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{is_last_page, NameMatching, RecordBudget, RosterClient};
    pub use crate::config::{ConnectionConfig, FieldMappings, RosterConfig, SchemaConfig};
    pub use crate::coordinator::IngestionCoordinator;
    pub use crate::error::{RosterError, RosterResult};
    pub use crate::identity::IdentityType;
    pub use crate::normalize::{NormalizerOptions, RecordNormalizer};
    pub use crate::record::{AttrValue, RawRecord};
    pub use crate::spec::{
        GroupSpec, ResourceKind, RoleFilter, RosterDialect, SpecOptions, TraversalPlan,
    };
    pub use crate::template::{Rendered, ValueTemplate};
    pub use crate::user::{NormalizedUser, UserTable};
}

// Re-export async_trait for backend implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_imports_are_usable() {
        let _kind = ResourceKind::Class;
        let _role = RoleFilter::Students;
        let _policy = NameMatching::FoldCase;
        let _record = RawRecord::new().with("email", "test@example.com");
        let _template = ValueTemplate::new(Some("{email}"));
        let _budget = RecordBudget::unlimited();
        assert!(is_last_page(0, 10, false));
    }
}
