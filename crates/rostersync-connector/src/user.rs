//! Normalized users and the per-run accumulator.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::identity::IdentityType;
use crate::record::AttrValue;

/// The pipeline's canonical output entity.
///
/// Scalar fields are fixed by the first successful normalization of the
/// record's key; only `groups` grows afterwards, by union across every
/// matching group spec within one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUser {
    /// Stable per-record identifier from the configured key field.
    pub key: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub country: Option<String>,
    pub identity_type: Option<IdentityType>,
    /// Membership tags, grown by the accumulator, never by the normalizer.
    pub groups: BTreeSet<String>,
    /// Raw inputs behind every formatted field plus extended attributes,
    /// kept verbatim for audit and debugging.
    pub source_attributes: BTreeMap<String, AttrValue>,
}

impl NormalizedUser {
    /// Create a user with only its key set.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            email: None,
            username: None,
            domain: None,
            firstname: None,
            lastname: None,
            country: None,
            identity_type: None,
            groups: BTreeSet::new(),
            source_attributes: BTreeMap::new(),
        }
    }
}

/// Accumulator mapping user key to normalized user, in insertion order.
///
/// Owned by one coordinator for the duration of one run; handed to the
/// downstream reconciler afterwards and then discarded.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: IndexMap<String, NormalizedUser>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a normalized user under the given membership tags.
    ///
    /// A new key inserts the user; an existing key keeps the stored scalar
    /// fields and only unions the group sets. Tags apply in both cases.
    pub fn merge<'a, I>(&mut self, user: NormalizedUser, tags: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entry = match self.users.entry(user.key.clone()) {
            Entry::Occupied(occupied) => {
                let existing = occupied.into_mut();
                existing.groups.extend(user.groups);
                existing
            }
            Entry::Vacant(vacant) => vacant.insert(user),
        };
        for tag in tags {
            entry.groups.insert(tag.to_string());
        }
    }

    /// Look up a user by key.
    pub fn get(&self, key: &str) -> Option<&NormalizedUser> {
        self.users.get(key)
    }

    /// Keep only the first `cap` users by insertion order.
    pub fn truncate(&mut self, cap: usize) {
        self.users.truncate(cap);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Iterate users in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedUser> {
        self.users.values()
    }

    /// Consume the table, yielding users in insertion order.
    pub fn into_users(self) -> impl Iterator<Item = NormalizedUser> {
        self.users.into_values()
    }
}

impl IntoIterator for UserTable {
    type Item = NormalizedUser;
    type IntoIter = indexmap::map::IntoValues<String, NormalizedUser>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(key: &str, email: &str) -> NormalizedUser {
        NormalizedUser {
            email: Some(email.to_string()),
            ..NormalizedUser::new(key)
        }
    }

    #[test]
    fn merge_is_idempotent_and_unions_tags() {
        let mut table = UserTable::new();
        table.merge(user("18125", "billy@example.org"), ["classes::Art::students"]);
        table.merge(user("18125", "other@example.org"), ["schools::Spring::users"]);

        assert_eq!(table.len(), 1);
        let merged = table.get("18125").unwrap();
        // Scalars keep the first normalization.
        assert_eq!(merged.email.as_deref(), Some("billy@example.org"));
        let groups: Vec<&str> = merged.groups.iter().map(String::as_str).collect();
        assert_eq!(groups, ["classes::Art::students", "schools::Spring::users"]);
    }

    #[test]
    fn repeated_tags_stay_a_set() {
        let mut table = UserTable::new();
        table.merge(user("1", "a@b.c"), ["g"]);
        table.merge(user("1", "a@b.c"), ["g"]);
        assert_eq!(table.get("1").unwrap().groups.len(), 1);
    }

    #[test]
    fn merge_without_tags_adds_no_groups() {
        let mut table = UserTable::new();
        table.merge(user("1", "a@b.c"), std::iter::empty());
        assert!(table.get("1").unwrap().groups.is_empty());
    }

    #[test]
    fn truncate_keeps_insertion_order() {
        let mut table = UserTable::new();
        for key in ["c", "a", "b"] {
            table.merge(user(key, "x@y.z"), std::iter::empty());
        }
        table.truncate(2);
        let keys: Vec<&str> = table.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, ["c", "a"]);
    }
}
