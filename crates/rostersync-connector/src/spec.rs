//! Group specification parsing.
//!
//! Operators select roster populations with delimited selector strings such
//! as `classes::Algebra I - Fall::students`. Parsing turns the full set of
//! configured selectors into a [`TraversalPlan`]: resource kind → resource
//! name → (membership tag → role filter). The plan is built once per sync run
//! and read-only afterward.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{RosterError, RosterResult};

/// The kind of roster resource a group spec addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Class,
    Course,
    School,
    /// Native kind of the cursor dialect; interchangeable with [`Class`]
    /// through dialect aliasing.
    ///
    /// [`Class`]: ResourceKind::Class
    Section,
}

impl ResourceKind {
    /// Parse a lower-cased kind token. Accepts singular and plural spellings;
    /// `orgs` is an alias for schools in both dialects.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "class" | "classes" => Some(ResourceKind::Class),
            "course" | "courses" => Some(ResourceKind::Course),
            "school" | "schools" | "org" | "orgs" => Some(ResourceKind::School),
            "section" | "sections" => Some(ResourceKind::Section),
            _ => None,
        }
    }

    /// Canonical plural spelling, as used in endpoints and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Class => "classes",
            ResourceKind::Course => "courses",
            ResourceKind::School => "schools",
            ResourceKind::Section => "sections",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which members of a resource a group spec selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleFilter {
    Students,
    Teachers,
    /// Aggregate of students and teachers. Backends without an aggregate
    /// endpoint answer this by concatenation.
    Users,
}

impl RoleFilter {
    /// Parse a lower-cased role token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "students" => Some(RoleFilter::Students),
            "teachers" => Some(RoleFilter::Teachers),
            "users" => Some(RoleFilter::Users),
            _ => None,
        }
    }

    /// Canonical spelling, as used in endpoints and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleFilter::Students => "students",
            RoleFilter::Teachers => "teachers",
            RoleFilter::Users => "users",
        }
    }
}

impl std::fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two supported backend dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterDialect {
    Classlink,
    Clever,
}

impl RosterDialect {
    /// Map a parsed kind onto the dialect's native kind. The cursor dialect
    /// models classes as sections; the OneRoster dialect is the reverse.
    pub fn alias(&self, kind: ResourceKind) -> ResourceKind {
        match (self, kind) {
            (RosterDialect::Clever, ResourceKind::Class) => ResourceKind::Section,
            (RosterDialect::Classlink, ResourceKind::Section) => ResourceKind::Class,
            (_, other) => other,
        }
    }

    /// Kinds this dialect reports as valid in spec errors.
    pub fn allowed_kinds(&self) -> &'static str {
        match self {
            RosterDialect::Classlink => "classes, courses, schools",
            RosterDialect::Clever => "classes, courses, schools, sections",
        }
    }
}

impl std::fmt::Display for RosterDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterDialect::Classlink => f.write_str("classlink"),
            RosterDialect::Clever => f.write_str("clever"),
        }
    }
}

/// One parsed group selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    /// Dialect-aliased resource kind.
    pub kind: ResourceKind,
    /// Plan key for the resource name: case-folded, whitespace preserved.
    pub name: String,
    /// The original selector string, applied to matched users verbatim.
    pub tag: String,
    pub role: RoleFilter,
}

/// Parser options, fixed per connector configuration.
#[derive(Debug, Clone)]
pub struct SpecOptions {
    /// Delimiter between the three selector parts.
    pub delimiter: String,
    /// Kind assigned to bare resource names.
    pub default_kind: ResourceKind,
    /// Role assigned to bare resource names.
    pub default_role: RoleFilter,
    pub dialect: RosterDialect,
}

impl SpecOptions {
    pub fn new(dialect: RosterDialect) -> Self {
        Self {
            delimiter: "::".to_string(),
            default_kind: ResourceKind::Class,
            default_role: RoleFilter::Students,
            dialect,
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_defaults(mut self, kind: ResourceKind, role: RoleFilter) -> Self {
        self.default_kind = kind;
        self.default_role = role;
        self
    }
}

/// The full set of group specs organized for fetch dispatch:
/// kind → resource name → (membership tag → role filter).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalPlan {
    entries: BTreeMap<ResourceKind, BTreeMap<String, BTreeMap<String, RoleFilter>>>,
}

impl TraversalPlan {
    /// Parse a set of selector strings, failing on the first invalid spec.
    pub fn parse<I, S>(specs: I, options: &SpecOptions) -> RosterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = TraversalPlan::default();
        for spec in specs {
            let parsed = parse_spec(spec.as_ref(), options)?;
            plan.insert(parsed);
        }
        Ok(plan)
    }

    /// Parse a set of selector strings, logging and skipping invalid specs.
    pub fn parse_lenient<I, S>(specs: I, options: &SpecOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = TraversalPlan::default();
        for spec in specs {
            match parse_spec(spec.as_ref(), options) {
                Ok(parsed) => plan.insert(parsed),
                Err(err) => warn!("skipping group spec: {err}"),
            }
        }
        plan
    }

    fn insert(&mut self, spec: GroupSpec) {
        self.entries
            .entry(spec.kind)
            .or_default()
            .entry(spec.name)
            .or_default()
            .insert(spec.tag, spec.role);
    }

    /// Iterate over (kind, resource name, tag → role) entries.
    pub fn entries(
        &self,
    ) -> impl Iterator<Item = (ResourceKind, &String, &BTreeMap<String, RoleFilter>)> {
        self.entries.iter().flat_map(|(kind, names)| {
            names.iter().map(move |(name, tags)| (*kind, name, tags))
        })
    }

    /// Look up the tag map for one (kind, name) pair.
    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&BTreeMap<String, RoleFilter>> {
        self.entries.get(&kind).and_then(|names| names.get(name))
    }

    /// Number of distinct (kind, resource name) pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_spec(spec: &str, options: &SpecOptions) -> RosterResult<GroupSpec> {
    let delimiter = options.delimiter.as_str();

    if !spec.contains(delimiter) {
        // A bare resource name is never an error: it gets the configured
        // defaults and is keyed by the literal string.
        return Ok(GroupSpec {
            kind: options.dialect.alias(options.default_kind),
            name: spec.to_string(),
            tag: spec.to_string(),
            role: options.default_role,
        });
    }

    let doubled = format!("{delimiter}{delimiter}");
    let parts: Vec<&str> = spec.split(delimiter).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) || spec.contains(&doubled) {
        return Err(RosterError::InvalidSpecSyntax {
            spec: spec.to_string(),
            delimiter: delimiter.to_string(),
        });
    }

    let kind_token = parts[0].to_lowercase();
    let name = parts[1].to_lowercase();
    let role_token = parts[2].to_lowercase();

    let kind = ResourceKind::parse(&kind_token).ok_or_else(|| RosterError::UnknownResourceKind {
        kind: kind_token.clone(),
        spec: spec.to_string(),
        allowed: options.dialect.allowed_kinds().to_string(),
    })?;
    let role = RoleFilter::parse(&role_token).ok_or_else(|| RosterError::UnknownRoleFilter {
        role: role_token.clone(),
        spec: spec.to_string(),
    })?;

    Ok(GroupSpec {
        kind: options.dialect.alias(kind),
        name,
        tag: spec.to_string(),
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classlink() -> SpecOptions {
        SpecOptions::new(RosterDialect::Classlink)
    }

    #[test]
    fn valid_triple_produces_one_entry() {
        let plan = TraversalPlan::parse(["classes::yyy::students"], &classlink()).unwrap();
        let tags = plan.get(ResourceKind::Class, "yyy").unwrap();
        assert_eq!(
            tags.get("classes::yyy::students"),
            Some(&RoleFilter::Students)
        );
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn name_is_case_folded_but_whitespace_preserved() {
        let plan = TraversalPlan::parse(["courses::y    y    y::teachers"], &classlink()).unwrap();
        assert!(plan.get(ResourceKind::Course, "y    y    y").is_some());
    }

    #[test]
    fn bare_name_gets_defaults_and_literal_key() {
        let plan = TraversalPlan::parse(["xxx"], &classlink()).unwrap();
        let tags = plan.get(ResourceKind::Class, "xxx").unwrap();
        assert_eq!(tags.get("xxx"), Some(&RoleFilter::Students));
    }

    #[test]
    fn single_colon_typo_is_a_syntax_error() {
        let err = TraversalPlan::parse(["classes:Alg-102::students"], &classlink()).unwrap_err();
        assert!(matches!(err, RosterError::InvalidSpecSyntax { .. }));
    }

    #[test]
    fn too_few_parts_is_a_syntax_error() {
        let err = TraversalPlan::parse(["classes::students"], &classlink()).unwrap_err();
        assert!(matches!(err, RosterError::InvalidSpecSyntax { .. }));
    }

    #[test]
    fn doubled_delimiter_is_a_syntax_error() {
        let err = TraversalPlan::parse(["classes::::students"], &classlink()).unwrap_err();
        assert!(matches!(err, RosterError::InvalidSpecSyntax { .. }));
    }

    #[test]
    fn unknown_kind_names_the_allowed_set() {
        let err = TraversalPlan::parse(["clazzes::Alg-102::students"], &classlink()).unwrap_err();
        match err {
            RosterError::UnknownResourceKind { kind, allowed, .. } => {
                assert_eq!(kind, "clazzes");
                assert_eq!(allowed, "classes, courses, schools");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = TraversalPlan::parse(["courses::Alg-102::stud"], &classlink()).unwrap_err();
        assert!(matches!(err, RosterError::UnknownRoleFilter { ref role, .. } if role == "stud"));
    }

    #[test]
    fn distinct_whitespace_yields_distinct_entries() {
        let plan = TraversalPlan::parse(
            [
                "classes::Art I - Fall::students",
                "classes::Art I - Fall::teachers",
                "classes::Art        I - Fall::teachers",
            ],
            &classlink(),
        )
        .unwrap();

        let tight = plan.get(ResourceKind::Class, "art i - fall").unwrap();
        assert_eq!(tight.len(), 2);
        let wide = plan.get(ResourceKind::Class, "art        i - fall").unwrap();
        assert_eq!(wide.len(), 1);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn complex_set_builds_the_expected_plan() {
        let specs = [
            "courses::Alg-102::students",
            "classes::Geography I - Spring::students",
            "classes::Algebra I - Fall::students",
            "schools::Spring Valley::students",
            "xxx",
        ];
        let plan = TraversalPlan::parse(specs, &classlink()).unwrap();
        assert_eq!(plan.len(), 5);
        assert!(plan.get(ResourceKind::Course, "alg-102").is_some());
        assert!(plan.get(ResourceKind::School, "spring valley").is_some());
        assert!(plan.get(ResourceKind::Class, "xxx").is_some());
    }

    #[test]
    fn clever_aliases_classes_to_sections() {
        let options = SpecOptions::new(RosterDialect::Clever);
        let plan = TraversalPlan::parse(["classes::Math 101::students"], &options).unwrap();
        assert!(plan.get(ResourceKind::Section, "math 101").is_some());
        assert!(plan.get(ResourceKind::Class, "math 101").is_none());
    }

    #[test]
    fn classlink_aliases_sections_to_classes() {
        let plan = TraversalPlan::parse(["sections::Math 101::students"], &classlink()).unwrap();
        assert!(plan.get(ResourceKind::Class, "math 101").is_some());
    }

    #[test]
    fn orgs_alias_to_schools() {
        let plan = TraversalPlan::parse(["orgs::Spring Valley::users"], &classlink()).unwrap();
        assert!(plan.get(ResourceKind::School, "spring valley").is_some());
    }

    #[test]
    fn lenient_parse_skips_invalid_and_keeps_valid() {
        let plan = TraversalPlan::parse_lenient(
            ["course::Alg-102::stud", "classes::yyy::students"],
            &classlink(),
        );
        assert_eq!(plan.len(), 1);
        assert!(plan.get(ResourceKind::Class, "yyy").is_some());
    }

    #[test]
    fn same_resource_merges_tags() {
        let plan = TraversalPlan::parse(
            [
                "classes::Art I - Fall::students",
                "classes::ART I - FALL::teachers",
            ],
            &classlink(),
        )
        .unwrap();
        let tags = plan.get(ResourceKind::Class, "art i - fall").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(
            tags.get("classes::ART I - FALL::teachers"),
            Some(&RoleFilter::Teachers)
        );
    }
}
