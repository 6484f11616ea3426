//! Record normalization.
//!
//! Turns one raw roster record into a [`NormalizedUser`], applying the
//! configured field templates in a fixed order with per-field fallbacks.
//! Dropped records are `Ok(None)` with a warning; only a failed byte decode
//! of a required value is an actual error.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::RosterResult;
use crate::identity::IdentityType;
use crate::record::{AttrValue, RawRecord};
use crate::template::ValueTemplate;
use crate::user::NormalizedUser;

/// Normalizer configuration, one per connector instance.
#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Record field holding the stable unique key.
    pub key_identifier: String,
    pub email_format: Option<String>,
    pub identity_type_format: Option<String>,
    pub username_format: Option<String>,
    pub domain_format: Option<String>,
    pub given_name_format: Option<String>,
    pub surname_format: Option<String>,
    pub country_format: Option<String>,
    /// Identity type used when the record renders none.
    pub default_identity_type: Option<IdentityType>,
    /// Country code used when the record renders none.
    pub default_country: Option<String>,
    /// Field → allowed-values filter: a record is kept only when its field
    /// value is a case-insensitive substring of the configured value.
    pub include_only: BTreeMap<String, String>,
    /// Extra attributes captured verbatim into `source_attributes`.
    pub extended_attributes: Vec<String>,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            key_identifier: "sourcedId".to_string(),
            email_format: Some("{email}".to_string()),
            identity_type_format: None,
            username_format: None,
            domain_format: None,
            given_name_format: Some("{givenName}".to_string()),
            surname_format: Some("{familyName}".to_string()),
            country_format: None,
            default_identity_type: None,
            default_country: None,
            include_only: BTreeMap::new(),
            extended_attributes: Vec::new(),
        }
    }
}

/// Builds normalized users from raw records.
///
/// Templates are parsed once at construction; `normalize` is then a pure
/// function over one record (plus tracing output).
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    key_identifier: String,
    include_only: BTreeMap<String, String>,
    email: ValueTemplate,
    identity_type: ValueTemplate,
    username: ValueTemplate,
    domain: ValueTemplate,
    given_name: ValueTemplate,
    surname: ValueTemplate,
    country: ValueTemplate,
    default_identity_type: Option<IdentityType>,
    default_country: Option<String>,
    extended_attributes: Vec<String>,
}

impl RecordNormalizer {
    pub fn new(options: NormalizerOptions) -> Self {
        if !options.include_only.is_empty() {
            debug!(filters = ?options.include_only, "inclusion filters are applied");
        }
        Self {
            email: ValueTemplate::new(options.email_format.as_deref()),
            identity_type: ValueTemplate::new(options.identity_type_format.as_deref()),
            username: ValueTemplate::new(options.username_format.as_deref()),
            domain: ValueTemplate::new(options.domain_format.as_deref()),
            given_name: ValueTemplate::new(options.given_name_format.as_deref()),
            surname: ValueTemplate::new(options.surname_format.as_deref()),
            country: ValueTemplate::new(options.country_format.as_deref()),
            key_identifier: options.key_identifier,
            include_only: options.include_only,
            default_identity_type: options.default_identity_type,
            default_country: options.default_country,
            extended_attributes: options.extended_attributes,
        }
    }

    /// Normalize one record. `Ok(None)` means the record was dropped.
    pub fn normalize(&self, record: &RawRecord) -> RosterResult<Option<NormalizedUser>> {
        if !self.is_included(record)? {
            return Ok(None);
        }

        let key = match record.scalar(&self.key_identifier)? {
            Some(key) if !key.is_empty() => key,
            _ => {
                warn!(
                    "skipping record: no '{}' key identifier found",
                    self.key_identifier
                );
                return Ok(None);
            }
        };

        let mut source = BTreeMap::new();

        let email_rendered = self.email.render(record)?;
        let email = email_rendered
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if email.is_none() {
            if let Some(attribute) = &email_rendered.missing {
                warn!("empty email attribute ({attribute}) for record with key {key}");
            }
        }
        source.insert("email".to_string(), opt_text(&email));

        let identity_rendered = self.identity_type.render(record)?;
        source.insert("identity_type".to_string(), opt_text(&identity_rendered.value));
        let identity_type = match &identity_rendered.value {
            Some(value) => match IdentityType::parse(value) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warn!("skipping record with key {key}: {err}");
                    return Ok(None);
                }
            },
            None => {
                if let Some(attribute) = &identity_rendered.missing {
                    warn!(
                        "no identity type attribute ({attribute}) for record with key {key}, \
                         defaulting to {:?}",
                        self.default_identity_type
                    );
                }
                self.default_identity_type
            }
        };

        let username_rendered = self.username.render(record)?;
        let rendered_username = username_rendered
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        source.insert("username".to_string(), opt_text(&rendered_username));
        if rendered_username.is_none() {
            if let Some(attribute) = &username_rendered.missing {
                warn!("no username attribute ({attribute}) for record with key {key}, falling back to email");
            }
        }
        let username = rendered_username.clone().or_else(|| email.clone());

        let domain_rendered = self.domain.render(record)?;
        let rendered_domain = domain_rendered
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        source.insert("domain".to_string(), opt_text(&rendered_domain));
        // The fallback compares the rendered username, not the post-fallback
        // one: an unrendered username still inherits the email's domain.
        let domain = if rendered_domain.is_some() {
            rendered_domain
        } else if rendered_username != email {
            email
                .as_ref()
                .and_then(|e| e.find('@').map(|at| e[at + 1..].to_string()))
        } else {
            if let Some(attribute) = &domain_rendered.missing {
                warn!("no domain attribute ({attribute}) for record with key {key}");
            }
            None
        };

        let given_rendered = self.given_name.render(record)?;
        source.insert("givenName".to_string(), opt_text(&given_rendered.value));
        if given_rendered.value.is_none() {
            if let Some(attribute) = &given_rendered.missing {
                warn!("no given name attribute ({attribute}) for record with key {key}");
            }
        }

        let surname_rendered = self.surname.render(record)?;
        source.insert("familyName".to_string(), opt_text(&surname_rendered.value));
        if surname_rendered.value.is_none() {
            if let Some(attribute) = &surname_rendered.missing {
                warn!("no surname attribute ({attribute}) for record with key {key}");
            }
        }

        let country_rendered = self.country.render(record)?;
        source.insert("country".to_string(), opt_text(&country_rendered.value));
        let country = country_rendered
            .value
            .map(|c| c.to_uppercase())
            .or_else(|| self.default_country.as_ref().map(|c| c.to_uppercase()));

        for attribute in &self.extended_attributes {
            source.insert(attribute.clone(), record.attribute(attribute)?);
        }

        Ok(Some(NormalizedUser {
            email: email.clone(),
            username,
            domain,
            firstname: given_rendered.value,
            lastname: surname_rendered.value,
            country,
            identity_type,
            source_attributes: source,
            ..NormalizedUser::new(key)
        }))
    }

    fn is_included(&self, record: &RawRecord) -> RosterResult<bool> {
        for (field, allowed) in &self.include_only {
            match record.scalar(field)? {
                Some(value) => {
                    let allowed = allowed.trim().to_lowercase();
                    let value = value.trim().to_lowercase();
                    if !allowed.contains(&value) {
                        debug!("record excluded by '{field}' inclusion filter");
                        return Ok(false);
                    }
                }
                None => {
                    warn!("no '{field}' attribute for inclusion filtering, excluding record");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn opt_text(value: &Option<String>) -> AttrValue {
    match value {
        Some(v) => AttrValue::Text(v.clone()),
        None => AttrValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn billy() -> RawRecord {
        RawRecord::from_json(&json!({
            "sourcedId": "18125",
            "status": "active",
            "username": "billy.flores",
            "givenName": "BILLY",
            "familyName": "FLORES",
            "role": "student",
            "identifier": "17580",
            "email": "billy.flores@classlink.k12.nj.us",
            "sms": "(666) 666-6666",
            "country": "us",
        }))
    }

    fn normalizer(options: NormalizerOptions) -> RecordNormalizer {
        RecordNormalizer::new(options)
    }

    #[test]
    fn username_and_domain_fall_back_from_email() {
        let user = normalizer(NormalizerOptions::default())
            .normalize(&billy())
            .unwrap()
            .unwrap();

        assert_eq!(user.key, "18125");
        assert_eq!(user.email.as_deref(), Some("billy.flores@classlink.k12.nj.us"));
        assert_eq!(user.username, user.email);
        assert_eq!(user.domain.as_deref(), Some("classlink.k12.nj.us"));
        assert_eq!(user.firstname.as_deref(), Some("BILLY"));
        assert_eq!(user.lastname.as_deref(), Some("FLORES"));
        assert!(user.groups.is_empty());
    }

    #[test]
    fn source_attributes_capture_rendered_and_unrendered_fields() {
        let user = normalizer(NormalizerOptions::default())
            .normalize(&billy())
            .unwrap()
            .unwrap();

        assert_eq!(
            user.source_attributes.get("email"),
            Some(&AttrValue::Text("billy.flores@classlink.k12.nj.us".into()))
        );
        assert_eq!(user.source_attributes.get("username"), Some(&AttrValue::Null));
        assert_eq!(user.source_attributes.get("domain"), Some(&AttrValue::Null));
        assert_eq!(
            user.source_attributes.get("givenName"),
            Some(&AttrValue::Text("BILLY".into()))
        );
    }

    #[test]
    fn extended_attributes_tolerate_missing_keys() {
        let options = NormalizerOptions {
            extended_attributes: vec!["sms".into(), "identifier".into(), "fake".into()],
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&billy()).unwrap().unwrap();

        assert_eq!(
            user.source_attributes.get("sms"),
            Some(&AttrValue::Text("(666) 666-6666".into()))
        );
        assert_eq!(
            user.source_attributes.get("identifier"),
            Some(&AttrValue::Text("17580".into()))
        );
        assert_eq!(user.source_attributes.get("fake"), Some(&AttrValue::Null));
    }

    #[test]
    fn missing_key_identifier_drops_the_record() {
        let record = RawRecord::from_json(&json!({"email": "a@b.c"}));
        let user = normalizer(NormalizerOptions::default())
            .normalize(&record)
            .unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn explicit_username_keeps_domain_unset() {
        let options = NormalizerOptions {
            username_format: Some("{email}".into()),
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&billy()).unwrap().unwrap();
        // Rendered username equals email, so the domain fallback does not
        // apply and no domain template is configured.
        assert_eq!(user.username, user.email);
        assert_eq!(user.domain, None);
    }

    #[test]
    fn identity_type_defaults_when_unrendered() {
        let options = NormalizerOptions {
            default_identity_type: Some(IdentityType::Federated),
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&billy()).unwrap().unwrap();
        assert_eq!(user.identity_type, Some(IdentityType::Federated));
    }

    #[test]
    fn invalid_identity_type_drops_the_record() {
        let options = NormalizerOptions {
            identity_type_format: Some("{role}".into()),
            ..NormalizerOptions::default()
        };
        // "student" is not in the supported identity type set.
        let user = normalizer(options).normalize(&billy()).unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn valid_identity_type_is_parsed() {
        let record = billy().with("type", "federatedID");
        let options = NormalizerOptions {
            identity_type_format: Some("{type}".into()),
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&record).unwrap().unwrap();
        assert_eq!(user.identity_type, Some(IdentityType::Federated));
    }

    #[test]
    fn country_is_uppercased_or_defaulted() {
        let options = NormalizerOptions {
            country_format: Some("{country}".into()),
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&billy()).unwrap().unwrap();
        assert_eq!(user.country.as_deref(), Some("US"));

        let options = NormalizerOptions {
            default_country: Some("ca".into()),
            ..NormalizerOptions::default()
        };
        let user = normalizer(options).normalize(&billy()).unwrap().unwrap();
        assert_eq!(user.country.as_deref(), Some("CA"));
    }

    #[test]
    fn inclusion_filter_keeps_substring_matches() {
        let options = NormalizerOptions {
            include_only: BTreeMap::from([("role".to_string(), "student, teacher".to_string())]),
            ..NormalizerOptions::default()
        };
        assert!(normalizer(options).normalize(&billy()).unwrap().is_some());
    }

    #[test]
    fn inclusion_filter_drops_mismatches() {
        let options = NormalizerOptions {
            include_only: BTreeMap::from([("role".to_string(), "administrator".to_string())]),
            ..NormalizerOptions::default()
        };
        assert!(normalizer(options).normalize(&billy()).unwrap().is_none());
    }

    #[test]
    fn inclusion_filter_drops_records_missing_the_field() {
        let options = NormalizerOptions {
            include_only: BTreeMap::from([("grade".to_string(), "11".to_string())]),
            ..NormalizerOptions::default()
        };
        assert!(normalizer(options).normalize(&billy()).unwrap().is_none());
    }
}
