//! Raw roster records.
//!
//! The roster API has no fixed schema: record shape varies by backend and
//! resource kind. [`RawRecord`] keeps each record as a mapping from vendor
//! field name to [`AttrValue`], a tagged union over the value shapes the wire
//! can produce, so extraction is a total function instead of runtime type
//! sniffing.

use std::collections::BTreeMap;

use crate::error::{RosterError, RosterResult};

/// One attribute value as returned by the roster API.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Absent or JSON null.
    Null,
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(serde_json::Number),
    /// Boolean value.
    Bool(bool),
    /// Raw bytes (never produced by JSON transport; some sources hand the
    /// pipeline undecoded values).
    Bytes(Vec<u8>),
    /// List of values.
    List(Vec<AttrValue>),
    /// Nested mapping.
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Render this value as text for template interpolation.
    ///
    /// Bytes are decoded as UTF-8 and raise [`RosterError::Encoding`] when the
    /// decode fails; every other shape renders without error (structured
    /// values render as compact JSON). `Null` renders as `None`.
    pub fn as_text(&self, attribute: &str) -> RosterResult<Option<String>> {
        match self {
            AttrValue::Null => Ok(None),
            AttrValue::Text(s) => Ok(Some(s.clone())),
            AttrValue::Number(n) => Ok(Some(n.to_string())),
            AttrValue::Bool(b) => Ok(Some(b.to_string())),
            AttrValue::Bytes(bytes) => match String::from_utf8(bytes.clone()) {
                Ok(s) => Ok(Some(s)),
                Err(e) => Err(RosterError::Encoding {
                    attribute: attribute.to_string(),
                    message: e.to_string(),
                }),
            },
            AttrValue::List(_) | AttrValue::Map(_) => {
                Ok(Some(serde_json::to_string(&self.to_json())?))
            }
        }
    }

    /// Convert back into a `serde_json::Value`. Bytes become a string when
    /// they decode as UTF-8 and a number array otherwise.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Null => serde_json::Value::Null,
            AttrValue::Text(s) => serde_json::Value::String(s.clone()),
            AttrValue::Number(n) => serde_json::Value::Number(n.clone()),
            AttrValue::Bool(b) => serde_json::Value::Bool(*b),
            AttrValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => serde_json::Value::String(s.to_string()),
                Err(_) => serde_json::Value::Array(
                    bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
                ),
            },
            AttrValue::List(items) => {
                serde_json::Value::Array(items.iter().map(AttrValue::to_json).collect())
            }
            AttrValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for AttrValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(*b),
            serde_json::Value::Number(n) => AttrValue::Number(n.clone()),
            serde_json::Value::String(s) => AttrValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                AttrValue::List(items.iter().map(AttrValue::from).collect())
            }
            serde_json::Value::Object(map) => AttrValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttrValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

/// One untyped record as returned by the roster API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(BTreeMap<String, AttrValue>);

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object. Non-object values produce an empty
    /// record; the caller decides whether that is worth a warning.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttrValue::from(v)))
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Insert a field, for record construction in tests and adapters.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Borrow a field without applying the extraction rules.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Extract an attribute value.
    ///
    /// A missing key yields `Null`; a single-element list collapses to its
    /// element; a multi-element list stays a list; a mapping is returned
    /// as-is. Bytes decode to text here, with the same asymmetry as
    /// [`AttrValue::as_text`]: only a failed decode is an error.
    pub fn attribute(&self, name: &str) -> RosterResult<AttrValue> {
        let value = match self.0.get(name) {
            None => return Ok(AttrValue::Null),
            Some(v) => v,
        };
        match value {
            AttrValue::List(items) if items.len() == 1 => Ok(items[0].clone()),
            AttrValue::Bytes(_) => Ok(value
                .as_text(name)?
                .map(AttrValue::Text)
                .unwrap_or(AttrValue::Null)),
            other => Ok(other.clone()),
        }
    }

    /// Extract an attribute as text, collapsing a list to its first element.
    ///
    /// This is the lookup used by template placeholders and the key
    /// identifier: placeholders want one scalar, not a list.
    pub fn scalar(&self, name: &str) -> RosterResult<Option<String>> {
        let value = match self.0.get(name) {
            None => return Ok(None),
            Some(v) => v,
        };
        match value {
            AttrValue::List(items) => match items.first() {
                None => Ok(None),
                Some(first) => first.as_text(name),
            },
            other => other.as_text(name),
        }
    }

    /// Iterate over the record's fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RawRecord {
        RawRecord::from_json(&json!({
            "sourcedId": "18125",
            "username": "billy.flores",
            "dateLastModified": "2019-03-01T18:14:45.000Z",
            "agents": ["1", "2"],
            "orgs": [{"sourcedId": "2", "type": "org"}],
            "phone": {"home": "111-111-1111", "work": "222-222-2222"},
            "grades": ["15", ["11", "12", "13"], "14"],
            "sms": null,
        }))
    }

    #[test]
    fn simple_string_extraction() {
        let record = sample();
        assert_eq!(
            record.attribute("username").unwrap(),
            AttrValue::Text("billy.flores".into())
        );
        assert_eq!(
            record.attribute("dateLastModified").unwrap(),
            AttrValue::Text("2019-03-01T18:14:45.000Z".into())
        );
    }

    #[test]
    fn multi_element_list_stays_a_list() {
        let record = sample();
        assert_eq!(
            record.attribute("agents").unwrap(),
            AttrValue::List(vec![AttrValue::from("1"), AttrValue::from("2")])
        );
    }

    #[test]
    fn single_element_list_collapses() {
        let record = sample();
        let orgs = record.attribute("orgs").unwrap();
        assert!(matches!(orgs, AttrValue::Map(_)));
    }

    #[test]
    fn map_is_returned_as_is() {
        let record = sample();
        let phone = record.attribute("phone").unwrap();
        match phone {
            AttrValue::Map(map) => {
                assert_eq!(map.get("home"), Some(&AttrValue::from("111-111-1111")));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn missing_and_null_yield_null() {
        let record = sample();
        assert_eq!(record.attribute("fake").unwrap(), AttrValue::Null);
        assert_eq!(record.attribute("sms").unwrap(), AttrValue::Null);
    }

    #[test]
    fn nested_lists_survive() {
        let record = sample();
        match record.attribute("grades").unwrap() {
            AttrValue::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn bytes_decode_to_text() {
        let record = RawRecord::new().with("byte", AttrValue::Bytes(b"byteencoded".to_vec()));
        assert_eq!(
            record.attribute("byte").unwrap(),
            AttrValue::Text("byteencoded".into())
        );
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let record = RawRecord::new().with("byte", AttrValue::Bytes(vec![0xff, 0xfe, 0x01]));
        let err = record.attribute("byte").unwrap_err();
        assert!(matches!(err, RosterError::Encoding { ref attribute, .. } if attribute == "byte"));
    }

    #[test]
    fn scalar_takes_first_list_element() {
        let record = sample();
        assert_eq!(record.scalar("agents").unwrap(), Some("1".into()));
        assert_eq!(record.scalar("missing").unwrap(), None);
    }

    #[test]
    fn numbers_and_bools_render_as_text() {
        let record = RawRecord::from_json(&json!({"n": 42, "b": true}));
        assert_eq!(record.scalar("n").unwrap(), Some("42".into()));
        assert_eq!(record.scalar("b").unwrap(), Some("true".into()));
    }
}
