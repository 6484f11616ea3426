//! Attribute value templates.
//!
//! A [`ValueTemplate`] is a value type: the format string is parsed into
//! literal and placeholder segments once at construction, so it can be built
//! from configuration up front and rendered against any number of records.

use crate::error::RosterResult;
use crate::record::RawRecord;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Outcome of rendering a template against one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    /// The interpolated value, present only when every placeholder resolved.
    pub value: Option<String>,
    /// The first placeholder that was missing from the record, when rendering
    /// aborted. Not an error: the caller decides on defaults and warnings.
    pub missing: Option<String>,
}

impl Rendered {
    fn empty() -> Self {
        Self::default()
    }
}

/// A format string over record attributes, e.g. `"{givenName} {familyName}"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTemplate {
    segments: Vec<Segment>,
    placeholders: Vec<String>,
}

impl ValueTemplate {
    /// Parse a format string. `None` produces a template that never renders.
    pub fn new(format: Option<&str>) -> Self {
        let mut segments = Vec::new();
        let mut placeholders = Vec::new();
        let Some(format) = format else {
            return Self {
                segments,
                placeholders,
            };
        };

        let mut literal = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    if name.is_empty() {
                        continue;
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !placeholders.contains(&name) {
                        placeholders.push(name.clone());
                    }
                    segments.push(Segment::Placeholder(name));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            segments,
            placeholders,
        }
    }

    /// The placeholder names in first-appearance order.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// True when the template contains no placeholders (constant or absent);
    /// such a template always renders to nothing without touching the record.
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Render the template against a record.
    ///
    /// Every placeholder is looked up with the scalar extraction rule. The
    /// first absent placeholder aborts rendering and is reported in
    /// [`Rendered::missing`]; only a byte-decode failure is an actual error.
    pub fn render(&self, record: &RawRecord) -> RosterResult<Rendered> {
        if self.is_empty() {
            return Ok(Rendered::empty());
        }

        for name in &self.placeholders {
            if record.scalar(name)?.is_none() {
                return Ok(Rendered {
                    value: None,
                    missing: Some(name.clone()),
                });
            }
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    // Checked above, every placeholder resolves.
                    if let Some(value) = record.scalar(name)? {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(Rendered {
            value: Some(out),
            missing: None,
        })
    }
}
