//! Flat XML records.
//!
//! The merchant protocol and platform pushes exchange a single element whose
//! children are the fields:
//!
//! ```text
//! <xml>
//!   <return_code><![CDATA[SUCCESS]]></return_code>
//!   <total_fee>100</total_fee>
//! </xml>
//! ```

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Display;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};

/// Root tag emitted by [`StructuredMessage::to_xml`].
pub const ROOT_TAG: &str = "xml";

/// A flat mapping from tag name to text value.
///
/// Keys are kept sorted, so encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredMessage {
    fields: BTreeMap<String, String>,
}

impl StructuredMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a flat XML document.
    ///
    /// Attributes, comments and the XML declaration are ignored. `<tag/>`
    /// decodes to an empty string; CDATA sections are taken verbatim; a
    /// repeated tag keeps its last value.
    pub fn from_xml(xml: &str) -> WireResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut fields = BTreeMap::new();

        let mut root_seen = false;
        let mut current: Option<(String, String)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = tag_name(start.name().as_ref())?;
                    if let Some((parent, _)) = &current {
                        return Err(nested(parent, name));
                    }
                    if root_seen {
                        current = Some((name, String::new()));
                    } else {
                        root_seen = true;
                    }
                }
                Event::Empty(empty) => {
                    let name = tag_name(empty.name().as_ref())?;
                    if let Some((parent, _)) = &current {
                        return Err(nested(parent, name));
                    }
                    if !root_seen {
                        // `<xml/>`: an empty record
                        return Ok(Self { fields });
                    }
                    fields.insert(name, String::new());
                }
                Event::Text(text) => {
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&text.unescape()?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some((_, value)) = current.as_mut() {
                        let raw = cdata.into_inner();
                        let text = std::str::from_utf8(&raw)
                            .map_err(|e| WireError::Malformed(e.to_string()))?;
                        value.push_str(text);
                    }
                }
                Event::End(_) => match current.take() {
                    Some((name, value)) => {
                        fields.insert(name, value);
                    }
                    None => return Ok(Self { fields }),
                },
                Event::Eof => {
                    return Err(WireError::Malformed(if root_seen {
                        "unexpected end of document".to_string()
                    } else {
                        "no root element".to_string()
                    }));
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
    }

    /// Encode as `<xml>` with one child per field, in key order.
    pub fn to_xml(&self) -> WireResult<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(BytesStart::new(ROOT_TAG)))?;
        for (name, value) in &self.fields {
            validate_tag(name)?;
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            writer.write_event(Event::Text(BytesText::new(value)))?;
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;

        String::from_utf8(writer.into_inner()).map_err(|e| WireError::Malformed(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), but a missing field is an error.
    pub fn require(&self, name: &str) -> WireResult<&str> {
        self.get(name)
            .ok_or_else(|| WireError::MissingField(name.to_string()))
    }

    /// Insert a field, rendering the value through `Display`.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) -> Option<String> {
        self.fields.insert(name.into(), value.to_string())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the message and return the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl From<BTreeMap<String, String>> for StructuredMessage {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for StructuredMessage {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut message = Self::new();
        for (name, value) in iter {
            message.insert(name, value);
        }
        message
    }
}

impl<'a> IntoIterator for &'a StructuredMessage {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for StructuredMessage {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

fn nested(parent: &str, child: String) -> WireError {
    WireError::Nested {
        parent: parent.to_string(),
        child,
    }
}

fn tag_name(raw: &[u8]) -> WireResult<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| WireError::Malformed(e.to_string()))
}

/// Accepts `[A-Za-z_][A-Za-z0-9_.-]*` (Unicode letters and digits allowed).
fn validate_tag(name: &str) -> WireResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(WireError::InvalidTag(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("return_code").is_ok());
        assert!(validate_tag("_private").is_ok());
        assert!(validate_tag("a.b-c").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("1abc").is_err());
        assert!(validate_tag("has space").is_err());
        assert!(validate_tag("a<b").is_err());
    }

    #[test]
    fn test_empty_root() {
        assert!(StructuredMessage::from_xml("<xml/>").unwrap().is_empty());
        assert!(StructuredMessage::from_xml("<xml></xml>").unwrap().is_empty());
    }

    #[test]
    fn test_builder_and_accessors() {
        let mut message = StructuredMessage::new()
            .with("total_fee", 100)
            .with("body", "test");
        assert_eq!(message.get("total_fee"), Some("100"));
        assert_eq!(message.len(), 2);
        assert!(message.contains("body"));
        assert_eq!(message.remove("body"), Some("test".to_string()));
        assert!(!message.contains("body"));
        assert_eq!(
            message.require("body"),
            Err(WireError::MissingField("body".into()))
        );
    }
}
