//! Parsing and serialization of reference-bearing attribute values.
//!
//! CF attributes that point at other variables or dimensions come in two
//! shapes:
//!
//! - list form, `"lat lon time"`: bare tokens, parsed to `{token: None}`;
//! - mapping form, `"area: areacello volume: volcello"`: parsed to
//!   `{key: Some([values])}`.
//!
//! A value must match one form in its entirety. Serialization is the exact
//! inverse, so `parse(serialize(parse(v))) == parse(v)`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::AttrValue;

static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[\w#/.()]+(?:\s+|$))*$").expect("valid list regex"));

static MAPPING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[\w#/.()]+:(?:\s+[\w#/.()]+)*(?:\s+|$))+$").expect("valid mapping regex")
});

/// Parsed form of a reference-bearing attribute.
///
/// Entries keep their first-occurrence order. `None` marks a bare list
/// token, `Some(values)` a mapping key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrRefs {
    entries: Vec<(String, Option<Vec<String>>)>,
}

impl AttrRefs {
    /// Parse an attribute value. Returns `None` if it matches neither form.
    pub fn parse(value: &str) -> Option<Self> {
        let mut refs = AttrRefs::default();
        if LIST_RE.is_match(value) {
            for token in value.split_whitespace() {
                refs.insert(token, None);
            }
            return Some(refs);
        }
        if MAPPING_RE.is_match(value) {
            let mut current: Option<(String, Vec<String>)> = None;
            for token in value.split_whitespace() {
                match token.strip_suffix(':') {
                    Some(key) => {
                        if let Some((k, vs)) = current.take() {
                            refs.insert(&k, Some(vs));
                        }
                        current = Some((key.to_string(), Vec::new()));
                    }
                    None => {
                        if let Some((_, vs)) = current.as_mut() {
                            vs.push(token.to_string());
                        }
                    }
                }
            }
            if let Some((k, vs)) = current {
                refs.insert(&k, Some(vs));
            }
            return Some(refs);
        }
        None
    }

    /// Insert an entry. A repeated key replaces its values but keeps its
    /// original position.
    pub fn insert(&mut self, key: &str, values: Option<Vec<String>>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = values,
            None => self.entries.push((key.to_string(), values)),
        }
    }

    /// The parsed entries in order.
    pub fn entries(&self) -> &[(String, Option<Vec<String>>)] {
        &self.entries
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite keys and/or values through `f`, preserving structure.
    ///
    /// Every entry is kept, even when two keys map to the same text
    /// (`"lat ../g/lat"` resolving twice to one variable).
    pub fn map_tokens<F>(&self, map_keys: bool, map_values: bool, mut f: F) -> Result<AttrRefs>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (key, values) in &self.entries {
            let key = if map_keys { f(key)? } else { key.clone() };
            let values = match values {
                Some(vs) if map_values => {
                    Some(vs.iter().map(|v| f(v)).collect::<Result<Vec<_>>>()?)
                }
                other => other.clone(),
            };
            entries.push((key, values));
        }
        Ok(AttrRefs { entries })
    }

    /// Serialize back to attribute text.
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttrRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, values)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match values {
                None => f.write_str(key)?,
                Some(vs) if vs.is_empty() => write!(f, "{key}:")?,
                Some(vs) => write!(f, "{key}: {}", vs.join(" "))?,
            }
        }
        Ok(())
    }
}

/// Parse the value of attribute `name`, failing with [`Error::Parse`].
pub fn parse_attribute(name: &str, value: &str) -> Result<AttrRefs> {
    AttrRefs::parse(value).ok_or_else(|| Error::Parse {
        attribute: name.to_string(),
        value: value.to_string(),
    })
}

/// Text of a reference-bearing attribute. String arrays are joined with
/// single spaces; anything else cannot hold references.
pub fn reference_text(name: &str, value: &AttrValue) -> Result<String> {
    match value {
        AttrValue::String(s) => Ok(s.clone()),
        AttrValue::StringArray(items) => Ok(items.join(" ")),
        other => Err(Error::Parse {
            attribute: name.to_string(),
            value: format!("{other:?}"),
        }),
    }
}
