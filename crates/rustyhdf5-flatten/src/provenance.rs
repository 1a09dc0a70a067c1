//! Provenance maps recording where every flat object came from.
//!
//! Three root attributes are written on the flat dataset, one per
//! namespace. Each is a string array of `"flat_name: /original/path"`
//! records, so the original hierarchy can be reconstructed from any
//! flattened file.

use std::collections::BTreeMap;

use crate::backend::DatasetBackend;
use crate::error::{Error, Result};
use crate::path;
use crate::types::AttrValue;

/// Root attribute holding the group-attribute provenance map.
pub const ATTR_ATTRIBUTE_MAP: &str = "__flattener_name_mapping_attributes";

/// Root attribute holding the dimension provenance map.
pub const ATTR_DIMENSION_MAP: &str = "__flattener_name_mapping_dimensions";

/// Root attribute holding the variable provenance map.
pub const ATTR_VARIABLE_MAP: &str = "__flattener_name_mapping_variables";

const RECORD_SEPARATOR: &str = ": ";

/// Ordered `(flat name, original path)` records of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceMap {
    records: Vec<(String, String)>,
}

impl ProvenanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, flat: &str, original: &str) {
        self.records.push((flat.to_string(), original.to_string()));
    }

    pub fn records(&self) -> &[(String, String)] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Original path of flat object `flat`.
    pub fn original(&self, flat: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|(f, _)| f == flat)
            .map(|(_, o)| o.as_str())
    }

    /// Flat name of original object `original`.
    pub fn flat(&self, original: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|(_, o)| o == original)
            .map(|(f, _)| f.as_str())
    }

    /// Whether flat names and original paths are both unique, i.e. the
    /// records form a bijection.
    pub fn is_bijective(&self) -> bool {
        let flats: BTreeMap<_, _> = self.records.iter().map(|(f, o)| (f, o)).collect();
        let originals: BTreeMap<_, _> = self.records.iter().map(|(f, o)| (o, f)).collect();
        flats.len() == self.records.len() && originals.len() == self.records.len()
    }

    /// Encode as a string-array attribute value.
    pub fn to_attr_value(&self) -> AttrValue {
        AttrValue::StringArray(
            self.records
                .iter()
                .map(|(f, o)| format!("{f}{RECORD_SEPARATOR}{o}"))
                .collect(),
        )
    }

    /// Decode an attribute value written by [`Self::to_attr_value`].
    ///
    /// A single string holding one record is accepted too.
    pub fn from_attr_value(attribute: &str, value: &AttrValue) -> Result<Self> {
        let bad = |v: &str| Error::Parse {
            attribute: attribute.to_string(),
            value: v.to_string(),
        };
        let lines: Vec<&str> = match value {
            AttrValue::StringArray(items) => items.iter().map(String::as_str).collect(),
            AttrValue::String(s) => vec![s.as_str()],
            other => return Err(bad(&format!("{other:?}"))),
        };
        let mut map = ProvenanceMap::new();
        for line in lines {
            let (flat, original) = line.split_once(RECORD_SEPARATOR).ok_or_else(|| bad(line))?;
            if flat.is_empty() || !original.starts_with(path::GROUP_SEPARATOR) {
                return Err(bad(line));
            }
            map.push(flat, original);
        }
        Ok(map)
    }
}

/// The three provenance maps of one flattened dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceMaps {
    pub attributes: ProvenanceMap,
    pub dimensions: ProvenanceMap,
    pub variables: ProvenanceMap,
}

impl ProvenanceMaps {
    /// Write the maps as root attributes of `output`.
    pub fn write_to<O: DatasetBackend + ?Sized>(&self, output: &mut O) -> Result<()> {
        output.set_group_attribute(path::ROOT, ATTR_ATTRIBUTE_MAP, self.attributes.to_attr_value())?;
        output.set_group_attribute(path::ROOT, ATTR_DIMENSION_MAP, self.dimensions.to_attr_value())?;
        output.set_group_attribute(path::ROOT, ATTR_VARIABLE_MAP, self.variables.to_attr_value())?;
        Ok(())
    }

    /// Read the maps back from the root of a flat dataset. Missing
    /// attributes yield empty maps.
    pub fn read_from<B: DatasetBackend + ?Sized>(backend: &B) -> Result<Self> {
        let mut maps = ProvenanceMaps::default();
        for (name, value) in backend.group_attributes(path::ROOT)? {
            let slot = match name.as_str() {
                ATTR_ATTRIBUTE_MAP => &mut maps.attributes,
                ATTR_DIMENSION_MAP => &mut maps.dimensions,
                ATTR_VARIABLE_MAP => &mut maps.variables,
                _ => continue,
            };
            *slot = ProvenanceMap::from_attr_value(&name, &value)?;
        }
        Ok(maps)
    }

    /// Whether all three maps are bijections.
    pub fn is_bijective(&self) -> bool {
        self.attributes.is_bijective() && self.dimensions.is_bijective() && self.variables.is_bijective()
    }
}
