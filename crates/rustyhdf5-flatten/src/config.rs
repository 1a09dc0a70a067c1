//! Flatten configuration.
//!
//! All fields are defaulted, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use rustyhdf5_flatten::FlattenConfig;
//!
//! let cfg = FlattenConfig::from_json_str(r#"{ "lax_mode": true }"#).unwrap();
//! assert!(cfg.lax_mode);
//! assert!(cfg.copy_data);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::selection::default_slice_shape;

/// Default byte budget of one data slice (128 MiB).
pub const DEFAULT_SLICE_BYTES: u64 = 134_217_728;

/// Default cap on group nesting.
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 1024;

/// Options controlling one flatten call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Replace unresolvable references by placeholders instead of failing.
    pub lax_mode: bool,
    /// Copy variable data, not just metadata.
    pub copy_data: bool,
    /// Per-variable slice shapes keyed by original absolute path. `None`
    /// copies every variable whole; a `None` shape for a listed variable
    /// means "derive one from `default_slice_bytes`".
    pub copy_slice_shapes: Option<BTreeMap<String, Option<Vec<u64>>>>,
    /// Byte budget used to derive default slice shapes.
    pub default_slice_bytes: u64,
    /// Deepest group nesting accepted.
    pub max_group_depth: usize,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            lax_mode: false,
            copy_data: true,
            copy_slice_shapes: None,
            default_slice_bytes: DEFAULT_SLICE_BYTES,
            max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }
}

impl FlattenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lax_mode(mut self, lax: bool) -> Self {
        self.lax_mode = lax;
        self
    }

    pub fn with_copy_data(mut self, copy: bool) -> Self {
        self.copy_data = copy;
        self
    }

    /// Copy `var` in slices of `shape`; `None` derives the shape from the
    /// byte budget.
    pub fn with_slice_shape(mut self, var: &str, shape: Option<Vec<u64>>) -> Self {
        self.copy_slice_shapes
            .get_or_insert_with(BTreeMap::new)
            .insert(var.to_string(), shape);
        self
    }

    pub fn with_default_slice_bytes(mut self, bytes: u64) -> Self {
        self.default_slice_bytes = bytes;
        self
    }

    pub fn with_max_group_depth(mut self, depth: usize) -> Self {
        self.max_group_depth = depth;
        self
    }

    /// Slice shape for variable `var` of `shape`, or `None` to copy it whole.
    pub fn slice_shape_for(&self, var: &str, shape: &[u64], element_size: usize) -> Option<Vec<u64>> {
        match self.copy_slice_shapes.as_ref()?.get(var)? {
            Some(fixed) => Some(fixed.clone()),
            None => Some(default_slice_shape(shape, element_size, self.default_slice_bytes)),
        }
    }

    /// Decode a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Encode as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
