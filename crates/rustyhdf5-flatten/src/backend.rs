//! Dataset backend abstraction.
//!
//! The flattener never talks to a storage library directly. It drives a
//! [`DatasetBackend`], a path-addressed view of a hierarchical dataset:
//! groups (`/`, `/g1`, `/g1/c`), their dimensions, variables and
//! attributes, and hyperslab reads/writes of variable data.
//!
//! ```text
//! ┌───────────────────────────┐
//! │  Flattener session        │
//! ├───────────────────────────┤
//! │   DatasetBackend          │  ← trait defined here
//! ├───────┬───────┬───────────┤
//! │Memory │netCDF4│   Zarr    │  ← thin adapters
//! └───────┴───────┴───────────┘
//! ```
//!
//! Write methods default to [`BackendError::Unsupported`], so read-only
//! adapters only implement the read side.

use std::io;

use crate::dimension::Dimension;
use crate::selection::Selection;
use crate::types::{AttrValue, DataBuffer, NcType};

/// Capabilities that a backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Can list groups, dimensions, variables and attributes.
    ReadMetadata,
    /// Can read variable data.
    ReadData,
    /// Can create dimensions, variables and attributes.
    WriteMetadata,
    /// Can write variable data.
    WriteData,
    /// Supports nested groups.
    Groups,
}

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// I/O error from the underlying storage.
    #[error("backend I/O error: {0}")]
    Io(#[from] io::Error),
    /// The requested operation is not supported by this backend.
    #[error("backend operation not supported: {0}")]
    Unsupported(String),
    /// Object (group, dimension, variable) not found.
    #[error("object not found: {0}")]
    NotFound(String),
    /// An object with this name already exists in the target namespace.
    #[error("duplicate name: {0}")]
    AlreadyExists(String),
    /// Data shape, type or selection error.
    #[error("data error: {0}")]
    DataError(String),
}

/// Metadata describing one variable of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    /// Variable name within its group.
    pub name: String,
    /// Element type.
    pub nc_type: NcType,
    /// Absolute paths of the variable's dimensions, outermost first.
    pub dimensions: Vec<String>,
    /// Current shape (dimension sizes).
    pub shape: Vec<u64>,
}

impl VariableInfo {
    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// Everything needed to create a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    /// Variable name within the target group.
    pub name: String,
    /// Element type.
    pub nc_type: NcType,
    /// Absolute paths of already-created dimensions.
    pub dimensions: Vec<String>,
    /// Fill value; must be fixed at creation time.
    pub fill_value: Option<AttrValue>,
}

/// A hierarchical dataset as seen by the flattener.
pub trait DatasetBackend {
    /// Returns the backend name (e.g., "memory", "netcdf4").
    fn name(&self) -> &str;

    /// Identifies the physical dataset. Two handles with the same location
    /// refer to the same storage.
    fn location(&self) -> &str;

    /// Returns the set of capabilities this backend supports.
    fn capabilities(&self) -> Vec<Capability>;

    /// Check if a specific capability is supported.
    fn supports(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }

    /// Names of the child groups of `group`, in creation order.
    fn group_names(&self, group: &str) -> Result<Vec<String>, BackendError>;

    /// Attributes of `group`, in creation order.
    fn group_attributes(&self, group: &str) -> Result<Vec<(String, AttrValue)>, BackendError>;

    /// Dimensions defined in `group`, with their current sizes.
    fn dimensions(&self, group: &str) -> Result<Vec<Dimension>, BackendError>;

    /// Variables defined in `group`.
    fn variables(&self, group: &str) -> Result<Vec<VariableInfo>, BackendError>;

    /// Attributes of the variable at absolute path `var`.
    fn variable_attributes(&self, var: &str) -> Result<Vec<(String, AttrValue)>, BackendError>;

    /// Read the selected elements of `var`.
    fn read_data(&self, var: &str, selection: &Selection) -> Result<DataBuffer, BackendError>;

    /// Create a dimension; `size == None` creates an unlimited dimension.
    fn create_dimension(
        &mut self,
        group: &str,
        name: &str,
        size: Option<u64>,
    ) -> Result<(), BackendError> {
        let _ = (group, name, size);
        Err(BackendError::Unsupported(format!(
            "{}: create_dimension not supported",
            self.name()
        )))
    }

    /// Create a variable in `group`.
    fn create_variable(&mut self, group: &str, def: &VariableDef) -> Result<(), BackendError> {
        let _ = (group, def);
        Err(BackendError::Unsupported(format!(
            "{}: create_variable not supported",
            self.name()
        )))
    }

    /// Create or overwrite an attribute of `group`.
    fn set_group_attribute(
        &mut self,
        group: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        let _ = (group, name, value);
        Err(BackendError::Unsupported(format!(
            "{}: set_group_attribute not supported",
            self.name()
        )))
    }

    /// Create or overwrite an attribute of the variable at `var`.
    fn set_variable_attribute(
        &mut self,
        var: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        let _ = (var, name, value);
        Err(BackendError::Unsupported(format!(
            "{}: set_variable_attribute not supported",
            self.name()
        )))
    }

    /// Write `data` into the selected elements of `var`.
    fn write_data(
        &mut self,
        var: &str,
        selection: &Selection,
        data: &DataBuffer,
    ) -> Result<(), BackendError> {
        let _ = (var, selection, data);
        Err(BackendError::Unsupported(format!(
            "{}: write_data not supported",
            self.name()
        )))
    }
}
