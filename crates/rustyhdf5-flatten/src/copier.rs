//! Structural copy of a group tree into a flat dataset.
//!
//! The copier works one step at a time so the session can interleave
//! reference resolution: group attributes and dimensions first, then each
//! variable is created, its references settled, and only then its data
//! copied. Dimension paths are translated through names precomputed from
//! the snapshot, so every dimension a variable refers to already has a flat
//! name when the variable is created.

use tracing::{debug, trace};

use crate::attr_ref::reference_text;
use crate::backend::{BackendError, DatasetBackend, VariableDef, VariableInfo};
use crate::config::FlattenConfig;
use crate::error::{Error, Result};
use crate::name::flat_name;
use crate::path;
use crate::provenance::ProvenanceMaps;
use crate::rewriter::NameMaps;
use crate::rules::{rule_for, FlatteningRule};
use crate::selection::{Selection, SliceIter};
use crate::types::AttrValue;

const FILL_VALUE: &str = "_FillValue";

/// A rule-governed attribute waiting for reference resolution.
#[derive(Debug, Clone)]
pub struct PendingAttribute {
    /// Original absolute path of the owning variable.
    pub variable: String,
    /// Absolute path of the flat copy.
    pub flat_variable: String,
    pub attribute: String,
    pub value: String,
    pub rule: &'static FlatteningRule,
}

/// A variable created in the output, data not yet copied.
#[derive(Debug, Clone)]
pub struct CreatedVariable {
    pub original: String,
    pub flat_path: String,
    pub pending: Vec<PendingAttribute>,
}

/// Copies groups, dimensions, variables and data from `input` to the root
/// of `output`, recording provenance as it goes.
pub struct StructuralCopier<'a, I: ?Sized, O: ?Sized> {
    input: &'a I,
    output: &'a mut O,
    config: &'a FlattenConfig,
    provenance: ProvenanceMaps,
}

impl<'a, I, O> StructuralCopier<'a, I, O>
where
    I: DatasetBackend + ?Sized,
    O: DatasetBackend + ?Sized,
{
    pub fn new(input: &'a I, output: &'a mut O, config: &'a FlattenConfig) -> Self {
        Self {
            input,
            output,
            config,
            provenance: ProvenanceMaps::default(),
        }
    }

    /// The output backend.
    pub fn output(&self) -> &O {
        &*self.output
    }

    /// Copy the attributes and dimensions of `group`; returns its variables.
    pub fn copy_group(&mut self, group: &str) -> Result<Vec<VariableInfo>> {
        debug!(group, "copying group");
        for (name, value) in self.input.group_attributes(group)? {
            let flat = flat_name(group, &name);
            trace!(original = %path::join(group, &name), flat = %flat, "group attribute");
            self.output.set_group_attribute(path::ROOT, &flat, value)?;
            self.provenance.attributes.push(&flat, &path::join(group, &name));
        }

        for dim in self.input.dimensions(group)? {
            let original = path::join(group, &dim.name);
            let flat = flat_name(group, &dim.name);
            trace!(original = %original, flat = %flat, size = dim.size, unlimited = dim.is_unlimited, "dimension");
            self.output.create_dimension(path::ROOT, &flat, dim.creation_size())?;
            self.provenance.dimensions.push(&flat, &original);
        }

        Ok(self.input.variables(group)?)
    }

    /// Create the flat copy of `info`, copy its attributes verbatim and
    /// return the rule-governed ones for resolution.
    pub fn create_variable(
        &mut self,
        group: &str,
        info: &VariableInfo,
        names: &NameMaps,
    ) -> Result<CreatedVariable> {
        let original = path::join(group, &info.name);
        let flat = flat_name(group, &info.name);
        let flat_path = path::join(path::ROOT, &flat);

        let dimensions = info
            .dimensions
            .iter()
            .map(|d| {
                names
                    .dimensions
                    .get(d)
                    .map(|f| path::join(path::ROOT, f))
                    .ok_or_else(|| {
                        BackendError::NotFound(format!("dimension {d} of {original}"))
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let attrs = self.input.variable_attributes(&original)?;
        let fill_value = attrs
            .iter()
            .find(|(n, _)| n == FILL_VALUE)
            .map(|(_, v)| v.clone());
        trace!(original = %original, flat = %flat, nc_type = %info.nc_type, "variable");
        self.output.create_variable(
            path::ROOT,
            &VariableDef {
                name: flat.clone(),
                nc_type: info.nc_type,
                dimensions,
                fill_value,
            },
        )?;
        self.provenance.variables.push(&flat, &original);

        let mut pending = Vec::new();
        for (name, value) in attrs {
            if name == FILL_VALUE {
                continue;
            }
            if let Some(rule) = rule_for(&name) {
                pending.push(PendingAttribute {
                    variable: original.clone(),
                    flat_variable: flat_path.clone(),
                    attribute: name.clone(),
                    value: reference_text(&name, &value)?,
                    rule,
                });
            }
            self.output.set_variable_attribute(&flat_path, &name, value)?;
        }

        Ok(CreatedVariable {
            original,
            flat_path,
            pending,
        })
    }

    /// Overwrite attribute `name` on flat variable `flat_path`.
    pub fn set_variable_attribute(
        &mut self,
        flat_path: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        self.output.set_variable_attribute(flat_path, name, value)?;
        Ok(())
    }

    /// Copy the data of `original` into `flat_path`, whole or in slices.
    /// Nothing is copied when data copying is off.
    ///
    /// Shapes come from the live input: unlimited output dimensions start
    /// empty and grow as the slices land.
    pub fn copy_data(&mut self, original: &str, flat_path: &str, info: &VariableInfo) -> Result<()> {
        if !self.config.copy_data || info.shape.contains(&0) {
            return Ok(());
        }
        let element_size = info.nc_type.element_size();
        match self.config.slice_shape_for(original, &info.shape, element_size) {
            None => {
                let data = self.input.read_data(original, &Selection::All)?;
                let whole = Selection::Hyperslab {
                    start: vec![0; info.shape.len()],
                    count: info.shape.clone(),
                };
                self.output.write_data(flat_path, &whole, &data)?;
            }
            Some(slice_shape) => {
                if slice_shape.len() != info.shape.len() || slice_shape.contains(&0) {
                    return Err(Error::Configuration(format!(
                        "slice shape {slice_shape:?} does not fit {original} of shape {:?}",
                        info.shape
                    )));
                }
                debug!(variable = original, ?slice_shape, "copying in slices");
                for sel in SliceIter::new(&info.shape, &slice_shape) {
                    trace!(variable = original, selection = ?sel, "slice");
                    let data = self.input.read_data(original, &sel)?;
                    self.output.write_data(flat_path, &sel, &data)?;
                }
            }
        }
        Ok(())
    }

    /// Write the provenance attributes and hand back the maps.
    pub fn finish(self) -> Result<ProvenanceMaps> {
        self.provenance.write_to(self.output)?;
        Ok(self.provenance)
    }
}
