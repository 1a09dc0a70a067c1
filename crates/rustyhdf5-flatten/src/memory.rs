//! In-memory dataset backend.
//!
//! [`MemoryDataset`] holds a whole group tree in memory and implements every
//! [`DatasetBackend`] operation. It is the adapter used to stage datasets for
//! flattening and to receive flat output, and it doubles as a builder:
//!
//! ```
//! use rustyhdf5_flatten::memory::MemoryDataset;
//! use rustyhdf5_flatten::{AttrValue, NcType};
//!
//! let mut ds = MemoryDataset::new("mem://example");
//! let g1 = ds.create_group("/", "g1").unwrap();
//! let x = ds.add_dimension(&g1, "x", 10).unwrap();
//! let v1 = ds.add_variable(&g1, "v1", NcType::Double, &[&x]).unwrap();
//! ds.set_var_attr(&v1, "units", AttrValue::from("K")).unwrap();
//! assert_eq!(v1, "/g1/v1");
//! ```
//!
//! Writing past the current end of an unlimited dimension grows it; every
//! variable sharing that dimension sees the new size, padded with zeros.

use crate::backend::{BackendError, Capability, DatasetBackend, VariableDef, VariableInfo};
use crate::dimension::Dimension;
use crate::path;
use crate::selection::Selection;
use crate::types::{AttrValue, DataBuffer, NcType};

#[derive(Debug, Clone)]
struct MemGroup {
    name: String,
    path: String,
    children: Vec<usize>,
    attrs: Vec<(String, AttrValue)>,
    dims: Vec<Dimension>,
    vars: Vec<MemVariable>,
}

impl MemGroup {
    fn new(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            children: Vec::new(),
            attrs: Vec::new(),
            dims: Vec::new(),
            vars: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct MemVariable {
    name: String,
    nc_type: NcType,
    dimensions: Vec<String>,
    attrs: Vec<(String, AttrValue)>,
    data: DataBuffer,
    stored_shape: Vec<u64>,
}

/// A hierarchical dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    location: String,
    groups: Vec<MemGroup>,
    nested: bool,
}

impl MemoryDataset {
    /// Create an empty dataset (root group only) that supports nested groups.
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            groups: vec![MemGroup::new("", path::ROOT.to_string())],
            nested: true,
        }
    }

    /// Create an empty dataset restricted to the classic flat model: it can
    /// never hold child groups.
    pub fn flat(location: &str) -> Self {
        Self {
            nested: false,
            ..Self::new(location)
        }
    }

    /// Create a child group of `parent` and return its absolute path.
    pub fn create_group(&mut self, parent: &str, name: &str) -> Result<String, BackendError> {
        if !self.nested {
            return Err(BackendError::Unsupported(format!(
                "{}: flat dataset cannot hold group {name}",
                self.location
            )));
        }
        let parent_idx = self.group_index(parent)?;
        let group_path = path::join(&self.groups[parent_idx].path, name);
        if self.name_taken(parent_idx, name) {
            return Err(BackendError::AlreadyExists(group_path));
        }
        let idx = self.groups.len();
        self.groups
            .push(MemGroup::new(name, group_path.clone()));
        self.groups[parent_idx].children.push(idx);
        Ok(group_path)
    }

    /// Add a fixed-size dimension to `group` and return its absolute path.
    pub fn add_dimension(
        &mut self,
        group: &str,
        name: &str,
        size: u64,
    ) -> Result<String, BackendError> {
        self.create_dimension(group, name, Some(size))?;
        Ok(path::join(group, name))
    }

    /// Add an unlimited dimension with a current size of `size`.
    pub fn add_unlimited_dimension(
        &mut self,
        group: &str,
        name: &str,
        size: u64,
    ) -> Result<String, BackendError> {
        self.create_dimension(group, name, None)?;
        let idx = self.group_index(group)?;
        if let Some(dim) = self.groups[idx].dims.iter_mut().find(|d| d.name == name) {
            dim.size = size;
        }
        Ok(path::join(group, name))
    }

    /// Add a zero-filled variable and return its absolute path.
    pub fn add_variable(
        &mut self,
        group: &str,
        name: &str,
        nc_type: NcType,
        dims: &[&str],
    ) -> Result<String, BackendError> {
        let def = VariableDef {
            name: name.to_string(),
            nc_type,
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            fill_value: None,
        };
        self.create_variable(group, &def)?;
        Ok(path::join(group, name))
    }

    /// Set an attribute on a group.
    pub fn set_group_attr(
        &mut self,
        group: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        self.set_group_attribute(group, name, value)
    }

    /// Set an attribute on a variable.
    pub fn set_var_attr(
        &mut self,
        var: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        self.set_variable_attribute(var, name, value)
    }

    /// Replace all data of a variable.
    pub fn put_data(&mut self, var: &str, data: DataBuffer) -> Result<(), BackendError> {
        self.write_data(var, &Selection::All, &data)
    }

    /// Look up a group attribute.
    pub fn group_attr(&self, group: &str, name: &str) -> Option<&AttrValue> {
        let idx = self.group_index(group).ok()?;
        lookup(&self.groups[idx].attrs, name)
    }

    /// Look up a variable attribute.
    pub fn var_attr(&self, var: &str, name: &str) -> Option<&AttrValue> {
        let v = self.variable(var).ok()?;
        lookup(&v.attrs, name)
    }

    /// Read all data of a variable.
    pub fn data(&self, var: &str) -> Result<DataBuffer, BackendError> {
        self.read_data(var, &Selection::All)
    }

    /// Absolute paths of all groups in pre-order.
    pub fn group_paths(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.groups.len());
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            out.push(self.groups[idx].path.clone());
            stack.extend(self.groups[idx].children.iter().rev());
        }
        out
    }

    fn group_index(&self, group: &str) -> Result<usize, BackendError> {
        let mut idx = 0usize;
        for name in path::components(group) {
            idx = self.groups[idx]
                .children
                .iter()
                .copied()
                .find(|&c| self.groups[c].name == name)
                .ok_or_else(|| BackendError::NotFound(group.to_string()))?;
        }
        Ok(idx)
    }

    fn name_taken(&self, group_idx: usize, name: &str) -> bool {
        let g = &self.groups[group_idx];
        g.vars.iter().any(|v| v.name == name)
            || g.children.iter().any(|&c| self.groups[c].name == name)
    }

    fn var_location(&self, var: &str) -> Result<(usize, usize), BackendError> {
        let (group, name) = path::split(var);
        let g = self.group_index(group)?;
        let v = self.groups[g]
            .vars
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| BackendError::NotFound(var.to_string()))?;
        Ok((g, v))
    }

    fn variable(&self, var: &str) -> Result<&MemVariable, BackendError> {
        let (g, v) = self.var_location(var)?;
        Ok(&self.groups[g].vars[v])
    }

    fn dimension(&self, dim: &str) -> Result<&Dimension, BackendError> {
        let (group, name) = path::split(dim);
        let g = self.group_index(group)?;
        self.groups[g]
            .dims
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| BackendError::NotFound(dim.to_string()))
    }

    fn dimension_mut(&mut self, dim: &str) -> Result<&mut Dimension, BackendError> {
        let (group, name) = path::split(dim);
        let g = self.group_index(group)?;
        self.groups[g]
            .dims
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| BackendError::NotFound(dim.to_string()))
    }

    fn current_shape(&self, dims: &[String]) -> Result<Vec<u64>, BackendError> {
        dims.iter().map(|d| Ok(self.dimension(d)?.size)).collect()
    }
}

impl DatasetBackend for MemoryDataset {
    fn name(&self) -> &str {
        "memory"
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![
            Capability::ReadMetadata,
            Capability::ReadData,
            Capability::WriteMetadata,
            Capability::WriteData,
        ];
        if self.nested {
            caps.push(Capability::Groups);
        }
        caps
    }

    fn group_names(&self, group: &str) -> Result<Vec<String>, BackendError> {
        let idx = self.group_index(group)?;
        Ok(self.groups[idx]
            .children
            .iter()
            .map(|&c| self.groups[c].name.clone())
            .collect())
    }

    fn group_attributes(&self, group: &str) -> Result<Vec<(String, AttrValue)>, BackendError> {
        let idx = self.group_index(group)?;
        Ok(self.groups[idx].attrs.clone())
    }

    fn dimensions(&self, group: &str) -> Result<Vec<Dimension>, BackendError> {
        let idx = self.group_index(group)?;
        Ok(self.groups[idx].dims.clone())
    }

    fn variables(&self, group: &str) -> Result<Vec<VariableInfo>, BackendError> {
        let idx = self.group_index(group)?;
        self.groups[idx]
            .vars
            .iter()
            .map(|v| {
                Ok(VariableInfo {
                    name: v.name.clone(),
                    nc_type: v.nc_type,
                    dimensions: v.dimensions.clone(),
                    shape: self.current_shape(&v.dimensions)?,
                })
            })
            .collect()
    }

    fn variable_attributes(&self, var: &str) -> Result<Vec<(String, AttrValue)>, BackendError> {
        Ok(self.variable(var)?.attrs.clone())
    }

    fn read_data(&self, var: &str, selection: &Selection) -> Result<DataBuffer, BackendError> {
        let v = self.variable(var)?;
        let shape = self.current_shape(&v.dimensions)?;
        if !selection.fits(&shape) {
            return Err(BackendError::DataError(format!(
                "{var}: selection {selection:?} outside shape {shape:?}"
            )));
        }
        let (start, count) = selection.bounds(&shape);
        let n = count.iter().product::<u64>() as usize;
        let es = v.nc_type.element_size();
        let mut out = DataBuffer::zeroed(v.nc_type, n);
        let mut k = 0usize;
        for_each_index(&start, &count, |idx| {
            if idx.iter().zip(&v.stored_shape).all(|(&i, &s)| i < s) {
                copy_element(&v.data, linear(idx, &v.stored_shape), &mut out, k, es);
            }
            k += 1;
        });
        Ok(out)
    }

    fn create_dimension(
        &mut self,
        group: &str,
        name: &str,
        size: Option<u64>,
    ) -> Result<(), BackendError> {
        let idx = self.group_index(group)?;
        if self.groups[idx].dims.iter().any(|d| d.name == name) {
            return Err(BackendError::AlreadyExists(path::join(group, name)));
        }
        let dim = match size {
            Some(n) => Dimension::fixed(name, n),
            None => Dimension::unlimited(name, 0),
        };
        self.groups[idx].dims.push(dim);
        Ok(())
    }

    fn create_variable(&mut self, group: &str, def: &VariableDef) -> Result<(), BackendError> {
        let idx = self.group_index(group)?;
        if self.name_taken(idx, &def.name) {
            return Err(BackendError::AlreadyExists(path::join(group, &def.name)));
        }
        let shape = self.current_shape(&def.dimensions)?;
        let n = shape.iter().product::<u64>() as usize;
        let mut attrs = Vec::new();
        if let Some(fill) = &def.fill_value {
            attrs.push(("_FillValue".to_string(), fill.clone()));
        }
        self.groups[idx].vars.push(MemVariable {
            name: def.name.clone(),
            nc_type: def.nc_type,
            dimensions: def.dimensions.clone(),
            attrs,
            data: DataBuffer::zeroed(def.nc_type, n),
            stored_shape: shape,
        });
        Ok(())
    }

    fn set_group_attribute(
        &mut self,
        group: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        let idx = self.group_index(group)?;
        upsert(&mut self.groups[idx].attrs, name, value);
        Ok(())
    }

    fn set_variable_attribute(
        &mut self,
        var: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        let (g, v) = self.var_location(var)?;
        upsert(&mut self.groups[g].vars[v].attrs, name, value);
        Ok(())
    }

    fn write_data(
        &mut self,
        var: &str,
        selection: &Selection,
        data: &DataBuffer,
    ) -> Result<(), BackendError> {
        let (nc_type, dims) = {
            let v = self.variable(var)?;
            (v.nc_type, v.dimensions.clone())
        };
        match (data, nc_type.is_variable_length()) {
            (DataBuffer::Strings(_), true) | (DataBuffer::Raw(_), false) => {}
            _ => {
                return Err(BackendError::DataError(format!(
                    "{var}: buffer kind does not match {nc_type}"
                )))
            }
        }

        let shape = self.current_shape(&dims)?;
        let (start, count) = selection.bounds(&shape);
        if start.len() != shape.len() || count.len() != shape.len() {
            return Err(BackendError::DataError(format!(
                "{var}: selection rank does not match rank {}",
                shape.len()
            )));
        }
        let expected = count.iter().product::<u64>() as usize;
        if data.num_elements(nc_type) != expected {
            return Err(BackendError::DataError(format!(
                "{var}: expected {expected} elements, got {}",
                data.num_elements(nc_type)
            )));
        }
        for (d, dim_path) in dims.iter().enumerate() {
            let end = start[d] + count[d];
            let dim = self.dimension(dim_path)?;
            if end > dim.size && !dim.is_unlimited {
                return Err(BackendError::DataError(format!(
                    "{var}: write to {end} exceeds fixed dimension {dim_path} of size {}",
                    dim.size
                )));
            }
        }
        // Grow unlimited dimensions written past their current end.
        for (d, dim_path) in dims.iter().enumerate() {
            let end = start[d] + count[d];
            let dim = self.dimension_mut(dim_path)?;
            if end > dim.size {
                dim.size = end;
            }
        }

        let shape = self.current_shape(&dims)?;
        let (g, v) = self.var_location(var)?;
        let target = &mut self.groups[g].vars[v];
        if target.stored_shape != shape {
            relayout(target, &shape);
        }
        let es = nc_type.element_size();
        let mut k = 0usize;
        let stored_shape = target.stored_shape.clone();
        for_each_index(&start, &count, |idx| {
            copy_element(data, k, &mut target.data, linear(idx, &stored_shape), es);
            k += 1;
        });
        Ok(())
    }
}

fn lookup<'a>(attrs: &'a [(String, AttrValue)], name: &str) -> Option<&'a AttrValue> {
    attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn upsert(attrs: &mut Vec<(String, AttrValue)>, name: &str, value: AttrValue) {
    match attrs.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = value,
        None => attrs.push((name.to_string(), value)),
    }
}

/// Row-major linear offset of `idx` within `shape`.
fn linear(idx: &[u64], shape: &[u64]) -> usize {
    idx.iter()
        .zip(shape)
        .fold(0u64, |acc, (&i, &n)| acc * n + i) as usize
}

/// Call `f` for every index of the box `start..start+count`, row-major.
fn for_each_index(start: &[u64], count: &[u64], mut f: impl FnMut(&[u64])) {
    if count.contains(&0) {
        return;
    }
    let rank = start.len();
    let mut idx = start.to_vec();
    loop {
        f(&idx);
        let mut axis = rank;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < start[axis] + count[axis] {
                break;
            }
            idx[axis] = start[axis];
        }
    }
}

fn copy_element(src: &DataBuffer, si: usize, dst: &mut DataBuffer, di: usize, es: usize) {
    match (src, dst) {
        (DataBuffer::Raw(s), DataBuffer::Raw(d)) => {
            d[di * es..(di + 1) * es].copy_from_slice(&s[si * es..(si + 1) * es]);
        }
        (DataBuffer::Strings(s), DataBuffer::Strings(d)) => {
            d[di] = s[si].clone();
        }
        _ => {}
    }
}

/// Re-lay a variable's storage out for a new shape, keeping the overlap.
fn relayout(var: &mut MemVariable, shape: &[u64]) {
    let n = shape.iter().product::<u64>() as usize;
    let mut data = DataBuffer::zeroed(var.nc_type, n);
    let overlap: Vec<u64> = var
        .stored_shape
        .iter()
        .zip(shape)
        .map(|(&a, &b)| a.min(b))
        .collect();
    let es = var.nc_type.element_size();
    let zero = vec![0u64; shape.len()];
    for_each_index(&zero, &overlap, |idx| {
        copy_element(&var.data, linear(idx, &var.stored_shape), &mut data, linear(idx, shape), es);
    });
    var.data = data;
    var.stored_shape = shape.to_vec();
}
