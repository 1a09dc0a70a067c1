//! Snapshot of the original group tree.
//!
//! Reference resolution always runs against the pre-flatten hierarchy. A
//! flatten session scans the input into a [`Hierarchy`] before anything is
//! written; flat names are precomputed from it and the resolver answers its
//! upward, relative and lateral searches from this index without going back
//! to the backend. Group ids follow pre-order, so walking the arena in id
//! order visits parents before children.

use crate::attr_ref::reference_text;
use crate::backend::DatasetBackend;
use crate::error::{Error, Result};
use crate::path;
use crate::rules::Namespace;

/// Index of a group within a [`Hierarchy`].
pub type GroupId = usize;

/// One group of the original tree.
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub name: String,
    pub path: String,
    pub parent: Option<GroupId>,
    pub children: Vec<GroupId>,
    pub dimensions: Vec<String>,
    pub variables: Vec<VariableNode>,
}

/// One variable of the original tree, with what resolution needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
    pub path: String,
    pub group: GroupId,
    /// Absolute dimension paths.
    pub dimensions: Vec<String>,
    /// Raw `coordinates` attribute, if any.
    pub coordinates: Option<String>,
}

impl VariableNode {
    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// Arena of groups; id 0 is the root.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    groups: Vec<GroupNode>,
}

impl Hierarchy {
    /// Id of the root group.
    pub const ROOT: GroupId = 0;

    /// An empty hierarchy; the first group added becomes the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the whole tree of `backend`, pre-order.
    pub fn from_backend<B: DatasetBackend + ?Sized>(backend: &B, max_depth: usize) -> Result<Self> {
        let mut h = Hierarchy::new();
        h.scan(backend, path::ROOT, None, 0, max_depth)?;
        Ok(h)
    }

    fn scan<B: DatasetBackend + ?Sized>(
        &mut self,
        backend: &B,
        group: &str,
        parent: Option<GroupId>,
        depth: usize,
        max_depth: usize,
    ) -> Result<()> {
        if depth > max_depth {
            return Err(Error::GroupDepthExceeded {
                path: group.to_string(),
                limit: max_depth,
            });
        }
        let id = self.add_group(parent, group);
        for dim in backend.dimensions(group)? {
            self.add_dimension(id, &dim.name);
        }
        for info in backend.variables(group)? {
            let var_path = path::join(group, &info.name);
            let coordinates = backend
                .variable_attributes(&var_path)?
                .into_iter()
                .find(|(n, _)| n == "coordinates")
                .map(|(n, v)| reference_text(&n, &v))
                .transpose()?;
            self.add_variable(id, &info.name, info.dimensions, coordinates);
        }
        for child in backend.group_names(group)? {
            self.scan(backend, &path::join(group, &child), Some(id), depth + 1, max_depth)?;
        }
        Ok(())
    }

    /// Record a group and return its id.
    pub fn add_group(&mut self, parent: Option<GroupId>, group_path: &str) -> GroupId {
        let id = self.groups.len();
        let (_, name) = path::split(group_path);
        self.groups.push(GroupNode {
            name: name.to_string(),
            path: if path::is_root(group_path) {
                path::ROOT.to_string()
            } else {
                group_path.to_string()
            },
            parent,
            children: Vec::new(),
            dimensions: Vec::new(),
            variables: Vec::new(),
        });
        if let Some(p) = parent {
            self.groups[p].children.push(id);
        }
        id
    }

    /// Record a dimension of group `id`.
    pub fn add_dimension(&mut self, id: GroupId, name: &str) {
        self.groups[id].dimensions.push(name.to_string());
    }

    /// Record a variable of group `id`.
    pub fn add_variable(
        &mut self,
        id: GroupId,
        name: &str,
        dimensions: Vec<String>,
        coordinates: Option<String>,
    ) {
        let var_path = path::join(&self.groups[id].path, name);
        self.groups[id].variables.push(VariableNode {
            name: name.to_string(),
            path: var_path,
            group: id,
            dimensions,
            coordinates,
        });
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no group has been recorded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate all groups, pre-order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupNode> {
        self.groups.iter()
    }

    pub fn group(&self, id: GroupId) -> &GroupNode {
        &self.groups[id]
    }

    pub fn parent(&self, id: GroupId) -> Option<GroupId> {
        self.groups[id].parent
    }

    pub fn child(&self, id: GroupId, name: &str) -> Option<GroupId> {
        self.groups[id]
            .children
            .iter()
            .copied()
            .find(|&c| self.groups[c].name == name)
    }

    /// Id of the group at absolute `group_path`.
    pub fn find_group(&self, group_path: &str) -> Option<GroupId> {
        if self.groups.is_empty() {
            return None;
        }
        path::components(group_path).try_fold(Self::ROOT, |id, name| self.child(id, name))
    }

    /// The variable at absolute `var_path`.
    pub fn variable(&self, var_path: &str) -> Option<&VariableNode> {
        let (group, name) = path::split(var_path);
        let id = self.find_group(group)?;
        self.groups[id].variables.iter().find(|v| v.name == name)
    }

    /// Whether group `id` defines `name` in namespace `ns`.
    pub fn defines(&self, id: GroupId, ns: Namespace, name: &str) -> bool {
        let g = &self.groups[id];
        match ns {
            Namespace::Dimension => g.dimensions.iter().any(|d| d == name),
            Namespace::Variable => g.variables.iter().any(|v| v.name == name),
        }
    }

    /// Iterate all variables, pre-order.
    pub fn variables(&self) -> impl Iterator<Item = &VariableNode> {
        self.groups.iter().flat_map(|g| g.variables.iter())
    }
}
