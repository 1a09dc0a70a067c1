//! Rewrites resolved references to their flat names.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::attr_ref::AttrRefs;
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::name::flat_name;
use crate::path;
use crate::resolver::{placeholder, Resolution};
use crate::rules::{FlatteningRule, Namespace};

/// A reference that was replaced by a placeholder in lax mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedReference {
    /// Original absolute path of the referring variable.
    pub variable: String,
    pub attribute: String,
    /// The token as written in the original attribute.
    pub reference: String,
    /// Candidates, when the failure was an ambiguous lateral search.
    pub candidates: Vec<String>,
}

/// Original-path → flat-name maps, precomputed from the snapshot so that
/// forward references to objects not yet copied can be rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMaps {
    pub dimensions: BTreeMap<String, String>,
    pub variables: BTreeMap<String, String>,
}

impl NameMaps {
    /// Flat names of every dimension and variable in `hierarchy`.
    pub fn from_hierarchy(hierarchy: &Hierarchy) -> Self {
        let mut maps = NameMaps::default();
        for group in hierarchy.groups() {
            for dim in &group.dimensions {
                maps.dimensions
                    .insert(path::join(&group.path, dim), flat_name(&group.path, dim));
            }
            for var in &group.variables {
                maps.variables
                    .insert(var.path.clone(), flat_name(&group.path, &var.name));
            }
        }
        maps
    }

    fn get(&self, ns: Namespace) -> &BTreeMap<String, String> {
        match ns {
            Namespace::Dimension => &self.dimensions,
            Namespace::Variable => &self.variables,
        }
    }

    /// Flat name of `path`, trying `ns` first and the other namespace when
    /// `both` is set.
    pub fn lookup(&self, path: &str, ns: Namespace, both: bool) -> Option<&str> {
        self.get(ns)
            .get(path)
            .or_else(|| both.then(|| self.get(ns.other()).get(path)).flatten())
            .map(String::as_str)
    }
}

/// One attribute's parsed value with the resolution of each token.
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    pub variable: String,
    pub flat_variable: String,
    pub attribute: String,
    pub rule: &'static FlatteningRule,
    pub refs: AttrRefs,
    pub resolutions: HashMap<String, Resolution>,
}

/// Rewrites resolved attributes, honouring strict or lax handling of
/// references that have no flat counterpart.
#[derive(Debug)]
pub struct NameRewriter<'a> {
    maps: &'a NameMaps,
    lax: bool,
    degraded: Vec<DegradedReference>,
}

impl<'a> NameRewriter<'a> {
    pub fn new(maps: &'a NameMaps, lax: bool) -> Self {
        Self {
            maps,
            lax,
            degraded: Vec::new(),
        }
    }

    /// New attribute text for `attr`.
    pub fn rewrite(&mut self, attr: &ResolvedAttribute) -> Result<String> {
        let rule = attr.rule;
        let maps = self.maps;
        let rewritten = attr
            .refs
            .map_tokens(rule.resolve_key, rule.resolve_value, |token| {
                match attr.resolutions.get(token) {
                    Some(Resolution::Reference { path, namespace }) => {
                        match maps.lookup(path, *namespace, rule.allows_both()) {
                            Some(flat) => Ok(flat.to_string()),
                            None => self.unmapped(attr, token),
                        }
                    }
                    Some(Resolution::NotFound { placeholder }) => Ok(placeholder.clone()),
                    Some(Resolution::StandardName) | None => Ok(token.to_string()),
                }
            })?;
        Ok(rewritten.serialize())
    }

    fn unmapped(&mut self, attr: &ResolvedAttribute, token: &str) -> Result<String> {
        if !self.lax {
            return Err(Error::UnresolvedReference {
                variable: attr.variable.clone(),
                attribute: attr.attribute.clone(),
                reference: token.to_string(),
            });
        }
        warn!(
            variable = %attr.variable,
            attribute = %attr.attribute,
            reference = token,
            "reference has no flat counterpart, using placeholder"
        );
        self.degraded.push(DegradedReference {
            variable: attr.variable.clone(),
            attribute: attr.attribute.clone(),
            reference: token.to_string(),
            candidates: Vec::new(),
        });
        Ok(placeholder(token))
    }

    /// References degraded while rewriting.
    pub fn into_degraded(self) -> Vec<DegradedReference> {
        self.degraded
    }
}
