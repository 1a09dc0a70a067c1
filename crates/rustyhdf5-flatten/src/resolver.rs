//! Reference resolution against the original hierarchy.
//!
//! A token found in a reference-bearing attribute is classified by shape:
//!
//! - absolute (`/g/lat`): taken as-is, existence is checked on rewrite;
//! - relative (`../g/lat`, `sub/lat`): walked from the referring variable's
//!   group, `..` ascends, `.` stays, anything else descends;
//! - bare (`lat`): proximity search. The referrer's group is examined,
//!   then each ancestor in turn. For rules with `stop_at_local_apex` the
//!   upward walk stops at the first group defining a *dimension* of the
//!   same name (the local apex); the apex's other descendant subtrees are
//!   then searched depth-first and the shallowest match wins.
//!
//! When the upward walk of an apex-bounded rule reaches the root without
//! finding the name or an apex, the nearest ancestor owning one of the
//! referrer's dimensions serves as the apex instead. This lets coordinates
//! stored in a sibling subgroup of the dimension's group be found.

use crate::attr_ref::parse_attribute;
use crate::error::Result;
use crate::hierarchy::{GroupId, Hierarchy, VariableNode};
use crate::path;
use crate::rules::{FlatteningRule, Namespace};

/// Final outcome of resolving one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An object of the original hierarchy.
    Reference { path: String, namespace: Namespace },
    /// A standard name, left untouched.
    StandardName,
    /// Not resolvable; replaced by `placeholder` in lax mode.
    NotFound { placeholder: String },
}

/// What a search produced, before strict/lax handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reference { path: String, namespace: Namespace },
    StandardName,
    Unresolved,
    Ambiguous { candidates: Vec<String> },
}

#[derive(Debug)]
enum Lookup {
    Found(String),
    NotFound,
    Ambiguous(Vec<String>),
}

/// Marker prefix of lax-mode placeholders.
pub const REF_NOT_FOUND: &str = "REF_NOT_FOUND";

/// Placeholder substituted for an unresolvable `token`.
pub fn placeholder(token: &str) -> String {
    format!("{REF_NOT_FOUND}_{token}")
}

/// Resolves attribute tokens against a [`Hierarchy`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'h> {
    hierarchy: &'h Hierarchy,
}

impl<'h> Resolver<'h> {
    pub fn new(hierarchy: &'h Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Resolve `token` found in `rule`'s attribute on variable `var`.
    pub fn resolve(
        &self,
        rule: &FlatteningRule,
        var: &VariableNode,
        token: &str,
    ) -> Result<Outcome> {
        if token.starts_with(path::GROUP_SEPARATOR) {
            return Ok(Outcome::Reference {
                path: token.to_string(),
                namespace: rule.primary_namespace(),
            });
        }

        let mut ambiguous = None;
        for ns in rule.namespaces() {
            let lookup = if token.contains(path::GROUP_SEPARATOR) {
                self.relative(var.group, ns, token)
            } else {
                self.proximity(rule, var, ns, token)
            };
            match lookup {
                Lookup::Found(found) => {
                    if rule.limit_to_scalar_coordinates
                        && ns == Namespace::Variable
                        && !self.is_scalar_coordinate(var, token, &found)?
                    {
                        return Ok(Outcome::StandardName);
                    }
                    return Ok(Outcome::Reference {
                        path: found,
                        namespace: ns,
                    });
                }
                Lookup::Ambiguous(candidates) => {
                    ambiguous.get_or_insert(candidates);
                }
                Lookup::NotFound => {}
            }
        }

        if rule.accept_standard_names {
            return Ok(Outcome::StandardName);
        }
        Ok(match ambiguous {
            Some(candidates) => Outcome::Ambiguous { candidates },
            None => Outcome::Unresolved,
        })
    }

    fn relative(&self, start: GroupId, ns: Namespace, token: &str) -> Lookup {
        let h = self.hierarchy;
        let Some((dirs, last)) = token.rsplit_once(path::GROUP_SEPARATOR) else {
            return Lookup::NotFound;
        };
        let mut group = start;
        for seg in dirs.split(path::GROUP_SEPARATOR) {
            let next = match seg {
                "" | "." => Some(group),
                ".." => h.parent(group),
                name => h.child(group, name),
            };
            match next {
                Some(g) => group = g,
                None => return Lookup::NotFound,
            }
        }
        if !last.is_empty() && h.defines(group, ns, last) {
            Lookup::Found(path::join(&h.group(group).path, last))
        } else {
            Lookup::NotFound
        }
    }

    fn proximity(
        &self,
        rule: &FlatteningRule,
        var: &VariableNode,
        ns: Namespace,
        name: &str,
    ) -> Lookup {
        let h = self.hierarchy;
        let mut current = var.group;
        let mut walked: Option<GroupId> = None;
        loop {
            if h.defines(current, ns, name) {
                return Lookup::Found(path::join(&h.group(current).path, name));
            }
            if rule.stop_at_local_apex && h.defines(current, Namespace::Dimension, name) {
                return self.lateral(current, walked, ns, name);
            }
            match h.parent(current) {
                Some(parent) => {
                    walked = Some(current);
                    current = parent;
                }
                None => break,
            }
        }

        if rule.stop_at_local_apex {
            if let Some((apex, walked)) = self.dimension_apex(var) {
                return self.lateral(apex, walked, ns, name);
            }
        }
        Lookup::NotFound
    }

    /// Nearest ancestor-or-self of `var`'s group owning one of its
    /// dimensions, with the child of that ancestor on the way back down.
    fn dimension_apex(&self, var: &VariableNode) -> Option<(GroupId, Option<GroupId>)> {
        let h = self.hierarchy;
        let mut current = var.group;
        let mut walked = None;
        loop {
            let here = h.group(current).path.as_str();
            if var.dimensions.iter().any(|d| path::split(d).0 == here) {
                return Some((current, walked));
            }
            walked = Some(current);
            current = h.parent(current)?;
        }
    }

    /// Depth-first search of `apex`'s descendants, skipping the `excluded`
    /// branch. Only the shallowest matches count.
    fn lateral(
        &self,
        apex: GroupId,
        excluded: Option<GroupId>,
        ns: Namespace,
        name: &str,
    ) -> Lookup {
        let mut found = Vec::new();
        for &child in &self.hierarchy.group(apex).children {
            if Some(child) != excluded {
                self.descend(child, 1, ns, name, &mut found);
            }
        }
        let Some(shallowest) = found.iter().map(|(d, _)| *d).min() else {
            return Lookup::NotFound;
        };
        let mut best: Vec<String> = found
            .into_iter()
            .filter(|(d, _)| *d == shallowest)
            .map(|(_, p)| p)
            .collect();
        if best.len() == 1 {
            Lookup::Found(best.remove(0))
        } else {
            Lookup::Ambiguous(best)
        }
    }

    fn descend(
        &self,
        group: GroupId,
        depth: usize,
        ns: Namespace,
        name: &str,
        found: &mut Vec<(usize, String)>,
    ) {
        let h = self.hierarchy;
        if h.defines(group, ns, name) {
            found.push((depth, path::join(&h.group(group).path, name)));
            return;
        }
        for &child in &h.group(group).children {
            self.descend(child, depth + 1, ns, name, found);
        }
    }

    /// `token` is listed in `var`'s `coordinates` and `found` is rank 0.
    fn is_scalar_coordinate(&self, var: &VariableNode, token: &str, found: &str) -> Result<bool> {
        let Some(raw) = var.coordinates.as_deref() else {
            return Ok(false);
        };
        if !parse_attribute("coordinates", raw)?.contains_key(token) {
            return Ok(false);
        }
        Ok(self
            .hierarchy
            .variable(found)
            .is_some_and(|target| target.rank() == 0))
    }
}
