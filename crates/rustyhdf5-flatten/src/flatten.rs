//! The flatten session: one call, one input/output pair.
//!
//! The input is snapshotted before anything is written. The session then
//! walks the snapshot pre-order and takes every variable through
//! `Copy → Resolve → Rewrite` before moving on, so strict mode stops at the
//! first variable holding a bad reference. `Done` follows once the
//! provenance attributes are written.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::attr_ref::parse_attribute;
use crate::backend::{Capability, DatasetBackend};
use crate::config::FlattenConfig;
use crate::copier::{PendingAttribute, StructuralCopier};
use crate::error::{Error, Result};
use crate::hierarchy::{Hierarchy, VariableNode};
use crate::path;
use crate::provenance::ProvenanceMaps;
use crate::resolver::{placeholder, Outcome, Resolution, Resolver};
use crate::rewriter::{DegradedReference, NameMaps, NameRewriter, ResolvedAttribute};
use crate::types::AttrValue;

/// Progress of a [`Flattener`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Copy,
    Resolve,
    Rewrite,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Copy => "copy",
            Phase::Resolve => "resolve",
            Phase::Rewrite => "rewrite",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of a successful flatten call.
#[derive(Debug, Clone, Default)]
pub struct FlattenReport {
    pub provenance: ProvenanceMaps,
    /// References replaced by placeholders (lax mode only).
    pub degraded: Vec<DegradedReference>,
    /// Number of groups visited, root included.
    pub groups: usize,
    /// Number of reference-bearing attributes rewritten.
    pub rewritten_attributes: usize,
}

impl FlattenReport {
    /// Whether any reference was replaced by a placeholder.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Flatten `input` into the root group of `output`.
///
/// ```
/// use rustyhdf5_flatten::{flatten, FlattenConfig, MemoryDataset, NcType};
///
/// let mut input = MemoryDataset::new("mem://in");
/// let g = input.create_group("/", "g").unwrap();
/// let x = input.add_dimension(&g, "x", 2).unwrap();
/// input.add_variable(&g, "v", NcType::Double, &[&x]).unwrap();
///
/// let mut output = MemoryDataset::flat("mem://out");
/// let report = flatten(&input, &mut output, &FlattenConfig::default()).unwrap();
/// assert_eq!(report.provenance.variables.flat("/g/v"), Some("g__v"));
/// ```
pub fn flatten<I, O>(input: &I, output: &mut O, config: &FlattenConfig) -> Result<FlattenReport>
where
    I: DatasetBackend + ?Sized,
    O: DatasetBackend + ?Sized,
{
    Flattener::new(input, output, config).run()
}

/// Per-call state of a flatten operation.
pub struct Flattener<'a, I: ?Sized, O: ?Sized> {
    input: &'a I,
    copier: StructuralCopier<'a, I, O>,
    config: &'a FlattenConfig,
    phase: Phase,
    degraded: Vec<DegradedReference>,
}

impl<'a, I, O> Flattener<'a, I, O>
where
    I: DatasetBackend + ?Sized,
    O: DatasetBackend + ?Sized,
{
    pub fn new(input: &'a I, output: &'a mut O, config: &'a FlattenConfig) -> Self {
        Self {
            input,
            copier: StructuralCopier::new(input, output, config),
            config,
            phase: Phase::Init,
            degraded: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase transition");
            self.phase = phase;
        }
    }

    /// Run every phase to completion.
    pub fn run(mut self) -> Result<FlattenReport> {
        info!(
            input = self.input.location(),
            output = self.copier.output().location(),
            lax = self.config.lax_mode,
            copy_data = self.config.copy_data,
            "flattening dataset"
        );
        self.check_preconditions()?;

        let hierarchy = Hierarchy::from_backend(self.input, self.config.max_group_depth)?;
        let names = NameMaps::from_hierarchy(&hierarchy);
        let resolver = Resolver::new(&hierarchy);
        let mut rewriter = NameRewriter::new(&names, self.config.lax_mode);
        let mut rewritten = 0;

        for group in hierarchy.groups() {
            self.enter(Phase::Copy);
            for info in self.copier.copy_group(&group.path)? {
                let created = self.copier.create_variable(&group.path, &info, &names)?;
                if !created.pending.is_empty() {
                    let var = hierarchy.variable(&created.original).ok_or_else(|| {
                        Error::Configuration(format!(
                            "variable {} missing from snapshot",
                            created.original
                        ))
                    })?;

                    self.enter(Phase::Resolve);
                    let mut resolved = Vec::with_capacity(created.pending.len());
                    for pending in created.pending {
                        resolved.push(self.resolve(&resolver, var, pending)?);
                    }

                    self.enter(Phase::Rewrite);
                    for attr in &resolved {
                        let value = rewriter.rewrite(attr)?;
                        self.copier.set_variable_attribute(
                            &attr.flat_variable,
                            &attr.attribute,
                            AttrValue::String(value),
                        )?;
                    }
                    rewritten += resolved.len();
                    self.enter(Phase::Copy);
                }
                self.copier.copy_data(&created.original, &created.flat_path, &info)?;
            }
        }
        self.degraded.extend(rewriter.into_degraded());

        let provenance = self.copier.finish()?;
        self.phase = Phase::Done;
        debug!(to = %self.phase, "phase transition");
        let report = FlattenReport {
            groups: hierarchy.len(),
            provenance,
            degraded: self.degraded,
            rewritten_attributes: rewritten,
        };
        info!(
            groups = report.groups,
            dimensions = report.provenance.dimensions.len(),
            variables = report.provenance.variables.len(),
            attributes = report.provenance.attributes.len(),
            rewritten = report.rewritten_attributes,
            degraded = report.degraded.len(),
            "flatten complete"
        );
        Ok(report)
    }

    fn check_preconditions(&self) -> Result<()> {
        let (input, output) = (self.input, self.copier.output());
        if input.location() == output.location() {
            return Err(Error::Configuration(format!(
                "input and output are the same dataset: {}",
                input.location()
            )));
        }
        let mut required = vec![
            ("input", input.supports(Capability::ReadMetadata), "read metadata"),
            ("output", output.supports(Capability::WriteMetadata), "write metadata"),
        ];
        if self.config.copy_data {
            required.push(("input", input.supports(Capability::ReadData), "read data"));
            required.push(("output", output.supports(Capability::WriteData), "write data"));
        }
        if let Some((side, _, what)) = required.into_iter().find(|(_, ok, _)| !ok) {
            return Err(Error::Configuration(format!("{side} backend cannot {what}")));
        }
        if !output.group_names(path::ROOT)?.is_empty() {
            return Err(Error::Configuration(format!(
                "output {} already contains groups",
                output.location()
            )));
        }
        Ok(())
    }

    /// Resolve every token of one rule-governed attribute of `var`.
    fn resolve(
        &mut self,
        resolver: &Resolver<'_>,
        var: &VariableNode,
        pending: PendingAttribute,
    ) -> Result<ResolvedAttribute> {
        let refs = parse_attribute(&pending.attribute, &pending.value)?;
        let rule = pending.rule;

        let mut tokens: Vec<&str> = Vec::new();
        for (key, values) in refs.entries() {
            if rule.resolve_key {
                tokens.push(key);
            }
            if let (true, Some(vs)) = (rule.resolve_value, values) {
                tokens.extend(vs.iter().map(String::as_str));
            }
        }

        let mut resolutions: HashMap<String, Resolution> = HashMap::new();
        for token in tokens {
            if resolutions.contains_key(token) {
                continue;
            }
            let resolution = match resolver.resolve(rule, var, token)? {
                Outcome::Reference { path, namespace } => Resolution::Reference { path, namespace },
                Outcome::StandardName => Resolution::StandardName,
                Outcome::Unresolved => {
                    self.fail(&pending.variable, &pending.attribute, token, Vec::new())?
                }
                Outcome::Ambiguous { candidates } => {
                    self.fail(&pending.variable, &pending.attribute, token, candidates)?
                }
            };
            resolutions.insert(token.to_string(), resolution);
        }

        Ok(ResolvedAttribute {
            variable: pending.variable,
            flat_variable: pending.flat_variable,
            attribute: pending.attribute,
            rule,
            refs,
            resolutions,
        })
    }

    /// Strict mode: the error. Lax mode: a placeholder, logged and recorded.
    fn fail(
        &mut self,
        variable: &str,
        attribute: &str,
        reference: &str,
        candidates: Vec<String>,
    ) -> Result<Resolution> {
        if !self.config.lax_mode {
            return Err(if candidates.is_empty() {
                Error::UnresolvedReference {
                    variable: variable.to_string(),
                    attribute: attribute.to_string(),
                    reference: reference.to_string(),
                }
            } else {
                Error::AmbiguousReference {
                    variable: variable.to_string(),
                    attribute: attribute.to_string(),
                    reference: reference.to_string(),
                    candidates,
                }
            });
        }
        warn!(
            variable,
            attribute,
            reference,
            ?candidates,
            "unresolved reference replaced by placeholder"
        );
        self.degraded.push(DegradedReference {
            variable: variable.to_string(),
            attribute: attribute.to_string(),
            reference: reference.to_string(),
            candidates,
        });
        Ok(Resolution::NotFound {
            placeholder: placeholder(reference),
        })
    }
}
