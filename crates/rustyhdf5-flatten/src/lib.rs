//! Group flattening for netCDF-family datasets.
//!
//! A dataset organized as a tree of nested groups is rewritten into a single
//! root group. Every object is renamed after its path (`/g1/c/lat` becomes
//! `g1__c__lat`), and every structural cross-reference held in CF, UGRID or
//! CFA attributes (`coordinates`, `bounds`, `cell_methods`, `mesh`, …) is
//! resolved against the original tree and rewritten to the new flat names.
//! Three provenance attributes on the flat root record where each object
//! came from.
//!
//! Storage is reached through the [`DatasetBackend`] trait; [`MemoryDataset`]
//! is a complete in-memory implementation.
//!
//! # Example
//!
//! ```
//! use rustyhdf5_flatten::{flatten, AttrValue, FlattenConfig, MemoryDataset, NcType};
//!
//! let mut input = MemoryDataset::new("mem://nested");
//! let g1 = input.create_group("/", "g1").unwrap();
//! let x = input.add_dimension(&g1, "x", 3).unwrap();
//! let v1 = input.add_variable(&g1, "v1", NcType::Float, &[&x]).unwrap();
//! input.set_var_attr(&v1, "coordinates", AttrValue::from("c1")).unwrap();
//! let c = input.create_group(&g1, "c").unwrap();
//! input.add_variable(&c, "c1", NcType::Float, &[&x]).unwrap();
//!
//! let mut output = MemoryDataset::flat("mem://flat");
//! flatten(&input, &mut output, &FlattenConfig::default()).unwrap();
//!
//! assert_eq!(
//!     output.var_attr("/g1__v1", "coordinates"),
//!     Some(&AttrValue::from("g1__c__c1"))
//! );
//! ```

pub mod attr_ref;
pub mod backend;
pub mod config;
pub mod copier;
pub mod dimension;
pub mod error;
pub mod flatten;
pub mod hierarchy;
pub mod memory;
pub mod name;
pub mod path;
pub mod provenance;
pub mod resolver;
pub mod rewriter;
pub mod rules;
pub mod selection;
pub mod types;

pub use attr_ref::AttrRefs;
pub use backend::{BackendError, Capability, DatasetBackend, VariableDef, VariableInfo};
pub use config::FlattenConfig;
pub use dimension::Dimension;
pub use error::{Error, Result};
pub use flatten::{flatten, FlattenReport, Flattener, Phase};
pub use memory::MemoryDataset;
pub use name::flat_name;
pub use provenance::{ProvenanceMap, ProvenanceMaps};
pub use rewriter::DegradedReference;
pub use rules::{rule_for, FlatteningRule, Namespace, RULES};
pub use selection::{Selection, SliceIter};
pub use types::{AttrValue, DataBuffer, NcType};
