//! Flattening rules: which attributes carry structural references and how
//! their tokens are resolved.
//!
//! Covers CF-1.11 attributes (coordinates, bounds, cell measures, formula
//! terms, grid mappings, discrete sampling geometries, geometries, cell
//! methods, coordinate subsampling), UGRID mesh topology attributes and
//! CFA aggregation attributes.

/// The namespace a reference is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Dimension,
    Variable,
}

impl Namespace {
    /// The other namespace.
    pub fn other(self) -> Self {
        match self {
            Namespace::Dimension => Namespace::Variable,
            Namespace::Variable => Namespace::Dimension,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Dimension => f.write_str("dimension"),
            Namespace::Variable => f.write_str("variable"),
        }
    }
}

/// How the tokens of one attribute are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatteningRule {
    /// Attribute name.
    pub name: &'static str,
    /// Priority of the dimension namespace (0 = never a dimension).
    pub ref_to_dim: u8,
    /// Priority of the variable namespace (0 = never a variable).
    pub ref_to_var: u8,
    /// Keys of the parsed attribute are references.
    pub resolve_key: bool,
    /// Values of the parsed attribute are references.
    pub resolve_value: bool,
    /// Proximity search stops at the local apex and searches laterally.
    pub stop_at_local_apex: bool,
    /// Unresolvable tokens are kept as standard names.
    pub accept_standard_names: bool,
    /// Variable references must be scalar coordinates of the referrer.
    pub limit_to_scalar_coordinates: bool,
}

impl FlatteningRule {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            ref_to_dim: 0,
            ref_to_var: 0,
            resolve_key: false,
            resolve_value: false,
            stop_at_local_apex: false,
            accept_standard_names: false,
            limit_to_scalar_coordinates: false,
        }
    }

    const fn var(mut self, priority: u8) -> Self {
        self.ref_to_var = priority;
        self
    }

    const fn dim(mut self, priority: u8) -> Self {
        self.ref_to_dim = priority;
        self
    }

    const fn keys(mut self) -> Self {
        self.resolve_key = true;
        self
    }

    const fn values(mut self) -> Self {
        self.resolve_value = true;
        self
    }

    const fn apex(mut self) -> Self {
        self.stop_at_local_apex = true;
        self
    }

    const fn standard_names(mut self) -> Self {
        self.accept_standard_names = true;
        self
    }

    const fn scalar_coordinates(mut self) -> Self {
        self.limit_to_scalar_coordinates = true;
        self
    }

    /// Namespaces to search, in order. The second entry is only present when
    /// both priorities are non-zero.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let primary = if self.ref_to_dim > self.ref_to_var {
            Namespace::Dimension
        } else {
            Namespace::Variable
        };
        if self.ref_to_dim > 0 && self.ref_to_var > 0 {
            vec![primary, primary.other()]
        } else {
            vec![primary]
        }
    }

    /// The namespace searched first.
    pub fn primary_namespace(&self) -> Namespace {
        self.namespaces()[0]
    }

    /// Whether both namespaces may be searched.
    pub fn allows_both(&self) -> bool {
        self.ref_to_dim > 0 && self.ref_to_var > 0
    }
}

/// Built-in rules, one per reference-bearing attribute.
pub static RULES: &[FlatteningRule] = &[
    // CF core
    FlatteningRule::new("ancillary_variables").var(1).keys(),
    FlatteningRule::new("bounds").var(1).keys(),
    FlatteningRule::new("cell_measures").var(1).values(),
    FlatteningRule::new("climatology").var(1).keys(),
    FlatteningRule::new("coordinates").var(1).keys().apex(),
    FlatteningRule::new("formula_terms").var(1).values(),
    FlatteningRule::new("grid_mapping").var(1).keys().values(),
    FlatteningRule::new("cell_methods")
        .dim(2)
        .var(1)
        .keys()
        .standard_names()
        .scalar_coordinates(),
    // discrete sampling geometries and compression
    FlatteningRule::new("compress").dim(1).keys(),
    FlatteningRule::new("instance_dimension").dim(1).keys(),
    FlatteningRule::new("sample_dimension").dim(1).keys(),
    // geometries
    FlatteningRule::new("geometry").var(1).keys(),
    FlatteningRule::new("interior_ring").var(1).keys(),
    FlatteningRule::new("node_coordinates").var(1).keys(),
    FlatteningRule::new("node_count").var(1).keys(),
    FlatteningRule::new("nodes").var(1).keys(),
    FlatteningRule::new("part_node_count").var(1).keys(),
    // coordinate subsampling
    FlatteningRule::new("coordinate_interpolation").var(1).keys().values(),
    FlatteningRule::new("tie_point_mapping").dim(1).var(2).keys().values(),
    // UGRID mesh topology
    FlatteningRule::new("mesh").var(1).keys(),
    FlatteningRule::new("edge_coordinates").var(1).keys(),
    FlatteningRule::new("face_coordinates").var(1).keys(),
    FlatteningRule::new("edge_node_connectivity").var(1).keys(),
    FlatteningRule::new("face_node_connectivity").var(1).keys(),
    FlatteningRule::new("face_face_connectivity").var(1).keys(),
    FlatteningRule::new("face_edge_connectivity").var(1).keys(),
    FlatteningRule::new("edge_face_connectivity").var(1).keys(),
    FlatteningRule::new("edge_dimension").dim(1).keys(),
    FlatteningRule::new("face_dimension").dim(1).keys(),
    FlatteningRule::new("location_index_set").var(1).keys(),
    // aggregation
    FlatteningRule::new("aggregated_dimensions").dim(1).keys(),
    FlatteningRule::new("aggregated_data").var(1).values(),
];

/// The rule governing attribute `name`, if it carries references.
pub fn rule_for(name: &str) -> Option<&'static FlatteningRule> {
    RULES.iter().find(|r| r.name == name)
}
