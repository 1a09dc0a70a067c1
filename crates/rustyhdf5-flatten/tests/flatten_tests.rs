//! End-to-end tests for rustyhdf5-flatten.
//!
//! Nested datasets are built in memory with `MemoryDataset`, flattened into a
//! flat `MemoryDataset`, and the output names, rewritten attributes, data and
//! provenance attributes are checked.

use rustyhdf5_flatten::name::sha1_hex;
use rustyhdf5_flatten::provenance::{ATTR_DIMENSION_MAP, ATTR_VARIABLE_MAP};
use rustyhdf5_flatten::selection::Selection;
use rustyhdf5_flatten::{
    flatten, AttrRefs, AttrValue, BackendError, Capability, DataBuffer, DatasetBackend, Dimension,
    Error, FlattenConfig, MemoryDataset, NcType, ProvenanceMaps, VariableDef, VariableInfo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Install a test-writer subscriber once; `RUST_LOG=rustyhdf5_flatten=trace`
/// shows the per-object copy log.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn strict() -> FlattenConfig {
    FlattenConfig::default()
}

fn lax() -> FlattenConfig {
    FlattenConfig::default().with_lax_mode(true)
}

fn attr(ds: &MemoryDataset, var: &str, name: &str) -> String {
    ds.var_attr(var, name)
        .and_then(AttrValue::as_str)
        .unwrap_or_else(|| panic!("{var} has no string attribute {name}"))
        .to_string()
}

fn run(input: &MemoryDataset, config: &FlattenConfig) -> MemoryDataset {
    let mut output = MemoryDataset::flat("mem://flat");
    flatten(input, &mut output, config).unwrap();
    output
}

/// root → /g1 (x = 10, v1(x) coordinates="c1") → /g1/c (c1(x))
fn scenario_a() -> MemoryDataset {
    let mut ds = MemoryDataset::new("mem://scenario-a");
    let g1 = ds.create_group("/", "g1").unwrap();
    let x = ds.add_dimension(&g1, "x", 10).unwrap();
    let v1 = ds.add_variable(&g1, "v1", NcType::Float, &[&x]).unwrap();
    ds.set_var_attr(&v1, "coordinates", AttrValue::from("c1")).unwrap();
    let c = ds.create_group(&g1, "c").unwrap();
    ds.add_variable(&c, "c1", NcType::Float, &[&x]).unwrap();
    ds
}

/// root (x dim, x var)
///   P (x dim)
///     B: v(P/x) coordinates="x"
///     S: x(P/x)
fn apex_tree() -> MemoryDataset {
    let mut ds = MemoryDataset::new("mem://apex");
    let rx = ds.add_dimension("/", "x", 2).unwrap();
    ds.add_variable("/", "x", NcType::Double, &[&rx]).unwrap();
    let p = ds.create_group("/", "P").unwrap();
    let px = ds.add_dimension(&p, "x", 3).unwrap();
    let b = ds.create_group(&p, "B").unwrap();
    let v = ds.add_variable(&b, "v", NcType::Double, &[&px]).unwrap();
    ds.set_var_attr(&v, "coordinates", AttrValue::from("x")).unwrap();
    let s = ds.create_group(&p, "S").unwrap();
    ds.add_variable(&s, "x", NcType::Double, &[&px]).unwrap();
    ds
}

/// Read-write backend that refuses data writes.
struct MetadataOnly(MemoryDataset);

impl DatasetBackend for MetadataOnly {
    fn name(&self) -> &str {
        "metadata-only"
    }
    fn location(&self) -> &str {
        self.0.location()
    }
    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::ReadMetadata, Capability::WriteMetadata]
    }
    fn group_names(&self, group: &str) -> Result<Vec<String>, BackendError> {
        self.0.group_names(group)
    }
    fn group_attributes(&self, group: &str) -> Result<Vec<(String, AttrValue)>, BackendError> {
        self.0.group_attributes(group)
    }
    fn dimensions(&self, group: &str) -> Result<Vec<Dimension>, BackendError> {
        self.0.dimensions(group)
    }
    fn variables(&self, group: &str) -> Result<Vec<VariableInfo>, BackendError> {
        self.0.variables(group)
    }
    fn variable_attributes(&self, var: &str) -> Result<Vec<(String, AttrValue)>, BackendError> {
        self.0.variable_attributes(var)
    }
    fn read_data(&self, var: &str, selection: &Selection) -> Result<DataBuffer, BackendError> {
        self.0.read_data(var, selection)
    }
    fn create_dimension(
        &mut self,
        group: &str,
        name: &str,
        size: Option<u64>,
    ) -> Result<(), BackendError> {
        self.0.create_dimension(group, name, size)
    }
    fn create_variable(&mut self, group: &str, def: &VariableDef) -> Result<(), BackendError> {
        self.0.create_variable(group, def)
    }
    fn set_group_attribute(
        &mut self,
        group: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        self.0.set_group_attribute(group, name, value)
    }
    fn set_variable_attribute(
        &mut self,
        var: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BackendError> {
        self.0.set_variable_attribute(var, name, value)
    }
}

// ---------------------------------------------------------------------------
// Names and structure
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_a_names_and_coordinates() {
    init_tracing();
    let input = scenario_a();
    let mut output = MemoryDataset::flat("mem://flat");
    let report = flatten(&input, &mut output, &strict()).unwrap();

    let dims: Vec<String> = output.dimensions("/").unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(dims, vec!["g1__x"]);
    let vars: Vec<String> = output.variables("/").unwrap().into_iter().map(|v| v.name).collect();
    assert_eq!(vars, vec!["g1__v1", "g1__c__c1"]);
    assert_eq!(attr(&output, "/g1__v1", "coordinates"), "g1__c__c1");

    let c1 = output
        .variables("/")
        .unwrap()
        .into_iter()
        .find(|v| v.name == "g1__c__c1")
        .unwrap();
    assert_eq!(c1.dimensions, vec!["/g1__x"]);
    assert_eq!(c1.shape, vec![10]);

    assert_eq!(report.groups, 3);
    assert!(!report.is_degraded());
    assert!(output.group_names("/").unwrap().is_empty());
}

#[test]
fn test_scenario_b_long_group_path_is_hashed() {
    let mut input = MemoryDataset::new("mem://deep");
    let mut group = "/".to_string();
    for level in 0..12 {
        group = input
            .create_group(&group, &format!("group_level_{level:02}_with_padding"))
            .unwrap();
    }
    assert!(group.len() + 3 >= 256);
    input.add_variable(&group, "v", NcType::Int, &[]).unwrap();
    let long_base = "w".repeat(260);
    input.add_variable(&group, &long_base, NcType::Int, &[]).unwrap();

    let mut output = MemoryDataset::flat("mem://flat");
    let report = flatten(&input, &mut output, &strict()).unwrap();

    let short = format!("{}__v", sha1_hex(group.as_bytes()));
    assert_eq!(report.provenance.variables.flat(&format!("{group}/v")), Some(short.as_str()));

    let sanitized = group.trim_start_matches('/').replace('/', "__");
    let full = sha1_hex(format!("{sanitized}__{long_base}").as_bytes());
    let flat = report
        .provenance
        .variables
        .flat(&format!("{group}/{long_base}"))
        .unwrap();
    assert_eq!(flat, full);
    assert!(!flat.contains("__"));

    for info in output.variables("/").unwrap() {
        assert!(info.name.len() < 256);
        assert!(!info.name.contains('/'));
    }
}

#[test]
fn test_scenario_c_mapping_round_trip() {
    let refs = AttrRefs::parse("area: areacello").unwrap();
    assert_eq!(
        refs.entries(),
        &[("area".to_string(), Some(vec!["areacello".to_string()]))]
    );
    assert_eq!(refs.serialize(), "area: areacello");
}

#[test]
fn test_group_attributes_are_prefixed() {
    let mut input = scenario_a();
    input.set_group_attr("/", "Conventions", AttrValue::from("CF-1.11")).unwrap();
    input.set_group_attr("/g1", "comment", AttrValue::from("inner")).unwrap();
    let output = run(&input, &strict());
    assert_eq!(output.group_attr("/", "Conventions"), Some(&AttrValue::from("CF-1.11")));
    assert_eq!(output.group_attr("/", "g1__comment"), Some(&AttrValue::from("inner")));
}

#[test]
fn test_colliding_flat_names_rejected() {
    let mut input = MemoryDataset::new("mem://collide");
    input.add_variable("/", "g__v", NcType::Int, &[]).unwrap();
    let g = input.create_group("/", "g").unwrap();
    input.add_variable(&g, "v", NcType::Int, &[]).unwrap();
    let mut output = MemoryDataset::flat("mem://flat");
    let err = flatten(&input, &mut output, &strict()).unwrap_err();
    assert!(matches!(err, Error::Backend(BackendError::AlreadyExists(_))));
}

#[test]
fn test_depth_limit() {
    let mut input = MemoryDataset::new("mem://deep");
    let mut group = "/".to_string();
    for i in 0..4 {
        group = input.create_group(&group, &format!("d{i}")).unwrap();
    }
    input.add_dimension(&group, "x", 1).unwrap();
    input.set_group_attr("/d0", "title", AttrValue::from("deep")).unwrap();
    let mut output = MemoryDataset::flat("mem://flat");
    let err = flatten(&input, &mut output, &strict().with_max_group_depth(2)).unwrap_err();
    assert!(matches!(err, Error::GroupDepthExceeded { limit: 2, .. }));
    assert!(output.group_attributes("/").unwrap().is_empty());
    assert!(output.dimensions("/").unwrap().is_empty());
}

#[test]
fn test_flatten_is_deterministic() {
    let input = apex_tree();
    let mut a = MemoryDataset::flat("mem://a");
    let mut b = MemoryDataset::flat("mem://b");
    let ra = flatten(&input, &mut a, &strict()).unwrap();
    let rb = flatten(&input, &mut b, &strict()).unwrap();
    assert_eq!(ra.provenance, rb.provenance);
    assert_eq!(a.group_attributes("/").unwrap(), b.group_attributes("/").unwrap());
    assert_eq!(
        a.variable_attributes("/P__B__v").unwrap(),
        b.variable_attributes("/P__B__v").unwrap()
    );
}

// ---------------------------------------------------------------------------
// Reference resolution
// ---------------------------------------------------------------------------

#[test]
fn test_nearest_ancestor_dimension_wins() {
    let mut input = MemoryDataset::new("mem://prox");
    input.add_dimension("/", "x", 5).unwrap();
    let a = input.create_group("/", "A").unwrap();
    input.add_dimension(&a, "x", 3).unwrap();
    let b = input.create_group(&a, "B").unwrap();
    let v = input.add_variable(&b, "counts", NcType::Int, &[]).unwrap();
    input.set_var_attr(&v, "instance_dimension", AttrValue::from("x")).unwrap();

    let output = run(&input, &strict());
    assert_eq!(attr(&output, "/A__B__counts", "instance_dimension"), "A__x");
}

#[test]
fn test_local_apex_searches_siblings_not_root() {
    let output = run(&apex_tree(), &strict());
    assert_eq!(attr(&output, "/P__B__v", "coordinates"), "P__S__x");
}

#[test]
fn test_local_apex_never_climbs_past_apex() {
    let mut input = MemoryDataset::new("mem://apex-miss");
    let rx = input.add_dimension("/", "x", 2).unwrap();
    input.add_variable("/", "x", NcType::Double, &[&rx]).unwrap();
    let p = input.create_group("/", "P").unwrap();
    let px = input.add_dimension(&p, "x", 3).unwrap();
    let b = input.create_group(&p, "B").unwrap();
    let v = input.add_variable(&b, "v", NcType::Double, &[&px]).unwrap();
    input.set_var_attr(&v, "coordinates", AttrValue::from("x")).unwrap();

    let mut output = MemoryDataset::flat("mem://flat");
    let err = flatten(&input, &mut output, &strict()).unwrap_err();
    assert!(matches!(err, Error::UnresolvedReference { ref reference, .. } if reference == "x"));
}

#[test]
fn test_equal_depth_candidates_are_ambiguous() {
    let mut input = apex_tree();
    let u = input.create_group("/P", "U").unwrap();
    input.add_variable(&u, "x", NcType::Double, &["/P/x"]).unwrap();

    let mut output = MemoryDataset::flat("mem://strict");
    match flatten(&input, &mut output, &strict()).unwrap_err() {
        Error::AmbiguousReference { candidates, .. } => {
            assert_eq!(candidates, vec!["/P/S/x".to_string(), "/P/U/x".to_string()]);
        }
        other => panic!("expected ambiguity, got {other}"),
    }

    let mut output = MemoryDataset::flat("mem://lax");
    let report = flatten(&input, &mut output, &lax()).unwrap();
    assert_eq!(attr(&output, "/P__B__v", "coordinates"), "REF_NOT_FOUND_x");
    assert_eq!(report.degraded.len(), 1);
    assert_eq!(report.degraded[0].candidates.len(), 2);
}

#[test]
fn test_relative_and_absolute_references() {
    let mut input = MemoryDataset::new("mem://paths");
    let g = input.create_group("/", "g").unwrap();
    let x = input.add_dimension(&g, "x", 4).unwrap();
    let aux = input.create_group(&g, "aux").unwrap();
    input.add_variable(&aux, "x_bnds", NcType::Double, &[&x]).unwrap();
    let data = input.create_group(&g, "data").unwrap();
    let v = input.add_variable(&data, "v", NcType::Double, &[&x]).unwrap();
    input.set_var_attr(&v, "bounds", AttrValue::from("../aux/x_bnds")).unwrap();
    input
        .set_var_attr(&v, "ancillary_variables", AttrValue::from("/g/aux/x_bnds"))
        .unwrap();

    let output = run(&input, &strict());
    assert_eq!(attr(&output, "/g__data__v", "bounds"), "g__aux__x_bnds");
    assert_eq!(attr(&output, "/g__data__v", "ancillary_variables"), "g__aux__x_bnds");
}

#[test]
fn test_formula_terms_values_rewritten() {
    let mut input = MemoryDataset::new("mem://formula");
    let g = input.create_group("/", "ocean").unwrap();
    let z = input.add_dimension(&g, "z", 3).unwrap();
    input.add_variable(&g, "sigma", NcType::Double, &[&z]).unwrap();
    input.add_variable(&g, "depth", NcType::Double, &[]).unwrap();
    let lev = input.add_variable(&g, "lev", NcType::Double, &[&z]).unwrap();
    input
        .set_var_attr(&lev, "formula_terms", AttrValue::from("sigma: sigma depth: depth"))
        .unwrap();

    let output = run(&input, &strict());
    assert_eq!(
        attr(&output, "/ocean__lev", "formula_terms"),
        "sigma: ocean__sigma depth: ocean__depth"
    );
}

#[test]
fn test_cell_methods_namespaces_and_standard_names() {
    let mut input = MemoryDataset::new("mem://cm");
    let g = input.create_group("/", "g").unwrap();
    let t = input.add_dimension(&g, "time", 2).unwrap();
    input.add_variable(&g, "height", NcType::Double, &[]).unwrap();
    input.add_variable(&g, "level", NcType::Double, &[]).unwrap();
    let tas = input.add_variable(&g, "tas", NcType::Double, &[&t]).unwrap();
    input.set_var_attr(&tas, "coordinates", AttrValue::from("height")).unwrap();
    input
        .set_var_attr(
            &tas,
            "cell_methods",
            AttrValue::from("time: mean height: point level: point area: mean"),
        )
        .unwrap();

    let output = run(&input, &strict());
    assert_eq!(
        attr(&output, "/g__tas", "cell_methods"),
        "g__time: mean g__height: point level: point area: mean"
    );
    assert_eq!(attr(&output, "/g__tas", "coordinates"), "g__height");
}

// ---------------------------------------------------------------------------
// Strict and lax modes
// ---------------------------------------------------------------------------

fn unresolvable() -> MemoryDataset {
    let mut ds = MemoryDataset::new("mem://scenario-d");
    let a = ds.add_variable("/", "a", NcType::Int, &[]).unwrap();
    ds.set_var_attr(&a, "bounds", AttrValue::from("foo")).unwrap();
    let b = ds.add_variable("/", "b", NcType::Int, &[]).unwrap();
    ds.set_var_attr(&b, "bounds", AttrValue::from("bar")).unwrap();
    let g = ds.create_group("/", "g").unwrap();
    ds.add_variable(&g, "c", NcType::Int, &[]).unwrap();
    ds
}

#[test]
fn test_scenario_d_strict_stops_at_first_failure() {
    let mut output = MemoryDataset::flat("mem://flat");
    let err = flatten(&unresolvable(), &mut output, &strict()).unwrap_err();
    match err {
        Error::UnresolvedReference {
            variable,
            attribute,
            reference,
        } => {
            assert_eq!(variable, "/a");
            assert_eq!(attribute, "bounds");
            assert_eq!(reference, "foo");
        }
        other => panic!("expected unresolved reference, got {other}"),
    }

    let written: Vec<String> = output.variables("/").unwrap().into_iter().map(|v| v.name).collect();
    assert_eq!(written, vec!["a"]);
    assert!(output.group_attr("/", ATTR_VARIABLE_MAP).is_none());
}

#[test]
fn test_scenario_d_lax_uses_placeholders() {
    init_tracing();
    let mut output = MemoryDataset::flat("mem://flat");
    let report = flatten(&unresolvable(), &mut output, &lax()).unwrap();
    let a = attr(&output, "/a", "bounds");
    assert!(a.contains("REF_NOT_FOUND"));
    assert!(a.contains("foo"));
    assert_eq!(attr(&output, "/b", "bounds"), "REF_NOT_FOUND_bar");
    let refs: Vec<&str> = report.degraded.iter().map(|d| d.reference.as_str()).collect();
    assert_eq!(refs, vec!["foo", "bar"]);
}

#[test]
fn test_malformed_attribute_fatal_in_both_modes() {
    let mut input = scenario_a();
    input
        .set_var_attr("/g1/v1", "coordinates", AttrValue::from("c1, c2"))
        .unwrap();
    for cfg in [strict(), lax()] {
        let mut output = MemoryDataset::flat("mem://flat");
        let err = flatten(&input, &mut output, &cfg).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}

// ---------------------------------------------------------------------------
// Data copy
// ---------------------------------------------------------------------------

fn gridded(values: &[f64]) -> MemoryDataset {
    let mut ds = MemoryDataset::new("mem://grid");
    let g = ds.create_group("/", "g").unwrap();
    let y = ds.add_dimension(&g, "y", 5).unwrap();
    let x = ds.add_dimension(&g, "x", 7).unwrap();
    let v = ds.add_variable(&g, "field", NcType::Double, &[&y, &x]).unwrap();
    ds.set_var_attr(&v, "_FillValue", AttrValue::F64(-999.0)).unwrap();
    ds.put_data(&v, DataBuffer::from_f64(values)).unwrap();
    ds
}

#[test]
fn test_sliced_copy_matches_source() {
    init_tracing();
    let values: Vec<f64> = (0..35).map(|i| i as f64 * 0.5).collect();
    let input = gridded(&values);

    let fixed = run(&input, &strict().with_slice_shape("/g/field", Some(vec![2, 3])));
    assert_eq!(fixed.data("/g__field").unwrap().to_f64().unwrap(), values);

    // 48 bytes / 8 = 6 elements over rank 2 → 2x2 slices
    let derived = run(
        &input,
        &strict()
            .with_slice_shape("/g/field", None)
            .with_default_slice_bytes(48),
    );
    assert_eq!(derived.data("/g__field").unwrap().to_f64().unwrap(), values);

    let whole = run(&input, &strict());
    assert_eq!(whole.data("/g__field").unwrap().to_f64().unwrap(), values);
    assert_eq!(whole.var_attr("/g__field", "_FillValue"), Some(&AttrValue::F64(-999.0)));
}

#[test]
fn test_unlimited_dimension_keeps_live_size() {
    let mut input = MemoryDataset::new("mem://unlim");
    let g = input.create_group("/", "g").unwrap();
    let t = input.add_unlimited_dimension(&g, "time", 4).unwrap();
    let v = input.add_variable(&g, "time", NcType::Double, &[&t]).unwrap();
    input.put_data(&v, DataBuffer::from_f64(&[0.0, 6.0, 12.0, 18.0])).unwrap();

    let output = run(&input, &strict());
    let dim = output
        .dimensions("/")
        .unwrap()
        .into_iter()
        .find(|d| d.name == "g__time")
        .unwrap();
    assert!(dim.is_unlimited);
    assert_eq!(dim.size, 4);
    assert_eq!(
        output.data("/g__time").unwrap().to_f64().unwrap(),
        vec![0.0, 6.0, 12.0, 18.0]
    );
}

#[test]
fn test_metadata_only_copy() {
    let values: Vec<f64> = (0..35).map(f64::from).collect();
    let input = gridded(&values);
    let output = run(&input, &strict().with_copy_data(false));
    assert_eq!(output.data("/g__field").unwrap().to_f64().unwrap(), vec![0.0; 35]);
}

// ---------------------------------------------------------------------------
// Preconditions and configuration
// ---------------------------------------------------------------------------

#[test]
fn test_output_without_data_writes() {
    let input = scenario_a();
    let mut output = MetadataOnly(MemoryDataset::flat("mem://meta"));
    let err = flatten(&input, &mut output, &strict()).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("write data")));

    let report = flatten(&input, &mut output, &strict().with_copy_data(false)).unwrap();
    assert_eq!(report.provenance.variables.len(), 2);
}

#[test]
fn test_same_dataset_rejected_before_writing() {
    let input = scenario_a();
    let mut output = MemoryDataset::flat("mem://scenario-a");
    let err = flatten(&input, &mut output, &strict()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(output.variables("/").unwrap().is_empty());
}

#[test]
fn test_config_loaded_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "lax_mode": true, "copy_slice_shapes": {{ "/g/field": [1, 7] }} }}"#
    )
    .unwrap();
    let cfg = FlattenConfig::load(file.path()).unwrap();
    assert!(cfg.lax_mode);

    let values: Vec<f64> = (0..35).map(f64::from).collect();
    let output = run(&gridded(&values), &cfg);
    assert_eq!(output.data("/g__field").unwrap().to_f64().unwrap(), values);
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

#[test]
fn test_provenance_bijective_and_readable() {
    let mut input = apex_tree();
    input.set_group_attr("/P", "title", AttrValue::from("p")).unwrap();
    let mut output = MemoryDataset::flat("mem://flat");
    let report = flatten(&input, &mut output, &strict()).unwrap();

    let maps = ProvenanceMaps::read_from(&output).unwrap();
    assert_eq!(maps, report.provenance);
    assert!(maps.is_bijective());

    assert_eq!(maps.dimensions.original("P__x"), Some("/P/x"));
    assert_eq!(maps.variables.original("P__S__x"), Some("/P/S/x"));
    assert_eq!(maps.attributes.original("P__title"), Some("/P/title"));

    let flat_vars: Vec<String> = output.variables("/").unwrap().into_iter().map(|v| v.name).collect();
    let recorded: Vec<String> = maps.variables.records().iter().map(|(f, _)| f.clone()).collect();
    assert_eq!(flat_vars, recorded);

    let dim_records = output.group_attr("/", ATTR_DIMENSION_MAP).unwrap();
    assert_eq!(
        dim_records.as_string_array().unwrap(),
        &["x: /x".to_string(), "P__x: /P/x".to_string()]
    );
    assert!(output.group_attr("/", ATTR_VARIABLE_MAP).is_some());
}
