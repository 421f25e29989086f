use naga::valid::{Capabilities, ValidationFlags, Validator};
use part_renderer::renderer::postprocess::stage_sources;

fn validate(label: &str, source: &str) {
    let module = match naga::front::wgsl::parse_str(source) {
        Ok(module) => module,
        Err(err) => panic!("{label} failed to parse:\n{}", err.emit_to_string(source)),
    };
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    if let Err(err) = validator.validate(&module) {
        panic!("{label} failed validation: {err:?}");
    }
}

fn entry_points(source: &str) -> Vec<String> {
    let module = naga::front::wgsl::parse_str(source).expect("parses");
    module.entry_points.iter().map(|ep| ep.name.clone()).collect()
}

#[test]
fn lit_shader_is_valid() {
    let source = include_str!("../src/shader/lit.wgsl");
    validate("lit", source);
    let entries = entry_points(source);
    for name in ["vs_instanced", "vs_single", "fs_main"] {
        assert!(entries.iter().any(|e| e == name), "missing {name}");
    }
}

#[test]
fn shadow_shader_is_valid() {
    validate("shadow", include_str!("../src/shader/shadow.wgsl"));
}

#[test]
fn sky_shader_is_valid() {
    validate("sky", include_str!("../src/shader/sky.wgsl"));
}

#[test]
fn post_stages_are_valid() {
    for (label, source) in stage_sources() {
        validate(label, &source);
    }
}
