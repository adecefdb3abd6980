//! Shader Compiler Integration Tests
//!
//! Tests for:
//! - Synchronous compilation: bytecode per define set, binder, render and
//!   sampler state
//! - Stage rules: vertex and pixel must compile together, compute alone is valid
//! - Worker thread: key and family requests, deduplication, failure records

use std::time::Duration;

use myth_shader_dev_utils::{ShaderTreeFixture, init_test_logging, wait_until};
use myth_shaders::builtin::{families, options};
use myth_shaders::runtime::resource_binder::ShaderResourceBinding;
use myth_shaders::runtime::state_block::render_state::CullMode;
use myth_shaders::runtime::state_block::sampler_state::TextureAddressMode;
use myth_shaders::{RawShaderStatus, ShaderKey, ShaderRuntimeError, ShaderStage};

const TIMEOUT: Duration = Duration::from_secs(10);

fn generic_key(groups: &myth_shaders::ShaderKeyGroups, lighting: u32, quality: u32) -> ShaderKey {
    ShaderKey::new(families::GENERIC)
        .with_shader_option(groups, options::LIGHTING, lighting)
        .with_shader_option(groups, options::QUALITY, quality)
}

fn stage_text(entry: &myth_shaders::ShaderEntrySet, stage: ShaderStage) -> String {
    String::from_utf8(entry.raw_shader(stage).unwrap().to_vec()).unwrap()
}

// ============================================================================
// Synchronous Compilation
// ============================================================================

#[test]
fn generic_permutation_compiles_with_its_defines() {
    init_test_logging();
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();

    let lit = services.compiler.compile_now(generic_key(groups, 1, 0)).unwrap();
    let unlit = services.compiler.compile_now(generic_key(groups, 0, 0)).unwrap();

    let lit_pixel = stage_text(&lit, ShaderStage::Pixel);
    assert!(lit_pixel.starts_with("ps_5_0|PS_Main|"));
    assert!(lit_pixel.contains("ApplyLighting(uv)"));
    assert!(!stage_text(&unlit, ShaderStage::Pixel).contains("color.rgb *="));
    assert!(stage_text(&lit, ShaderStage::Vertex).starts_with("vs_5_0|VS_Main|"));
    assert_eq!(lit.raw_shader(ShaderStage::Compute), None);
    assert_ne!(lit.content_hash(), unlit.content_hash());
}

#[test]
fn binder_maps_provider_inputs_and_samplers() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::GENERIC);
    let entry = services.compiler.compile_now(key).unwrap();

    let bindings: Vec<_> = entry
        .binding_layout()
        .resource_binder
        .entries()
        .iter()
        .map(|e| &e.binding)
        .collect();

    assert!(bindings.iter().any(|b| matches!(
        b,
        ShaderResourceBinding::ProviderConstantBuffer { provider } if provider == "Camera"
    )));
    assert!(bindings.iter().any(|b| matches!(
        b,
        ShaderResourceBinding::ProviderInput { provider, .. } if provider == "Material"
    )));
    assert!(bindings.iter().any(|b| matches!(
        b,
        ShaderResourceBinding::Sampler { name, state }
            if name == "LinearWrap" && state.address_mode_v == TextureAddressMode::Wrap
    )));
    assert!(!entry.binding_layout().descriptor_set_entries.is_empty());
}

#[test]
fn render_state_follows_permutation_defines() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();

    for quality in 0..=3 {
        let entry = services.compiler.compile_now(generic_key(groups, 0, quality)).unwrap();
        let expected = if quality > 1 {
            CullMode::CullNone
        } else {
            CullMode::CullBackFace
        };
        assert_eq!(entry.render_state_block().rasterizer_state.cull_mode, expected);
        assert!(entry.render_state_block().depth_stencil_state.enable_depth_write);
    }

    let fullscreen = services.compiler.compile_now(ShaderKey::new(families::FULLSCREEN)).unwrap();
    assert!(!fullscreen.render_state_block().depth_stencil_state.depth_enable);
}

#[test]
fn entry_is_stamped_with_the_watcher_timestamp() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::FULLSCREEN);

    let entry = services.compiler.compile_now(key).unwrap();
    assert_eq!(entry.timestamp(), services.watcher.timestamp_for_shader_key(key));
    assert!(entry.timestamp() > 0);
}

// ============================================================================
// Stage Rules
// ============================================================================

#[test]
fn vertex_without_pixel_fails() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    fixture
        .write(
            "Generic.fx",
            "float4 VS_Main() : SV_Position { return 0; }\n\
             // FAIL_PS_Main\n\
             float4 PS_Main() : SV_Target { return 1; }\n",
        )
        .unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::GENERIC);

    assert!(matches!(
        services.compiler.compile_now(key),
        Err(ShaderRuntimeError::CompilationFailed { .. })
    ));
    let record = services.compiler.compiled_entry(key).unwrap();
    assert!(record.has_compilation_error());
    assert!(record.error.is_some());
}

#[test]
fn no_stage_at_all_fails() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();

    // TONEMAPPING=3 expands to a syntax error in both stages.
    let key = ShaderKey::new(families::FULLSCREEN).with_shader_option(groups, options::TONEMAPPING, 3);
    assert!(matches!(
        services.compiler.compile_now(key),
        Err(ShaderRuntimeError::CompilationFailed { .. })
    ));
}

#[test]
fn compute_only_family_compiles() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    fixture
        .write(
            "Fullscreen.fx",
            "RWTexture2D<float4> g_Output : register(u0);\n\
             [numthreads(8, 8, 1)]\nvoid CS_Main(uint3 id : SV_DispatchThreadID) {}\n",
        )
        .unwrap();
    let services = fixture.services();

    let entry = services.compiler.compile_now(ShaderKey::new(families::FULLSCREEN)).unwrap();
    assert!(entry.raw_shader(ShaderStage::Compute).is_some());
    assert_eq!(entry.raw_shader(ShaderStage::Vertex), None);
    assert_eq!(entry.raw_shader(ShaderStage::Pixel), None);
}

#[test]
fn missing_source_is_reported() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    std::fs::remove_file(fixture.path().join("Fullscreen.fx")).unwrap();
    let services = fixture.services();

    assert!(matches!(
        services.compiler.compile_now(ShaderKey::new(families::FULLSCREEN)),
        Err(ShaderRuntimeError::SourceUnavailable { .. })
    ));
}

// ============================================================================
// Worker Thread
// ============================================================================

#[test]
fn key_request_is_compiled_and_persisted() {
    init_test_logging();
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();
    let key = generic_key(groups, 1, 1);

    services.compiler.start().unwrap();
    assert!(services.compiler.add_compilation_request_for_shader_key(key));
    assert!(wait_until(TIMEOUT, || !services.compiler.is_pending(key)));

    let RawShaderStatus::Ready { entry, recompiled } =
        services.compiler.get_raw_shaders_for_shader_key(key)
    else {
        panic!("expected a compiled entry");
    };
    assert!(recompiled);
    assert!(matches!(
        services.compiler.get_raw_shaders_for_shader_key(key),
        RawShaderStatus::Ready { recompiled: false, .. }
    ));
    assert_eq!(services.database.get(key).unwrap(), entry);

    services.compiler.stop_thread();
    assert!(!services.compiler.is_running());
}

#[test]
fn family_request_compiles_every_valid_key() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();

    services.compiler.start().unwrap();
    assert!(services.compiler.add_compilation_request_for_shader_family(families::FULLSCREEN));

    let valid = services.variations.every_valid_shader_key_for_family(families::FULLSCREEN);
    assert_eq!(valid.len(), 12);
    assert!(wait_until(TIMEOUT, || {
        valid.iter().all(|&key| !services.compiler.is_pending(key))
    }));

    for &key in &valid {
        assert!(services.database.get(key).is_some());
    }
    let excluded = ShaderKey::new(families::FULLSCREEN).with_shader_option(groups, options::TONEMAPPING, 3);
    assert!(services.database.get(excluded).is_none());
    assert!(matches!(
        services.compiler.get_raw_shaders_for_shader_key(excluded),
        RawShaderStatus::Missing
    ));
}

#[test]
fn pending_requests_are_deduplicated() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::GENERIC);

    // Not started yet: requests stay queued.
    assert!(services.compiler.add_compilation_request_for_shader_key(key));
    assert!(!services.compiler.add_compilation_request_for_shader_key(key));
    assert!(services.compiler.is_pending(key));
    assert!(matches!(
        services.compiler.get_raw_shaders_for_shader_key(key),
        RawShaderStatus::Pending
    ));

    assert!(services.compiler.add_compilation_request_for_shader_family(families::FULLSCREEN));
    assert!(!services.compiler.add_compilation_request_for_shader_family(families::FULLSCREEN));
    let covered = ShaderKey::new(families::FULLSCREEN);
    assert!(!services.compiler.add_compilation_request_for_shader_key(covered));

    services.compiler.start().unwrap();
    assert!(wait_until(TIMEOUT, || {
        !services.compiler.is_pending(key) && !services.compiler.is_pending(covered)
    }));
    assert!(services.compiler.add_compilation_request_for_shader_key(key));
}

#[test]
fn worker_records_failures_with_their_timestamp() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    fixture
        .write("Generic.fx", "float4 VS_Main() : SV_Position { SYNTAX_ERROR }\n")
        .unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::GENERIC);

    services.compiler.start().unwrap();
    services.compiler.add_compilation_request_for_shader_key(key);
    assert!(wait_until(TIMEOUT, || !services.compiler.is_pending(key)));

    let RawShaderStatus::Failed { source_timestamp } =
        services.compiler.get_raw_shaders_for_shader_key(key)
    else {
        panic!("expected a failed compilation");
    };
    assert_eq!(source_timestamp, services.watcher.timestamp_for_shader_key(key));
    assert!(services.database.get(key).is_none());
}
