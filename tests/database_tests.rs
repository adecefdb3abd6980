//! Shader Database Integration Tests
//!
//! Tests for:
//! - Persistence: compiled permutations survive close/load, absent stages included
//! - Header validation: platform and version mismatches discard the file
//! - Staleness against watcher timestamps
//! - Invalidation

use myth_shader_dev_utils::ShaderTreeFixture;
use myth_shaders::builtin::{families, options};
use myth_shaders::runtime::state_block::render_state::CullMode;
use myth_shaders::runtime::state_block::sampler_state::TextureAddressMode;
use myth_shaders::{ShaderDatabase, ShaderKey, ShaderLookup, ShaderRuntimeError, ShaderStage};

fn generic_key(groups: &myth_shaders::ShaderKeyGroups, lighting: u32, quality: u32) -> ShaderKey {
    ShaderKey::new(families::GENERIC)
        .with_shader_option(groups, options::LIGHTING, lighting)
        .with_shader_option(groups, options::QUALITY, quality)
}

/// Compiles two Generic permutations into the fixture's database file.
fn populated_fixture() -> (ShaderTreeFixture, Vec<ShaderKey>) {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();

    let keys = vec![generic_key(groups, 0, 0), generic_key(groups, 1, 2)];
    for &key in &keys {
        let entry = services.compiler.compile_now(key).unwrap();
        services.database.append(key, (*entry).clone()).unwrap();
    }
    services.database.close();

    (fixture, keys)
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn compiled_entries_survive_reload() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let groups = services.variations.key_groups();
    let key = generic_key(groups, 1, 3);

    let compiled = services.compiler.compile_now(key).unwrap();
    services.database.append(key, (*compiled).clone()).unwrap();
    services.database.close();
    assert!(!services.database.is_loaded());
    assert!(services.database.is_empty());

    let reloaded = ShaderDatabase::new();
    assert_eq!(reloaded.load(fixture.database_path()).unwrap(), 1);
    let entry = reloaded.get(key).unwrap();

    assert_eq!(*entry, *compiled);
    assert_eq!(entry.content_hash(), compiled.content_hash());
    assert!(entry.raw_shader(ShaderStage::Vertex).is_some());
    assert!(entry.raw_shader(ShaderStage::Pixel).is_some());
    assert_eq!(entry.raw_shader(ShaderStage::Compute), None);
}

#[test]
fn metadata_survives_reload() {
    let (fixture, keys) = populated_fixture();

    let reloaded = ShaderDatabase::new();
    assert_eq!(reloaded.load(fixture.database_path()).unwrap(), keys.len());

    let low = reloaded.get(keys[0]).unwrap();
    let high = reloaded.get(keys[1]).unwrap();
    assert_eq!(
        low.render_state_block().rasterizer_state.cull_mode,
        CullMode::CullBackFace
    );
    assert_eq!(
        high.render_state_block().rasterizer_state.cull_mode,
        CullMode::CullNone
    );

    let samplers = &high.binding_layout().sampler_states;
    assert_eq!(samplers.len(), 1);
    assert_eq!(samplers[0].name, "LinearWrap");
    assert_eq!(samplers[0].state.address_mode_u, TextureAddressMode::Wrap);
    assert!(!high.binding_layout().resource_binder.is_empty());
    assert!(!high.binding_layout().root_signature_parameters.is_empty());
}

#[test]
fn keys_are_listed_in_ascending_order() {
    let (fixture, mut keys) = populated_fixture();
    let reloaded = ShaderDatabase::new();
    reloaded.load(fixture.database_path()).unwrap();

    keys.sort_unstable();
    assert_eq!(reloaded.keys(), keys);
}

// ============================================================================
// Header Validation
// ============================================================================

#[test]
fn version_mismatch_discards_every_entry() {
    let (fixture, _) = populated_fixture();
    let path = fixture.database_path();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[20..24].copy_from_slice(&999u32.to_ne_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let db = ShaderDatabase::new();
    assert!(matches!(
        db.load(&path),
        Err(ShaderRuntimeError::VersionMismatch { found: 999, .. })
    ));
    assert!(db.is_loaded());
    assert!(db.is_empty());
    assert!(ShaderDatabase::read_file(&path).unwrap().is_empty());
}

#[test]
fn platform_mismatch_discards_every_entry() {
    let (fixture, _) = populated_fixture();
    let path = fixture.database_path();

    let mut bytes = std::fs::read(&path).unwrap();
    let platform = u32::from_ne_bytes(bytes[16..20].try_into().unwrap());
    bytes[16..20].copy_from_slice(&(platform ^ 0xFF).to_ne_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let db = ShaderDatabase::new();
    assert!(matches!(
        db.load(&path),
        Err(ShaderRuntimeError::PlatformMismatch { .. })
    ));
    assert!(db.is_empty());
}

#[test]
fn truncated_file_is_discarded() {
    let (fixture, _) = populated_fixture();
    let path = fixture.database_path();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

    let db = ShaderDatabase::new();
    assert!(matches!(
        db.load(&path),
        Err(ShaderRuntimeError::Truncated { .. })
    ));
    assert!(db.is_empty());

    // The rewritten file loads cleanly.
    let again = ShaderDatabase::new();
    assert_eq!(again.load(&path).unwrap(), 0);
}

#[test]
fn unreadable_path_leaves_the_database_unloaded() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let path = fixture.database_path();
    std::fs::create_dir_all(&path).unwrap();

    let db = ShaderDatabase::new();
    assert!(matches!(db.load(&path), Err(ShaderRuntimeError::Io(_))));
    assert!(!db.is_loaded());
    assert_eq!(db.path(), None);
    assert!(path.is_dir());
}

// ============================================================================
// Staleness
// ============================================================================

#[test]
fn include_change_makes_entry_stale() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::GENERIC);

    let entry = services.compiler.compile_now(key).unwrap();
    services.database.append(key, (*entry).clone()).unwrap();

    let before = services.watcher.timestamp_for_shader_key(key);
    assert_eq!(entry.timestamp(), before);
    assert!(services.database.retrieve(key, before).is_fresh());

    fixture.touch_ahead("common/Lighting.hlsl", 60).unwrap();
    assert_eq!(services.watcher.scan_now(), 1);

    let after = services.watcher.timestamp_for_shader_key(key);
    assert!(after > before);
    assert!(matches!(
        services.database.retrieve(key, after),
        ShaderLookup::Stale(_)
    ));
}

#[test]
fn older_timestamp_never_reports_stale() {
    let fixture = ShaderTreeFixture::with_builtin_shaders().unwrap();
    let services = fixture.services();
    let key = ShaderKey::new(families::FULLSCREEN);

    let entry = services.compiler.compile_now(key).unwrap();
    services.database.append(key, (*entry).clone()).unwrap();

    assert!(services.database.retrieve(key, 0).is_fresh());
    assert!(services.database.retrieve(key, entry.timestamp()).is_fresh());
}

// ============================================================================
// Invalidation
// ============================================================================

#[test]
fn invalidate_empties_memory_and_file() {
    let (fixture, _) = populated_fixture();
    let path = fixture.database_path();

    let db = ShaderDatabase::new();
    assert_eq!(db.load(&path).unwrap(), 2);
    db.invalidate().unwrap();
    assert!(db.is_empty());

    let reloaded = ShaderDatabase::new();
    assert_eq!(reloaded.load(&path).unwrap(), 0);
}
