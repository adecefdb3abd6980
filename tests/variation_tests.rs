//! Shader Variation Set Integration Tests
//!
//! Tests for:
//! - Value ranges: keys outside a declared range are rejected
//! - Invalid partial keys: bit-subset matching
//! - Valid-key enumeration used by the startup compile pass

use std::sync::Arc;

use myth_shaders::builtin::{builtin_schema, families, options};
use myth_shaders::{ShaderKey, ShaderKeyGroups, ShaderKeyValidation, ShaderVariationSetManager};

fn manager() -> ShaderVariationSetManager {
    let groups = Arc::new(ShaderKeyGroups::new(Arc::new(builtin_schema().unwrap())));
    ShaderVariationSetManager::new(groups)
}

fn generic(manager: &ShaderVariationSetManager, lighting: u32, quality: u32) -> ShaderKey {
    let groups = manager.key_groups();
    ShaderKey::new(families::GENERIC)
        .with_shader_option(groups, options::LIGHTING, lighting)
        .with_shader_option(groups, options::QUALITY, quality)
}

// ============================================================================
// Value Ranges
// ============================================================================

#[test]
fn range_rejects_values_outside_bounds() {
    let mut manager = manager();
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_shader_option_value_range(options::QUALITY, 1, 2);
    });

    let check = |quality| {
        let key = generic(&manager, 0, quality);
        manager.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError)
    };
    assert!(!check(0));
    assert!(check(1));
    assert!(check(2));
    assert!(!check(3));
}

#[test]
fn ranges_only_apply_to_their_family() {
    let mut manager = manager();
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_shader_option_value_range(options::QUALITY, 0, 0);
    });

    let groups = manager.key_groups().clone();
    let fullscreen =
        ShaderKey::new(families::FULLSCREEN).with_shader_option(&groups, options::QUALITY, 3);
    assert!(manager.validate_shader_key(fullscreen, ShaderKeyValidation::AssertOnError));
    assert!(manager.valid_ranges(families::FULLSCREEN).is_empty());
}

#[test]
fn bits_beyond_the_family_layout_are_invalid() {
    let manager = manager();
    // Generic packs 3 option bits; bit 3 of the option field is unused.
    let stray = ShaderKey::from_raw(ShaderKey::new(families::GENERIC).raw() | (1 << (8 + 3)));

    assert!(!manager.validate_shader_key(stray, ShaderKeyValidation::DontAssertOnError));
    assert!(manager.validate_shader_key(generic(&manager, 1, 3), ShaderKeyValidation::DontAssertOnError));
}

#[test]
#[should_panic(expected = "outside of its valid range")]
fn assert_mode_panics_on_range_violation() {
    let mut manager = manager();
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_shader_option_value_range(options::QUALITY, 0, 1);
    });

    let key = generic(&manager, 0, 2);
    manager.validate_shader_key(key, ShaderKeyValidation::AssertOnError);
}

// ============================================================================
// Invalid Partial Keys
// ============================================================================

#[test]
fn partial_key_rejects_only_supersets_of_its_bits() {
    let mut manager = manager();
    let forbidden = generic(&manager, 1, 2);
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_invalid_partial_shader_key(forbidden);
    });

    let valid = |lighting, quality| {
        let key = generic(&manager, lighting, quality);
        manager.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError)
    };

    // LIGHTING=1 with QUALITY bit 1 set: QUALITY 2 and 3.
    assert!(!valid(1, 2));
    assert!(!valid(1, 3));
    // Either bit alone passes.
    assert!(valid(1, 0));
    assert!(valid(1, 1));
    assert!(valid(0, 2));
    assert!(valid(0, 3));
}

#[test]
fn valid_keys_exclude_both_rule_kinds() {
    let mut manager = manager();
    let forbidden = generic(&manager, 1, 1);
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_shader_option_value_range(options::QUALITY, 0, 2);
        set.set_invalid_partial_shader_key(forbidden);
    });

    let valid = manager.every_valid_shader_key_for_family(families::GENERIC);
    let groups = manager.key_groups();
    let pairs: Vec<(u32, u32)> = valid
        .iter()
        .map(|key| {
            (
                key.shader_option_value(groups, options::LIGHTING).unwrap(),
                key.shader_option_value(groups, options::QUALITY).unwrap(),
            )
        })
        .collect();

    // QUALITY=3 is out of range; LIGHTING=1 with QUALITY=1 is forbidden.
    assert_eq!(pairs.len(), 5);
    assert!(!pairs.contains(&(0, 3)));
    assert!(!pairs.contains(&(1, 3)));
    assert!(!pairs.contains(&(1, 1)));
    assert!(pairs.contains(&(1, 2)));
    assert!(pairs.contains(&(0, 0)));
}

#[test]
fn family_without_rules_accepts_every_key() {
    let manager = manager();
    assert_eq!(
        manager
            .every_valid_shader_key_for_family(families::FULLSCREEN)
            .len(),
        16
    );
    assert_eq!(
        manager
            .every_valid_shader_key_for_family(families::ERROR)
            .len(),
        1
    );
}

#[test]
fn unknown_family_is_invalid_without_assert() {
    let manager = manager();
    let key = ShaderKey::new(myth_shaders::ShaderFamily::from_index(200));
    assert!(!manager.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError));
}

// ============================================================================
// Declaration Contract
// ============================================================================

#[test]
#[should_panic(expected = "outside of a shader variation set declaration")]
fn range_outside_declaration_block_panics() {
    let mut manager = manager();
    manager.set_shader_option_value_range(options::QUALITY, 0, 1);
}

#[test]
#[should_panic(expected = "belongs to shader family")]
fn partial_key_of_other_family_panics() {
    let mut manager = manager();
    let groups = manager.key_groups().clone();
    let key = ShaderKey::new(families::FULLSCREEN).with_shader_option(&groups, options::QUALITY, 1);
    manager.declare_variation_set(families::GENERIC, |set| {
        set.set_invalid_partial_shader_key(key);
    });
}
