//! Shader Variation Sets
//!
//! Not every permutation of a family is meaningful. A variation set prunes the
//! space with two kinds of rules, declared once per family between a
//! start/end pair:
//!
//! - a value range per option (`[min, max]`, inclusive);
//! - invalid partial keys: option bit patterns that must never all be set at
//!   the same time.
//!
//! ```rust,ignore
//! let mut sets = ShaderVariationSetManager::new(groups.clone());
//! sets.declare_variation_set(GENERIC, |sets| {
//!     sets.set_shader_option_value_range(QUALITY, 0, 2);
//!     sets.set_invalid_partial_shader_key(
//!         ShaderKey::new(GENERIC)
//!             .with_shader_option(&groups, LIGHTING, 1)
//!             .with_shader_option(&groups, QUALITY, 2),
//!     );
//! });
//!
//! assert!(!sets.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError));
//! ```
//!
//! Validation is a pure function of the declared rules and the key's bits.

use std::sync::Arc;

use crate::family::{MAX_SHADER_FAMILIES, ShaderFamily};
use crate::key::ShaderKey;
use crate::key_group::ShaderKeyGroups;
use crate::option::ShaderOption;

pub const MAX_VALID_RANGES_PER_FAMILY: usize = 24;
pub const MAX_INVALID_PARTIAL_KEYS_PER_FAMILY: usize = 1024;

/// What [`ShaderVariationSetManager::validate_shader_key`] does on a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKeyValidation {
    /// Panic with the offending family, option and range.
    AssertOnError,
    /// Return `false`; used when probing speculative permutations.
    DontAssertOnError,
}

/// Inclusive range of legal values for one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidShaderOptionValueRange {
    pub option: ShaderOption,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Default)]
struct ShaderVariationSet {
    valid_ranges: Vec<ValidShaderOptionValueRange>,
    invalid_partial_keys: Vec<ShaderKey>,
}

/// Per-family validation rules.
#[derive(Debug)]
pub struct ShaderVariationSetManager {
    groups: Arc<ShaderKeyGroups>,
    sets: Vec<ShaderVariationSet>,
    current_family: Option<ShaderFamily>,
}

impl ShaderVariationSetManager {
    #[must_use]
    pub fn new(groups: Arc<ShaderKeyGroups>) -> Self {
        Self {
            groups,
            sets: vec![ShaderVariationSet::default(); MAX_SHADER_FAMILIES],
            current_family: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn key_groups(&self) -> &Arc<ShaderKeyGroups> {
        &self.groups
    }

    // ─── Declaration ───────────────────────────────────────────────────────

    /// Opens `family`'s declaration block.
    ///
    /// # Panics
    ///
    /// When another family's block is still open.
    pub fn start_shader_variation_set_for_family(&mut self, family: ShaderFamily) {
        if let Some(open) = self.current_family {
            panic!(
                "Cannot start the variation set of shader family '{}': '{}' is still open",
                self.family_name(family),
                self.family_name(open),
            );
        }
        self.current_family = Some(family);
    }

    /// Closes `family`'s declaration block.
    ///
    /// # Panics
    ///
    /// When `family` is not the open block.
    pub fn end_shader_variation_set_for_family(&mut self, family: ShaderFamily) {
        assert!(
            self.current_family == Some(family),
            "Ending the variation set of shader family '{}' which was not started",
            self.family_name(family),
        );
        self.current_family = None;
    }

    /// Runs `declare` between a start/end pair for `family`.
    pub fn declare_variation_set(&mut self, family: ShaderFamily, declare: impl FnOnce(&mut Self)) {
        self.start_shader_variation_set_for_family(family);
        declare(self);
        self.end_shader_variation_set_for_family(family);
    }

    /// Restricts `option` to `[min, max]` for the open family.
    ///
    /// # Panics
    ///
    /// Outside a declaration block, for options foreign to the family, for
    /// `min > max`, or past [`MAX_VALID_RANGES_PER_FAMILY`] ranges.
    pub fn set_shader_option_value_range(&mut self, option: ShaderOption, min: u32, max: u32) {
        let family = self.open_family("set_shader_option_value_range");

        assert!(
            self.groups.group(family).slot(option).is_some(),
            "Shader option '{}' is not part of shader family '{}'",
            self.groups.schema().option_name(option),
            self.family_name(family),
        );
        assert!(
            min <= max,
            "Invalid range [{min}, {max}] for shader option '{}'",
            self.groups.schema().option_name(option),
        );

        let set = &mut self.sets[family.as_usize()];
        assert!(
            set.valid_ranges.len() < MAX_VALID_RANGES_PER_FAMILY,
            "Too many value ranges declared for shader family '{}'",
            self.groups.schema().family_name(family),
        );
        set.valid_ranges
            .push(ValidShaderOptionValueRange { option, min, max });
    }

    /// Forbids every key whose option bits contain all of `partial_key`'s.
    ///
    /// # Panics
    ///
    /// Outside a declaration block, for keys of another family, for an empty
    /// pattern, or past [`MAX_INVALID_PARTIAL_KEYS_PER_FAMILY`] keys.
    pub fn set_invalid_partial_shader_key(&mut self, partial_key: ShaderKey) {
        let family = self.open_family("set_invalid_partial_shader_key");

        assert!(
            partial_key.family() == family,
            "Invalid partial key {partial_key} belongs to shader family '{}', not '{}'",
            self.family_name(partial_key.family()),
            self.family_name(family),
        );
        assert!(
            partial_key.raw_options() != 0,
            "Invalid partial key for shader family '{}' has no option bits set",
            self.family_name(family),
        );

        let set = &mut self.sets[family.as_usize()];
        assert!(
            set.invalid_partial_keys.len() < MAX_INVALID_PARTIAL_KEYS_PER_FAMILY,
            "Too many invalid partial keys declared for shader family '{}'",
            self.groups.schema().family_name(family),
        );
        set.invalid_partial_keys.push(partial_key);
    }

    fn open_family(&self, operation: &str) -> ShaderFamily {
        match self.current_family {
            Some(family) => family,
            None => panic!("{operation} called outside of a shader variation set declaration"),
        }
    }

    fn family_name(&self, family: ShaderFamily) -> &'static str {
        self.groups.schema().family_name(family)
    }

    // ─── Validation ────────────────────────────────────────────────────────

    /// Checks `key` against its family's ranges and invalid partial keys.
    pub fn validate_shader_key(&self, key: ShaderKey, mode: ShaderKeyValidation) -> bool {
        let family = key.family();

        let Some(group) = self.groups.try_group(family) else {
            if mode == ShaderKeyValidation::AssertOnError {
                panic!("{key} uses shader family ordinal {} which has no key group", family.index());
            }
            return false;
        };

        let set = &self.sets[family.as_usize()];
        let raw_options = key.raw_options();

        if raw_options >> group.total_bits() != 0 {
            if mode == ShaderKeyValidation::AssertOnError {
                panic!(
                    "{key} sets option bits beyond the {} bits of shader family '{}'",
                    group.total_bits(),
                    self.family_name(family),
                );
            }
            return false;
        }

        for range in &set.valid_ranges {
            let Some(slot) = group.slot(range.option) else {
                continue;
            };
            let value = slot.extract(raw_options);
            if value < range.min || value > range.max {
                if mode == ShaderKeyValidation::AssertOnError {
                    panic!(
                        "Shader option '{}' of shader family '{}' has value {} outside of its valid range [{}, {}]",
                        self.groups.schema().option_name(range.option),
                        self.family_name(family),
                        value,
                        range.min,
                        range.max,
                    );
                }
                return false;
            }
        }

        for partial_key in &set.invalid_partial_keys {
            let forbidden = partial_key.raw_options();
            if raw_options & forbidden == forbidden {
                if mode == ShaderKeyValidation::AssertOnError {
                    panic!(
                        "{} matches invalid partial key {}",
                        self.groups.describe_key(key),
                        self.groups.describe_key(*partial_key),
                    );
                }
                return false;
            }
        }

        true
    }

    /// Every permutation of `family` that passes validation, in enumeration
    /// order.
    #[must_use]
    pub fn every_valid_shader_key_for_family(&self, family: ShaderFamily) -> Vec<ShaderKey> {
        self.groups
            .every_shader_key_for_family(family)
            .into_iter()
            .filter(|&key| self.validate_shader_key(key, ShaderKeyValidation::DontAssertOnError))
            .collect()
    }

    #[must_use]
    pub fn valid_ranges(&self, family: ShaderFamily) -> &[ValidShaderOptionValueRange] {
        &self.sets[family.as_usize()].valid_ranges
    }

    #[must_use]
    pub fn invalid_partial_keys(&self, family: ShaderFamily) -> &[ShaderKey] {
        &self.sets[family.as_usize()].invalid_partial_keys
    }
}
