//! Shader Key
//!
//! A [`ShaderKey`] identifies one permutation: the family in bits 0–7 and the
//! family-relative option values in bits 8–31. Keys are plain `u32` values:
//! `Copy`, ordered and hashed by their raw integer, usable directly as map
//! keys and written to disk as-is.
//!
//! Reading or writing an option needs the family's layout, so those methods
//! take the shared [`ShaderKeyGroups`] registry:
//!
//! ```rust,ignore
//! let key = ShaderKey::new(GENERIC)
//!     .with_shader_option(&groups, LIGHTING, 1)
//!     .with_shader_option(&groups, QUALITY, 3);
//!
//! assert_eq!(key.shader_option_value(&groups, QUALITY)?, 3);
//! ```

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::errors::{Result, ShaderError};
use crate::family::ShaderFamily;
use crate::key_group::ShaderKeyGroups;
use crate::option::ShaderOption;

/// Underlying integer type of a [`ShaderKey`].
pub type RawShaderKey = u32;

/// Bit-packed permutation identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
pub struct ShaderKey(RawShaderKey);

impl ShaderKey {
    pub const FAMILY_SHIFT: u32 = 0;
    pub const FAMILY_MASK: u32 = 0xFF;
    pub const OPTION_SHIFT: u32 = 8;
    pub const OPTION_MASK: u32 = 0x00FF_FFFF;

    /// Key of `family` with every option at zero.
    #[inline]
    #[must_use]
    pub const fn new(family: ShaderFamily) -> Self {
        Self((family.index() as u32 & Self::FAMILY_MASK) << Self::FAMILY_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: RawShaderKey) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> RawShaderKey {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn family(self) -> ShaderFamily {
        ShaderFamily::from_index(((self.0 >> Self::FAMILY_SHIFT) & Self::FAMILY_MASK) as u8)
    }

    /// The 24-bit option field, shifted down to bit 0.
    #[inline]
    #[must_use]
    pub const fn raw_options(self) -> u32 {
        (self.0 >> Self::OPTION_SHIFT) & Self::OPTION_MASK
    }

    /// Replaces the family; the option bits are kept untouched and are
    /// reinterpreted through the new family's layout.
    #[inline]
    pub fn set_shader_family(&mut self, family: ShaderFamily) {
        self.0 = (self.0 & !(Self::FAMILY_MASK << Self::FAMILY_SHIFT))
            | ((u32::from(family.index()) & Self::FAMILY_MASK) << Self::FAMILY_SHIFT);
    }

    #[inline]
    #[must_use]
    pub fn with_shader_family(mut self, family: ShaderFamily) -> Self {
        self.set_shader_family(family);
        self
    }

    /// Writes `value` into `option`'s bits.
    ///
    /// # Panics
    ///
    /// When the key's family has no key group, when `option` is not part of
    /// the family, or when `value` does not fit the option's bit-width.
    pub fn set_shader_option(&mut self, groups: &ShaderKeyGroups, option: ShaderOption, value: u32) {
        let family = self.family();
        let group = groups.group(family);

        let Some(slot) = group.slot(option) else {
            panic!(
                "Shader option '{}' is not part of shader family '{}'",
                groups.schema().option_name(option),
                groups.schema().family_name(family),
            );
        };

        assert!(
            value <= slot.max_value(),
            "Value {} does not fit shader option '{}' ({} bits, max {}) in shader family '{}'",
            value,
            groups.schema().option_name(option),
            slot.bits(),
            slot.max_value(),
            groups.schema().family_name(family),
        );

        let options = (self.raw_options() & !slot.mask()) | (value << slot.shift());
        self.0 = (self.0 & (Self::FAMILY_MASK << Self::FAMILY_SHIFT))
            | ((options & Self::OPTION_MASK) << Self::OPTION_SHIFT);
    }

    #[inline]
    #[must_use]
    pub fn with_shader_option(
        mut self,
        groups: &ShaderKeyGroups,
        option: ShaderOption,
        value: u32,
    ) -> Self {
        self.set_shader_option(groups, option, value);
        self
    }

    /// Reads `option`'s value through the key's family layout.
    ///
    /// Returns [`ShaderError::OptionNotInFamily`] for options the family does
    /// not declare instead of reading unrelated bits.
    pub fn shader_option_value(self, groups: &ShaderKeyGroups, option: ShaderOption) -> Result<u32> {
        let family = self.family();
        let group = groups
            .try_group(family)
            .ok_or(ShaderError::UnknownFamily(family.index()))?;

        group
            .slot(option)
            .map(|slot| slot.extract(self.raw_options()))
            .ok_or_else(|| ShaderError::OptionNotInFamily {
                family: groups.schema().family_name(family).to_owned(),
                option: groups.schema().option_name(option).to_owned(),
            })
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderKey(0x{:08x})", self.0)
    }
}

impl From<ShaderKey> for RawShaderKey {
    #[inline]
    fn from(key: ShaderKey) -> Self {
        key.0
    }
}
