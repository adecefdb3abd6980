//! Shader options: named integer toggles, each owning a fixed bit-width inside
//! the option field of a [`ShaderKey`](crate::key::ShaderKey).

use crate::interner::{self, Symbol};

/// Widest option (and widest family layout) the 24-bit option field can hold.
pub const MAX_SHADER_OPTION_BITS: u32 = 24;

/// Ordinal of an option in the [`ShaderSchema`](crate::schema::ShaderSchema)
/// option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderOption(u32);

impl ShaderOption {
    #[inline]
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// One row of the option table: display name and bit-width.
///
/// The display name doubles as the preprocessor macro name the compiler
/// defines for this option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderOptionDesc {
    name: Symbol,
    bits: u8,
}

impl ShaderOptionDesc {
    /// Width must already be validated against `1..=24`.
    pub(crate) fn new(name: &str, bits: u32) -> Self {
        debug_assert!((1..=MAX_SHADER_OPTION_BITS).contains(&bits));
        Self {
            name: interner::intern(name),
            bits: bits as u8,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.name)
    }

    #[inline]
    #[must_use]
    pub fn name_symbol(&self) -> Symbol {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn bits(&self) -> u32 {
        u32::from(self.bits)
    }

    /// Largest value the option can hold (`2^bits - 1`).
    #[inline]
    #[must_use]
    pub fn max_value(&self) -> u32 {
        (1u32 << self.bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_value_matches_width() {
        assert_eq!(ShaderOptionDesc::new("ONE_BIT", 1).max_value(), 1);
        assert_eq!(ShaderOptionDesc::new("TWO_BITS", 2).max_value(), 3);
        assert_eq!(ShaderOptionDesc::new("WIDE", 24).max_value(), 0x00FF_FFFF);
    }

    #[test]
    fn test_name_round_trips_through_interner() {
        let desc = ShaderOptionDesc::new("ALPHA_TEST", 1);
        assert_eq!(desc.name(), "ALPHA_TEST");
    }
}
