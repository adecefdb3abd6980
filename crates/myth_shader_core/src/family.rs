//! Shader families: one source file each, with an ordered option list that
//! fixes the family's bit layout.

use smallvec::SmallVec;

use crate::interner::{self, Symbol};
use crate::option::ShaderOption;

/// Number of addressable families (8-bit family field).
pub const MAX_SHADER_FAMILIES: usize = 256;

/// Extension of family source files when no explicit filename is declared.
pub const DEFAULT_FAMILY_SOURCE_EXTENSION: &str = "fx";

/// Ordinal of a family in the schema (`0..=255`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ShaderFamily(u8);

impl ShaderFamily {
    #[inline]
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Declaration of a family: name, source file and the options it supports in
/// key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFamilyDesc {
    name: Symbol,
    source_file: String,
    options: SmallVec<[ShaderOption; 8]>,
}

impl ShaderFamilyDesc {
    pub(crate) fn new(name: &str, source_file: Option<&str>, options: &[ShaderOption]) -> Self {
        let source_file = source_file.map_or_else(
            || format!("{name}.{DEFAULT_FAMILY_SOURCE_EXTENSION}"),
            str::to_owned,
        );

        Self {
            name: interner::intern(name),
            source_file,
            options: SmallVec::from_slice(options),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.name)
    }

    /// Source filename relative to the shader directory, e.g. `Generic.fx`.
    #[inline]
    #[must_use]
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &[ShaderOption] {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_defaults_to_family_name() {
        let desc = ShaderFamilyDesc::new("Generic", None, &[]);
        assert_eq!(desc.source_file(), "Generic.fx");
    }

    #[test]
    fn test_explicit_source_file_is_kept() {
        let desc = ShaderFamilyDesc::new("Sky", Some("environment/Sky.fx"), &[]);
        assert_eq!(desc.source_file(), "environment/Sky.fx");
    }
}
