//! Preprocessor Define Sets
//!
//! The compiler turns every option of a key into a macro: the option's display
//! name defined to its value in decimal. [`ShaderDefines`] holds those pairs as
//! interned [`Symbol`]s kept sorted by name symbol, so two sets with the same
//! content compare and hash identically no matter the insertion order.
//!
//! ```rust,ignore
//! let defines = groups.shader_defines_for_key(key);
//! for (name, value) in defines.iter_strs() {
//!     // LIGHTING=1, QUALITY=3
//! }
//! ```

use std::hash::{Hash, Hasher};

use crate::interner::{self, Symbol};

/// A sorted collection of `NAME = value` macro definitions.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(Symbol, Symbol)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            defines: Vec::with_capacity(capacity),
        }
    }

    /// Sets a define, replacing the value of an existing one.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_symbol(interner::intern(name), interner::intern(value));
    }

    #[inline]
    pub fn set_symbol(&mut self, name: Symbol, value: Symbol) {
        match self.defines.binary_search_by_key(&name, |&(k, _)| k) {
            Ok(idx) => self.defines[idx].1 = value,
            Err(idx) => self.defines.insert(idx, (name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(name) = interner::get(name) else {
            return false;
        };
        match self.defines.binary_search_by_key(&name, |&(k, _)| k) {
            Ok(idx) => {
                self.defines.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static str> {
        let name = interner::get(name)?;
        self.defines
            .binary_search_by_key(&name, |&(k, _)| k)
            .ok()
            .map(|idx| interner::resolve(self.defines[idx].1))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, Symbol)> {
        self.defines.iter()
    }

    /// Iterates the defines as `(name, value)` string pairs.
    #[inline]
    pub fn iter_strs(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.defines
            .iter()
            .map(|&(k, v)| (interner::resolve(k), interner::resolve(v)))
    }

    /// Values from `other` override values in `self`.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for &(name, value) in &other.defines {
            self.set_symbol(name, value);
        }
    }

    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::with_capacity(defines.len());
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}
