//! Global String Interner
//!
//! Option and family names are interned once when the schema is built, so
//! define sets and key groups carry compact [`Symbol`]s instead of strings and
//! can hand out `&'static str` names without leaking.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact integer identifier of an interned string.
pub type Symbol = Spur;

/// Interns a string, returning the existing symbol when already present.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up a string without interning it.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a symbol back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Largest option value whose decimal spelling is preloaded.
pub const MAX_PRELOADED_OPTION_VALUE: u32 = 255;

/// Interns the decimal spelling of every value in `0..=max_value` (capped at
/// [`MAX_PRELOADED_OPTION_VALUE`]), so building defines on the compiler
/// thread rarely allocates.
pub fn preload_option_values(max_value: u32) {
    for value in 0..=max_value.min(MAX_PRELOADED_OPTION_VALUE) {
        intern(&value.to_string());
    }
}
