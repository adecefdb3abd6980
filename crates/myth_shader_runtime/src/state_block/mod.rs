//! State Block Compilers
//!
//! Family sources may embed fixed-function state as small text blocks:
//!
//! ```text
//! RenderState
//! {
//!     CullMode = CullNone;
//! #if LIGHTING
//!     BlendEnable[0] = true;
//! #endif
//! }
//! ```
//!
//! A block is preprocessed with the key's defines first (so `#if` sections
//! follow the permutation), then parsed as a sequence of `option = value;`
//! statements. [`render_state`] and [`sampler_state`] interpret the options;
//! this module holds the shared statement parser and value interpreters.

pub mod render_state;
pub mod sampler_state;

use thiserror::Error;

/// Why a state block did not compile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateBlockError {
    /// The option name is not known to the block type.
    #[error("Unrecognized state option '{0}'")]
    UnrecognizedOption(String),

    /// The value cannot be interpreted for the option.
    #[error("Invalid value '{value}' for state option '{option}'")]
    InvalidValueTypeForOption {
        /// Option name
        option: String,
        /// Rejected value
        value: String,
    },

    /// A statement starts with `=`.
    #[error("State statement '{0}' has no option name")]
    MissingOption(String),

    /// A statement has no value after the option name.
    #[error("State option '{0}' has no value")]
    MissingValueForOption(String),

    /// An array option indexes past the end of its array.
    #[error("State option '{option}' uses array index {index} (maximum is {max})")]
    InvalidArrayIndex {
        /// Option name including the index
        option: String,
        /// Parsed index
        index: usize,
        /// Largest valid index
        max: usize,
    },

    /// The block could not be preprocessed.
    #[error("State block preprocessing failed: {0}")]
    Preprocess(String),
}

impl StateBlockError {
    pub(crate) fn invalid_value(option: &str, value: &str) -> Self {
        Self::InvalidValueTypeForOption {
            option: option.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Declares a `#[repr(u8)]` state enum together with its accepted spellings
/// (matched ignoring ASCII case).
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal => [$($spelling:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            /// Parses a block value.
            #[must_use]
            pub fn parse(value: &str) -> Option<Self> {
                $(
                    if [$($spelling),+].iter().any(|s| s.eq_ignore_ascii_case(value)) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }
    };
}

pub(crate) use state_enum;

state_enum! {
    /// Depth, stencil and sampler comparison.
    pub enum ComparisonFunc {
        Never = 0 => ["Never"],
        Less = 1 => ["Less"],
        Equal = 2 => ["Equal"],
        LessEqual = 3 => ["LessEqual"],
        Greater = 4 => ["Greater"],
        NotEqual = 5 => ["NotEqual"],
        GreaterEqual = 6 => ["GreaterEqual"],
        Always = 7 => ["Always"],
    }
}

// ─── Statement Parser ──────────────────────────────────────────────────────

/// Splits a block body into `option = value;` statements and feeds each pair
/// to `interpret`, stopping at the first error.
///
/// Whitespace around names and values is ignored, as are empty statements.
pub fn compile_state_block<F>(source: &str, mut interpret: F) -> Result<(), StateBlockError>
where
    F: FnMut(&str, &str) -> Result<(), StateBlockError>,
{
    for statement in source.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        let (option, value) = match statement.split_once('=') {
            Some((option, value)) => (option.trim(), value.trim()),
            None => (statement, ""),
        };

        if option.is_empty() {
            return Err(StateBlockError::MissingOption(statement.to_owned()));
        }
        if value.is_empty() {
            return Err(StateBlockError::MissingValueForOption(option.to_owned()));
        }

        interpret(option, value)?;
    }

    Ok(())
}

// ─── Value Interpreters ────────────────────────────────────────────────────

#[must_use]
pub fn interpret_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Decimal (optionally negative) or `0x` hexadecimal integer.
#[must_use]
pub fn interpret_integer(value: &str) -> Option<i64> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Float literal with an optional `f` suffix, e.g. `-0.5f`.
#[must_use]
pub fn interpret_float(value: &str) -> Option<f32> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'f' | 'F'));
    if !valid {
        return None;
    }
    value.trim_end_matches(['f', 'F']).parse::<f32>().ok()
}

/// Splits `Name[3]` into `("Name", 3)`.
#[must_use]
pub fn split_array_option(option: &str) -> Option<(&str, usize)> {
    let open = option.rfind('[')?;
    let inner = option[open + 1..].strip_suffix(']')?;
    let index = inner.trim().parse::<usize>().ok()?;
    Some((option[..open].trim_end(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &str) -> Result<Vec<(String, String)>, StateBlockError> {
        let mut pairs = Vec::new();
        compile_state_block(source, |option, value| {
            pairs.push((option.to_owned(), value.to_owned()));
            Ok(())
        })?;
        Ok(pairs)
    }

    #[test]
    fn test_statements_are_trimmed_and_split() {
        let pairs = collect("\n  CullMode = CullNone ;\n\n DepthEnable=false;;").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("CullMode".to_owned(), "CullNone".to_owned()),
                ("DepthEnable".to_owned(), "false".to_owned()),
            ]
        );
    }

    #[test]
    fn test_missing_pieces_are_reported() {
        assert_eq!(
            collect("= true;"),
            Err(StateBlockError::MissingOption("= true".to_owned()))
        );
        assert_eq!(
            collect("DepthEnable =;"),
            Err(StateBlockError::MissingValueForOption("DepthEnable".to_owned()))
        );
        assert_eq!(
            collect("DepthEnable;"),
            Err(StateBlockError::MissingValueForOption("DepthEnable".to_owned()))
        );
    }

    #[test]
    fn test_value_interpreters() {
        assert_eq!(interpret_bool("TRUE"), Some(true));
        assert_eq!(interpret_bool("1"), None);
        assert_eq!(interpret_integer("0xFF"), Some(255));
        assert_eq!(interpret_integer("-12"), Some(-12));
        assert_eq!(interpret_integer("abc"), None);
        assert_eq!(interpret_float("0.5f"), Some(0.5));
        assert_eq!(interpret_float("-2"), Some(-2.0));
        assert_eq!(interpret_float("1e3"), None);
    }

    #[test]
    fn test_split_array_option() {
        assert_eq!(split_array_option("BlendEnable[3]"), Some(("BlendEnable", 3)));
        assert_eq!(split_array_option("BlendEnable"), None);
        assert_eq!(split_array_option("BlendEnable[x]"), None);
    }

    #[test]
    fn test_comparison_func_spellings() {
        assert_eq!(ComparisonFunc::parse("lessequal"), Some(ComparisonFunc::LessEqual));
        assert_eq!(ComparisonFunc::parse("ALWAYS"), Some(ComparisonFunc::Always));
        assert_eq!(ComparisonFunc::parse("Sometimes"), None);
    }
}
