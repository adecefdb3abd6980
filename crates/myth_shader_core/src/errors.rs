//! Error Types
//!
//! Errors raised while declaring the option/family schema and while reading
//! shader keys through the checked accessors.
//!
//! Contract violations that would silently corrupt a key (an option value that
//! does not fit its bit-width, a foreign option written into a key) are not
//! represented here: they panic at the call site.
//!
//! ```rust,ignore
//! use myth_shader_core::errors::{Result, ShaderError};
//!
//! fn lighting(key: ShaderKey, groups: &ShaderKeyGroups) -> Result<u32> {
//!     key.shader_option_value(groups, LIGHTING)
//! }
//! ```

use thiserror::Error;

/// The error type for schema declaration and checked key access.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Schema Errors
    // ========================================================================
    /// An option was declared with a bit-width outside `1..=24`.
    #[error("Shader option '{option}' declares {bits} bits (expected 1..=24)")]
    InvalidOptionWidth {
        /// Display name of the option
        option: String,
        /// The rejected width
        bits: u32,
    },

    /// The options of a family do not fit in the 24-bit option field.
    #[error("Shader family '{family}' needs {bits} option bits (maximum is 24)")]
    FamilyOptionBitsExceeded {
        /// Family name
        family: String,
        /// Sum of the declared option widths
        bits: u32,
    },

    /// More families were declared than the 8-bit family field can address.
    #[error("Too many shader families: {0} (maximum is 256)")]
    TooManyFamilies(usize),

    /// Two options share the same display name.
    #[error("Duplicate shader option name: {0}")]
    DuplicateOptionName(String),

    /// Two families share the same name.
    #[error("Duplicate shader family name: {0}")]
    DuplicateFamilyName(String),

    /// A family lists the same option twice.
    #[error("Shader family '{family}' lists option '{option}' more than once")]
    DuplicateFamilyOption {
        /// Family name
        family: String,
        /// Repeated option name
        option: String,
    },

    /// A family references an option that was never declared.
    #[error("Shader family '{family}' references unknown option '{option}'")]
    UnknownOption {
        /// Family name
        family: String,
        /// Unresolved option name
        option: String,
    },

    /// The designated Error family does not exist.
    #[error("No Error shader family declared (looked for '{0}')")]
    MissingErrorFamily(String),

    /// A family was referenced by a name the schema does not declare.
    #[error("Unknown shader family name: {0}")]
    UnknownFamilyName(String),

    /// Failed to parse a JSON schema document.
    #[error("Shader schema parse error: {0}")]
    SchemaParse(#[from] serde_json::Error),

    // ========================================================================
    // Key Errors
    // ========================================================================
    /// The queried option is not part of the key's family layout.
    #[error("Shader option '{option}' is not part of shader family '{family}'")]
    OptionNotInFamily {
        /// Family name of the key
        family: String,
        /// Display name of the option
        option: String,
    },

    /// The key's family has no registered key group.
    #[error("Shader family ordinal {0} has no key group")]
    UnknownFamily(u8),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;
