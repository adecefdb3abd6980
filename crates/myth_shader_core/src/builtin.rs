//! Built-in engine schema.
//!
//! | Family       | Options (key order)               |
//! |--------------|-----------------------------------|
//! | `Error`      | (none)                            |
//! | `Generic`    | `LIGHTING` (1), `QUALITY` (2)     |
//! | `Fullscreen` | `TONEMAPPING` (2), `QUALITY` (2)  |
//!
//! The constants in [`families`] and [`options`] are the ordinals the builder
//! assigns, in declaration order.

use crate::errors::Result;
use crate::schema::ShaderSchema;

pub mod families {
    use crate::family::ShaderFamily;

    pub const ERROR: ShaderFamily = ShaderFamily::from_index(0);
    pub const GENERIC: ShaderFamily = ShaderFamily::from_index(1);
    pub const FULLSCREEN: ShaderFamily = ShaderFamily::from_index(2);
}

pub mod options {
    use crate::option::ShaderOption;

    pub const LIGHTING: ShaderOption = ShaderOption::from_index(0);
    pub const QUALITY: ShaderOption = ShaderOption::from_index(1);
    pub const TONEMAPPING: ShaderOption = ShaderOption::from_index(2);
}

/// Builds the built-in schema.
pub fn builtin_schema() -> Result<ShaderSchema> {
    let mut builder = ShaderSchema::builder();

    let lighting = builder.option("LIGHTING", 1)?;
    let quality = builder.option("QUALITY", 2)?;
    let tonemapping = builder.option("TONEMAPPING", 2)?;
    debug_assert_eq!(
        (lighting, quality, tonemapping),
        (options::LIGHTING, options::QUALITY, options::TONEMAPPING)
    );

    let error = builder.family("Error", &[])?;
    let generic = builder.family("Generic", &[lighting, quality])?;
    let fullscreen = builder.family("Fullscreen", &[tonemapping, quality])?;
    debug_assert_eq!(
        (error, generic, fullscreen),
        (families::ERROR, families::GENERIC, families::FULLSCREEN)
    );

    builder.error_family(error);
    builder.build()
}
