//! # Myth Shader Core
//!
//! Permutation-key algebra for the Myth shader system:
//!
//! - [`schema`]: data-driven declaration of options (name + bit-width) and
//!   families (source file + ordered option list).
//! - [`key`]: the 32-bit [`ShaderKey`], family in bits 0–7, options in 8–31.
//! - [`key_group`]: per-family bit layouts and permutation enumeration.
//! - [`variation`]: per-family value ranges and forbidden option combinations.
//! - [`defines`]: the preprocessor macro set derived from a key.
//!
//! Nothing in this crate spawns threads or touches the GPU.

pub mod builtin;
pub mod defines;
pub mod errors;
pub mod family;
pub mod interner;
pub mod key;
pub mod key_group;
pub mod option;
pub mod schema;
pub mod variation;

pub use defines::ShaderDefines;
pub use errors::{Result, ShaderError};
pub use family::{MAX_SHADER_FAMILIES, ShaderFamily, ShaderFamilyDesc};
pub use key::{RawShaderKey, ShaderKey};
pub use key_group::{ShaderKeyGroup, ShaderKeyGroups, ShaderKeyOptionSlot};
pub use option::{MAX_SHADER_OPTION_BITS, ShaderOption, ShaderOptionDesc};
pub use schema::{ShaderSchema, ShaderSchemaBuilder, ShaderSchemaDesc};
pub use variation::{ShaderKeyValidation, ShaderVariationSetManager, ValidShaderOptionValueRange};
