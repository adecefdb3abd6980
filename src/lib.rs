//! # Myth Shaders
//!
//! Shader permutation management for the Myth engine: bit-packed
//! [`ShaderKey`]s, a background compiler with reflection-driven resource
//! binding, a persistent binary shader cache and hot reload through a source
//! watcher.
//!
//! ```rust,ignore
//! use myth_shaders::prelude::*;
//!
//! let mut key = ShaderKey::new(families::GENERIC);
//! key.set_shader_option(&groups, options::QUALITY, 3);
//!
//! let handler = shader_system.get_shader_handler_for_shader_key(key);
//! ```
//!
//! The member crates are re-exported as [`core`] and [`runtime`].

pub use myth_shader_core as core;
pub use myth_shader_runtime as runtime;

pub use myth_shader_core::builtin;
pub use myth_shader_core::{
    ShaderDefines, ShaderError, ShaderFamily, ShaderKey, ShaderKeyGroups, ShaderKeyValidation,
    ShaderOption, ShaderSchema, ShaderSchemaBuilder, ShaderVariationSetManager,
};
pub use myth_shader_runtime::{
    NativeShaderCompiler, RawShaderStatus, RenderDevice, ShaderCompiler, ShaderDatabase,
    ShaderEntrySet, ShaderHandler, ShaderHandlerManager, ShaderLookup, ShaderRuntimeError,
    ShaderStage, ShaderSystem, ShaderSystemSettings, ShaderWatcher,
};

pub mod prelude {
    pub use myth_shader_core::builtin::{families, options};
    pub use myth_shader_core::{
        ShaderFamily, ShaderKey, ShaderKeyGroups, ShaderKeyValidation, ShaderOption, ShaderSchema,
        ShaderVariationSetManager,
    };
    pub use myth_shader_runtime::{
        NativeShaderCompiler, RenderDevice, ShaderHandler, ShaderInputProviderRegistry,
        ShaderSystem, ShaderSystemSettings,
    };
}
