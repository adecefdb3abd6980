//! # Myth Shader Runtime
//!
//! The services that turn [`ShaderKey`](myth_shader_core::ShaderKey)s into
//! bindable shaders:
//!
//! - [`database`]: persistent binary cache of compiled permutations.
//! - [`watcher`]: background poller publishing per-family source timestamps.
//! - [`compiler`]: background worker compiling, reflecting and storing keys.
//! - [`handler_manager`]: per-frame lookup with Error-shader fallback.
//! - [`system`]: the application context wiring the four together.
//!
//! The graphics API is reached only through the [`backend`] traits.

pub mod backend;
pub mod compiler;
pub mod database;
pub mod errors;
pub mod handler;
pub mod handler_manager;
pub mod input_provider;
pub mod preprocess;
pub mod reflection;
pub mod resource_binder;
pub mod settings;
pub mod stage;
pub mod state_block;
pub mod system;
pub mod watcher;

pub use backend::{
    BackendError, NativeShaderCompiler, PixelShaderHandle, PreprocessRequest,
    ReflectedShaderInput, RenderDevice, ShaderInputKind, StageCompileRequest, VertexShaderHandle,
};
pub use compiler::{CompiledShaderKeyEntry, RawShaderStatus, ShaderCompiler};
pub use database::{ShaderDatabase, ShaderEntrySet, ShaderLookup};
pub use errors::{Result, ShaderRuntimeError};
pub use handler::ShaderHandler;
pub use handler_manager::ShaderHandlerManager;
pub use input_provider::{
    ShaderInputProviderDeclaration, ShaderInputProviderRegistry, ShaderInputProviderUsage,
    ShaderInputType,
};
pub use settings::{CompilerSettings, ShaderSystemSettings, StageEntryPoint, WatcherSettings};
pub use stage::{ShaderStage, ShaderVisibility};
pub use system::ShaderSystem;
pub use watcher::{ShaderFile, ShaderWatcher};
