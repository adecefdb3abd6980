//! # Myth Shader Dev Utils
//!
//! Support code for tests, benchmarks and tools. Not published.
//!
//! - [`mock_compiler`]: a deterministic [`NativeShaderCompiler`](myth_shader_runtime::NativeShaderCompiler).
//! - [`recording_device`]: a [`RenderDevice`](myth_shader_runtime::RenderDevice) that counts objects.
//! - [`fixtures`]: scratch shader trees, built-in variation rules and providers.

pub mod fixtures;
pub mod mock_compiler;
pub mod recording_device;

pub use fixtures::{
    ShaderServices, ShaderTreeFixture, builtin_providers, builtin_variations, init_test_logging, wait_until,
};
pub use mock_compiler::MockShaderCompiler;
pub use recording_device::RecordingRenderDevice;
