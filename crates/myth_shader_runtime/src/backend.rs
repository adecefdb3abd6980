//! Native Backend Seams
//!
//! The shader services never talk to a graphics API directly. Two traits are
//! the whole contract:
//!
//! - [`NativeShaderCompiler`]: preprocess, compile one stage, reflect a blob.
//!   Called from the compiler worker thread, hence `Send + Sync`.
//! - [`RenderDevice`]: create and destroy vertex / pixel shader objects.
//!   Called only from the thread that owns the
//!   [`ShaderHandlerManager`](crate::handler_manager::ShaderHandlerManager).

use std::path::Path;

use myth_shader_core::ShaderDefines;
use thiserror::Error;

/// Failure reported by a native backend, carrying its diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ─── Compiler ──────────────────────────────────────────────────────────────

/// Input of [`NativeShaderCompiler::preprocess`].
#[derive(Debug, Clone, Copy)]
pub struct PreprocessRequest<'a> {
    /// Name used in diagnostics, usually the family source filename.
    pub source_name: &'a str,
    pub source: &'a str,
    pub defines: &'a ShaderDefines,
    /// Directory `#include` directives resolve against.
    pub include_directory: &'a Path,
}

/// Input of [`NativeShaderCompiler::compile`].
#[derive(Debug, Clone, Copy)]
pub struct StageCompileRequest<'a> {
    pub source_name: &'a str,
    pub source: &'a str,
    /// Entry point function, e.g. `VS_Main`.
    pub entry_point: &'a str,
    /// Target profile, e.g. `vs_5_0`.
    pub target: &'a str,
    pub defines: &'a ShaderDefines,
    pub include_directory: &'a Path,
}

/// Resource category as reported by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderInputKind {
    ConstantBuffer,
    TextureBuffer,
    Texture,
    StructuredBuffer,
    ByteAddressBuffer,
    RwTexture,
    RwStructuredBuffer,
    RwByteAddressBuffer,
    AppendStructuredBuffer,
    ConsumeStructuredBuffer,
    Sampler,
}

/// One bound resource found in a compiled blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedShaderInput {
    pub name: String,
    pub bind_point: u16,
    pub kind: ShaderInputKind,
}

impl ReflectedShaderInput {
    pub fn new(name: impl Into<String>, bind_point: u16, kind: ShaderInputKind) -> Self {
        Self {
            name: name.into(),
            bind_point,
            kind,
        }
    }
}

/// Preprocessor, compiler and reflection of the native shading language.
pub trait NativeShaderCompiler: Send + Sync {
    /// Expands macros and includes. `#line` directives in the output are
    /// tolerated; callers strip them.
    fn preprocess(&self, request: &PreprocessRequest<'_>) -> Result<String, BackendError>;

    /// Compiles one entry point to bytecode.
    fn compile(&self, request: &StageCompileRequest<'_>) -> Result<Vec<u8>, BackendError>;

    /// Lists the resources a compiled blob binds.
    fn reflect(&self, bytecode: &[u8]) -> Result<Vec<ReflectedShaderInput>, BackendError>;
}

// ─── Device ────────────────────────────────────────────────────────────────

/// Opaque GPU vertex shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexShaderHandle(pub u64);

/// Opaque GPU pixel shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelShaderHandle(pub u64);

/// GPU object factory used by the handler manager.
pub trait RenderDevice {
    fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<VertexShaderHandle, BackendError>;
    fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<PixelShaderHandle, BackendError>;
    fn destroy_vertex_shader(&self, handle: VertexShaderHandle);
    fn destroy_pixel_shader(&self, handle: PixelShaderHandle);
}
