//! Error Types
//!
//! [`ShaderRuntimeError`] covers the recoverable failures of the shader
//! services: database format problems, unreadable sources, native compiler
//! failures and state-block compilation errors.
//!
//! Compilation failures of individual keys never cross the worker thread as
//! errors; they are recorded per key and surface as an Error-shader fallback.
//! The variants here are what synchronous calls (`load`, `compile_now`,
//! `initialize`) return.

use std::path::PathBuf;

use myth_shader_core::{ShaderError, ShaderKey};
use thiserror::Error;

use crate::backend::BackendError;
use crate::state_block::StateBlockError;

/// The error type of the shader runtime services.
#[derive(Error, Debug)]
pub enum ShaderRuntimeError {
    // ========================================================================
    // Schema & Key Errors
    // ========================================================================
    /// Schema or key error from `myth_shader_core`.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    // ========================================================================
    // Database Errors
    // ========================================================================
    /// The file does not start with the shader database magic numbers.
    #[error("Shader database magic mismatch (found {low:#018x}/{high:#018x})")]
    MagicMismatch {
        /// Low magic found in the file
        low: u64,
        /// High magic found in the file
        high: u64,
    },

    /// The database was written for another platform.
    #[error("Shader database platform mismatch: expected {expected}, found {found}")]
    PlatformMismatch {
        /// Platform id of this build
        expected: u32,
        /// Platform id stored in the file
        found: u32,
    },

    /// The database was written by another format version.
    #[error("Shader database version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build writes
        expected: u32,
        /// Version stored in the file
        found: u32,
    },

    /// The file ended in the middle of a record.
    #[error("Shader database truncated at byte {offset} (needed {needed} more bytes)")]
    Truncated {
        /// Read cursor when the data ran out
        offset: usize,
        /// Bytes the record still needed
        needed: usize,
    },

    /// A record holds a value that cannot be decoded.
    #[error("Shader database corrupted: {0}")]
    Corrupted(String),

    /// An entry's metadata record could not be encoded or decoded.
    #[error("Shader entry metadata error: {0}")]
    Metadata(#[from] bincode::Error),

    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// The family source file could not be opened after every retry.
    #[error("Failed to read shader source {path:?}: {source}")]
    SourceUnavailable {
        /// Full path of the family source
        path: PathBuf,
        /// Last I/O error
        source: std::io::Error,
    },

    /// The native preprocessor, compiler or reflection failed.
    #[error("Native shader backend error: {0}")]
    Backend(#[from] BackendError),

    /// The compiled stages do not form a usable shader.
    #[error("{key} did not compile: {reason}")]
    CompilationFailed {
        /// Key being compiled
        key: ShaderKey,
        /// Why the result was rejected
        reason: String,
    },

    /// A render-state or sampler-state block did not compile.
    #[error("State block error: {0}")]
    StateBlock(#[from] StateBlockError),

    // ========================================================================
    // Service Errors
    // ========================================================================
    /// A mandatory shader could not be built during initialization.
    #[error("Mandatory shader {0} is unavailable")]
    ErrorShaderUnavailable(ShaderKey),

    /// The shader directory could not be watched.
    #[error("Shader watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A background thread could not be spawned.
    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        /// Thread name
        name: &'static str,
        /// Spawn error
        source: std::io::Error,
    },

    /// Failed to parse settings.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, ShaderRuntimeError>`.
pub type Result<T> = std::result::Result<T, ShaderRuntimeError>;
