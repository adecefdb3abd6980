//! Shader System Settings
//!
//! Consumed once by [`ShaderSystem::initialize`](crate::system::ShaderSystem::initialize)
//! (or piecewise by the individual services). Every field has a default, so a
//! JSON settings file only needs the values it changes:
//!
//! ```json
//! { "shader_directory": "assets/shaders", "watcher": { "enabled": false } }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::stage::ShaderStage;

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Source watcher configuration.
///
/// | Field               | Description                                 | Default |
/// |---------------------|---------------------------------------------|---------|
/// | `enabled`           | Spawn the polling thread                    | `true`  |
/// | `poll_interval_ms`  | Delay between two scans                     | `100`   |
/// | `family_extension`  | Extension of family source files            | `fx`    |
/// | `include_extension` | Extension of shared include files           | `hlsl`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub family_extension: String,
    pub include_extension: String,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 100,
            family_extension: "fx".to_owned(),
            include_extension: "hlsl".to_owned(),
        }
    }
}

impl WatcherSettings {
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Entry point and target profile of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntryPoint {
    pub entry_point: String,
    pub target: String,
}

impl StageEntryPoint {
    #[must_use]
    pub fn new(entry_point: &str, target: &str) -> Self {
        Self {
            entry_point: entry_point.to_owned(),
            target: target.to_owned(),
        }
    }
}

/// Compiler worker configuration.
///
/// A stage is only compiled when its entry point name occurs in the
/// preprocessed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Extra attempts at opening a source file that is momentarily locked.
    pub source_read_retries: u32,
    pub source_read_retry_delay_ms: u64,
    pub vertex: StageEntryPoint,
    pub pixel: StageEntryPoint,
    pub compute: StageEntryPoint,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            source_read_retries: 5,
            source_read_retry_delay_ms: 100,
            vertex: StageEntryPoint::new("VS_Main", "vs_5_0"),
            pixel: StageEntryPoint::new("PS_Main", "ps_5_0"),
            compute: StageEntryPoint::new("CS_Main", "cs_5_0"),
        }
    }
}

impl CompilerSettings {
    #[inline]
    #[must_use]
    pub fn source_read_retry_delay(&self) -> Duration {
        Duration::from_millis(self.source_read_retry_delay_ms)
    }

    /// Compiled stages with their entry points, in stage order.
    #[must_use]
    pub fn stage_entry_points(&self) -> [(ShaderStage, &StageEntryPoint); 3] {
        [
            (ShaderStage::Vertex, &self.vertex),
            (ShaderStage::Pixel, &self.pixel),
            (ShaderStage::Compute, &self.compute),
        ]
    }
}

// ---------------------------------------------------------------------------
// ShaderSystemSettings
// ---------------------------------------------------------------------------

/// Top-level configuration of the shader services.
///
/// | Field                | Description                                  | Default                    |
/// |----------------------|----------------------------------------------|----------------------------|
/// | `shader_directory`   | Root of the family sources and includes      | `shaders`                  |
/// | `database_path`      | Binary shader cache file                     | `shaders/shadercache.bin`  |
/// | `mandatory_families` | Families compiled synchronously at startup   | empty (Error family only)  |
/// | `watcher`            | [`WatcherSettings`]                          |                            |
/// | `compiler`           | [`CompilerSettings`]                         |                            |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSystemSettings {
    pub shader_directory: PathBuf,
    pub database_path: PathBuf,
    /// Family names compiled at startup in addition to the Error family.
    pub mandatory_families: Vec<String>,
    pub watcher: WatcherSettings,
    pub compiler: CompilerSettings,
}

impl Default for ShaderSystemSettings {
    fn default() -> Self {
        Self {
            shader_directory: PathBuf::from("shaders"),
            database_path: PathBuf::from("shaders").join("shadercache.bin"),
            mandatory_families: Vec::new(),
            watcher: WatcherSettings::default(),
            compiler: CompilerSettings::default(),
        }
    }
}

impl ShaderSystemSettings {
    /// Settings rooted at `shader_directory`, with the cache file inside it.
    #[must_use]
    pub fn with_shader_directory(shader_directory: impl Into<PathBuf>) -> Self {
        let shader_directory = shader_directory.into();
        Self {
            database_path: shader_directory.join("shadercache.bin"),
            shader_directory,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
