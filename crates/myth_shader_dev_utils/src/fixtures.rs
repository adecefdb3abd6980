//! Scratch shader trees and service setup shared by tests and benchmarks.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use myth_shader_core::builtin::{builtin_schema, families, options};
use myth_shader_core::{ShaderKeyGroups, ShaderVariationSetManager};
use myth_shader_runtime::input_provider::{
    ShaderInputProviderDeclaration, ShaderInputProviderRegistry, ShaderInputProviderUsage,
    ShaderInputType,
};
use myth_shader_runtime::settings::ShaderSystemSettings;
use myth_shader_runtime::{NativeShaderCompiler, ShaderCompiler, ShaderDatabase, ShaderWatcher};
use tempfile::TempDir;

use crate::mock_compiler::MockShaderCompiler;

pub const ERROR_FX: &str = r#"// Magenta fallback.
#include "shaderinputproviders/Camera.hlsl"

float4 VS_Main(float3 position : POSITION) : SV_Position
{
    return mul(float4(position, 1.0), ViewProjection);
}

float4 PS_Main() : SV_Target
{
    return float4(1.0, 0.0, 1.0, 1.0);
}
"#;

pub const GENERIC_FX: &str = r#"#include "shaderinputproviders/Camera.hlsl"
#include "shaderinputproviders/Material.hlsl"
#include "common/Lighting.hlsl"

RenderState
{
#if QUALITY > 1
    CullMode = CullNone;
#endif
    EnableDepthWrite = true;
}

SamplerState LinearWrap
{
    AddressModeU = Wrap;
    AddressModeV = Wrap;
}

float4 VS_Main(float3 position : POSITION) : SV_Position
{
    return mul(float4(position, 1.0), ViewProjection);
}

float4 PS_Main(float2 uv : TEXCOORD0) : SV_Target
{
    float4 color = g_Albedo.Sample(LinearWrap, uv);
#if LIGHTING
    color.rgb *= ApplyLighting(uv);
#endif
    return color;
}
"#;

pub const FULLSCREEN_FX: &str = r#"#include "shaderinputproviders/Camera.hlsl"

RenderState
{
    DepthEnable = false;
}

Texture2D g_Scene : register(t0);

float4 VS_Main(uint id : SV_VertexID) : SV_Position
{
    return float4(0.0, 0.0, 0.0, 1.0);
}

float4 PS_Main(float4 position : SV_Position) : SV_Target
{
#if TONEMAPPING == 3
    SYNTAX_ERROR
#endif
    return g_Scene.Load(int3(position.xy, 0));
}
"#;

pub const CAMERA_HLSL: &str = "cbuffer CameraData : register(b0)\n{\n    float4x4 ViewProjection;\n};\n";

pub const MATERIAL_HLSL: &str = "Texture2D g_Albedo : register(t0);\n";

pub const LIGHTING_HLSL: &str = "float3 ApplyLighting(float2 uv) { return float3(uv, 1.0); }\n";

/// A temporary shader directory, removed on drop.
#[derive(Debug)]
pub struct ShaderTreeFixture {
    dir: TempDir,
}

impl ShaderTreeFixture {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// A tree holding the built-in families and their includes.
    pub fn with_builtin_shaders() -> io::Result<Self> {
        let fixture = Self::new()?;
        fixture.write("Error.fx", ERROR_FX)?;
        fixture.write("Generic.fx", GENERIC_FX)?;
        fixture.write("Fullscreen.fx", FULLSCREEN_FX)?;
        fixture.write("shaderinputproviders/Camera.hlsl", CAMERA_HLSL)?;
        fixture.write("shaderinputproviders/Material.hlsl", MATERIAL_HLSL)?;
        fixture.write("common/Lighting.hlsl", LIGHTING_HLSL)?;
        Ok(fixture)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("shadercache.bin")
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn set_modified(&self, relative: &str, time: SystemTime) -> io::Result<()> {
        let file = std::fs::File::options()
            .write(true)
            .open(self.dir.path().join(relative))?;
        file.set_modified(time)
    }

    /// Moves the modification time of `relative` `seconds` into the future,
    /// so the change is visible regardless of filesystem timestamp
    /// resolution.
    pub fn touch_ahead(&self, relative: &str, seconds: u64) -> io::Result<()> {
        self.set_modified(relative, SystemTime::now() + Duration::from_secs(seconds))
    }

    /// Settings rooted at this tree with polling disabled and no read
    /// retries, for deterministic tests.
    #[must_use]
    pub fn settings(&self) -> ShaderSystemSettings {
        let mut settings = ShaderSystemSettings::with_shader_directory(self.dir.path());
        settings.watcher.enabled = false;
        settings.compiler.source_read_retries = 0;
        settings
    }

    /// Database, watcher and compiler wired over this tree, with the
    /// database loaded and one scan done. The compiler thread is not started.
    ///
    /// # Panics
    ///
    /// When the database file cannot be created or the watcher fails to
    /// start.
    #[must_use]
    pub fn services(&self) -> ShaderServices {
        let settings = self.settings();
        let variations = builtin_variations();
        let backend = Arc::new(MockShaderCompiler::new());

        let database = Arc::new(ShaderDatabase::new());
        if let Err(err) = database.load(&settings.database_path) {
            panic!("failed to load {}: {err}", settings.database_path.display());
        }

        let watcher = Arc::new(ShaderWatcher::new(
            &settings.shader_directory,
            settings.watcher.clone(),
            Arc::clone(variations.key_groups().schema()),
        ));
        if let Err(err) = watcher.start() {
            panic!("failed to start the shader watcher: {err}");
        }

        let native: Arc<dyn NativeShaderCompiler> = backend.clone();
        let compiler = Arc::new(ShaderCompiler::new(
            &settings.shader_directory,
            settings.compiler.clone(),
            Arc::clone(&variations),
            native,
            Arc::new(builtin_providers()),
            Arc::clone(&database),
            Arc::clone(&watcher),
        ));

        ShaderServices {
            variations,
            backend,
            database,
            watcher,
            compiler,
        }
    }
}

/// The shared services of a shader system, without a device.
pub struct ShaderServices {
    pub variations: Arc<ShaderVariationSetManager>,
    pub backend: Arc<MockShaderCompiler>,
    pub database: Arc<ShaderDatabase>,
    pub watcher: Arc<ShaderWatcher>,
    pub compiler: Arc<ShaderCompiler>,
}

/// Built-in schema with its variation rules: `Fullscreen` only uses
/// `TONEMAPPING` values 0..=2.
///
/// # Panics
///
/// When the built-in schema fails to build.
#[must_use]
pub fn builtin_variations() -> Arc<ShaderVariationSetManager> {
    let schema = match builtin_schema() {
        Ok(schema) => Arc::new(schema),
        Err(err) => panic!("built-in schema is invalid: {err}"),
    };
    let groups = Arc::new(ShaderKeyGroups::new(schema));

    let mut variations = ShaderVariationSetManager::new(groups);
    variations.declare_variation_set(families::FULLSCREEN, |set| {
        set.set_shader_option_value_range(options::TONEMAPPING, 0, 2);
    });
    Arc::new(variations)
}

/// Providers matching the fixture includes.
#[must_use]
pub fn builtin_providers() -> ShaderInputProviderRegistry {
    ShaderInputProviderRegistry::new()
        .with(
            ShaderInputProviderDeclaration::new("Camera", ShaderInputProviderUsage::Default)
                .with_input("ViewProjection", ShaderInputType::Float4x4),
        )
        .with(
            ShaderInputProviderDeclaration::new("Material", ShaderInputProviderUsage::Default)
                .with_input("g_Albedo", ShaderInputType::Texture2D),
        )
        .with(
            ShaderInputProviderDeclaration::new("Object", ShaderInputProviderUsage::PerInstance)
                .with_input("World", ShaderInputType::Float4x4),
        )
}

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Routes `log` output to the test harness.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
