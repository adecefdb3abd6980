//! Per-key compilation.
//!
//! [`load_family_source`] reads and splits a family file once;
//! [`compile_shader_key`] turns it into a [`ShaderEntrySet`] for one key.
//! Both run on the worker thread and on the synchronous bring-up path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use myth_shader_core::{ShaderDefines, ShaderFamily, ShaderKey, ShaderKeyGroups};

use crate::backend::{NativeShaderCompiler, StageCompileRequest};
use crate::compiler::source::{ShaderSourceParts, read_shader_source, split_shader_source};
use crate::database::ShaderEntrySet;
use crate::errors::{Result, ShaderRuntimeError};
use crate::input_provider::{ShaderInputProviderDeclaration, ShaderInputProviderRegistry};
use crate::preprocess::effective_source_for_key;
use crate::reflection::{ShaderReflectionData, build_root_signature};
use crate::resource_binder::{NamedSamplerState, ShaderBindingLayout, create_shader_resource_binder};
use crate::settings::CompilerSettings;
use crate::stage::ShaderStage;
use crate::state_block::render_state::{RenderStateBlock, compile_render_state_block};
use crate::state_block::sampler_state::{SamplerState, compile_sampler_state_block};

/// Borrowed view of everything a compilation needs.
#[derive(Clone, Copy)]
pub struct CompilationContext<'a> {
    pub groups: &'a ShaderKeyGroups,
    pub backend: &'a dyn NativeShaderCompiler,
    pub providers: &'a ShaderInputProviderRegistry,
    pub settings: &'a CompilerSettings,
    pub shader_directory: &'a Path,
}

/// A family source read from disk and split into its parts.
#[derive(Debug, Clone)]
pub struct FamilySource {
    pub family: ShaderFamily,
    pub source_name: String,
    pub path: PathBuf,
    pub parts: ShaderSourceParts,
    pub providers: Vec<Arc<ShaderInputProviderDeclaration>>,
}

/// Reads the source file of `family`.
pub fn load_family_source(ctx: &CompilationContext<'_>, family: ShaderFamily) -> Result<FamilySource> {
    let schema = ctx.groups.schema();
    let source_name = schema
        .family(family)
        .map_or_else(|| format!("{}.fx", schema.family_name(family)), |desc| desc.source_file().to_owned());
    let path = ctx.shader_directory.join(&source_name);

    let source = read_shader_source(
        &path,
        ctx.settings.source_read_retries,
        ctx.settings.source_read_retry_delay(),
    )?;
    let parts = split_shader_source(&source);
    let providers = ctx.providers.resolve(&parts.input_provider_names);

    log::debug!(
        "Loaded shader source {} ({} sampler blocks, {} input providers)",
        path.display(),
        parts.sampler_states.len(),
        providers.len()
    );

    Ok(FamilySource {
        family,
        source_name,
        path,
        parts,
        providers,
    })
}

/// Compiles one permutation of `source`.
///
/// `timestamp` is the source timestamp sampled before compiling; it is
/// stamped on the result so a change made during compilation still reads as
/// stale afterwards.
pub fn compile_shader_key(
    ctx: &CompilationContext<'_>,
    source: &FamilySource,
    key: ShaderKey,
    timestamp: u64,
) -> Result<ShaderEntrySet> {
    debug_assert_eq!(key.family(), source.family);

    // =========================================================
    // 1. Defines and permutation source
    // =========================================================
    let defines = ctx.groups.shader_defines_for_key(key);
    let preprocessed = effective_source_for_key(
        ctx.backend,
        &source.source_name,
        &source.parts.shader_source,
        &defines,
        ctx.shader_directory,
    )?;

    // =========================================================
    // 2. Native compilation per stage
    // =========================================================
    let mut raw_shaders: [Vec<u8>; ShaderStage::COUNT] = Default::default();
    for (stage, entry) in ctx.settings.stage_entry_points() {
        if !preprocessed.contains(entry.entry_point.as_str()) {
            continue;
        }

        let request = StageCompileRequest {
            source_name: &source.source_name,
            source: &preprocessed,
            entry_point: &entry.entry_point,
            target: &entry.target,
            defines: &defines,
            include_directory: ctx.shader_directory,
        };
        match ctx.backend.compile(&request) {
            Ok(bytecode) => raw_shaders[stage.index()] = bytecode,
            Err(err) => log::error!(
                "Failed to compile {} stage of {}: {err}",
                stage.name(),
                ctx.groups.describe_key(key)
            ),
        }
    }

    let compiled = |stage: ShaderStage| !raw_shaders[stage.index()].is_empty();
    let vertex = compiled(ShaderStage::Vertex);
    let pixel = compiled(ShaderStage::Pixel);
    if vertex != pixel {
        return Err(ShaderRuntimeError::CompilationFailed {
            key,
            reason: "only one of the vertex and pixel stages compiled".to_owned(),
        });
    }
    if !vertex && !compiled(ShaderStage::Compute) {
        return Err(ShaderRuntimeError::CompilationFailed {
            key,
            reason: "no vertex, pixel or compute stage compiled".to_owned(),
        });
    }

    // =========================================================
    // 3. Reflection and root signature
    // =========================================================
    let mut reflection = ShaderReflectionData::new();
    for stage in ShaderStage::ALL {
        let blob = &raw_shaders[stage.index()];
        if blob.is_empty() {
            continue;
        }
        let inputs = ctx.backend.reflect(blob)?;
        reflection.add_stage_inputs(&inputs, stage.visibility());
    }
    let layout = build_root_signature(&reflection);

    // =========================================================
    // 4. Sampler states and resource binder
    // =========================================================
    let sampler_states: Vec<_> = source
        .parts
        .sampler_states
        .iter()
        .map(|block| NamedSamplerState {
            name: block.name.clone(),
            state: compile_sampler_block(ctx, &block.name, &block.source, &defines, key),
        })
        .collect();

    let resource_binder =
        create_shader_resource_binder(&reflection, &layout, &source.providers, &sampler_states);

    // =========================================================
    // 5. Render state
    // =========================================================
    let render_state_block = compile_render_block(ctx, source, &defines, key);

    let binding_layout = ShaderBindingLayout {
        descriptor_set_entries: layout.descriptor_set_declarations(),
        root_signature_parameters: layout.parameters,
        resource_binder,
        sampler_states,
    };

    log::debug!(
        "Compiled {} ({} root parameters, {} bindings)",
        ctx.groups.describe_key(key),
        binding_layout.root_signature_parameters.len(),
        binding_layout.resource_binder.len()
    );

    Ok(ShaderEntrySet::new(
        timestamp,
        raw_shaders,
        render_state_block,
        binding_layout,
    ))
}

fn compile_sampler_block(
    ctx: &CompilationContext<'_>,
    name: &str,
    block: &str,
    defines: &ShaderDefines,
    key: ShaderKey,
) -> SamplerState {
    let result = effective_source_for_key(ctx.backend, name, block, defines, ctx.shader_directory)
        .map_err(ShaderRuntimeError::from)
        .and_then(|text| Ok(compile_sampler_state_block(&text)?));

    result.unwrap_or_else(|err| {
        log::warn!(
            "Sampler state '{name}' of {} did not compile, using defaults: {err}",
            ctx.groups.describe_key(key)
        );
        SamplerState::default()
    })
}

fn compile_render_block(
    ctx: &CompilationContext<'_>,
    source: &FamilySource,
    defines: &ShaderDefines,
    key: ShaderKey,
) -> RenderStateBlock {
    let block = &source.parts.render_state_source;
    if block.trim().is_empty() {
        return RenderStateBlock::default();
    }

    let result = effective_source_for_key(
        ctx.backend,
        &source.source_name,
        block,
        defines,
        ctx.shader_directory,
    )
    .map_err(ShaderRuntimeError::from)
    .and_then(|text| Ok(compile_render_state_block(&text)?));

    result.unwrap_or_else(|err| {
        log::warn!(
            "Render state of {} did not compile, using defaults: {err}",
            ctx.groups.describe_key(key)
        );
        RenderStateBlock::default()
    })
}
