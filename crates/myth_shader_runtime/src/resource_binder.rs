//! Shader Resource Binder
//!
//! Maps the resources a permutation reflects to what render code supplies:
//!
//! | Reflected resource            | Bound to                                     |
//! |-------------------------------|----------------------------------------------|
//! | CBV `<Provider>Data`          | the provider's constant buffer (`Default`)   |
//! | SRV / UAV named like an input | that provider input                          |
//! | SRV `g_UnifiedConstantBuffer` | the per-instance global buffer               |
//! | Sampler                       | the compiled `SamplerState` of the same name |
//!
//! Each entry records the root parameter, descriptor range and range entry it
//! writes, so binding at draw time needs no name lookups.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::input_provider::{
    GLOBAL_BUFFER_NAME, ShaderInputProviderDeclaration, ShaderInputProviderUsage, ShaderInputType,
};
use crate::reflection::{
    DescriptorRangeType, DescriptorSetEntryDeclaration, RootSignatureLayout,
    RootSignatureParameterEntry, ShaderReflectionData,
};
use crate::stage::ShaderVisibility;
use crate::state_block::sampler_state::SamplerState;

/// A sampler block compiled for one permutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSamplerState {
    pub name: String,
    pub state: SamplerState,
}

/// What a binder entry writes into its descriptor slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShaderResourceBinding {
    /// The constant buffer of a `Default` usage provider.
    ProviderConstantBuffer { provider: String },
    /// One descriptor input of a provider.
    ProviderInput {
        provider: String,
        data_offset_in_provider: i32,
        input_type: ShaderInputType,
    },
    /// The global buffer of a provider usage.
    GlobalBuffer { usage: ShaderInputProviderUsage },
    Sampler { name: String, state: SamplerState },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderResourceBinderEntry {
    pub binding: ShaderResourceBinding,
    pub root_index: u16,
    pub descriptor_range_index: u16,
    pub descriptor_range_entry_index: u16,
    pub visibility: ShaderVisibility,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderResourceBinder {
    entries: Vec<ShaderResourceBinderEntry>,
}

impl ShaderResourceBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: Vec<ShaderResourceBinderEntry>) -> Self {
        Self { entries }
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ShaderResourceBinderEntry] {
        &self.entries
    }

    /// Adds an entry unless an identical slot assignment already exists
    /// (stages sharing a root parameter would otherwise add it twice).
    pub fn add_entry(&mut self, entry: ShaderResourceBinderEntry) {
        let duplicate = self.entries.iter().any(|existing| {
            existing.root_index == entry.root_index
                && existing.descriptor_range_index == entry.descriptor_range_index
                && existing.descriptor_range_entry_index == entry.descriptor_range_entry_index
                && existing.binding == entry.binding
        });
        if !duplicate {
            self.entries.push(entry);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Binding metadata stored with a compiled permutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderBindingLayout {
    pub root_signature_parameters: Vec<RootSignatureParameterEntry>,
    pub resource_binder: ShaderResourceBinder,
    pub descriptor_set_entries: Vec<DescriptorSetEntryDeclaration>,
    pub sampler_states: Vec<NamedSamplerState>,
}

// ─── Construction ──────────────────────────────────────────────────────────

/// Builds the binder of a permutation.
#[must_use]
pub fn create_shader_resource_binder(
    reflection: &ShaderReflectionData,
    layout: &RootSignatureLayout,
    providers: &[Arc<ShaderInputProviderDeclaration>],
    sampler_states: &[NamedSamplerState],
) -> ShaderResourceBinder {
    let mut binder = ShaderResourceBinder::new();

    let bind = |binder: &mut ShaderResourceBinder,
                    range_type: DescriptorRangeType,
                    input_index: usize,
                    resolve: &dyn Fn(&str) -> Option<ShaderResourceBinding>| {
        let input = &reflection.inputs(range_type)[input_index];
        let Some(binding) = resolve(&input.name) else {
            return;
        };

        for stage in input.visibility.stages() {
            let (Some(root_index), Some(entry_index)) = (
                layout.root_index(range_type, stage),
                layout.descriptor_range_entry_index(input, range_type, stage),
            ) else {
                continue;
            };

            binder.add_entry(ShaderResourceBinderEntry {
                binding: binding.clone(),
                root_index,
                descriptor_range_index: 0,
                descriptor_range_entry_index: entry_index,
                visibility: input.visibility,
            });
        }
    };

    // =========================================================
    // 1. Provider constant buffers
    // =========================================================
    let resolve_constant_buffer = |name: &str| {
        providers
            .iter()
            .filter(|p| p.usage().uses_constant_buffer())
            .find(|p| p.constant_buffer_name() == name)
            .map(|p| ShaderResourceBinding::ProviderConstantBuffer {
                provider: p.name().to_owned(),
            })
    };
    for i in 0..reflection.inputs(DescriptorRangeType::ConstantBufferView).len() {
        bind(&mut binder, DescriptorRangeType::ConstantBufferView, i, &resolve_constant_buffer);
    }

    // =========================================================
    // 2. Provider inputs (SRV / UAV) and the global buffer
    // =========================================================
    let resolve_input = |name: &str| {
        if name == GLOBAL_BUFFER_NAME {
            return Some(ShaderResourceBinding::GlobalBuffer {
                usage: ShaderInputProviderUsage::PerInstance,
            });
        }
        providers.iter().find_map(|p| {
            p.find_input(name).map(|input| ShaderResourceBinding::ProviderInput {
                provider: p.name().to_owned(),
                data_offset_in_provider: input.data_offset_in_provider,
                input_type: input.input_type,
            })
        })
    };
    for range_type in [
        DescriptorRangeType::ShaderResourceView,
        DescriptorRangeType::UnorderedAccessView,
    ] {
        for i in 0..reflection.inputs(range_type).len() {
            bind(&mut binder, range_type, i, &resolve_input);
        }
    }

    // =========================================================
    // 3. Samplers
    // =========================================================
    let resolve_sampler = |name: &str| {
        sampler_states
            .iter()
            .find(|s| s.name == name)
            .map(|s| ShaderResourceBinding::Sampler {
                name: s.name.clone(),
                state: s.state,
            })
    };
    for i in 0..reflection.inputs(DescriptorRangeType::Sampler).len() {
        bind(&mut binder, DescriptorRangeType::Sampler, i, &resolve_sampler);
    }

    log::trace!("Created shader resource binder with {} entries", binder.len());
    binder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ReflectedShaderInput, ShaderInputKind};
    use crate::reflection::build_root_signature;
    use crate::stage::ShaderStage;

    fn providers() -> Vec<Arc<ShaderInputProviderDeclaration>> {
        vec![
            Arc::new(
                ShaderInputProviderDeclaration::new("Camera", ShaderInputProviderUsage::Default)
                    .with_input("ViewProjection", ShaderInputType::Float4x4),
            ),
            Arc::new(
                ShaderInputProviderDeclaration::new("Material", ShaderInputProviderUsage::Default)
                    .with_input("Tint", ShaderInputType::Float4)
                    .with_input("AlbedoTexture", ShaderInputType::Texture2D),
            ),
        ]
    }

    #[test]
    fn test_binder_maps_every_category() {
        let mut reflection = ShaderReflectionData::new();
        reflection.add_stage_inputs(
            &[
                ReflectedShaderInput::new("CameraData", 0, ShaderInputKind::ConstantBuffer),
                ReflectedShaderInput::new(GLOBAL_BUFFER_NAME, 0, ShaderInputKind::StructuredBuffer),
            ],
            ShaderVisibility::VERTEX,
        );
        reflection.add_stage_inputs(
            &[
                ReflectedShaderInput::new("AlbedoTexture", 1, ShaderInputKind::Texture),
                ReflectedShaderInput::new("LinearClamp", 0, ShaderInputKind::Sampler),
                ReflectedShaderInput::new("Unmatched", 2, ShaderInputKind::Texture),
            ],
            ShaderVisibility::PIXEL,
        );

        let layout = build_root_signature(&reflection);
        let samplers = [NamedSamplerState {
            name: "LinearClamp".to_owned(),
            state: SamplerState::default(),
        }];
        let binder = create_shader_resource_binder(&reflection, &layout, &providers(), &samplers);

        let bindings: Vec<_> = binder.entries().iter().map(|e| &e.binding).collect();
        assert_eq!(bindings.len(), 4);
        assert!(bindings.contains(&&ShaderResourceBinding::ProviderConstantBuffer {
            provider: "Camera".to_owned()
        }));
        assert!(bindings.contains(&&ShaderResourceBinding::GlobalBuffer {
            usage: ShaderInputProviderUsage::PerInstance
        }));
        assert!(bindings.contains(&&ShaderResourceBinding::ProviderInput {
            provider: "Material".to_owned(),
            data_offset_in_provider: 16,
            input_type: ShaderInputType::Texture2D,
        }));
        assert!(matches!(
            bindings.iter().find(|b| matches!(b, ShaderResourceBinding::Sampler { .. })),
            Some(ShaderResourceBinding::Sampler { name, .. }) if name == "LinearClamp"
        ));
    }

    #[test]
    fn test_shared_parameter_is_bound_once() {
        let mut reflection = ShaderReflectionData::new();
        let cbuffer = [ReflectedShaderInput::new("CameraData", 0, ShaderInputKind::ConstantBuffer)];
        reflection.add_stage_inputs(&cbuffer, ShaderVisibility::VERTEX);
        reflection.add_stage_inputs(&cbuffer, ShaderVisibility::PIXEL);

        let layout = build_root_signature(&reflection);
        let binder = create_shader_resource_binder(&reflection, &layout, &providers(), &[]);

        assert_eq!(binder.len(), 1);
        let stages: Vec<_> = binder.entries()[0].visibility.stages().collect();
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Pixel]);
    }
}
