//! Reflection merge and root-signature derivation.
//!
//! Every compiled stage blob is reflected; resources are bucketed by
//! descriptor range type and merged by name across stages (visibility masks
//! are OR-ed). The root signature then gets, per range type and per stage,
//! one descriptor table holding a single contiguous range from the lowest to
//! the highest bind point. Stages that see exactly the same resources share
//! a single table with the combined visibility.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::backend::{ReflectedShaderInput, ShaderInputKind};
use crate::stage::{ShaderStage, ShaderVisibility};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DescriptorRangeType {
    ConstantBufferView = 0,
    ShaderResourceView = 1,
    UnorderedAccessView = 2,
    Sampler = 3,
}

impl DescriptorRangeType {
    pub const COUNT: usize = 4;

    pub const ALL: [DescriptorRangeType; Self::COUNT] = [
        DescriptorRangeType::ConstantBufferView,
        DescriptorRangeType::ShaderResourceView,
        DescriptorRangeType::UnorderedAccessView,
        DescriptorRangeType::Sampler,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Range type a reflected resource binds through.
    #[must_use]
    pub fn for_input_kind(kind: ShaderInputKind) -> Self {
        match kind {
            ShaderInputKind::ConstantBuffer => Self::ConstantBufferView,
            ShaderInputKind::TextureBuffer
            | ShaderInputKind::Texture
            | ShaderInputKind::StructuredBuffer
            | ShaderInputKind::ByteAddressBuffer => Self::ShaderResourceView,
            ShaderInputKind::RwTexture
            | ShaderInputKind::RwStructuredBuffer
            | ShaderInputKind::RwByteAddressBuffer
            | ShaderInputKind::AppendStructuredBuffer
            | ShaderInputKind::ConsumeStructuredBuffer => Self::UnorderedAccessView,
            ShaderInputKind::Sampler => Self::Sampler,
        }
    }
}

// ─── Reflection Data ───────────────────────────────────────────────────────

/// A resource merged across stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInputReflection {
    pub name: String,
    pub bind_point: u16,
    pub visibility: ShaderVisibility,
}

/// Reflected resources of one permutation, bucketed by range type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflectionData {
    inputs: [Vec<ShaderInputReflection>; DescriptorRangeType::COUNT],
}

impl ShaderReflectionData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the resources of one stage blob.
    pub fn add_stage_inputs(&mut self, inputs: &[ReflectedShaderInput], visibility: ShaderVisibility) {
        for input in inputs {
            let bucket = &mut self.inputs[DescriptorRangeType::for_input_kind(input.kind).index()];

            if let Some(existing) = bucket.iter_mut().find(|e| e.name == input.name) {
                if existing.bind_point != input.bind_point {
                    log::warn!(
                        "Shader input '{}' is bound at {} and {} in different stages",
                        input.name,
                        existing.bind_point,
                        input.bind_point
                    );
                }
                existing.visibility |= visibility;
                continue;
            }

            bucket.push(ShaderInputReflection {
                name: input.name.clone(),
                bind_point: input.bind_point,
                visibility,
            });
        }
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self, range_type: DescriptorRangeType) -> &[ShaderInputReflection] {
        &self.inputs[range_type.index()]
    }

    /// Combined visibility of every resource of `range_type`.
    #[must_use]
    pub fn visibility(&self, range_type: DescriptorRangeType) -> ShaderVisibility {
        self.inputs(range_type)
            .iter()
            .fold(ShaderVisibility::empty(), |acc, input| acc | input.visibility)
    }
}

// ─── Root Signature ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub base_shader_register: u32,
    pub num_descriptors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootSignatureParameterType {
    DescriptorTable,
    ConstantBufferView,
    ShaderResourceView,
    UnorderedAccessView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSignatureParameterEntry {
    pub parameter_type: RootSignatureParameterType,
    pub visibility: ShaderVisibility,
    /// Ranges of a descriptor table; empty for root descriptors.
    pub descriptor_ranges: SmallVec<[DescriptorRange; 1]>,
    /// Register of a root descriptor.
    pub shader_register: u32,
}

/// One descriptor-set slot to allocate for a root parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSetEntryDeclaration {
    pub root_index: u16,
    pub descriptor_range_index: u16,
    pub num_resources: u16,
}

/// Root parameters plus the parameter index used by each (range type,
/// stage) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSignatureLayout {
    pub parameters: Vec<RootSignatureParameterEntry>,
    pub root_index: [[Option<u16>; ShaderStage::COUNT]; DescriptorRangeType::COUNT],
}

impl RootSignatureLayout {
    /// Root parameter index for `range_type` as seen from `stage`.
    #[inline]
    #[must_use]
    pub fn root_index(&self, range_type: DescriptorRangeType, stage: ShaderStage) -> Option<u16> {
        self.root_index[range_type.index()][stage.index()]
    }

    /// Position of `input` inside the descriptor range bound for `stage`.
    #[must_use]
    pub fn descriptor_range_entry_index(
        &self,
        input: &ShaderInputReflection,
        range_type: DescriptorRangeType,
        stage: ShaderStage,
    ) -> Option<u16> {
        let root_index = self.root_index(range_type, stage)?;
        let parameter = self.parameters.get(root_index as usize)?;
        let range = parameter
            .descriptor_ranges
            .iter()
            .find(|range| range.range_type == range_type)?;

        let bind_point = u32::from(input.bind_point);
        if bind_point < range.base_shader_register
            || bind_point >= range.base_shader_register + range.num_descriptors
        {
            return None;
        }
        Some((bind_point - range.base_shader_register) as u16)
    }

    /// Descriptor-set slots for every non-sampler range, in root order.
    #[must_use]
    pub fn descriptor_set_declarations(&self) -> Vec<DescriptorSetEntryDeclaration> {
        let mut declarations = Vec::new();

        for (root_index, parameter) in self.parameters.iter().enumerate() {
            if parameter.parameter_type != RootSignatureParameterType::DescriptorTable {
                declarations.push(DescriptorSetEntryDeclaration {
                    root_index: root_index as u16,
                    descriptor_range_index: 0,
                    num_resources: 1,
                });
                continue;
            }

            for (range_index, range) in parameter.descriptor_ranges.iter().enumerate() {
                if range.range_type == DescriptorRangeType::Sampler {
                    continue;
                }
                declarations.push(DescriptorSetEntryDeclaration {
                    root_index: root_index as u16,
                    descriptor_range_index: range_index as u16,
                    num_resources: range.num_descriptors as u16,
                });
            }
        }

        declarations
    }
}

/// Derives the root signature of a permutation.
#[must_use]
pub fn build_root_signature(reflection: &ShaderReflectionData) -> RootSignatureLayout {
    let mut layout = RootSignatureLayout {
        parameters: Vec::new(),
        root_index: [[None; ShaderStage::COUNT]; DescriptorRangeType::COUNT],
    };

    for range_type in DescriptorRangeType::ALL {
        let inputs = reflection.inputs(range_type);
        if inputs.is_empty() {
            continue;
        }

        // Sorted (bind point, name) set per stage, for merging identical stages.
        let mut stage_sets: SmallVec<[(Vec<(u16, &str)>, u16); ShaderStage::COUNT]> = SmallVec::new();

        for stage in ShaderStage::ALL {
            let visibility = stage.visibility();
            let mut visible: Vec<(u16, &str)> = inputs
                .iter()
                .filter(|input| input.visibility.intersects(visibility))
                .map(|input| (input.bind_point, input.name.as_str()))
                .collect();
            if visible.is_empty() {
                continue;
            }
            visible.sort_unstable();

            if let Some((_, root_index)) = stage_sets.iter().find(|(set, _)| *set == visible) {
                layout.parameters[*root_index as usize].visibility |= visibility;
                layout.root_index[range_type.index()][stage.index()] = Some(*root_index);
                continue;
            }

            let min = u32::from(visible.iter().map(|(bind, _)| *bind).min().unwrap_or(0));
            let max = u32::from(visible.iter().map(|(bind, _)| *bind).max().unwrap_or(0));

            let root_index = layout.parameters.len() as u16;
            layout.parameters.push(RootSignatureParameterEntry {
                parameter_type: RootSignatureParameterType::DescriptorTable,
                visibility,
                descriptor_ranges: SmallVec::from_buf([DescriptorRange {
                    range_type,
                    base_shader_register: min,
                    num_descriptors: max - min + 1,
                }]),
                shader_register: 0,
            });
            layout.root_index[range_type.index()][stage.index()] = Some(root_index);
            stage_sets.push((visible, root_index));
        }
    }

    layout
}
