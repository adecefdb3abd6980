//! Shader Input Providers
//!
//! A provider is a named group of shader inputs supplied by render code
//! (camera data, material parameters, ...). Families pull a provider in with
//! `#include "shaderinputproviders/<Name>.hlsl"`; the compiler then binds the
//! reflected resources of that permutation to the provider's inputs.
//!
//! Providers with [`ShaderInputProviderUsage::Default`] own a constant buffer
//! named `<Name>Data`. [`ShaderInputProviderUsage::PerInstance`] providers
//! are packed into the global buffer `g_UnifiedConstantBuffer` instead.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Name of the structured buffer holding every per-instance provider.
pub const GLOBAL_BUFFER_NAME: &str = "g_UnifiedConstantBuffer";

/// Suffix of a provider's constant buffer name.
pub const CONSTANT_BUFFER_SUFFIX: &str = "Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderInputProviderUsage {
    #[default]
    Default,
    PerInstance,
}

impl ShaderInputProviderUsage {
    #[inline]
    #[must_use]
    pub fn uses_constant_buffer(self) -> bool {
        self == Self::Default
    }
}

/// Type of a single provider input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderInputType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int2,
    Int3,
    Int4,
    Uint,
    Uint2,
    Uint3,
    Uint4,
    Bool,
    Float3x3,
    Float4x4,
    Texture2D,
    StructuredBuffer,
    #[default]
    Unknown,
}

impl ShaderInputType {
    /// Size in bytes of the value inside the provider, 0 for descriptors.
    #[must_use]
    pub fn data_size(self) -> u32 {
        use ShaderInputType::*;
        match self {
            Float | Int | Uint | Bool => 4,
            Float2 | Int2 | Uint2 => 8,
            Float3 | Int3 | Uint3 => 12,
            Float4 | Int4 | Uint4 => 16,
            Float3x3 => 36,
            Float4x4 => 64,
            Texture2D | StructuredBuffer | Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInputDeclaration {
    pub name: String,
    pub input_type: ShaderInputType,
    /// Byte offset of the value in the provider's CPU-side data.
    pub data_offset_in_provider: i32,
}

/// Declaration of one provider and its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInputProviderDeclaration {
    name: String,
    usage: ShaderInputProviderUsage,
    inputs: Vec<ShaderInputDeclaration>,
    constant_buffer_name: String,
}

impl ShaderInputProviderDeclaration {
    #[must_use]
    pub fn new(name: &str, usage: ShaderInputProviderUsage) -> Self {
        Self {
            name: name.to_owned(),
            usage,
            inputs: Vec::new(),
            constant_buffer_name: format!("{name}{CONSTANT_BUFFER_SUFFIX}"),
        }
    }

    /// Appends an input laid out after the previous one.
    #[must_use]
    pub fn with_input(mut self, name: &str, input_type: ShaderInputType) -> Self {
        let offset = self.required_size();
        self.inputs.push(ShaderInputDeclaration {
            name: name.to_owned(),
            input_type,
            data_offset_in_provider: offset as i32,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> ShaderInputProviderUsage {
        self.usage
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[ShaderInputDeclaration] {
        &self.inputs
    }

    /// `<Name>Data`.
    #[inline]
    #[must_use]
    pub fn constant_buffer_name(&self) -> &str {
        &self.constant_buffer_name
    }

    #[must_use]
    pub fn find_input(&self, name: &str) -> Option<&ShaderInputDeclaration> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Bytes needed to hold every input.
    #[must_use]
    pub fn required_size(&self) -> u32 {
        self.inputs
            .last()
            .map_or(0, |last| last.data_offset_in_provider as u32 + last.input_type.data_size())
    }
}

/// Provider declarations known to the compiler, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ShaderInputProviderRegistry {
    declarations: Vec<Arc<ShaderInputProviderDeclaration>>,
    by_name: FxHashMap<String, usize>,
}

impl ShaderInputProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a declaration; a later declaration with the same name
    /// replaces the earlier one.
    pub fn register(&mut self, declaration: ShaderInputProviderDeclaration) {
        let declaration = Arc::new(declaration);
        if let Some(&index) = self.by_name.get(declaration.name()) {
            log::warn!("Shader input provider '{}' registered twice", declaration.name());
            self.declarations[index] = declaration;
            return;
        }
        self.by_name
            .insert(declaration.name().to_owned(), self.declarations.len());
        self.declarations.push(declaration);
    }

    #[must_use]
    pub fn with(mut self, declaration: ShaderInputProviderDeclaration) -> Self {
        self.register(declaration);
        self
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<ShaderInputProviderDeclaration>> {
        self.by_name.get(name).map(|&index| &self.declarations[index])
    }

    /// Declarations for `names`, skipping unknown names.
    #[must_use]
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<ShaderInputProviderDeclaration>> {
        names
            .iter()
            .filter_map(|name| {
                let found = self.find(name).cloned();
                if found.is_none() {
                    log::debug!("Included shader input provider '{name}' is not registered");
                }
                found
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_are_laid_out_sequentially() {
        let camera = ShaderInputProviderDeclaration::new("Camera", ShaderInputProviderUsage::Default)
            .with_input("ViewProjection", ShaderInputType::Float4x4)
            .with_input("CameraPosition", ShaderInputType::Float3)
            .with_input("ShadowMap", ShaderInputType::Texture2D);

        assert_eq!(camera.constant_buffer_name(), "CameraData");
        assert_eq!(camera.find_input("CameraPosition").unwrap().data_offset_in_provider, 64);
        assert_eq!(camera.find_input("ShadowMap").unwrap().data_offset_in_provider, 76);
        assert_eq!(camera.required_size(), 76);
    }

    #[test]
    fn test_registry_resolves_known_names() {
        let registry = ShaderInputProviderRegistry::new()
            .with(ShaderInputProviderDeclaration::new("Camera", ShaderInputProviderUsage::Default))
            .with(ShaderInputProviderDeclaration::new(
                "Instance",
                ShaderInputProviderUsage::PerInstance,
            ));

        let resolved = registry.resolve(&["Instance".to_owned(), "Unknown".to_owned()]);
        assert_eq!(resolved.len(), 1);
        assert!(!resolved[0].usage().uses_constant_buffer());
    }
}
