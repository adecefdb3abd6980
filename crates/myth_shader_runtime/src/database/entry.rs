//! Cached permutation records.

use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::resource_binder::ShaderBindingLayout;
use crate::stage::ShaderStage;
use crate::state_block::render_state::RenderStateBlock;

/// Everything stored for one shader key: stage bytecode, fixed-function
/// state and binding metadata, stamped with the source timestamp it was
/// compiled from.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderEntrySet {
    timestamp: u64,
    raw_shaders: [Vec<u8>; ShaderStage::COUNT],
    render_state_block: RenderStateBlock,
    binding_layout: ShaderBindingLayout,
    content_hash: u64,
}

impl ShaderEntrySet {
    /// `raw_shaders` is indexed by [`ShaderStage`]; an empty blob means the
    /// stage is absent.
    #[must_use]
    pub fn new(
        timestamp: u64,
        raw_shaders: [Vec<u8>; ShaderStage::COUNT],
        render_state_block: RenderStateBlock,
        binding_layout: ShaderBindingLayout,
    ) -> Self {
        let content_hash = hash_raw_shaders(&raw_shaders);
        Self {
            timestamp,
            raw_shaders,
            render_state_block,
            binding_layout,
            content_hash,
        }
    }

    /// Copy stamped with another source timestamp.
    #[must_use]
    pub fn with_timestamp(&self, timestamp: u64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Bytecode of `stage`, `None` when the stage was not compiled.
    #[inline]
    #[must_use]
    pub fn raw_shader(&self, stage: ShaderStage) -> Option<&[u8]> {
        let blob = &self.raw_shaders[stage.index()];
        (!blob.is_empty()).then_some(blob.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn raw_shaders(&self) -> &[Vec<u8>; ShaderStage::COUNT] {
        &self.raw_shaders
    }

    #[inline]
    #[must_use]
    pub fn render_state_block(&self) -> &RenderStateBlock {
        &self.render_state_block
    }

    #[inline]
    #[must_use]
    pub fn binding_layout(&self) -> &ShaderBindingLayout {
        &self.binding_layout
    }

    /// xxh3 over every stage blob; changes exactly when the bytecode does.
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }
}

fn hash_raw_shaders(raw_shaders: &[Vec<u8>; ShaderStage::COUNT]) -> u64 {
    let mut hasher = Xxh3::new();
    for blob in raw_shaders {
        hasher.update(&(blob.len() as u64).to_le_bytes());
        hasher.update(blob);
    }
    hasher.digest()
}

/// Result of [`ShaderDatabase::retrieve`](super::ShaderDatabase::retrieve).
#[derive(Debug, Clone)]
pub enum ShaderLookup {
    Missing,
    /// Compiled from a source at least as new as the queried timestamp.
    Fresh(Arc<ShaderEntrySet>),
    /// Compiled from an older source.
    Stale(Arc<ShaderEntrySet>),
}

impl ShaderLookup {
    #[inline]
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    #[must_use]
    pub fn entry(&self) -> Option<&Arc<ShaderEntrySet>> {
        match self {
            Self::Missing => None,
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(vertex: &[u8], pixel: &[u8]) -> [Vec<u8>; ShaderStage::COUNT] {
        let mut raw: [Vec<u8>; ShaderStage::COUNT] = Default::default();
        raw[ShaderStage::Vertex.index()] = vertex.to_vec();
        raw[ShaderStage::Pixel.index()] = pixel.to_vec();
        raw
    }

    #[test]
    fn test_content_hash_tracks_bytecode_only() {
        let a = ShaderEntrySet::new(1, blobs(b"vs", b"ps"), RenderStateBlock::default(), ShaderBindingLayout::default());
        let b = a.with_timestamp(99);
        let c = ShaderEntrySet::new(1, blobs(b"vs", b"ps2"), RenderStateBlock::default(), ShaderBindingLayout::default());

        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(b.timestamp(), 99);
    }

    #[test]
    fn test_blob_boundaries_affect_hash() {
        let a = ShaderEntrySet::new(0, blobs(b"ab", b"c"), RenderStateBlock::default(), ShaderBindingLayout::default());
        let b = ShaderEntrySet::new(0, blobs(b"a", b"bc"), RenderStateBlock::default(), ShaderBindingLayout::default());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_absent_stage() {
        let entry = ShaderEntrySet::new(0, blobs(b"vs", b""), RenderStateBlock::default(), ShaderBindingLayout::default());
        assert_eq!(entry.raw_shader(ShaderStage::Vertex), Some(&b"vs"[..]));
        assert_eq!(entry.raw_shader(ShaderStage::Pixel), None);
    }
}
