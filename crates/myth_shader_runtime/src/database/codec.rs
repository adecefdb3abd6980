//! Byte-level encoding of database records.
//!
//! Headers are `Pod` structs copied verbatim, followed by the raw stage
//! blobs. The per-entry metadata (render state, root signature, resource
//! binder, descriptor-set declarations, sampler states) is a bincode record
//! behind a `u32` length prefix, so a reader can always skip to the next
//! entry.

use bytemuck::Pod;
use myth_shader_core::ShaderKey;

use super::entry::ShaderEntrySet;
use super::format::ShaderEntryHeader;
use crate::errors::{Result, ShaderRuntimeError};
use crate::resource_binder::ShaderBindingLayout;
use crate::stage::ShaderStage;
use crate::state_block::render_state::RenderStateBlock;

/// Cursor over a byte slice; every read fails with
/// [`ShaderRuntimeError::Truncated`] instead of reading past the end.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ShaderRuntimeError::Truncated {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn pod<T: Pod>(&mut self) -> Result<T> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<T>())?))
    }
}

// ─── Entries ───────────────────────────────────────────────────────────────

/// Appends one entry to `out`: header, stage blobs, metadata record.
pub fn encode_entry(out: &mut Vec<u8>, key: ShaderKey, entry: &ShaderEntrySet) -> Result<()> {
    let metadata = bincode::serialize(&(entry.render_state_block(), entry.binding_layout()))?;
    let metadata_len = u32::try_from(metadata.len())
        .map_err(|_| ShaderRuntimeError::Corrupted("metadata record exceeds 4 GiB".to_owned()))?;

    let mut raw_sizes = [0u64; ShaderStage::COUNT];
    for (size, blob) in raw_sizes.iter_mut().zip(entry.raw_shaders()) {
        *size = blob.len() as u64;
    }

    out.extend_from_slice(bytemuck::bytes_of(&ShaderEntryHeader {
        raw_shader_key: key.raw(),
        _padding: 0,
        last_modified_timestamp: entry.timestamp(),
        raw_sizes,
    }));
    for blob in entry.raw_shaders() {
        out.extend_from_slice(blob);
    }
    out.extend_from_slice(&metadata_len.to_le_bytes());
    out.extend_from_slice(&metadata);
    Ok(())
}

pub fn decode_entry(r: &mut ByteReader<'_>) -> Result<(ShaderKey, ShaderEntrySet)> {
    let header: ShaderEntryHeader = r.pod()?;

    let mut raw_shaders: [Vec<u8>; ShaderStage::COUNT] = Default::default();
    for (blob, &size) in raw_shaders.iter_mut().zip(&header.raw_sizes) {
        let size = usize::try_from(size)
            .map_err(|_| ShaderRuntimeError::Corrupted(format!("stage size {size} overflows")))?;
        *blob = r.take(size)?.to_vec();
    }

    let metadata_len = u32::from_le_bytes(r.pod::<[u8; 4]>()?) as usize;
    let (render_state_block, binding_layout): (RenderStateBlock, ShaderBindingLayout) =
        bincode::deserialize(r.take(metadata_len)?)?;

    let entry = ShaderEntrySet::new(
        header.last_modified_timestamp,
        raw_shaders,
        render_state_block,
        binding_layout,
    );
    Ok((ShaderKey::from_raw(header.raw_shader_key), entry))
}

#[cfg(test)]
mod tests {
    use smallvec::SmallVec;

    use super::*;
    use crate::input_provider::ShaderInputType;
    use crate::reflection::{
        DescriptorRange, DescriptorRangeType, DescriptorSetEntryDeclaration,
        RootSignatureParameterEntry, RootSignatureParameterType,
    };
    use crate::resource_binder::{
        NamedSamplerState, ShaderResourceBinder, ShaderResourceBinderEntry, ShaderResourceBinding,
    };
    use crate::stage::ShaderVisibility;
    use crate::state_block::render_state::{RenderTargetWriteMask, compile_render_state_block};
    use crate::state_block::sampler_state::{SamplerState, TextureAddressMode};

    fn sample_entry() -> ShaderEntrySet {
        let mut raw: [Vec<u8>; ShaderStage::COUNT] = Default::default();
        raw[ShaderStage::Vertex.index()] = vec![1, 2, 3];
        raw[ShaderStage::Compute.index()] = vec![9; 17];

        let render_state = compile_render_state_block(
            "CullMode = CullNone; BlendEnable[2] = true; RenderTargetWriteMask[1] = RG; RedBlendUserFactor = 0.25;",
        )
        .unwrap();

        let sampler = SamplerState {
            address_mode_u: TextureAddressMode::Wrap,
            border_rgba: [1.0, 0.5, 0.0, 1.0],
            ..SamplerState::default()
        };

        let layout = ShaderBindingLayout {
            root_signature_parameters: vec![RootSignatureParameterEntry {
                parameter_type: RootSignatureParameterType::DescriptorTable,
                visibility: ShaderVisibility::VERTEX | ShaderVisibility::PIXEL,
                descriptor_ranges: SmallVec::from_buf([DescriptorRange {
                    range_type: DescriptorRangeType::ShaderResourceView,
                    base_shader_register: 2,
                    num_descriptors: 3,
                }]),
                shader_register: 0,
            }],
            resource_binder: ShaderResourceBinder::from_entries(vec![
                ShaderResourceBinderEntry {
                    binding: ShaderResourceBinding::ProviderInput {
                        provider: "Material".to_owned(),
                        data_offset_in_provider: 16,
                        input_type: ShaderInputType::Texture2D,
                    },
                    root_index: 0,
                    descriptor_range_index: 0,
                    descriptor_range_entry_index: 1,
                    visibility: ShaderVisibility::PIXEL,
                },
                ShaderResourceBinderEntry {
                    binding: ShaderResourceBinding::Sampler {
                        name: "Linear".to_owned(),
                        state: sampler,
                    },
                    root_index: 1,
                    descriptor_range_index: 0,
                    descriptor_range_entry_index: 0,
                    visibility: ShaderVisibility::PIXEL,
                },
            ]),
            descriptor_set_entries: vec![DescriptorSetEntryDeclaration {
                root_index: 0,
                descriptor_range_index: 0,
                num_resources: 3,
            }],
            sampler_states: vec![NamedSamplerState {
                name: "Linear".to_owned(),
                state: sampler,
            }],
        };

        ShaderEntrySet::new(42, raw, render_state, layout)
    }

    #[test]
    fn test_entry_survives_encoding() {
        let entry = sample_entry();
        let key = ShaderKey::from_raw(0x0000_0301);

        let mut bytes = Vec::new();
        encode_entry(&mut bytes, key, &entry).unwrap();

        let mut reader = ByteReader::new(&bytes);
        let (decoded_key, decoded) = decode_entry(&mut reader).unwrap();
        assert_eq!(decoded_key, key);
        assert_eq!(decoded, entry);
        assert_eq!(
            decoded.render_state_block().blend_state.render_targets[1].render_target_write_mask,
            RenderTargetWriteMask::R | RenderTargetWriteMask::G
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_entry_is_reported() {
        let mut bytes = Vec::new();
        encode_entry(&mut bytes, ShaderKey::from_raw(1), &sample_entry()).unwrap();

        let mut reader = ByteReader::new(&bytes[..bytes.len() - 5]);
        assert!(matches!(
            decode_entry(&mut reader),
            Err(ShaderRuntimeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_garbled_metadata_is_rejected() {
        let mut bytes = Vec::new();
        encode_entry(&mut bytes, ShaderKey::from_raw(1), &sample_entry()).unwrap();

        // First byte of the metadata record is the fill mode discriminant.
        let metadata_start = ShaderEntryHeader::SIZE + 3 + 17 + 4;
        bytes[metadata_start..metadata_start + 4].copy_from_slice(&200u32.to_le_bytes());

        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            decode_entry(&mut reader),
            Err(ShaderRuntimeError::Metadata(_))
        ));
    }
}
