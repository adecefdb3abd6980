//! Ready-to-bind shader permutations.

use std::sync::Arc;

use myth_shader_core::ShaderKey;

use crate::backend::{BackendError, PixelShaderHandle, RenderDevice, VertexShaderHandle};
use crate::database::ShaderEntrySet;
use crate::resource_binder::ShaderBindingLayout;
use crate::stage::ShaderStage;
use crate::state_block::render_state::RenderStateBlock;

/// GPU objects plus the cached entry they were created from.
#[derive(Debug)]
pub struct ShaderHandler {
    key: ShaderKey,
    entry: Arc<ShaderEntrySet>,
    vertex_shader: Option<VertexShaderHandle>,
    pixel_shader: Option<PixelShaderHandle>,
    /// Bumped every time the GPU objects are recreated.
    gpu_generation: u32,
}

impl ShaderHandler {
    pub(crate) fn create<D: RenderDevice>(
        device: &D,
        key: ShaderKey,
        entry: Arc<ShaderEntrySet>,
    ) -> Result<Self, BackendError> {
        let (vertex_shader, pixel_shader) = create_gpu_shaders(device, &entry)?;
        Ok(Self {
            key,
            entry,
            vertex_shader,
            pixel_shader,
            gpu_generation: 0,
        })
    }

    /// Points the handler at `entry`. GPU objects are only recreated when the
    /// bytecode hash differs; on failure the handler is left untouched.
    pub(crate) fn refresh<D: RenderDevice>(
        &mut self,
        device: &D,
        entry: Arc<ShaderEntrySet>,
    ) -> Result<(), BackendError> {
        if entry.content_hash() != self.entry.content_hash() {
            let (vertex_shader, pixel_shader) = create_gpu_shaders(device, &entry)?;
            self.destroy(device);
            self.vertex_shader = vertex_shader;
            self.pixel_shader = pixel_shader;
            self.gpu_generation += 1;
            log::debug!("Recreated GPU shaders for {}", self.key);
        }
        self.entry = entry;
        Ok(())
    }

    pub(crate) fn destroy<D: RenderDevice>(&mut self, device: &D) {
        if let Some(handle) = self.vertex_shader.take() {
            device.destroy_vertex_shader(handle);
        }
        if let Some(handle) = self.pixel_shader.take() {
            device.destroy_pixel_shader(handle);
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> ShaderKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn entry(&self) -> &Arc<ShaderEntrySet> {
        &self.entry
    }

    #[inline]
    #[must_use]
    pub fn vertex_shader(&self) -> Option<VertexShaderHandle> {
        self.vertex_shader
    }

    #[inline]
    #[must_use]
    pub fn pixel_shader(&self) -> Option<PixelShaderHandle> {
        self.pixel_shader
    }

    /// Compute bytecode, which is dispatched without a device object.
    #[inline]
    #[must_use]
    pub fn compute_shader(&self) -> Option<&[u8]> {
        self.entry.raw_shader(ShaderStage::Compute)
    }

    #[inline]
    #[must_use]
    pub fn render_state_block(&self) -> &RenderStateBlock {
        self.entry.render_state_block()
    }

    #[inline]
    #[must_use]
    pub fn binding_layout(&self) -> &ShaderBindingLayout {
        self.entry.binding_layout()
    }

    #[inline]
    #[must_use]
    pub fn gpu_generation(&self) -> u32 {
        self.gpu_generation
    }
}

fn create_gpu_shaders<D: RenderDevice>(
    device: &D,
    entry: &ShaderEntrySet,
) -> Result<(Option<VertexShaderHandle>, Option<PixelShaderHandle>), BackendError> {
    let vertex_shader = entry
        .raw_shader(ShaderStage::Vertex)
        .map(|bytecode| device.create_vertex_shader(bytecode))
        .transpose()?;

    let pixel_shader = match entry
        .raw_shader(ShaderStage::Pixel)
        .map(|bytecode| device.create_pixel_shader(bytecode))
        .transpose()
    {
        Ok(handle) => handle,
        Err(err) => {
            if let Some(handle) = vertex_shader {
                device.destroy_vertex_shader(handle);
            }
            return Err(err);
        }
    };

    Ok((vertex_shader, pixel_shader))
}
