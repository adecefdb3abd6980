//! A [`RenderDevice`] that only counts.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use myth_shader_runtime::backend::{
    BackendError, PixelShaderHandle, RenderDevice, VertexShaderHandle,
};

#[derive(Debug, Default)]
struct DeviceLog {
    next_handle: u64,
    live: FxHashSet<u64>,
    vertex_created: usize,
    pixel_created: usize,
    destroyed: usize,
    reject_marker: Option<Vec<u8>>,
}

/// Records shader object creation and destruction. Clones share the same
/// log, so a test can keep one while the handler manager owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderDevice {
    log: Arc<Mutex<DeviceLog>>,
}

impl RecordingRenderDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes creation fail for bytecode containing `marker`.
    pub fn reject_bytecode_containing(&self, marker: &str) {
        self.log.lock().reject_marker = Some(marker.as_bytes().to_vec());
    }

    #[must_use]
    pub fn vertex_shaders_created(&self) -> usize {
        self.log.lock().vertex_created
    }

    #[must_use]
    pub fn pixel_shaders_created(&self) -> usize {
        self.log.lock().pixel_created
    }

    #[must_use]
    pub fn shaders_destroyed(&self) -> usize {
        self.log.lock().destroyed
    }

    /// Objects created and not yet destroyed.
    #[must_use]
    pub fn live_shaders(&self) -> usize {
        self.log.lock().live.len()
    }

    fn create(&self, bytecode: &[u8]) -> Result<u64, BackendError> {
        let mut log = self.log.lock();
        if let Some(marker) = &log.reject_marker
            && !marker.is_empty()
            && bytecode.windows(marker.len()).any(|window| window == marker.as_slice())
        {
            return Err(BackendError::new("device rejected bytecode"));
        }

        log.next_handle += 1;
        let handle = log.next_handle;
        log.live.insert(handle);
        Ok(handle)
    }

    fn destroy(&self, handle: u64) {
        let mut log = self.log.lock();
        if log.live.remove(&handle) {
            log.destroyed += 1;
        }
    }
}

impl RenderDevice for RecordingRenderDevice {
    fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<VertexShaderHandle, BackendError> {
        let handle = self.create(bytecode)?;
        self.log.lock().vertex_created += 1;
        Ok(VertexShaderHandle(handle))
    }

    fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<PixelShaderHandle, BackendError> {
        let handle = self.create(bytecode)?;
        self.log.lock().pixel_created += 1;
        Ok(PixelShaderHandle(handle))
    }

    fn destroy_vertex_shader(&self, handle: VertexShaderHandle) {
        self.destroy(handle.0);
    }

    fn destroy_pixel_shader(&self, handle: PixelShaderHandle) {
        self.destroy(handle.0);
    }
}
