//! Adapter capability probe
//!
//! The kernels need compute shaders, indirect draws, storage buffers in the
//! vertex stage and seven storage bindings in the spawn pass. Anything less
//! is refused up front rather than failing at pipeline creation.

use crate::error::RenderError;

/// Storage buffers bound by the spawn pass (five frame bindings plus two).
pub const REQUIRED_STORAGE_BUFFERS: u32 = 7;

/// Rendering backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Metal,
    DirectX12,
    Vulkan,
    OpenGL,
    WebGpu,
    Other,
}

impl From<wgpu::Backend> for BackendType {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Metal => Self::Metal,
            wgpu::Backend::Dx12 => Self::DirectX12,
            wgpu::Backend::Vulkan => Self::Vulkan,
            wgpu::Backend::Gl => Self::OpenGL,
            wgpu::Backend::BrowserWebGpu => Self::WebGpu,
            _ => Self::Other,
        }
    }
}

/// Capability probe result
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub adapter_name: String,
    pub backend: BackendType,
    pub supports_compute: bool,
    pub supports_indirect: bool,
    pub vertex_storage: bool,
    pub max_storage_buffers_per_stage: u32,
    pub max_storage_buffer_binding_size: u32,
    pub max_buffer_size: u64,
}

impl DeviceCapabilities {
    pub fn check(&self) -> Result<(), RenderError> {
        if !self.supports_compute {
            return Err(RenderError::Unsupported("no compute shaders".into()));
        }
        if !self.supports_indirect {
            return Err(RenderError::Unsupported("no indirect draws".into()));
        }
        if !self.vertex_storage {
            return Err(RenderError::Unsupported("no storage buffers in vertex shaders".into()));
        }
        if self.max_storage_buffers_per_stage < REQUIRED_STORAGE_BUFFERS {
            return Err(RenderError::Unsupported(format!(
                "{} storage buffers per stage, need {}",
                self.max_storage_buffers_per_stage, REQUIRED_STORAGE_BUFFERS
            )));
        }
        Ok(())
    }

    /// Default limits, raised to what the adapter offers for the arena buffer.
    pub fn required_limits(&self, adapter: &wgpu::Adapter) -> wgpu::Limits {
        let supported = adapter.limits();
        wgpu::Limits {
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            ..wgpu::Limits::default().using_resolution(supported)
        }
    }

    /// Largest arena a single storage binding can hold.
    pub fn max_particles(&self) -> u32 {
        let bytes = u64::from(self.max_storage_buffer_binding_size).min(self.max_buffer_size);
        (bytes / std::mem::size_of::<flare_core::Particle>() as u64).min(u64::from(u32::MAX)) as u32
    }
}

/// Probe available rendering capabilities
pub fn probe_capabilities(adapter: &wgpu::Adapter) -> DeviceCapabilities {
    let info = adapter.get_info();
    let limits = adapter.limits();
    let downlevel = adapter.get_downlevel_capabilities();

    DeviceCapabilities {
        adapter_name: info.name,
        backend: info.backend.into(),
        supports_compute: downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        supports_indirect: downlevel.flags.contains(wgpu::DownlevelFlags::INDIRECT_EXECUTION),
        vertex_storage: downlevel
            .flags
            .contains(wgpu::DownlevelFlags::VERTEX_STORAGE),
        max_storage_buffers_per_stage: limits.max_storage_buffers_per_shader_stage,
        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
        max_buffer_size: limits.max_buffer_size,
    }
}
