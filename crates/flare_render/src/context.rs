//! wgpu device setup
//!
//! The particle device and the renderer share one device and queue, so both
//! are held behind `Arc`.

use crate::backend::{probe_capabilities, DeviceCapabilities};
use crate::error::RenderError;
use std::sync::Arc;

pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub capabilities: DeviceCapabilities,
}

impl GpuContext {
    /// Device with no surface, for offscreen simulation.
    pub async fn headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;
        Self::from_adapter(&adapter).await
    }

    /// Blocking form of [`headless`](Self::headless).
    pub fn headless_blocking() -> Result<Self, RenderError> {
        pollster::block_on(Self::headless())
    }

    /// Check `adapter` and open a device on it.
    pub async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, RenderError> {
        let capabilities = probe_capabilities(adapter);
        capabilities.check()?;
        tracing::info!(
            "using {} ({:?}), max storage buffer {} MiB",
            capabilities.adapter_name,
            capabilities.backend,
            capabilities.max_storage_buffer_binding_size >> 20
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flare Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: capabilities.required_limits(adapter),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            capabilities,
        })
    }
}
