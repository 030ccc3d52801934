//! Flare Render
//!
//! wgpu backend for the particle engine: the compute kernels behind
//! [`GpuDevice`], the indirect billboard renderer and an offscreen render target.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod device;
pub mod error;
pub mod gpu_types;
pub mod kernels;
pub mod readback;
pub mod renderer;
pub mod shaders;
pub mod target;

pub use wgpu;

pub use backend::{probe_capabilities, BackendType, DeviceCapabilities};
pub use context::GpuContext;
pub use device::{ArenaResources, GpuDevice};
pub use error::RenderError;
pub use renderer::{FrameConstants, ParticleRenderer};
pub use target::OffscreenTarget;
