//! Compute pipelines for the four per-frame stages
//!
//! Group 0 is shared by every stage:
//!
//! | binding | resource      | stages using it             |
//! |---------|---------------|-----------------------------|
//! | 0       | particles     | spawn, update               |
//! | 1       | index lists   | update                      |
//! | 2       | kind counters | reset, update, build_args   |
//! | 3       | draw args     | build_args                  |
//! | 4       | detonations   | reset, update               |
//! | 5       | SimParams     | update                      |
//! | 6       | list layout   | update, build_args          |
//!
//! Spawn adds group 1: records, directions and the batch info uniform.

use crate::shaders;

pub struct Kernels {
    pub frame_layout: wgpu::BindGroupLayout,
    pub spawn_layout: wgpu::BindGroupLayout,
    pub spawn: wgpu::ComputePipeline,
    pub reset: wgpu::ComputePipeline,
    pub update: wgpu::ComputePipeline,
    pub build_args: wgpu::ComputePipeline,
}

impl Kernels {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Frame Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
                storage_entry(4, false),
                uniform_entry(5),
                uniform_entry(6),
            ],
        });
        let spawn_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Spawn Layout"),
            entries: &[storage_entry(0, true), storage_entry(1, true), uniform_entry(2)],
        });

        let frame_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Frame Pipeline Layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });
        let spawn_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Spawn Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &spawn_layout],
            push_constant_ranges: &[],
        });

        let spawn_module = module(device, "Particle Spawn Shader", shaders::SPAWN);
        let update_module = module(device, "Particle Update Shader", shaders::UPDATE);
        let frame_module = module(device, "Particle Frame Shader", shaders::FRAME);

        Self {
            spawn: pipeline(device, "Particle Spawn", &spawn_pipeline_layout, &spawn_module, "spawn_main"),
            reset: pipeline(device, "Particle Reset", &frame_pipeline_layout, &frame_module, "reset_main"),
            update: pipeline(device, "Particle Update", &frame_pipeline_layout, &update_module, "update_main"),
            build_args: pipeline(
                device,
                "Particle Draw Args",
                &frame_pipeline_layout,
                &frame_module,
                "build_args_main",
            ),
            frame_layout,
            spawn_layout,
        }
    }
}

fn module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
