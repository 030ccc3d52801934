//! Indirect billboard renderer
//!
//! One draw per live kind, fed by the index list and draw arguments the
//! update pass produced. Alpha-blended kinds are drawn first, then the
//! additive ones on top. Depth is tested but never written.

use crate::device::{ArenaResources, GpuDevice};
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use flare_core::{ArenaLayout, BlendPass, ParticleKind, PerKind};
use glam::{Mat4, Vec3};
use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

/// Camera and tint constants for one rendered frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub view_proj: [[f32; 4]; 4],
    pub camera_right: [f32; 3],
    pub time: f32,
    pub camera_up: [f32; 3],
    pub _pad: f32,
    /// Multiplies every particle colour.
    pub tint: [f32; 4],
}

impl FrameConstants {
    /// Billboard axes are the view matrix's first two rows.
    pub fn new(view: Mat4, proj: Mat4, time: f32) -> Self {
        let right = view.row(0).truncate().try_normalize().unwrap_or(Vec3::X);
        let up = view.row(1).truncate().try_normalize().unwrap_or(Vec3::Y);
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            camera_right: right.to_array(),
            time,
            camera_up: up.to_array(),
            _pad: 0.0,
            tint: [1.0; 4],
        }
    }
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, 0.0)
    }
}

/// Kinds in draw order.
pub fn draw_order() -> impl Iterator<Item = ParticleKind> {
    let alpha = ParticleKind::LIVE
        .into_iter()
        .filter(|k| k.blend_pass() == BlendPass::Alpha);
    let additive = ParticleKind::LIVE
        .into_iter()
        .filter(|k| k.blend_pass() == BlendPass::Additive);
    alpha.chain(additive)
}

pub struct ParticleRenderer {
    alpha_pipeline: wgpu::RenderPipeline,
    additive_pipeline: wgpu::RenderPipeline,
    constants_buffer: wgpu::Buffer,
    constants_group: wgpu::BindGroup,
    instance_layout: wgpu::BindGroupLayout,
    /// Per-kind instance bind groups and the arena generation they were built for.
    kind_groups: Option<(u64, PerKind<wgpu::BindGroup>)>,
}

impl ParticleRenderer {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::PARTICLES.into()),
        });

        let constants_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Constants Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let read_only = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let instance_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Instance Layout"),
            entries: &[read_only(0), read_only(1)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Render Pipeline Layout"),
            bind_group_layouts: &[&constants_layout, &instance_layout],
            push_constant_ranges: &[],
        });

        let depth_stencil = depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let additive_blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let make = |label: &str, blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: depth_stencil.clone(),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let alpha_pipeline = make("Particle Alpha Pipeline", wgpu::BlendState::ALPHA_BLENDING);
        let additive_pipeline = make("Particle Additive Pipeline", additive_blend);

        let constants_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Constants"),
            contents: bytemuck::bytes_of(&FrameConstants::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let constants_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Constants Bind Group"),
            layout: &constants_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: constants_buffer.as_entire_binding(),
            }],
        });

        Self {
            alpha_pipeline,
            additive_pipeline,
            constants_buffer,
            constants_group,
            instance_layout,
            kind_groups: None,
        }
    }

    /// Upload camera constants and rebuild bind groups if the arena changed.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        particles: &GpuDevice,
        constants: &FrameConstants,
    ) {
        queue.write_buffer(&self.constants_buffer, 0, bytemuck::bytes_of(constants));

        let Some(resources) = particles.resources() else {
            self.kind_groups = None;
            return;
        };
        let stale = self
            .kind_groups
            .as_ref()
            .map_or(true, |(generation, _)| *generation != resources.generation);
        if stale {
            let groups = PerKind::from_fn(|kind| self.kind_group(device, &resources, kind));
            self.kind_groups = Some((resources.generation, groups));
        }
    }

    fn kind_group(
        &self,
        device: &wgpu::Device,
        resources: &ArenaResources<'_>,
        kind: ParticleKind,
    ) -> wgpu::BindGroup {
        let (offset, size) = list_binding(resources.layout, kind);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Particle Instances {kind}")),
            layout: &self.instance_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: resources.particles.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: resources.indices,
                        offset,
                        size: Some(size),
                    }),
                },
            ],
        })
    }

    /// Record every kind's indirect draw into `pass`. Call after `prepare`
    /// and after the frame's compute work was submitted.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, particles: &GpuDevice) {
        let (Some(resources), Some((generation, groups))) =
            (particles.resources(), self.kind_groups.as_ref())
        else {
            return;
        };
        if *generation != resources.generation {
            return;
        }

        pass.set_bind_group(0, &self.constants_group, &[]);
        let mut current = None;
        for kind in draw_order() {
            if resources.layout.budget(kind) == 0 {
                continue;
            }
            let blend = kind.blend_pass();
            if current != Some(blend) {
                pass.set_pipeline(match blend {
                    BlendPass::Alpha => &self.alpha_pipeline,
                    BlendPass::Additive => &self.additive_pipeline,
                });
                current = Some(blend);
            }
            pass.set_bind_group(1, &groups[kind], &[]);
            pass.draw_indirect(resources.args, ArenaLayout::args_offset(kind));
        }
    }
}

/// Byte offset and size of a kind's index-list region.
pub fn list_binding(layout: &ArenaLayout, kind: ParticleKind) -> (u64, NonZeroU64) {
    let offset = u64::from(layout.list_offsets[kind]) * 4;
    let entries = u64::from(layout.budget(kind).max(1));
    (offset, NonZeroU64::new(entries * 4).unwrap_or(NonZeroU64::MIN))
}
