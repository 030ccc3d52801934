//! GPU backend: wgpu compute kernels plus indirect rendering into an
//! offscreen target every frame.

use crate::{run_show, Cli};
use anyhow::Result;
use flare_core::glam::{Mat4, Vec3};
use flare_core::{EngineConfig, ParticleEngine};
use flare_render::target::{COLOR_FORMAT, DEPTH_FORMAT};
use flare_render::{wgpu, FrameConstants, GpuContext, GpuDevice, OffscreenTarget, ParticleRenderer};
use tracing::info;

const SKY: wgpu::Color = wgpu::Color {
    r: 0.005,
    g: 0.005,
    b: 0.02,
    a: 1.0,
};

pub fn run(config: EngineConfig, cli: &Cli) -> Result<()> {
    let context = GpuContext::headless_blocking()?;
    let device = GpuDevice::new(&context);
    info!("arena limit on this adapter: {} particles", device.max_particles());

    let mut engine = ParticleEngine::with_arena(config, device)?;
    let mut renderer = ParticleRenderer::new(&context.device, COLOR_FORMAT, Some(DEPTH_FORMAT));
    let target = OffscreenTarget::new(&context.device, cli.width, cli.height);

    let view = Mat4::look_at_rh(Vec3::new(0.0, 22.0, 75.0), Vec3::new(0.0, 25.0, 0.0), Vec3::Y);
    let proj = Mat4::perspective_rh(50f32.to_radians(), target.aspect(), 0.1, 500.0);

    run_show(&mut engine, cli, |engine, time| {
        let constants = FrameConstants::new(view, proj, time);
        renderer.prepare(&context.device, &context.queue, engine.device(), &constants);

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flare Render Encoder"),
            });
        {
            let mut pass = target.begin_pass(&mut encoder, SKY);
            renderer.draw(&mut pass, engine.device());
        }
        context.queue.submit(Some(encoder.finish()));
        Ok(())
    })
}
