use bytemuck::{Pod, Zeroable};

use crate::backend::TargetFormat;
use crate::gpu::GpuContext;
use crate::pipeline::{BufferSet, RenderError, Stage, StageContext, StageDescriptor};

use super::color_input;
use super::fullscreen::{self, FullscreenDesc, FullscreenPass, TextureInput};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct VignetteUniforms {
    darkness: f32,
    offset: f32,
    _pad: [f32; 2],
}

/// Darkens the frame toward its edges.
pub struct VignetteStage {
    pass: FullscreenPass,
}

impl VignetteStage {
    pub const DESCRIPTOR: StageDescriptor = StageDescriptor::effect("vignette", BufferSet::COLOR);

    pub fn new(gpu: &GpuContext) -> Self {
        let module = fullscreen::shader_module(&gpu.device, "vignette", include_str!("../shaders/vignette.wgsl"));
        let pass = FullscreenPass::new(
            &gpu.device,
            &FullscreenDesc {
                label: "vignette",
                module: &module,
                fragment: "fs_vignette",
                inputs: &[TextureInput::Color],
                format: TargetFormat::Color.wgpu_format(),
                blend: None,
                depth: None,
            },
        );
        Self { pass }
    }
}

impl Stage<GpuContext> for VignetteStage {
    fn descriptor(&self) -> StageDescriptor {
        Self::DESCRIPTOR
    }

    fn render(&mut self, ctx: &mut StageContext<'_, GpuContext>) -> Result<(), RenderError> {
        let source = color_input(Self::DESCRIPTOR.label, &ctx.io)?;
        let settings = &ctx.config.vignette;
        self.pass.draw(
            &ctx.backend.device,
            &mut ctx.frame.encoder,
            &ctx.io.color_out.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &VignetteUniforms {
                darkness: settings.darkness,
                offset: settings.offset,
                _pad: [0.0; 2],
            },
            &[&source.view],
            None,
        );
        Ok(())
    }
}
