use bytemuck::{Pod, Zeroable};

use crate::backend::TargetFormat;
use crate::gpu::GpuContext;
use crate::pipeline::{BufferSet, RenderError, Stage, StageContext, StageDescriptor};

use super::color_input;
use super::fullscreen::{self, FullscreenDesc, FullscreenPass, TextureInput};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FxaaUniforms {
    texel: [f32; 2],
    edge_threshold: f32,
    edge_threshold_min: f32,
    subpixel: f32,
    _pad: [f32; 3],
}

/// Luma-based anti-aliasing, last in the chain.
pub struct FxaaStage {
    pass: FullscreenPass,
}

impl FxaaStage {
    pub const DESCRIPTOR: StageDescriptor = StageDescriptor::effect("fxaa", BufferSet::COLOR);

    pub fn new(gpu: &GpuContext) -> Self {
        let module = fullscreen::shader_module(&gpu.device, "fxaa", include_str!("../shaders/fxaa.wgsl"));
        let pass = FullscreenPass::new(
            &gpu.device,
            &FullscreenDesc {
                label: "fxaa",
                module: &module,
                fragment: "fs_fxaa",
                inputs: &[TextureInput::Color],
                format: TargetFormat::Color.wgpu_format(),
                blend: None,
                depth: None,
            },
        );
        Self { pass }
    }
}

impl Stage<GpuContext> for FxaaStage {
    fn descriptor(&self) -> StageDescriptor {
        Self::DESCRIPTOR
    }

    fn render(&mut self, ctx: &mut StageContext<'_, GpuContext>) -> Result<(), RenderError> {
        let source = color_input(Self::DESCRIPTOR.label, &ctx.io)?;
        let settings = &ctx.config.fxaa;
        let size = ctx.view.size.at_least_one();
        self.pass.draw(
            &ctx.backend.device,
            &mut ctx.frame.encoder,
            &ctx.io.color_out.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &FxaaUniforms {
                texel: [1.0 / size.width as f32, 1.0 / size.height as f32],
                edge_threshold: settings.edge_threshold,
                edge_threshold_min: settings.edge_threshold_min,
                subpixel: settings.subpixel,
                _pad: [0.0; 3],
            },
            &[&source.view],
            None,
        );
        Ok(())
    }
}
