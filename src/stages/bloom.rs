//! Threshold bloom over a chain of progressively halved targets.

use bytemuck::{Pod, Zeroable};

use crate::backend::{Backend, TargetDesc, TargetFormat};
use crate::gpu::{GpuContext, RenderTarget};
use crate::pipeline::{BufferSet, KernelSize, RenderError, Stage, StageContext, StageDescriptor};
use crate::surface::PhysicalSize;

use super::color_input;
use super::fullscreen::{self, FullscreenDesc, FullscreenPass, TextureInput};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BloomUniforms {
    texel: [f32; 2],
    threshold: f32,
    smoothing: f32,
    intensity: f32,
    _pad: [f32; 3],
}

/// Size of each level of the blur chain for a frame of `size`.
fn level_sizes(size: PhysicalSize, kernel: KernelSize) -> Vec<PhysicalSize> {
    (1..=kernel.levels())
        .map(|level| {
            PhysicalSize::new(size.width >> level, size.height >> level).at_least_one()
        })
        .collect()
}

fn texel(size: PhysicalSize) -> [f32; 2] {
    [1.0 / size.width as f32, 1.0 / size.height as f32]
}

pub struct BloomStage {
    kernel: KernelSize,
    prefilter: FullscreenPass,
    downsample: FullscreenPass,
    upsample: FullscreenPass,
    composite: FullscreenPass,
    levels: Vec<RenderTarget>,
}

impl BloomStage {
    pub const DESCRIPTOR: StageDescriptor = StageDescriptor::effect("bloom", BufferSet::COLOR);

    pub fn new(gpu: &GpuContext, kernel: KernelSize) -> Self {
        let device = &gpu.device;
        let module = fullscreen::shader_module(device, "bloom", include_str!("../shaders/bloom.wgsl"));
        let format = TargetFormat::Color.wgpu_format();

        let pass = |label, fragment, blend, inputs: &[TextureInput]| {
            FullscreenPass::new(
                device,
                &FullscreenDesc {
                    label,
                    module: &module,
                    fragment,
                    inputs,
                    format,
                    blend,
                    depth: None,
                },
            )
        };
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::REPLACE,
        };

        Self {
            kernel,
            prefilter: pass("bloom prefilter", "fs_prefilter", None, &[TextureInput::Color]),
            downsample: pass("bloom downsample", "fs_downsample", None, &[TextureInput::Color]),
            upsample: pass("bloom upsample", "fs_upsample", Some(additive), &[TextureInput::Color]),
            composite: pass(
                "bloom composite",
                "fs_composite",
                None,
                &[TextureInput::Color, TextureInput::Color],
            ),
            levels: Vec::new(),
        }
    }
}

impl Stage<GpuContext> for BloomStage {
    fn descriptor(&self) -> StageDescriptor {
        Self::DESCRIPTOR
    }

    fn resize(&mut self, backend: &GpuContext, size: PhysicalSize) {
        self.levels = level_sizes(size, self.kernel)
            .into_iter()
            .map(|level| backend.create_target(&TargetDesc::new("bloom level", TargetFormat::Color, level)))
            .collect();
        log::debug!("bloom: {} levels for {}x{}", self.levels.len(), size.width, size.height);
    }

    fn render(&mut self, ctx: &mut StageContext<'_, GpuContext>) -> Result<(), RenderError> {
        let source = color_input(Self::DESCRIPTOR.label, &ctx.io)?;
        let Some(first) = self.levels.first() else {
            return Err(RenderError::Stage {
                stage: Self::DESCRIPTOR.label,
                reason: "render before resize".into(),
            });
        };

        let settings = &ctx.config.bloom;
        let device = &ctx.backend.device;
        let encoder = &mut ctx.frame.encoder;
        let uniforms = |from: PhysicalSize| BloomUniforms {
            texel: texel(from),
            threshold: settings.luminance_threshold,
            smoothing: settings.luminance_smoothing,
            intensity: settings.intensity,
            _pad: [0.0; 3],
        };
        let clear = wgpu::LoadOp::Clear(wgpu::Color::BLACK);

        self.prefilter.draw(
            device,
            encoder,
            &first.view,
            clear,
            &uniforms(ctx.view.size),
            &[&source.view],
            None,
        );

        for pair in self.levels.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            self.downsample.draw(
                device,
                encoder,
                &to.view,
                clear,
                &uniforms(from.desc.size),
                &[&from.view],
                None,
            );
        }

        for pair in self.levels.windows(2).rev() {
            let (to, from) = (&pair[0], &pair[1]);
            self.upsample.draw(
                device,
                encoder,
                &to.view,
                wgpu::LoadOp::Load,
                &uniforms(from.desc.size),
                &[&from.view],
                None,
            );
        }

        self.composite.draw(
            device,
            encoder,
            &ctx.io.color_out.view,
            clear,
            &uniforms(ctx.view.size),
            &[&source.view, &first.view],
            None,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_kernel_halves_six_times() {
        let sizes = level_sizes(PhysicalSize::new(1280, 720), KernelSize::Huge);
        assert_eq!(sizes.len(), 6);
        assert_eq!(sizes[0], PhysicalSize::new(640, 360));
        assert_eq!(sizes[5], PhysicalSize::new(20, 11));
    }

    #[test]
    fn tiny_frames_keep_one_pixel_levels() {
        let sizes = level_sizes(PhysicalSize::new(3, 2), KernelSize::Medium);
        assert!(sizes.iter().all(|s| s.width >= 1 && s.height >= 1));
    }
}
