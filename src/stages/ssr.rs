//! Screen-space reflections.
//!
//! Four passes per frame:
//!
//! 1. **trace** marches reflected view rays against the depth buffer at
//!    `ssr.resolution_scale` of the frame size,
//! 2. **temporal** reprojects last frame's result through the velocity
//!    buffer and blends it in (`ssr.blend`), clamped to the current
//!    neighborhood (`ssr.correction`, `ssr.correction_radius`),
//! 3. **blur** runs a depth-aware separable gaussian, horizontal then vertical,
//! 4. **composite** adds the reflection to the scene color weighted by
//!    fresnel (`ssr.ior`) and `ssr.intensity`.
//!
//! The trace-resolution targets are reallocated whenever the frame size or
//! the resolution scale changes; reallocation discards temporal history.

use bytemuck::{Pod, Zeroable};

use crate::backend::{Backend, TargetDesc, TargetFormat};
use crate::gpu::{GpuContext, RenderTarget};
use crate::pipeline::{
    BufferSet, FrameView, RenderError, SsrSettings, Stage, StageContext, StageDescriptor,
};
use crate::surface::PhysicalSize;

use super::color_input;
use super::fullscreen::{self, FullscreenDesc, FullscreenPass, TextureInput};

const COMMON: &str = include_str!("../shaders/ssr_common.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SsrUniforms {
    projection: [[f32; 4]; 4],
    inv_projection: [[f32; 4]; 4],
    resolution: [f32; 2],
    texel: [f32; 2],
    distance: f32,
    thickness: f32,
    max_depth_difference: f32,
    intensity: f32,
    exponent: f32,
    max_roughness: f32,
    roughness_fade: f32,
    fade: f32,
    jitter: f32,
    jitter_roughness: f32,
    ior: f32,
    blend: f32,
    correction: f32,
    correction_radius: f32,
    blur: f32,
    blur_sharpness: f32,
    blur_kernel: f32,
    frame: f32,
    steps: u32,
    refine_steps: u32,
    missed_rays: u32,
    horizontal: u32,
    history_valid: u32,
    _pad: u32,
}

impl SsrUniforms {
    fn new(settings: &SsrSettings, view: &FrameView, resolution: PhysicalSize) -> Self {
        let projection = view.camera.projection;
        Self {
            projection: projection.to_cols_array_2d(),
            inv_projection: projection.inverse().to_cols_array_2d(),
            resolution: [resolution.width as f32, resolution.height as f32],
            texel: [1.0 / resolution.width as f32, 1.0 / resolution.height as f32],
            distance: settings.distance,
            thickness: settings.thickness,
            max_depth_difference: settings.max_depth_difference,
            intensity: settings.intensity,
            exponent: settings.exponent,
            max_roughness: settings.max_roughness,
            roughness_fade: settings.roughness_fade,
            fade: settings.fade,
            jitter: settings.jitter,
            jitter_roughness: settings.jitter_roughness,
            ior: settings.ior,
            blend: settings.blend,
            correction: settings.correction,
            correction_radius: settings.correction_radius,
            blur: settings.blur,
            blur_sharpness: settings.blur_sharpness,
            blur_kernel: settings.blur_kernel,
            frame: (view.frame_index % 1024) as f32,
            steps: settings.steps,
            refine_steps: settings.refine_steps,
            missed_rays: u32::from(settings.missed_rays),
            horizontal: 0,
            history_valid: 0,
            _pad: 0,
        }
    }
}

/// Trace-resolution buffers.
struct TraceTargets {
    scale: f32,
    size: PhysicalSize,
    trace: RenderTarget,
    history: [RenderTarget; 2],
    blur: [RenderTarget; 2],
    /// Index into `history` written this frame.
    current: usize,
    history_valid: bool,
}

impl TraceTargets {
    fn allocate(backend: &GpuContext, frame: PhysicalSize, scale: f32) -> Self {
        let size = frame.scaled(scale);
        let target = |label| backend.create_target(&TargetDesc::new(label, TargetFormat::Color, size));
        log::debug!(
            "ssr: trace targets {}x{} (scale {scale})",
            size.width,
            size.height
        );
        Self {
            scale,
            size,
            trace: target("ssr trace"),
            history: [target("ssr history a"), target("ssr history b")],
            blur: [target("ssr blur a"), target("ssr blur b")],
            current: 0,
            history_valid: false,
        }
    }

    fn matches(&self, frame: PhysicalSize, scale: f32) -> bool {
        self.scale == scale && self.size == frame.scaled(scale)
    }
}

pub struct SsrStage {
    trace: FullscreenPass,
    temporal: FullscreenPass,
    blur: FullscreenPass,
    composite: FullscreenPass,
    frame_size: PhysicalSize,
    targets: Option<TraceTargets>,
}

impl SsrStage {
    pub const DESCRIPTOR: StageDescriptor = StageDescriptor::effect("ssr", BufferSet::GBUFFER);

    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;
        let format = TargetFormat::Color.wgpu_format();

        let pass = |label: &'static str, source: &str, fragment: &str, inputs: &[TextureInput]| {
            let module = fullscreen::shader_module(device, label, &format!("{COMMON}\n{source}"));
            FullscreenPass::new(
                device,
                &FullscreenDesc {
                    label,
                    module: &module,
                    fragment,
                    inputs,
                    format,
                    blend: None,
                    depth: None,
                },
            )
        };

        use TextureInput::{Color, Depth};
        Self {
            trace: pass(
                "ssr trace",
                include_str!("../shaders/ssr_trace.wgsl"),
                "fs_trace",
                &[Color, Depth, Color],
            ),
            temporal: pass(
                "ssr temporal",
                include_str!("../shaders/ssr_temporal.wgsl"),
                "fs_temporal",
                &[Color, Color, Color],
            ),
            blur: pass(
                "ssr blur",
                include_str!("../shaders/ssr_blur.wgsl"),
                "fs_blur",
                &[Color, Depth],
            ),
            composite: pass(
                "ssr composite",
                include_str!("../shaders/ssr_composite.wgsl"),
                "fs_composite",
                &[Color, Color, Color, Depth],
            ),
            frame_size: PhysicalSize::default(),
            targets: None,
        }
    }

    fn ensure_targets(&mut self, backend: &GpuContext, scale: f32) {
        let frame = self.frame_size;
        if !self.targets.as_ref().is_some_and(|t| t.matches(frame, scale)) {
            self.targets = Some(TraceTargets::allocate(backend, frame, scale));
        }
    }
}

impl Stage<GpuContext> for SsrStage {
    fn descriptor(&self) -> StageDescriptor {
        Self::DESCRIPTOR
    }

    fn resize(&mut self, _backend: &GpuContext, size: PhysicalSize) {
        self.frame_size = size;
        // Reallocated at the next render, when the resolution scale is known.
        self.targets = None;
    }

    fn render(&mut self, ctx: &mut StageContext<'_, GpuContext>) -> Result<(), RenderError> {
        let source = color_input(Self::DESCRIPTOR.label, &ctx.io)?;
        let settings = &ctx.config.ssr;
        let scale = settings.resolution_scale.clamp(0.1, 1.0);

        self.ensure_targets(ctx.backend, scale);
        let Self {
            trace,
            temporal,
            blur,
            composite,
            targets,
            ..
        } = self;
        let Some(targets) = targets.as_mut() else {
            return Err(RenderError::Stage {
                stage: Self::DESCRIPTOR.label,
                reason: "trace targets unavailable".into(),
            });
        };

        let device = &ctx.backend.device;
        let encoder = &mut ctx.frame.encoder;
        let io = &ctx.io;
        let clear = wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT);

        let mut uniforms = SsrUniforms::new(settings, ctx.view, targets.size);

        trace.draw(
            device,
            encoder,
            &targets.trace.view,
            clear,
            &uniforms,
            &[&source.view, &io.depth.view, &io.normal_roughness.view],
            None,
        );

        let write = targets.current;
        let read = 1 - write;
        uniforms.history_valid = u32::from(targets.history_valid);
        temporal.draw(
            device,
            encoder,
            &targets.history[write].view,
            clear,
            &uniforms,
            &[&targets.trace.view, &targets.history[read].view, &io.velocity.view],
            None,
        );
        uniforms.history_valid = 0;

        uniforms.horizontal = 1;
        blur.draw(
            device,
            encoder,
            &targets.blur[0].view,
            clear,
            &uniforms,
            &[&targets.history[write].view, &io.depth.view],
            None,
        );
        uniforms.horizontal = 0;
        blur.draw(
            device,
            encoder,
            &targets.blur[1].view,
            clear,
            &uniforms,
            &[&targets.blur[0].view, &io.depth.view],
            None,
        );

        composite.draw(
            device,
            encoder,
            &io.color_out.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &uniforms,
            &[
                &source.view,
                &targets.blur[1].view,
                &io.normal_roughness.view,
                &io.depth.view,
            ],
            None,
        );

        targets.current = read;
        targets.history_valid = true;
        Ok(())
    }
}
