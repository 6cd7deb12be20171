//! Resolves the pipeline's HDR color into the swapchain image.

use bytemuck::{Pod, Zeroable};

use crate::stages::fullscreen::{self, FullscreenDesc, FullscreenPass, TextureInput};
use crate::surface::{OutputEncoding, SurfaceOptions};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PresentUniforms {
    exposure: f32,
    tone_mapping: u32,
    encode_srgb: u32,
    _pad: u32,
}

/// Applies exposure, tone mapping and output encoding.
pub struct PresentPass {
    pass: FullscreenPass,
    uniforms: PresentUniforms,
    clear: wgpu::Color,
}

impl PresentPass {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        options: &SurfaceOptions,
    ) -> Self {
        let module = fullscreen::shader_module(device, "present", include_str!("shaders/present.wgsl"));
        let pass = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "present",
                module: &module,
                fragment: "fs_present",
                inputs: &[TextureInput::Color],
                format: surface_format,
                blend: None,
                depth: depth_format,
            },
        );

        // An sRGB swapchain format encodes on store; anything else needs it in the shader.
        let encode_srgb =
            options.output_encoding == OutputEncoding::Srgb && !surface_format.is_srgb();
        let [r, g, b, a] = options.clear_color;

        Self {
            pass,
            uniforms: PresentUniforms {
                exposure: options.exposure,
                tone_mapping: options.tone_mapping.shader_index(),
                encode_srgb: u32::from(encode_srgb),
                _pad: 0,
            },
            clear: wgpu::Color { r, g, b, a },
        }
    }

    pub fn draw(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        depth: Option<&wgpu::TextureView>,
    ) {
        self.pass.draw(
            device,
            encoder,
            target,
            wgpu::LoadOp::Clear(self.clear),
            &self.uniforms,
            &[source],
            depth,
        );
    }
}
