//! Shared plumbing for passes that draw one full-screen triangle.
//!
//! Bind group 0 is laid out the same for every such pass:
//!
//! | binding | resource                          |
//! |---------|-----------------------------------|
//! | 0       | uniform buffer                    |
//! | 1       | linear clamp sampler              |
//! | 2       | nearest clamp sampler             |
//! | 3..     | input textures, in declared order |

use wgpu::util::DeviceExt;

/// How an input texture is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureInput {
    /// Filterable float texture (`texture_2d<f32>`).
    Color,
    /// Depth texture (`texture_depth_2d`).
    Depth,
}

pub struct FullscreenDesc<'a> {
    pub label: &'static str,
    pub module: &'a wgpu::ShaderModule,
    pub fragment: &'a str,
    pub inputs: &'a [TextureInput],
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    /// Format of a depth attachment the pass must be compatible with.
    pub depth: Option<wgpu::TextureFormat>,
}

pub struct FullscreenPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    inputs: usize,
}

/// Compiles a fragment shader together with the shared full-screen vertex stage.
pub fn shader_module(device: &wgpu::Device, label: &str, fragment_source: &str) -> wgpu::ShaderModule {
    let source = format!("{}\n{}", include_str!("../shaders/fullscreen.wgsl"), fragment_source);
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn clamp_sampler(device: &wgpu::Device, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

impl FullscreenPass {
    pub fn new(device: &wgpu::Device, desc: &FullscreenDesc<'_>) -> Self {
        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ];
        for (i, input) in desc.inputs.iter().enumerate() {
            let sample_type = match input {
                TextureInput::Color => wgpu::TextureSampleType::Float { filterable: true },
                TextureInput::Depth => wgpu::TextureSampleType::Depth,
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 3 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: desc.module,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: desc.module,
                entry_point: Some(desc.fragment),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.format,
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: desc.depth.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            label: desc.label,
            pipeline,
            layout,
            linear: clamp_sampler(device, "fullscreen linear", wgpu::FilterMode::Linear),
            nearest: clamp_sampler(device, "fullscreen nearest", wgpu::FilterMode::Nearest),
            inputs: desc.inputs.len(),
        }
    }

    /// Records one draw into `target`.
    ///
    /// The uniform buffer is created per call, so several draws of the same
    /// pass in one encoder each see their own values.
    #[allow(clippy::too_many_arguments)]
    pub fn draw<U: bytemuck::Pod>(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        uniforms: &U,
        inputs: &[&wgpu::TextureView],
        depth: Option<&wgpu::TextureView>,
    ) {
        debug_assert_eq!(inputs.len(), self.inputs, "{} input count", self.label);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.label),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.linear),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&self.nearest),
            },
        ];
        for (i, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 3 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
