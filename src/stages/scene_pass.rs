//! The forward scene pass.
//!
//! Draws every surface of the [`SceneGraph`] into the frame's color, depth,
//! normal/roughness and velocity targets. Opaque surfaces go first; blended
//! ones follow sorted back to front without depth writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::backend::TargetFormat;
use crate::camera::CameraMatrices;
use crate::gpu::GpuContext;
use crate::pipeline::{RenderError, Stage, StageContext, StageDescriptor};
use crate::scene::{Light, MeshData, SceneGraph, Shading, Surface, Vertex3d};

const MAX_POINT_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct PointLightRaw {
    position_distance: [f32; 4],
    color_decay: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FrameUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
    prev_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    spot_position: [f32; 4],
    spot_direction: [f32; 4],
    spot_color: [f32; 4],
    spot_cone: [f32; 4],
    points: [PointLightRaw; MAX_POINT_LIGHTS],
    counts: [u32; 4],
}

impl FrameUniforms {
    fn new(camera: &CameraMatrices, previous: &CameraMatrices, lights: &[Light]) -> Self {
        let mut uniforms = Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            view_proj: camera.view_proj.to_cols_array_2d(),
            prev_view_proj: previous.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            ambient: [0.0; 4],
            spot_position: [0.0; 4],
            spot_direction: [0.0; 4],
            spot_color: [0.0; 4],
            spot_cone: [0.0; 4],
            points: [PointLightRaw::default(); MAX_POINT_LIGHTS],
            counts: [0; 4],
        };

        let mut ambient = Vec3::ZERO;
        let mut points = 0;
        let mut spot_seen = false;

        for light in lights {
            match light {
                Light::Ambient { color, intensity } => ambient += *color * *intensity,
                Light::Spot(spot) if !spot_seen => {
                    spot_seen = true;
                    let direction = (spot.target - spot.position).normalize_or(Vec3::NEG_Y);
                    uniforms.spot_position = spot.position.extend(spot.distance).to_array();
                    uniforms.spot_direction = direction.extend(spot.decay).to_array();
                    uniforms.spot_color = (spot.color * spot.intensity).extend(0.0).to_array();
                    uniforms.spot_cone = [
                        spot.angle.cos(),
                        (spot.angle * (1.0 - spot.penumbra)).cos(),
                        1.0,
                        0.0,
                    ];
                }
                Light::Spot(_) => log::trace!("ignoring extra spot light"),
                Light::Point(point) if points < MAX_POINT_LIGHTS => {
                    uniforms.points[points] = PointLightRaw {
                        position_distance: point.position.extend(point.distance).to_array(),
                        color_decay: (point.color * point.intensity).extend(point.decay).to_array(),
                    };
                    points += 1;
                }
                Light::Point(_) => log::trace!("point light limit reached"),
            }
        }

        uniforms.ambient = ambient.extend(0.0).to_array();
        uniforms.counts[0] = points as u32;
        uniforms
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    base_color: [f32; 4],
    emissive: [f32; 4],
    params: [f32; 4],
}

impl DrawUniforms {
    fn new(world: Mat4, surface: &Surface) -> Self {
        let material = &surface.material;
        let unlit = match material.shading {
            Shading::Unlit => 1.0,
            Shading::Physical => 0.0,
        };
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            base_color: material.color.extend(material.opacity).to_array(),
            emissive: material.emission().extend(material.roughness).to_array(),
            params: [material.metalness, material.ior, unlit, 0.0],
        }
    }
}

struct GpuMesh {
    // Held so the pointer key stays unique while cached.
    _source: Arc<MeshData>,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

fn mesh_key(mesh: &Arc<MeshData>) -> usize {
    Arc::as_ptr(mesh) as usize
}

fn cleared(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

struct DrawCall {
    mesh: usize,
    bind_group: wgpu::BindGroup,
    blended: bool,
}

pub struct ScenePass {
    opaque: wgpu::RenderPipeline,
    blended: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    draw_layout: wgpu::BindGroupLayout,
    meshes: HashMap<usize, GpuMesh>,
    revision: Option<u64>,
    clear: wgpu::Color,
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    blended: bool,
) -> wgpu::RenderPipeline {
    let (color_blend, gbuffer_writes, label) = if blended {
        (
            Some(wgpu::BlendState::ALPHA_BLENDING),
            wgpu::ColorWrites::empty(),
            "scene blended",
        )
    } else {
        (None, wgpu::ColorWrites::ALL, "scene opaque")
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_scene"),
            buffers: &[Vertex3d::LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_scene"),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: TargetFormat::Color.wgpu_format(),
                    blend: color_blend,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: TargetFormat::NormalRoughness.wgpu_format(),
                    blend: None,
                    write_mask: gbuffer_writes,
                }),
                Some(wgpu::ColorTargetState {
                    format: TargetFormat::Velocity.wgpu_format(),
                    blend: None,
                    write_mask: gbuffer_writes,
                }),
            ],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            // Loft geometry is modelled single-sided in places.
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: TargetFormat::Depth.wgpu_format(),
            depth_write_enabled: !blended,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl ScenePass {
    pub const DESCRIPTOR: StageDescriptor = StageDescriptor::scene("scene");

    pub fn new(gpu: &GpuContext, clear_color: [f64; 4]) -> Self {
        let device = &gpu.device;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
        });

        let frame_layout = uniform_layout(device, "scene frame");
        let draw_layout = uniform_layout(device, "scene draw");
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene"),
            bind_group_layouts: &[&frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let [r, g, b, a] = clear_color;
        Self {
            opaque: scene_pipeline(device, &layout, &module, false),
            blended: scene_pipeline(device, &layout, &module, true),
            frame_layout,
            draw_layout,
            meshes: HashMap::new(),
            revision: None,
            clear: wgpu::Color { r, g, b, a },
        }
    }

    /// Uploads meshes new to this revision and drops ones no longer drawn.
    fn sync_meshes(&mut self, device: &wgpu::Device, scene: &SceneGraph) {
        if self.revision == Some(scene.revision()) {
            return;
        }

        let placed = scene.surfaces();
        let live: HashSet<usize> =
            placed.iter().map(|p| mesh_key(&p.surface.geometry)).collect();
        self.meshes.retain(|key, _| live.contains(key));

        for p in &placed {
            let geometry = &p.surface.geometry;
            if geometry.is_empty() {
                continue;
            }
            self.meshes.entry(mesh_key(geometry)).or_insert_with(|| GpuMesh {
                _source: geometry.clone(),
                vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("scene vertices"),
                    contents: bytemuck::cast_slice(&geometry.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("scene indices"),
                    contents: bytemuck::cast_slice(&geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: geometry.indices.len() as u32,
            });
        }

        log::debug!(
            "scene revision {}: {} surfaces, {} cached meshes",
            scene.revision(),
            placed.len(),
            self.meshes.len()
        );
        self.revision = Some(scene.revision());
    }

    fn draw_calls(&self, device: &wgpu::Device, scene: &SceneGraph, eye: Vec3) -> Vec<DrawCall> {
        let mut opaque = Vec::new();
        let mut blended = Vec::new();

        for placed in scene.surfaces() {
            let key = mesh_key(&placed.surface.geometry);
            if !self.meshes.contains_key(&key) {
                continue;
            }
            let uniforms = DrawUniforms::new(placed.world, placed.surface);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scene draw uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("scene draw"),
                layout: &self.draw_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });

            if placed.surface.material.is_blended() {
                let center = placed.world.transform_point3(placed.surface.geometry.center());
                blended.push((
                    center.distance_squared(eye),
                    DrawCall {
                        mesh: key,
                        bind_group,
                        blended: true,
                    },
                ));
            } else {
                opaque.push(DrawCall {
                    mesh: key,
                    bind_group,
                    blended: false,
                });
            }
        }

        blended.sort_by(|a, b| b.0.total_cmp(&a.0));
        opaque.extend(blended.into_iter().map(|(_, call)| call));
        opaque
    }
}

impl Stage<GpuContext> for ScenePass {
    fn descriptor(&self) -> StageDescriptor {
        Self::DESCRIPTOR
    }

    fn render(&mut self, ctx: &mut StageContext<'_, GpuContext>) -> Result<(), RenderError> {
        let device = &ctx.backend.device;
        self.sync_meshes(device, ctx.scene);

        let lights = ctx.scene.lights();
        let frame_uniforms = FrameUniforms::new(&ctx.view.camera, &ctx.view.previous, &lights);
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene frame uniforms"),
            contents: bytemuck::bytes_of(&frame_uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene frame"),
            layout: &self.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let calls = self.draw_calls(device, ctx.scene, ctx.view.camera.position);

        let io = &ctx.io;
        let mut pass = ctx.frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &io.color_out.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                cleared(&io.normal_roughness.view),
                cleared(&io.velocity.view),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &io.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &frame_group, &[]);
        let mut bound_blended = None;
        for call in &calls {
            let Some(mesh) = self.meshes.get(&call.mesh) else {
                continue;
            };
            if bound_blended != Some(call.blended) {
                pass.set_pipeline(if call.blended { &self.blended } else { &self.opaque });
                bound_blended = Some(call.blended);
            }
            pass.set_bind_group(1, &call.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        Ok(())
    }
}
