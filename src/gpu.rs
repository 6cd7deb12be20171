//! The wgpu backend.
//!
//! [`GpuContext`] owns the device, queue and window surface, allocates the
//! pipeline's render targets and resolves the final HDR color into the
//! swapchain through the [`PresentPass`].

use std::cell::Cell;
use std::sync::Arc;

use winit::window::Window;

use crate::backend::{Backend, TargetDesc};
use crate::pipeline::RenderError;
use crate::present_pass::PresentPass;
use crate::surface::{OutputEncoding, PhysicalSize, SurfaceOptions};

/// An off-screen texture the pipeline renders into or samples from.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub desc: TargetDesc,
}

/// Commands recorded for one frame, submitted by [`GpuContext::present`].
pub struct GpuFrame {
    pub encoder: wgpu::CommandEncoder,
}

/// Response to a failed swapchain acquire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SurfaceErrorAction {
    /// Surface was reconfigured; the next frame can render.
    Reconfigured,
    /// Transient; drop this frame.
    SkipFrame,
    Fatal,
}

/// Consecutive swapchain acquires that failed and dropped their frame.
const MAX_SKIPPED_FRAMES: u32 = 120;

/// Counts dropped frames between successful presents.
#[derive(Debug, Default)]
struct SkippedFrames {
    count: Cell<u32>,
}

impl SkippedFrames {
    /// Records a dropped frame. Fails once `MAX_SKIPPED_FRAMES` are dropped in a row.
    fn record(&self, reason: &str) -> Result<(), RenderError> {
        let count = self.count.get() + 1;
        self.count.set(count);

        if count >= MAX_SKIPPED_FRAMES {
            self.count.set(0);
            return Err(RenderError::Surface(format!(
                "{count} frames in a row could not be presented: {reason}"
            )));
        }
        log::warn!("skipping frame ({count} in a row): {reason}");
        Ok(())
    }

    fn reset(&self) {
        if self.count.replace(0) > 0 {
            log::debug!("surface recovered");
        }
    }
}

/// Core GPU state: device, queue, window surface and presentation.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    caps: wgpu::SurfaceCapabilities,
    present: Option<PresentPass>,
    present_depth: Option<wgpu::TextureView>,
    depth_format: Option<wgpu::TextureFormat>,
    skipped: SkippedFrames,
}

impl GpuContext {
    /// Creates the device and surface for `window`.
    ///
    /// The surface is not usable until [`Backend::configure`] has run.
    pub fn new(
        window: Arc<Window>,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::Init(format!("surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| RenderError::Init(format!("adapter: {e}")))?;

        let info = adapter.get_info();
        log::info!("using {} ({:?}, {:?})", info.name, info.device_type, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("loftview device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| RenderError::Init(format!("device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, OutputEncoding::Srgb)
            .ok_or_else(|| RenderError::Init("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            caps,
            present: None,
            present_depth: None,
            depth_format: None,
            skipped: SkippedFrames::default(),
        })
    }

    fn allocate_present_depth(&mut self) {
        self.present_depth = self.depth_format.map(|format| {
            self.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("present depth"),
                    size: wgpu::Extent3d {
                        width: self.config.width,
                        height: self.config.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
    }

    fn map_surface_error(&self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                self.surface.configure(&self.device, &self.config);
                SurfaceErrorAction::Reconfigured
            }
            wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

/// Picks a swapchain format matching the requested output encoding.
fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    encoding: OutputEncoding,
) -> Option<wgpu::TextureFormat> {
    let want_srgb = encoding == OutputEncoding::Srgb;
    caps.formats
        .iter()
        .find(|f| f.is_srgb() == want_srgb)
        .or_else(|| caps.formats.first())
        .copied()
}

impl Backend for GpuContext {
    type Target = RenderTarget;
    type Frame = GpuFrame;

    fn configure(&mut self, options: &SurfaceOptions) {
        if let Some(format) = choose_surface_format(&self.caps, options.output_encoding) {
            self.config.format = format;
        }
        self.depth_format = options.depth_format();
        self.surface.configure(&self.device, &self.config);
        self.allocate_present_depth();
        self.present = Some(PresentPass::new(
            &self.device,
            self.config.format,
            self.depth_format,
            options,
        ));

        log::debug!(
            "surface format {:?}, present depth {:?}",
            self.config.format,
            self.depth_format
        );
    }

    fn resize_surface(&mut self, size: PhysicalSize) {
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.allocate_present_depth();
    }

    fn create_target(&self, desc: &TargetDesc) -> RenderTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.wgpu_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        RenderTarget {
            texture,
            view,
            desc: *desc,
        }
    }

    fn begin_frame(&self) -> Result<GpuFrame, RenderError> {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        Ok(GpuFrame { encoder })
    }

    fn present(&self, frame: GpuFrame, color: &RenderTarget) -> Result<(), RenderError> {
        let present = self
            .present
            .as_ref()
            .ok_or_else(|| RenderError::Surface("surface was never configured".into()))?;

        let GpuFrame { mut encoder } = frame;

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                // Off-screen work still runs so temporal history stays continuous.
                self.queue.submit([encoder.finish()]);
                let reason = err.to_string();
                return match self.map_surface_error(err) {
                    SurfaceErrorAction::Reconfigured => {
                        log::debug!("surface reconfigured: {reason}");
                        Ok(())
                    }
                    SurfaceErrorAction::SkipFrame => self.skipped.record(&reason),
                    SurfaceErrorAction::Fatal => Err(RenderError::OutOfMemory),
                };
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        present.draw(
            &self.device,
            &mut encoder,
            &color.view,
            &view,
            self.present_depth.as_ref(),
        );

        self.queue.submit([encoder.finish()]);
        output.present();
        self.skipped.reset();
        Ok(())
    }
}
