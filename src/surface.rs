//! The presentation surface: viewport bookkeeping and fixed output options.

use crate::backend::Backend;
use crate::pipeline::RenderError;

/// A size in physical (device) pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl PhysicalSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamps both axes to at least one pixel. GPU textures cannot be empty.
    pub fn at_least_one(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }

    /// Scales both axes, keeping at least one pixel.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            ((self.width as f32 * factor).round() as u32).max(1),
            ((self.height as f32 * factor).round() as u32).max(1),
        )
    }
}

/// Logical viewport dimensions plus the display's pixel density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSize {
    pub width: f32,
    pub height: f32,
    pub pixel_density: f32,
}

impl ViewportSize {
    pub fn new(width: f32, height: f32, pixel_density: f32) -> Self {
        Self {
            width,
            height,
            pixel_density,
        }
    }

    /// Builds a logical viewport from a window's physical size and scale factor.
    pub fn from_physical(width: u32, height: u32, scale_factor: f64) -> Self {
        let density = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        Self {
            width: (width as f64 / density) as f32,
            height: (height as f64 / density) as f32,
            pixel_density: density as f32,
        }
    }

    pub fn physical(self) -> PhysicalSize {
        PhysicalSize::new(
            (self.width * self.pixel_density).round().max(0.0) as u32,
            (self.height * self.pixel_density).round().max(0.0) as u32,
        )
    }

    pub fn aspect(self) -> f32 {
        self.width / self.height
    }

    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.pixel_density > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.pixel_density.is_finite()
    }
}

/// Curve applied when resolving HDR color into the visible surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneMapping {
    None,
    Linear,
    Reinhard,
    #[default]
    AcesFilmic,
}

impl ToneMapping {
    pub(crate) fn shader_index(self) -> u32 {
        match self {
            ToneMapping::None => 0,
            ToneMapping::Linear => 1,
            ToneMapping::Reinhard => 2,
            ToneMapping::AcesFilmic => 3,
        }
    }
}

/// Color encoding of the visible surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Srgb,
    Linear,
}

/// Startup options for the presentation surface.
///
/// These are fixed once [`RenderSurface::configure`] has run.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceOptions {
    pub power_preference: wgpu::PowerPreference,
    /// Give the presentation target its own depth attachment.
    pub depth: bool,
    /// Give the presentation target a stencil aspect (implies a depth attachment).
    pub stencil: bool,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub output_encoding: OutputEncoding,
    pub clear_color: [f64; 4],
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            depth: false,
            stencil: false,
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.5,
            output_encoding: OutputEncoding::Srgb,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl SurfaceOptions {
    pub fn tone_mapping(mut self, tone_mapping: ToneMapping, exposure: f32) -> Self {
        self.tone_mapping = tone_mapping;
        self.exposure = exposure;
        self
    }

    pub fn output_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.output_encoding = encoding;
        self
    }

    pub fn depth_stencil(mut self, depth: bool, stencil: bool) -> Self {
        self.depth = depth;
        self.stencil = stencil;
        self
    }

    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Depth format for the presentation target, if it has one.
    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        match (self.depth, self.stencil) {
            (_, true) => Some(wgpu::TextureFormat::Depth24PlusStencil8),
            (true, false) => Some(wgpu::TextureFormat::Depth32Float),
            (false, false) => None,
        }
    }
}

/// The visible output target.
///
/// Owns the backend, the options it was configured with, and the single
/// process-wide [`ViewportSize`]. Only the resize handler mutates the viewport.
pub struct RenderSurface<B: Backend> {
    backend: B,
    options: SurfaceOptions,
    viewport: ViewportSize,
    physical: PhysicalSize,
}

impl<B: Backend> RenderSurface<B> {
    /// Configures the backend once and sizes the surface for `viewport`.
    pub fn configure(mut backend: B, options: SurfaceOptions, viewport: ViewportSize) -> Self {
        backend.configure(&options);

        let physical = viewport.physical();
        if !physical.is_empty() {
            backend.resize_surface(physical);
        }

        log::info!(
            "surface configured: {}x{} @{}x, tone mapping {:?} (exposure {}), {:?} output",
            physical.width,
            physical.height,
            viewport.pixel_density,
            options.tone_mapping,
            options.exposure,
            options.output_encoding,
        );

        Self {
            backend,
            options,
            viewport,
            physical,
        }
    }

    /// Resizes the output target. Returns whether the physical size changed.
    ///
    /// Idempotent: repeating a size does not reallocate. Empty sizes are
    /// recorded but never pushed to the backend.
    pub fn resize(&mut self, viewport: ViewportSize) -> bool {
        self.viewport = viewport;

        let physical = viewport.physical();
        if physical == self.physical || physical.is_empty() {
            return false;
        }

        self.backend.resize_surface(physical);
        self.physical = physical;
        true
    }

    pub fn present(&self, frame: B::Frame, color: &B::Target) -> Result<(), RenderError> {
        self.backend.present(frame, color)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    /// Current target dimensions in device pixels.
    pub fn physical_size(&self) -> PhysicalSize {
        self.physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingBackend;

    #[test]
    fn physical_size_scales_by_density() {
        let viewport = ViewportSize::new(800.0, 600.0, 2.0);
        assert_eq!(viewport.physical(), PhysicalSize::new(1600, 1200));
    }

    #[test]
    fn from_physical_round_trips() {
        let viewport = ViewportSize::from_physical(2560, 1440, 1.5);
        assert_eq!(viewport.physical(), PhysicalSize::new(2560, 1440));
        assert!((viewport.width - 1706.6666).abs() < 0.01);
    }

    #[test]
    fn configure_applies_options_once() {
        let surface = RenderSurface::configure(
            RecordingBackend::new(),
            SurfaceOptions::default(),
            ViewportSize::new(800.0, 600.0, 1.0),
        );

        assert_eq!(surface.backend().configure_calls(), 1);
        assert_eq!(surface.backend().surface_size(), PhysicalSize::new(800, 600));
        assert_eq!(surface.options().exposure, 1.5);
        assert_eq!(surface.options().tone_mapping, ToneMapping::AcesFilmic);
    }

    #[test]
    fn resize_is_idempotent() {
        let mut surface = RenderSurface::configure(
            RecordingBackend::new(),
            SurfaceOptions::default(),
            ViewportSize::new(800.0, 600.0, 1.0),
        );

        assert!(surface.resize(ViewportSize::new(1600.0, 1200.0, 1.0)));
        assert!(!surface.resize(ViewportSize::new(1600.0, 1200.0, 1.0)));

        assert_eq!(surface.physical_size(), PhysicalSize::new(1600, 1200));
        assert_eq!(surface.backend().surface_resizes(), 2);
    }

    #[test]
    fn empty_resize_keeps_previous_target() {
        let mut surface = RenderSurface::configure(
            RecordingBackend::new(),
            SurfaceOptions::default(),
            ViewportSize::new(800.0, 600.0, 1.0),
        );

        assert!(!surface.resize(ViewportSize::new(0.0, 600.0, 1.0)));
        assert_eq!(surface.physical_size(), PhysicalSize::new(800, 600));
        assert_eq!(surface.viewport().width, 0.0);
    }

    #[test]
    fn depth_format_follows_options() {
        assert_eq!(SurfaceOptions::default().depth_format(), None);
        assert_eq!(
            SurfaceOptions::default()
                .depth_stencil(true, false)
                .depth_format(),
            Some(wgpu::TextureFormat::Depth32Float)
        );
        assert_eq!(
            SurfaceOptions::default()
                .depth_stencil(false, true)
                .depth_format(),
            Some(wgpu::TextureFormat::Depth24PlusStencil8)
        );
    }
}
