//! The seam between the composition pipeline and the GPU.
//!
//! Everything above this trait (surface bookkeeping, stage ordering, resize
//! propagation, the frame loop) is backend-agnostic. [`GpuContext`] is the wgpu
//! implementation used by the viewer; tests drive the same code through a
//! headless recording backend.
//!
//! [`GpuContext`]: crate::GpuContext

use crate::pipeline::RenderError;
use crate::surface::{PhysicalSize, SurfaceOptions};

/// Pixel format class of an off-screen render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// HDR color (`Rgba16Float`).
    Color,
    /// View-space normal in rgb, roughness in alpha (`Rgba16Float`).
    NormalRoughness,
    /// Screen-space motion since the previous frame (`Rg16Float`).
    Velocity,
    /// Scene depth (`Depth32Float`).
    Depth,
}

impl TargetFormat {
    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Color | TargetFormat::NormalRoughness => {
                wgpu::TextureFormat::Rgba16Float
            }
            TargetFormat::Velocity => wgpu::TextureFormat::Rg16Float,
            TargetFormat::Depth => wgpu::TextureFormat::Depth32Float,
        }
    }
}

/// Description of a render target allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub format: TargetFormat,
    pub size: PhysicalSize,
}

impl TargetDesc {
    pub fn new(label: &'static str, format: TargetFormat, size: PhysicalSize) -> Self {
        Self {
            label,
            format,
            size: size.at_least_one(),
        }
    }
}

/// GPU capabilities the pipeline drives.
///
/// `Target` is an allocated render target, `Frame` is whatever a backend
/// records a frame's work into before presentation.
pub trait Backend {
    type Target;
    type Frame;

    /// Applies the startup surface options. Called exactly once by
    /// [`RenderSurface::configure`](crate::RenderSurface::configure).
    fn configure(&mut self, options: &SurfaceOptions);

    /// Reallocates the presentation surface. Never called with an empty size.
    fn resize_surface(&mut self, size: PhysicalSize);

    fn create_target(&self, desc: &TargetDesc) -> Self::Target;

    fn begin_frame(&self) -> Result<Self::Frame, RenderError>;

    /// Resolves `color` into the visible surface and submits the frame.
    fn present(&self, frame: Self::Frame, color: &Self::Target) -> Result<(), RenderError>;
}
