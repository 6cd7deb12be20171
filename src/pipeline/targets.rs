use crate::backend::{Backend, TargetDesc, TargetFormat};
use crate::surface::PhysicalSize;

/// The per-frame buffers shared by all stages.
///
/// Color is ping-ponged between two targets. The auxiliary buffers are
/// written by the scene stage only.
pub struct FrameTargets<T> {
    pub color: [T; 2],
    pub depth: T,
    pub normal_roughness: T,
    pub velocity: T,
    pub size: PhysicalSize,
}

impl<T> FrameTargets<T> {
    pub fn allocate<B>(backend: &B, size: PhysicalSize) -> Self
    where
        B: Backend<Target = T>,
    {
        let size = size.at_least_one();
        let target = |label, format| backend.create_target(&TargetDesc::new(label, format, size));

        Self {
            color: [
                target("frame color a", TargetFormat::Color),
                target("frame color b", TargetFormat::Color),
            ],
            depth: target("frame depth", TargetFormat::Depth),
            normal_roughness: target("frame normal roughness", TargetFormat::NormalRoughness),
            velocity: target("frame velocity", TargetFormat::Velocity),
            size,
        }
    }
}
