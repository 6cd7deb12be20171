use bitflags::bitflags;
use glam::Mat4;

use crate::backend::Backend;
use crate::camera::CameraMatrices;
use crate::scene::SceneGraph;
use crate::surface::PhysicalSize;

use super::config::PipelineConfig;
use super::error::RenderError;

bitflags! {
    /// Per-frame buffers a stage reads or writes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferSet: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const NORMAL_ROUGHNESS = 1 << 2;
        const VELOCITY = 1 << 3;
    }
}

impl BufferSet {
    /// Everything the scene stage produces.
    pub const GBUFFER: Self = Self::COLOR
        .union(Self::DEPTH)
        .union(Self::NORMAL_ROUGHNESS)
        .union(Self::VELOCITY);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// Rasterizes the scene graph. Must be first and unique.
    Scene,
    /// Transforms the color buffer produced by earlier stages.
    Effect,
}

/// Static shape of a stage: its label and the buffers it touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageDescriptor {
    pub label: &'static str,
    pub kind: StageKind,
    pub reads: BufferSet,
    pub writes: BufferSet,
}

impl StageDescriptor {
    pub const fn scene(label: &'static str) -> Self {
        Self {
            label,
            kind: StageKind::Scene,
            reads: BufferSet::empty(),
            writes: BufferSet::GBUFFER,
        }
    }

    pub const fn effect(label: &'static str, reads: BufferSet) -> Self {
        Self {
            label,
            kind: StageKind::Effect,
            reads,
            writes: BufferSet::COLOR,
        }
    }
}

/// Per-frame view state shared by all stages.
#[derive(Clone, Copy, Debug)]
pub struct FrameView {
    pub camera: CameraMatrices,
    /// Camera matrices of the previous frame, for reprojection.
    pub previous: CameraMatrices,
    pub size: PhysicalSize,
    pub time: f32,
    pub frame_index: u64,
}

impl FrameView {
    /// Maps current clip space into the previous frame's clip space.
    pub fn reprojection(&self) -> Mat4 {
        self.previous.view_proj * self.camera.view_proj.inverse()
    }
}

/// The targets a stage may use this frame.
///
/// `color_in` is `None` for the scene stage. Effect stages read `color_in` and
/// write `color_out`; the pipeline swaps them between stages.
pub struct StageIo<'a, T> {
    pub color_in: Option<&'a T>,
    pub color_out: &'a T,
    pub depth: &'a T,
    pub normal_roughness: &'a T,
    pub velocity: &'a T,
}

pub struct StageContext<'a, B: Backend> {
    pub backend: &'a B,
    pub frame: &'a mut B::Frame,
    pub config: &'a PipelineConfig,
    pub view: &'a FrameView,
    pub scene: &'a SceneGraph,
    pub io: StageIo<'a, B::Target>,
}

/// One stage of the composition chain.
pub trait Stage<B: Backend> {
    fn descriptor(&self) -> StageDescriptor;

    /// Reallocates size-dependent resources. The pipeline never passes an
    /// empty size.
    fn resize(&mut self, _backend: &B, _size: PhysicalSize) {}

    fn render(&mut self, ctx: &mut StageContext<'_, B>) -> Result<(), RenderError>;
}

/// Checks the ordering rules of a chain of stage descriptors.
///
/// Every read must be satisfied by an earlier stage's writes, and the first
/// stage must be the only scene stage.
pub fn validate_chain<'a, I>(descriptors: I) -> Result<(), super::PipelineError>
where
    I: IntoIterator<Item = &'a StageDescriptor>,
{
    use super::PipelineError;

    let mut available = BufferSet::empty();
    let mut seen_any = false;

    for (index, desc) in descriptors.into_iter().enumerate() {
        seen_any = true;

        let missing = desc.reads.difference(available);
        if !missing.is_empty() {
            return Err(PipelineError::MissingInput {
                stage: desc.label,
                buffer: missing,
            });
        }

        match (index, desc.kind) {
            (0, StageKind::Effect) => {
                return Err(PipelineError::MissingSceneStage { first: desc.label });
            }
            (0, StageKind::Scene) => {}
            (_, StageKind::Scene) => {
                return Err(PipelineError::DuplicateSceneStage { stage: desc.label });
            }
            (_, StageKind::Effect) => {}
        }

        available |= desc.writes;
    }

    if seen_any {
        Ok(())
    } else {
        Err(PipelineError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineError;

    const SCENE: StageDescriptor = StageDescriptor::scene("scene");
    const SSR: StageDescriptor = StageDescriptor::effect(
        "ssr",
        BufferSet::COLOR
            .union(BufferSet::DEPTH)
            .union(BufferSet::NORMAL_ROUGHNESS)
            .union(BufferSet::VELOCITY),
    );
    const FXAA: StageDescriptor = StageDescriptor::effect("fxaa", BufferSet::COLOR);

    #[test]
    fn canonical_order_validates() {
        assert_eq!(validate_chain(&[SCENE, SSR, FXAA]), Ok(()));
    }

    #[test]
    fn effect_first_reports_missing_input() {
        assert_eq!(
            validate_chain(&[FXAA, SCENE]),
            Err(PipelineError::MissingInput {
                stage: "fxaa",
                buffer: BufferSet::COLOR,
            })
        );
    }

    #[test]
    fn effect_without_inputs_first_needs_scene() {
        let standalone = StageDescriptor::effect("gradient", BufferSet::empty());
        assert_eq!(
            validate_chain(&[standalone]),
            Err(PipelineError::MissingSceneStage { first: "gradient" })
        );
    }

    #[test]
    fn second_scene_stage_is_rejected() {
        let overlay = StageDescriptor::scene("overlay");
        assert_eq!(
            validate_chain(&[SCENE, FXAA, overlay]),
            Err(PipelineError::DuplicateSceneStage { stage: "overlay" })
        );
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_eq!(validate_chain(&[] as &[StageDescriptor]), Err(PipelineError::Empty));
    }
}
