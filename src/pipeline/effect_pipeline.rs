use std::time::Instant;

use crate::backend::Backend;
use crate::camera::CameraMatrices;
use crate::scene::SceneGraph;
use crate::surface::{PhysicalSize, RenderSurface};

use super::config::SharedConfig;
use super::diagnostics::Diagnostics;
use super::error::{PipelineError, RenderError};
use super::stage::{FrameView, Stage, StageContext, StageIo, StageKind, validate_chain};
use super::targets::FrameTargets;

/// The scene pass followed by its effects, executed in a fixed order.
///
/// Stage order is validated once in [`EffectPipeline::new`] and never changes.
/// Every frame reads one snapshot of the shared [`PipelineConfig`], so all
/// stages agree on the tunables for the whole frame.
///
/// [`PipelineConfig`]: super::PipelineConfig
pub struct EffectPipeline<B: Backend> {
    stages: Vec<Box<dyn Stage<B>>>,
    config: SharedConfig,
    diagnostics: Diagnostics,
    targets: FrameTargets<B::Target>,
    previous_camera: Option<CameraMatrices>,
    frame_index: u64,
    clock: Instant,
}

impl<B: Backend> EffectPipeline<B> {
    pub fn new(
        backend: &B,
        size: PhysicalSize,
        mut stages: Vec<Box<dyn Stage<B>>>,
        config: SharedConfig,
        diagnostics: Diagnostics,
    ) -> Result<Self, PipelineError> {
        let descriptors: Vec<_> = stages.iter().map(|stage| stage.descriptor()).collect();
        validate_chain(&descriptors)?;

        let targets = FrameTargets::allocate(backend, size);
        for stage in &mut stages {
            stage.resize(backend, targets.size);
        }

        let labels: Vec<_> = descriptors.iter().map(|desc| desc.label).collect();
        log::info!(
            "effect pipeline built at {}x{}: {}",
            targets.size.width,
            targets.size.height,
            labels.join(" -> ")
        );
        diagnostics.record_pipeline(labels);

        Ok(Self {
            stages,
            config,
            diagnostics,
            targets,
            previous_camera: None,
            frame_index: 0,
            clock: Instant::now(),
        })
    }

    /// Reallocates the frame targets and resizes every stage, in order.
    ///
    /// Returns `false` without touching anything when the size is unchanged or
    /// empty.
    pub fn resize(&mut self, backend: &B, size: PhysicalSize) -> bool {
        if size.is_empty() || size == self.targets.size {
            return false;
        }

        self.targets = FrameTargets::allocate(backend, size);
        for stage in &mut self.stages {
            stage.resize(backend, size);
        }
        self.diagnostics.record_resize(size);

        log::debug!("effect pipeline resized to {}x{}", size.width, size.height);
        true
    }

    /// Renders one frame and presents the final color target.
    pub fn render(
        &mut self,
        surface: &RenderSurface<B>,
        scene: &SceneGraph,
    ) -> Result<(), RenderError> {
        let config = self.config.borrow().clone();
        let backend = surface.backend();
        let mut frame = backend.begin_frame()?;

        let camera = scene.camera().matrices();
        let view = FrameView {
            camera,
            previous: self.previous_camera.unwrap_or(camera),
            size: self.targets.size,
            time: self.clock.elapsed().as_secs_f32(),
            frame_index: self.frame_index,
        };

        let targets = &self.targets;
        let mut current = 0;
        let mut order = Vec::with_capacity(self.stages.len());

        for stage in &mut self.stages {
            let desc = stage.descriptor();
            let (color_in, next) = match desc.kind {
                StageKind::Scene => (None, current),
                StageKind::Effect => (Some(&targets.color[current]), 1 - current),
            };

            let mut ctx = StageContext {
                backend,
                frame: &mut frame,
                config: &config,
                view: &view,
                scene,
                io: StageIo {
                    color_in,
                    color_out: &targets.color[next],
                    depth: &targets.depth,
                    normal_roughness: &targets.normal_roughness,
                    velocity: &targets.velocity,
                },
            };
            stage.render(&mut ctx)?;

            current = next;
            order.push(desc.label);
        }

        surface.present(frame, &targets.color[current])?;

        self.previous_camera = Some(camera);
        self.frame_index += 1;
        self.diagnostics.record_frame(order);
        Ok(())
    }

    pub fn stage_labels(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.descriptor().label).collect()
    }

    pub fn size(&self) -> PhysicalSize {
        self.targets.size
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
