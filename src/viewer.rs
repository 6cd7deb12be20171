//! The viewer: scene, loader, controls and pipeline tied to one surface.

use thiserror::Error;

use crate::assets::{LoadStatus, PendingLoad};
use crate::backend::Backend;
use crate::controls::OrbitControls;
use crate::input::InputFrame;
use crate::materials::MaterialPatcher;
use crate::pipeline::{
    Diagnostics, EffectChain, EffectPipeline, PipelineConfig, PipelineError, RenderError,
    SharedConfig, Stage,
};
use crate::resize::ViewportResizeHandler;
use crate::scene::{SceneError, SceneGraph};
use crate::surface::{RenderSurface, ViewportSize};

/// Builds the stage lists for a backend.
pub trait StageFactory<B: Backend> {
    /// Stages used before the model arrives: the scene pass alone.
    fn base(&self, backend: &B) -> Vec<Box<dyn Stage<B>>>;

    /// The scene pass followed by the effects enabled in `chain`.
    fn full(&self, backend: &B, chain: EffectChain) -> Vec<Box<dyn Stage<B>>>;
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub struct Viewer<B: Backend, F: StageFactory<B>> {
    surface: RenderSurface<B>,
    scene: SceneGraph,
    controls: OrbitControls,
    patcher: MaterialPatcher,
    pending: Option<PendingLoad>,
    pipeline: EffectPipeline<B>,
    factory: F,
    chain: EffectChain,
    config: SharedConfig,
    diagnostics: Diagnostics,
    resize: ViewportResizeHandler,
}

impl<B: Backend, F: StageFactory<B>> Viewer<B, F> {
    /// Sets up the lit loft scene with the base pipeline while `pending` loads.
    pub fn new(
        surface: RenderSurface<B>,
        factory: F,
        chain: EffectChain,
        config: PipelineConfig,
        pending: PendingLoad,
    ) -> Result<Self, ViewerError> {
        let scene = SceneGraph::loft(surface.viewport());
        let controls = OrbitControls::loft(scene.camera());
        let config = config.shared();
        let diagnostics = Diagnostics::new();

        let pipeline = EffectPipeline::new(
            surface.backend(),
            surface.physical_size(),
            factory.base(surface.backend()),
            config.clone(),
            diagnostics.clone(),
        )?;

        Ok(Self {
            surface,
            scene,
            controls,
            patcher: MaterialPatcher::loft(),
            pending: Some(pending),
            pipeline,
            factory,
            chain,
            config,
            diagnostics,
            resize: ViewportResizeHandler::new(),
        })
    }

    pub fn with_patcher(mut self, patcher: MaterialPatcher) -> Self {
        self.patcher = patcher;
        self
    }

    /// Queues a viewport change for the next tick.
    pub fn on_resize(&mut self, viewport: ViewportSize) {
        self.resize.on_resize(viewport);
    }

    /// One frame: pending resize, controls, model hand-off, render.
    pub fn tick(&mut self, input: &InputFrame, dt: f32) -> Result<(), ViewerError> {
        if let Some(viewport) = self.resize.take_pending() {
            if let Err(err) = ViewportResizeHandler::apply(
                viewport,
                self.scene.camera_mut(),
                &mut self.surface,
                &mut self.pipeline,
            ) {
                log::warn!("skipping resize: {err}");
            }
        }

        let height = self.surface.physical_size().height as f32;
        self.controls.update(input, dt, self.scene.camera(), height);
        self.controls.apply(self.scene.camera_mut());

        self.poll_load()?;

        self.pipeline.render(&self.surface, &self.scene)?;
        Ok(())
    }

    fn poll_load(&mut self) -> Result<(), ViewerError> {
        let Some(pending) = &mut self.pending else {
            return Ok(());
        };

        match pending.poll() {
            LoadStatus::Pending => Ok(()),
            LoadStatus::Ready(mut model) => {
                self.pending = None;
                let report = self.patcher.apply(&mut model);
                log::info!(
                    "model `{}` ready: {} surfaces patched",
                    model.name,
                    report.surfaces
                );
                self.scene.attach_model(model)?;
                self.build_full_pipeline()
            }
            LoadStatus::Failed(err) => {
                log::error!("failed to load model `{}`: {err}", pending.source());
                self.pending = None;
                Ok(())
            }
            LoadStatus::Consumed => {
                self.pending = None;
                Ok(())
            }
        }
    }

    fn build_full_pipeline(&mut self) -> Result<(), ViewerError> {
        let backend = self.surface.backend();
        self.pipeline = EffectPipeline::new(
            backend,
            self.surface.physical_size(),
            self.factory.full(backend, self.chain),
            self.config.clone(),
            self.diagnostics.clone(),
        )?;
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn surface(&self) -> &RenderSurface<B> {
        &self.surface
    }

    pub fn pipeline(&self) -> &EffectPipeline<B> {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assets::LoadError;
    use crate::driver::{DriverState, FrameDriver, FrameScheduler};
    use crate::pipeline::Tunable;
    use crate::scene::{Material, MeshData, SceneNode, Surface};
    use crate::surface::{PhysicalSize, SurfaceOptions};
    use crate::test_support::{TraceFactory, StageLog, RecordingBackend};

    struct NoopScheduler;

    impl FrameScheduler for NoopScheduler {
        fn schedule_frame(&self) {}
    }

    fn surface() -> RenderSurface<RecordingBackend> {
        RenderSurface::configure(
            RecordingBackend::new(),
            SurfaceOptions::default(),
            ViewportSize::new(800.0, 600.0, 1.0),
        )
    }

    fn loft_model() -> SceneNode {
        let geometry = Arc::new(MeshData::sphere(1.0, 8, 4));
        SceneNode::group("loft-v1").with_child(SceneNode::mesh(
            "room",
            vec![
                Surface::new(geometry.clone(), Material::named("glass")),
                Surface::new(geometry, Material::named("floor")),
            ],
        ))
    }

    fn viewer(
        pending: PendingLoad,
        log: &StageLog,
    ) -> Viewer<RecordingBackend, TraceFactory> {
        Viewer::new(
            surface(),
            TraceFactory::new(log),
            EffectChain::default(),
            PipelineConfig::default(),
            pending,
        )
        .unwrap()
    }

    #[test]
    fn base_pipeline_runs_until_model_arrives() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Ok(loft_model())), &log);

        assert_eq!(viewer.pipeline().stage_labels(), ["scene"]);
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        assert!(viewer.scene().has_model());
        assert!(!viewer.is_loading());
        assert_eq!(
            viewer.pipeline().stage_labels(),
            ["scene", "ssr", "bloom", "vignette", "fxaa"]
        );
        assert_eq!(viewer.diagnostics().snapshot().pipelines_built, 2);
    }

    #[test]
    fn loaded_model_is_patched_before_attach() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Ok(loft_model())), &log);
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        let room = viewer.scene().model().and_then(|m| m.find("room")).unwrap();
        let glass = &room.surfaces()[0];
        assert!(glass.material.transparent);
        assert!(glass.cast_shadow);
        assert_eq!(room.surfaces()[1].material.roughness, 0.003);
    }

    #[test]
    fn custom_patcher_replaces_loft_rules() {
        use crate::materials::{MaterialMatch, MaterialRule, MaterialWrite};

        let log = StageLog::default();
        let patcher = MaterialPatcher::new(vec![
            MaterialRule::new(MaterialMatch::equals("floor")).set(MaterialWrite::Roughness(0.9)),
        ]);
        let mut viewer =
            viewer(PendingLoad::resolved(Ok(loft_model())), &log).with_patcher(patcher);
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        let room = viewer.scene().model().and_then(|m| m.find("room")).unwrap();
        assert_eq!(room.surfaces()[1].material.roughness, 0.9);
        assert!(!room.surfaces()[0].material.transparent);
        assert!(!room.surfaces()[0].cast_shadow);
    }

    #[test]
    fn failed_load_keeps_lights_only_scene_ticking() {
        let log = StageLog::default();
        let pending = PendingLoad::resolved(Err(LoadError::Decode("truncated".into())));
        let mut viewer = viewer(pending, &log);
        let mut driver = FrameDriver::new(NoopScheduler);
        driver.start();

        for _ in 0..5 {
            driver.tick(|| viewer.tick(&InputFrame::default(), 1.0 / 60.0)).unwrap();
        }

        assert_eq!(driver.state(), DriverState::Running { frames: 5 });
        assert!(!viewer.scene().has_model());
        assert_eq!(viewer.scene().lights().len(), 4);
        assert_eq!(viewer.diagnostics().frames(), 5);
        assert_eq!(viewer.pipeline().stage_labels(), ["scene"]);
    }

    #[test]
    fn full_chain_runs_in_order_every_tick() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Ok(loft_model())), &log);

        for _ in 0..3 {
            viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();
        }

        // The model is handed off before the first render, so every frame is full.
        let rendered = log.rendered();
        assert_eq!(rendered.len(), 15);
        for frame in rendered.chunks(5) {
            assert_eq!(frame, ["scene", "ssr", "bloom", "vignette", "fxaa"]);
        }
    }

    #[test]
    fn tunable_change_reaches_next_tick() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Ok(loft_model())), &log);
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        viewer
            .config()
            .borrow_mut()
            .set("ssr.intensity", Tunable::Float(1.0))
            .unwrap();
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        assert_eq!(log.ssr_intensity_seen(), [2.0, 2.0, 1.0]);
    }

    #[test]
    fn resize_applies_before_render() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Ok(loft_model())), &log);

        viewer.on_resize(ViewportSize::new(1200.0, 600.0, 1.0));
        viewer.on_resize(ViewportSize::new(1600.0, 1200.0, 1.0));
        viewer.tick(&InputFrame::default(), 1.0 / 60.0).unwrap();

        assert_eq!(viewer.surface().physical_size(), PhysicalSize::new(1600, 1200));
        assert_eq!(viewer.pipeline().size(), PhysicalSize::new(1600, 1200));
        assert!((viewer.scene().camera().aspect - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(viewer.surface().backend().surface_resizes(), 2);
    }

    #[test]
    fn fatal_render_error_halts_driver() {
        let log = StageLog::default();
        let mut viewer = viewer(PendingLoad::resolved(Err(LoadError::LoaderGone)), &log);
        let mut driver = FrameDriver::new(NoopScheduler);
        driver.start();

        driver.tick(|| viewer.tick(&InputFrame::default(), 1.0 / 60.0)).unwrap();
        viewer
            .surface()
            .backend()
            .fail_next_present(RenderError::Surface("lost".into()));

        let err = driver
            .tick(|| viewer.tick(&InputFrame::default(), 1.0 / 60.0))
            .unwrap_err();
        assert!(matches!(err, ViewerError::Render(RenderError::Surface(_))));
        assert_eq!(driver.state(), DriverState::Halted);
        assert_eq!(
            driver.tick(|| viewer.tick(&InputFrame::default(), 1.0 / 60.0)).unwrap(),
            crate::driver::TickOutcome::Skipped
        );
    }
}
