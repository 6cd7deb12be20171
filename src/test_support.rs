//! Headless doubles for exercising the pipeline without a GPU.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Backend, TargetDesc};
use crate::pipeline::{
    BufferSet, EffectChain, RenderError, Stage, StageContext, StageDescriptor,
};
use crate::stages::{BloomStage, FxaaStage, ScenePass, SsrStage, VignetteStage};
use crate::surface::{PhysicalSize, SurfaceOptions};
use crate::viewer::StageFactory;

#[derive(Clone, Debug, PartialEq)]
pub struct TestTarget {
    pub id: u32,
    pub desc: TargetDesc,
}

#[derive(Debug)]
pub struct TestFrame {
    pub index: u64,
}

#[derive(Debug, Default)]
struct BackendLog {
    configure_calls: u32,
    surface_size: PhysicalSize,
    surface_resizes: u32,
    targets: Vec<TargetDesc>,
    frames_begun: u64,
    presented: Vec<u32>,
    fail_present: Option<RenderError>,
}

/// A backend that records every call and allocates nothing.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: RefCell<BackendLog>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure_calls(&self) -> u32 {
        self.log.borrow().configure_calls
    }

    pub fn surface_size(&self) -> PhysicalSize {
        self.log.borrow().surface_size
    }

    pub fn surface_resizes(&self) -> u32 {
        self.log.borrow().surface_resizes
    }

    pub fn targets_created(&self) -> usize {
        self.log.borrow().targets.len()
    }

    pub fn presented(&self) -> usize {
        self.log.borrow().presented.len()
    }

    pub fn last_presented(&self) -> Option<u32> {
        self.log.borrow().presented.last().copied()
    }

    /// Makes the next `present` fail with `err`.
    pub fn fail_next_present(&self, err: RenderError) {
        self.log.borrow_mut().fail_present = Some(err);
    }
}

impl Backend for RecordingBackend {
    type Target = TestTarget;
    type Frame = TestFrame;

    fn configure(&mut self, _options: &SurfaceOptions) {
        self.log.get_mut().configure_calls += 1;
    }

    fn resize_surface(&mut self, size: PhysicalSize) {
        let log = self.log.get_mut();
        log.surface_size = size;
        log.surface_resizes += 1;
    }

    fn create_target(&self, desc: &TargetDesc) -> TestTarget {
        let mut log = self.log.borrow_mut();
        log.targets.push(*desc);
        TestTarget {
            id: log.targets.len() as u32,
            desc: *desc,
        }
    }

    fn begin_frame(&self) -> Result<TestFrame, RenderError> {
        let mut log = self.log.borrow_mut();
        log.frames_begun += 1;
        Ok(TestFrame {
            index: log.frames_begun,
        })
    }

    fn present(&self, _frame: TestFrame, color: &TestTarget) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if let Some(err) = log.fail_present.take() {
            return Err(err);
        }
        log.presented.push(color.id);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StageLogState {
    rendered: Vec<&'static str>,
    resizes: Vec<(&'static str, PhysicalSize)>,
    color_io: Vec<(Option<u32>, u32)>,
    ssr_intensity: Vec<f32>,
}

/// What trace stages observed, shared between the stages and the test.
#[derive(Clone, Debug, Default)]
pub struct StageLog(Rc<RefCell<StageLogState>>);

impl StageLog {
    /// Labels of rendered stages, across all frames.
    pub fn rendered(&self) -> Vec<&'static str> {
        self.0.borrow().rendered.clone()
    }

    pub fn resizes(&self) -> Vec<(&'static str, PhysicalSize)> {
        self.0.borrow().resizes.clone()
    }

    /// `(color_in, color_out)` target ids per rendered stage.
    pub fn color_io(&self) -> Vec<(Option<u32>, u32)> {
        self.0.borrow().color_io.clone()
    }

    /// `ssr.intensity` as seen by the stage labelled "ssr", once per frame.
    pub fn ssr_intensity_seen(&self) -> Vec<f32> {
        self.0.borrow().ssr_intensity.clone()
    }
}

/// A stage that records what the pipeline hands it.
pub struct TraceStage {
    descriptor: StageDescriptor,
    log: StageLog,
    fail: bool,
}

impl TraceStage {
    pub fn with_descriptor(
        descriptor: StageDescriptor,
        log: &StageLog,
    ) -> Box<dyn Stage<RecordingBackend>> {
        Box::new(Self {
            descriptor,
            log: log.clone(),
            fail: false,
        })
    }

    pub fn scene(label: &'static str, log: &StageLog) -> Box<dyn Stage<RecordingBackend>> {
        Self::with_descriptor(StageDescriptor::scene(label), log)
    }

    pub fn effect(
        label: &'static str,
        reads: BufferSet,
        log: &StageLog,
    ) -> Box<dyn Stage<RecordingBackend>> {
        Self::with_descriptor(StageDescriptor::effect(label, reads), log)
    }

    pub fn failing(
        label: &'static str,
        reads: BufferSet,
        log: &StageLog,
    ) -> Box<dyn Stage<RecordingBackend>> {
        Box::new(Self {
            descriptor: StageDescriptor::effect(label, reads),
            log: log.clone(),
            fail: true,
        })
    }
}

impl Stage<RecordingBackend> for TraceStage {
    fn descriptor(&self) -> StageDescriptor {
        self.descriptor
    }

    fn resize(&mut self, _backend: &RecordingBackend, size: PhysicalSize) {
        self.log
            .0
            .borrow_mut()
            .resizes
            .push((self.descriptor.label, size));
    }

    fn render(&mut self, ctx: &mut StageContext<'_, RecordingBackend>) -> Result<(), RenderError> {
        if self.fail {
            return Err(RenderError::Stage {
                stage: self.descriptor.label,
                reason: "injected failure".into(),
            });
        }

        let mut log = self.log.0.borrow_mut();
        log.rendered.push(self.descriptor.label);
        log.color_io
            .push((ctx.io.color_in.map(|t| t.id), ctx.io.color_out.id));
        if self.descriptor.label == "ssr" {
            log.ssr_intensity.push(ctx.config.ssr.intensity);
        }
        Ok(())
    }
}

/// Builds trace stages carrying the real stages' descriptors.
pub struct TraceFactory {
    log: StageLog,
}

impl TraceFactory {
    pub fn new(log: &StageLog) -> Self {
        Self { log: log.clone() }
    }
}

impl StageFactory<RecordingBackend> for TraceFactory {
    fn base(&self, _backend: &RecordingBackend) -> Vec<Box<dyn Stage<RecordingBackend>>> {
        vec![TraceStage::with_descriptor(ScenePass::DESCRIPTOR, &self.log)]
    }

    fn full(
        &self,
        backend: &RecordingBackend,
        chain: EffectChain,
    ) -> Vec<Box<dyn Stage<RecordingBackend>>> {
        let mut stages = self.base(backend);
        let effects = [
            (chain.ssr, SsrStage::DESCRIPTOR),
            (chain.bloom.is_some(), BloomStage::DESCRIPTOR),
            (chain.vignette, VignetteStage::DESCRIPTOR),
            (chain.fxaa, FxaaStage::DESCRIPTOR),
        ];
        for (enabled, descriptor) in effects {
            if enabled {
                stages.push(TraceStage::with_descriptor(descriptor, &self.log));
            }
        }
        stages
    }
}
