use std::cell::RefCell;
use std::rc::Rc;

use crate::surface::PhysicalSize;

/// What the pipeline has done so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsState {
    /// Frames presented successfully.
    pub frames: u64,
    /// Stage labels in the order they ran during the last frame.
    pub last_stage_order: Vec<&'static str>,
    /// Resizes that reached the frame targets.
    pub resizes: u64,
    pub last_size: Option<PhysicalSize>,
    /// Stage labels of the most recently built pipeline.
    pub pipeline_stages: Vec<&'static str>,
    /// Pipelines built over the viewer's lifetime.
    pub pipelines_built: u32,
}

/// Shared, cheaply clonable handle to pipeline diagnostics.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    state: Rc<RefCell<DiagnosticsState>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DiagnosticsState {
        self.state.borrow().clone()
    }

    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }

    pub(crate) fn record_pipeline(&self, stages: Vec<&'static str>) {
        let mut state = self.state.borrow_mut();
        state.pipeline_stages = stages;
        state.pipelines_built += 1;
    }

    pub(crate) fn record_frame(&self, order: Vec<&'static str>) {
        let mut state = self.state.borrow_mut();
        state.frames += 1;
        state.last_stage_order = order;
    }

    pub(crate) fn record_resize(&self, size: PhysicalSize) {
        let mut state = self.state.borrow_mut();
        state.resizes += 1;
        state.last_size = Some(size);
    }
}
