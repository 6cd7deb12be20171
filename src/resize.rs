use thiserror::Error;

use crate::backend::Backend;
use crate::camera::PerspectiveCamera;
use crate::pipeline::EffectPipeline;
use crate::surface::{RenderSurface, ViewportSize};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResizeError {
    #[error("viewport {width}x{height} @{pixel_density}x cannot be rendered")]
    InvalidViewport {
        width: f32,
        height: f32,
        pixel_density: f32,
    },
}

/// Coalesces viewport changes and applies the latest one at a tick boundary.
#[derive(Debug, Default)]
pub struct ViewportResizeHandler {
    pending: Option<ViewportSize>,
    coalesced: u32,
}

impl ViewportResizeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a viewport change. Only the latest size before the next tick
    /// is applied.
    pub fn on_resize(&mut self, viewport: ViewportSize) {
        if self.pending.replace(viewport).is_some() {
            self.coalesced += 1;
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take_pending(&mut self) -> Option<ViewportSize> {
        if self.coalesced > 0 {
            log::trace!("coalesced {} viewport changes", self.coalesced);
            self.coalesced = 0;
        }
        self.pending.take()
    }

    /// Brings camera, surface and pipeline to `viewport`, in that order.
    ///
    /// Empty or non-finite sizes are rejected without touching anything.
    pub fn apply<B: Backend>(
        viewport: ViewportSize,
        camera: &mut PerspectiveCamera,
        surface: &mut RenderSurface<B>,
        pipeline: &mut EffectPipeline<B>,
    ) -> Result<(), ResizeError> {
        if !viewport.is_valid() {
            return Err(ResizeError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
                pixel_density: viewport.pixel_density,
            });
        }

        camera.set_aspect(viewport.aspect());
        surface.resize(viewport);
        pipeline.resize(surface.backend(), surface.physical_size());

        log::debug!(
            "viewport {}x{} @{}x applied",
            viewport.width,
            viewport.height,
            viewport.pixel_density
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Diagnostics, PipelineConfig};
    use crate::surface::{PhysicalSize, SurfaceOptions};
    use crate::test_support::{StageLog, TraceStage, RecordingBackend};

    fn setup() -> (
        PerspectiveCamera,
        RenderSurface<RecordingBackend>,
        EffectPipeline<RecordingBackend>,
        StageLog,
    ) {
        let viewport = ViewportSize::new(800.0, 600.0, 1.0);
        let surface = RenderSurface::configure(
            RecordingBackend::new(),
            SurfaceOptions::default(),
            viewport,
        );
        let log = StageLog::default();
        let pipeline = EffectPipeline::new(
            surface.backend(),
            surface.physical_size(),
            vec![TraceStage::scene("scene", &log)],
            PipelineConfig::default().shared(),
            Diagnostics::new(),
        )
        .unwrap();
        (PerspectiveCamera::for_viewport(viewport), surface, pipeline, log)
    }

    #[test]
    fn resize_updates_aspect_surface_and_targets() {
        let (mut camera, mut surface, mut pipeline, log) = setup();

        ViewportResizeHandler::apply(
            ViewportSize::new(1600.0, 1200.0, 1.0),
            &mut camera,
            &mut surface,
            &mut pipeline,
        )
        .unwrap();

        assert!((camera.aspect - 1.3333334).abs() < 1e-6);
        assert_eq!(surface.physical_size(), PhysicalSize::new(1600, 1200));
        assert_eq!(pipeline.size(), PhysicalSize::new(1600, 1200));
        assert_eq!(log.resizes().last(), Some(&("scene", PhysicalSize::new(1600, 1200))));
    }

    #[test]
    fn pixel_density_scales_targets_not_aspect() {
        let (mut camera, mut surface, mut pipeline, _) = setup();

        ViewportResizeHandler::apply(
            ViewportSize::new(800.0, 600.0, 2.0),
            &mut camera,
            &mut surface,
            &mut pipeline,
        )
        .unwrap();

        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(pipeline.size(), PhysicalSize::new(1600, 1200));
    }

    #[test]
    fn zero_size_is_rejected_untouched() {
        let (mut camera, mut surface, mut pipeline, log) = setup();
        let before = camera;

        let err = ViewportResizeHandler::apply(
            ViewportSize::new(0.0, 600.0, 1.0),
            &mut camera,
            &mut surface,
            &mut pipeline,
        );

        assert!(matches!(err, Err(ResizeError::InvalidViewport { .. })));
        assert_eq!(camera, before);
        assert_eq!(pipeline.size(), PhysicalSize::new(800, 600));
        assert_eq!(log.resizes().len(), 1);
    }

    #[test]
    fn bursts_coalesce_to_latest() {
        let mut handler = ViewportResizeHandler::new();
        assert!(!handler.has_pending());
        handler.on_resize(ViewportSize::new(900.0, 600.0, 1.0));
        handler.on_resize(ViewportSize::new(1000.0, 600.0, 1.0));
        handler.on_resize(ViewportSize::new(1100.0, 600.0, 1.0));
        assert!(handler.has_pending());

        assert_eq!(handler.take_pending(), Some(ViewportSize::new(1100.0, 600.0, 1.0)));
        assert_eq!(handler.take_pending(), None);
        assert!(!handler.has_pending());
    }

    #[test]
    fn narrow_fov_is_not_reapplied_on_resize() {
        let (mut camera, mut surface, mut pipeline, _) = setup();

        ViewportResizeHandler::apply(
            ViewportSize::new(400.0, 800.0, 1.0),
            &mut camera,
            &mut surface,
            &mut pipeline,
        )
        .unwrap();

        assert_eq!(camera.fov_degrees, 55.0);
        assert_eq!(camera.aspect, 0.5);
    }
}
