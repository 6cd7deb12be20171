use glam::{Mat4, Vec3};

use crate::surface::ViewportSize;

/// Viewports at or below this logical width use the wide field of view.
pub const NARROW_VIEWPORT_WIDTH: f32 = 500.0;

/// A perspective camera looking at a target point.
///
/// `aspect` follows the viewport (`width / height`) and is the only field the
/// resize handler touches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.8, 4.4),
            target: Vec3::new(0.0, 1.8, -3.0),
            up: Vec3::Y,
            fov_degrees: 55.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    /// The loft's startup camera for a viewport.
    ///
    /// Narrow viewports get an 85° field of view, everything else 55°.
    pub fn for_viewport(viewport: ViewportSize) -> Self {
        let fov_degrees = if viewport.width <= NARROW_VIEWPORT_WIDTH {
            85.0
        } else {
            55.0
        };

        Self {
            fov_degrees,
            aspect: viewport.aspect(),
            ..Self::default()
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn matrices(&self) -> CameraMatrices {
        let view = self.view_matrix();
        let projection = self.projection_matrix();
        CameraMatrices {
            view,
            projection,
            view_proj: projection * view,
            position: self.position,
            near: self.near,
            far: self.far,
        }
    }
}

/// Matrices derived from a camera for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_camera_matches_loft_framing() {
        let camera = PerspectiveCamera::for_viewport(ViewportSize::new(800.0, 600.0, 1.0));

        assert_eq!(camera.position, Vec3::new(0.0, 0.8, 4.4));
        assert_eq!(camera.target, Vec3::new(0.0, 1.8, -3.0));
        assert_eq!(camera.fov_degrees, 55.0);
        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn narrow_viewport_widens_fov() {
        let camera = PerspectiveCamera::for_viewport(ViewportSize::new(500.0, 800.0, 3.0));
        assert_eq!(camera.fov_degrees, 85.0);
    }

    #[test]
    fn invalid_aspect_is_ignored() {
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(f32::INFINITY);
        camera.set_aspect(0.0);
        assert_eq!(camera.aspect, 1.0);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = PerspectiveCamera::for_viewport(ViewportSize::new(1280.0, 720.0, 1.0));
        let clip = camera.matrices().view_proj * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;

        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
    }
}
