//! Orbit camera controls with inertia.
//!
//! Drag with the left button to orbit around the target, drag with the right
//! or middle button to pan, scroll to dolly. With damping enabled, motion
//! continues briefly after the gesture ends and decays every frame.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::input::InputFrame;

/// Keeps the polar angle off the poles.
const POLE_EPSILON: f32 = 1e-6;

/// Damping factors are tuned per frame at this rate.
const REFERENCE_FPS: f32 = 60.0;

/// Offset from the target in spherical coordinates (Y up).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
    /// Polar angle from +Y.
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    spherical: Spherical,
    /// Pending rotation (theta, phi) still to be applied.
    rotate_delta: (f32, f32),
    pan_offset: Vec3,
    /// Pending dolly factor applied to the radius.
    scale: f32,
    pub enable_damping: bool,
    /// Fraction of pending motion applied per 60 Hz frame.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitControls {
    /// Controls orbiting `camera.target` from the camera's current position.
    pub fn new(camera: &PerspectiveCamera) -> Self {
        Self {
            target: camera.target,
            spherical: Spherical::from_offset(camera.position - camera.target),
            rotate_delta: (0.0, 0.0),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }

    /// The loft's settings: damped, slow pan, distance kept within [2, 8].
    pub fn loft(camera: &PerspectiveCamera) -> Self {
        Self::new(camera)
            .damping(0.05)
            .pan_speed(0.3)
            .distance_limits(2.0, 8.0)
    }

    pub fn damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn pan_speed(mut self, speed: f32) -> Self {
        self.pan_speed = speed;
        self
    }

    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    pub fn distance(&self) -> f32 {
        self.spherical.radius
    }

    /// Queues the gestures in `input` and advances the orbit by `dt` seconds.
    ///
    /// `viewport_height` is in the same pixels as the input deltas.
    pub fn update(
        &mut self,
        input: &InputFrame,
        dt: f32,
        camera: &PerspectiveCamera,
        viewport_height: f32,
    ) {
        let height = viewport_height.max(1.0);

        if input.rotate != glam::Vec2::ZERO {
            self.rotate_delta.0 -= TAU * input.rotate.x / height * self.rotate_speed;
            self.rotate_delta.1 -= TAU * input.rotate.y / height * self.rotate_speed;
        }

        if input.pan != glam::Vec2::ZERO {
            self.pan(input.pan * self.pan_speed, camera, height);
        }

        if input.zoom != 0.0 {
            self.scale *= 0.95f32.powf(self.zoom_speed * input.zoom);
        }

        self.advance(dt);
    }

    fn pan(&mut self, delta: glam::Vec2, camera: &PerspectiveCamera, height: f32) {
        let view_distance =
            self.spherical.radius * (camera.fov_degrees.to_radians() * 0.5).tan();
        let forward = camera.forward();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();

        self.pan_offset -= right * (2.0 * delta.x * view_distance / height);
        self.pan_offset += up * (2.0 * delta.y * view_distance / height);
    }

    fn advance(&mut self, dt: f32) {
        let step = if self.enable_damping {
            1.0 - (1.0 - self.damping_factor).powf((dt * REFERENCE_FPS).max(0.0))
        } else {
            1.0
        };

        self.spherical.theta += self.rotate_delta.0 * step;
        self.spherical.phi += self.rotate_delta.1 * step;
        self.spherical.phi = self.spherical.phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);

        self.spherical.radius =
            (self.spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.scale = 1.0;

        self.target += self.pan_offset * step;

        let remaining = 1.0 - step;
        self.rotate_delta.0 *= remaining;
        self.rotate_delta.1 *= remaining;
        self.pan_offset *= remaining;
    }

    /// Writes the orbit's position and target into `camera`.
    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    fn loft_camera() -> PerspectiveCamera {
        PerspectiveCamera::default()
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn idle_update_keeps_camera_in_place() {
        let mut camera = loft_camera();
        let mut controls = OrbitControls::loft(&camera);

        controls.update(&InputFrame::default(), 1.0 / 60.0, &camera, 600.0);
        controls.apply(&mut camera);

        assert!(approx(camera.position, Vec3::new(0.0, 0.8, 4.4)));
        assert_eq!(camera.target, Vec3::new(0.0, 1.8, -3.0));
    }

    #[test]
    fn zoom_is_clamped_to_distance_limits() {
        let mut camera = loft_camera();
        let mut controls = OrbitControls::loft(&camera);

        let zoom_in = InputFrame {
            zoom: 200.0,
            ..InputFrame::default()
        };
        controls.update(&zoom_in, 1.0 / 60.0, &camera, 600.0);
        assert_eq!(controls.distance(), 2.0);

        let zoom_out = InputFrame {
            zoom: -200.0,
            ..InputFrame::default()
        };
        controls.update(&zoom_out, 1.0 / 60.0, &camera, 600.0);
        controls.apply(&mut camera);
        assert_eq!(controls.distance(), 8.0);
        assert!(((camera.position - camera.target).length() - 8.0).abs() < 1e-4);
    }

    #[test]
    fn damped_rotation_settles_on_full_gesture() {
        let camera = loft_camera();
        let mut damped = OrbitControls::loft(&camera);
        let mut direct = OrbitControls::new(&camera);

        let drag = InputFrame {
            rotate: Vec2::new(30.0, 0.0),
            ..InputFrame::default()
        };
        damped.update(&drag, 1.0 / 60.0, &camera, 600.0);
        direct.update(&drag, 1.0 / 60.0, &camera, 600.0);

        let first_step = damped.spherical.theta;
        assert!(first_step.abs() < direct.spherical.theta.abs());

        for _ in 0..600 {
            damped.update(&InputFrame::default(), 1.0 / 60.0, &camera, 600.0);
        }
        assert!((damped.spherical.theta - direct.spherical.theta).abs() < 1e-3);
    }

    #[test]
    fn pan_moves_target_and_position_together() {
        let mut camera = loft_camera();
        let mut controls = OrbitControls::new(&camera).pan_speed(0.3);
        let offset_before = camera.position - camera.target;

        let drag = InputFrame {
            pan: Vec2::new(100.0, 0.0),
            ..InputFrame::default()
        };
        controls.update(&drag, 1.0 / 60.0, &camera, 600.0);
        controls.apply(&mut camera);

        assert!(camera.target.x < 0.0, "dragging right pans the scene right");
        assert!(approx(camera.position - camera.target, offset_before));
    }
}
