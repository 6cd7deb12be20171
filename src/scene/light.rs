use glam::Vec3;

use super::material::hex_to_linear;

/// Shadow settings carried by a shadow-casting light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    /// Outer cone half-angle in radians.
    pub angle: f32,
    /// Fraction of the cone that fades out, 0..=1.
    pub penumbra: f32,
    pub decay: f32,
    /// Range cutoff; zero means unlimited.
    pub distance: f32,
    pub shadow: Option<ShadowSettings>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub decay: f32,
    /// Range cutoff; zero means unlimited.
    pub distance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Ambient { color: Vec3, intensity: f32 },
    Spot(SpotLight),
    Point(PointLight),
}

impl Light {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Light::Ambient {
            color: hex_to_linear(hex),
            intensity,
        }
    }

    pub fn point(hex: u32, intensity: f32, distance: f32, position: Vec3) -> Self {
        Light::Point(PointLight {
            color: hex_to_linear(hex),
            intensity,
            position,
            decay: 2.0,
            distance,
        })
    }
}

/// Lighting of the loft scene.
pub const LOFT_POINT_LIGHTS: [Vec3; 2] = [Vec3::new(-1.13, 2.18, -0.8), Vec3::new(-1.75, 3.0, -0.8)];

/// Radius of the unlit bulb drawn at each point light.
pub const BULB_RADIUS: f32 = 0.09;

pub fn loft_spot() -> Light {
    Light::Spot(SpotLight {
        color: hex_to_linear(0xddc9cd),
        intensity: 5.0,
        position: Vec3::new(4.0, 5.0, -5.0),
        target: Vec3::ZERO,
        angle: 0.3,
        penumbra: 1.0,
        decay: 2.0,
        distance: 12.0,
        shadow: Some(ShadowSettings {
            map_size: 512,
            near: 10.0,
            far: 200.0,
        }),
    })
}

pub fn loft_lights() -> Vec<Light> {
    let mut lights = vec![Light::ambient(0xffffff, 0.3), loft_spot()];
    lights.extend(
        LOFT_POINT_LIGHTS
            .iter()
            .map(|&position| Light::point(0xffe3ac, 0.1, 2.0, position)),
    );
    lights
}
