use glam::Vec3;

/// How a surface is lit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shading {
    /// Metallic-roughness PBR.
    #[default]
    Physical,
    /// Outputs `color` unlit (light bulbs).
    Unlit,
}

/// Surface appearance. Colors are linear RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Name as authored in the model file; material rules match against it.
    pub name: String,
    pub color: Vec3,
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub ior: f32,
    pub iridescence_ior: f32,
    pub thickness: f32,
    pub shading: Shading,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec3::ONE,
            roughness: 1.0,
            metalness: 0.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            opacity: 1.0,
            transparent: false,
            ior: 1.5,
            iridescence_ior: 1.3,
            thickness: 0.0,
            shading: Shading::Physical,
        }
    }
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn unlit(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            color,
            shading: Shading::Unlit,
            ..Self::default()
        }
    }

    /// Emitted radiance (`emissive * emissive_intensity`).
    pub fn emission(&self) -> Vec3 {
        self.emissive * self.emissive_intensity
    }

    /// Whether the surface is drawn in the blended pass.
    pub fn is_blended(&self) -> bool {
        self.transparent && self.opacity < 1.0
    }
}

/// Converts an sRGB `0xRRGGBB` color to linear RGB.
pub fn hex_to_linear(hex: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
