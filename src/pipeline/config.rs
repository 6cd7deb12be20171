//! Runtime tunables shared by every effect stage.
//!
//! Values are plain typed fields, and every field is also reachable by its
//! dotted name (`"ssr.intensity"`) for debug bindings and logging.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Handle to the configuration shared between the host and the pipeline.
pub type SharedConfig = Rc<RefCell<PipelineConfig>>;

/// Screen-space reflection settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SsrSettings {
    /// Trace resolution relative to the frame.
    pub resolution_scale: f32,
    pub correction_radius: f32,
    /// Weight of the history sample during temporal resolve.
    pub blend: f32,
    pub correction: f32,
    pub blur: f32,
    pub blur_sharpness: f32,
    pub blur_kernel: f32,
    /// Maximum ray length in view-space units.
    pub distance: f32,
    pub intensity: f32,
    pub exponent: f32,
    pub max_roughness: f32,
    pub jitter: f32,
    pub jitter_roughness: f32,
    pub roughness_fade: f32,
    pub fade: f32,
    pub thickness: f32,
    pub ior: f32,
    pub steps: u32,
    pub refine_steps: u32,
    pub max_depth_difference: f32,
    /// Keep the last sampled color when a ray leaves the screen.
    pub missed_rays: bool,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            resolution_scale: 1.0,
            correction_radius: 1.1,
            blend: 0.95,
            correction: 0.5,
            blur: 1.0,
            blur_sharpness: 20.0,
            blur_kernel: 0.2,
            distance: 20.0,
            intensity: 2.0,
            exponent: 1.25,
            max_roughness: 0.99,
            jitter: 0.0,
            jitter_roughness: 2.0,
            roughness_fade: 1.0,
            fade: 0.0,
            thickness: 8.0,
            ior: 2.0,
            steps: 8,
            refine_steps: 6,
            max_depth_difference: 150.0,
            missed_rays: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BloomSettings {
    pub intensity: f32,
    pub luminance_threshold: f32,
    pub luminance_smoothing: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            intensity: 2.0,
            luminance_threshold: 0.7,
            luminance_smoothing: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VignetteSettings {
    pub darkness: f32,
    pub offset: f32,
}

impl Default for VignetteSettings {
    fn default() -> Self {
        Self {
            darkness: 0.3,
            offset: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FxaaSettings {
    pub edge_threshold: f32,
    pub edge_threshold_min: f32,
    pub subpixel: f32,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self {
            edge_threshold: 0.166,
            edge_threshold_min: 0.0833,
            subpixel: 0.75,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    pub ssr: SsrSettings,
    pub bloom: BloomSettings,
    pub vignette: VignetteSettings,
    pub fxaa: FxaaSettings,
}

/// A single tunable value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tunable {
    Float(f32),
    Int(u32),
    Bool(bool),
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tunable::Float(v) => write!(f, "{v}"),
            Tunable::Int(v) => write!(f, "{v}"),
            Tunable::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<f32> for Tunable {
    fn from(value: f32) -> Self {
        Tunable::Float(value)
    }
}

impl From<u32> for Tunable {
    fn from(value: u32) -> Self {
        Tunable::Int(value)
    }
}

impl From<bool> for Tunable {
    fn from(value: bool) -> Self {
        Tunable::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown tunable `{0}`")]
    UnknownKey(String),
    #[error("tunable `{key}` expects {expected}, got {got:?}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        got: Tunable,
    },
    #[error("tunable `{key}` must be finite and non-negative, got {value}")]
    OutOfRange { key: String, value: f32 },
}

trait FromTunable: Sized {
    fn from_tunable(key: &str, value: Tunable) -> Result<Self, ConfigError>;
}

impl FromTunable for f32 {
    fn from_tunable(key: &str, value: Tunable) -> Result<Self, ConfigError> {
        match value {
            Tunable::Float(v) if v.is_finite() && v >= 0.0 => Ok(v),
            Tunable::Float(v) => Err(ConfigError::OutOfRange {
                key: key.to_string(),
                value: v,
            }),
            got => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "a float",
                got,
            }),
        }
    }
}

impl FromTunable for u32 {
    fn from_tunable(key: &str, value: Tunable) -> Result<Self, ConfigError> {
        match value {
            Tunable::Int(v) => Ok(v),
            got => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "an integer",
                got,
            }),
        }
    }
}

impl FromTunable for bool {
    fn from_tunable(key: &str, value: Tunable) -> Result<Self, ConfigError> {
        match value {
            Tunable::Bool(v) => Ok(v),
            got => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "a bool",
                got,
            }),
        }
    }
}

macro_rules! tunables {
    ($($group:ident . $field:ident),* $(,)?) => {
        impl PipelineConfig {
            /// Every tunable name, in declaration order.
            pub const KEYS: &'static [&'static str] = &[
                $(concat!(stringify!($group), ".", stringify!($field))),*
            ];

            pub fn get(&self, key: &str) -> Result<Tunable, ConfigError> {
                match key {
                    $(concat!(stringify!($group), ".", stringify!($field)) => {
                        Ok(Tunable::from(self.$group.$field))
                    })*
                    _ => Err(ConfigError::UnknownKey(key.to_string())),
                }
            }

            /// Sets a tunable by name. The value's type must match the field.
            pub fn set(&mut self, key: &str, value: Tunable) -> Result<(), ConfigError> {
                match key {
                    $(concat!(stringify!($group), ".", stringify!($field)) => {
                        self.$group.$field = FromTunable::from_tunable(key, value)?;
                        Ok(())
                    })*
                    _ => Err(ConfigError::UnknownKey(key.to_string())),
                }
            }
        }
    };
}

tunables! {
    ssr.resolution_scale,
    ssr.correction_radius,
    ssr.blend,
    ssr.correction,
    ssr.blur,
    ssr.blur_sharpness,
    ssr.blur_kernel,
    ssr.distance,
    ssr.intensity,
    ssr.exponent,
    ssr.max_roughness,
    ssr.jitter,
    ssr.jitter_roughness,
    ssr.roughness_fade,
    ssr.fade,
    ssr.thickness,
    ssr.ior,
    ssr.steps,
    ssr.refine_steps,
    ssr.max_depth_difference,
    ssr.missed_rays,
    bloom.intensity,
    bloom.luminance_threshold,
    bloom.luminance_smoothing,
    vignette.darkness,
    vignette.offset,
    fxaa.edge_threshold,
    fxaa.edge_threshold_min,
    fxaa.subpixel,
}

impl PipelineConfig {
    pub fn shared(self) -> SharedConfig {
        Rc::new(RefCell::new(self))
    }

    /// Adds `delta` to a float tunable, clamping at zero. Returns the new value.
    pub fn nudge(&mut self, key: &str, delta: f32) -> Result<f32, ConfigError> {
        match self.get(key)? {
            Tunable::Float(current) => {
                let next = (current + delta).max(0.0);
                self.set(key, Tunable::Float(next))?;
                Ok(next)
            }
            got => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "a float",
                got,
            }),
        }
    }

    /// Every tunable with its current value.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, Tunable)> + '_ {
        Self::KEYS
            .iter()
            .filter_map(move |key| self.get(key).ok().map(|value| (*key, value)))
    }
}

/// Mip levels used by the bloom blur.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelSize {
    VerySmall,
    Small,
    Medium,
    Large,
    VeryLarge,
    #[default]
    Huge,
}

impl KernelSize {
    pub fn levels(self) -> u32 {
        match self {
            KernelSize::VerySmall => 1,
            KernelSize::Small => 2,
            KernelSize::Medium => 3,
            KernelSize::Large => 4,
            KernelSize::VeryLarge => 5,
            KernelSize::Huge => 6,
        }
    }
}

/// Which effects the full pipeline contains. Decided once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectChain {
    pub ssr: bool,
    /// Bloom with the given blur kernel, or no bloom.
    pub bloom: Option<KernelSize>,
    pub vignette: bool,
    pub fxaa: bool,
}

impl Default for EffectChain {
    fn default() -> Self {
        Self {
            ssr: true,
            bloom: Some(KernelSize::Huge),
            vignette: true,
            fxaa: true,
        }
    }
}

impl EffectChain {
    /// Scene pass only.
    pub const fn none() -> Self {
        Self {
            ssr: false,
            bloom: None,
            vignette: false,
            fxaa: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_loft_tuning() {
        let config = PipelineConfig::default();

        assert_eq!(config.get("ssr.intensity"), Ok(Tunable::Float(2.0)));
        assert_eq!(config.get("ssr.steps"), Ok(Tunable::Int(8)));
        assert_eq!(config.get("ssr.refine_steps"), Ok(Tunable::Int(6)));
        assert_eq!(config.get("ssr.missed_rays"), Ok(Tunable::Bool(false)));
        assert_eq!(config.get("ssr.fade"), Ok(Tunable::Float(0.0)));
        assert_eq!(config.get("bloom.luminance_threshold"), Ok(Tunable::Float(0.7)));
        assert_eq!(config.get("vignette.darkness"), Ok(Tunable::Float(0.3)));
    }

    #[test]
    fn set_by_name_updates_typed_field() {
        let mut config = PipelineConfig::default();
        config.set("ssr.intensity", Tunable::Float(3.5)).unwrap();
        config.set("ssr.steps", Tunable::Int(16)).unwrap();
        config.set("ssr.missed_rays", Tunable::Bool(true)).unwrap();

        assert_eq!(config.ssr.intensity, 3.5);
        assert_eq!(config.ssr.steps, 16);
        assert!(config.ssr.missed_rays);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut config = PipelineConfig::default();
        assert_eq!(
            config.set("ssr.brightness", Tunable::Float(1.0)),
            Err(ConfigError::UnknownKey("ssr.brightness".into()))
        );
        assert!(config.get("taa.blend").is_err());
    }

    #[test]
    fn wrong_type_leaves_value_untouched() {
        let mut config = PipelineConfig::default();
        let err = config.set("ssr.steps", Tunable::Float(4.0)).unwrap_err();

        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
        assert_eq!(config.ssr.steps, 8);
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let mut config = PipelineConfig::default();
        assert!(config.set("bloom.intensity", Tunable::Float(f32::NAN)).is_err());
        assert!(config.set("bloom.intensity", Tunable::Float(-1.0)).is_err());
        assert_eq!(config.bloom.intensity, 2.0);
    }

    #[test]
    fn nudge_clamps_at_zero() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.nudge("vignette.darkness", -1.0), Ok(0.0));
        assert_eq!(config.nudge("vignette.darkness", 0.25), Ok(0.25));
        assert!(config.nudge("ssr.steps", 1.0).is_err());
    }

    #[test]
    fn every_key_resolves() {
        let config = PipelineConfig::default();
        assert_eq!(config.entries().count(), PipelineConfig::KEYS.len());
    }

    #[test]
    fn huge_kernel_uses_six_levels() {
        assert_eq!(KernelSize::Huge.levels(), 6);
        assert_eq!(EffectChain::default().bloom, Some(KernelSize::Huge));
    }
}
