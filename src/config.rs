use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How a loaded asset is scaled before it is shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleMode {
    /// Largest dimension of the asset maps to `target` world units.
    FitLargest { target: f32 },
    /// Same literal scale for every asset.
    Fixed { scale: f32 },
}

impl ScaleMode {
    pub fn scale_for(&self, max_dimension: f32) -> f32 {
        match *self {
            ScaleMode::FitLargest { target } => target / max_dimension,
            ScaleMode::Fixed { scale } => scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset_path: String,
    pub scale_mode: ScaleMode,
    pub camera_distance_multiplier: f32,
    /// Window widths strictly below this are compact.
    pub compact_breakpoint: u32,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    /// Used when the mount point has not been laid out yet.
    pub default_size: u32,
    pub fallback_width_fraction: f32,
    pub fallback_max_size: u32,
    pub auto_rotate_speed: f32,
    pub damping_factor: f32,
    pub ambient: LightConfig,
    pub directional: LightConfig,
    pub directional_position: [f32; 3],
}

impl ViewerConfig {
    /// Hero section: fit the largest dimension into half a world unit.
    pub fn hero() -> Self {
        Self {
            asset_path: "./scene.gltf".to_string(),
            scale_mode: ScaleMode::FitLargest { target: 0.5 },
            camera_distance_multiplier: 1.3,
            compact_breakpoint: 768,
            fov_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            default_size: 400,
            fallback_width_fraction: 0.8,
            fallback_max_size: 400,
            auto_rotate_speed: 2.0,
            damping_factor: 0.05,
            ambient: LightConfig {
                color: [1.0, 1.0, 1.0],
                intensity: 1.5,
            },
            directional: LightConfig {
                color: [1.0, 1.0, 1.0],
                intensity: 2.0,
            },
            directional_position: [2.0, 5.0, 3.0],
        }
    }

    /// Project pages: fixed 1.3 scale regardless of asset size.
    pub fn showcase() -> Self {
        Self {
            scale_mode: ScaleMode::Fixed { scale: 1.3 },
            ..Self::hero()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "hero" => Some(Self::hero()),
            "showcase" => Some(Self::showcase()),
            _ => None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_path.trim().is_empty() {
            return Err(ConfigError::Invalid("asset_path is empty".into()));
        }
        match self.scale_mode {
            ScaleMode::FitLargest { target } if !(target > 0.0) => {
                return Err(ConfigError::Invalid(format!(
                    "fit target must be positive, got {target}"
                )));
            }
            ScaleMode::Fixed { scale } if !(scale > 0.0) => {
                return Err(ConfigError::Invalid(format!(
                    "fixed scale must be positive, got {scale}"
                )));
            }
            _ => {}
        }
        if !(self.camera_distance_multiplier > 0.0) {
            return Err(ConfigError::Invalid(
                "camera_distance_multiplier must be positive".into(),
            ));
        }
        if !(self.fov_deg > 0.0 && self.fov_deg < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_deg must be in (0, 180), got {}",
                self.fov_deg
            )));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far, got {} / {}",
                self.near, self.far
            )));
        }
        if self.compact_breakpoint == 0 {
            return Err(ConfigError::Invalid("compact_breakpoint must be non-zero".into()));
        }
        if self.default_size == 0 || self.fallback_max_size == 0 {
            return Err(ConfigError::Invalid("fallback sizes must be non-zero".into()));
        }
        if !(self.fallback_width_fraction > 0.0 && self.fallback_width_fraction <= 1.0) {
            return Err(ConfigError::Invalid(
                "fallback_width_fraction must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return Err(ConfigError::Invalid("damping_factor must be in [0, 1]".into()));
        }
        Ok(())
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::hero()
    }
}
