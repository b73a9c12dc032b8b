//! Render preparation settings
//!
//! Loaded once at startup (TOML or RON) and shared read-only by the frame
//! pipeline, the layer preparer and the resource pool.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::render::api::Filter;
use crate::render::resources::pool::PixelFormat;

/// Resource pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Filter applied to textures handed out by the pool
    pub default_filter: Filter,
    /// Drop free variable-size resources when the pipeline shuts down
    pub trim_on_shutdown: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_filter: Filter::Linear,
            trim_on_shutdown: true,
        }
    }
}

/// Shadow map settings shared by every layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Storage format of shadow depth maps
    pub depth_format: PixelFormat,
    /// Disable shadow map allocation entirely
    pub enabled: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            depth_format: PixelFormat::R16F,
            enabled: true,
        }
    }
}

/// Top-level render preparation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Lights beyond this count are dropped from a layer's light list
    pub max_lights_per_layer: usize,
    /// Effective opacity below which a renderable is completely transparent
    pub completely_transparent_threshold: f32,
    /// Stable-sort the opaque list front-to-back
    pub sort_opaque_front_to_back: bool,
    /// Resource pool settings
    pub pool: PoolConfig,
    /// Shadow map settings
    pub shadows: ShadowConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            max_lights_per_layer: 15,
            completely_transparent_threshold: 0.01,
            sort_opaque_front_to_back: true,
            pool: PoolConfig::default(),
            shadows: ShadowConfig::default(),
        }
    }
}

impl PrepConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.completely_transparent_threshold) {
            return Err(ConfigError::Invalid {
                field: "completely_transparent_threshold",
                reason: format!("{} is not in [0, 1)", self.completely_transparent_threshold),
            });
        }
        if !self.shadows.depth_format.is_depth() && !matches!(
            self.shadows.depth_format,
            PixelFormat::R16F | PixelFormat::R32F
        ) {
            return Err(ConfigError::Invalid {
                field: "shadows.depth_format",
                reason: format!("{:?} cannot store shadow depth", self.shadows.depth_format),
            });
        }
        Ok(())
    }
}

impl Config for PrepConfig {}
