//! Light definitions for scene illumination
//!
//! Lights are attached to scene nodes; position and direction come from the
//! node's world transform. A light may be scoped to a subtree of the scene, in
//! which case it only illuminates nodes inside that subtree.

use crate::foundation::collections::NodeId;
use crate::foundation::math::{utils, Mat4, Vec3};

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
}

/// Shadow map resolution preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowMapQuality {
    /// 256 x 256
    Low,
    /// 512 x 512
    #[default]
    Medium,
    /// 1024 x 1024
    High,
    /// 2048 x 2048
    VeryHigh,
}

impl ShadowMapQuality {
    /// Edge length of the square shadow map in pixels
    pub fn resolution(self) -> u32 {
        match self {
            ShadowMapQuality::Low => 256,
            ShadowMapQuality::Medium => 512,
            ShadowMapQuality::High => 1024,
            ShadowMapQuality::VeryHigh => 2048,
        }
    }
}

/// Shadow filtering parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowFilter {
    /// Blur radius applied when sampling the shadow map
    pub softness: f32,
    /// Depth bias against self-shadowing
    pub bias: f32,
    /// Far plane of the shadow projection
    pub map_far: f32,
}

impl Default for ShadowFilter {
    fn default() -> Self {
        Self {
            softness: 35.0,
            bias: 0.0,
            map_far: 5000.0,
        }
    }
}

/// Shadow casting settings of a light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShadowSettings {
    /// Whether the light casts shadows
    pub casts_shadow: bool,
    /// Shadow map resolution
    pub quality: ShadowMapQuality,
    /// Filtering parameters
    pub filter: ShadowFilter,
}

/// Light source attached to a scene node
#[derive(Debug, Clone)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub brightness: f32,
    /// Subtree this light is restricted to; `None` lights the whole layer
    pub scope: Option<NodeId>,
    /// Shadow settings
    pub shadow: ShadowSettings,
}

impl Light {
    /// Create a directional light
    pub fn directional(color: Vec3, brightness: f32) -> Self {
        Self::new(LightType::Directional, color, brightness)
    }

    /// Create a point light
    pub fn point(color: Vec3, brightness: f32) -> Self {
        Self::new(LightType::Point, color, brightness)
    }

    /// Create a spot light
    pub fn spot(color: Vec3, brightness: f32) -> Self {
        Self::new(LightType::Spot, color, brightness)
    }

    fn new(light_type: LightType, color: Vec3, brightness: f32) -> Self {
        Self {
            light_type,
            color,
            brightness,
            scope: None,
            shadow: ShadowSettings::default(),
        }
    }

    /// Restrict the light to a subtree
    pub fn scoped_to(mut self, scope: NodeId) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Enable shadow casting at the given quality
    pub fn with_shadows(mut self, quality: ShadowMapQuality) -> Self {
        self.shadow.casts_shadow = true;
        self.shadow.quality = quality;
        self
    }

    /// Whether the shadow of this light needs an omnidirectional cube map
    pub fn uses_cube_shadow(&self) -> bool {
        self.light_type == LightType::Point
    }
}

/// Light state computed for one layer in one frame
#[derive(Debug, Clone)]
pub struct ResolvedLight {
    /// Node carrying the light
    pub node: NodeId,
    /// Fixed index of the light in the layer's light list for this frame
    pub index: usize,
    /// Light parameters
    pub light: Light,
    /// World-space position
    pub position: Vec3,
    /// Normalized world-space direction (-Z of the node)
    pub direction: Vec3,
    /// Whether the light is restricted to a subtree of the layer
    pub scoped: bool,
}

impl ResolvedLight {
    /// Resolve a light against its node's world transform
    pub fn new(node: NodeId, index: usize, light: &Light, world_transform: &Mat4, scoped: bool) -> Self {
        let direction = world_transform
            .transform_vector(&Vec3::new(0.0, 0.0, -1.0))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0));
        Self {
            node,
            index,
            light: light.clone(),
            position: utils::translation_of(world_transform),
            direction,
            scoped,
        }
    }
}
