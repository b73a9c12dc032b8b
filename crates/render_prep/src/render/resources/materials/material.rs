//! Material type definitions and enums
//!
//! Materials come in three flavors: the built-in default (lit, parameter
//! driven) material, custom shader materials that declare their own blending
//! requirements, and reference materials that alias another material's
//! property set.

use crate::foundation::collections::{ImageId, MaterialId};
use crate::foundation::math::Vec3;

/// Blending equation used when compositing a surface or a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Standard source-over alpha compositing
    #[default]
    Normal,
    /// Screen blending
    Screen,
    /// Multiply blending
    Multiply,
    /// Overlay blending
    Overlay,
    /// Color burn
    ColorBurn,
    /// Color dodge
    ColorDodge,
}

/// Parameters of the built-in material
#[derive(Debug, Clone)]
pub struct DefaultMaterial {
    /// Base diffuse color
    pub diffuse_color: Vec3,
    /// Material opacity in [0, 1]
    pub opacity: f32,
    /// Blend mode against what is already drawn
    pub blend_mode: BlendMode,
    /// Diffuse texture
    pub diffuse_map: Option<ImageId>,
    /// Opacity texture; any bound opacity map makes the surface blended
    pub opacity_map: Option<ImageId>,
    /// Normal map
    pub normal_map: Option<ImageId>,
}

impl Default for DefaultMaterial {
    fn default() -> Self {
        Self {
            diffuse_color: Vec3::new(1.0, 1.0, 1.0),
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            diffuse_map: None,
            opacity_map: None,
            normal_map: None,
        }
    }
}

/// Custom shader material; declares its own pass requirements
#[derive(Debug, Clone)]
pub struct CustomMaterial {
    /// Shader writes non-opaque alpha
    pub has_transparency: bool,
    /// Shader refracts what is behind the surface
    pub has_refraction: bool,
    /// Shader samples the layer's color buffer
    pub uses_screen_texture: bool,
    /// Shader samples the layer's depth buffer
    pub uses_depth_texture: bool,
    /// Global opacity multiplier
    pub opacity: f32,
}

impl Default for CustomMaterial {
    fn default() -> Self {
        Self {
            has_transparency: false,
            has_refraction: false,
            uses_screen_texture: false,
            uses_depth_texture: false,
            opacity: 1.0,
        }
    }
}

/// Material variant
#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Built-in material
    Default(DefaultMaterial),
    /// Custom shader material
    Custom(CustomMaterial),
    /// Alias of another material's property set
    Reference(MaterialId),
}

/// Material resource
#[derive(Debug, Clone)]
pub struct Material {
    /// Material variant and parameters
    pub kind: MaterialKind,
    /// Optional name for debugging
    pub name: Option<String>,
}

impl Material {
    /// Create a default material
    pub fn default_material(params: DefaultMaterial) -> Self {
        Self { kind: MaterialKind::Default(params), name: None }
    }

    /// Create an opaque default material with the given color
    pub fn opaque(color: Vec3) -> Self {
        Self::default_material(DefaultMaterial {
            diffuse_color: color,
            ..DefaultMaterial::default()
        })
    }

    /// Create a default material with reduced opacity
    pub fn translucent(color: Vec3, opacity: f32) -> Self {
        Self::default_material(DefaultMaterial {
            diffuse_color: color,
            opacity,
            ..DefaultMaterial::default()
        })
    }

    /// Create a custom material
    pub fn custom(params: CustomMaterial) -> Self {
        Self { kind: MaterialKind::Custom(params), name: None }
    }

    /// Create a reference to another material
    pub fn reference(target: MaterialId) -> Self {
        Self { kind: MaterialKind::Reference(target), name: None }
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this material is an alias
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, MaterialKind::Reference(_))
    }
}

/// Texture source bound to a material
#[derive(Debug, Clone)]
pub struct Image {
    /// Source path or identifier, for diagnostics
    pub source: String,
    /// Whether the texture data has finished loading
    pub loaded: bool,
    /// Whether the texture carries non-opaque alpha
    pub has_transparency: bool,
}

impl Image {
    /// Create a loaded image
    pub fn loaded(source: impl Into<String>, has_transparency: bool) -> Self {
        Self { source: source.into(), loaded: true, has_transparency }
    }

    /// Create an image whose data has not arrived yet
    pub fn pending(source: impl Into<String>) -> Self {
        Self { source: source.into(), loaded: false, has_transparency: false }
    }
}

/// Blending classification of a resolved material on a given node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransparencyInfo {
    /// Material opacity multiplied by the node's global opacity
    pub effective_opacity: f32,
    /// Must be drawn in the blended pass
    pub has_transparency: bool,
    /// Refracts the scene behind it
    pub has_refraction: bool,
    /// Samples the layer depth texture
    pub requires_depth_texture: bool,
}

impl TransparencyInfo {
    /// Classification of content without a material: blended only when the
    /// node itself is not fully opaque
    pub fn plain(node_opacity: f32) -> Self {
        let effective_opacity = node_opacity.clamp(0.0, 1.0);
        Self {
            effective_opacity,
            has_transparency: effective_opacity < 1.0,
            has_refraction: false,
            requires_depth_texture: false,
        }
    }
}
