//! Compositing layers
//!
//! A layer is a subtree of the scene graph rendered through one camera into a
//! viewport of the presentation surface, optionally via an offscreen target
//! when it needs antialiasing, post effects or non-normal blending.

use crate::foundation::collections::NodeId;
use crate::render::resources::materials::BlendMode;

bitflags::bitflags! {
    /// Layer configuration flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LayerFlags: u32 {
        /// Always render through an offscreen target
        const FORCE_OFFSCREEN = 1 << 0;
    }
}

/// Viewport rectangle in percent of the presentation surface or in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Viewport {
    /// Values in percent (0-100) of the presentation size
    Percent {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
    /// Values in pixels
    Pixels {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
}

impl Viewport {
    /// Whole presentation surface
    pub fn full() -> Self {
        Viewport::Percent { x: 0.0, y: 0.0, width: 100.0, height: 100.0 }
    }

    /// Convert to a pixel rectangle for a presentation surface of `size`
    pub fn to_pixels(&self, size: (u32, u32)) -> PixelRect {
        let (surface_w, surface_h) = (size.0 as f32, size.1 as f32);
        let (x, y, width, height) = match *self {
            Viewport::Percent { x, y, width, height } => (
                x * surface_w / 100.0,
                y * surface_h / 100.0,
                width * surface_w / 100.0,
                height * surface_h / 100.0,
            ),
            Viewport::Pixels { x, y, width, height } => (x, y, width, height),
        };
        PixelRect {
            x: x.round() as i32,
            y: y.round() as i32,
            width: width.round() as i32,
            height: height.round() as i32,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::full()
    }
}

/// Viewport in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width, may be zero or negative for degenerate viewports
    pub width: i32,
    /// Height, may be zero or negative for degenerate viewports
    pub height: i32,
}

impl PixelRect {
    /// Whether nothing can be drawn into this rectangle
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Width / height
    pub fn aspect(&self) -> f32 {
        if self.height <= 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Size clamped to at least one pixel per axis
    pub fn size(&self) -> (u32, u32) {
        (self.width.max(1) as u32, self.height.max(1) as u32)
    }
}

/// Antialiasing mode of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntialiasingMode {
    /// No antialiasing
    #[default]
    None,
    /// 2x multisampling
    Msaa2,
    /// 4x multisampling
    Msaa4,
    /// 8x multisampling
    Msaa8,
    /// Supersampling into a larger single-sampled target
    Supersample,
}

impl AntialiasingMode {
    /// Sample count of the layer color and depth targets
    pub fn sample_count(self) -> u32 {
        match self {
            AntialiasingMode::Msaa2 => 2,
            AntialiasingMode::Msaa4 => 4,
            AntialiasingMode::Msaa8 => 8,
            AntialiasingMode::None | AntialiasingMode::Supersample => 1,
        }
    }

    /// Whether any antialiasing is enabled
    pub fn is_enabled(self) -> bool {
        self != AntialiasingMode::None
    }
}

/// Screen-space ambient occlusion settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientOcclusion {
    /// Effect strength; zero disables the effect
    pub strength: f32,
    /// Sampling distance in world units
    pub distance: f32,
    /// Blur amount
    pub softness: f32,
}

impl Default for AmbientOcclusion {
    fn default() -> Self {
        Self {
            strength: 0.0,
            distance: 5.0,
            softness: 50.0,
        }
    }
}

impl AmbientOcclusion {
    /// Whether the effect is active
    pub fn is_enabled(&self) -> bool {
        self.strength > 0.0
    }
}

/// A compositing layer
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer name, for diagnostics
    pub name: String,
    /// Root of the rendered subtree
    pub root: NodeId,
    /// Explicit camera; the first collected camera is used otherwise
    pub camera: Option<NodeId>,
    /// Viewport on the presentation surface
    pub viewport: Viewport,
    /// How the layer composites onto what is below it
    pub blend_mode: BlendMode,
    /// Antialiasing mode
    pub antialiasing: AntialiasingMode,
    /// Number of post-processing effects
    pub effect_count: usize,
    /// Ambient occlusion settings
    pub ambient_occlusion: AmbientOcclusion,
    /// Configuration flags
    pub flags: LayerFlags,
}

impl Layer {
    /// Full-surface layer with default settings rendering `root`
    pub fn new(name: impl Into<String>, root: NodeId) -> Self {
        Self {
            name: name.into(),
            root,
            camera: None,
            viewport: Viewport::full(),
            blend_mode: BlendMode::Normal,
            antialiasing: AntialiasingMode::None,
            effect_count: 0,
            ambient_occlusion: AmbientOcclusion::default(),
            flags: LayerFlags::empty(),
        }
    }

    /// Use an explicit camera
    pub fn with_camera(mut self, camera: NodeId) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Set the viewport
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Set the layer blend mode
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Set the antialiasing mode
    pub fn with_antialiasing(mut self, mode: AntialiasingMode) -> Self {
        self.antialiasing = mode;
        self
    }

    /// Set the number of post-processing effects
    pub fn with_effects(mut self, count: usize) -> Self {
        self.effect_count = count;
        self
    }

    /// Set ambient occlusion
    pub fn with_ambient_occlusion(mut self, ambient_occlusion: AmbientOcclusion) -> Self {
        self.ambient_occlusion = ambient_occlusion;
        self
    }

    /// Always render through an offscreen target
    pub fn force_offscreen(mut self) -> Self {
        self.flags.insert(LayerFlags::FORCE_OFFSCREEN);
        self
    }

    /// Whether the layer must render into an offscreen target
    pub fn requires_offscreen(&self) -> bool {
        self.flags.contains(LayerFlags::FORCE_OFFSCREEN)
            || self.effect_count > 0
            || self.blend_mode != BlendMode::Normal
            || self.antialiasing.is_enabled()
    }
}
