//! Layer preparation result
//!
//! The handoff from preparation to drawing. The drawing stage consumes the
//! lists in order and must not re-sort or re-cull them.

use crate::foundation::collections::ResourceHandle;
use crate::render::primitives::ResolvedCamera;
use crate::render::systems::lighting::ResolvedLight;
use crate::scene::layer::PixelRect;
use crate::scene::renderable_object::RenderableObject;
use crate::scene::Frustum;

bitflags::bitflags! {
    /// Requirements the drawing stage must satisfy for a layer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LayerRenderFlags: u32 {
        /// Render into an offscreen target
        const OFFSCREEN = 1 << 0;
        /// A depth texture must be produced before the main pass
        const DEPTH_TEXTURE = 1 << 1;
        /// Ambient occlusion pass
        const SSAO = 1 << 2;
        /// At least one shadow map must be rendered
        const SHADOW_PASS = 1 << 3;
        /// A stencil buffer is needed (path rendering)
        const STENCIL_BUFFER = 1 << 4;
    }
}

/// Preparation counters for one layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepStats {
    /// Candidate renderables produced from collected nodes
    pub candidates: usize,
    /// Renderables outside the frustum
    pub culled: usize,
    /// Renderables skipped because their material could not be resolved
    pub material_errors: usize,
    /// Renderables kept for picking only
    pub completely_transparent: usize,
    /// Entries in the opaque list
    pub opaque: usize,
    /// Entries in the transparent list
    pub transparent: usize,
    /// Shadow maps prepared
    pub shadow_maps: usize,
    /// Shadow maps that could not be allocated
    pub shadow_failures: usize,
}

/// Pool loans backing an offscreen layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenTargets {
    /// Framebuffer object
    pub render_target: ResourceHandle,
    /// Color attachment (RGBA8 texture)
    pub color: ResourceHandle,
    /// Depth-stencil attachment (render buffer)
    pub depth_stencil: ResourceHandle,
    /// Sampled depth texture, when a depth texture is required
    pub depth_texture: Option<ResourceHandle>,
    /// Ambient occlusion texture, when SSAO is enabled
    pub ao_texture: Option<ResourceHandle>,
    /// Target width
    pub width: u32,
    /// Target height
    pub height: u32,
    /// Sample count of the color and depth-stencil attachments
    pub sample_count: u32,
}

impl OffscreenTargets {
    /// Every loaned handle
    pub fn handles(&self) -> Vec<ResourceHandle> {
        let mut handles = vec![self.render_target, self.color, self.depth_stencil];
        handles.extend(self.depth_texture);
        handles.extend(self.ao_texture);
        handles
    }
}

/// Result of preparing one layer for one frame
#[derive(Debug, Clone, Default)]
pub struct LayerPrepResult {
    /// Whether anything is drawn for this layer
    pub visible: bool,
    /// Viewport in pixels
    pub viewport: PixelRect,
    /// Camera the lists were prepared for
    pub camera: Option<ResolvedCamera>,
    /// Opaque renderables, front-to-back when enabled
    pub opaque: Vec<RenderableObject>,
    /// Transparent renderables, back-to-front
    pub transparent: Vec<RenderableObject>,
    /// Completely transparent renderables kept for picking
    pub pick_only: Vec<RenderableObject>,
    /// Layer light list, global and scoped
    pub lights: Vec<ResolvedLight>,
    /// Indices of lights whose shadow maps are ready
    pub shadow_lights: Vec<usize>,
    /// Requirement flags
    pub flags: LayerRenderFlags,
    /// Offscreen loans, attached by the frame pipeline
    pub offscreen: Option<OffscreenTargets>,
    /// Counters
    pub stats: PrepStats,
}

impl LayerPrepResult {
    /// Empty result for a layer that draws nothing
    pub fn not_visible(viewport: PixelRect) -> Self {
        Self {
            visible: false,
            viewport,
            ..Self::default()
        }
    }

    /// Lights reaching the whole layer
    pub fn global_lights(&self) -> impl Iterator<Item = &ResolvedLight> {
        self.lights.iter().filter(|light| !light.scoped)
    }

    /// Clipping frustum of the camera
    pub fn frustum(&self) -> Option<&Frustum> {
        self.camera.as_ref().map(|camera| &camera.frustum)
    }

    /// Whether a requirement flag is set
    pub fn requires(&self, flag: LayerRenderFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Number of draw list entries
    pub fn draw_count(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }
}
