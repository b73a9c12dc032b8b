//! Renderable object representation
//!
//! A renderable is the per-frame unit the drawing stage consumes: one mesh
//! subset, text quad or path, with its world bounds, distance to the camera and
//! classification flags. Renderables are created fresh every frame; the scene
//! graph keeps owning the nodes they were made from.

use std::rc::Rc;

use crate::foundation::collections::{MaterialId, MeshId, NodeId};
use crate::foundation::math::{utils, Mat3, Mat4, Vec3};
use crate::scene::renderable_collector::ScopedLight;
use crate::scene::AABB;

bitflags::bitflags! {
    /// Classification of a renderable
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderableFlags: u32 {
        /// Needs blending; goes to the transparent list
        const HAS_TRANSPARENCY = 1 << 0;
        /// Effective opacity is below the visibility threshold
        const COMPLETELY_TRANSPARENT = 1 << 1;
        /// Source node changed since the last committed frame
        const DIRTY = 1 << 2;
        /// Can be hit by picking
        const PICKABLE = 1 << 3;
        /// Samples the scene behind it
        const HAS_REFRACTION = 1 << 4;
    }
}

/// Matrices shared by every subset of one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelContext {
    /// Node the matrices were computed for
    pub node: NodeId,
    /// Model-to-world matrix
    pub model: Mat4,
    /// Model-view-projection matrix
    pub mvp: Mat4,
    /// Inverse-transpose of the model matrix's upper 3x3
    pub normal: Mat3,
}

impl ModelContext {
    /// Compute the matrices of a node for a camera
    pub fn new(node: NodeId, model: Mat4, view_projection: &Mat4) -> Self {
        Self {
            node,
            mvp: view_projection * model,
            normal: utils::normal_matrix(&model),
            model,
        }
    }
}

/// What a renderable draws
#[derive(Debug, Clone, PartialEq)]
pub enum RenderableKind {
    /// Mesh subset with a default material
    DefaultMaterialSubset {
        /// Mesh
        mesh: MeshId,
        /// Subset index within the mesh
        subset: usize,
        /// Resolved (non-reference) material
        material: MaterialId,
    },
    /// Mesh subset with a custom material
    CustomMaterialSubset {
        /// Mesh
        mesh: MeshId,
        /// Subset index within the mesh
        subset: usize,
        /// Resolved (non-reference) material
        material: MaterialId,
    },
    /// Text glyph quad
    TextQuad,
    /// Vector path
    Path {
        /// Resolved fill material, if any
        material: Option<MaterialId>,
    },
}

/// Per-frame drawable item
#[derive(Debug, Clone)]
pub struct RenderableObject {
    /// Node the renderable was made from
    pub node: NodeId,
    /// What is drawn
    pub kind: RenderableKind,
    /// Matrices, shared by all renderables of the same model
    pub context: Rc<ModelContext>,
    /// World-space bounds
    pub world_bounds: AABB,
    /// Center of `world_bounds`
    pub world_center: Vec3,
    /// Squared distance from the camera to `world_center`
    pub camera_distance_sq: f32,
    /// Effective opacity (material times node)
    pub opacity: f32,
    /// Classification flags
    pub flags: RenderableFlags,
    /// Scoped lights reaching the source node
    pub scoped_lights: Vec<ScopedLight>,
}

impl RenderableObject {
    /// World transform of the source node
    pub fn world_transform(&self) -> &Mat4 {
        &self.context.model
    }

    /// Whether the renderable goes to the transparent list
    pub fn is_transparent(&self) -> bool {
        self.flags.contains(RenderableFlags::HAS_TRANSPARENCY)
    }

    /// Whether the renderable is kept for picking only
    pub fn is_completely_transparent(&self) -> bool {
        self.flags.contains(RenderableFlags::COMPLETELY_TRANSPARENT)
    }

    /// Material the renderable draws with
    pub fn material(&self) -> Option<MaterialId> {
        match self.kind {
            RenderableKind::DefaultMaterialSubset { material, .. }
            | RenderableKind::CustomMaterialSubset { material, .. } => Some(material),
            RenderableKind::Path { material } => material,
            RenderableKind::TextQuad => None,
        }
    }
}
