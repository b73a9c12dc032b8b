//! Scene node definitions
//!
//! A node carries a local transform and opacity plus one piece of content:
//! nothing (group), a model, a light, a camera, a text quad or a vector path.

use crate::foundation::collections::{MaterialId, MeshId, NodeId};
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::render::primitives::Camera;
use crate::render::systems::lighting::Light;
use crate::scene::AABB;

bitflags::bitflags! {
    /// Per-node state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// Node and its subtree take part in rendering
        const ACTIVE = 1 << 0;
        /// Local transform changed since the last committed frame
        const TRANSFORM_DIRTY = 1 << 1;
        /// Local opacity changed since the last committed frame
        const OPACITY_DIRTY = 1 << 2;
        /// Node can be hit by picking
        const LOCALLY_PICKABLE = 1 << 3;
    }
}

/// Mesh instance with per-subset materials
#[derive(Debug, Clone)]
pub struct Model {
    /// Mesh to draw
    pub mesh: MeshId,
    /// Material of subset `i`; shorter lists repeat their last entry
    pub materials: Vec<MaterialId>,
}

impl Model {
    /// Model using one material for every subset
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self { mesh, materials: vec![material] }
    }

    /// Model with an explicit material list
    pub fn with_materials(mesh: MeshId, materials: Vec<MaterialId>) -> Self {
        Self { mesh, materials }
    }

    /// Material for a subset index
    pub fn material_for_subset(&self, subset: usize) -> Option<MaterialId> {
        self.materials.get(subset).or_else(|| self.materials.last()).copied()
    }
}

/// Text drawn as a textured quad
#[derive(Debug, Clone)]
pub struct TextItem {
    /// Text content
    pub text: String,
    /// Local bounds of the glyph quad
    pub bounds: AABB,
    /// Text color
    pub color: Vec3,
}

/// Filled or stroked vector path
#[derive(Debug, Clone)]
pub struct PathItem {
    /// Local bounds of the path geometry
    pub bounds: AABB,
    /// Fill material; `None` draws a plain opaque fill
    pub material: Option<MaterialId>,
}

/// Content of a scene node
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Transform-only grouping node
    Group,
    /// Mesh instance
    Model(Model),
    /// Light source
    Light(Light),
    /// Camera
    Camera(Camera),
    /// Text quad
    Text(TextItem),
    /// Vector path
    Path(PathItem),
}

/// A node in the [`SceneGraph`](crate::scene::SceneGraph)
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Node name, for diagnostics
    pub name: String,
    /// Node content
    pub kind: NodeKind,
    /// Transform relative to the parent
    pub transform: Transform,
    /// Opacity relative to the parent
    pub opacity: f32,
    /// State flags
    pub flags: NodeFlags,

    pub(crate) global_transform: Mat4,
    pub(crate) global_opacity: f32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
}

impl SceneNode {
    /// Create an active, dirty node with identity transform and full opacity
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::identity(),
            opacity: 1.0,
            flags: NodeFlags::ACTIVE | NodeFlags::TRANSFORM_DIRTY | NodeFlags::OPACITY_DIRTY,
            global_transform: Mat4::identity(),
            global_opacity: 1.0,
            parent: None,
            first_child: None,
            next_sibling: None,
        }
    }

    /// Grouping node
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    /// Model node
    pub fn model(name: impl Into<String>, model: Model) -> Self {
        Self::new(name, NodeKind::Model(model))
    }

    /// Light node
    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    /// Camera node
    pub fn camera(name: impl Into<String>, camera: Camera) -> Self {
        Self::new(name, NodeKind::Camera(camera))
    }

    /// Text node
    pub fn text(name: impl Into<String>, text: TextItem) -> Self {
        Self::new(name, NodeKind::Text(text))
    }

    /// Path node
    pub fn path(name: impl Into<String>, path: PathItem) -> Self {
        Self::new(name, NodeKind::Path(path))
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the local position
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Set the local opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Make the node pickable
    pub fn pickable(mut self) -> Self {
        self.flags.insert(NodeFlags::LOCALLY_PICKABLE);
        self
    }

    /// Create the node inactive
    pub fn inactive(mut self) -> Self {
        self.flags.remove(NodeFlags::ACTIVE);
        self
    }

    /// Whether the node takes part in rendering
    pub fn is_active(&self) -> bool {
        self.flags.contains(NodeFlags::ACTIVE)
    }

    /// Whether the transform or opacity changed since the last commit
    pub fn is_dirty(&self) -> bool {
        self.flags.intersects(NodeFlags::TRANSFORM_DIRTY | NodeFlags::OPACITY_DIRTY)
    }

    /// World transform as of the last committed frame
    pub fn global_transform(&self) -> &Mat4 {
        &self.global_transform
    }

    /// World opacity as of the last committed frame
    pub fn global_opacity(&self) -> f32 {
        self.global_opacity
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether the node produces draw calls
    pub fn is_renderable(&self) -> bool {
        matches!(self.kind, NodeKind::Model(_) | NodeKind::Text(_) | NodeKind::Path(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn test_new_node_is_active_and_dirty() {
        let node = SceneNode::group("g");
        assert!(node.is_active());
        assert!(node.is_dirty());
        assert!(!node.is_renderable());
        assert!(!SceneNode::group("off").inactive().is_active());
    }

    #[test]
    fn test_material_for_subset_repeats_last() {
        let mesh = MeshId::from(KeyData::from_ffi(1));
        let a = MaterialId::from(KeyData::from_ffi(1));
        let b = MaterialId::from(KeyData::from_ffi(2));

        let model = Model::with_materials(mesh, vec![a, b]);
        assert_eq!(model.material_for_subset(0), Some(a));
        assert_eq!(model.material_for_subset(1), Some(b));
        assert_eq!(model.material_for_subset(5), Some(b));
        assert_eq!(Model::with_materials(mesh, Vec::new()).material_for_subset(0), None);
    }

    #[test]
    fn test_opacity_is_clamped() {
        assert_eq!(SceneNode::group("g").with_opacity(2.0).opacity, 1.0);
    }
}
