//! Scene graph arena and spatial primitives
//!
//! Nodes live in a generational slot map and are linked parent / first-child /
//! next-sibling, so traversal is a plain pointer walk in declaration order.
//! Traversal never writes to the graph: world transforms are computed into the
//! per-frame collection and written back by [`SceneGraph::commit_frame`].

use thiserror::Error;

use super::node::{NodeFlags, SceneNode};
use super::renderable_collector::CollectedScene;
use crate::foundation::collections::{NodeId, SlotMap};
use crate::foundation::math::{Mat4, Transform, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Bounds of this box after an affine transform
    ///
    /// Uses the center/extents form: the new extents are the absolute value of
    /// the linear part applied to the old extents (Arvo's method).
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let linear = matrix.fixed_view::<3, 3>(0, 0).abs();
        let center = matrix.transform_point(&self.center().into()).coords;
        let extents = linear * self.extents();
        AABB::from_center_extents(center, extents)
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far),
    /// normals pointing inward
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// This uses the Gribb-Hartmann method: each plane is the sum or difference
    /// of the fourth row with one of the first three rows of the matrix, for
    /// clip space in `[-w, w]` on every axis. Planes are normalized.
    pub fn from_matrix(vp_matrix: &Mat4) -> Self {
        let row = |i: usize| {
            let r = vp_matrix.row(i);
            [r[0], r[1], r[2], r[3]]
        };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let add = |a: [f32; 4], b: [f32; 4]| Plane::from_coefficients(a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]);
        let sub = |a: [f32; 4], b: [f32; 4]| Plane::from_coefficients(a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]);

        Self {
            planes: [
                add(r3, r0),
                sub(r3, r0),
                add(r3, r1),
                sub(r3, r1),
                add(r3, r2),
                sub(r3, r2),
            ],
        }
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        for plane in &self.planes {
            // Corner furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

            // If this point is outside the plane, the entire AABB is outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        true
    }

    /// Check if a point is inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized unless the plane is degenerate)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane `a*x + b*y + c*z + d = 0`, normalized by the length of `(a, b, c)`
    ///
    /// A zero normal yields a degenerate plane that accepts every point.
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let normal = Vec3::new(a, b, c);
        let length = normal.norm();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::zeros(), distance: 0.0 };
        }
        Self {
            normal: normal / length,
            distance: d / length,
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Scene graph errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SceneError {
    /// The id does not name a live node
    #[error("scene node {0:?} not found")]
    NodeNotFound(NodeId),
}

/// Arena of scene nodes linked into a forest
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key() }
    }

    /// Insert a node with no parent
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, mut node: SceneNode) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        node.parent = Some(parent);
        node.next_sibling = None;
        let id = self.nodes.insert(node);

        match self.last_child(parent) {
            Some(last) => {
                if let Some(last) = self.nodes.get_mut(last) {
                    last.next_sibling = Some(id);
                }
            }
            None => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.first_child = Some(id);
                }
            }
        }
        Ok(id)
    }

    /// Remove a node and its whole subtree
    ///
    /// # Returns
    ///
    /// Number of nodes removed
    pub fn remove(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let node = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?;
        let (parent, next) = (node.parent, node.next_sibling);

        // Unlink from the parent's child chain
        if let Some(parent) = parent {
            let first = self.nodes.get(parent).and_then(|p| p.first_child);
            if first == Some(id) {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.first_child = next;
                }
            } else {
                let previous = self.children(parent).find(|child| {
                    self.nodes.get(*child).and_then(|c| c.next_sibling) == Some(id)
                });
                if let Some(previous) = previous.and_then(|p| self.nodes.get_mut(p)) {
                    previous.next_sibling = next;
                }
            }
        }

        let doomed = self.subtree(id);
        for node in &doomed {
            self.nodes.remove(*node);
        }
        Ok(doomed.len())
    }

    /// Get a node by id
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Get a mutable node by id
    ///
    /// Direct edits of the transform or opacity do not raise dirty flags; use
    /// [`set_transform`](Self::set_transform) and
    /// [`set_opacity`](Self::set_opacity) for that.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Whether the graph holds `id`
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Replace a node's local transform and mark it dirty
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        node.transform = transform;
        node.flags.insert(NodeFlags::TRANSFORM_DIRTY);
        Ok(())
    }

    /// Replace a node's local opacity and mark it dirty
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        node.opacity = opacity.clamp(0.0, 1.0);
        node.flags.insert(NodeFlags::OPACITY_DIRTY);
        Ok(())
    }

    /// Activate or deactivate a node (and with it, its subtree)
    ///
    /// A reactivated node is marked dirty; its subtree was not committed while
    /// inactive.
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        if active && !node.is_active() {
            node.flags.insert(NodeFlags::TRANSFORM_DIRTY | NodeFlags::OPACITY_DIRTY);
        }
        node.flags.set(NodeFlags::ACTIVE, active);
        Ok(())
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    /// Direct children of a node in declaration order
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            graph: self,
            next: self.nodes.get(id).and_then(|node| node.first_child),
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// World transform and opacity of a node computed from its local values
    /// and those of every ancestor
    pub fn compute_world(&self, id: NodeId) -> Option<(Mat4, f32)> {
        let node = self.nodes.get(id)?;
        let (parent_world, parent_opacity) = match node.parent {
            Some(parent) => self.compute_world(parent)?,
            None => (Mat4::identity(), 1.0),
        };
        Some((parent_world * node.transform.to_matrix(), parent_opacity * node.opacity))
    }

    /// Whether any strict ancestor of `id` has a dirty transform or opacity
    pub fn ancestors_dirty(&self, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            match self.nodes.get(parent) {
                Some(node) if node.is_dirty() => return true,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        false
    }

    /// Write the world state computed during collection back into the graph
    /// and clear the dirty flags of every visited node
    pub fn commit_frame(&mut self, collected: &CollectedScene) {
        let mut committed = 0usize;
        for (id, state) in collected.world_states() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.global_transform = state.transform;
                node.global_opacity = state.opacity;
                node.flags.remove(NodeFlags::TRANSFORM_DIRTY | NodeFlags::OPACITY_DIRTY);
                committed += 1;
            }
        }
        log::trace!("Committed world state of {} nodes", committed);
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn last_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent).last()
    }

    /// `id` and every descendant, depth first
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current));
        }
        out
    }
}

/// Iterator over the direct children of a node
pub struct Children<'a> {
    graph: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.nodes.get(current).and_then(|node| node.next_sibling);
        Some(current)
    }
}
