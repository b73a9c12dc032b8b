//! Mesh representation for render preparation
//!
//! Preparation never touches vertex data; it only needs to know how a mesh is
//! split into subsets (one draw call and one material each) and the local
//! bounds of every subset for culling and distance sorting.

use crate::foundation::math::Vec3;
use crate::scene::AABB;

/// Contiguous index range drawn with a single material
#[derive(Debug, Clone)]
pub struct MeshSubset {
    /// Subset name, for diagnostics
    pub name: String,
    /// Bounds in mesh-local space
    pub bounds: AABB,
    /// First index in the mesh index buffer
    pub index_offset: u32,
    /// Number of indices
    pub index_count: u32,
}

/// Mesh made of one or more subsets
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Mesh name, for diagnostics
    pub name: String,
    /// Draw subsets in material-slot order
    pub subsets: Vec<MeshSubset>,
}

impl Mesh {
    /// Create a mesh from its subsets
    pub fn new(name: impl Into<String>, subsets: Vec<MeshSubset>) -> Self {
        Self { name: name.into(), subsets }
    }

    /// Single-subset mesh with the given local bounds
    pub fn with_bounds(name: impl Into<String>, bounds: AABB, index_count: u32) -> Self {
        let name = name.into();
        Self {
            subsets: vec![MeshSubset {
                name: format!("{name}.0"),
                bounds,
                index_offset: 0,
                index_count,
            }],
            name,
        }
    }

    /// Axis-aligned cube centered at the origin
    pub fn cube(size: f32) -> Self {
        let half = size * 0.5;
        Self::with_bounds("cube", AABB::from_center_extents(Vec3::zeros(), Vec3::new(half, half, half)), 36)
    }

    /// Flat square in the XY plane centered at the origin
    pub fn plane(size: f32) -> Self {
        let half = size * 0.5;
        Self::with_bounds("plane", AABB::from_center_extents(Vec3::zeros(), Vec3::new(half, half, 0.0)), 6)
    }

    /// Union of all subset bounds
    pub fn bounds(&self) -> Option<AABB> {
        self.subsets
            .iter()
            .map(|subset| subset.bounds)
            .reduce(|acc, bounds| acc.union(&bounds))
    }
}
