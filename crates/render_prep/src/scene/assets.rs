//! Scene asset store
//!
//! Meshes, materials and images referenced by scene nodes. Loading is out of
//! scope; callers insert ready-made descriptions.

use crate::foundation::collections::{ImageId, MaterialId, MeshId, SlotMap};
use crate::render::primitives::Mesh;
use crate::render::resources::materials::{Image, Material, MaterialRegistry};

/// Meshes plus the material registry
#[derive(Debug, Default)]
pub struct SceneAssets {
    meshes: SlotMap<MeshId, Mesh>,
    /// Materials and images
    pub materials: MaterialRegistry,
}

impl SceneAssets {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            materials: MaterialRegistry::new(),
        }
    }

    /// Register a mesh
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Get a mesh by id
    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    /// Register a material
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.add_material(material)
    }

    /// Register an image
    pub fn add_image(&mut self, image: Image) -> ImageId {
        self.materials.add_image(image)
    }

    /// Number of registered meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
