//! Material and image storage with reference resolution
//!
//! Reference materials form a pointer chain that is walked at preparation time.
//! The walk is bounded: a chain that revisits a material is reported as a
//! cycle instead of looping.

use thiserror::Error;

use super::material::{
    BlendMode, CustomMaterial, DefaultMaterial, Image, Material, MaterialKind, TransparencyInfo,
};
use crate::foundation::collections::{ImageId, MaterialId, SlotMap};

/// Material resolution errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaterialError {
    /// The id does not name a registered material
    #[error("material {0:?} not found")]
    NotFound(MaterialId),

    /// Following references from `start` revisits a material
    #[error("material reference cycle starting at {start:?} (chain length {length})")]
    ReferenceCycle {
        /// Material the resolution started from
        start: MaterialId,
        /// Number of hops walked before the repeat was found
        length: usize,
    },
}

/// A material after following its reference chain
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMaterial<'a> {
    /// Id of the concrete (non-reference) material
    pub id: MaterialId,
    /// The concrete material
    pub material: &'a Material,
}

/// Central store of materials and images
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: SlotMap<MaterialId, Material>,
    images: SlotMap<ImageId, Image>,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            materials: SlotMap::with_key(),
            images: SlotMap::with_key(),
        }
    }

    /// Register a material
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = self.materials.insert(material);
        log::trace!("Registered material {:?}", id);
        id
    }

    /// Register an image
    pub fn add_image(&mut self, image: Image) -> ImageId {
        self.images.insert(image)
    }

    /// Get a material by id
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Get a mutable material by id
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    /// Get an image by id
    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.images.get(id)
    }

    /// Get a mutable image by id
    pub fn image_mut(&mut self, id: ImageId) -> Option<&mut Image> {
        self.images.get_mut(id)
    }

    /// Number of registered materials
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Follow reference materials until a concrete one is found
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedMaterial)` - The concrete material at the end of the chain
    /// * `Err(MaterialError)` - A link is missing or the chain loops
    pub fn resolve(&self, id: MaterialId) -> Result<ResolvedMaterial<'_>, MaterialError> {
        let mut current = id;
        let mut visited: Vec<MaterialId> = Vec::new();

        loop {
            let material = self.materials.get(current).ok_or(MaterialError::NotFound(current))?;
            match material.kind {
                MaterialKind::Reference(target) => {
                    if visited.contains(&current) {
                        return Err(MaterialError::ReferenceCycle { start: id, length: visited.len() });
                    }
                    visited.push(current);
                    current = target;
                }
                _ => return Ok(ResolvedMaterial { id: current, material }),
            }
        }
    }

    /// Classify a resolved material on a node with the given global opacity
    pub fn transparency_of(&self, material: &Material, node_opacity: f32) -> TransparencyInfo {
        match &material.kind {
            MaterialKind::Default(params) => self.default_transparency(params, node_opacity),
            MaterialKind::Custom(params) => Self::custom_transparency(params, node_opacity),
            // Resolution never yields a reference; treat a raw one as opaque
            MaterialKind::Reference(_) => TransparencyInfo::plain(node_opacity),
        }
    }

    fn default_transparency(&self, params: &DefaultMaterial, node_opacity: f32) -> TransparencyInfo {
        let effective_opacity = (params.opacity * node_opacity).clamp(0.0, 1.0);
        let transparent_image = params
            .diffuse_map
            .and_then(|id| self.images.get(id))
            .is_some_and(|image| image.loaded && image.has_transparency);
        let opacity_map = params
            .opacity_map
            .and_then(|id| self.images.get(id))
            .is_some_and(|image| image.loaded);

        TransparencyInfo {
            effective_opacity,
            has_transparency: effective_opacity < 1.0
                || params.blend_mode != BlendMode::Normal
                || opacity_map
                || transparent_image,
            has_refraction: false,
            requires_depth_texture: false,
        }
    }

    fn custom_transparency(params: &CustomMaterial, node_opacity: f32) -> TransparencyInfo {
        let effective_opacity = (params.opacity * node_opacity).clamp(0.0, 1.0);
        TransparencyInfo {
            effective_opacity,
            has_transparency: params.has_transparency || params.has_refraction || effective_opacity < 1.0,
            has_refraction: params.has_refraction,
            requires_depth_texture: params.has_refraction
                || params.uses_screen_texture
                || params.uses_depth_texture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_resolve_concrete_material() {
        let mut registry = MaterialRegistry::new();
        let id = registry.add_material(Material::opaque(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(registry.resolve(id).unwrap().id, id);
    }

    #[test]
    fn test_resolve_reference_chain() {
        let mut registry = MaterialRegistry::new();
        let base = registry.add_material(Material::opaque(Vec3::zeros()));
        let alias = registry.add_material(Material::reference(base));
        let alias_of_alias = registry.add_material(Material::reference(alias));

        assert_eq!(registry.resolve(alias_of_alias).unwrap().id, base);
    }

    #[test]
    fn test_reference_cycle_is_reported() {
        let mut registry = MaterialRegistry::new();
        let a = registry.add_material(Material::opaque(Vec3::zeros()));
        let b = registry.add_material(Material::reference(a));
        registry.material_mut(a).unwrap().kind = MaterialKind::Reference(b);

        assert!(matches!(
            registry.resolve(a),
            Err(MaterialError::ReferenceCycle { start, .. }) if start == a
        ));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut registry = MaterialRegistry::new();
        let a = registry.add_material(Material::opaque(Vec3::zeros()));
        registry.material_mut(a).unwrap().kind = MaterialKind::Reference(a);
        assert!(registry.resolve(a).is_err());
    }

    #[test]
    fn test_dangling_reference() {
        let mut registry = MaterialRegistry::new();
        let target = registry.add_material(Material::opaque(Vec3::zeros()));
        let alias = registry.add_material(Material::reference(target));
        registry.materials.remove(target);

        assert_eq!(registry.resolve(alias).unwrap_err(), MaterialError::NotFound(target));
    }

    #[test]
    fn test_default_material_classification() {
        let mut registry = MaterialRegistry::new();
        let opaque = Material::opaque(Vec3::zeros());
        assert!(!registry.transparency_of(&opaque, 1.0).has_transparency);
        assert!(registry.transparency_of(&opaque, 0.5).has_transparency);

        let blended = Material::default_material(DefaultMaterial {
            blend_mode: BlendMode::Screen,
            ..DefaultMaterial::default()
        });
        assert!(registry.transparency_of(&blended, 1.0).has_transparency);

        let alpha_image = registry.add_image(Image::loaded("leaf.png", true));
        let textured = Material::default_material(DefaultMaterial {
            diffuse_map: Some(alpha_image),
            ..DefaultMaterial::default()
        });
        assert!(registry.transparency_of(&textured, 1.0).has_transparency);
    }

    #[test]
    fn test_pending_image_does_not_make_transparent() {
        let mut registry = MaterialRegistry::new();
        let pending = registry.add_image(Image::pending("late.png"));
        let material = Material::default_material(DefaultMaterial {
            opacity_map: Some(pending),
            ..DefaultMaterial::default()
        });
        assert!(!registry.transparency_of(&material, 1.0).has_transparency);
    }

    #[test]
    fn test_refraction_requires_depth_texture() {
        let registry = MaterialRegistry::new();
        let glass = Material::custom(CustomMaterial {
            has_refraction: true,
            ..CustomMaterial::default()
        });
        let info = registry.transparency_of(&glass, 1.0);
        assert!(info.has_transparency);
        assert!(info.has_refraction);
        assert!(info.requires_depth_texture);
    }
}
