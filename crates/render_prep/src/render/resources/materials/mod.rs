//! Material system
//!
//! Material definitions, image sources, and the registry that resolves
//! reference chains and classifies blending requirements.

pub mod material;
pub mod material_registry;

pub use material::{
    BlendMode, CustomMaterial, DefaultMaterial, Image, Material, MaterialKind, TransparencyInfo,
};
pub use material_registry::{MaterialError, MaterialRegistry, ResolvedMaterial};
