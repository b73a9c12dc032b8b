//! Rendering module
//!
//! Backend interface, pooled GPU resources, materials, primitives and the
//! lighting/shadow systems used by layer preparation.

pub mod api;
pub mod resources;
pub mod primitives;
pub mod systems;

pub use api::{BackendError, GpuBackend, HeadlessBackend};
pub use primitives::{Camera, Mesh, ResolvedCamera};
pub use resources::materials::{Material, MaterialRegistry};
pub use resources::pool::{GpuObjectPool, ResourceDescriptor};
pub use systems::lighting::{Light, LightType};
pub use systems::shadows::{ShadowMapTracker, ShadowMode};
