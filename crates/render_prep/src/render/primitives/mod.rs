//! Rendering primitives
//!
//! Mesh subset layout and camera projection.

pub mod mesh;
pub mod camera;

pub use mesh::{Mesh, MeshSubset};
pub use camera::{Camera, CameraError, Projection, ResolvedCamera};
