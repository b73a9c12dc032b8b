//! # Render Prep
//!
//! Per-frame render preparation for layered 2D/3D scenes.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed hierarchy with dirty-flag world state
//! - **Layer Preparation**: Culling, opaque/transparent classification and sorting
//! - **Scoped Lighting**: Global and subtree-scoped lights with a per-layer limit
//! - **Shadow Maps**: Per-light shadow resources reused across frames
//! - **Object Pool**: Recycling of textures, render buffers and render targets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_prep::prelude::*;
//!
//! let mut graph = SceneGraph::new();
//! let mut assets = SceneAssets::new();
//! let root = graph.add_node(SceneNode::group("root"));
//! graph.add_child(root, SceneNode::camera("camera", Camera::default())).unwrap();
//!
//! let mesh = assets.add_mesh(Mesh::cube(1.0));
//! let material = assets.add_material(Material::opaque(Vec3::new(0.8, 0.2, 0.2)));
//! graph
//!     .add_child(root, SceneNode::model("cube", Model::new(mesh, material)).at(Vec3::new(0.0, 0.0, -5.0)))
//!     .unwrap();
//!
//! let mut backend = HeadlessBackend::new();
//! let mut pipeline = FramePipeline::new(PrepConfig::default());
//! let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (1280, 720));
//! assert_eq!(results[0].opaque.len(), 1);
//! pipeline.destroy(&mut backend);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod render;
pub mod scene;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PrepConfig},
        foundation::{
            collections::{MaterialId, MeshId, NodeId},
            math::{Mat4, Transform, Vec3},
        },
        render::{
            Camera, GpuBackend, HeadlessBackend, Light, Material, Mesh, ShadowMode,
            systems::lighting::ShadowMapQuality,
        },
        scene::{
            FramePipeline, Layer, LayerPrepResult, LayerRenderFlags, Model, SceneAssets, SceneError,
            SceneGraph, SceneNode, Viewport,
        },
    };
}
