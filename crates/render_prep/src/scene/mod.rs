//! Scene model and per-frame render preparation
//!
//! ## Architecture
//!
//! ```text
//! SceneGraph + SceneAssets (caller owned)
//!      ↓
//! RenderableCollector (pure traversal per layer)
//!      ↓
//! LayerPreparer (cull, classify, sort, shadows)
//!      ↓
//! LayerPrepResult (handoff to drawing)
//! ```
//!
//! The [`FramePipeline`] runs these steps for every layer in declared order,
//! keeps each layer's shadow maps and offscreen loans alive across frames,
//! and commits dirty flags once all layers are prepared.

mod scene_graph;
mod node;
mod assets;
mod layer;
mod renderable_object;
mod renderable_collector;
mod prep_result;
mod layer_preparer;
mod frame_pipeline;

#[cfg(test)]
mod tests;

pub use scene_graph::{Children, Frustum, Plane, SceneError, SceneGraph, AABB};
pub use node::{Model, NodeFlags, NodeKind, PathItem, SceneNode, TextItem};
pub use assets::SceneAssets;
pub use layer::{AmbientOcclusion, AntialiasingMode, Layer, LayerFlags, PixelRect, Viewport};
pub use renderable_object::{ModelContext, RenderableFlags, RenderableKind, RenderableObject};
pub use renderable_collector::{CollectedNode, CollectedScene, RenderableCollector, ScopedLight, WorldState};
pub use prep_result::{LayerPrepResult, LayerRenderFlags, OffscreenTargets, PrepStats};
pub use layer_preparer::{GpuContext, LayerPreparer, SceneView};
pub use frame_pipeline::FramePipeline;
