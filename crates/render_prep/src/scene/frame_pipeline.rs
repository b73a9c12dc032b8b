//! Frame pipeline
//!
//! Drives collection and preparation for every layer in declared order and
//! owns what persists between frames: the GPU object pool, one shadow tracker
//! per layer, and the offscreen targets each layer has on loan.
//!
//! Offscreen loans live for one frame. They go back to the pool when the same
//! layer is prepared again, which lets the next frame pick them up as exact
//! matches.

use crate::config::PrepConfig;
use crate::foundation::collections::ResourceHandle;
use crate::render::api::GpuBackend;
use crate::render::resources::pool::{GpuObjectPool, PixelFormat, PoolError, ResourceDescriptor};
use crate::render::systems::shadows::ShadowMapTracker;
use crate::scene::layer::AntialiasingMode;
use crate::scene::layer_preparer::{GpuContext, LayerPreparer, SceneView};
use crate::scene::prep_result::{LayerPrepResult, LayerRenderFlags, OffscreenTargets};
use crate::scene::renderable_collector::RenderableCollector;
use crate::scene::{Layer, SceneAssets, SceneGraph};

/// Scale of a supersampled layer's offscreen target
const SUPERSAMPLE_FACTOR: u32 = 2;

#[derive(Debug, Default)]
struct LayerState {
    shadows: ShadowMapTracker,
    offscreen: Option<OffscreenTargets>,
}

impl LayerState {
    fn release_offscreen(&mut self, pool: &mut GpuObjectPool) {
        if let Some(targets) = self.offscreen.take() {
            for handle in targets.handles() {
                pool.release(handle);
            }
        }
    }
}

/// Per-frame driver of layer preparation
#[derive(Debug)]
pub struct FramePipeline {
    config: PrepConfig,
    pool: GpuObjectPool,
    collector: RenderableCollector,
    layers: Vec<LayerState>,
    frame: u64,
}

impl FramePipeline {
    /// Create a pipeline with an empty pool
    pub fn new(config: PrepConfig) -> Self {
        log::info!("Creating frame pipeline (max {} lights per layer)", config.max_lights_per_layer);
        Self {
            pool: GpuObjectPool::with_config(&config.pool),
            collector: RenderableCollector::from_config(&config),
            config,
            layers: Vec::new(),
            frame: 0,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// The resource pool
    pub fn pool(&self) -> &GpuObjectPool {
        &self.pool
    }

    /// Number of frames prepared so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Shadow tracker of the layer at `layer_index`
    pub fn shadow_tracker(&self, layer_index: usize) -> Option<&ShadowMapTracker> {
        self.layers.get(layer_index).map(|state| &state.shadows)
    }

    /// Offscreen targets the layer at `layer_index` currently has on loan
    pub fn offscreen_targets(&self, layer_index: usize) -> Option<&OffscreenTargets> {
        self.layers.get(layer_index).and_then(|state| state.offscreen.as_ref())
    }

    /// Prepare every layer for one frame, then commit the frame's world state
    /// to the scene graph
    ///
    /// Layers are identified by their position in `layers`; state kept for
    /// positions beyond the current layer count is released.
    pub fn prepare_frame(
        &mut self,
        backend: &mut dyn GpuBackend,
        graph: &mut SceneGraph,
        assets: &SceneAssets,
        layers: &[Layer],
        presentation_size: (u32, u32),
    ) -> Vec<LayerPrepResult> {
        self.retire_layers(layers.len());

        let preparer = LayerPreparer::new(&self.config);
        let mut results = Vec::with_capacity(layers.len());
        let mut collections = Vec::with_capacity(layers.len());

        for (index, layer) in layers.iter().enumerate() {
            let state = &mut self.layers[index];
            state.release_offscreen(&mut self.pool);

            let collected = self.collector.collect(graph, layer);
            let scene = SceneView { graph: &*graph, assets, presentation_size };
            let mut gpu = GpuContext { pool: &mut self.pool, backend: &mut *backend };
            let mut result = preparer.prepare(layer, &collected, &scene, &mut gpu, &mut state.shadows);

            if result.visible && result.requires(LayerRenderFlags::OFFSCREEN) {
                match Self::loan_offscreen(&mut self.pool, backend, layer, &result) {
                    Ok(targets) => {
                        state.offscreen = Some(targets);
                        result.offscreen = Some(targets);
                    }
                    Err(err) => {
                        log::warn!("Layer '{}' renders directly, offscreen target unavailable: {}", layer.name, err);
                        result.flags.remove(LayerRenderFlags::OFFSCREEN);
                    }
                }
            }

            results.push(result);
            collections.push(collected);
        }

        for collected in &collections {
            graph.commit_frame(collected);
        }
        self.frame += 1;
        results
    }

    /// Give back every offscreen loan of an abandoned frame
    ///
    /// Shadow maps persist; they are re-validated by the next frame.
    pub fn discard_frame(&mut self) {
        for state in &mut self.layers {
            state.release_offscreen(&mut self.pool);
        }
    }

    /// Destroy free variable-size resources in the pool
    pub fn trim(&mut self, backend: &mut dyn GpuBackend) -> usize {
        self.pool.trim(backend)
    }

    /// Release every loan and forget all layer state
    ///
    /// # Returns
    ///
    /// Number of resources trimmed (zero unless `trim_on_shutdown` is set)
    pub fn shutdown(&mut self, backend: &mut dyn GpuBackend) -> usize {
        self.retire_layers(0);
        let trimmed = if self.config.pool.trim_on_shutdown { self.pool.trim(backend) } else { 0 };
        log::info!(
            "Frame pipeline shut down after {} frames ({} resources trimmed, {} kept)",
            self.frame, trimmed, self.pool.live_count()
        );
        trimmed
    }

    /// Shut down and destroy every resource the pool owns
    pub fn destroy(mut self, backend: &mut dyn GpuBackend) {
        self.shutdown(backend);
        self.pool.destroy_all(backend);
    }

    fn retire_layers(&mut self, count: usize) {
        if self.layers.len() > count {
            for mut state in self.layers.drain(count..) {
                state.release_offscreen(&mut self.pool);
                state.shadows.release_all(&mut self.pool);
            }
        }
        self.layers.resize_with(count, LayerState::default);
    }

    fn loan_offscreen(
        pool: &mut GpuObjectPool,
        backend: &mut dyn GpuBackend,
        layer: &Layer,
        result: &LayerPrepResult,
    ) -> Result<OffscreenTargets, PoolError> {
        let mut loans = Vec::with_capacity(5);
        let outcome = Self::loan_offscreen_into(pool, backend, layer, result, &mut loans);
        if outcome.is_err() {
            for handle in loans {
                pool.release(handle);
            }
        }
        outcome
    }

    fn loan_offscreen_into(
        pool: &mut GpuObjectPool,
        backend: &mut dyn GpuBackend,
        layer: &Layer,
        result: &LayerPrepResult,
        loans: &mut Vec<ResourceHandle>,
    ) -> Result<OffscreenTargets, PoolError> {
        let (mut width, mut height) = result.viewport.size();
        if layer.antialiasing == AntialiasingMode::Supersample {
            width *= SUPERSAMPLE_FACTOR;
            height *= SUPERSAMPLE_FACTOR;
        }
        let samples = layer.antialiasing.sample_count();

        let mut loan = |descriptor: ResourceDescriptor| -> Result<ResourceHandle, PoolError> {
            let handle = pool.allocate(&mut *backend, descriptor)?;
            loans.push(handle);
            Ok(handle)
        };

        let render_target = loan(ResourceDescriptor::render_target())?;
        let color = loan(ResourceDescriptor::texture_2d(width, height, PixelFormat::Rgba8, samples))?;
        let depth_stencil = loan(ResourceDescriptor::render_buffer(width, height, PixelFormat::Depth24Stencil8, samples))?;
        let depth_texture = if result.requires(LayerRenderFlags::DEPTH_TEXTURE) {
            Some(loan(ResourceDescriptor::texture_2d(width, height, PixelFormat::Depth24, 1))?)
        } else {
            None
        };
        let ao_texture = if result.requires(LayerRenderFlags::SSAO) {
            Some(loan(ResourceDescriptor::texture_2d(width, height, PixelFormat::R8, 1))?)
        } else {
            None
        };

        Ok(OffscreenTargets {
            render_target,
            color,
            depth_stencil,
            depth_texture,
            ao_texture,
            width,
            height,
            sample_count: samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::NodeId;
    use crate::foundation::math::Vec3;
    use crate::render::api::HeadlessBackend;
    use crate::render::primitives::{Camera, Mesh};
    use crate::render::resources::materials::Material;
    use crate::render::resources::pool::ResourceCategory;
    use crate::render::systems::lighting::{Light, ShadowMapQuality};
    use crate::scene::node::{Model, SceneNode};
    use crate::scene::AmbientOcclusion;

    fn scene() -> (SceneGraph, SceneAssets, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::new();
        let root = graph.add_node(SceneNode::group("root"));
        graph.add_child(root, SceneNode::camera("camera", Camera::default())).unwrap();
        let mesh = assets.add_mesh(Mesh::cube(1.0));
        let material = assets.add_material(Material::opaque(Vec3::new(1.0, 0.0, 0.0)));
        let cube = graph
            .add_child(root, SceneNode::model("cube", Model::new(mesh, material)).at(Vec3::new(0.0, 0.0, -5.0)))
            .unwrap();
        (graph, assets, root, cube)
    }

    #[test]
    fn test_offscreen_loans_recycled_between_frames() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("fx", root).with_effects(1)];

        let first = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (640, 480));
        let targets = first[0].offscreen.unwrap();
        assert_eq!((targets.width, targets.height), (640, 480));
        assert!(targets.depth_texture.is_none());
        let creates = backend.stats().creates;

        let second = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (640, 480));
        assert_eq!(backend.stats().creates, creates);
        assert_eq!(second[0].offscreen.unwrap().color, targets.color);
        assert_eq!(pipeline.frame_count(), 2);
    }

    #[test]
    fn test_ssao_adds_depth_and_ao_textures() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("ao", root)
            .force_offscreen()
            .with_ambient_occlusion(AmbientOcclusion { strength: 1.0, ..Default::default() })];

        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (320, 200));
        let targets = results[0].offscreen.unwrap();
        let depth = pipeline.pool().descriptor(targets.depth_texture.unwrap()).unwrap();
        let ao = pipeline.pool().descriptor(targets.ao_texture.unwrap()).unwrap();
        assert_eq!(depth.format, PixelFormat::Depth24);
        assert_eq!(ao.format, PixelFormat::R8);
        assert_eq!(targets.handles().len(), 5);
    }

    #[test]
    fn test_msaa_targets_are_multisampled() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("aa", root).with_antialiasing(AntialiasingMode::Msaa4)];

        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (100, 100));
        let targets = results[0].offscreen.unwrap();
        let color = pipeline.pool().descriptor(targets.color).unwrap();
        assert_eq!(color.sample_count, 4);
        assert_eq!(
            pipeline.pool().descriptor(targets.depth_stencil).unwrap().category,
            ResourceCategory::RenderBuffer
        );
    }

    #[test]
    fn test_failed_offscreen_loan_degrades_to_direct() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::with_capacity_limit(2);
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("forced", root).force_offscreen()];

        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (100, 100));
        assert!(results[0].visible);
        assert!(!results[0].requires(LayerRenderFlags::OFFSCREEN));
        assert!(results[0].offscreen.is_none());
        assert_eq!(pipeline.pool().loaned_count(), 0);
        assert_eq!(results[0].opaque.len(), 1);
    }

    #[test]
    fn test_discard_frame_returns_loans() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("forced", root).force_offscreen()];

        pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (100, 100));
        assert_eq!(pipeline.pool().loaned_count(), 3);

        pipeline.discard_frame();
        assert_eq!(pipeline.pool().loaned_count(), 0);
        assert!(pipeline.offscreen_targets(0).is_none());
    }

    #[test]
    fn test_removed_layer_releases_shadow_maps() {
        let (mut graph, assets, root, _) = scene();
        graph
            .add_child(root, SceneNode::light("sun", Light::directional(Vec3::new(1.0, 1.0, 1.0), 1.0).with_shadows(ShadowMapQuality::Low)))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());

        let layers = [Layer::new("a", root), Layer::new("b", root)];
        pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (100, 100));
        assert_eq!(pipeline.pool().loaned_count(), 6);

        pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers[..1], (100, 100));
        assert_eq!(pipeline.pool().loaned_count(), 3);
        assert!(pipeline.shadow_tracker(1).is_none());
    }

    #[test]
    fn test_shutdown_trims_pool() {
        let (mut graph, assets, root, _) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("forced", root).force_offscreen()];

        pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (100, 100));
        // Color texture and depth-stencil buffer are trimmable; the render target is not
        assert_eq!(pipeline.shutdown(&mut backend), 2);
        assert_eq!(backend.live_count(), 1);

        pipeline.destroy(&mut backend);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_frame_commits_dirty_flags() {
        let (mut graph, assets, root, cube) = scene();
        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        assert!(graph.get(cube).unwrap().is_dirty());

        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (100, 100));
        assert!(results[0].opaque[0].flags.contains(crate::scene::RenderableFlags::DIRTY));
        assert!(!graph.get(cube).unwrap().is_dirty());
        assert!((graph.get(cube).unwrap().global_transform().m34 + 5.0).abs() < 1e-6);

        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (100, 100));
        assert!(!results[0].opaque[0].flags.contains(crate::scene::RenderableFlags::DIRTY));
    }
}
