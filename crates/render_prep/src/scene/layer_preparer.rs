//! # Layer Preparation
//!
//! Turns a [`CollectedScene`] into the draw lists of one layer:
//!
//! 1. Convert the viewport to pixels; a degenerate viewport yields an empty,
//!    not-visible result.
//! 2. Resolve the camera and its clipping frustum.
//! 3. Resolve materials and classify every mesh subset, text quad and path.
//! 4. Frustum-cull and partition into opaque, transparent and pick-only.
//! 5. Sort transparent back-to-front (and opaque front-to-back if enabled).
//! 6. Request shadow maps for shadow-casting lights.
//! 7. Derive the offscreen, depth texture and SSAO requirements.
//!
//! Failures are local: a bad material drops one renderable, a failed shadow
//! allocation drops one light's shadow.

use std::rc::Rc;

use crate::config::PrepConfig;
use crate::foundation::collections::MaterialId;
use crate::render::api::GpuBackend;
use crate::render::primitives::ResolvedCamera;
use crate::render::resources::materials::{MaterialKind, TransparencyInfo};
use crate::render::resources::pool::GpuObjectPool;
use crate::render::systems::shadows::{ShadowMapRequest, ShadowMapTracker, ShadowMapUpdate, ShadowMode};
use crate::scene::node::{NodeFlags, NodeKind};
use crate::scene::prep_result::{LayerPrepResult, LayerRenderFlags};
use crate::scene::renderable_collector::{CollectedNode, CollectedScene, ScopedLight};
use crate::scene::renderable_object::{ModelContext, RenderableFlags, RenderableKind, RenderableObject};
use crate::scene::{Layer, SceneAssets, SceneGraph, AABB};

/// Read-only scene inputs of a frame
#[derive(Debug, Clone, Copy)]
pub struct SceneView<'a> {
    /// Scene graph
    pub graph: &'a SceneGraph,
    /// Meshes, materials and images
    pub assets: &'a SceneAssets,
    /// Size of the presentation surface in pixels
    pub presentation_size: (u32, u32),
}

/// GPU-side inputs of a frame
pub struct GpuContext<'a> {
    /// Resource pool
    pub pool: &'a mut GpuObjectPool,
    /// Graphics backend
    pub backend: &'a mut dyn GpuBackend,
}

/// Per-node state shared by every renderable the node produces
struct NodeFrame<'a> {
    candidate: &'a CollectedNode,
    context: Rc<ModelContext>,
    flags: RenderableFlags,
    scoped_lights: &'a [ScopedLight],
}

/// Prepares layers according to a [`PrepConfig`]
#[derive(Debug, Clone, Copy)]
pub struct LayerPreparer<'c> {
    config: &'c PrepConfig,
}

impl<'c> LayerPreparer<'c> {
    /// Create a preparer
    pub fn new(config: &'c PrepConfig) -> Self {
        Self { config }
    }

    /// Prepare one layer for one frame
    pub fn prepare(
        &self,
        layer: &Layer,
        collected: &CollectedScene,
        scene: &SceneView<'_>,
        gpu: &mut GpuContext<'_>,
        shadows: &mut ShadowMapTracker,
    ) -> LayerPrepResult {
        let viewport = layer.viewport.to_pixels(scene.presentation_size);
        if viewport.is_degenerate() {
            log::debug!("Layer '{}' has degenerate viewport {:?}; skipped", layer.name, viewport);
            return LayerPrepResult::not_visible(viewport);
        }

        let Some(camera) = Self::resolve_camera(layer, collected, scene.graph, viewport.aspect()) else {
            log::warn!("Layer '{}' has no usable camera; skipped", layer.name);
            return LayerPrepResult::not_visible(viewport);
        };

        let mut result = LayerPrepResult {
            visible: true,
            viewport,
            lights: collected.lights.clone(),
            ..LayerPrepResult::default()
        };

        for candidate in &collected.renderables {
            self.prepare_node(candidate, collected, scene, &camera, &mut result);
        }
        self.sort(&mut result);
        self.prepare_shadows(layer, gpu, shadows, &mut result);

        if layer.requires_offscreen() {
            result.flags.insert(LayerRenderFlags::OFFSCREEN);
        }
        if layer.ambient_occlusion.is_enabled() {
            result.flags.insert(LayerRenderFlags::SSAO | LayerRenderFlags::DEPTH_TEXTURE);
        }

        result.stats.opaque = result.opaque.len();
        result.stats.transparent = result.transparent.len();
        result.camera = Some(camera);

        log::trace!(
            "Prepared layer '{}': {} opaque, {} transparent, {} culled, flags {:?}",
            layer.name, result.stats.opaque, result.stats.transparent, result.stats.culled, result.flags
        );
        result
    }

    fn resolve_camera(
        layer: &Layer,
        collected: &CollectedScene,
        graph: &SceneGraph,
        aspect: f32,
    ) -> Option<ResolvedCamera> {
        let explicit = layer.camera.and_then(|id| collected.camera(id));
        if layer.camera.is_some() && explicit.is_none() {
            log::debug!("Layer '{}' camera is not active in the layer; using the first camera", layer.name);
        }
        let chosen = explicit.or_else(|| collected.cameras.first())?;

        let node = graph.get(chosen.node)?;
        match &node.kind {
            NodeKind::Camera(camera) => match camera.validate(aspect) {
                Ok(()) => Some(camera.resolve(&chosen.world, aspect)),
                Err(err) => {
                    log::warn!("Layer '{}' camera '{}' is unusable: {}", layer.name, node.name, err);
                    None
                }
            },
            _ => None,
        }
    }

    fn prepare_node(
        &self,
        candidate: &CollectedNode,
        collected: &CollectedScene,
        scene: &SceneView<'_>,
        camera: &ResolvedCamera,
        result: &mut LayerPrepResult,
    ) {
        let Some(node) = scene.graph.get(candidate.node) else {
            return;
        };

        let mut flags = RenderableFlags::empty();
        if node.flags.contains(NodeFlags::LOCALLY_PICKABLE) {
            flags.insert(RenderableFlags::PICKABLE);
        }
        if candidate.dirty {
            flags.insert(RenderableFlags::DIRTY);
        }
        let frame = NodeFrame {
            candidate,
            context: Rc::new(ModelContext::new(candidate.node, candidate.world, &camera.view_projection)),
            flags,
            scoped_lights: collected.scoped_lights_for(candidate.node),
        };
        match &node.kind {
            NodeKind::Model(model) => {
                let Some(mesh) = scene.assets.mesh(model.mesh) else {
                    log::warn!("Model '{}' references a missing mesh", node.name);
                    return;
                };
                for (index, subset) in mesh.subsets.iter().enumerate() {
                    result.stats.candidates += 1;
                    let Some(material_id) = model.material_for_subset(index) else {
                        log::warn!("Model '{}' subset {} has no material; skipped", node.name, index);
                        continue;
                    };
                    let Some((resolved, info)) = self.classify(material_id, candidate.opacity, scene, &node.name, result) else {
                        continue;
                    };
                    let kind = match scene.assets.materials.material(resolved).map(|m| &m.kind) {
                        Some(MaterialKind::Custom(_)) => RenderableKind::CustomMaterialSubset {
                            mesh: model.mesh,
                            subset: index,
                            material: resolved,
                        },
                        _ => RenderableKind::DefaultMaterialSubset {
                            mesh: model.mesh,
                            subset: index,
                            material: resolved,
                        },
                    };
                    let object = self.make_renderable(&frame, kind, &subset.bounds, &info, camera);
                    Self::place(object, &info, false, camera, result);
                }
            }
            NodeKind::Text(text) => {
                result.stats.candidates += 1;
                // Glyph quads are always alpha blended
                let info = TransparencyInfo {
                    has_transparency: true,
                    ..TransparencyInfo::plain(candidate.opacity)
                };
                let object = self.make_renderable(&frame, RenderableKind::TextQuad, &text.bounds, &info, camera);
                Self::place(object, &info, false, camera, result);
            }
            NodeKind::Path(path) => {
                result.stats.candidates += 1;
                let (material, info) = match path.material {
                    Some(material_id) => {
                        let Some((resolved, info)) = self.classify(material_id, candidate.opacity, scene, &node.name, result) else {
                            return;
                        };
                        (Some(resolved), info)
                    }
                    None => (None, TransparencyInfo::plain(candidate.opacity)),
                };
                let object = self.make_renderable(&frame, RenderableKind::Path { material }, &path.bounds, &info, camera);
                Self::place(object, &info, true, camera, result);
            }
            NodeKind::Group | NodeKind::Light(_) | NodeKind::Camera(_) => {}
        }
    }

    /// Resolve a material chain and classify it on a node
    fn classify(
        &self,
        material_id: MaterialId,
        node_opacity: f32,
        scene: &SceneView<'_>,
        node_name: &str,
        result: &mut LayerPrepResult,
    ) -> Option<(MaterialId, TransparencyInfo)> {
        let materials = &scene.assets.materials;
        match materials.resolve(material_id) {
            Ok(resolved) => Some((resolved.id, materials.transparency_of(resolved.material, node_opacity))),
            Err(err) => {
                log::warn!("Skipping renderable of '{}': {}", node_name, err);
                result.stats.material_errors += 1;
                None
            }
        }
    }

    fn make_renderable(
        &self,
        frame: &NodeFrame<'_>,
        kind: RenderableKind,
        local_bounds: &AABB,
        info: &TransparencyInfo,
        camera: &ResolvedCamera,
    ) -> RenderableObject {
        let world_bounds = local_bounds.transformed(&frame.candidate.world);
        let world_center = world_bounds.center();

        let mut flags = frame.flags;
        if info.has_transparency {
            flags.insert(RenderableFlags::HAS_TRANSPARENCY);
        }
        if info.has_refraction {
            flags.insert(RenderableFlags::HAS_REFRACTION);
        }
        if info.effective_opacity < self.config.completely_transparent_threshold {
            flags.insert(RenderableFlags::COMPLETELY_TRANSPARENT);
        }

        RenderableObject {
            node: frame.candidate.node,
            kind,
            context: Rc::clone(&frame.context),
            world_bounds,
            world_center,
            camera_distance_sq: camera.distance_squared(world_center),
            opacity: info.effective_opacity,
            flags,
            scoped_lights: frame.scoped_lights.to_vec(),
        }
    }

    fn place(
        object: RenderableObject,
        info: &TransparencyInfo,
        is_path: bool,
        camera: &ResolvedCamera,
        result: &mut LayerPrepResult,
    ) {
        if camera.frustum_culling && !camera.frustum.intersects_aabb(&object.world_bounds) {
            result.stats.culled += 1;
            return;
        }

        if object.is_completely_transparent() {
            result.stats.completely_transparent += 1;
            result.pick_only.push(object);
            return;
        }

        if info.requires_depth_texture {
            result.flags.insert(LayerRenderFlags::DEPTH_TEXTURE);
        }
        if is_path {
            result.flags.insert(LayerRenderFlags::STENCIL_BUFFER);
        }

        if object.is_transparent() {
            result.transparent.push(object);
        } else {
            result.opaque.push(object);
        }
    }

    fn sort(&self, result: &mut LayerPrepResult) {
        // Stable: equal distances keep collection order
        result
            .transparent
            .sort_by(|a, b| b.camera_distance_sq.total_cmp(&a.camera_distance_sq));
        if self.config.sort_opaque_front_to_back {
            result
                .opaque
                .sort_by(|a, b| a.camera_distance_sq.total_cmp(&b.camera_distance_sq));
        }
    }

    fn prepare_shadows(
        &self,
        layer: &Layer,
        gpu: &mut GpuContext<'_>,
        shadows: &mut ShadowMapTracker,
        result: &mut LayerPrepResult,
    ) {
        let settings = &self.config.shadows;
        if !settings.enabled {
            shadows.release_all(gpu.pool);
            return;
        }

        for light in &result.lights {
            let shadow = &light.light.shadow;
            if !shadow.casts_shadow {
                continue;
            }
            let mode = if light.light.uses_cube_shadow() { ShadowMode::Cube } else { ShadowMode::Standard };
            let request = ShadowMapRequest::square(shadow.quality.resolution(), settings.depth_format, mode, shadow.filter);

            match shadows.add_shadow_map_entry(gpu.pool, gpu.backend, light.index, request) {
                Ok(update) => {
                    if update != ShadowMapUpdate::Unchanged {
                        log::debug!("Layer '{}' light {} shadow map: {:?}", layer.name, light.index, update);
                    }
                    result.shadow_lights.push(light.index);
                }
                Err(err) => {
                    log::warn!("Layer '{}' light {} renders without shadow: {}", layer.name, light.index, err);
                    result.stats.shadow_failures += 1;
                }
            }
        }

        // Lights that stopped casting shadows give their maps back
        let stale: Vec<usize> = shadows
            .entries()
            .iter()
            .map(|entry| entry.light_index)
            .filter(|index| !result.shadow_lights.contains(index))
            .collect();
        for index in stale {
            shadows.remove_shadow_map_entry(gpu.pool, index);
        }

        result.stats.shadow_maps = result.shadow_lights.len();
        if !result.shadow_lights.is_empty() {
            result.flags.insert(LayerRenderFlags::SHADOW_PASS);
        }
    }
}
