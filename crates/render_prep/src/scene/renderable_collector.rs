//! # Renderable Collector
//!
//! Walks the active subtree of a layer once per frame and gathers what the
//! preparer needs: candidate renderable nodes in depth-first order, cameras,
//! lights with their fixed per-frame index, and for every node reached by a
//! scoped light the list of those lights.
//!
//! The walk only reads the graph. World transforms and opacities go into the
//! returned [`CollectedScene`]; [`SceneGraph::commit_frame`] writes them back.
//!
//! ## Light scope
//!
//! A light is global for the layer when it has no scope, or its scope is the
//! layer root or one of the root's ancestors. A scope inside the layer subtree
//! restricts the light to that subtree (scope node included). A scope outside
//! the layer means the light reaches nothing here and it is left out.

use crate::config::PrepConfig;
use crate::foundation::collections::{NodeId, SecondaryMap};
use crate::foundation::math::Mat4;
use crate::render::systems::lighting::ResolvedLight;
use crate::scene::node::NodeKind;
use crate::scene::{Layer, SceneGraph};

/// A scoped light reaching a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedLight {
    /// Node carrying the light
    pub light_node: NodeId,
    /// Index of the light in the layer light list
    pub light_index: usize,
}

/// World state of a visited node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldState {
    /// Model-to-world matrix
    pub transform: Mat4,
    /// Product of the opacities along the path from the root
    pub opacity: f32,
    /// Whether the node or an ancestor changed since the last commit
    pub dirty: bool,
}

/// A collected node with its world state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectedNode {
    /// Node id
    pub node: NodeId,
    /// Model-to-world matrix
    pub world: Mat4,
    /// World opacity
    pub opacity: f32,
    /// Whether the node or an ancestor changed since the last commit
    pub dirty: bool,
}

/// Everything collected from one layer in one frame
#[derive(Debug, Clone, Default)]
pub struct CollectedScene {
    /// Renderable nodes (models, text, paths) in depth-first order
    pub renderables: Vec<CollectedNode>,
    /// Camera nodes in depth-first order
    pub cameras: Vec<CollectedNode>,
    /// Layer light list; `lights[i].index == i`
    pub lights: Vec<ResolvedLight>,
    /// Lights dropped because the layer limit was reached
    pub dropped_lights: usize,
    scoped_lights: SecondaryMap<NodeId, Vec<ScopedLight>>,
    world: SecondaryMap<NodeId, WorldState>,
}

impl CollectedScene {
    /// Scoped lights reaching `node`, in light index order
    pub fn scoped_lights_for(&self, node: NodeId) -> &[ScopedLight] {
        self.scoped_lights.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lights that reach the whole layer
    pub fn global_lights(&self) -> impl Iterator<Item = &ResolvedLight> {
        self.lights.iter().filter(|light| !light.scoped)
    }

    /// World state of a visited node
    pub fn world_state(&self, node: NodeId) -> Option<&WorldState> {
        self.world.get(node)
    }

    /// World state of every visited node
    pub fn world_states(&self) -> impl Iterator<Item = (NodeId, &WorldState)> {
        self.world.iter()
    }

    /// Whether `node` was reached by the traversal
    pub fn visited(&self, node: NodeId) -> bool {
        self.world.contains_key(node)
    }

    /// Number of visited nodes
    pub fn visited_count(&self) -> usize {
        self.world.len()
    }

    /// Camera by node id
    pub fn camera(&self, node: NodeId) -> Option<&CollectedNode> {
        self.cameras.iter().find(|camera| camera.node == node)
    }
}

struct Visit {
    node: NodeId,
    parent_world: Mat4,
    parent_opacity: f32,
    parent_dirty: bool,
}

/// Collects renderables, cameras and lights of a layer
#[derive(Debug, Clone)]
pub struct RenderableCollector {
    max_lights: usize,
}

impl RenderableCollector {
    /// Create a collector keeping at most `max_lights` lights per layer
    pub fn new(max_lights: usize) -> Self {
        Self { max_lights }
    }

    /// Create a collector from configuration
    pub fn from_config(config: &PrepConfig) -> Self {
        Self::new(config.max_lights_per_layer)
    }

    /// Light limit per layer
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Traverse the layer subtree
    pub fn collect(&self, graph: &SceneGraph, layer: &Layer) -> CollectedScene {
        let mut collected = CollectedScene::default();
        let Some(root) = graph.get(layer.root) else {
            log::warn!("Layer '{}' root {:?} is not in the scene graph", layer.name, layer.root);
            return collected;
        };
        if !root.is_active() {
            return collected;
        }

        let (parent_world, parent_opacity) = match root.parent() {
            Some(parent) => graph.compute_world(parent).unwrap_or((Mat4::identity(), 1.0)),
            None => (Mat4::identity(), 1.0),
        };
        let mut scoped: Vec<(NodeId, NodeId, usize)> = Vec::new();
        let mut stack = vec![Visit {
            node: layer.root,
            parent_world,
            parent_opacity,
            parent_dirty: graph.ancestors_dirty(layer.root),
        }];

        while let Some(visit) = stack.pop() {
            let Some(node) = graph.get(visit.node) else {
                continue;
            };
            if !node.is_active() {
                continue;
            }

            let dirty = visit.parent_dirty || node.is_dirty();
            let (world, opacity) = if dirty {
                (visit.parent_world * node.transform.to_matrix(), visit.parent_opacity * node.opacity)
            } else {
                (node.global_transform, node.global_opacity)
            };
            collected.world.insert(visit.node, WorldState { transform: world, opacity, dirty });

            let entry = CollectedNode { node: visit.node, world, opacity, dirty };
            match &node.kind {
                NodeKind::Model(_) | NodeKind::Text(_) | NodeKind::Path(_) => collected.renderables.push(entry),
                NodeKind::Camera(_) => collected.cameras.push(entry),
                NodeKind::Light(light) => {
                    let scope = match light.scope {
                        None => Some(None),
                        Some(scope) => Self::classify_scope(graph, layer.root, scope).map(|inside| inside.then_some(scope)),
                    };
                    match scope {
                        None => log::debug!("Light '{}' is scoped outside layer '{}'", node.name, layer.name),
                        Some(_) if collected.lights.len() >= self.max_lights => collected.dropped_lights += 1,
                        Some(scope) => {
                            let index = collected.lights.len();
                            collected.lights.push(ResolvedLight::new(visit.node, index, light, &world, scope.is_some()));
                            if let Some(scope) = scope {
                                scoped.push((scope, visit.node, index));
                            }
                        }
                    }
                }
                NodeKind::Group => {}
            }

            // Reverse so the first child is visited first
            let children: Vec<NodeId> = graph.children(visit.node).collect();
            for child in children.into_iter().rev() {
                stack.push(Visit {
                    node: child,
                    parent_world: world,
                    parent_opacity: opacity,
                    parent_dirty: dirty,
                });
            }
        }

        if collected.dropped_lights > 0 {
            log::warn!(
                "Layer '{}' has more than {} lights; {} dropped",
                layer.name, self.max_lights, collected.dropped_lights
            );
        }

        for (scope, light_node, light_index) in scoped {
            Self::attach_scoped_light(graph, &mut collected, scope, ScopedLight { light_node, light_index });
        }

        log::trace!(
            "Collected layer '{}': {} nodes, {} renderables, {} cameras, {} lights",
            layer.name,
            collected.world.len(),
            collected.renderables.len(),
            collected.cameras.len(),
            collected.lights.len()
        );
        collected
    }

    /// `Some(false)` for a global scope, `Some(true)` for a scope inside the
    /// layer, `None` for a scope the layer cannot see
    fn classify_scope(graph: &SceneGraph, layer_root: NodeId, scope: NodeId) -> Option<bool> {
        if !graph.contains(scope) {
            return None;
        }
        if graph.is_ancestor_or_self(scope, layer_root) {
            Some(false)
        } else if graph.is_ancestor_or_self(layer_root, scope) {
            Some(true)
        } else {
            None
        }
    }

    fn attach_scoped_light(graph: &SceneGraph, collected: &mut CollectedScene, scope: NodeId, light: ScopedLight) {
        let mut stack = vec![scope];
        while let Some(node) = stack.pop() {
            // Nodes the traversal skipped are inactive
            if !collected.world.contains_key(node) {
                continue;
            }
            match collected.scoped_lights.get_mut(node) {
                Some(list) => list.push(light),
                None => {
                    collected.scoped_lights.insert(node, vec![light]);
                }
            }
            stack.extend(graph.children(node));
        }
    }
}

impl Default for RenderableCollector {
    fn default() -> Self {
        Self::from_config(&PrepConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::primitives::Camera;
    use crate::render::systems::lighting::Light;
    use crate::render::primitives::Mesh;
    use crate::render::resources::materials::Material;
    use crate::scene::node::{Model, SceneNode};
    use crate::scene::SceneAssets;
    use approx::assert_relative_eq;

    fn white() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    fn model_node(assets: &mut SceneAssets, name: &str) -> SceneNode {
        let mesh = assets.add_mesh(Mesh::cube(1.0));
        let material = assets.add_material(Material::opaque(white()));
        SceneNode::model(name, Model::new(mesh, material))
    }

    #[test]
    fn test_depth_first_order_and_world_transforms() {
        let mut assets = SceneAssets::new();
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::group("root").at(Vec3::new(0.0, 0.0, -1.0)));
        let group = graph.add_child(root, SceneNode::group("group").at(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        let a = graph.add_child(group, model_node(&mut assets, "a").at(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        let b = graph.add_child(root, model_node(&mut assets, "b")).unwrap();

        let collected = RenderableCollector::default().collect(&graph, &Layer::new("main", root));

        let order: Vec<NodeId> = collected.renderables.iter().map(|r| r.node).collect();
        assert_eq!(order, vec![a, b]);
        let world_a = collected.renderables[0].world;
        assert_relative_eq!(world_a.m14, 1.0);
        assert_relative_eq!(world_a.m24, 1.0);
        assert_relative_eq!(world_a.m34, -1.0);
        assert_eq!(collected.visited_count(), 4);
    }

    #[test]
    fn test_inactive_subtree_is_pruned() {
        let mut assets = SceneAssets::new();
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::group("root"));
        let hidden = graph.add_child(root, SceneNode::group("hidden").inactive()).unwrap();
        graph.add_child(hidden, model_node(&mut assets, "under hidden")).unwrap();
        graph.add_child(hidden, SceneNode::camera("cam", Camera::default())).unwrap();

        let collected = RenderableCollector::default().collect(&graph, &Layer::new("main", root));
        assert!(collected.renderables.is_empty());
        assert!(collected.cameras.is_empty());
        assert!(!collected.visited(hidden));
    }

    #[test]
    fn test_light_scope_classification() {
        let mut assets = SceneAssets::new();
        let mut graph = SceneGraph::new();
        let world = graph.add_node(SceneNode::group("world"));
        let layer_root = graph.add_child(world, SceneNode::group("layer")).unwrap();
        let elsewhere = graph.add_child(world, SceneNode::group("elsewhere")).unwrap();
        let left = graph.add_child(layer_root, SceneNode::group("left")).unwrap();
        let right = graph.add_child(layer_root, SceneNode::group("right")).unwrap();
        let left_model = graph.add_child(left, model_node(&mut assets, "left model")).unwrap();
        let right_model = graph.add_child(right, model_node(&mut assets, "right model")).unwrap();

        graph.add_child(layer_root, SceneNode::light("global", Light::directional(white(), 1.0))).unwrap();
        graph.add_child(layer_root, SceneNode::light("ancestor", Light::point(white(), 1.0).scoped_to(world))).unwrap();
        graph.add_child(right, SceneNode::light("scoped", Light::spot(white(), 1.0).scoped_to(left))).unwrap();
        graph.add_child(layer_root, SceneNode::light("outside", Light::point(white(), 1.0).scoped_to(elsewhere))).unwrap();
        let at_root = graph
            .add_child(left, SceneNode::light("root scoped", Light::point(white(), 1.0).scoped_to(layer_root)))
            .unwrap();

        let collected = RenderableCollector::default().collect(&graph, &Layer::new("main", layer_root));

        assert_eq!(collected.lights.len(), 4);
        assert_eq!(collected.global_lights().count(), 3);
        // Scoped to the layer root itself: lights the whole layer
        let root_light = collected.lights.iter().find(|l| l.node == at_root).unwrap();
        assert!(!root_light.scoped);
        for (i, light) in collected.lights.iter().enumerate() {
            assert_eq!(light.index, i);
        }

        let scoped_index = collected.lights.iter().position(|l| l.scoped).unwrap();
        assert_eq!(
            collected.scoped_lights_for(left_model),
            &[ScopedLight { light_node: collected.lights[scoped_index].node, light_index: scoped_index }]
        );
        assert_eq!(collected.scoped_lights_for(left).len(), 1);
        assert!(collected.scoped_lights_for(right_model).is_empty());
    }

    #[test]
    fn test_light_limit() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::group("root"));
        for i in 0..5 {
            graph.add_child(root, SceneNode::light(format!("l{i}"), Light::point(white(), 1.0))).unwrap();
        }

        let collected = RenderableCollector::new(3).collect(&graph, &Layer::new("main", root));
        assert_eq!(collected.lights.len(), 3);
        assert_eq!(collected.dropped_lights, 2);
    }

    #[test]
    fn test_clean_nodes_reuse_committed_state() {
        let mut assets = SceneAssets::new();
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::group("root"));
        let model = graph.add_child(root, model_node(&mut assets, "m").at(Vec3::new(2.0, 0.0, 0.0))).unwrap();
        let layer = Layer::new("main", root);
        let collector = RenderableCollector::default();

        let first = collector.collect(&graph, &layer);
        assert!(first.world_state(model).unwrap().dirty);
        graph.commit_frame(&first);
        assert!(!graph.get(model).unwrap().is_dirty());

        let second = collector.collect(&graph, &layer);
        let state = second.world_state(model).unwrap();
        assert!(!state.dirty);
        assert_relative_eq!(state.transform.m14, 2.0);

        graph.set_transform(root, Transform::from_position(Vec3::new(0.0, 3.0, 0.0))).unwrap();
        let third = collector.collect(&graph, &layer);
        let state = third.world_state(model).unwrap();
        assert!(state.dirty);
        assert_relative_eq!(state.transform.m24, 3.0);
    }

    #[test]
    fn test_missing_root_yields_empty_collection() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::group("root"));
        graph.remove(root).unwrap();

        let collected = RenderableCollector::default().collect(&graph, &Layer::new("gone", root));
        assert_eq!(collected.visited_count(), 0);
    }
}
