//! End-to-end preparation scenarios across collector, preparer and pipeline

use crate::config::PrepConfig;
use crate::foundation::collections::NodeId;
use crate::foundation::logging;
use crate::foundation::math::{Transform, Vec3};
use crate::render::api::HeadlessBackend;
use crate::render::primitives::{Camera, Mesh};
use crate::render::resources::materials::{Material, MaterialKind};
use crate::render::systems::lighting::{Light, ShadowMapQuality};
use crate::scene::{FramePipeline, Layer, LayerRenderFlags, Model, NodeKind, SceneAssets, SceneGraph, SceneNode};

fn white() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

/// Root group with a camera at the origin looking down -Z
fn camera_scene() -> (SceneGraph, SceneAssets, NodeId) {
    let mut graph = SceneGraph::new();
    let root = graph.add_node(SceneNode::group("root"));
    graph.add_child(root, SceneNode::camera("camera", Camera::default())).unwrap();
    (graph, SceneAssets::new(), root)
}

fn add_cube(graph: &mut SceneGraph, assets: &mut SceneAssets, parent: NodeId, name: &str, material: Material, position: Vec3) -> NodeId {
    let mesh = assets.add_mesh(Mesh::cube(1.0));
    let material = assets.add_material(material);
    graph
        .add_child(parent, SceneNode::model(name, Model::new(mesh, material)).at(position))
        .unwrap()
}

#[test]
fn test_opaque_and_transparent_with_scoped_light() {
    logging::init_for_tests();
    let (mut graph, mut assets, root) = camera_scene();
    let objects = graph.add_child(root, SceneNode::group("objects")).unwrap();
    let lamp_group = graph.add_child(root, SceneNode::group("lamp_group")).unwrap();

    let cube = add_cube(&mut graph, &mut assets, objects, "cube", Material::opaque(white()), Vec3::new(0.0, 0.0, -10.0));
    let plane_mesh = assets.add_mesh(Mesh::plane(2.0));
    let glass = assets.add_material(Material::translucent(white(), 0.5));
    let plane = graph
        .add_child(objects, SceneNode::model("plane", Model::new(plane_mesh, glass)).at(Vec3::new(0.0, 0.0, -5.0)))
        .unwrap();
    let lit = add_cube(&mut graph, &mut assets, lamp_group, "lit", Material::opaque(white()), Vec3::new(1.0, 0.0, -8.0));
    graph
        .add_child(lamp_group, SceneNode::light("lamp", Light::point(white(), 1.0).scoped_to(lamp_group)))
        .unwrap();

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (800, 600));
    let result = &results[0];

    assert!(result.visible);
    let opaque: Vec<_> = result.opaque.iter().map(|r| r.node).collect();
    assert_eq!(opaque, vec![lit, cube]);
    assert_eq!(result.transparent.len(), 1);
    assert_eq!(result.transparent[0].node, plane);

    assert!(result.opaque[1].scoped_lights.is_empty());
    assert_eq!(result.opaque[0].scoped_lights.len(), 1);
    assert_eq!(result.lights.len(), 1);
    assert_eq!(result.global_lights().count(), 0);
}

#[test]
fn test_culled_objects_are_absent_from_all_lists() {
    let (mut graph, mut assets, root) = camera_scene();
    let visible = add_cube(&mut graph, &mut assets, root, "visible", Material::opaque(white()), Vec3::new(0.0, 0.0, -5.0));
    add_cube(&mut graph, &mut assets, root, "behind", Material::opaque(white()), Vec3::new(0.0, 0.0, 10.0));
    add_cube(&mut graph, &mut assets, root, "aside", Material::translucent(white(), 0.5), Vec3::new(500.0, 0.0, -5.0));
    add_cube(&mut graph, &mut assets, root, "beyond_far", Material::opaque(white()), Vec3::new(0.0, 0.0, -2000.0));

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (800, 600));
    let result = &results[0];

    assert_eq!(result.draw_count(), 1);
    assert_eq!(result.opaque[0].node, visible);
    assert!(result.pick_only.is_empty());
    assert_eq!(result.stats.culled, 3);

    let frustum = result.frustum().unwrap();
    for object in result.opaque.iter().chain(&result.transparent) {
        assert!(frustum.intersects_aabb(&object.world_bounds));
    }
}

#[test]
fn test_transparent_list_is_back_to_front() {
    let (mut graph, mut assets, root) = camera_scene();
    let depths = [-7.0, -3.0, -12.0, -5.0, -20.0, -9.0, -4.0, -15.0];
    for (i, z) in depths.iter().enumerate() {
        let x = (i as f32 - 4.0) * 0.5;
        add_cube(&mut graph, &mut assets, root, &format!("glass{i}"), Material::translucent(white(), 0.4), Vec3::new(x, 0.0, *z));
    }

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (800, 600));
    let transparent = &results[0].transparent;

    assert_eq!(transparent.len(), depths.len());
    for pair in transparent.windows(2) {
        assert!(pair[0].camera_distance_sq >= pair[1].camera_distance_sq);
    }
}

#[test]
fn test_material_cycle_skips_one_renderable() {
    let (mut graph, mut assets, root) = camera_scene();
    let good = add_cube(&mut graph, &mut assets, root, "good", Material::opaque(white()), Vec3::new(0.0, 0.0, -5.0));

    let concrete = assets.add_material(Material::opaque(white()));
    let first = assets.add_material(Material::reference(concrete));
    let second = assets.add_material(Material::reference(first));
    assets.materials.material_mut(first).unwrap().kind = MaterialKind::Reference(second);
    let mesh = assets.add_mesh(Mesh::cube(1.0));
    graph
        .add_child(root, SceneNode::model("broken", Model::new(mesh, first)).at(Vec3::new(1.0, 0.0, -5.0)))
        .unwrap();

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (800, 600));
    let result = &results[0];

    assert!(result.visible);
    assert_eq!(result.opaque.len(), 1);
    assert_eq!(result.opaque[0].node, good);
    assert_eq!(result.stats.material_errors, 1);
}

#[test]
fn test_layer_without_camera_is_not_visible() {
    let mut graph = SceneGraph::new();
    let mut assets = SceneAssets::new();
    let root = graph.add_node(SceneNode::group("root"));
    add_cube(&mut graph, &mut assets, root, "cube", Material::opaque(white()), Vec3::new(0.0, 0.0, -5.0));

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());
    let layers = [Layer::new("main", root).force_offscreen()];
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));

    assert!(!results[0].visible);
    assert_eq!(results[0].draw_count(), 0);
    assert!(results[0].offscreen.is_none());
    assert_eq!(backend.stats().creates, 0);
}

#[test]
fn test_light_limit_applies_per_layer() {
    let (mut graph, assets, root) = camera_scene();
    for i in 0..5 {
        graph.add_child(root, SceneNode::light(format!("light{i}"), Light::point(white(), 1.0))).unwrap();
    }
    let config = PrepConfig { max_lights_per_layer: 3, ..PrepConfig::default() };

    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(config);
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &[Layer::new("main", root)], (800, 600));

    assert_eq!(results[0].lights.len(), 3);
    let indices: Vec<_> = results[0].lights.iter().map(|light| light.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_shadow_quality_change_reallocates_once() {
    let (mut graph, assets, root) = camera_scene();
    let sun = graph
        .add_child(root, SceneNode::light("sun", Light::directional(white(), 1.0).with_shadows(ShadowMapQuality::Medium)))
        .unwrap();
    let layers = [Layer::new("main", root)];
    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());

    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    assert!(results[0].requires(LayerRenderFlags::SHADOW_PASS));
    assert_eq!(pipeline.shadow_tracker(0).unwrap().get_shadow_map_entry(0).unwrap().width, 512);

    pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    assert_eq!(pipeline.shadow_tracker(0).unwrap().reallocation_count(), 0);

    if let NodeKind::Light(light) = &mut graph.get_mut(sun).unwrap().kind {
        light.shadow.quality = ShadowMapQuality::High;
    }
    pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));

    let tracker = pipeline.shadow_tracker(0).unwrap();
    assert_eq!(tracker.reallocation_count(), 1);
    assert_eq!(tracker.get_shadow_map_entry(0).unwrap().width, 1024);
    assert_eq!(tracker.len(), 1);
}

#[test]
fn test_reactivated_node_follows_ancestor_moved_while_inactive() {
    let (mut graph, mut assets, root) = camera_scene();
    let parent = graph.add_child(root, SceneNode::group("parent")).unwrap();
    let cube = add_cube(&mut graph, &mut assets, parent, "cube", Material::opaque(white()), Vec3::new(0.0, 0.0, -5.0));
    let layers = [Layer::new("main", root)];
    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(PrepConfig::default());

    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    assert_eq!(results[0].opaque.len(), 1);

    graph.set_active(cube, false).unwrap();
    graph.set_transform(parent, Transform::from_position(Vec3::new(0.0, 0.0, 5000.0))).unwrap();
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    assert_eq!(results[0].draw_count(), 0);

    graph.set_active(cube, true).unwrap();
    let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));
    assert_eq!(results[0].draw_count(), 0);
    assert_eq!(results[0].stats.culled, 1);
    assert!((graph.get(cube).unwrap().global_transform().m34 - 4995.0).abs() < 1e-3);
}

#[test]
fn test_degenerate_camera_makes_layer_not_visible() {
    let cameras = [
        Camera::perspective(60.0, 1.0, 1.0),
        Camera::perspective(60.0, 0.0, 10.0),
        Camera::orthographic(0.0, 0.1, 10.0),
    ];
    for camera in cameras {
        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::new();
        let root = graph.add_node(SceneNode::group("root"));
        graph.add_child(root, SceneNode::camera("camera", camera)).unwrap();
        add_cube(&mut graph, &mut assets, root, "cube", Material::opaque(white()), Vec3::new(0.0, 0.0, -5.0));

        let mut backend = HeadlessBackend::new();
        let mut pipeline = FramePipeline::new(PrepConfig::default());
        let layers = [Layer::new("main", root).force_offscreen()];
        let results = pipeline.prepare_frame(&mut backend, &mut graph, &assets, &layers, (800, 600));

        assert!(!results[0].visible);
        assert_eq!(results[0].draw_count(), 0);
        assert_eq!(backend.stats().creates, 0);
    }
}
