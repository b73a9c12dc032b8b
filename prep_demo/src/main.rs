//! Render preparation demo
//!
//! Builds a small layered scene, prepares a handful of frames against the
//! headless backend and logs what each layer would draw.
//!
//! Usage: `prep_demo [config.toml|config.ron]`

use nalgebra::UnitQuaternion;
use render_prep::foundation::collections::NodeId;
use render_prep::foundation::logging;
use render_prep::prelude::*;
use render_prep::scene::{AntialiasingMode, NodeKind, PathItem, TextItem, AABB};

const FRAMES: u32 = 6;
const PRESENTATION_SIZE: (u32, u32) = (1280, 720);

/// Errors that abort the demo
#[derive(Debug, thiserror::Error)]
enum DemoError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Scene construction failed
    #[error("scene: {0}")]
    Scene(#[from] SceneError),
}

struct DemoScene {
    graph: SceneGraph,
    assets: SceneAssets,
    layers: Vec<Layer>,
    spinner: NodeId,
    sun: NodeId,
}

fn load_config() -> Result<PrepConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            PrepConfig::load_from_file(&path)?
        }
        None => PrepConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn build_scene() -> Result<DemoScene, DemoError> {
    let mut graph = SceneGraph::new();
    let mut assets = SceneAssets::new();

    let world = graph.add_node(SceneNode::group("world"));
    graph.add_child(world, SceneNode::camera("main_camera", Camera::perspective(50.0, 0.1, 200.0)).at(Vec3::new(0.0, 1.0, 12.0)))?;
    let sun = graph.add_child(
        world,
        SceneNode::light("sun", Light::directional(Vec3::new(1.0, 0.95, 0.9), 1.0).with_shadows(ShadowMapQuality::Medium)),
    )?;

    let cube = assets.add_mesh(Mesh::cube(1.0));
    let pane = assets.add_mesh(Mesh::plane(2.0));
    let red = assets.add_material(Material::opaque(Vec3::new(0.8, 0.1, 0.1)));
    let glass = assets.add_material(Material::translucent(Vec3::new(0.6, 0.8, 1.0), 0.35));
    let red_alias = assets.add_material(Material::reference(red));

    let spinner = graph.add_child(world, SceneNode::group("spinner"))?;
    for i in 0..8 {
        let angle = i as f32 * std::f32::consts::TAU / 8.0;
        let position = Vec3::new(angle.cos() * 4.0, 0.0, angle.sin() * 4.0);
        let material = if i % 2 == 0 { red } else { red_alias };
        graph.add_child(spinner, SceneNode::model(format!("cube{i}"), Model::new(cube, material)).at(position))?;
    }
    for i in 0..3 {
        let z = -2.0 - i as f32 * 3.0;
        graph.add_child(world, SceneNode::model(format!("pane{i}"), Model::new(pane, glass)).at(Vec3::new(0.0, 0.0, z)))?;
    }

    let lamp_group = graph.add_child(world, SceneNode::group("lamp_group").at(Vec3::new(0.0, 0.0, -10.0)))?;
    graph.add_child(lamp_group, SceneNode::light("lamp", Light::point(Vec3::new(1.0, 0.6, 0.2), 2.0).scoped_to(lamp_group)))?;
    graph.add_child(lamp_group, SceneNode::model("lit_cube", Model::new(cube, red)))?;

    let hud = graph.add_node(SceneNode::group("hud"));
    graph.add_child(hud, SceneNode::camera("hud_camera", Camera::orthographic(10.0, 0.1, 10.0)).at(Vec3::new(0.0, 0.0, 5.0)))?;
    let label_bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::new(2.0, 0.5, 0.0));
    graph.add_child(
        hud,
        SceneNode::text("score", TextItem { text: "Score: 0".into(), bounds: label_bounds, color: Vec3::new(1.0, 1.0, 1.0) })
            .at(Vec3::new(-3.0, 4.0, 0.0)),
    )?;
    graph.add_child(hud, SceneNode::path("frame", PathItem { bounds: label_bounds, material: None }).at(Vec3::new(-3.0, 4.0, 0.0)))?;

    let layers = vec![
        Layer::new("world", world).with_antialiasing(AntialiasingMode::Msaa4),
        Layer::new("hud", hud).with_viewport(Viewport::Percent { x: 0.0, y: 0.0, width: 100.0, height: 25.0 }),
    ];

    log::info!("Scene built: {} nodes, {} meshes", graph.len(), assets.mesh_count());
    Ok(DemoScene { graph, assets, layers, spinner, sun })
}

fn animate(scene: &mut DemoScene, frame: u32) -> Result<(), DemoError> {
    let rotation = UnitQuaternion::from_axis_angle(&Vec3::y_axis(), frame as f32 * 0.25);
    let transform = Transform { rotation, ..Transform::identity() };
    scene.graph.set_transform(scene.spinner, transform)?;

    if frame == FRAMES / 2 {
        if let Some(NodeKind::Light(light)) = scene.graph.get_mut(scene.sun).map(|node| &mut node.kind) {
            log::info!("Raising sun shadow quality");
            light.shadow.quality = ShadowMapQuality::High;
        }
    }
    Ok(())
}

fn report(frame: u32, results: &[LayerPrepResult], layers: &[Layer]) {
    for (layer, result) in layers.iter().zip(results) {
        if !result.visible {
            log::info!("frame {} layer '{}': not visible", frame, layer.name);
            continue;
        }
        log::info!(
            "frame {} layer '{}': {} opaque, {} transparent, {} culled, {} lights, {} shadow maps, flags {:?}",
            frame,
            layer.name,
            result.stats.opaque,
            result.stats.transparent,
            result.stats.culled,
            result.lights.len(),
            result.stats.shadow_maps,
            result.flags
        );
        if result.requires(LayerRenderFlags::OFFSCREEN) {
            if let Some(targets) = &result.offscreen {
                log::debug!("  offscreen {}x{} x{} samples", targets.width, targets.height, targets.sample_count);
            }
        }
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let mut scene = build_scene()?;
    let mut backend = HeadlessBackend::new();
    let mut pipeline = FramePipeline::new(config);

    for frame in 0..FRAMES {
        animate(&mut scene, frame)?;
        let results = pipeline.prepare_frame(&mut backend, &mut scene.graph, &scene.assets, &scene.layers, PRESENTATION_SIZE);
        report(frame, &results, &scene.layers);
    }

    let stats = backend.stats();
    log::info!(
        "Backend: {} creates, {} resizes, {} destroys; pool holds {} resources",
        stats.creates, stats.resizes, stats.destroys, pipeline.pool().live_count()
    );
    pipeline.destroy(&mut backend);
    log::info!("Backend resources left: {}", backend.live_count());
    Ok(())
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        log::error!("prep_demo failed: {}", err);
        std::process::exit(1);
    }
}
