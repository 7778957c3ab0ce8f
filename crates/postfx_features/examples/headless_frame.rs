//! Headless Frame Demo
//!
//! Drives the three post-processing features through a few frames on the
//! headless backend, including a resize and an editor camera.
//!
//! Run with: RUST_LOG=debug cargo run -p postfx_features --example headless_frame

use postfx_features::{RendererConfig, NORMALS_SHADER, OUTLINES_SHADER};
use postfx_render::prelude::*;
use postfx_render::{Id, MaterialHandle, ShaderTagId, VisibleRenderer};

const CONFIG: &str = r#"{
    "features": [
        { "name": "Blur", "kind": "blur",
          "settings": { "horizontal_blur": 0.2, "vertical_blur": 0.1, "shader": "Hidden/Blur" } },
        { "name": "Desaturation", "kind": "desaturation",
          "settings": { "saturation": 0.25, "layer_mask": 4294967295, "render_layer_mask": 0,
                        "fullscreen_shader": "Shader Graphs/Desaturate" } },
        { "name": "Outlines", "kind": "outline",
          "settings": { "layer_mask": 1, "render_layer_mask": 0 } }
    ]
}"#;

fn camera(backend: &mut HeadlessBackend, camera_type: CameraType, width: u32, height: u32) -> CameraData {
    let descriptor = TargetDescriptor::new(width, height);
    CameraData {
        camera_type,
        descriptor,
        color_target: backend
            .create_camera_target("camera_color", &descriptor)
            .expect("camera color target"),
        depth_target: backend
            .create_camera_target("camera_depth", &descriptor)
            .expect("camera depth target"),
        opaque_sorting: SortingCriteria::CommonOpaque,
    }
}

fn scene() -> CullResults {
    let renderers = (0..8u64)
        .map(|id| VisibleRenderer {
            id,
            layer: (id % 2) as u8,
            rendering_layer_mask: 1,
            render_queue: 2000,
            shader_tags: vec![ShaderTagId::new("UniversalForward")],
            material: MaterialHandle(Id::new(100 + id as u32, 0)),
            distance: id as f32 * 2.5,
        })
        .collect();
    CullResults::new(renderers)
}

fn main() {
    env_logger::init();

    println!("===========================================");
    println!("  Post-Processing Headless Frame Demo");
    println!("===========================================");
    println!();

    let mut backend = HeadlessBackend::with_shaders([
        "Hidden/Blur",
        "Shader Graphs/Desaturate",
        NORMALS_SHADER,
        OUTLINES_SHADER,
    ]);

    let config = RendererConfig::from_json_str(CONFIG).expect("valid config");
    let mut scheduler = FrameScheduler::new(ExecutionContext::Play);
    for feature in config.build_features().expect("features") {
        let name = feature.name().to_string();
        let active = scheduler.add_feature(&mut backend, feature);
        println!("Feature {:<14} active: {}", name, active);
    }
    println!();

    let cull = scene();
    let game = camera(&mut backend, CameraType::Game, 1920, 1080);
    let resized = camera(&mut backend, CameraType::Game, 1280, 720);
    let scene_view = camera(&mut backend, CameraType::SceneView, 1280, 720);

    for (label, cam) in [
        ("game 1920x1080", &game),
        ("game 1920x1080", &game),
        ("game 1280x720", &resized),
        ("scene view", &scene_view),
    ] {
        let frame = scheduler.setup_camera(&mut backend, cam);
        let index = frame.frame();
        let passes = frame.pass_names();
        let executed = frame.execute(&mut backend, &cull);
        println!("Frame {} ({}): {:?}, {} executed", index, label, passes, executed);
    }
    println!();

    let allocated_before_shutdown = backend.stats().textures_allocated;
    scheduler.shutdown(&mut backend);

    let stats = backend.stats();
    println!("Frame stats:   {:?}", scheduler.stats());
    println!("Buffers submitted:   {}", stats.buffers_submitted);
    println!("Textures allocated:  {}", allocated_before_shutdown);
    println!("Textures released:   {}", stats.textures_released);
    println!("Materials destroyed: {} of {}", stats.materials_destroyed, stats.materials_created);
    println!("Live materials:      {}", backend.live_materials());
}
