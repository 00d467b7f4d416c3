//! Headless frame loop over the dummy backend.
//!
//! Compiles a small set of WGSL pipelines, builds a shadow / opaque /
//! post-process graph and records frames, logging what each frame recorded.
//!
//! ```bash
//! # Ten frames, two shadow-casting lights
//! cargo run --example frame_loop -- --frames 10 --lights 2
//!
//! # Simulate a GPU two frames behind with double buffering
//! RUST_LOG=debug cargo run --example frame_loop -- --frames-in-flight 2 --gpu-backlog 2
//! ```

use std::sync::Arc;

use clap::Parser;
use reflex_render::backend::{
    BufferDescriptor, DummyBackend, FenceMode, FixedFunctionState, GeometryView, GpuBackend,
    RecordedCommand, RenderTarget, TextureDescriptor, TextureFormat, TextureUsage,
};
use reflex_render::scene::constants::{DirectionalLight, InstanceData, MaterialData, PassConstants};
use reflex_render::scene::{DrawItem, InstanceBufferId, RenderLayer, SceneData, ShadowView};
use reflex_render::{
    init_logging, Engine, EngineConfig, EngineResult, NodeDescriptor, PipelineBuilder,
    ShaderStage, StageDescriptor,
};

const SCENE_WGSL: &str = r#"
struct Pass {
    view_proj: mat4x4<f32>,
    ambient_light: vec4<f32>,
}

struct Instance {
    world: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> cbPass: Pass;
@group(1) @binding(0) var<storage, read> gInstanceData: array<Instance>;
@group(0) @binding(1) var gShadowMaps: texture_depth_2d;
@group(0) @binding(2) var gsamShadow: sampler_comparison;

@vertex
fn vs_main(@location(0) position: vec3<f32>, @builtin(instance_index) instance: u32) -> @builtin(position) vec4<f32> {
    return cbPass.view_proj * gInstanceData[instance].world * vec4<f32>(position, 1.0);
}

@fragment
fn ps_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let lit = textureSampleCompare(gShadowMaps, gsamShadow, position.xy, position.z);
    return cbPass.ambient_light * lit;
}

@fragment
fn shadow_ps() {}
"#;

const POST_WGSL: &str = r#"
@group(0) @binding(0) var gInput: texture_2d<f32>;
@group(0) @binding(1) var gsamPointClamp: sampler;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn ps_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(gInput, gsamPointClamp, position.xy);
}
"#;

/// Record frames of a generated scene on the dummy backend
#[derive(Debug, Parser)]
#[command(name = "frame_loop")]
struct Args {
    /// Number of frames to record
    #[arg(long, default_value_t = 6)]
    frames: u64,

    /// Frame resource slots
    #[arg(long, default_value_t = 3)]
    frames_in_flight: usize,

    /// Frames the simulated GPU trails the CPU by
    #[arg(long, default_value_t = 1)]
    gpu_backlog: u64,

    /// Shadow-casting directional lights
    #[arg(long, default_value_t = 1)]
    lights: usize,

    /// Opaque meshes in the scene
    #[arg(long, default_value_t = 4)]
    meshes: u64,

    /// Node to disable after the first frame
    #[arg(long)]
    disable: Option<String>,
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        log::error!("frame_loop failed: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> EngineResult<()> {
    let mut backend = DummyBackend::new();
    backend.set_fence_mode(FenceMode::Backlog(args.gpu_backlog));
    let commands = backend.command_log();

    let config = EngineConfig {
        frames_in_flight: args.frames_in_flight,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(backend, config)?;
    register_pipelines(&mut engine)?;

    engine.build_graph(&[
        NodeDescriptor::new("Shadow", "ShadowPSO").with_next("Opaque"),
        NodeDescriptor::new("Opaque", "OpaquePSO").with_next("PostProcess"),
        NodeDescriptor::new("PostProcess", "PostProcessPSO"),
    ])?;

    let scene = build_scene(engine.backend_mut(), args)?;

    for frame in 0..args.frames {
        if frame == 1 {
            if let Some(node) = &args.disable {
                engine.set_node_enabled(node, false)?;
            }
        }

        commands.clear();
        engine.render_frame(&scene)?;
        log::info!(
            "Frame {}: slot {}, {} commands, {} draws, nodes [{}]",
            frame,
            engine.ring().current_index(),
            commands.len(),
            commands.count(RecordedCommand::is_draw),
            commands.events().join(", ")
        );
    }

    log::info!(
        "Recorded {} frames; GPU completed fence {} of {}",
        engine.ring().frame_count(),
        engine.backend().completed_fence_value(),
        engine.backend().last_signaled()
    );
    engine.shutdown()?;
    Ok(())
}

fn register_pipelines(engine: &mut Engine<DummyBackend>) -> EngineResult<()> {
    let compile = |engine: &Engine<DummyBackend>, stage, entry: &str, file: &str, source: &str| {
        engine
            .compiler()
            .compile_source(&StageDescriptor::new(stage, entry, file), source)
            .map(Arc::new)
    };

    let scene_vs = compile(&*engine, ShaderStage::Vertex, "vs_main", "scene.wgsl", SCENE_WGSL)?;
    let scene_ps = compile(&*engine, ShaderStage::Pixel, "ps_main", "scene.wgsl", SCENE_WGSL)?;
    let shadow_ps = compile(&*engine, ShaderStage::Pixel, "shadow_ps", "scene.wgsl", SCENE_WGSL)?;
    let post_vs = compile(&*engine, ShaderStage::Vertex, "vs_main", "post.wgsl", POST_WGSL)?;
    let post_ps = compile(&*engine, ShaderStage::Pixel, "ps_main", "post.wgsl", POST_WGSL)?;

    engine.register_pipeline(
        PipelineBuilder::graphics("OpaquePSO").with_modules([Arc::clone(&scene_vs), scene_ps]),
    )?;
    engine.register_pipeline(
        PipelineBuilder::graphics("ShadowPSO")
            .with_modules([scene_vs, shadow_ps])
            .with_fixed_function(FixedFunctionState::shadow_map()),
    )?;
    engine.register_pipeline(
        PipelineBuilder::graphics("PostProcessPSO")
            .with_modules([post_vs, post_ps])
            .with_fixed_function(FixedFunctionState::full_screen()),
    )?;
    Ok(())
}

fn build_scene(backend: &mut dyn GpuBackend, args: &Args) -> EngineResult<SceneData> {
    let mut buffer = |label: &str, size: u64| {
        backend.create_buffer(&BufferDescriptor {
            label: Some(label.to_string()),
            size,
            constant_buffer: false,
        })
    };
    let geometry = GeometryView {
        vertex_buffer: buffer("cube_vertices", 24 * 32)?,
        index_buffer: buffer("cube_indices", 36 * 4)?,
        index_count: 36,
        start_index: 0,
        base_vertex: 0,
    };

    let mut scene = SceneData::new();
    scene.materials.push(MaterialData::default());
    for mesh in 0..args.meshes {
        let id = InstanceBufferId(mesh);
        scene.set_instances(id, vec![InstanceData::default(); 3]);
        scene.add_item(
            RenderLayer::Opaque,
            DrawItem {
                name: format!("cube{mesh}"),
                geometry,
                instances: id,
                instance_count: 3,
            },
        );
    }

    for light in 0..args.lights {
        let depth = backend.create_texture(&TextureDescriptor {
            label: Some(format!("shadow_map{light}")),
            width: 1024,
            height: 1024,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            ..Default::default()
        })?;
        scene.directional_lights.push(DirectionalLight::default());
        scene.shadow_views.push(ShadowView {
            pass: PassConstants::default(),
            target: RenderTarget::new(depth, 1024, 1024).with_depth(depth),
        });
    }
    Ok(scene)
}
