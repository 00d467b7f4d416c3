//! Shared fixtures for the integration tests.
//!
//! Shader modules are assembled from hand-written reflection data so the
//! tests do not depend on shader sources; everything records through the
//! dummy backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use reflex_render::backend::{
    BufferDescriptor, BufferHandle, CommandLog, DummyBackend, FixedFunctionState, GeometryView,
    GpuBackend, RecordedCommand, RenderTarget, TextureDescriptor, TextureFormat, TextureUsage,
};
use reflex_render::scene::{
    DrawItem, InstanceBufferId, RenderLayer, SceneData, ShadowView,
};
use reflex_render::scene::constants::{
    DirectionalLight, InstanceData, MaterialData, PassConstants,
};
use reflex_render::shader::{ReflectedBinding, ResourceCategory};
use reflex_render::{
    Engine, EngineConfig, PipelineBuilder, PipelineRegistry, ShaderModule, ShaderStage,
};

pub const OPAQUE_PSO: &str = "OpaquePSO";
pub const SHADOW_PSO: &str = "ShadowPSO";
pub const SKY_PSO: &str = "SkyPSO";
pub const POST_PSO: &str = "PostProcessPSO";
pub const DEBUG_PSO: &str = "FrustumDebugPSO";
pub const RAYTRACING_PSO: &str = "RaytracingPSO";
pub const BLUR_PSO: &str = "BlurPSO";

pub fn module(stage: ShaderStage, entry: &str, bindings: Vec<ReflectedBinding>) -> Arc<ShaderModule> {
    // Distinct bytes per entry point so stage-set signatures differ
    let bytecode: Vec<u8> = entry.bytes().collect();
    Arc::new(ShaderModule::from_parts(stage, entry, bytecode, bindings))
}

pub fn sampler(name: &str, register: u32) -> ReflectedBinding {
    ReflectedBinding::new(name, ResourceCategory::Sampler, register)
}

/// Vertex stage of the lit opaque pipeline
pub fn opaque_vs() -> Arc<ShaderModule> {
    module(
        ShaderStage::Vertex,
        "VS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::structured_buffer("gInstanceData", 0).with_space(1),
        ],
    )
}

/// Pixel stage of the lit opaque pipeline
pub fn opaque_ps() -> Arc<ShaderModule> {
    module(
        ShaderStage::Pixel,
        "PS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::structured_buffer("gMaterialData", 1).with_space(1),
            ReflectedBinding::structured_buffer("gDirectionalLights", 2).with_space(1),
            ReflectedBinding::texture("gTextureMaps", 0).with_count(8),
            ReflectedBinding::texture("gShadowMaps", 8),
            sampler("gsamLinearWrap", 2),
        ],
    )
}

pub fn shadow_vs() -> Arc<ShaderModule> {
    module(
        ShaderStage::Vertex,
        "ShadowVS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::structured_buffer("gInstanceData", 0).with_space(1),
            ReflectedBinding::structured_buffer("gMaterialData", 1).with_space(1),
        ],
    )
}

pub fn shadow_ps() -> Arc<ShaderModule> {
    module(ShaderStage::Pixel, "ShadowPS", vec![sampler("gsamPointClamp", 1)])
}

pub fn sky_ps() -> Arc<ShaderModule> {
    module(
        ShaderStage::Pixel,
        "SkyPS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::texture("gCubeMap", 0),
        ],
    )
}

pub fn post_vs() -> Arc<ShaderModule> {
    module(ShaderStage::Vertex, "FullScreenVS", Vec::new())
}

pub fn post_ps() -> Arc<ShaderModule> {
    module(
        ShaderStage::Pixel,
        "PostPS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::constant_buffer("cbSsao", 1),
            ReflectedBinding::texture("gInput", 0),
            ReflectedBinding::texture("gSsaoMap", 1),
        ],
    )
}

pub fn debug_vs() -> Arc<ShaderModule> {
    module(
        ShaderStage::Vertex,
        "FrustumVS",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::constant_buffer("cbCamera", 1),
            ReflectedBinding::constant_buffer("cbFrustumCorners", 2),
        ],
    )
}

pub fn debug_ps() -> Arc<ShaderModule> {
    module(ShaderStage::Pixel, "FrustumPS", Vec::new())
}

pub fn raygen() -> Arc<ShaderModule> {
    module(
        ShaderStage::RayGeneration,
        "RayGen",
        vec![
            ReflectedBinding::constant_buffer("cbPass", 0),
            ReflectedBinding::new("gScene", ResourceCategory::AccelerationStructure, 0),
            ReflectedBinding::new("gOutput", ResourceCategory::ReadWrite, 0),
        ],
    )
}

pub fn closest_hit() -> Arc<ShaderModule> {
    module(
        ShaderStage::ClosestHit,
        "ClosestHit",
        vec![
            ReflectedBinding::structured_buffer("gInstanceData", 1),
            ReflectedBinding::structured_buffer("gVertexData", 2),
        ],
    )
}

pub fn miss() -> Arc<ShaderModule> {
    module(ShaderStage::Miss, "Miss", Vec::new())
}

/// Separable blur: reads `gInput`, writes `gOutput`
pub fn blur_cs() -> Arc<ShaderModule> {
    module(
        ShaderStage::Compute,
        "BlurCS",
        vec![
            ReflectedBinding::texture("gInput", 0),
            ReflectedBinding::new("gOutput", ResourceCategory::ReadWrite, 0),
        ],
    )
}

/// Builders for every pipeline the standard graph uses
pub fn standard_pipelines() -> Vec<PipelineBuilder> {
    vec![
        PipelineBuilder::graphics(OPAQUE_PSO).with_modules([opaque_vs(), opaque_ps()]),
        PipelineBuilder::graphics(SHADOW_PSO)
            .with_modules([shadow_vs(), shadow_ps()])
            .with_fixed_function(FixedFunctionState::shadow_map()),
        PipelineBuilder::graphics(SKY_PSO)
            .with_modules([opaque_vs(), sky_ps()])
            .with_fixed_function(FixedFunctionState::sky()),
        PipelineBuilder::graphics(POST_PSO)
            .with_modules([post_vs(), post_ps()])
            .with_fixed_function(FixedFunctionState::full_screen()),
        PipelineBuilder::graphics(DEBUG_PSO).with_modules([debug_vs(), debug_ps()]),
        PipelineBuilder::raytracing(RAYTRACING_PSO).with_modules([raygen(), closest_hit(), miss()]),
        PipelineBuilder::compute(BLUR_PSO).with_module(blur_cs()),
    ]
}

pub fn registry_with_standard_pipelines(backend: &mut DummyBackend) -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    for builder in standard_pipelines() {
        builder
            .build(&mut registry, backend)
            .expect("standard pipeline should build");
    }
    registry
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        frames_in_flight: 3,
        fence_timeout: Duration::from_millis(50),
        output_width: 320,
        output_height: 180,
        ..EngineConfig::default()
    }
}

/// Engine over a dummy backend with the standard pipelines registered.
///
/// The returned log observes every command the engine records.
pub fn engine_with_pipelines(backend: DummyBackend) -> (Engine<DummyBackend>, CommandLog) {
    let log = backend.command_log();
    let mut engine = Engine::new(backend, test_config()).expect("engine should start");
    for builder in standard_pipelines() {
        engine
            .register_pipeline(builder)
            .expect("standard pipeline should build");
    }
    (engine, log)
}

pub fn create_buffer(backend: &mut dyn GpuBackend, label: &str, size: u64) -> BufferHandle {
    backend
        .create_buffer(&BufferDescriptor {
            label: Some(label.to_string()),
            size,
            constant_buffer: false,
        })
        .expect("dummy buffer creation")
}

pub fn create_target(backend: &mut dyn GpuBackend, label: &str, size: u32, layers: u32) -> RenderTarget {
    let color = backend
        .create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width: size,
            height: size,
            array_layers: layers,
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
            ..Default::default()
        })
        .expect("dummy texture creation");
    let depth = backend
        .create_texture(&TextureDescriptor {
            label: Some(format!("{label}_depth")),
            width: size,
            height: size,
            array_layers: layers,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::DEPTH_STENCIL,
            ..Default::default()
        })
        .expect("dummy texture creation");
    RenderTarget::new(color, size, size).with_depth(depth)
}

pub fn geometry(backend: &mut dyn GpuBackend, index_count: u32) -> GeometryView {
    GeometryView {
        vertex_buffer: create_buffer(backend, "vertices", 1024),
        index_buffer: create_buffer(backend, "indices", 256),
        index_count,
        start_index: 0,
        base_vertex: 0,
    }
}

/// A scene with `items` opaque items, each with its own instance buffer
/// holding two instances, plus one material and one directional light.
pub fn opaque_scene(backend: &mut dyn GpuBackend, items: u64) -> SceneData {
    let mut scene = SceneData::new();
    scene.materials.push(MaterialData::default());
    scene.directional_lights.push(DirectionalLight::default());

    for i in 0..items {
        let id = InstanceBufferId(i);
        scene.set_instances(id, vec![InstanceData::default(); 2]);
        scene.add_item(
            RenderLayer::Opaque,
            DrawItem {
                name: format!("mesh{i}"),
                geometry: geometry(backend, 36),
                instances: id,
                instance_count: 2,
            },
        );
    }
    scene
}

/// Add `count` shadow-casting lights, each with its own depth target.
pub fn add_shadow_views(backend: &mut dyn GpuBackend, scene: &mut SceneData, count: usize) {
    for i in 0..count {
        let target = create_target(backend, &format!("shadow{i}"), 512, 1);
        scene.shadow_views.push(ShadowView {
            pass: PassConstants::default(),
            target,
        });
    }
}

pub fn draw_count(commands: &[RecordedCommand]) -> usize {
    commands.iter().filter(|c| c.is_draw()).count()
}
