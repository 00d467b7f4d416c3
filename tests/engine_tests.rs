//! End-to-end engine tests: shader sources on disk through compilation,
//! layout resolution and pipeline creation, then frames through the graph.

mod common;

use std::path::{Path, PathBuf};

use rstest::rstest;

use common::{engine_with_pipelines, opaque_scene, test_config, OPAQUE_PSO, POST_PSO};
use reflex_render::backend::{DummyBackend, FenceMode, RecordedCommand, VertexFormat};
use reflex_render::binding::StageVisibility;
use reflex_render::frame::BufferCategory;
use reflex_render::scene::constants::MaterialData;
use reflex_render::{
    Engine, EngineConfig, EngineError, GpuBackend, NodeDescriptor, PipelineDescriptor, PipelineKind,
    ShaderStage, StageDescriptor,
};

const OPAQUE_WGSL: &str = r#"
#include "common.wgsl"

@group(0) @binding(0) var<uniform> cbPass: Pass;
@group(1) @binding(0) var<storage, read> gInstanceData: array<Instance>;
@group(0) @binding(1) var gDiffuseMap: texture_2d<f32>;
@group(0) @binding(2) var gsamLinearWrap: sampler;

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @builtin(instance_index) instance: u32,
) -> @builtin(position) vec4<f32> {
    let world = gInstanceData[instance].world * vec4<f32>(position, 1.0);
    return cbPass.view_proj * world + vec4<f32>(uv, 0.0, 0.0) * 0.0;
}

@fragment
fn ps_main() -> @location(0) vec4<f32> {
    let albedo = textureSample(gDiffuseMap, gsamLinearWrap, vec2<f32>(0.5, 0.5));
    return albedo * cbPass.ambient_light;
}
"#;

const COMMON_WGSL: &str = r#"
struct Pass {
    view_proj: mat4x4<f32>,
    ambient_light: vec4<f32>,
}

struct Instance {
    world: mat4x4<f32>,
}
"#;

const FULL_SCREEN_WGSL: &str = r#"
@group(0) @binding(0) var gInput: texture_2d<f32>;
@group(0) @binding(1) var gsamPointClamp: sampler;

@vertex
fn fs_vs(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_ps(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(gInput, gsamPointClamp, position.xy);
}
"#;

const BLUR_WGSL: &str = r#"
@group(0) @binding(0) var gInput: texture_2d<f32>;
@group(0) @binding(1) var gOutput: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let color = textureLoad(gInput, vec2<i32>(id.xy), 0);
    textureStore(gOutput, vec2<i32>(id.xy), color);
}
"#;

/// Scratch directory holding the test shaders, removed on drop
struct ShaderDir {
    root: PathBuf,
}

impl ShaderDir {
    fn new(test: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "reflex_render_{}_{}",
            test,
            std::process::id()
        ));
        let include = root.join("include");
        std::fs::create_dir_all(&include).unwrap();
        std::fs::write(include.join("common.wgsl"), COMMON_WGSL).unwrap();
        std::fs::write(root.join("opaque.wgsl"), OPAQUE_WGSL).unwrap();
        std::fs::write(root.join("full_screen.wgsl"), FULL_SCREEN_WGSL).unwrap();
        std::fs::write(root.join("blur.wgsl"), BLUR_WGSL).unwrap();
        Self { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn include_dir(&self) -> PathBuf {
        self.root.join("include")
    }
}

impl Drop for ShaderDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn pipeline_descriptors(dir: &ShaderDir) -> Vec<PipelineDescriptor> {
    let stage = |stage: ShaderStage, entry: &str, file: &str| {
        StageDescriptor::new(stage, entry, dir.path(file))
    };
    vec![
        PipelineDescriptor::new(OPAQUE_PSO, PipelineKind::Graphics)
            .with_stage(stage(ShaderStage::Vertex, "vs_main", "opaque.wgsl"))
            .with_stage(stage(ShaderStage::Pixel, "ps_main", "opaque.wgsl")),
        PipelineDescriptor::new(POST_PSO, PipelineKind::Graphics)
            .with_stage(stage(ShaderStage::Vertex, "fs_vs", "full_screen.wgsl"))
            .with_stage(stage(ShaderStage::Pixel, "fs_ps", "full_screen.wgsl")),
        PipelineDescriptor::new("BlurPSO", PipelineKind::Compute)
            .with_stage(stage(ShaderStage::Compute, "cs_main", "blur.wgsl")),
    ]
}

fn engine_for(dir: &ShaderDir, backend: DummyBackend) -> Engine<DummyBackend> {
    let config = EngineConfig {
        shader_include_dirs: vec![dir.include_dir()],
        ..test_config()
    };
    Engine::new(backend, config).unwrap()
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[test]
fn test_pipelines_from_source_render_frames() {
    let dir = ShaderDir::new("render");
    let backend = DummyBackend::new();
    let log = backend.command_log();
    let mut engine = engine_for(&dir, backend);

    engine.load_pipelines(&pipeline_descriptors(&dir)).unwrap();
    assert_eq!(engine.registry().len(), 3);
    assert_eq!(engine.backend().pipelines().len(), 3);

    let opaque = engine.registry().find(OPAQUE_PSO).unwrap();
    let layout = opaque.layout();
    let names: Vec<&str> = layout.slots().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["cbPass", "gInstanceData", "gDiffuseMap"]);
    assert_eq!(
        layout.slot("cbPass").unwrap().visibility,
        StageVisibility::VERTEX | StageVisibility::PIXEL
    );
    assert_eq!(layout.slot("gInstanceData").unwrap().space, 1);

    let inputs = opaque.input_layout();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].format, VertexFormat::Float32x3);
    assert_eq!(inputs[1].offset, 12);
    assert_eq!(
        opaque
            .module(ShaderStage::Vertex)
            .and_then(|m| m.source_path())
            .and_then(file_name),
        Some("opaque.wgsl")
    );

    let blur = engine.registry().find("BlurPSO").unwrap();
    assert_eq!(blur.kind(), PipelineKind::Compute);
    assert!(blur.fixed_function().is_none());

    engine
        .build_graph(&[
            NodeDescriptor::new("PostProcess", POST_PSO),
            NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("PostProcess"),
        ])
        .unwrap();

    let scene = opaque_scene(engine.backend_mut(), 2);
    for _ in 0..5 {
        let target = engine.render_frame(&scene).unwrap();
        assert_eq!(target, engine.primary_target());
    }

    assert_eq!(engine.ring().frame_count(), 5);
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::Signal(_))), 5);
    assert_eq!(log.events().len(), 10);
    assert_eq!(
        log.count(|c| matches!(c, RecordedCommand::DrawIndexed { .. })),
        10
    );
}

#[test]
fn test_load_stops_at_first_failing_pipeline() {
    let dir = ShaderDir::new("missing");
    let mut engine = engine_for(&dir, DummyBackend::new());

    let mut descriptors = pipeline_descriptors(&dir);
    descriptors.insert(
        1,
        PipelineDescriptor::new("Broken", PipelineKind::Graphics)
            .with_stage(StageDescriptor::new(
                ShaderStage::Vertex,
                "vs_main",
                dir.path("does_not_exist.wgsl"),
            )),
    );

    let err = engine.load_pipelines(&descriptors).unwrap_err();
    match &err {
        EngineError::Compilation { path, diagnostic } => {
            assert_eq!(file_name(path), Some("does_not_exist.wgsl"));
            assert!(diagnostic.contains("cannot read source"));
        }
        other => panic!("expected a compilation error, got {other:?}"),
    }
    assert!(!err.is_fatal());

    // Pipelines before the failure stay registered
    assert!(engine.registry().contains(OPAQUE_PSO));
    assert!(!engine.registry().contains(POST_PSO));
}

#[rstest]
#[case::graphics_without_vertex(
    PipelineKind::Graphics,
    vec![(ShaderStage::Pixel, "ps_main", "opaque.wgsl")]
)]
#[case::compute_with_vertex(
    PipelineKind::Compute,
    vec![
        (ShaderStage::Compute, "cs_main", "blur.wgsl"),
        (ShaderStage::Vertex, "vs_main", "opaque.wgsl"),
    ]
)]
fn test_invalid_stage_sets_rejected(
    #[case] kind: PipelineKind,
    #[case] stages: Vec<(ShaderStage, &str, &str)>,
) {
    let dir = ShaderDir::new(&format!("stages_{kind:?}"));
    let mut engine = engine_for(&dir, DummyBackend::new());

    let mut descriptor = PipelineDescriptor::new("Invalid", kind);
    for (stage, entry, file) in stages {
        descriptor = descriptor.with_stage(StageDescriptor::new(stage, entry, dir.path(file)));
    }

    let err = engine.load_pipelines(&[descriptor]).unwrap_err();
    assert!(matches!(
        err,
        EngineError::MissingStage { .. } | EngineError::UnexpectedStage { .. }
    ));
    assert!(err.is_configuration());
    assert!(engine.backend().pipelines().is_empty());
}

#[test]
fn test_driver_rejection_is_fatal() {
    let mut backend = DummyBackend::new();
    backend.fail_pipeline(POST_PSO);
    let dir = ShaderDir::new("driver");
    let mut engine = engine_for(&dir, backend);

    let err = engine.load_pipelines(&pipeline_descriptors(&dir)).unwrap_err();
    assert!(matches!(&err, EngineError::GpuCreation { pipeline, .. } if pipeline == POST_PSO));
    assert!(err.is_fatal());
    assert!(!engine.registry().contains(POST_PSO));
}

#[rstest]
#[case::no_frames(EngineConfig { frames_in_flight: 0, ..test_config() })]
#[case::empty_output(EngineConfig { output_width: 0, ..test_config() })]
fn test_invalid_config_rejected(#[case] config: EngineConfig) {
    let err = Engine::new(DummyBackend::new(), config).err().unwrap();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
}

#[test]
fn test_frames_pace_against_slow_gpu() {
    // The GPU finishes nothing unless the CPU blocks on it
    let (mut engine, _log) = engine_with_pipelines(DummyBackend::with_gpu_backlog(u64::MAX));
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", OPAQUE_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 1);

    for _ in 0..6 {
        engine.render_frame(&scene).unwrap();
    }

    // Three frames in flight: frames 4..6 each waited for the frame three back
    assert_eq!(engine.backend().fence_waits(), [1, 2, 3]);
    assert_eq!(engine.backend().last_signaled(), 6);
}

#[test]
fn test_hung_gpu_fails_the_frame() {
    let mut backend = DummyBackend::new();
    backend.set_fence_mode(FenceMode::Stalled);
    let (mut engine, _log) = engine_with_pipelines(backend);
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", OPAQUE_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 1);

    for _ in 0..3 {
        engine.render_frame(&scene).unwrap();
    }
    let err = engine.render_frame(&scene).unwrap_err();
    assert!(matches!(err, EngineError::FenceTimeout { slot: 0, fence_value: 1, .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_scene_growth_resizes_frame_buffers() {
    let (mut engine, _log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", OPAQUE_PSO)])
        .unwrap();
    let mut scene = opaque_scene(engine.backend_mut(), 1);
    engine.render_frame(&scene).unwrap();

    let materials = engine.config().max_materials as usize * 3;
    scene.materials = vec![MaterialData::default(); materials];
    engine.render_frame(&scene).unwrap();

    assert!(engine.ring().current().capacity(BufferCategory::Material) >= materials as u32);
    assert_eq!(
        engine.backend().completed_fence_value(),
        engine.backend().last_signaled()
    );
}

#[test]
fn test_shutdown_releases_frame_buffers() {
    let backend = DummyBackend::new();
    let (mut engine, _log) = engine_with_pipelines(backend);
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", OPAQUE_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 0);
    engine.render_frame(&scene).unwrap();
    assert!(engine.backend().live_buffer_count() > 0);

    let backend = engine.shutdown().unwrap();
    assert_eq!(backend.live_buffer_count(), 0);
}
