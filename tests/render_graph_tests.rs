//! Render graph construction and per-node recording.
//!
//! Frames are recorded through an [`Engine`] over the dummy backend and the
//! command log is inspected per node, using each node's debug region.

mod common;

use rstest::rstest;

use common::{
    add_shadow_views, create_buffer, create_target, draw_count, engine_with_pipelines, geometry,
    opaque_scene, registry_with_standard_pipelines, BLUR_PSO, DEBUG_PSO, OPAQUE_PSO, POST_PSO,
    RAYTRACING_PSO, SHADOW_PSO, SKY_PSO,
};
use reflex_render::backend::{
    BindingResource, DummyBackend, GpuBackend, RecordedCommand,
};
use reflex_render::render_graph::{GraphError, NodeKind};
use reflex_render::scene::{
    DrawItem, InstanceBufferId, InstanceData, RaytracingResources, RenderLayer, SHADOW_PASS_BASE,
};
use reflex_render::{EngineError, NodeDescriptor, PipelineKind, RenderGraph};

/// Shadow -> Opaque -> Sky -> PostProcess, declared out of order
fn standard_nodes() -> Vec<NodeDescriptor> {
    vec![
        NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("Sky"),
        NodeDescriptor::new("PostProcess", POST_PSO),
        NodeDescriptor::new("Shadow", SHADOW_PSO).with_next("Opaque"),
        NodeDescriptor::new("Sky", SKY_PSO).with_next("PostProcess"),
    ]
}

fn constant_buffer_offset(command: &RecordedCommand) -> Option<(u32, u64)> {
    match command {
        RecordedCommand::Bind {
            slot,
            resource: BindingResource::ConstantBuffer { offset, .. },
        } => Some((*slot, *offset)),
        _ => None,
    }
}

#[test]
fn test_graph_follows_next_links() {
    let mut backend = DummyBackend::new();
    let registry = registry_with_standard_pipelines(&mut backend);

    let graph = RenderGraph::build(&standard_nodes(), &registry).unwrap();

    assert_eq!(graph.node_names(), ["Shadow", "Opaque", "Sky", "PostProcess"]);
    assert_eq!(graph.head(), Some("Shadow"));
    assert_eq!(
        graph.node("Shadow").unwrap().base().kind(),
        NodeKind::ShadowMap
    );
    assert_eq!(
        graph.node("PostProcess").unwrap().base().kind(),
        NodeKind::FullScreen
    );
    assert_eq!(
        graph.node("Sky").unwrap().base().render_layer(),
        Some(RenderLayer::Sky)
    );
}

#[rstest]
#[case::unknown_pipeline(
    vec![NodeDescriptor::new("Opaque", "MissingPSO")],
    GraphError::UnknownPipeline { node: "Opaque".into(), pipeline: "MissingPSO".into() }
)]
#[case::unknown_layer(
    vec![NodeDescriptor::new("Opaque", OPAQUE_PSO).with_layer("Foliage")],
    GraphError::UnknownRenderLayer { node: "Opaque".into(), layer: "Foliage".into() }
)]
#[case::two_heads(
    vec![
        NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("PostProcess"),
        NodeDescriptor::new("Sky", SKY_PSO).with_next("PostProcess"),
        NodeDescriptor::new("PostProcess", POST_PSO),
    ],
    GraphError::MultipleHeads(vec!["Opaque".into(), "Sky".into()])
)]
#[case::dangling_next(
    vec![NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("Bloom")],
    GraphError::UnknownNext { node: "Opaque".into(), next: "Bloom".into() }
)]
#[case::cycle(
    vec![
        NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("Sky"),
        NodeDescriptor::new("Sky", SKY_PSO).with_next("Opaque"),
    ],
    GraphError::NoHead
)]
#[case::raytracing_on_graphics(
    vec![NodeDescriptor::new("Raytracing", OPAQUE_PSO)],
    GraphError::PipelineKindMismatch {
        node: "Raytracing".into(),
        pipeline: OPAQUE_PSO.into(),
        expected: PipelineKind::Raytracing,
        found: PipelineKind::Graphics,
    }
)]
#[case::opaque_on_raytracing(
    vec![NodeDescriptor::new("Opaque", RAYTRACING_PSO)],
    GraphError::PipelineKindMismatch {
        node: "Opaque".into(),
        pipeline: RAYTRACING_PSO.into(),
        expected: PipelineKind::Graphics,
        found: PipelineKind::Raytracing,
    }
)]
#[case::post_process_on_compute(
    vec![NodeDescriptor::new("PostProcess", BLUR_PSO)],
    GraphError::PipelineKindMismatch {
        node: "PostProcess".into(),
        pipeline: BLUR_PSO.into(),
        expected: PipelineKind::Graphics,
        found: PipelineKind::Compute,
    }
)]
#[case::blur_on_graphics(
    vec![NodeDescriptor::new("Blur", POST_PSO)],
    GraphError::PipelineKindMismatch {
        node: "Blur".into(),
        pipeline: POST_PSO.into(),
        expected: PipelineKind::Compute,
        found: PipelineKind::Graphics,
    }
)]
fn test_invalid_graph_rejected(#[case] nodes: Vec<NodeDescriptor>, #[case] expected: GraphError) {
    let (mut engine, _log) = engine_with_pipelines(DummyBackend::new());

    let err = engine.build_graph(&nodes).unwrap_err();

    assert!(err.is_configuration());
    assert!(!err.is_fatal());
    match err {
        EngineError::Graph(graph) => assert_eq!(graph, expected),
        other => panic!("expected a graph error, got {other:?}"),
    }
    assert!(engine.graph().is_none());
}

#[test]
fn test_unknown_node_type_falls_back_to_default() {
    let mut backend = DummyBackend::new();
    let registry = registry_with_standard_pipelines(&mut backend);

    let nodes = [NodeDescriptor::new("Bloom", POST_PSO).with_layer("Opaque")];
    let graph = RenderGraph::build(&nodes, &registry).unwrap();

    let node = graph.node("Bloom").unwrap();
    assert_eq!(node.base().kind(), NodeKind::Default);
    assert_eq!(node.base().render_layer(), Some(RenderLayer::Opaque));
}

#[test]
fn test_frame_records_nodes_in_order() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine.build_graph(&standard_nodes()).unwrap();
    let scene = opaque_scene(engine.backend_mut(), 3);

    let final_target = engine.render_frame(&scene).unwrap();

    assert_eq!(log.events(), ["Shadow", "Opaque", "Sky", "PostProcess"]);
    assert_eq!(final_target, engine.primary_target());

    let opaque = log.commands_in_event("Opaque");
    assert!(matches!(opaque[0], RecordedCommand::SetPipeline { .. }));
    assert_eq!(draw_count(&opaque), 3);
    assert!(opaque.contains(&RecordedCommand::DrawIndexed {
        index_count: 36,
        instance_count: 2
    }));

    // Opaque binds the main pass at slot 0
    let (slot, offset) = opaque.iter().find_map(constant_buffer_offset).unwrap();
    assert_eq!((slot, offset), (0, 0));

    // The sky layer is empty; post-process is a single full-screen triangle
    assert_eq!(draw_count(&log.commands_in_event("Sky")), 0);
    assert_eq!(
        log.commands_in_event("PostProcess")
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { vertex_count: 3, instance_count: 1 }))
            .count(),
        1
    );
}

#[test]
fn test_disabled_node_is_skipped() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    let mut nodes = standard_nodes();
    nodes[2] = nodes[2].clone().disabled();
    engine.build_graph(&nodes).unwrap();
    let scene = opaque_scene(engine.backend_mut(), 1);

    engine.render_frame(&scene).unwrap();
    assert_eq!(log.events(), ["Opaque", "Sky", "PostProcess"]);

    log.clear();
    engine.set_node_enabled("Shadow", true).unwrap();
    engine.set_node_enabled("Sky", false).unwrap();
    engine.render_frame(&scene).unwrap();
    assert_eq!(log.events(), ["Shadow", "Opaque", "PostProcess"]);

    let err = engine.set_node_enabled("Bloom", true).unwrap_err();
    assert!(matches!(err, EngineError::Graph(GraphError::NodeNotFound(_))));
}

#[rstest]
#[case::no_lights(0)]
#[case::one_light(1)]
#[case::three_lights(3)]
fn test_shadow_node_renders_each_light(#[case] lights: usize) {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Shadow", SHADOW_PSO)])
        .unwrap();
    let mut scene = opaque_scene(engine.backend_mut(), 2);
    add_shadow_views(engine.backend_mut(), &mut scene, lights);

    let target = engine.render_frame(&scene).unwrap();
    assert_eq!(target, engine.primary_target());

    let commands = log.commands_in_event("Shadow");
    let clears: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::ClearDepth { target, depth } => Some((*target, *depth)),
            _ => None,
        })
        .collect();
    assert_eq!(clears.len(), lights);
    for (view, (target, depth)) in scene.shadow_views.iter().zip(&clears) {
        assert_eq!(*target, view.target);
        assert_eq!(*depth, 1.0);
    }
    assert_eq!(draw_count(&commands), 2 * lights);

    // Each light binds its own pass entry after the main and cube-face passes
    let stride = engine.ring().current().pass_constants().stride();
    let offsets: Vec<u64> = commands
        .iter()
        .filter_map(constant_buffer_offset)
        .map(|(_, offset)| offset)
        .collect();
    let expected: Vec<u64> = (0..lights as u64)
        .map(|i| (SHADOW_PASS_BASE as u64 + i) * stride)
        .collect();
    assert_eq!(offsets, expected);
}

#[test]
fn test_reflection_node_renders_six_faces() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("OpaqueDynamicReflections", OPAQUE_PSO)])
        .unwrap();

    let mut scene = opaque_scene(engine.backend_mut(), 2);
    let cube = create_target(engine.backend_mut(), "cube", 256, 6);
    scene.resources.cube_target = Some(cube);

    let geometry = geometry(engine.backend_mut(), 12);
    scene.set_instances(InstanceBufferId(100), vec![InstanceData::default()]);
    scene.add_item(
        RenderLayer::OpaqueDynamicReflections,
        DrawItem {
            name: "mirror_sphere".to_string(),
            geometry,
            instances: InstanceBufferId(100),
            instance_count: 1,
        },
    );

    engine.render_frame(&scene).unwrap();
    let commands = log.commands_in_event("OpaqueDynamicReflections");

    let face_clears: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::ClearRenderTarget { target, .. } => Some(target.layer),
            _ => None,
        })
        .collect();
    assert_eq!(face_clears, [0, 1, 2, 3, 4, 5]);

    // Two opaque items per face, then the reflective item itself
    assert_eq!(draw_count(&commands), 6 * 2 + 1);
    assert_eq!(
        commands.iter().filter(|c| c.is_draw()).last(),
        Some(&RecordedCommand::DrawIndexed {
            index_count: 12,
            instance_count: 1
        })
    );

    let pass_offsets: Vec<u64> = commands
        .iter()
        .filter_map(constant_buffer_offset)
        .map(|(_, offset)| offset)
        .collect();
    let stride = engine.ring().current().pass_constants().stride();
    let expected: Vec<u64> = [1, 2, 3, 4, 5, 6, 0].iter().map(|i| i * stride).collect();
    assert_eq!(pass_offsets, expected);
}

#[test]
fn test_frustum_debug_draws_per_shadow_view() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("FrustumDebug", DEBUG_PSO)])
        .unwrap();
    let mut scene = opaque_scene(engine.backend_mut(), 0);
    add_shadow_views(engine.backend_mut(), &mut scene, 2);

    engine.render_frame(&scene).unwrap();
    let commands = log.commands_in_event("FrustumDebug");

    assert_eq!(
        commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { vertex_count: 6, instance_count: 1 }))
            .count(),
        2
    );
    // cbPass, cbCamera and cbFrustumCorners, then one pass per view
    assert_eq!(commands.iter().filter_map(constant_buffer_offset).count(), 5);
}

#[test]
fn test_raytracing_node_dispatches_and_copies() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Raytracing", RAYTRACING_PSO)])
        .unwrap();

    let mut scene = opaque_scene(engine.backend_mut(), 1);
    let output = create_target(engine.backend_mut(), "rt_output", 64, 1);
    let tlas = engine
        .backend_mut()
        .create_acceleration_structure("tlas")
        .unwrap();
    let vertex_data = create_buffer(engine.backend_mut(), "rt_vertices", 4096);
    scene.resources.raytracing = Some(RaytracingResources {
        scene: tlas,
        output: output.color,
        width: 64,
        height: 32,
        vertex_data,
        instances: InstanceBufferId(0),
    });

    engine.render_frame(&scene).unwrap();
    let commands = log.commands_in_event("Raytracing");

    assert!(commands.contains(&RecordedCommand::Bind {
        slot: 1,
        resource: BindingResource::AccelerationStructure(tlas),
    }));
    assert!(commands.contains(&RecordedCommand::DispatchRays {
        width: 64,
        height: 32,
        depth: 1
    }));
    assert_eq!(
        commands.last(),
        Some(&RecordedCommand::CopyTexture {
            src: output.color,
            dst: engine.primary_target().color
        })
    );
}

#[test]
fn test_raytracing_without_resources_skips_dispatch() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Raytracing", RAYTRACING_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 1);

    engine.render_frame(&scene).unwrap();
    assert_eq!(
        log.count(|c| matches!(c, RecordedCommand::DispatchRays { .. })),
        0
    );
}

#[rstest]
#[case::blur("Blur", (20, 12, 1))]
#[case::horizontal("HorizontalBlur", (2, 180, 1))]
#[case::vertical("VerticalBlur", (320, 1, 1))]
fn test_compute_filter_dispatches_and_copies(
    #[case] node_type: &str,
    #[case] groups: (u32, u32, u32),
) {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[
            NodeDescriptor::new("Opaque", OPAQUE_PSO).with_next("Filter"),
            NodeDescriptor::new("Filter", BLUR_PSO).with_type(node_type),
        ])
        .unwrap();
    assert!(matches!(
        engine.graph().unwrap().node("Filter").unwrap().base().kind(),
        NodeKind::ComputeFilter { .. }
    ));

    let mut scene = opaque_scene(engine.backend_mut(), 1);
    let output = create_target(engine.backend_mut(), "filter_output", 320, 1);
    scene.resources.filter_output = Some(output.color);

    let final_target = engine.render_frame(&scene).unwrap();
    let target = engine.primary_target();
    let commands = log.commands_in_event("Filter");

    assert_eq!(final_target.color, target.color);
    assert!(commands.contains(&RecordedCommand::Bind {
        slot: 0,
        resource: BindingResource::DescriptorTable { first: target.color },
    }));
    assert!(commands.contains(&RecordedCommand::Bind {
        slot: 1,
        resource: BindingResource::DescriptorTable { first: output.color },
    }));
    let (x, y, z) = groups;
    assert!(commands.contains(&RecordedCommand::Dispatch { x, y, z }));
    assert_eq!(
        commands.last(),
        Some(&RecordedCommand::CopyTexture {
            src: output.color,
            dst: target.color
        })
    );
    assert_eq!(draw_count(&commands), 0);
}

#[test]
fn test_compute_filter_without_output_skips_dispatch() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Blur", BLUR_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 1);

    engine.render_frame(&scene).unwrap();
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::Dispatch { .. })), 0);
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::CopyTexture { .. })), 0);
}

#[test]
fn test_items_without_instance_buffer_are_skipped() {
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", OPAQUE_PSO)])
        .unwrap();

    let mut scene = opaque_scene(engine.backend_mut(), 1);
    let geometry = geometry(engine.backend_mut(), 6);
    scene.add_item(
        RenderLayer::Opaque,
        DrawItem {
            name: "orphan".to_string(),
            geometry,
            instances: InstanceBufferId(42),
            instance_count: 4,
        },
    );
    let hidden = geometry;
    scene.add_item(
        RenderLayer::Opaque,
        DrawItem {
            name: "culled".to_string(),
            geometry: hidden,
            instances: InstanceBufferId(0),
            instance_count: 0,
        },
    );

    engine.render_frame(&scene).unwrap();
    assert_eq!(draw_count(&log.commands_in_event("Opaque")), 1);
}

#[test]
fn test_missing_bindings_are_skipped() {
    // The post-process pipeline has none of the shading resources
    let (mut engine, log) = engine_with_pipelines(DummyBackend::new());
    engine
        .build_graph(&[NodeDescriptor::new("Opaque", POST_PSO)])
        .unwrap();
    let scene = opaque_scene(engine.backend_mut(), 2);

    engine.render_frame(&scene).unwrap();
    let commands = log.commands_in_event("Opaque");

    // Only cbPass binds; instance buffers have no slot but items still draw
    assert_eq!(commands.iter().filter(|c| c.is_bind()).count(), 1);
    assert_eq!(draw_count(&commands), 2);
}

#[test]
fn test_relink_reorders_and_rejects_bad_links() {
    let mut backend = DummyBackend::new();
    let registry = registry_with_standard_pipelines(&mut backend);
    let mut graph = RenderGraph::build(&standard_nodes(), &registry).unwrap();

    // Dropping sky out of the chain leaves it as a second head
    let err = graph.relink(&[("Opaque", Some("PostProcess"))]).unwrap_err();
    assert_eq!(
        err,
        GraphError::MultipleHeads(vec!["Shadow".into(), "Sky".into()])
    );
    assert_eq!(graph.node_names(), ["Shadow", "Opaque", "Sky", "PostProcess"]);
    assert_eq!(graph.node("Opaque").unwrap().base().next(), Some("Sky"));

    let err = graph.relink(&[("Bloom", None)]).unwrap_err();
    assert_eq!(err, GraphError::NodeNotFound("Bloom".into()));

    graph
        .relink(&[
            ("Shadow", Some("Sky")),
            ("Sky", Some("Opaque")),
            ("Opaque", Some("PostProcess")),
        ])
        .unwrap();
    assert_eq!(graph.node_names(), ["Shadow", "Sky", "Opaque", "PostProcess"]);
    assert_eq!(graph.node("Opaque").unwrap().base().next(), Some("PostProcess"));
    assert!(graph.node("Sky").unwrap().base().enabled());
}

#[test]
fn test_render_without_graph_is_a_configuration_error() {
    let (mut engine, _log) = engine_with_pipelines(DummyBackend::new());
    let scene = opaque_scene(engine.backend_mut(), 1);

    let err = engine.render_frame(&scene).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
    assert_eq!(engine.ring().frame_count(), 0);
}
