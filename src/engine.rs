//! Main engine orchestrator

use crate::backend::{
    GpuBackend, RenderTarget, TextureDescriptor, TextureFormat, TextureUsage,
};
use crate::error::{EngineError, EngineResult};
use crate::frame::FrameResourceRing;
use crate::pipeline::{self, PipelineBuilder, PipelineDescriptor, PipelineObject, PipelineRegistry};
use crate::profiling::{frame_mark, profile_function};
use crate::render_graph::{FrameContext, NodeDescriptor, RenderGraph};
use crate::scene::SceneData;
use crate::shader::ShaderCompiler;
use crate::EngineConfig;

/// Owns the backend, the pipelines, the render graph and the frame ring.
///
/// Typical use: [`load_pipelines`](Self::load_pipelines), then
/// [`build_graph`](Self::build_graph), then [`render_frame`](Self::render_frame)
/// once per frame.
pub struct Engine<B: GpuBackend> {
    backend: B,
    config: EngineConfig,
    compiler: ShaderCompiler,
    registry: PipelineRegistry,
    ring: FrameResourceRing,
    graph: Option<RenderGraph>,
    primary_target: RenderTarget,
}

impl<B: GpuBackend> Engine<B> {
    pub fn new(mut backend: B, config: EngineConfig) -> EngineResult<Self> {
        profile_function!();
        config.validate()?;

        let color = backend.create_texture(&TextureDescriptor {
            label: Some("primary_color".to_string()),
            width: config.output_width,
            height: config.output_height,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
            ..Default::default()
        })?;
        let depth = backend.create_texture(&TextureDescriptor {
            label: Some("primary_depth".to_string()),
            width: config.output_width,
            height: config.output_height,
            format: TextureFormat::Depth24PlusStencil8,
            usage: TextureUsage::DEPTH_STENCIL,
            ..Default::default()
        })?;
        let primary_target = RenderTarget::new(color, config.output_width, config.output_height)
            .with_depth(depth);

        let ring = FrameResourceRing::new(&mut backend, &config)?;
        let compiler = ShaderCompiler::new()
            .with_include_dirs(config.shader_include_dirs.iter().cloned())
            .warnings_as_errors(config.warnings_as_errors);

        log::info!(
            "Engine initialized: {}x{} output, {} frames in flight",
            config.output_width,
            config.output_height,
            config.frames_in_flight
        );

        Ok(Self {
            backend,
            config,
            compiler,
            registry: PipelineRegistry::new(),
            ring,
            graph: None,
            primary_target,
        })
    }

    /// Compile and build every described pipeline, stopping at the first error.
    pub fn load_pipelines(&mut self, descriptors: &[PipelineDescriptor]) -> EngineResult<()> {
        pipeline::load_pipelines(
            &mut self.registry,
            &self.compiler,
            &mut self.backend,
            descriptors,
        )
    }

    /// Build a pipeline from already compiled modules.
    pub fn register_pipeline(&mut self, builder: PipelineBuilder) -> EngineResult<&PipelineObject> {
        builder.build(&mut self.registry, &mut self.backend)
    }

    /// Build the render graph, replacing any previous one.
    ///
    /// Every node's pipeline must already be registered.
    pub fn build_graph(&mut self, nodes: &[NodeDescriptor]) -> EngineResult<()> {
        let graph = RenderGraph::build(nodes, &self.registry)?;
        self.graph = Some(graph);
        Ok(())
    }

    /// Record one frame of `scene` and return the target the graph ended on.
    pub fn render_frame(&mut self, scene: &SceneData) -> EngineResult<RenderTarget> {
        profile_function!();

        let graph = self.graph.as_mut().ok_or_else(|| {
            EngineError::InvalidConfig("render_frame called before build_graph".to_string())
        })?;

        self.ring.reserve_for(&mut self.backend, scene)?;
        let frame = self.ring.advance(&self.backend)?;
        frame.upload(&mut self.backend, scene)?;

        graph.update(scene);
        let mut ctx = FrameContext {
            backend: &mut self.backend,
            registry: &self.registry,
            frame: &*frame,
            scene,
            primary_target: self.primary_target,
        };
        let result = graph.execute(&mut ctx);

        // The slot is fenced even when recording failed so it can be reused
        self.ring.finish_frame(&mut self.backend);
        frame_mark!();

        if let Err(err) = &result {
            log::error!("Frame {} failed: {}", self.ring.frame_count(), err);
        }
        result
    }

    /// Enable or disable a render graph node by name.
    pub fn set_node_enabled(&mut self, name: &str, enabled: bool) -> EngineResult<()> {
        let graph = self.graph.as_mut().ok_or_else(|| {
            EngineError::InvalidConfig("no render graph has been built".to_string())
        })?;
        graph.set_node_enabled(name, enabled)?;
        Ok(())
    }

    /// Block until the GPU has finished every frame in flight.
    pub fn wait_idle(&self) -> EngineResult<()> {
        self.ring.wait_idle(&self.backend)
    }

    /// Wait for the GPU, release the frame buffers and hand the backend back.
    pub fn shutdown(self) -> EngineResult<B> {
        let Self {
            mut backend, ring, ..
        } = self;
        ring.destroy(&mut backend)?;
        log::info!("Engine shut down");
        Ok(backend)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compiler(&self) -> &ShaderCompiler {
        &self.compiler
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn graph(&self) -> Option<&RenderGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut RenderGraph> {
        self.graph.as_mut()
    }

    pub fn ring(&self) -> &FrameResourceRing {
        &self.ring
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Target the graph starts each frame from
    pub fn primary_target(&self) -> RenderTarget {
        self.primary_target
    }
}
