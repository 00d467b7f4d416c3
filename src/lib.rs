//! Reflex Render - a reflection-driven pipeline and render graph layer
//!
//! Shader stages are compiled and reflected, their bindings merged into one
//! binding layout per stage set, and pipelines built against those layouts.
//! A linked render graph then records each frame through a [`GpuBackend`],
//! using per-frame buffers from a fence-paced [`FrameResourceRing`].
//!
//! # Features
//! - Binding layouts derived from shader reflection, shared between pipelines
//! - Graphics, compute and raytracing pipelines with stage validation
//! - Configurable render graph of typed nodes (shadow maps, reflections, post-process, ...)
//! - Frames in flight with fence-based pacing
//! - A recording [`DummyBackend`](backend::DummyBackend) for headless use and tests

pub mod backend;
pub mod binding;
pub mod engine;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod profiling;
pub mod render_graph;
pub mod scene;
pub mod shader;

use std::path::PathBuf;
use std::time::Duration;

pub use backend::GpuBackend;
pub use binding::{BindingLayout, BindingLayoutResolver};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use frame::FrameResourceRing;
pub use pipeline::{PipelineBuilder, PipelineDescriptor, PipelineKind, PipelineRegistry};
pub use render_graph::{NodeDescriptor, RenderGraph};
pub use scene::SceneData;
pub use shader::{ShaderCompiler, ShaderModule, ShaderStage, StageDescriptor};

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of frame resource slots the CPU may run ahead with
    pub frames_in_flight: usize,
    /// How long to wait on a frame fence before giving up
    pub fence_timeout: Duration,
    /// Initial pass-constant entries per frame
    pub pass_count: u32,
    /// Initial material capacity per frame
    pub max_materials: u32,
    /// Initial capacity of each light array per frame
    pub max_lights: u32,
    /// Extra directories searched for shader includes
    pub shader_include_dirs: Vec<PathBuf>,
    /// Fail shader compilation on warnings
    pub warnings_as_errors: bool,
    /// Size of the primary render target
    pub output_width: u32,
    pub output_height: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            fence_timeout: Duration::from_secs(5),
            pass_count: scene::SHADOW_PASS_BASE + 1,
            max_materials: 64,
            max_lights: 16,
            shader_include_dirs: Vec::new(),
            warnings_as_errors: true,
            output_width: 1280,
            output_height: 720,
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot start with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.frames_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.output_width == 0 || self.output_height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "output size {}x{} is empty",
                self.output_width, self.output_height
            )));
        }
        Ok(())
    }
}

/// Install the `env_logger` logger, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
