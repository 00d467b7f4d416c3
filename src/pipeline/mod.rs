//! Pipeline objects and their registry.
//!
//! A [`PipelineObject`] pairs a set of compiled stages with the binding
//! layout resolved from them and the fixed-function state they run under.
//! Pipelines are created once, during load, through [`PipelineBuilder`] and
//! looked up by name from [`PipelineRegistry`] while frames are recorded.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = PipelineRegistry::new();
//! PipelineBuilder::graphics("Opaque")
//!     .with_module(vertex)
//!     .with_module(pixel)
//!     .build(&mut registry, &mut backend)?;
//!
//! let opaque = registry.find("Opaque")?;
//! assert_eq!(opaque.layout().slot_index("cbPass"), Some(0));
//! ```

pub mod builder;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::backend::{FixedFunctionState, InputElement, PipelineHandle};
use crate::binding::BindingLayout;
use crate::shader::{ShaderModule, ShaderStage, StageDescriptor};

pub use builder::{load_pipelines, PipelineBuilder};
pub use registry::PipelineRegistry;

/// Kind of pipeline state object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
    Raytracing,
}

impl PipelineKind {
    /// Stage every pipeline of this kind must have
    pub fn required_stage(self) -> ShaderStage {
        match self {
            PipelineKind::Graphics => ShaderStage::Vertex,
            PipelineKind::Compute => ShaderStage::Compute,
            PipelineKind::Raytracing => ShaderStage::RayGeneration,
        }
    }

    pub fn accepts(self, stage: ShaderStage) -> bool {
        match self {
            PipelineKind::Graphics => matches!(
                stage,
                ShaderStage::Vertex
                    | ShaderStage::Hull
                    | ShaderStage::Domain
                    | ShaderStage::Geometry
                    | ShaderStage::Pixel
            ),
            PipelineKind::Compute => stage == ShaderStage::Compute,
            PipelineKind::Raytracing => stage.is_raytracing(),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Graphics => write!(f, "graphics"),
            PipelineKind::Compute => write!(f, "compute"),
            PipelineKind::Raytracing => write!(f, "raytracing"),
        }
    }
}

/// A created pipeline. Immutable, lives until shutdown.
#[derive(Debug, Clone)]
pub struct PipelineObject {
    pub(crate) name: String,
    pub(crate) kind: PipelineKind,
    pub(crate) layout: Arc<BindingLayout>,
    pub(crate) modules: Vec<Arc<ShaderModule>>,
    pub(crate) fixed_function: Option<FixedFunctionState>,
    pub(crate) input_layout: Vec<InputElement>,
    pub(crate) handle: PipelineHandle,
}

impl PipelineObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn layout(&self) -> &Arc<BindingLayout> {
        &self.layout
    }

    /// Stages in fixed stage order
    pub fn modules(&self) -> &[Arc<ShaderModule>] {
        &self.modules
    }

    pub fn module(&self, stage: ShaderStage) -> Option<&ShaderModule> {
        self.modules
            .iter()
            .find(|m| m.stage() == stage)
            .map(Arc::as_ref)
    }

    /// `None` for compute and raytracing pipelines
    pub fn fixed_function(&self) -> Option<&FixedFunctionState> {
        self.fixed_function.as_ref()
    }

    /// Vertex input layout, derived from vertex-stage reflection
    pub fn input_layout(&self) -> &[InputElement] {
        &self.input_layout
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }
}

/// A pipeline as configuration describes it, before compilation
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub name: String,
    pub kind: PipelineKind,
    pub stages: Vec<StageDescriptor>,
    /// Ignored for compute and raytracing pipelines
    pub fixed_function: FixedFunctionState,
}

impl PipelineDescriptor {
    pub fn new(name: impl Into<String>, kind: PipelineKind) -> Self {
        Self {
            name: name.into(),
            kind,
            stages: Vec::new(),
            fixed_function: FixedFunctionState::default(),
        }
    }

    pub fn with_stage(mut self, stage: StageDescriptor) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_fixed_function(mut self, state: FixedFunctionState) -> Self {
        self.fixed_function = state;
        self
    }
}
