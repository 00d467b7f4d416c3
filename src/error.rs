//! Engine error type.
//!
//! Errors fall into five groups:
//! - configuration errors (unknown pipeline, missing stage, binding category clash, bad graph)
//! - shader compilation errors
//! - GPU object creation failures
//! - frame-slot reclamation timeouts
//! - backend failures outside pipeline creation (buffer allocation and similar)
//!
//! Runtime binding misses are not errors; nodes log them and keep recording.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::backend::BackendError;
use crate::render_graph::GraphError;
use crate::shader::{ResourceCategory, ShaderStage};

/// Engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Pipeline '{0}' not found")]
    PipelineNotFound(String),

    #[error("Pipeline '{0}' is already registered")]
    DuplicatePipeline(String),

    #[error("Pipeline '{pipeline}' has no {stage} stage")]
    MissingStage {
        pipeline: String,
        stage: ShaderStage,
    },

    #[error("Pipeline '{pipeline}' cannot use a {stage} stage ({reason})")]
    UnexpectedStage {
        pipeline: String,
        stage: ShaderStage,
        reason: &'static str,
    },

    #[error(
        "Binding '{name}' is a {existing} in an earlier stage but a {found} in the {stage} stage"
    )]
    CategoryMismatch {
        name: String,
        existing: ResourceCategory,
        found: ResourceCategory,
        stage: ShaderStage,
    },

    #[error("Failed to compile shader '{}':\n{diagnostic}", path.display())]
    Compilation { path: PathBuf, diagnostic: String },

    #[error("Failed to create GPU objects for pipeline '{pipeline}': {source}")]
    GpuCreation {
        pipeline: String,
        #[source]
        source: BackendError,
    },

    #[error(
        "GPU hang: frame slot {slot} still waiting on fence {fence_value} after {timeout:?}"
    )]
    FenceTimeout {
        slot: usize,
        fence_value: u64,
        timeout: Duration,
    },

    #[error("Buffer '{buffer}' index {index} is out of range (capacity {capacity})")]
    BufferIndexOutOfRange {
        buffer: String,
        index: u32,
        capacity: u32,
    },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Render graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl EngineError {
    /// Whether the engine has to stop after this error.
    ///
    /// Configuration and compilation errors abort startup instead; they are
    /// reported as non-fatal here because the engine never reaches the frame loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::GpuCreation { .. }
                | EngineError::FenceTimeout { .. }
                | EngineError::Backend(BackendError::DeviceLost)
        )
    }

    /// Whether this error comes from pipeline or graph configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::PipelineNotFound(_)
                | EngineError::DuplicatePipeline(_)
                | EngineError::MissingStage { .. }
                | EngineError::UnexpectedStage { .. }
                | EngineError::CategoryMismatch { .. }
                | EngineError::InvalidConfig(_)
                | EngineError::Graph(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
