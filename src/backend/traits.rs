//! Core backend abstraction traits
//!
//! [`GpuBackend`] is the only surface through which the engine touches a device:
//! object creation during load, command recording during frames, and the
//! queue fence used to pace frame resource reuse.

use std::time::Duration;

use thiserror::Error;

use crate::backend::types::*;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create binding layout: {0}")]
    BindingLayoutCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create acceleration structure: {0}")]
    AccelerationStructureCreationFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU upload buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture (and its default views)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a top-level acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccelerationStructureHandle(pub(crate) u64);

/// Handle to a GPU binding layout (root signature)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingLayoutHandle(pub(crate) u64);

/// Handle to a compiled pipeline state object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

/// Main GPU backend trait
///
/// Object safe: render graph nodes record through `&mut dyn GpuBackend`.
pub trait GpuBackend {
    /// Backend name for logs
    fn name(&self) -> &str;

    // Resource creation

    /// Create a CPU-writable upload buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Copy bytes into an upload buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Release an upload buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Create a top-level acceleration structure
    fn create_acceleration_structure(
        &mut self,
        label: &str,
    ) -> BackendResult<AccelerationStructureHandle>;

    // Pipeline creation

    /// Create a binding layout from resolved root parameters
    fn create_binding_layout(
        &mut self,
        desc: &BindingLayoutDescriptor,
    ) -> BackendResult<BindingLayoutHandle>;

    /// Create a graphics, compute or raytracing pipeline
    fn create_pipeline(&mut self, desc: &PipelineStateDescriptor)
        -> BackendResult<PipelineHandle>;

    // Command recording

    /// Open a named debug region
    fn begin_event(&mut self, label: &str);

    /// Close the innermost debug region
    fn end_event(&mut self);

    /// Make a pipeline and its binding layout current
    fn set_pipeline(&mut self, pipeline: PipelineHandle, layout: BindingLayoutHandle);

    /// Bind a resource to a slot of the current binding layout
    fn bind(&mut self, slot: u32, resource: BindingResource);

    /// Set the color/depth target for subsequent draws
    fn set_render_target(&mut self, target: &RenderTarget);

    /// Clear the color target
    fn clear_render_target(&mut self, target: &RenderTarget, color: [f32; 4]);

    /// Clear the depth target
    fn clear_depth(&mut self, target: &RenderTarget, depth: f32);

    /// Draw non-indexed primitives
    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    /// Draw indexed geometry
    fn draw_indexed(&mut self, geometry: &GeometryView, instance_count: u32);

    /// Dispatch compute work
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Dispatch rays over a width x height x depth grid
    fn dispatch_rays(&mut self, width: u32, height: u32, depth: u32);

    /// Copy one texture into another
    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle);

    // Queue synchronization

    /// Signal the queue fence after all recorded work; returns the signaled value
    fn signal(&mut self) -> u64;

    /// Highest fence value the GPU has completed
    fn completed_fence_value(&self) -> u64;

    /// Block until `value` completes; `false` if `timeout` elapsed first
    fn wait_for_fence(&self, value: u64, timeout: Duration) -> bool;
}
