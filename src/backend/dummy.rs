//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't touch a GPU. It records every command into a
//! [`CommandLog`], keeps upload-buffer contents in memory, and simulates the
//! queue fence so frame pacing can be tested:
//!
//! - [`FenceMode::Immediate`]: work completes as soon as it is signaled
//! - [`FenceMode::Backlog`]: the GPU trails the CPU by a fixed number of signals
//!   and catches up only when the CPU waits
//! - [`FenceMode::Stalled`]: nothing completes unless a [`DummyFence`] handle
//!   advances it, so waits time out

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::PipelineKind;

/// A command captured by the dummy backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginEvent(String),
    EndEvent,
    SetPipeline {
        pipeline: PipelineHandle,
        layout: BindingLayoutHandle,
    },
    Bind {
        slot: u32,
        resource: BindingResource,
    },
    SetRenderTarget(RenderTarget),
    ClearRenderTarget {
        target: RenderTarget,
        color: [f32; 4],
    },
    ClearDepth {
        target: RenderTarget,
        depth: f32,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchRays {
        width: u32,
        height: u32,
        depth: u32,
    },
    CopyTexture {
        src: TextureHandle,
        dst: TextureHandle,
    },
    Signal(u64),
}

impl RecordedCommand {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
        )
    }

    pub fn is_bind(&self) -> bool {
        matches!(self, RecordedCommand::Bind { .. })
    }
}

/// Shared view of the commands recorded by a [`DummyBackend`].
///
/// Clones observe the same log, so a test can keep one after the backend
/// has moved into an engine.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<RecordedCommand>>>,
}

impl CommandLog {
    fn push(&self, command: RecordedCommand) {
        self.commands.lock().push(command);
    }

    /// Snapshot of every recorded command
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Number of recorded commands matching `pred`
    pub fn count(&self, pred: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|c| pred(*c)).count()
    }

    /// Labels of top-level debug regions, in recording order
    pub fn events(&self) -> Vec<String> {
        let commands = self.commands.lock();
        let mut depth = 0usize;
        let mut events = Vec::new();
        for command in commands.iter() {
            match command {
                RecordedCommand::BeginEvent(label) => {
                    if depth == 0 {
                        events.push(label.clone());
                    }
                    depth += 1;
                }
                RecordedCommand::EndEvent => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        events
    }

    /// Commands recorded inside every top-level region labelled `label`
    pub fn commands_in_event(&self, label: &str) -> Vec<RecordedCommand> {
        let commands = self.commands.lock();
        let mut depth = 0usize;
        let mut inside = false;
        let mut result = Vec::new();
        for command in commands.iter() {
            match command {
                RecordedCommand::BeginEvent(name) => {
                    if depth == 0 {
                        inside = name == label;
                    } else if inside {
                        result.push(command.clone());
                    }
                    depth += 1;
                }
                RecordedCommand::EndEvent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        inside = false;
                    } else if inside {
                        result.push(command.clone());
                    }
                }
                other => {
                    if inside {
                        result.push(other.clone());
                    }
                }
            }
        }
        result
    }
}

/// How the simulated GPU retires signaled fence values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    Immediate,
    /// The GPU completes everything except the last `n` signals
    Backlog(u64),
    Stalled,
}

/// Handle to the simulated queue fence.
///
/// Lets a test thread play the GPU and retire work while another thread waits.
#[derive(Debug, Clone, Default)]
pub struct DummyFence {
    completed: Arc<AtomicU64>,
}

impl DummyFence {
    /// Highest completed fence value
    pub fn value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Complete all work up to and including `value`
    pub fn complete_up_to(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_id: u64,
    last_signaled: u64,
    fence: DummyFence,
    fence_mode: FenceMode,
    fence_waits: Mutex<Vec<u64>>,
    log: CommandLog,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    binding_layouts: Vec<Vec<(RootParameter, ShaderVisibility)>>,
    pipelines: Vec<(String, PipelineKind)>,
    failing_pipelines: HashSet<String>,
    fail_binding_layouts: bool,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            last_signaled: 0,
            fence: DummyFence::default(),
            fence_mode: FenceMode::Immediate,
            fence_waits: Mutex::new(Vec::new()),
            log: CommandLog::default(),
            buffers: HashMap::new(),
            binding_layouts: Vec::new(),
            pipelines: Vec::new(),
            failing_pipelines: HashSet::new(),
            fail_binding_layouts: false,
        }
    }

    /// Create a dummy backend whose GPU trails the CPU by `frames` signals.
    pub fn with_gpu_backlog(frames: u64) -> Self {
        let mut backend = Self::new();
        backend.fence_mode = FenceMode::Backlog(frames);
        backend
    }

    pub fn set_fence_mode(&mut self, mode: FenceMode) {
        self.fence_mode = mode;
    }

    /// Make pipeline creation fail for the pipeline labelled `name`.
    pub fn fail_pipeline(&mut self, name: &str) {
        self.failing_pipelines.insert(name.to_string());
    }

    /// Make every binding layout creation fail.
    pub fn fail_binding_layouts(&mut self, fail: bool) {
        self.fail_binding_layouts = fail;
    }

    /// Shared handle to the command log.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Shared handle to the simulated fence.
    pub fn fence(&self) -> DummyFence {
        self.fence.clone()
    }

    /// Fence values the CPU has waited on, in order.
    pub fn fence_waits(&self) -> Vec<u64> {
        self.fence_waits.lock().clone()
    }

    /// Last value passed to [`GpuBackend::signal`].
    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// Number of upload buffers currently alive.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<u64> {
        self.buffers.get(&buffer).map(|data| data.len() as u64)
    }

    /// Read back bytes previously written to an upload buffer.
    pub fn read_buffer(&self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&[u8]> {
        let data = self.buffers.get(&buffer)?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        data.get(start..end)
    }

    /// Root parameters of every binding layout created so far.
    pub fn binding_layouts(&self) -> &[Vec<(RootParameter, ShaderVisibility)>] {
        &self.binding_layouts
    }

    /// Labels and kinds of every pipeline created so far.
    pub fn pipelines(&self) -> &[(String, PipelineKind)] {
        &self.pipelines
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy Backend"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let size = usize::try_from(desc.size)
            .map_err(|_| BackendError::BufferCreationFailed(format!("{:?}", desc.label)))?;
        let handle = BufferHandle(self.next_handle());
        self.buffers.insert(handle, vec![0; size]);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyBackend: write_buffer {:?} offset={} len={}",
            buffer,
            offset,
            data.len()
        );
        let Some(contents) = self.buffers.get_mut(&buffer) else {
            log::error!("DummyBackend: write to unknown buffer {:?}", buffer);
            return;
        };
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?));
        match range.and_then(|range| contents.get_mut(range)) {
            Some(dst) => dst.copy_from_slice(data),
            None => log::error!(
                "DummyBackend: write of {} bytes at {} overruns buffer {:?} ({} bytes)",
                data.len(),
                offset,
                buffer,
                contents.len()
            ),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("DummyBackend: destroying buffer {:?}", buffer);
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );
        Ok(TextureHandle(self.next_handle()))
    }

    fn create_acceleration_structure(
        &mut self,
        label: &str,
    ) -> BackendResult<AccelerationStructureHandle> {
        log::trace!("DummyBackend: creating acceleration structure {}", label);
        Ok(AccelerationStructureHandle(self.next_handle()))
    }

    fn create_binding_layout(
        &mut self,
        desc: &BindingLayoutDescriptor,
    ) -> BackendResult<BindingLayoutHandle> {
        log::trace!(
            "DummyBackend: creating binding layout {} ({} parameters, {} static samplers)",
            desc.label,
            desc.parameters.len(),
            desc.static_samplers.len()
        );
        if self.fail_binding_layouts {
            return Err(BackendError::BindingLayoutCreationFailed(
                desc.label.to_string(),
            ));
        }
        self.binding_layouts.push(desc.parameters.clone());
        Ok(BindingLayoutHandle(self.next_handle()))
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineStateDescriptor,
    ) -> BackendResult<PipelineHandle> {
        log::trace!(
            "DummyBackend: creating {:?} pipeline {} ({} stages)",
            desc.kind,
            desc.label,
            desc.stages.len()
        );
        if self.failing_pipelines.contains(desc.label) {
            return Err(BackendError::PipelineCreationFailed(format!(
                "driver rejected '{}'",
                desc.label
            )));
        }
        self.pipelines.push((desc.label.to_string(), desc.kind));
        Ok(PipelineHandle(self.next_handle()))
    }

    fn begin_event(&mut self, label: &str) {
        self.log.push(RecordedCommand::BeginEvent(label.to_string()));
    }

    fn end_event(&mut self) {
        self.log.push(RecordedCommand::EndEvent);
    }

    fn set_pipeline(&mut self, pipeline: PipelineHandle, layout: BindingLayoutHandle) {
        self.log
            .push(RecordedCommand::SetPipeline { pipeline, layout });
    }

    fn bind(&mut self, slot: u32, resource: BindingResource) {
        self.log.push(RecordedCommand::Bind { slot, resource });
    }

    fn set_render_target(&mut self, target: &RenderTarget) {
        self.log.push(RecordedCommand::SetRenderTarget(*target));
    }

    fn clear_render_target(&mut self, target: &RenderTarget, color: [f32; 4]) {
        self.log.push(RecordedCommand::ClearRenderTarget {
            target: *target,
            color,
        });
    }

    fn clear_depth(&mut self, target: &RenderTarget, depth: f32) {
        self.log.push(RecordedCommand::ClearDepth {
            target: *target,
            depth,
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.log.push(RecordedCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed(&mut self, geometry: &GeometryView, instance_count: u32) {
        self.log.push(RecordedCommand::DrawIndexed {
            index_count: geometry.index_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.log.push(RecordedCommand::Dispatch { x, y, z });
    }

    fn dispatch_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.log.push(RecordedCommand::DispatchRays {
            width,
            height,
            depth,
        });
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) {
        self.log.push(RecordedCommand::CopyTexture { src, dst });
    }

    fn signal(&mut self) -> u64 {
        self.last_signaled += 1;
        let value = self.last_signaled;
        self.log.push(RecordedCommand::Signal(value));

        match self.fence_mode {
            FenceMode::Immediate => self.fence.complete_up_to(value),
            FenceMode::Backlog(frames) => {
                self.fence.complete_up_to(value.saturating_sub(frames))
            }
            FenceMode::Stalled => {}
        }

        log::trace!(
            "DummyBackend: signaled fence {} (completed {})",
            value,
            self.fence.value()
        );
        value
    }

    fn completed_fence_value(&self) -> u64 {
        self.fence.value()
    }

    fn wait_for_fence(&self, value: u64, timeout: Duration) -> bool {
        self.fence_waits.lock().push(value);
        if self.fence.value() >= value {
            return true;
        }

        match self.fence_mode {
            FenceMode::Immediate | FenceMode::Backlog(_) => {
                // The simulated GPU drains its queue while the CPU blocks
                self.fence.complete_up_to(value);
                true
            }
            FenceMode::Stalled => {
                let start = Instant::now();
                while self.fence.value() < value {
                    if start.elapsed() >= timeout {
                        return false;
                    }
                    std::thread::yield_now();
                }
                true
            }
        }
    }
}
