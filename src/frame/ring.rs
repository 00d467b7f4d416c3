//! Ring of per-frame resource slots.
//!
//! The CPU records frame N+1 while the GPU still executes frame N, so every
//! buffer the CPU writes during a frame is replicated once per frame in
//! flight. Each slot remembers the fence value signaled after the frame that
//! last used it; [`FrameResourceRing::advance`] blocks until that value has
//! completed before handing the slot out again.
//!
//! ```text
//! Frame 0: [advance s0] [write s0] [record] [signal 1]
//! Frame 1:                                  [advance s1] [write s1] [record] [signal 2]
//! Frame 3:           ... [advance s0: wait for fence 1] [write s0] ...
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use crate::backend::GpuBackend;
use crate::error::{EngineError, EngineResult};
use crate::frame::UploadBuffer;
use crate::profiling::profile_scope;
use crate::scene::{
    CameraMatrices, DirectionalLight, FrustumCorners, InstanceBufferId, InstanceData,
    MaterialData, PassConstants, PointLight, SceneData, SpotLight, SsaoConstants,
};
use crate::EngineConfig;

/// Growable buffer categories of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferCategory {
    Pass,
    Material,
    DirectionalLight,
    PointLight,
    SpotLight,
    /// Every instance buffer of the slot
    Instance,
}

/// The buffers of one frame slot.
#[derive(Debug)]
pub struct FrameResources {
    index: usize,
    fence: u64,
    pass: UploadBuffer<PassConstants>,
    camera: UploadBuffer<CameraMatrices>,
    ssao: UploadBuffer<SsaoConstants>,
    frustum_corners: UploadBuffer<FrustumCorners>,
    materials: UploadBuffer<MaterialData>,
    directional_lights: UploadBuffer<DirectionalLight>,
    point_lights: UploadBuffer<PointLight>,
    spot_lights: UploadBuffer<SpotLight>,
    instances: BTreeMap<InstanceBufferId, UploadBuffer<InstanceData>>,
}

impl FrameResources {
    fn new(backend: &mut dyn GpuBackend, index: usize, config: &EngineConfig) -> EngineResult<Self> {
        let label = |name: &str| format!("{name}[{index}]");
        Ok(Self {
            index,
            fence: 0,
            pass: UploadBuffer::new(backend, label("cbPass"), config.pass_count, true)?,
            camera: UploadBuffer::new(backend, label("cbCamera"), 1, true)?,
            ssao: UploadBuffer::new(backend, label("cbSsao"), 1, true)?,
            frustum_corners: UploadBuffer::new(backend, label("cbFrustumCorners"), 1, true)?,
            materials: UploadBuffer::new(
                backend,
                label("gMaterialData"),
                config.max_materials,
                false,
            )?,
            directional_lights: UploadBuffer::new(
                backend,
                label("gDirectionalLights"),
                config.max_lights,
                false,
            )?,
            point_lights: UploadBuffer::new(
                backend,
                label("gPointLights"),
                config.max_lights,
                false,
            )?,
            spot_lights: UploadBuffer::new(
                backend,
                label("gSpotLights"),
                config.max_lights,
                false,
            )?,
            instances: BTreeMap::new(),
        })
    }

    /// Position of this slot in the ring
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fence value signaled after this slot's last frame, 0 if never used
    pub fn fence(&self) -> u64 {
        self.fence
    }

    pub fn pass_constants(&self) -> &UploadBuffer<PassConstants> {
        &self.pass
    }

    pub fn camera(&self) -> &UploadBuffer<CameraMatrices> {
        &self.camera
    }

    pub fn ssao(&self) -> &UploadBuffer<SsaoConstants> {
        &self.ssao
    }

    pub fn frustum_corners(&self) -> &UploadBuffer<FrustumCorners> {
        &self.frustum_corners
    }

    pub fn materials(&self) -> &UploadBuffer<MaterialData> {
        &self.materials
    }

    pub fn directional_lights(&self) -> &UploadBuffer<DirectionalLight> {
        &self.directional_lights
    }

    pub fn point_lights(&self) -> &UploadBuffer<PointLight> {
        &self.point_lights
    }

    pub fn spot_lights(&self) -> &UploadBuffer<SpotLight> {
        &self.spot_lights
    }

    pub fn instance_buffer(&self, id: InstanceBufferId) -> Option<&UploadBuffer<InstanceData>> {
        self.instances.get(&id)
    }

    pub fn instance_buffer_count(&self) -> usize {
        self.instances.len()
    }

    /// Current element capacity of a category (the smallest instance buffer
    /// for [`BufferCategory::Instance`])
    pub fn capacity(&self, category: BufferCategory) -> u32 {
        match category {
            BufferCategory::Pass => self.pass.capacity(),
            BufferCategory::Material => self.materials.capacity(),
            BufferCategory::DirectionalLight => self.directional_lights.capacity(),
            BufferCategory::PointLight => self.point_lights.capacity(),
            BufferCategory::SpotLight => self.spot_lights.capacity(),
            BufferCategory::Instance => self
                .instances
                .values()
                .map(UploadBuffer::capacity)
                .min()
                .unwrap_or(0),
        }
    }

    /// Copy the scene's per-frame data into this slot.
    ///
    /// Capacities must already cover the scene; see
    /// [`FrameResourceRing::reserve_for`].
    pub fn upload(&mut self, backend: &mut dyn GpuBackend, scene: &SceneData) -> EngineResult<()> {
        profile_scope!("upload_frame_resources");

        self.pass.write_all(backend, &scene.pass_constants())?;
        self.camera.write(backend, 0, &scene.camera)?;
        self.ssao.write(backend, 0, &scene.ssao)?;
        self.frustum_corners.write(backend, 0, &scene.frustum_corners)?;
        self.materials.write_all(backend, &scene.materials)?;
        self.directional_lights
            .write_all(backend, &scene.directional_lights)?;
        self.point_lights.write_all(backend, &scene.point_lights)?;
        self.spot_lights.write_all(backend, &scene.spot_lights)?;

        for (id, data) in &scene.instances {
            match self.instances.get_mut(id) {
                Some(buffer) => buffer.write_all(backend, data)?,
                None => log::warn!(
                    "Frame slot {} has no instance buffer {:?}, skipping upload",
                    self.index,
                    id
                ),
            }
        }
        Ok(())
    }

    fn grow(
        &mut self,
        backend: &mut dyn GpuBackend,
        category: BufferCategory,
        count: u32,
    ) -> EngineResult<()> {
        match category {
            BufferCategory::Pass => {
                self.pass.grow(backend, count)?;
            }
            BufferCategory::Material => {
                self.materials.grow(backend, count)?;
            }
            BufferCategory::DirectionalLight => {
                self.directional_lights.grow(backend, count)?;
            }
            BufferCategory::PointLight => {
                self.point_lights.grow(backend, count)?;
            }
            BufferCategory::SpotLight => {
                self.spot_lights.grow(backend, count)?;
            }
            BufferCategory::Instance => {
                for buffer in self.instances.values_mut() {
                    buffer.grow(backend, count)?;
                }
            }
        }
        Ok(())
    }

    fn destroy(self, backend: &mut dyn GpuBackend) {
        self.pass.destroy(backend);
        self.camera.destroy(backend);
        self.ssao.destroy(backend);
        self.frustum_corners.destroy(backend);
        self.materials.destroy(backend);
        self.directional_lights.destroy(backend);
        self.point_lights.destroy(backend);
        self.spot_lights.destroy(backend);
        for buffer in self.instances.into_values() {
            buffer.destroy(backend);
        }
    }
}

/// N rotating [`FrameResources`] paced by the queue fence.
#[derive(Debug)]
pub struct FrameResourceRing {
    slots: Vec<FrameResources>,
    current: usize,
    frame_count: u64,
    fence_timeout: Duration,
}

impl FrameResourceRing {
    pub fn new(backend: &mut dyn GpuBackend, config: &EngineConfig) -> EngineResult<Self> {
        if config.frames_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let slots = (0..config.frames_in_flight)
            .map(|index| FrameResources::new(backend, index, config))
            .collect::<EngineResult<Vec<_>>>()?;

        log::debug!("Created frame resource ring with {} slots", slots.len());
        Ok(Self {
            slots,
            current: 0,
            frame_count: 0,
            fence_timeout: config.fence_timeout,
        })
    }

    /// Move to the next slot, waiting for the GPU to release it.
    ///
    /// Fails with [`EngineError::FenceTimeout`] if the slot's fence does not
    /// complete within the configured timeout.
    pub fn advance(&mut self, backend: &dyn GpuBackend) -> EngineResult<&mut FrameResources> {
        profile_scope!("advance_frame_ring");

        let slot = (self.frame_count % self.slots.len() as u64) as usize;
        let fence = self.slots[slot].fence;
        Self::wait_for_slot(backend, slot, fence, self.fence_timeout)?;

        self.current = slot;
        self.frame_count += 1;
        log::trace!("Frame {} uses slot {}", self.frame_count, slot);
        Ok(&mut self.slots[slot])
    }

    /// Signal the queue after the current frame and stamp its slot.
    pub fn finish_frame(&mut self, backend: &mut dyn GpuBackend) -> u64 {
        let value = backend.signal();
        self.slots[self.current].fence = value;
        log::trace!("Slot {} fenced at {}", self.current, value);
        value
    }

    /// Block until every slot's last frame has completed.
    pub fn wait_idle(&self, backend: &dyn GpuBackend) -> EngineResult<()> {
        for (index, slot) in self.slots.iter().enumerate() {
            Self::wait_for_slot(backend, index, slot.fence, self.fence_timeout)?;
        }
        Ok(())
    }

    fn wait_for_slot(
        backend: &dyn GpuBackend,
        slot: usize,
        fence: u64,
        timeout: Duration,
    ) -> EngineResult<()> {
        if fence == 0 || backend.completed_fence_value() >= fence {
            return Ok(());
        }

        log::trace!("Waiting for fence {} to release slot {}", fence, slot);
        if backend.wait_for_fence(fence, timeout) {
            Ok(())
        } else {
            log::error!(
                "Fence {} for slot {} did not complete within {:?}",
                fence,
                slot,
                timeout
            );
            Err(EngineError::FenceTimeout {
                slot,
                fence_value: fence,
                timeout,
            })
        }
    }

    /// Grow a buffer category to hold `count` elements in every slot.
    ///
    /// Never shrinks. Growing replaces buffers that earlier frames may still
    /// read, so the ring waits for the GPU to go idle first.
    pub fn resize(
        &mut self,
        backend: &mut dyn GpuBackend,
        category: BufferCategory,
        count: u32,
    ) -> EngineResult<()> {
        if count == 0 {
            log::warn!("Ignoring resize of {:?} buffers to 0 elements", category);
            return Ok(());
        }
        if self.slots.iter().all(|slot| slot.capacity(category) >= count) {
            return Ok(());
        }

        self.wait_idle(&*backend)?;
        for slot in &mut self.slots {
            slot.grow(backend, category, count)?;
        }
        log::debug!("Resized {:?} buffers to {} elements", category, count);
        Ok(())
    }

    /// Add an instance buffer for `id` to every slot, or grow the existing one.
    pub fn add_instance_buffer(
        &mut self,
        backend: &mut dyn GpuBackend,
        id: InstanceBufferId,
        count: u32,
    ) -> EngineResult<()> {
        let count = count.max(1);
        let missing = self.slots.iter().any(|slot| !slot.instances.contains_key(&id));
        let undersized = self
            .slots
            .iter()
            .filter_map(|slot| slot.instances.get(&id))
            .any(|buffer| buffer.capacity() < count);
        if !missing && !undersized {
            return Ok(());
        }
        if undersized {
            self.wait_idle(&*backend)?;
        }

        for slot in &mut self.slots {
            let index = slot.index;
            match slot.instances.get_mut(&id) {
                Some(buffer) => {
                    buffer.grow(backend, count)?;
                }
                None => {
                    let buffer = UploadBuffer::new(
                        backend,
                        format!("gInstanceData{}[{}]", id.0, index),
                        count,
                        false,
                    )?;
                    slot.instances.insert(id, buffer);
                }
            }
        }
        Ok(())
    }

    /// Grow whatever `scene` does not fit into, in every slot.
    pub fn reserve_for(&mut self, backend: &mut dyn GpuBackend, scene: &SceneData) -> EngineResult<()> {
        let requirements = [
            (BufferCategory::Pass, scene.pass_count()),
            (BufferCategory::Material, scene.materials.len() as u32),
            (
                BufferCategory::DirectionalLight,
                scene.directional_lights.len() as u32,
            ),
            (BufferCategory::PointLight, scene.point_lights.len() as u32),
            (BufferCategory::SpotLight, scene.spot_lights.len() as u32),
        ];
        for (category, count) in requirements {
            // Empty categories keep their buffers
            if count > 0 {
                self.resize(backend, category, count)?;
            }
        }

        for (id, data) in &scene.instances {
            self.add_instance_buffer(backend, *id, data.len() as u32)?;
        }
        Ok(())
    }

    /// The slot handed out by the last [`advance`](Self::advance)
    pub fn current(&self) -> &FrameResources {
        &self.slots[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Number of frames started so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn slot_fence(&self, index: usize) -> Option<u64> {
        self.slots.get(index).map(|slot| slot.fence)
    }

    /// Release every buffer. Waits for the GPU first.
    pub fn destroy(self, backend: &mut dyn GpuBackend) -> EngineResult<()> {
        self.wait_idle(&*backend)?;
        for slot in self.slots {
            slot.destroy(backend);
        }
        Ok(())
    }
}
