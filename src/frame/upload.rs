//! Typed CPU-writable GPU buffers.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::backend::{BindingResource, BufferDescriptor, BufferHandle, GpuBackend};
use crate::error::{EngineError, EngineResult};

/// Constant buffer views must start on this byte boundary.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// A persistently mapped array of `T` in GPU-visible memory.
///
/// Constant buffers round each element up to [`CONSTANT_BUFFER_ALIGNMENT`]
/// so any element can be bound as a root constant buffer view. Structured
/// buffers pack elements tightly and are bound from the first element.
#[derive(Debug)]
pub struct UploadBuffer<T> {
    handle: BufferHandle,
    label: String,
    capacity: u32,
    stride: u64,
    constant_buffer: bool,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    /// Allocate room for `capacity` elements (at least one).
    pub fn new(
        backend: &mut dyn GpuBackend,
        label: impl Into<String>,
        capacity: u32,
        constant_buffer: bool,
    ) -> EngineResult<Self> {
        let label = label.into();
        let capacity = capacity.max(1);
        let stride = Self::element_stride(constant_buffer);
        let handle = backend.create_buffer(&BufferDescriptor {
            label: Some(label.clone()),
            size: stride * capacity as u64,
            constant_buffer,
        })?;

        Ok(Self {
            handle,
            label,
            capacity,
            stride,
            constant_buffer,
            _marker: PhantomData,
        })
    }

    fn element_stride(constant_buffer: bool) -> u64 {
        let size = std::mem::size_of::<T>() as u64;
        if constant_buffer {
            size.div_ceil(CONSTANT_BUFFER_ALIGNMENT) * CONSTANT_BUFFER_ALIGNMENT
        } else {
            size
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Byte distance between consecutive elements
    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn is_constant_buffer(&self) -> bool {
        self.constant_buffer
    }

    /// Byte offset of element `index`.
    pub fn address(&self, index: u32) -> EngineResult<u64> {
        self.check_index(index)?;
        Ok(index as u64 * self.stride)
    }

    /// Copy `value` into element `index`.
    ///
    /// Writing needs exclusive access, so code that only holds a shared
    /// reference (render nodes see `&FrameResources`) can bind but not write:
    ///
    /// ```compile_fail
    /// # use reflex_render::backend::DummyBackend;
    /// # use reflex_render::frame::UploadBuffer;
    /// fn overwrite(buffer: &UploadBuffer<u32>, backend: &mut DummyBackend) {
    ///     buffer.write(backend, 0, &1).unwrap();
    /// }
    /// ```
    pub fn write(&mut self, backend: &mut dyn GpuBackend, index: u32, value: &T) -> EngineResult<()> {
        let offset = self.address(index)?;
        backend.write_buffer(self.handle, offset, bytemuck::bytes_of(value));
        Ok(())
    }

    /// Copy `values` into elements `0..values.len()`.
    pub fn write_all(&mut self, backend: &mut dyn GpuBackend, values: &[T]) -> EngineResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let last = u32::try_from(values.len() - 1).unwrap_or(u32::MAX);
        self.check_index(last)?;

        if self.constant_buffer {
            for (index, value) in (0u32..).zip(values) {
                backend.write_buffer(
                    self.handle,
                    index as u64 * self.stride,
                    bytemuck::bytes_of(value),
                );
            }
        } else {
            backend.write_buffer(self.handle, 0, bytemuck::cast_slice(values));
        }
        Ok(())
    }

    /// Binding for element `index`: a constant buffer view for constant
    /// buffers, a shader resource view starting at that element otherwise.
    pub fn binding(&self, index: u32) -> EngineResult<BindingResource> {
        let offset = self.address(index)?;
        Ok(if self.constant_buffer {
            BindingResource::ConstantBuffer {
                buffer: self.handle,
                offset,
            }
        } else {
            BindingResource::ShaderResource {
                buffer: self.handle,
                offset,
            }
        })
    }

    /// Reallocate for at least `capacity` elements. Never shrinks.
    ///
    /// Contents are not preserved; the caller must make sure the GPU is done
    /// with the old buffer. Returns whether a new buffer was allocated.
    pub fn grow(&mut self, backend: &mut dyn GpuBackend, capacity: u32) -> EngineResult<bool> {
        if capacity <= self.capacity {
            return Ok(false);
        }

        let handle = backend.create_buffer(&BufferDescriptor {
            label: Some(self.label.clone()),
            size: self.stride * capacity as u64,
            constant_buffer: self.constant_buffer,
        })?;
        backend.destroy_buffer(self.handle);

        log::debug!(
            "Grew upload buffer '{}' from {} to {} elements",
            self.label,
            self.capacity,
            capacity
        );
        self.handle = handle;
        self.capacity = capacity;
        Ok(true)
    }

    /// Release the GPU buffer.
    pub fn destroy(self, backend: &mut dyn GpuBackend) {
        backend.destroy_buffer(self.handle);
    }

    fn check_index(&self, index: u32) -> EngineResult<()> {
        if index >= self.capacity {
            return Err(EngineError::BufferIndexOutOfRange {
                buffer: self.label.clone(),
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}
