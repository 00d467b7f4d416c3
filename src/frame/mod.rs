//! Per-frame-in-flight GPU buffers.

pub mod ring;
pub mod upload;

pub use ring::{BufferCategory, FrameResourceRing, FrameResources};
pub use upload::{UploadBuffer, CONSTANT_BUFFER_ALIGNMENT};
