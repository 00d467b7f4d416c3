//! Backend abstraction layer
//!
//! Provides the GPU trait the engine records through, the plain data types
//! shared with backends, and a recording dummy backend.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{CommandLog, DummyBackend, DummyFence, FenceMode, RecordedCommand};
pub use traits::*;
pub use types::*;
