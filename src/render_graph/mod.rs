//! Render graph
//!
//! An ordered chain of render nodes built from configuration. Each node
//! references a pipeline by name and draws into the target the previous node
//! returned:
//!
//! ```text
//! Shadow -> Opaque -> Sky -> Transparent -> Present
//! ```
//!
//! Node variants live in [`nodes`]; [`NodeKind`] maps configuration type
//! names onto them.

pub mod graph;
pub mod node;
pub mod nodes;

pub use graph::*;
pub use node::*;
