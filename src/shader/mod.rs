//! Compiled shader stages and their reflection data.
//!
//! A [`ShaderModule`] is one compiled stage: bytecode plus the list of
//! resources the stage touches, in the order the compiler reported them.
//! Modules come either from [`ShaderCompiler`] (WGSL/GLSL through naga) or,
//! for stages naga cannot produce, from precompiled parts via
//! [`ShaderModule::from_parts`].

pub mod compiler;
pub mod reflect;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::VertexFormat;

pub use compiler::{ShaderCompiler, ShaderDef, StageDescriptor};

/// Pipeline stage kind.
///
/// Declaration order is the fixed stage order used by layout resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
    RayGeneration,
    Intersection,
    AnyHit,
    ClosestHit,
    Miss,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 11] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
        ShaderStage::RayGeneration,
        ShaderStage::Intersection,
        ShaderStage::AnyHit,
        ShaderStage::ClosestHit,
        ShaderStage::Miss,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Pixel => "pixel",
            ShaderStage::Compute => "compute",
            ShaderStage::RayGeneration => "ray generation",
            ShaderStage::Intersection => "intersection",
            ShaderStage::AnyHit => "any hit",
            ShaderStage::ClosestHit => "closest hit",
            ShaderStage::Miss => "miss",
        }
    }

    /// Parse a configuration stage name.
    ///
    /// Accepts the usual aliases (`Fragment`, `TessControl`, `RayGen`, ...),
    /// case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let stage = match lower.as_str() {
            "vertex" | "vs" => ShaderStage::Vertex,
            "hull" | "tesscontrol" | "tessellationcontrol" | "hs" => ShaderStage::Hull,
            "domain" | "tesseval" | "tessellationevaluation" | "ds" => ShaderStage::Domain,
            "geometry" | "gs" => ShaderStage::Geometry,
            "pixel" | "fragment" | "ps" => ShaderStage::Pixel,
            "compute" | "cs" => ShaderStage::Compute,
            "raygen" | "raygeneration" => ShaderStage::RayGeneration,
            "intersection" => ShaderStage::Intersection,
            "anyhit" => ShaderStage::AnyHit,
            "closesthit" => ShaderStage::ClosestHit,
            "miss" => ShaderStage::Miss,
            _ => return None,
        };
        Some(stage)
    }

    /// Default target profile for the stage
    pub fn default_profile(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_6_5",
            ShaderStage::Hull => "hs_6_5",
            ShaderStage::Domain => "ds_6_5",
            ShaderStage::Geometry => "gs_6_5",
            ShaderStage::Pixel => "ps_6_5",
            ShaderStage::Compute => "cs_6_5",
            _ => "lib_6_5",
        }
    }

    pub fn is_raytracing(self) -> bool {
        matches!(
            self,
            ShaderStage::RayGeneration
                | ShaderStage::Intersection
                | ShaderStage::AnyHit
                | ShaderStage::ClosestHit
                | ShaderStage::Miss
        )
    }

    /// The naga stage, for the stages naga can compile
    pub fn naga_stage(self) -> Option<naga::ShaderStage> {
        match self {
            ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
            ShaderStage::Pixel => Some(naga::ShaderStage::Fragment),
            ShaderStage::Compute => Some(naga::ShaderStage::Compute),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of resource a reflected binding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    ConstantBuffer,
    /// Read-only texture or typed buffer
    Texture,
    /// Read-write texture or buffer
    ReadWrite,
    StructuredBuffer,
    AccelerationStructure,
    Sampler,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceCategory::ConstantBuffer => "constant buffer",
            ResourceCategory::Texture => "texture",
            ResourceCategory::ReadWrite => "read-write resource",
            ResourceCategory::StructuredBuffer => "structured buffer",
            ResourceCategory::AccelerationStructure => "acceleration structure",
            ResourceCategory::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// One resource a compiled stage declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: String,
    pub category: ResourceCategory,
    pub register: u32,
    pub space: u32,
    /// Greater than 1 for arrays
    pub element_count: u32,
}

impl ReflectedBinding {
    pub fn new(name: impl Into<String>, category: ResourceCategory, register: u32) -> Self {
        Self {
            name: name.into(),
            category,
            register,
            space: 0,
            element_count: 1,
        }
    }

    pub fn constant_buffer(name: impl Into<String>, register: u32) -> Self {
        Self::new(name, ResourceCategory::ConstantBuffer, register)
    }

    pub fn texture(name: impl Into<String>, register: u32) -> Self {
        Self::new(name, ResourceCategory::Texture, register)
    }

    pub fn structured_buffer(name: impl Into<String>, register: u32) -> Self {
        Self::new(name, ResourceCategory::StructuredBuffer, register)
    }

    pub fn with_space(mut self, space: u32) -> Self {
        self.space = space;
        self
    }

    pub fn with_count(mut self, element_count: u32) -> Self {
        self.element_count = element_count;
        self
    }
}

/// One vertex-stage input attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub semantic: String,
    pub location: u32,
    pub format: VertexFormat,
}

/// A compiled shader stage plus its reflection data.
///
/// Immutable once created. Pipelines share modules through `Arc`.
#[derive(Debug, Clone)]
pub struct ShaderModule {
    stage: ShaderStage,
    entry_point: String,
    profile: String,
    source_path: Option<PathBuf>,
    bytecode: Arc<[u8]>,
    bindings: Vec<ReflectedBinding>,
    vertex_inputs: Vec<VertexInput>,
}

impl ShaderModule {
    /// Assemble a module from precompiled bytecode and reflection.
    pub fn from_parts(
        stage: ShaderStage,
        entry_point: impl Into<String>,
        bytecode: impl Into<Arc<[u8]>>,
        bindings: Vec<ReflectedBinding>,
    ) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            profile: stage.default_profile().to_string(),
            source_path: None,
            bytecode: bytecode.into(),
            bindings,
            vertex_inputs: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_vertex_inputs(mut self, inputs: Vec<VertexInput>) -> Self {
        self.vertex_inputs = inputs;
        self
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Reflected bindings in compiler-reported order
    pub fn bindings(&self) -> &[ReflectedBinding] {
        &self.bindings
    }

    pub fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    /// Hash of the bytecode, stable within a process
    pub fn bytecode_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bytecode.hash(&mut hasher);
        hasher.finish()
    }
}
