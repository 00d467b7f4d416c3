//! Shader compilation through naga.
//!
//! The compiler reads a stage's source from disk, splices `#include`
//! directives from the source directory and the configured include
//! directories, parses WGSL or GLSL (chosen by file extension), validates the
//! module, emits SPIR-V for the requested entry point and reflects the
//! entry point's resources.
//!
//! # Shader Definitions
//!
//! GLSL sources receive [`ShaderDef`]s through naga's preprocessor, together
//! with a stage macro (`VERTEX`, `FRAGMENT` or `COMPUTE`) so one file can carry
//! several stages:
//!
//! ```glsl
//! #ifdef VERTEX
//! void main() { ... }
//! #endif
//! ```
//!
//! WGSL has no preprocessor; defines passed for a WGSL source are reported as
//! a warning, which fails the compile when warnings are errors.
//!
//! # Example
//!
//! ```ignore
//! let compiler = ShaderCompiler::new().with_include_dir("shaders/common");
//! let module = compiler.compile(&StageDescriptor::new(
//!     ShaderStage::Vertex,
//!     "vs_main",
//!     "shaders/opaque.wgsl",
//! ))?;
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::profiling::profile_scope;
use crate::shader::reflect::{reflect_bindings, reflect_vertex_inputs};
use crate::shader::{ShaderModule, ShaderStage};

/// Shader definition value for compile-time conditionals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderDef {
    /// Boolean definition (`#ifdef`, `#ifndef`).
    Bool(bool),
    /// Integer definition (`#if VAR == 5`).
    Int(i32),
    /// Unsigned integer definition.
    UInt(u32),
}

impl From<bool> for ShaderDef {
    fn from(v: bool) -> Self {
        ShaderDef::Bool(v)
    }
}

impl From<i32> for ShaderDef {
    fn from(v: i32) -> Self {
        ShaderDef::Int(v)
    }
}

impl From<u32> for ShaderDef {
    fn from(v: u32) -> Self {
        ShaderDef::UInt(v)
    }
}

/// One stage of a pipeline as configuration describes it
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub path: PathBuf,
    pub defines: Vec<(String, ShaderDef)>,
    /// Overrides the stage's default target profile
    pub profile: Option<String>,
}

impl StageDescriptor {
    pub fn new(stage: ShaderStage, entry_point: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            path: path.into(),
            defines: Vec::new(),
            profile: None,
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<ShaderDef>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceLanguage {
    Wgsl,
    Glsl,
}

impl SourceLanguage {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "wgsl" => Some(SourceLanguage::Wgsl),
            "glsl" | "vert" | "frag" | "comp" => Some(SourceLanguage::Glsl),
            _ => None,
        }
    }
}

/// Compiles shader stages into [`ShaderModule`]s.
#[derive(Debug, Clone)]
pub struct ShaderCompiler {
    include_dirs: Vec<PathBuf>,
    warnings_as_errors: bool,
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderCompiler {
    pub fn new() -> Self {
        Self {
            include_dirs: Vec::new(),
            warnings_as_errors: true,
        }
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }

    pub fn warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// Read and compile the stage described by `desc`.
    pub fn compile(&self, desc: &StageDescriptor) -> EngineResult<ShaderModule> {
        let source = fs::read_to_string(&desc.path)
            .map_err(|err| compilation_error(&desc.path, format!("cannot read source: {err}")))?;
        self.compile_source(desc, &source)
    }

    /// Compile `source` as if it had been read from `desc.path`.
    pub fn compile_source(&self, desc: &StageDescriptor, source: &str) -> EngineResult<ShaderModule> {
        profile_scope!("shader_compile");

        let path = desc.path.as_path();
        let language = SourceLanguage::from_path(path).ok_or_else(|| {
            compilation_error(path, "unsupported source extension (expected .wgsl or .glsl)")
        })?;
        let naga_stage = desc.stage.naga_stage().ok_or_else(|| {
            compilation_error(
                path,
                format!(
                    "{} stages cannot be compiled from source; supply precompiled bytecode",
                    desc.stage
                ),
            )
        })?;

        let mut included = HashSet::new();
        let resolved = self.resolve_includes(source, path, &mut included)?;

        let mut warnings = Vec::new();
        let module = match language {
            SourceLanguage::Wgsl => {
                if !desc.defines.is_empty() {
                    warnings.push(format!(
                        "{} define(s) ignored: WGSL sources have no preprocessor",
                        desc.defines.len()
                    ));
                }
                naga::front::wgsl::parse_str(&resolved)
                    .map_err(|err| compilation_error(path, err.emit_to_string(&resolved)))?
            }
            SourceLanguage::Glsl => {
                let options = naga::front::glsl::Options {
                    stage: naga_stage,
                    defines: glsl_defines(desc.stage, &desc.defines),
                };
                naga::front::glsl::Frontend::default()
                    .parse(&options, &resolved)
                    .map_err(|errors| compilation_error(path, format!("{errors:?}")))?
            }
        };

        if self.warnings_as_errors && !warnings.is_empty() {
            return Err(compilation_error(path, warnings.join("\n")));
        }
        for warning in &warnings {
            log::warn!("{}: {}", path.display(), warning);
        }

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| compilation_error(path, err.emit_to_string(&resolved)))?;

        let entry_index = module
            .entry_points
            .iter()
            .position(|ep| ep.name == desc.entry_point && ep.stage == naga_stage)
            .ok_or_else(|| {
                compilation_error(
                    path,
                    format!("no {} entry point named '{}'", desc.stage, desc.entry_point),
                )
            })?;

        let pipeline_options = naga::back::spv::PipelineOptions {
            shader_stage: naga_stage,
            entry_point: desc.entry_point.clone(),
        };
        let words = naga::back::spv::write_vec(
            &module,
            &info,
            &naga::back::spv::Options::default(),
            Some(&pipeline_options),
        )
        .map_err(|err| compilation_error(path, format!("SPIR-V generation failed: {err}")))?;

        let bindings = reflect_bindings(&module, &info, entry_index);
        let vertex_inputs = reflect_vertex_inputs(&module, entry_index);

        log::debug!(
            "Compiled {} ({} '{}'): {} bindings, {} bytes",
            path.display(),
            desc.stage,
            desc.entry_point,
            bindings.len(),
            words.len() * 4
        );

        let profile = desc
            .profile
            .clone()
            .unwrap_or_else(|| desc.stage.default_profile().to_string());

        Ok(ShaderModule::from_parts(
            desc.stage,
            desc.entry_point.clone(),
            bytemuck::cast_slice::<u32, u8>(&words).to_vec(),
            bindings,
        )
        .with_profile(profile)
        .with_source_path(path)
        .with_vertex_inputs(vertex_inputs))
    }

    /// Resolve `#include "path"` directives recursively.
    ///
    /// Paths are looked up next to the including file first, then in the
    /// include directories. Each file is spliced at most once.
    fn resolve_includes(
        &self,
        source: &str,
        origin: &Path,
        included: &mut HashSet<PathBuf>,
    ) -> EngineResult<String> {
        let mut result = String::with_capacity(source.len());

        for line in source.lines() {
            let Some(include) = parse_include_directive(line.trim()) else {
                result.push_str(line);
                result.push('\n');
                continue;
            };

            let found = self.find_include(include, origin).ok_or_else(|| {
                compilation_error(origin, format!("include not found: \"{include}\""))
            })?;
            if !included.insert(found.clone()) {
                continue;
            }

            let text = fs::read_to_string(&found).map_err(|err| {
                compilation_error(origin, format!("cannot read include \"{include}\": {err}"))
            })?;
            let resolved = self.resolve_includes(&text, &found, included)?;
            result.push_str(&resolved);
            result.push('\n');
        }

        Ok(result)
    }

    fn find_include(&self, include: &str, origin: &Path) -> Option<PathBuf> {
        let local = origin.parent().map(|dir| dir.join(include));
        local
            .into_iter()
            .chain(self.include_dirs.iter().map(|dir| dir.join(include)))
            .find(|candidate| candidate.is_file())
    }
}

fn glsl_defines(
    stage: ShaderStage,
    defs: &[(String, ShaderDef)],
) -> naga::FastHashMap<String, String> {
    let mut defines = naga::FastHashMap::default();

    let stage_define = match stage {
        ShaderStage::Vertex => "VERTEX",
        ShaderStage::Pixel => "FRAGMENT",
        _ => "COMPUTE",
    };
    defines.insert(stage_define.to_string(), String::new());

    for (name, def) in defs {
        match def {
            ShaderDef::Bool(true) => {
                defines.insert(name.clone(), String::new());
            }
            ShaderDef::Bool(false) => {}
            ShaderDef::Int(v) => {
                defines.insert(name.clone(), v.to_string());
            }
            ShaderDef::UInt(v) => {
                defines.insert(name.clone(), v.to_string());
            }
        }
    }

    defines
}

/// Parse a `#include "path"` directive, returning the path if found.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?.trim();
    if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')
    } else {
        None
    }
}

fn compilation_error(path: &Path, diagnostic: impl Into<String>) -> EngineError {
    EngineError::Compilation {
        path: path.to_path_buf(),
        diagnostic: diagnostic.into(),
    }
}
