//! Pipeline construction.

use std::sync::Arc;

use crate::backend::{
    BindingLayoutDescriptor, FixedFunctionState, GpuBackend, InputElement,
    PipelineStateDescriptor, StageBytecode,
};
use crate::binding::StageSetSignature;
use crate::error::{EngineError, EngineResult};
use crate::pipeline::{PipelineDescriptor, PipelineKind, PipelineObject, PipelineRegistry};
use crate::profiling::profile_scope;
use crate::shader::{ShaderCompiler, ShaderModule, ShaderStage};

/// Builds one pipeline and registers it.
///
/// ```ignore
/// PipelineBuilder::graphics("Sky")
///     .with_module(sky_vs)
///     .with_module(sky_ps)
///     .with_fixed_function(FixedFunctionState::sky())
///     .build(&mut registry, &mut backend)?;
/// ```
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    kind: PipelineKind,
    modules: Vec<Arc<ShaderModule>>,
    fixed_function: Option<FixedFunctionState>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>, kind: PipelineKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modules: Vec::new(),
            fixed_function: None,
        }
    }

    pub fn graphics(name: impl Into<String>) -> Self {
        Self::new(name, PipelineKind::Graphics)
    }

    pub fn compute(name: impl Into<String>) -> Self {
        Self::new(name, PipelineKind::Compute)
    }

    pub fn raytracing(name: impl Into<String>) -> Self {
        Self::new(name, PipelineKind::Raytracing)
    }

    pub fn with_module(mut self, module: Arc<ShaderModule>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Arc<ShaderModule>>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Fixed-function state for graphics pipelines; defaults apply when unset
    pub fn with_fixed_function(mut self, state: FixedFunctionState) -> Self {
        self.fixed_function = Some(state);
        self
    }

    /// Validate the stage set, resolve (or reuse) its binding layout, create
    /// the GPU objects and register the pipeline.
    pub fn build<'r>(
        mut self,
        registry: &'r mut PipelineRegistry,
        backend: &mut dyn GpuBackend,
    ) -> EngineResult<&'r PipelineObject> {
        profile_scope!("build_pipeline");

        if registry.contains(&self.name) {
            return Err(EngineError::DuplicatePipeline(self.name));
        }

        self.modules.sort_by_key(|m| m.stage());
        self.validate_stages()?;

        let signature = StageSetSignature::from_modules(self.modules.iter().map(Arc::as_ref));
        let layout = match registry.find_layout(&signature) {
            Some(layout) => {
                log::debug!("Pipeline '{}' reuses an existing binding layout", self.name);
                layout
            }
            None => {
                let resolved = registry.resolver().resolve(&self.modules)?;
                let handle = backend
                    .create_binding_layout(&BindingLayoutDescriptor {
                        label: &self.name,
                        parameters: resolved.root_parameters(),
                        static_samplers: resolved.static_samplers(),
                    })
                    .map_err(|source| EngineError::GpuCreation {
                        pipeline: self.name.clone(),
                        source,
                    })?;
                let layout = Arc::new(resolved.with_handle(handle));
                registry.insert_layout(Arc::clone(&layout));
                layout
            }
        };
        // Layouts enter the registry only after their GPU object exists
        let Some(layout_handle) = layout.handle() else {
            return Err(EngineError::InvalidConfig(format!(
                "binding layout for '{}' has no GPU object",
                self.name
            )));
        };

        let fixed_function = match self.kind {
            PipelineKind::Graphics => Some(self.fixed_function.take().unwrap_or_default()),
            _ => {
                if self.fixed_function.is_some() {
                    log::warn!(
                        "Ignoring fixed-function state for {} pipeline '{}'",
                        self.kind,
                        self.name
                    );
                }
                None
            }
        };
        let input_layout = self.input_layout();

        let handle = {
            let stages = self
                .modules
                .iter()
                .map(|m| StageBytecode {
                    stage: m.stage(),
                    entry_point: m.entry_point(),
                    bytecode: m.bytecode(),
                })
                .collect();
            backend
                .create_pipeline(&PipelineStateDescriptor {
                    label: &self.name,
                    kind: self.kind,
                    layout: layout_handle,
                    stages,
                    input_layout: &input_layout,
                    fixed_function: fixed_function.as_ref(),
                })
                .map_err(|source| EngineError::GpuCreation {
                    pipeline: self.name.clone(),
                    source,
                })?
        };

        log::info!(
            "Created {} pipeline '{}' ({} stages, {} binding slots)",
            self.kind,
            self.name,
            self.modules.len(),
            layout.len()
        );

        registry.insert(PipelineObject {
            name: self.name,
            kind: self.kind,
            layout,
            modules: self.modules,
            fixed_function,
            input_layout,
            handle,
        })
    }

    fn validate_stages(&self) -> EngineResult<()> {
        let required = self.kind.required_stage();
        if !self.modules.iter().any(|m| m.stage() == required) {
            return Err(EngineError::MissingStage {
                pipeline: self.name.clone(),
                stage: required,
            });
        }

        let mut previous: Option<ShaderStage> = None;
        for module in &self.modules {
            let stage = module.stage();
            if !self.kind.accepts(stage) {
                return Err(EngineError::UnexpectedStage {
                    pipeline: self.name.clone(),
                    stage,
                    reason: "not valid for this pipeline kind",
                });
            }
            // Raytracing pipelines may carry several miss and hit shaders
            let repeatable = stage.is_raytracing() && stage != ShaderStage::RayGeneration;
            if previous == Some(stage) && !repeatable {
                return Err(EngineError::UnexpectedStage {
                    pipeline: self.name.clone(),
                    stage,
                    reason: "stage supplied twice",
                });
            }
            previous = Some(stage);
        }
        Ok(())
    }

    /// Input elements packed in location order
    fn input_layout(&self) -> Vec<InputElement> {
        let Some(vertex) = self.modules.iter().find(|m| m.stage() == ShaderStage::Vertex) else {
            return Vec::new();
        };

        let mut offset = 0;
        vertex
            .vertex_inputs()
            .iter()
            .map(|input| {
                let element = InputElement {
                    semantic: input.semantic.clone(),
                    location: input.location,
                    format: input.format,
                    offset,
                };
                offset += input.format.size();
                element
            })
            .collect()
    }
}

/// Compile and build every described pipeline, in order.
///
/// Stops at the first failure; pipelines built before it stay registered.
pub fn load_pipelines(
    registry: &mut PipelineRegistry,
    compiler: &ShaderCompiler,
    backend: &mut dyn GpuBackend,
    descriptors: &[PipelineDescriptor],
) -> EngineResult<()> {
    profile_scope!("load_pipelines");

    for desc in descriptors {
        let modules = desc
            .stages
            .iter()
            .map(|stage| compiler.compile(stage).map(Arc::new))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut builder = PipelineBuilder::new(desc.name.clone(), desc.kind).with_modules(modules);
        if desc.kind == PipelineKind::Graphics {
            builder = builder.with_fixed_function(desc.fixed_function.clone());
        }
        builder.build(registry, backend)?;
    }

    log::info!("Loaded {} pipelines", descriptors.len());
    Ok(())
}
