//! Name-keyed catalog of pipelines and the layouts they share.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::{BindingLayout, BindingLayoutResolver, StageSetSignature};
use crate::error::{EngineError, EngineResult};
use crate::pipeline::PipelineObject;

/// Catalog of every pipeline and binding layout.
///
/// Filled through `&mut` while loading; frame recording only ever borrows it
/// shared.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: Vec<PipelineObject>,
    by_name: HashMap<String, usize>,
    layouts: Vec<Arc<BindingLayout>>,
    by_signature: HashMap<StageSetSignature, usize>,
    resolver: BindingLayoutResolver,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: BindingLayoutResolver) -> Self {
        Self {
            resolver,
            ..Self::default()
        }
    }

    pub fn resolver(&self) -> &BindingLayoutResolver {
        &self.resolver
    }

    /// Look up a pipeline by name.
    pub fn find(&self, name: &str) -> EngineResult<&PipelineObject> {
        self.get(name)
            .ok_or_else(|| EngineError::PipelineNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&PipelineObject> {
        self.by_name.get(name).map(|&i| &self.pipelines[i])
    }

    /// Layout previously resolved for a stage set.
    pub fn find_layout(&self, signature: &StageSetSignature) -> Option<Arc<BindingLayout>> {
        self.by_signature
            .get(signature)
            .map(|&i| Arc::clone(&self.layouts[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Pipeline names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pipelines.iter().map(|p| p.name.as_str())
    }

    pub fn pipelines(&self) -> &[PipelineObject] {
        &self.pipelines
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub(crate) fn insert_layout(&mut self, layout: Arc<BindingLayout>) {
        let signature = layout.signature().clone();
        self.by_signature.insert(signature, self.layouts.len());
        self.layouts.push(layout);
    }

    pub(crate) fn insert(&mut self, pipeline: PipelineObject) -> EngineResult<&PipelineObject> {
        if self.by_name.contains_key(&pipeline.name) {
            return Err(EngineError::DuplicatePipeline(pipeline.name));
        }
        let index = self.pipelines.len();
        self.by_name.insert(pipeline.name.clone(), index);
        self.pipelines.push(pipeline);
        Ok(&self.pipelines[index])
    }
}
