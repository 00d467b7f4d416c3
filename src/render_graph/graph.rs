//! Render graph construction, validation and execution

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::backend::RenderTarget;
use crate::error::EngineResult;
use crate::pipeline::{PipelineKind, PipelineRegistry};
use crate::profiling::profile_scope;
use crate::render_graph::node::{FrameContext, NodeBase, NodeDescriptor, NodeKind, RenderNode};
use crate::render_graph::nodes::create_node;
use crate::scene::{RenderLayer, SceneData};

/// Errors from building or editing a render graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Render graph has no nodes")]
    Empty,

    #[error("Duplicate node name '{0}'")]
    DuplicateNode(String),

    #[error("Node '{node}' links to unknown node '{next}'")]
    UnknownNext { node: String, next: String },

    #[error("Render graph has no head node (every node is some node's next)")]
    NoHead,

    #[error("Render graph has several head nodes: {0:?}")]
    MultipleHeads(Vec<String>),

    #[error("Cycle detected at node '{0}'")]
    Cycle(String),

    #[error("Nodes not reachable from the head: {0:?}")]
    Unreachable(Vec<String>),

    #[error("Node '{node}' uses unknown pipeline '{pipeline}'")]
    UnknownPipeline { node: String, pipeline: String },

    #[error("Node '{node}' needs a {expected:?} pipeline but '{pipeline}' is {found:?}")]
    PipelineKindMismatch {
        node: String,
        pipeline: String,
        expected: PipelineKind,
        found: PipelineKind,
    },

    #[error("Node '{node}' uses unknown render layer '{layer}'")]
    UnknownRenderLayer { node: String, layer: String },

    #[error("Node '{0}' not found")]
    NodeNotFound(String),
}

/// Ordered list of render nodes, walked from the head along `next` links.
///
/// The links are validated once at build time (single head, no cycles, every
/// node reachable) and the nodes are stored in traversal order, so executing
/// a frame is a plain iteration.
pub struct RenderGraph {
    nodes: Vec<Box<dyn RenderNode>>,
    index: HashMap<String, usize>,
}

impl RenderGraph {
    /// Build a graph from node descriptors, resolving pipelines by name.
    pub fn build(
        descriptors: &[NodeDescriptor],
        registry: &PipelineRegistry,
    ) -> Result<Self, GraphError> {
        let links: Vec<(&str, Option<&str>)> = descriptors
            .iter()
            .map(|d| (d.name.as_str(), d.next.as_deref()))
            .collect();
        let order = traversal_order(&links)?;

        let mut nodes = Vec::with_capacity(order.len());
        for &i in &order {
            let desc = &descriptors[i];
            let pipeline =
                registry
                    .get(&desc.pipeline)
                    .ok_or_else(|| GraphError::UnknownPipeline {
                        node: desc.name.clone(),
                        pipeline: desc.pipeline.clone(),
                    })?;
            let render_layer = match &desc.render_layer {
                Some(layer) => Some(RenderLayer::from_name(layer).ok_or_else(|| {
                    GraphError::UnknownRenderLayer {
                        node: desc.name.clone(),
                        layer: layer.clone(),
                    }
                })?),
                None => RenderLayer::from_name(&desc.name),
            };

            let kind = NodeKind::resolve(&desc.node_type);
            if pipeline.kind() != kind.pipeline_kind() {
                return Err(GraphError::PipelineKindMismatch {
                    node: desc.name.clone(),
                    pipeline: desc.pipeline.clone(),
                    expected: kind.pipeline_kind(),
                    found: pipeline.kind(),
                });
            }
            let base = NodeBase::new(desc, kind, pipeline, render_layer);
            log::debug!(
                "Render node '{}' ({:?}) -> pipeline '{}'",
                desc.name,
                kind,
                desc.pipeline
            );
            nodes.push(create_node(kind, base));
        }

        let graph = Self::from_nodes(nodes);
        log::info!(
            "Built render graph with {} nodes: {}",
            graph.len(),
            graph.node_names().join(" -> ")
        );
        Ok(graph)
    }

    fn from_nodes(nodes: Vec<Box<dyn RenderNode>>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.base().name().to_string(), i))
            .collect();
        Self { nodes, index }
    }

    /// Forward the per-frame update to every node.
    pub fn update(&mut self, scene: &SceneData) {
        for node in &mut self.nodes {
            node.update(scene);
        }
    }

    /// Record every enabled node in order.
    ///
    /// Each node renders into the target the previous one returned, starting
    /// from the context's primary target. The final target is returned.
    pub fn execute(&self, ctx: &mut FrameContext) -> EngineResult<RenderTarget> {
        profile_scope!("execute_render_graph");

        let mut target = ctx.primary_target;
        for node in &self.nodes {
            let base = node.base();
            if !base.enabled() {
                log::trace!("Skipping disabled node '{}'", base.name());
                continue;
            }

            ctx.backend.begin_event(base.name());
            let result = node
                .bind_common_resources(ctx)
                .and_then(|()| node.execute(ctx, target));
            ctx.backend.end_event();
            target = result?;
        }
        Ok(target)
    }

    pub fn set_node_enabled(&mut self, name: &str, enabled: bool) -> Result<(), GraphError> {
        let node = self.node_mut(name)?;
        node.base_mut().set_enabled(enabled);
        log::debug!(
            "Node '{}' {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn is_node_enabled(&self, name: &str) -> Option<bool> {
        self.node(name).map(|node| node.base().enabled())
    }

    /// Change the `next` links of several nodes at once.
    ///
    /// The resulting links are validated like at build time; on failure the
    /// graph is left unchanged. Moving a node in a chain takes three edits,
    /// so they are applied together.
    pub fn relink(&mut self, changes: &[(&str, Option<&str>)]) -> Result<(), GraphError> {
        let mut targets = Vec::with_capacity(changes.len());
        for &(name, next) in changes {
            let index = *self
                .index
                .get(name)
                .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))?;
            targets.push((index, next));
        }
        let new_next = |i: usize| targets.iter().rev().find(|(t, _)| *t == i).map(|(_, n)| *n);

        let order = {
            let links: Vec<(&str, Option<&str>)> = self
                .nodes
                .iter()
                .enumerate()
                .map(|(i, node)| {
                    let base = node.base();
                    (base.name(), new_next(i).unwrap_or(base.next()))
                })
                .collect();
            traversal_order(&links)?
        };

        for (i, node) in self.nodes.iter_mut().enumerate() {
            if let Some(next) = new_next(i) {
                node.base_mut().set_next(next.map(str::to_string));
            }
        }

        let mut slots: Vec<Option<Box<dyn RenderNode>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let nodes = order.iter().filter_map(|&i| slots[i].take()).collect();
        *self = Self::from_nodes(nodes);
        log::debug!("Relinked render graph: {}", self.node_names().join(" -> "));
        Ok(())
    }

    /// Node names in traversal order
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.base().name()).collect()
    }

    pub fn node(&self, name: &str) -> Option<&dyn RenderNode> {
        self.index.get(name).map(|&i| self.nodes[i].as_ref())
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Box<dyn RenderNode>, GraphError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))?;
        Ok(&mut self.nodes[i])
    }

    /// Name of the first node
    pub fn head(&self) -> Option<&str> {
        self.nodes.first().map(|node| node.base().name())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Validate `(name, next)` links and return node indices in traversal order.
fn traversal_order(links: &[(&str, Option<&str>)]) -> Result<Vec<usize>, GraphError> {
    if links.is_empty() {
        return Err(GraphError::Empty);
    }

    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(links.len());
    for (i, (name, _)) in links.iter().enumerate() {
        if by_name.insert(*name, i).is_some() {
            return Err(GraphError::DuplicateNode(name.to_string()));
        }
    }

    let mut referenced = HashSet::new();
    for (name, next) in links {
        if let Some(next) = next {
            if !by_name.contains_key(next) {
                return Err(GraphError::UnknownNext {
                    node: name.to_string(),
                    next: next.to_string(),
                });
            }
            referenced.insert(*next);
        }
    }

    // Declaration order keeps error messages stable
    let heads: Vec<usize> = (0..links.len())
        .filter(|&i| !referenced.contains(links[i].0))
        .collect();
    let head = match heads.as_slice() {
        [] => return Err(GraphError::NoHead),
        [head] => *head,
        _ => {
            return Err(GraphError::MultipleHeads(
                heads.iter().map(|&i| links[i].0.to_string()).collect(),
            ))
        }
    };

    let mut order = Vec::with_capacity(links.len());
    let mut visited = vec![false; links.len()];
    let mut current = Some(head);
    while let Some(i) = current {
        if visited[i] {
            return Err(GraphError::Cycle(links[i].0.to_string()));
        }
        visited[i] = true;
        order.push(i);
        current = links[i].1.and_then(|next| by_name.get(next).copied());
    }

    if order.len() != links.len() {
        let unreachable = (0..links.len())
            .filter(|&i| !visited[i])
            .map(|i| links[i].0.to_string())
            .collect();
        return Err(GraphError::Unreachable(unreachable));
    }

    Ok(order)
}
