//! Render graph node contract and shared node state

use std::sync::Arc;

use crate::backend::{
    BindingLayoutHandle, BindingResource, GpuBackend, PipelineHandle, RenderTarget,
};
use crate::binding::BindingLayout;
use crate::error::EngineResult;
use crate::frame::FrameResources;
use crate::pipeline::{PipelineKind, PipelineObject, PipelineRegistry};
use crate::scene::{RenderLayer, SceneData};

/// Well-known resources nodes bind, each resolved to a layout slot once
/// when the node is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Pass,
    Camera,
    Ssao,
    FrustumCorners,
    Materials,
    DirectionalLights,
    PointLights,
    SpotLights,
    Instances,
    TextureMaps,
    CubeMap,
    ShadowMaps,
    SsaoMap,
    Scene,
    Output,
    VertexData,
    Input,
}

impl Slot {
    pub const COUNT: usize = 17;

    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::Pass,
        Slot::Camera,
        Slot::Ssao,
        Slot::FrustumCorners,
        Slot::Materials,
        Slot::DirectionalLights,
        Slot::PointLights,
        Slot::SpotLights,
        Slot::Instances,
        Slot::TextureMaps,
        Slot::CubeMap,
        Slot::ShadowMaps,
        Slot::SsaoMap,
        Slot::Scene,
        Slot::Output,
        Slot::VertexData,
        Slot::Input,
    ];

    /// Shader resource name the slot is looked up by
    pub fn name(self) -> &'static str {
        match self {
            Slot::Pass => "cbPass",
            Slot::Camera => "cbCamera",
            Slot::Ssao => "cbSsao",
            Slot::FrustumCorners => "cbFrustumCorners",
            Slot::Materials => "gMaterialData",
            Slot::DirectionalLights => "gDirectionalLights",
            Slot::PointLights => "gPointLights",
            Slot::SpotLights => "gSpotLights",
            Slot::Instances => "gInstanceData",
            Slot::TextureMaps => "gTextureMaps",
            Slot::CubeMap => "gCubeMap",
            Slot::ShadowMaps => "gShadowMaps",
            Slot::SsaoMap => "gSsaoMap",
            Slot::Scene => "gScene",
            Slot::Output => "gOutput",
            Slot::VertexData => "gVertexData",
            Slot::Input => "gInput",
        }
    }
}

/// Node variant, chosen from the configuration type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Draws the items of one render layer
    Default,
    Raytracing,
    /// Renders a dynamic cube map, then draws its own layer with it
    Reflection,
    FrustumDebug,
    ShadowMap,
    /// Post-process style pass over the current target
    FullScreen,
    /// Compute filter over the current target, one thread per pixel
    ComputeFilter {
        /// Threads per group along x and y, fixed by the filter's shader
        group_size: (u32, u32),
    },
}

impl NodeKind {
    /// Kind for a configuration type name, `None` if the name is unknown
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Opaque" | "Transparent" | "AlphaTested" | "Default" | "Sky" | "DebugBox"
            | "AABBVisualizer" | "TangentNormalDebug" => NodeKind::Default,
            "OpaqueDynamicReflections" | "Reflection" => NodeKind::Reflection,
            "Raytracing" => NodeKind::Raytracing,
            "FrustumDebug" => NodeKind::FrustumDebug,
            "Shadow" => NodeKind::ShadowMap,
            "PostProcess" | "SSAO" | "ShadowDebug" | "CopyTarget" | "Present" | "UI" => {
                NodeKind::FullScreen
            }
            "HorizontalBlur" => NodeKind::ComputeFilter {
                group_size: (256, 1),
            },
            "VerticalBlur" => NodeKind::ComputeFilter {
                group_size: (1, 256),
            },
            "Blur" | "BilateralBlur" | "SobelFilter" | "Sobel" | "Compute" => {
                NodeKind::ComputeFilter {
                    group_size: (16, 16),
                }
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Like [`from_type_name`](Self::from_type_name), falling back to
    /// [`NodeKind::Default`] with a warning
    pub fn resolve(name: &str) -> Self {
        Self::from_type_name(name).unwrap_or_else(|| {
            log::warn!("Unknown render node type '{}', using Default", name);
            NodeKind::Default
        })
    }

    /// Pipeline kind a node of this kind records with
    pub fn pipeline_kind(self) -> PipelineKind {
        match self {
            NodeKind::Raytracing => PipelineKind::Raytracing,
            NodeKind::ComputeFilter { .. } => PipelineKind::Compute,
            NodeKind::Default
            | NodeKind::Reflection
            | NodeKind::FrustumDebug
            | NodeKind::ShadowMap
            | NodeKind::FullScreen => PipelineKind::Graphics,
        }
    }
}

/// A node as configuration describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: String,
    pub node_type: String,
    pub pipeline: String,
    /// Layer to draw; when unset the node name is tried as a layer name
    pub render_layer: Option<String>,
    pub next: Option<String>,
    pub enabled: bool,
}

impl NodeDescriptor {
    /// Node whose type name is its own name, as most configurations write it
    pub fn new(name: impl Into<String>, pipeline: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            node_type: name.clone(),
            name,
            pipeline: pipeline.into(),
            render_layer: None,
            next: None,
            enabled: true,
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.render_layer = Some(layer.into());
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// State every node variant shares.
///
/// Slot indices for every [`Slot`] are looked up once here; binding a slot
/// the layout lacks logs a warning and does nothing.
#[derive(Debug)]
pub struct NodeBase {
    name: String,
    kind: NodeKind,
    pipeline: String,
    pipeline_handle: PipelineHandle,
    layout: Arc<BindingLayout>,
    layout_handle: Option<BindingLayoutHandle>,
    render_layer: Option<RenderLayer>,
    next: Option<String>,
    enabled: bool,
    slots: [Option<u32>; Slot::COUNT],
}

impl NodeBase {
    pub(crate) fn new(
        desc: &NodeDescriptor,
        kind: NodeKind,
        pipeline: &PipelineObject,
        render_layer: Option<RenderLayer>,
    ) -> Self {
        let layout = Arc::clone(pipeline.layout());
        let slots = Slot::ALL.map(|slot| layout.slot_index(slot.name()));

        Self {
            name: desc.name.clone(),
            kind,
            pipeline: desc.pipeline.clone(),
            pipeline_handle: pipeline.handle(),
            layout_handle: layout.handle(),
            layout,
            render_layer,
            next: desc.next.clone(),
            enabled: desc.enabled,
            slots,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn layout(&self) -> &BindingLayout {
        &self.layout
    }

    pub fn render_layer(&self) -> Option<RenderLayer> {
        self.render_layer
    }

    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    pub(crate) fn set_next(&mut self, next: Option<String>) {
        self.next = next;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Binding-table index of `slot`, `None` if the layout lacks it
    pub fn slot_index(&self, slot: Slot) -> Option<u32> {
        self.slots[slot as usize]
    }

    /// Make this node's pipeline and binding layout current.
    pub fn activate(&self, backend: &mut dyn GpuBackend) {
        match self.layout_handle {
            Some(layout) => backend.set_pipeline(self.pipeline_handle, layout),
            None => log::warn!(
                "Node '{}': pipeline '{}' has no GPU binding layout",
                self.name,
                self.pipeline
            ),
        }
    }

    /// Bind `resource` to `slot`; a miss is logged and skipped.
    pub fn bind(&self, backend: &mut dyn GpuBackend, slot: Slot, resource: BindingResource) {
        match self.slot_index(slot) {
            Some(index) => backend.bind(index, resource),
            None => log::warn!(
                "Node '{}': pipeline '{}' has no binding '{}', skipping",
                self.name,
                self.pipeline,
                slot.name()
            ),
        }
    }
}

/// Everything a node may touch while recording a frame
pub struct FrameContext<'a> {
    pub backend: &'a mut dyn GpuBackend,
    pub registry: &'a PipelineRegistry,
    pub frame: &'a FrameResources,
    pub scene: &'a SceneData,
    /// Target the graph starts from and full-screen passes resolve into
    pub primary_target: RenderTarget,
}

/// A render graph node.
///
/// The graph calls [`bind_common_resources`](Self::bind_common_resources)
/// then [`execute`](Self::execute) for every enabled node, in order.
pub trait RenderNode: Send + Sync {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Per-frame hook, called before the graph executes
    fn update(&mut self, _scene: &SceneData) {}

    /// Activate the pipeline and bind the resources every draw of this node uses
    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()>;

    /// Record the node's work against `target`; returns the target the next
    /// node should render to
    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget>;
}
