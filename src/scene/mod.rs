//! Per-frame scene data handed to the engine.
//!
//! The engine never builds any of this itself: the application (camera,
//! animation, asset loading) fills a [`SceneData`] each frame and the engine
//! uploads it into the current frame slot before walking the render graph.

pub mod constants;

use std::collections::BTreeMap;

use crate::backend::{AccelerationStructureHandle, BufferHandle, GeometryView, RenderTarget, TextureHandle};

pub use constants::{
    CameraMatrices, DirectionalLight, FrustumCorners, InstanceData, MaterialData,
    PassConstants, PointLight, SpotLight, SsaoConstants,
};

/// Index of the main camera pass in the pass-constant buffer
pub const MAIN_PASS_INDEX: u32 = 0;
/// First of the six cube-map face passes
pub const CUBE_FACE_PASS_BASE: u32 = 1;
/// First shadow pass; one per shadow-casting light follows
pub const SHADOW_PASS_BASE: u32 = CUBE_FACE_PASS_BASE + 6;

/// Group of draw items a render graph node draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    Opaque,
    Transparent,
    AlphaTested,
    Sky,
    OpaqueDynamicReflections,
    Water,
    Debug,
    DebugBox,
}

impl RenderLayer {
    pub const ALL: [RenderLayer; 8] = [
        RenderLayer::Opaque,
        RenderLayer::Transparent,
        RenderLayer::AlphaTested,
        RenderLayer::Sky,
        RenderLayer::OpaqueDynamicReflections,
        RenderLayer::Water,
        RenderLayer::Debug,
        RenderLayer::DebugBox,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderLayer::Opaque => "Opaque",
            RenderLayer::Transparent => "Transparent",
            RenderLayer::AlphaTested => "AlphaTested",
            RenderLayer::Sky => "Sky",
            RenderLayer::OpaqueDynamicReflections => "OpaqueDynamicReflections",
            RenderLayer::Water => "Water",
            RenderLayer::Debug => "Debug",
            RenderLayer::DebugBox => "DebugBox",
        }
    }
}

/// Key of a per-render-item instance buffer in the frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceBufferId(pub u64);

/// One mesh draw: geometry plus the instance buffer that places it
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub name: String,
    pub geometry: GeometryView,
    pub instances: InstanceBufferId,
    /// Visible instances, drawn from the start of the instance buffer
    pub instance_count: u32,
}

/// A shadow-casting light's pass and depth target
#[derive(Debug, Clone, Copy)]
pub struct ShadowView {
    pub pass: PassConstants,
    pub target: RenderTarget,
}

/// Raytracing inputs and output
#[derive(Debug, Clone, Copy)]
pub struct RaytracingResources {
    pub scene: AccelerationStructureHandle,
    /// Read-write texture the ray generation shader writes
    pub output: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub vertex_data: BufferHandle,
    pub instances: InstanceBufferId,
}

/// GPU resources the scene owns and nodes bind by name
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneResources {
    /// First descriptor of the bindless texture table
    pub texture_table: Option<TextureHandle>,
    pub environment_map: Option<TextureHandle>,
    /// Array texture, one layer per shadow-casting light
    pub shadow_maps: Option<TextureHandle>,
    pub ssao_map: Option<TextureHandle>,
    /// Six-layer target the reflection node renders into
    pub cube_target: Option<RenderTarget>,
    pub raytracing: Option<RaytracingResources>,
    /// Read-write texture compute filters write before it is copied back
    pub filter_output: Option<TextureHandle>,
}

/// Everything the engine needs to record one frame
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    pub main_pass: PassConstants,
    pub cube_face_passes: [PassConstants; 6],
    pub camera: CameraMatrices,
    pub materials: Vec<MaterialData>,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,
    pub shadow_views: Vec<ShadowView>,
    pub items: BTreeMap<RenderLayer, Vec<DrawItem>>,
    pub instances: BTreeMap<InstanceBufferId, Vec<InstanceData>>,
    pub ssao: SsaoConstants,
    pub frustum_corners: FrustumCorners,
    pub resources: SceneResources,
}

impl SceneData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, layer: RenderLayer, item: DrawItem) {
        self.items.entry(layer).or_default().push(item);
    }

    /// Draw items of a layer, empty when the layer has none
    pub fn items(&self, layer: RenderLayer) -> &[DrawItem] {
        self.items.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_instances(&mut self, id: InstanceBufferId, instances: Vec<InstanceData>) {
        self.instances.insert(id, instances);
    }

    /// Number of pass-constant entries this scene uploads
    pub fn pass_count(&self) -> u32 {
        SHADOW_PASS_BASE + self.shadow_views.len() as u32
    }

    /// Pass constants in upload order: main, cube faces, then shadow passes.
    ///
    /// Light counts are stamped into every entry.
    pub fn pass_constants(&self) -> Vec<PassConstants> {
        let mut passes = Vec::with_capacity(self.pass_count() as usize);
        passes.push(self.main_pass);
        passes.extend_from_slice(&self.cube_face_passes);
        passes.extend(self.shadow_views.iter().map(|view| view.pass));

        for pass in &mut passes {
            pass.directional_light_count = self.directional_lights.len() as u32;
            pass.point_light_count = self.point_lights.len() as u32;
            pass.spot_light_count = self.spot_lights.len() as u32;
        }
        passes
    }
}
