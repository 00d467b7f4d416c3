//! Binding layouts resolved from shader reflection.
//!
//! A [`BindingLayout`] is the contract between a set of compiled stages and
//! the code that binds resources for them: every named resource gets one slot,
//! its index is its position in the layout, and its visibility covers every
//! stage that reads it.
//!
//! Layouts are produced by [`BindingLayoutResolver`] and owned by the
//! pipeline registry. They are never mutated after creation.

pub mod resolver;
pub mod samplers;

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;

use crate::backend::{
    BindingLayoutHandle, DescriptorRangeType, RootParameter, ShaderVisibility,
};
use crate::shader::{ResourceCategory, ShaderModule, ShaderStage};

pub use resolver::BindingLayoutResolver;
pub use samplers::{standard_samplers, StaticSampler};

bitflags! {
    /// Set of stages a slot is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageVisibility: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
        const RAY_GENERATION = 1 << 6;
        const INTERSECTION = 1 << 7;
        const ANY_HIT = 1 << 8;
        const CLOSEST_HIT = 1 << 9;
        const MISS = 1 << 10;

        const GRAPHICS = Self::VERTEX.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits()
            | Self::GEOMETRY.bits()
            | Self::PIXEL.bits();
        const RAYTRACING = Self::RAY_GENERATION.bits()
            | Self::INTERSECTION.bits()
            | Self::ANY_HIT.bits()
            | Self::CLOSEST_HIT.bits()
            | Self::MISS.bits();
    }
}

impl StageVisibility {
    pub fn from_stage(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Hull => Self::HULL,
            ShaderStage::Domain => Self::DOMAIN,
            ShaderStage::Geometry => Self::GEOMETRY,
            ShaderStage::Pixel => Self::PIXEL,
            ShaderStage::Compute => Self::COMPUTE,
            ShaderStage::RayGeneration => Self::RAY_GENERATION,
            ShaderStage::Intersection => Self::INTERSECTION,
            ShaderStage::AnyHit => Self::ANY_HIT,
            ShaderStage::ClosestHit => Self::CLOSEST_HIT,
            ShaderStage::Miss => Self::MISS,
        }
    }

    /// Visibility as the GPU layout expresses it.
    ///
    /// Only a single graphics stage narrows the parameter; any slot shared
    /// between stages, or used by compute or raytracing, is visible to all.
    pub fn to_shader_visibility(self) -> ShaderVisibility {
        if self == Self::VERTEX {
            ShaderVisibility::Vertex
        } else if self == Self::HULL {
            ShaderVisibility::Hull
        } else if self == Self::DOMAIN {
            ShaderVisibility::Domain
        } else if self == Self::GEOMETRY {
            ShaderVisibility::Geometry
        } else if self == Self::PIXEL {
            ShaderVisibility::Pixel
        } else {
            ShaderVisibility::All
        }
    }
}

/// Where a slot lives in the GPU binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPlacement {
    /// Root constant buffer view
    RootConstantBuffer,
    /// Root shader resource view, read access
    RootShaderResource,
    /// Descriptor table holding `count` descriptors
    DescriptorTable {
        range: DescriptorRangeType,
        count: u32,
    },
}

impl SlotPlacement {
    /// Placement chosen for a resource category, `None` for samplers
    pub fn for_category(category: ResourceCategory, element_count: u32) -> Option<Self> {
        let placement = match category {
            ResourceCategory::ConstantBuffer => SlotPlacement::RootConstantBuffer,
            ResourceCategory::StructuredBuffer | ResourceCategory::AccelerationStructure => {
                SlotPlacement::RootShaderResource
            }
            ResourceCategory::Texture => SlotPlacement::DescriptorTable {
                range: DescriptorRangeType::ShaderResource,
                count: element_count.max(1),
            },
            ResourceCategory::ReadWrite => SlotPlacement::DescriptorTable {
                range: DescriptorRangeType::UnorderedAccess,
                count: element_count.max(1),
            },
            ResourceCategory::Sampler => return None,
        };
        Some(placement)
    }
}

/// One named entry of a binding layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlot {
    pub name: String,
    /// Binding-table index, equal to the slot's position in the layout
    pub index: u32,
    pub category: ResourceCategory,
    pub placement: SlotPlacement,
    pub register: u32,
    pub space: u32,
    pub visibility: StageVisibility,
}

impl BindingSlot {
    pub fn root_parameter(&self) -> RootParameter {
        match self.placement {
            SlotPlacement::RootConstantBuffer => RootParameter::ConstantBuffer {
                register: self.register,
                space: self.space,
            },
            SlotPlacement::RootShaderResource => RootParameter::ShaderResource {
                register: self.register,
                space: self.space,
            },
            SlotPlacement::DescriptorTable { range, count } => RootParameter::DescriptorTable {
                range,
                count,
                base_register: self.register,
                space: self.space,
            },
        }
    }
}

/// Identity of a stage set: sorted `(stage, entry point, bytecode hash)`.
///
/// Two pipelines built from the same stages share one layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageSetSignature(Vec<(ShaderStage, String, u64)>);

impl StageSetSignature {
    pub fn from_modules<'a>(modules: impl IntoIterator<Item = &'a ShaderModule>) -> Self {
        let mut entries: Vec<_> = modules
            .into_iter()
            .map(|m| (m.stage(), m.entry_point().to_string(), m.bytecode_hash()))
            .collect();
        entries.sort();
        Self(entries)
    }

    pub fn stages(&self) -> impl Iterator<Item = ShaderStage> + '_ {
        self.0.iter().map(|(stage, _, _)| *stage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered name → slot map shared by every pipeline built from one stage set
#[derive(Debug, Clone)]
pub struct BindingLayout {
    slots: Vec<BindingSlot>,
    lookup: HashMap<String, usize>,
    signature: StageSetSignature,
    static_samplers: Arc<[StaticSampler]>,
    handle: Option<BindingLayoutHandle>,
}

impl BindingLayout {
    pub(crate) fn new(
        slots: Vec<BindingSlot>,
        signature: StageSetSignature,
        static_samplers: Arc<[StaticSampler]>,
    ) -> Self {
        let lookup = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.name.clone(), i))
            .collect();
        Self {
            slots,
            lookup,
            signature,
            static_samplers,
            handle: None,
        }
    }

    pub(crate) fn with_handle(mut self, handle: BindingLayoutHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Slot for a resource name
    pub fn slot(&self, name: &str) -> Option<&BindingSlot> {
        self.lookup.get(name).map(|&i| &self.slots[i])
    }

    /// Binding-table index for a resource name
    pub fn slot_index(&self, name: &str) -> Option<u32> {
        self.slot(name).map(|slot| slot.index)
    }

    /// Slots in binding-table order
    pub fn slots(&self) -> &[BindingSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn signature(&self) -> &StageSetSignature {
        &self.signature
    }

    pub fn static_samplers(&self) -> &[StaticSampler] {
        &self.static_samplers
    }

    /// GPU object, set once the layout has been created on a backend
    pub fn handle(&self) -> Option<BindingLayoutHandle> {
        self.handle
    }

    /// Root parameters and visibilities in slot order
    pub fn root_parameters(&self) -> Vec<(RootParameter, ShaderVisibility)> {
        self.slots
            .iter()
            .map(|slot| (slot.root_parameter(), slot.visibility.to_shader_visibility()))
            .collect()
    }
}
