//! The engine-wide static sampler table

use crate::backend::{AddressMode, CompareFunction, FilterMode};

/// A sampler baked into every binding layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSampler {
    pub name: &'static str,
    pub register: u32,
    pub space: u32,
    pub filter: FilterMode,
    pub address: AddressMode,
    /// Set for comparison (shadow) samplers
    pub comparison: Option<CompareFunction>,
    pub max_anisotropy: u32,
}

impl StaticSampler {
    const fn new(name: &'static str, register: u32, filter: FilterMode, address: AddressMode) -> Self {
        Self {
            name,
            register,
            space: 0,
            filter,
            address,
            comparison: None,
            max_anisotropy: if matches!(filter, FilterMode::Anisotropic) { 8 } else { 1 },
        }
    }
}

/// Point, linear and anisotropic filtering in wrap and clamp modes at
/// `s0..s5`, then the shadow comparison sampler at `s6`.
pub fn standard_samplers() -> Vec<StaticSampler> {
    vec![
        StaticSampler::new("gsamPointWrap", 0, FilterMode::Point, AddressMode::Wrap),
        StaticSampler::new("gsamPointClamp", 1, FilterMode::Point, AddressMode::Clamp),
        StaticSampler::new("gsamLinearWrap", 2, FilterMode::Linear, AddressMode::Wrap),
        StaticSampler::new("gsamLinearClamp", 3, FilterMode::Linear, AddressMode::Clamp),
        StaticSampler::new("gsamAnisotropicWrap", 4, FilterMode::Anisotropic, AddressMode::Wrap),
        StaticSampler::new("gsamAnisotropicClamp", 5, FilterMode::Anisotropic, AddressMode::Clamp),
        StaticSampler {
            comparison: Some(CompareFunction::LessEqual),
            max_anisotropy: 16,
            ..StaticSampler::new("gsamShadow", 6, FilterMode::Linear, AddressMode::Border)
        },
    ]
}
