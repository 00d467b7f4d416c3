//! Merges the reflection of several stages into one binding layout.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::{
    standard_samplers, BindingLayout, BindingSlot, SlotPlacement, StageSetSignature,
    StageVisibility, StaticSampler,
};
use crate::error::{EngineError, EngineResult};
use crate::profiling::profile_scope;
use crate::shader::{ResourceCategory, ShaderModule};

/// Builds [`BindingLayout`]s from compiled stages.
///
/// Modules are visited in fixed stage order and their bindings in the order
/// the compiler reported them, so the resulting slot indices depend only on
/// the input, never on hashing.
#[derive(Debug, Clone)]
pub struct BindingLayoutResolver {
    static_samplers: Arc<[StaticSampler]>,
}

impl Default for BindingLayoutResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingLayoutResolver {
    /// Resolver attaching the standard static sampler table
    pub fn new() -> Self {
        Self::with_static_samplers(standard_samplers())
    }

    pub fn with_static_samplers(samplers: Vec<StaticSampler>) -> Self {
        Self {
            static_samplers: samplers.into(),
        }
    }

    pub fn static_samplers(&self) -> &[StaticSampler] {
        &self.static_samplers
    }

    pub fn resolve(&self, modules: &[Arc<ShaderModule>]) -> EngineResult<BindingLayout> {
        profile_scope!("resolve_binding_layout");

        let mut ordered: Vec<&ShaderModule> = modules.iter().map(Arc::as_ref).collect();
        // Stable: two modules of one stage keep their relative order
        ordered.sort_by_key(|module| module.stage());

        let mut slots: Vec<BindingSlot> = Vec::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();

        for module in &ordered {
            let stage = module.stage();
            for binding in module.bindings() {
                if binding.category == ResourceCategory::Sampler {
                    continue;
                }

                if let Some(&existing) = by_name.get(binding.name.as_str()) {
                    let slot = &mut slots[existing];
                    if slot.category != binding.category {
                        return Err(EngineError::CategoryMismatch {
                            name: binding.name.clone(),
                            existing: slot.category,
                            found: binding.category,
                            stage,
                        });
                    }
                    slot.visibility |= StageVisibility::from_stage(stage);
                    continue;
                }

                let Some(placement) =
                    SlotPlacement::for_category(binding.category, binding.element_count)
                else {
                    continue;
                };

                by_name.insert(binding.name.as_str(), slots.len());
                slots.push(BindingSlot {
                    name: binding.name.clone(),
                    index: slots.len() as u32,
                    category: binding.category,
                    placement,
                    register: binding.register,
                    space: binding.space,
                    visibility: StageVisibility::from_stage(stage),
                });
            }
        }

        log::debug!(
            "Resolved binding layout: {} slots from {} stages",
            slots.len(),
            ordered.len()
        );

        Ok(BindingLayout::new(
            slots,
            StageSetSignature::from_modules(ordered.iter().copied()),
            self.static_samplers.clone(),
        ))
    }
}
