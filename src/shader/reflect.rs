//! Resource reflection over naga IR.
//!
//! Bindings are reported in global declaration order, filtered to the globals
//! the chosen entry point actually uses. `group` maps to the register space
//! and `binding` to the register.

use naga::valid::ModuleInfo;
use naga::{AddressSpace, ArraySize, Binding, ImageClass, ScalarKind, TypeInner, VectorSize};

use crate::backend::VertexFormat;
use crate::shader::{ReflectedBinding, ResourceCategory, VertexInput};

/// Resources used by entry point `entry_index`, in declaration order.
pub fn reflect_bindings(
    module: &naga::Module,
    info: &ModuleInfo,
    entry_index: usize,
) -> Vec<ReflectedBinding> {
    let usage = info.get_entry_point(entry_index);

    module
        .global_variables
        .iter()
        .filter_map(|(handle, var)| {
            let binding = var.binding.as_ref()?;
            if usage[handle].is_empty() {
                return None;
            }
            let (category, element_count) = classify(module, var)?;
            let name = var
                .name
                .clone()
                .or_else(|| module.types[var.ty].name.clone())
                .unwrap_or_else(|| format!("binding_{}_{}", binding.group, binding.binding));

            Some(ReflectedBinding {
                name,
                category,
                register: binding.binding,
                space: binding.group,
                element_count,
            })
        })
        .collect()
}

/// Location-bound inputs of a vertex entry point, sorted by location.
pub fn reflect_vertex_inputs(module: &naga::Module, entry_index: usize) -> Vec<VertexInput> {
    let entry = &module.entry_points[entry_index];
    if entry.stage != naga::ShaderStage::Vertex {
        return Vec::new();
    }

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        match argument.binding {
            Some(Binding::Location { location, .. }) => {
                push_input(module, &mut inputs, argument.name.as_deref(), location, argument.ty)
            }
            Some(Binding::BuiltIn(_)) => {}
            None => {
                if let TypeInner::Struct { ref members, .. } = module.types[argument.ty].inner {
                    for member in members {
                        if let Some(Binding::Location { location, .. }) = member.binding {
                            push_input(
                                module,
                                &mut inputs,
                                member.name.as_deref(),
                                location,
                                member.ty,
                            );
                        }
                    }
                }
            }
        }
    }

    inputs.sort_by_key(|input| input.location);
    inputs
}

fn push_input(
    module: &naga::Module,
    inputs: &mut Vec<VertexInput>,
    name: Option<&str>,
    location: u32,
    ty: naga::Handle<naga::Type>,
) {
    match vertex_format(&module.types[ty].inner) {
        Some(format) => inputs.push(VertexInput {
            semantic: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("ATTRIBUTE{location}")),
            location,
            format,
        }),
        None => log::warn!(
            "Vertex input at location {} has a type with no vertex format, skipping",
            location
        ),
    }
}

fn classify(module: &naga::Module, var: &naga::GlobalVariable) -> Option<(ResourceCategory, u32)> {
    let (inner, element_count) = match module.types[var.ty].inner {
        TypeInner::BindingArray { base, size } => (&module.types[base].inner, array_len(size)),
        ref other => (other, 1),
    };

    let category = match var.space {
        AddressSpace::Uniform => ResourceCategory::ConstantBuffer,
        AddressSpace::Storage { access } => {
            if access.contains(naga::StorageAccess::STORE) {
                ResourceCategory::ReadWrite
            } else {
                ResourceCategory::StructuredBuffer
            }
        }
        AddressSpace::Handle => match *inner {
            TypeInner::Image {
                class: ImageClass::Storage { .. },
                ..
            } => ResourceCategory::ReadWrite,
            TypeInner::Image { .. } => ResourceCategory::Texture,
            TypeInner::Sampler { .. } => ResourceCategory::Sampler,
            TypeInner::AccelerationStructure => ResourceCategory::AccelerationStructure,
            _ => return None,
        },
        _ => return None,
    };

    Some((category, element_count))
}

fn array_len(size: ArraySize) -> u32 {
    match size {
        ArraySize::Constant(len) => len.get(),
        // Unbounded arrays get a single descriptor; the table is sized at bind time
        _ => 1,
    }
}

fn vertex_format(inner: &TypeInner) -> Option<VertexFormat> {
    let (scalar, size) = match *inner {
        TypeInner::Scalar(scalar) => (scalar, None),
        TypeInner::Vector { size, scalar } => (scalar, Some(size)),
        _ => return None,
    };
    if scalar.width != 4 {
        return None;
    }

    let format = match (scalar.kind, size) {
        (ScalarKind::Float, None) => VertexFormat::Float32,
        (ScalarKind::Float, Some(VectorSize::Bi)) => VertexFormat::Float32x2,
        (ScalarKind::Float, Some(VectorSize::Tri)) => VertexFormat::Float32x3,
        (ScalarKind::Float, Some(VectorSize::Quad)) => VertexFormat::Float32x4,
        (ScalarKind::Uint, None) => VertexFormat::Uint32,
        (ScalarKind::Uint, Some(VectorSize::Bi)) => VertexFormat::Uint32x2,
        (ScalarKind::Uint, Some(VectorSize::Quad)) => VertexFormat::Uint32x4,
        (ScalarKind::Sint, None) => VertexFormat::Sint32,
        _ => return None,
    };
    Some(format)
}
