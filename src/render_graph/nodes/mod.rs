//! Render graph node variants and the helpers they share.

mod compute_filter;
mod default;
mod frustum_debug;
mod full_screen;
mod raytracing;
mod reflection;
mod shadow_map;

pub use compute_filter::ComputeFilterNode;
pub use default::DefaultNode;
pub use frustum_debug::FrustumDebugNode;
pub use full_screen::FullScreenNode;
pub use raytracing::RaytracingNode;
pub use reflection::ReflectionNode;
pub use shadow_map::ShadowMapNode;

use crate::backend::BindingResource;
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, NodeKind, RenderNode, Slot};
use crate::scene::RenderLayer;

/// Instantiate the node variant for `kind`.
pub fn create_node(kind: NodeKind, base: NodeBase) -> Box<dyn RenderNode> {
    match kind {
        NodeKind::Default => Box::new(DefaultNode::new(base)),
        NodeKind::Raytracing => Box::new(RaytracingNode::new(base)),
        NodeKind::Reflection => Box::new(ReflectionNode::new(base)),
        NodeKind::FrustumDebug => Box::new(FrustumDebugNode::new(base)),
        NodeKind::ShadowMap => Box::new(ShadowMapNode::new(base)),
        NodeKind::FullScreen => Box::new(FullScreenNode::new(base)),
        NodeKind::ComputeFilter { group_size } => {
            Box::new(ComputeFilterNode::new(base, group_size))
        }
    }
}

/// Bind entry `index` of the pass-constant buffer to `cbPass`.
pub(crate) fn bind_pass(base: &NodeBase, ctx: &mut FrameContext, index: u32) -> EngineResult<()> {
    let resource = ctx.frame.pass_constants().binding(index)?;
    base.bind(ctx.backend, Slot::Pass, resource);
    Ok(())
}

/// Bind materials, light arrays and the scene textures used for shading.
pub(crate) fn bind_shading_resources(base: &NodeBase, ctx: &mut FrameContext) -> EngineResult<()> {
    let frame = ctx.frame;
    base.bind(ctx.backend, Slot::Materials, frame.materials().binding(0)?);
    base.bind(
        ctx.backend,
        Slot::DirectionalLights,
        frame.directional_lights().binding(0)?,
    );
    base.bind(
        ctx.backend,
        Slot::PointLights,
        frame.point_lights().binding(0)?,
    );
    base.bind(ctx.backend, Slot::SpotLights, frame.spot_lights().binding(0)?);

    let resources = ctx.scene.resources;
    let textures = [
        (Slot::TextureMaps, resources.texture_table),
        (Slot::CubeMap, resources.environment_map),
        (Slot::ShadowMaps, resources.shadow_maps),
        (Slot::SsaoMap, resources.ssao_map),
    ];
    for (name, texture) in textures {
        if let Some(first) = texture {
            base.bind(ctx.backend, name, BindingResource::DescriptorTable { first });
        }
    }
    Ok(())
}

/// Draw every item of `layer`, binding each item's instance buffer.
pub(crate) fn draw_layer(
    base: &NodeBase,
    ctx: &mut FrameContext,
    layer: RenderLayer,
) -> EngineResult<()> {
    let (scene, frame) = (ctx.scene, ctx.frame);
    for item in scene.items(layer) {
        if item.instance_count == 0 {
            continue;
        }
        let Some(instances) = frame.instance_buffer(item.instances) else {
            log::warn!(
                "Node '{}': draw item '{}' has no instance buffer {:?}, skipping",
                base.name(),
                item.name,
                item.instances
            );
            continue;
        };
        base.bind(ctx.backend, Slot::Instances, instances.binding(0)?);
        ctx.backend.draw_indexed(&item.geometry, item.instance_count);
    }
    Ok(())
}
