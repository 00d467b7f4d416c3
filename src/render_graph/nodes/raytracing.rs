//! Ray traced pass: one ray dispatch over the output, copied into the target.

use crate::backend::{BindingResource, RenderTarget};
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::bind_pass;
use crate::scene::MAIN_PASS_INDEX;

#[derive(Debug)]
pub struct RaytracingNode {
    base: NodeBase,
}

impl RaytracingNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for RaytracingNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        bind_pass(&self.base, ctx, MAIN_PASS_INDEX)?;

        let Some(rt) = ctx.scene.resources.raytracing else {
            return Ok(());
        };
        self.base.bind(
            ctx.backend,
            Slot::Scene,
            BindingResource::AccelerationStructure(rt.scene),
        );
        self.base.bind(
            ctx.backend,
            Slot::Output,
            BindingResource::DescriptorTable { first: rt.output },
        );
        match ctx.frame.instance_buffer(rt.instances) {
            Some(instances) => {
                let resource = instances.binding(0)?;
                self.base.bind(ctx.backend, Slot::Instances, resource);
            }
            None => log::warn!(
                "Node '{}': no instance buffer {:?} for the acceleration structure",
                self.base.name(),
                rt.instances
            ),
        }
        self.base.bind(
            ctx.backend,
            Slot::VertexData,
            BindingResource::ShaderResource {
                buffer: rt.vertex_data,
                offset: 0,
            },
        );
        Ok(())
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        let Some(rt) = ctx.scene.resources.raytracing else {
            log::warn!(
                "Node '{}': scene has no raytracing resources, skipping dispatch",
                self.base.name()
            );
            return Ok(target);
        };

        ctx.backend.dispatch_rays(rt.width, rt.height, 1);
        ctx.backend.copy_texture(rt.output, target.color);
        Ok(target)
    }
}
