//! Compute filters (blur, bilateral blur, edge detection) over the current target.

use crate::backend::{BindingResource, RenderTarget};
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::bind_pass;
use crate::scene::MAIN_PASS_INDEX;

/// Reads the incoming target as `gInput`, writes the scene's filter output
/// as `gOutput` with one thread per pixel, then copies the result back into
/// the target.
#[derive(Debug)]
pub struct ComputeFilterNode {
    base: NodeBase,
    group_size: (u32, u32),
}

impl ComputeFilterNode {
    pub fn new(base: NodeBase, group_size: (u32, u32)) -> Self {
        Self {
            base,
            group_size: (group_size.0.max(1), group_size.1.max(1)),
        }
    }

    /// Thread groups covering a `width` x `height` image
    pub fn group_count(&self, width: u32, height: u32) -> (u32, u32, u32) {
        (
            width.div_ceil(self.group_size.0),
            height.div_ceil(self.group_size.1),
            1,
        )
    }
}

impl RenderNode for ComputeFilterNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        if self.base.slot_index(Slot::Pass).is_some() {
            bind_pass(&self.base, ctx, MAIN_PASS_INDEX)?;
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        let Some(output) = ctx.scene.resources.filter_output else {
            log::warn!(
                "Node '{}': scene has no filter output texture, skipping dispatch",
                self.base.name()
            );
            return Ok(target);
        };

        self.base.bind(
            ctx.backend,
            Slot::Input,
            BindingResource::DescriptorTable {
                first: target.color,
            },
        );
        self.base.bind(
            ctx.backend,
            Slot::Output,
            BindingResource::DescriptorTable { first: output },
        );

        let (x, y, z) = self.group_count(target.width, target.height);
        ctx.backend.dispatch(x, y, z);
        ctx.backend.copy_texture(output, target.color);
        Ok(target)
    }
}
