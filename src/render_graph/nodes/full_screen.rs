//! Full-screen passes: post-processing, SSAO, debug views and present.

use crate::backend::{BindingResource, RenderTarget};
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::bind_pass;
use crate::scene::MAIN_PASS_INDEX;

/// Samples the incoming target as `gInput` and draws one full-screen
/// triangle into the primary target.
#[derive(Debug)]
pub struct FullScreenNode {
    base: NodeBase,
}

impl FullScreenNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for FullScreenNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        bind_pass(&self.base, ctx, MAIN_PASS_INDEX)?;

        let frame = ctx.frame;
        if self.base.slot_index(Slot::Ssao).is_some() {
            self.base
                .bind(ctx.backend, Slot::Ssao, frame.ssao().binding(0)?);
        }
        if let Some(first) = ctx.scene.resources.ssao_map {
            self.base.bind(
                ctx.backend,
                Slot::SsaoMap,
                BindingResource::DescriptorTable { first },
            );
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        self.base.bind(
            ctx.backend,
            Slot::Input,
            BindingResource::DescriptorTable {
                first: target.color,
            },
        );
        let output = ctx.primary_target;
        ctx.backend.set_render_target(&output);
        ctx.backend.draw(3, 1);
        Ok(output)
    }
}
