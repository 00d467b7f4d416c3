//! Draws one render layer with the scene's shading resources bound.

use crate::backend::RenderTarget;
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode};
use crate::render_graph::nodes::{bind_pass, bind_shading_resources, draw_layer};
use crate::scene::MAIN_PASS_INDEX;

/// Node for ordinary layers: opaque, transparent, alpha-tested, sky and the
/// debug layers.
#[derive(Debug)]
pub struct DefaultNode {
    base: NodeBase,
}

impl DefaultNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for DefaultNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        bind_pass(&self.base, ctx, MAIN_PASS_INDEX)?;
        bind_shading_resources(&self.base, ctx)
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        ctx.backend.set_render_target(&target);
        if let Some(layer) = self.base.render_layer() {
            draw_layer(&self.base, ctx, layer)?;
        }
        Ok(target)
    }
}
