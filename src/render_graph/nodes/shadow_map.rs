//! Depth-only rendering into each shadow-casting light's map.

use crate::backend::RenderTarget;
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::{bind_pass, draw_layer};
use crate::scene::{RenderLayer, SHADOW_PASS_BASE};

#[derive(Debug)]
pub struct ShadowMapNode {
    base: NodeBase,
}

impl ShadowMapNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for ShadowMapNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        // Alpha-tested casters sample their diffuse map
        let materials = ctx.frame.materials().binding(0)?;
        self.base.bind(ctx.backend, Slot::Materials, materials);
        Ok(())
    }

    /// Leaves the incoming target untouched for the next node.
    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        let layer = self.base.render_layer().unwrap_or(RenderLayer::Opaque);
        let scene = ctx.scene;

        for (light, view) in (0u32..).zip(scene.shadow_views.iter()) {
            ctx.backend.set_render_target(&view.target);
            ctx.backend.clear_depth(&view.target, 1.0);
            bind_pass(&self.base, ctx, SHADOW_PASS_BASE + light)?;
            draw_layer(&self.base, ctx, layer)?;
        }
        Ok(target)
    }
}
