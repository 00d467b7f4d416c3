//! Visualizes shadow-casting light frusta over the main view.

use crate::backend::RenderTarget;
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::bind_pass;
use crate::scene::{MAIN_PASS_INDEX, SHADOW_PASS_BASE};

/// Vertices of the two-triangle full-screen quad
const QUAD_VERTICES: u32 = 6;

#[derive(Debug)]
pub struct FrustumDebugNode {
    base: NodeBase,
}

impl FrustumDebugNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for FrustumDebugNode {
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
        self.base
            .bind(ctx.backend, Slot::Camera, frame.camera().binding(0)?);
        self.base.bind(
            ctx.backend,
            Slot::FrustumCorners,
            frame.frustum_corners().binding(0)?,
        );
        Ok(())
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        ctx.backend.set_render_target(&target);
        for light in 0..ctx.scene.shadow_views.len() as u32 {
            bind_pass(&self.base, ctx, SHADOW_PASS_BASE + light)?;
            ctx.backend.draw(QUAD_VERTICES, 1);
        }
        Ok(target)
    }
}
