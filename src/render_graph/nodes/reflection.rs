//! Dynamic cube-map reflections.

use crate::backend::{BindingResource, RenderTarget};
use crate::error::EngineResult;
use crate::render_graph::node::{FrameContext, NodeBase, RenderNode, Slot};
use crate::render_graph::nodes::{bind_pass, bind_shading_resources, draw_layer};
use crate::scene::{RenderLayer, CUBE_FACE_PASS_BASE, MAIN_PASS_INDEX};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Renders the Opaque and Sky layers into the six faces of the scene's cube
/// target, then draws its own layer with that cube bound as the environment.
#[derive(Debug)]
pub struct ReflectionNode {
    base: NodeBase,
}

impl ReflectionNode {
    pub fn new(base: NodeBase) -> Self {
        Self { base }
    }
}

impl RenderNode for ReflectionNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn bind_common_resources(&self, ctx: &mut FrameContext) -> EngineResult<()> {
        self.base.activate(ctx.backend);
        bind_shading_resources(&self.base, ctx)
    }

    fn execute(&self, ctx: &mut FrameContext, target: RenderTarget) -> EngineResult<RenderTarget> {
        let cube = ctx.scene.resources.cube_target;

        match cube {
            Some(cube) => {
                for face in 0..6u32 {
                    let face_target = cube.at_layer(face);
                    bind_pass(&self.base, ctx, CUBE_FACE_PASS_BASE + face)?;
                    ctx.backend.clear_render_target(&face_target, CLEAR_COLOR);
                    ctx.backend.clear_depth(&face_target, 1.0);
                    ctx.backend.set_render_target(&face_target);
                    draw_layer(&self.base, ctx, RenderLayer::Opaque)?;
                    draw_layer(&self.base, ctx, RenderLayer::Sky)?;
                }
            }
            None => log::warn!(
                "Node '{}': scene has no cube target, drawing without dynamic reflections",
                self.base.name()
            ),
        }

        ctx.backend.set_render_target(&target);
        bind_pass(&self.base, ctx, MAIN_PASS_INDEX)?;
        if let Some(cube) = cube {
            self.base.bind(
                ctx.backend,
                Slot::CubeMap,
                BindingResource::DescriptorTable { first: cube.color },
            );
        }
        if let Some(layer) = self.base.render_layer() {
            draw_layer(&self.base, ctx, layer)?;
        }
        Ok(target)
    }
}
