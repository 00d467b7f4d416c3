//! GPU-visible constant and structured-buffer layouts.
//!
//! Every struct here is `#[repr(C)]` and `Pod`; the sizes are fixed by the
//! shaders that read them and checked at compile time.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Per-pass constants (`cbPass`).
///
/// One instance per render pass: the main camera, the six cube-map faces and
/// one per shadow-casting light.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PassConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    /// View-projection-texture transform of the first shadow map
    pub shadow_transform: Mat4,
    pub eye_pos: Vec3,
    pub _padding0: f32,
    pub render_target_size: Vec2,
    pub inv_render_target_size: Vec2,
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: Vec4,
    pub directional_light_count: u32,
    pub point_light_count: u32,
    pub spot_light_count: u32,
    pub _padding1: u32,
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            inv_proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
            shadow_transform: Mat4::IDENTITY,
            eye_pos: Vec3::ZERO,
            _padding0: 0.0,
            render_target_size: Vec2::ZERO,
            inv_render_target_size: Vec2::ZERO,
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: Vec4::new(0.25, 0.25, 0.35, 1.0),
            directional_light_count: 0,
            point_light_count: 0,
            spot_light_count: 0,
            _padding1: 0,
        }
    }
}

impl PassConstants {
    /// Constants for a camera at `eye` with the given view and projection
    pub fn from_camera(view: Mat4, proj: Mat4, eye: Vec3, width: u32, height: u32) -> Self {
        let view_proj = proj * view;
        let size = Vec2::new(width as f32, height as f32);
        Self {
            view,
            inv_view: view.inverse(),
            proj,
            inv_proj: proj.inverse(),
            view_proj,
            inv_view_proj: view_proj.inverse(),
            eye_pos: eye,
            render_target_size: size,
            inv_render_target_size: size.recip(),
            ..Self::default()
        }
    }
}

/// Main camera matrices (`cbCamera`), used by debug passes
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct CameraMatrices {
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    /// xyz = eye position, w = unused
    pub eye_pos: Vec4,
    pub _padding: [Vec4; 3],
}

/// Per-material data (`gMaterialData`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialData {
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub transform: Mat4,
    /// Index into the texture table
    pub diffuse_map_index: u32,
    pub normal_map_index: u32,
    pub _padding: [u32; 2],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            transform: Mat4::IDENTITY,
            diffuse_map_index: 0,
            normal_map_index: 0,
            _padding: [0; 2],
        }
    }
}

/// Directional light (`gDirectionalLights`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct DirectionalLight {
    /// World to shadow-map texture space
    pub shadow_transform: Mat4,
    pub direction: Vec3,
    pub shadow_map_index: u32,
    pub strength: Vec3,
    /// Non-zero when the light renders a shadow map
    pub casts_shadow: u32,
}

/// Point light (`gPointLights`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PointLight {
    pub position: Vec3,
    pub falloff_start: f32,
    pub strength: Vec3,
    pub falloff_end: f32,
}

/// Spot light (`gSpotLights`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct SpotLight {
    pub shadow_transform: Mat4,
    pub position: Vec3,
    pub falloff_start: f32,
    pub direction: Vec3,
    pub falloff_end: f32,
    pub strength: Vec3,
    pub spot_power: f32,
    pub casts_shadow: u32,
    pub shadow_map_index: u32,
    pub _padding: [u32; 2],
}

/// Per-instance data (`gInstanceData`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    pub world: Mat4,
    pub tex_transform: Mat4,
    pub material_index: u32,
    pub _padding: [u32; 3],
}

impl Default for InstanceData {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
            material_index: 0,
            _padding: [0; 3],
        }
    }
}

/// Screen-space ambient occlusion constants (`cbSsao`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SsaoConstants {
    pub proj: Mat4,
    pub inv_proj: Mat4,
    /// Projection followed by the NDC to texture-space transform
    pub proj_tex: Mat4,
    pub offset_vectors: [Vec4; 14],
    /// Up to 11 gaussian blur weights, packed four per vector
    pub blur_weights: [Vec4; 3],
    pub inv_render_target_size: Vec2,
    pub occlusion_radius: f32,
    pub occlusion_fade_start: f32,
    pub occlusion_fade_end: f32,
    pub surface_epsilon: f32,
    pub _padding: [f32; 2],
}

impl Default for SsaoConstants {
    fn default() -> Self {
        Self {
            proj: Mat4::IDENTITY,
            inv_proj: Mat4::IDENTITY,
            proj_tex: Mat4::IDENTITY,
            offset_vectors: [Vec4::ZERO; 14],
            blur_weights: [Vec4::ZERO; 3],
            inv_render_target_size: Vec2::ZERO,
            occlusion_radius: 0.5,
            occlusion_fade_start: 0.2,
            occlusion_fade_end: 2.0,
            surface_epsilon: 0.05,
            _padding: [0.0; 2],
        }
    }
}

/// World-space corners of the main camera frustum (`cbFrustumCorners`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct FrustumCorners {
    /// Near plane first, then far plane; w = 1
    pub corners: [Vec4; 8],
}

static_assertions::const_assert_eq!(std::mem::size_of::<PassConstants>(), 528);
static_assertions::const_assert_eq!(std::mem::size_of::<CameraMatrices>(), 192);
static_assertions::const_assert_eq!(std::mem::size_of::<MaterialData>(), 112);
static_assertions::const_assert_eq!(std::mem::size_of::<DirectionalLight>(), 96);
static_assertions::const_assert_eq!(std::mem::size_of::<PointLight>(), 32);
static_assertions::const_assert_eq!(std::mem::size_of::<SpotLight>(), 128);
static_assertions::const_assert_eq!(std::mem::size_of::<InstanceData>(), 144);
static_assertions::const_assert_eq!(std::mem::size_of::<SsaoConstants>(), 496);
static_assertions::const_assert_eq!(std::mem::size_of::<FrustumCorners>(), 128);
