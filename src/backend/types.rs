//! Plain data shared between the core and GPU backends

use bitflags::bitflags;

use crate::backend::traits::{
    AccelerationStructureHandle, BindingLayoutHandle, BufferHandle, TextureHandle,
};
use crate::binding::StaticSampler;
use crate::pipeline::PipelineKind;
use crate::shader::ShaderStage;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    R16Float,
    R32Float,
    Rg16Float,
    Depth32Float,
    Depth24PlusStencil8,
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const UNORDERED_ACCESS = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// 6 for cube maps
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
        }
    }
}

/// CPU-writable upload buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    /// Constant buffers must be bound at 256-byte aligned offsets
    pub constant_buffer: bool,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x4,
    Sint32,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

/// One element of a graphics pipeline's input layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Slice of a mesh to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryView {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

/// A color target with optional depth, as seen by a render graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub color: TextureHandle,
    /// Array layer of `color`; cube faces use layers 0..6
    pub layer: u32,
    pub depth: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(color: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            color,
            layer: 0,
            depth: None,
            width,
            height,
        }
    }

    pub fn with_depth(mut self, depth: TextureHandle) -> Self {
        self.depth = Some(depth);
        self
    }

    /// The same target viewed at another array layer
    pub fn at_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Polygon fill mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth/stencil and comparison samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend component state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        }
    }
}

bitflags! {
    /// Color channels a render target write touches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Per-target blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enabled: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    pub write_mask: ColorWrites,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            color: BlendComponent::default(),
            alpha: BlendComponent::default(),
            write_mask: ColorWrites::ALL,
        }
    }
}

impl BlendState {
    pub fn alpha_blending() -> Self {
        Self {
            enabled: true,
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::Zero,
                operation: BlendOperation::Add,
            },
            write_mask: ColorWrites::ALL,
        }
    }
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip: bool,
    pub multisample: bool,
    pub antialiased_lines: bool,
    pub conservative: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Cw,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip: true,
            multisample: false,
            antialiased_lines: false,
            conservative: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

/// Depth/stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub stencil_enabled: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: CompareFunction::Less,
            stencil_enabled: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

/// Everything a graphics pipeline fixes besides its shaders
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionState {
    pub blend: BlendState,
    pub alpha_to_coverage: bool,
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub topology: PrimitiveTopology,
    pub render_target_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub sample_count: u32,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            alpha_to_coverage: false,
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            topology: PrimitiveTopology::TriangleList,
            render_target_formats: vec![TextureFormat::Rgba8Unorm],
            depth_format: Some(TextureFormat::Depth24PlusStencil8),
            sample_count: 1,
        }
    }
}

impl FixedFunctionState {
    /// Depth-only state for shadow map rendering
    pub fn shadow_map() -> Self {
        Self {
            rasterizer: RasterizerState {
                depth_bias: 100_000,
                slope_scaled_depth_bias: 1.0,
                ..RasterizerState::default()
            },
            render_target_formats: Vec::new(),
            ..Self::default()
        }
    }

    /// Sky box: drawn from inside, depth equal to the far plane
    pub fn sky() -> Self {
        Self {
            rasterizer: RasterizerState {
                cull_mode: CullMode::None,
                ..RasterizerState::default()
            },
            depth_stencil: DepthStencilState {
                depth_compare: CompareFunction::LessEqual,
                ..DepthStencilState::default()
            },
            ..Self::default()
        }
    }

    pub fn transparent() -> Self {
        Self {
            blend: BlendState::alpha_blending(),
            ..Self::default()
        }
    }

    /// Full-screen passes: no depth, no culling
    pub fn full_screen() -> Self {
        Self {
            rasterizer: RasterizerState {
                cull_mode: CullMode::None,
                ..RasterizerState::default()
            },
            depth_stencil: DepthStencilState {
                depth_test: false,
                depth_write: false,
                ..DepthStencilState::default()
            },
            depth_format: None,
            ..Self::default()
        }
    }
}

/// Sampler filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Point,
    Linear,
    Anisotropic,
}

/// Sampler address mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Border,
    Mirror,
}

/// Shader visibility of a binding-layout parameter as the GPU sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
}

/// Descriptor range kind inside a descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRangeType {
    ShaderResource,
    UnorderedAccess,
}

/// One parameter of a GPU binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameter {
    ConstantBuffer {
        register: u32,
        space: u32,
    },
    ShaderResource {
        register: u32,
        space: u32,
    },
    DescriptorTable {
        range: DescriptorRangeType,
        count: u32,
        base_register: u32,
        space: u32,
    },
}

/// Binding-layout creation request
#[derive(Debug, Clone)]
pub struct BindingLayoutDescriptor<'a> {
    pub label: &'a str,
    pub parameters: Vec<(RootParameter, ShaderVisibility)>,
    pub static_samplers: &'a [StaticSampler],
}

/// Bytecode of one stage handed to pipeline creation
#[derive(Debug, Clone, Copy)]
pub struct StageBytecode<'a> {
    pub stage: ShaderStage,
    pub entry_point: &'a str,
    pub bytecode: &'a [u8],
}

/// Pipeline creation request
#[derive(Debug, Clone)]
pub struct PipelineStateDescriptor<'a> {
    pub label: &'a str,
    pub kind: PipelineKind,
    pub layout: BindingLayoutHandle,
    pub stages: Vec<StageBytecode<'a>>,
    pub input_layout: &'a [InputElement],
    /// `None` for compute and raytracing pipelines
    pub fixed_function: Option<&'a FixedFunctionState>,
}

/// A resource bound to one binding-layout slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// Root constant buffer view at a byte offset into an upload buffer
    ConstantBuffer { buffer: BufferHandle, offset: u64 },
    /// Root shader resource view of a structured buffer
    ShaderResource { buffer: BufferHandle, offset: u64 },
    AccelerationStructure(AccelerationStructureHandle),
    /// Descriptor table starting at the descriptor of `first`
    DescriptorTable { first: TextureHandle },
}
