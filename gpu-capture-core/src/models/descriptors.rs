//! Parameter structures passed through intercepted calls.
//!
//! These mirror the graphics API's own descriptor structs, with one rule:
//! anything that is a pointer in the native API (object pointers, GPU
//! virtual addresses, CPU descriptor handles) is expressed here as a
//! [`ResourceId`] plus an offset or index, so it survives serialization and
//! can be resolved again at replay time.

use std::fmt;

/// Identity of a wrapped object for the lifetime of the process.
///
/// Allocated by the owning device, never zero, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// The id every device takes for itself.
    pub const DEVICE: ResourceId = ResourceId(1);

    /// Returns `None` for zero, which is never a valid id.
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId::{}", self.0)
    }
}

/// DXGI format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Format(pub u32);

impl Format {
    pub const UNKNOWN: Format = Format(0);
    pub const R8G8B8A8_UNORM: Format = Format(28);
    pub const R32_UINT: Format = Format(42);
    pub const R16_UINT: Format = Format(57);
    pub const D32_FLOAT: Format = Format(40);
}

/// Resource state bitmask (`D3D12_RESOURCE_STATES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceStates(pub u32);

impl ResourceStates {
    pub const COMMON: ResourceStates = ResourceStates(0);
    pub const VERTEX_AND_CONSTANT_BUFFER: ResourceStates = ResourceStates(0x1);
    pub const INDEX_BUFFER: ResourceStates = ResourceStates(0x2);
    pub const RENDER_TARGET: ResourceStates = ResourceStates(0x4);
    pub const COPY_DEST: ResourceStates = ResourceStates(0x400);
    pub const COPY_SOURCE: ResourceStates = ResourceStates(0x800);
    pub const PRESENT: ResourceStates = ResourceStates(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListType {
    Direct,
    Bundle,
    Compute,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    Default,
    Upload,
    Readback,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapType {
    CbvSrvUav,
    Sampler,
    Rtv,
    Dsv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopologyType {
    Undefined,
    Point,
    Line,
    Triangle,
    Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputClassification {
    PerVertexData,
    PerInstanceData,
}

/// A GPU virtual address, re-expressed relative to the resource it lies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuAddress {
    pub resource: ResourceId,
    pub offset: u64,
}

/// A CPU descriptor handle, re-expressed as a slot in a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuDescriptor {
    pub heap: ResourceId,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    pub alignment: u64,
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub layout: u32,
    pub flags: u32,
}

impl ResourceDesc {
    /// Plain linear buffer of `width` bytes.
    pub fn buffer(width: u64) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            alignment: 0,
            width,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: Format::UNKNOWN,
            sample_count: 1,
            sample_quality: 0,
            // D3D12_TEXTURE_LAYOUT_ROW_MAJOR
            layout: 1,
            flags: 0,
        }
    }

    pub fn texture_2d(format: Format, width: u64, height: u32) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            alignment: 0,
            width,
            height,
            depth_or_array_size: 1,
            mip_levels: 1,
            format,
            sample_count: 1,
            sample_quality: 0,
            layout: 0,
            flags: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapProperties {
    pub heap_type: HeapType,
    pub cpu_page_property: u32,
    pub memory_pool_preference: u32,
    pub creation_node_mask: u32,
    pub visible_node_mask: u32,
}

impl HeapProperties {
    pub fn of_type(heap_type: HeapType) -> Self {
        Self {
            heap_type,
            cpu_page_property: 0,
            memory_pool_preference: 0,
            creation_node_mask: 1,
            visible_node_mask: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color { format: Format, rgba: [f32; 4] },
    DepthStencil { format: Format, depth: f32, stencil: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandQueueDesc {
    pub queue_type: CommandListType,
    pub priority: i32,
    pub flags: u32,
    pub node_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorHeapDesc {
    pub heap_type: DescriptorHeapType,
    pub num_descriptors: u32,
    pub flags: u32,
    pub node_mask: u32,
}

/// Compiled shader blob. Empty means "no shader for this stage".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderBytecode {
    pub bytecode: Vec<u8>,
}

impl ShaderBytecode {
    pub fn new(bytecode: impl Into<Vec<u8>>) -> Self {
        Self {
            bytecode: bytecode.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElementDesc {
    pub semantic_name: String,
    pub semantic_index: u32,
    pub format: Format,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub input_slot_class: InputClassification,
    pub instance_data_step_rate: u32,
}

/// Upper bound on simultaneously bound render targets.
pub const MAX_RENDER_TARGETS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineStateDesc {
    pub root_signature: Option<ResourceId>,
    pub vs: ShaderBytecode,
    pub ps: ShaderBytecode,
    pub ds: ShaderBytecode,
    pub hs: ShaderBytecode,
    pub gs: ShaderBytecode,
    pub sample_mask: u32,
    pub input_layout: Vec<InputElementDesc>,
    pub primitive_topology_type: PrimitiveTopologyType,
    /// At most [`MAX_RENDER_TARGETS`] entries.
    pub rtv_formats: Vec<Format>,
    pub dsv_format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub node_mask: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineStateDesc {
    pub root_signature: Option<ResourceId>,
    pub cs: ShaderBytecode,
    pub node_mask: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer_location: GpuAddress,
    pub size_in_bytes: u32,
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    pub buffer_location: GpuAddress,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBarrier {
    Transition {
        resource: ResourceId,
        subresource: u32,
        state_before: ResourceStates,
        state_after: ResourceStates,
        flags: u32,
    },
    Aliasing {
        before: Option<ResourceId>,
        after: Option<ResourceId>,
        flags: u32,
    },
    Uav {
        resource: Option<ResourceId>,
        flags: u32,
    },
}

impl ResourceBarrier {
    /// All subresources of the transitioned resource.
    pub const ALL_SUBRESOURCES: u32 = 0xffff_ffff;

    pub fn transition(resource: ResourceId, before: ResourceStates, after: ResourceStates) -> Self {
        Self::Transition {
            resource,
            subresource: Self::ALL_SUBRESOURCES,
            state_before: before,
            state_after: after,
            flags: 0,
        }
    }

    /// Every object this barrier refers to.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> {
        let ids = match *self {
            Self::Transition { resource, .. } => [Some(resource), None],
            Self::Aliasing { before, after, .. } => [before, after],
            Self::Uav { resource, .. } => [resource, None],
        };
        ids.into_iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedArgs {
    pub index_count_per_instance: u32,
    pub instance_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
    pub start_instance_location: u32,
}

/// Parameters recorded at the head of every capture so replay can create an
/// equivalent device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInitParams {
    pub device: ResourceId,
    pub minimum_feature_level: u32,
    pub sdk_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub filter: u32,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: u32,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferViewDesc {
    pub buffer_location: GpuAddress,
    pub size_in_bytes: u32,
}

/// `D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING`
pub const DEFAULT_COMPONENT_MAPPING: u32 = 0x1688;

/// Which part of the resource a shader resource view covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SrvDimension {
    Buffer {
        first_element: u64,
        num_elements: u32,
        structure_byte_stride: u32,
        flags: u32,
    },
    Texture2D {
        most_detailed_mip: u32,
        mip_levels: u32,
        plane_slice: u32,
        resource_min_lod_clamp: f32,
    },
    Texture2DArray {
        most_detailed_mip: u32,
        mip_levels: u32,
        first_array_slice: u32,
        array_size: u32,
        plane_slice: u32,
        resource_min_lod_clamp: f32,
    },
    TextureCube {
        most_detailed_mip: u32,
        mip_levels: u32,
        resource_min_lod_clamp: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderResourceViewDesc {
    pub format: Format,
    pub component_mapping: u32,
    pub dimension: SrvDimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtvDimension {
    Buffer {
        first_element: u64,
        num_elements: u32,
    },
    Texture2D {
        mip_slice: u32,
        plane_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
        plane_slice: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetViewDesc {
    pub format: Format,
    pub dimension: RtvDimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsvDimension {
    Texture2D {
        mip_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilViewDesc {
    pub format: Format,
    pub flags: u32,
    pub dimension: DsvDimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UavDimension {
    Buffer {
        first_element: u64,
        num_elements: u32,
        structure_byte_stride: u32,
        counter_offset_in_bytes: u64,
        flags: u32,
    },
    Texture2D {
        mip_slice: u32,
        plane_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
        plane_slice: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnorderedAccessViewDesc {
    pub format: Format,
    pub dimension: UavDimension,
}

/// What one descriptor heap slot was last written with.
///
/// A view without a description uses the resource's default view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorContents {
    Undefined,
    Sampler(SamplerDesc),
    ConstantBuffer(ConstantBufferViewDesc),
    ShaderResource {
        resource: Option<ResourceId>,
        desc: Option<ShaderResourceViewDesc>,
    },
    RenderTarget {
        resource: Option<ResourceId>,
        desc: Option<RenderTargetViewDesc>,
    },
    DepthStencil {
        resource: Option<ResourceId>,
        desc: Option<DepthStencilViewDesc>,
    },
    UnorderedAccess {
        resource: Option<ResourceId>,
        counter: Option<ResourceId>,
        desc: Option<UnorderedAccessViewDesc>,
    },
}

impl DescriptorContents {
    /// Every object the descriptor refers to.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> {
        let ids = match *self {
            Self::Undefined | Self::Sampler(_) => [None, None],
            Self::ConstantBuffer(desc) => [Some(desc.buffer_location.resource), None],
            Self::ShaderResource { resource, .. }
            | Self::RenderTarget { resource, .. }
            | Self::DepthStencil { resource, .. } => [resource, None],
            Self::UnorderedAccess {
                resource, counter, ..
            } => [resource, counter],
        };
        ids.into_iter().flatten()
    }
}

/// One descriptor heap slot and its contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descriptor {
    pub slot: CpuDescriptor,
    pub contents: DescriptorContents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSeverity {
    Corruption,
    Error,
    Warning,
    Info,
    Message,
}

/// One message from the API's debug layer, queued for the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage {
    pub severity: MessageSeverity,
    pub category: u32,
    pub id: u32,
    pub description: String,
}
