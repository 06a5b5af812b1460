//! Per-type encode/decode for every parameter structure that can appear in a
//! chunk payload.
//!
//! Each type has exactly one encoding, chosen statically through the
//! [`Marshal`] impl at the call site. The encodings are pure: they only touch
//! the writer or reader they are given.

use crate::models::descriptors::{
    ClearValue, CommandListType, CommandQueueDesc, ComputePipelineStateDesc,
    ConstantBufferViewDesc, CpuDescriptor, DebugMessage, DepthStencilViewDesc, Descriptor,
    DescriptorContents, DescriptorHeapDesc, DescriptorHeapType, DeviceInitParams, DrawIndexedArgs,
    DsvDimension, Format, GpuAddress, GraphicsPipelineStateDesc, HeapProperties, HeapType,
    IndexBufferView, InputClassification, InputElementDesc, MessageSeverity, PrimitiveTopology,
    PrimitiveTopologyType, Rect, RenderTargetViewDesc, ResourceBarrier, ResourceDesc,
    ResourceDimension, ResourceId, ResourceStates, RtvDimension, SamplerDesc, ShaderBytecode,
    ShaderResourceViewDesc, SrvDimension, UavDimension, UnorderedAccessViewDesc, VertexBufferView,
    Viewport, MAX_RENDER_TARGETS,
};
use crate::models::error::CaptureError;

use super::serialiser::{PayloadReader, PayloadWriter};

/// Bidirectional byte mapping for one parameter type.
pub trait Marshal: Sized {
    /// Type name used in diagnostics and by the registry.
    const NAME: &'static str;

    /// Smallest possible encoding, in bytes. Decoding anything shorter fails
    /// before a single field is read.
    const MIN_SIZE: usize;

    /// Reject values whose encoding `decode` would refuse. The registry
    /// calls this before writing anything.
    fn validate(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn encode(&self, w: &mut PayloadWriter);

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError>;
}

fn check_render_targets(count: usize) -> Result<(), CaptureError> {
    if count > MAX_RENDER_TARGETS {
        return Err(CaptureError::malformed(format!(
            "{} render target formats, at most {} allowed",
            count, MAX_RENDER_TARGETS
        )));
    }
    Ok(())
}

/// Encode a single value into a fresh buffer.
pub fn encode_to_vec<T: Marshal>(value: &T) -> Vec<u8> {
    let mut w = PayloadWriter::with_capacity(T::MIN_SIZE);
    value.encode(&mut w);
    w.into_bytes()
}

/// Decode a buffer that holds exactly one `T`.
pub fn decode_exact<T: Marshal>(bytes: &[u8]) -> Result<T, CaptureError> {
    let mut r = PayloadReader::new(bytes);
    r.require(T::MIN_SIZE, T::NAME)?;
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

fn bad_tag(ty: &str, tag: u32) -> CaptureError {
    CaptureError::malformed(format!("unknown {} tag {}", ty, tag))
}

// --- Primitives ---

impl Marshal for u8 {
    const NAME: &'static str = "u8";
    const MIN_SIZE: usize = 1;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u8(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_u8()
    }
}

impl Marshal for u16 {
    const NAME: &'static str = "u16";
    const MIN_SIZE: usize = 2;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u16(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_u16()
    }
}

impl Marshal for u32 {
    const NAME: &'static str = "u32";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u32(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_u32()
    }
}

impl Marshal for u64 {
    const NAME: &'static str = "u64";
    const MIN_SIZE: usize = 8;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u64(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_u64()
    }
}

impl Marshal for i32 {
    const NAME: &'static str = "i32";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_i32(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_i32()
    }
}

impl Marshal for f32 {
    const NAME: &'static str = "f32";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_f32(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_f32()
    }
}

impl Marshal for bool {
    const NAME: &'static str = "bool";
    const MIN_SIZE: usize = 1;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_bool(*self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_bool()
    }
}

impl Marshal for String {
    const NAME: &'static str = "string";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_str(self);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.read_string()
    }
}

impl Marshal for [f32; 4] {
    const NAME: &'static str = "float4";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        for v in self {
            w.write_f32(*v);
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok([r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?])
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    const NAME: &'static str = "array";
    const MIN_SIZE: usize = 4;

    fn validate(&self) -> Result<(), CaptureError> {
        self.iter().try_for_each(T::validate)
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_count(self.len());
        for item in self {
            item.encode(w);
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        let count = r.read_count(T::MIN_SIZE)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<T: Marshal> Marshal for Option<T> {
    const NAME: &'static str = "optional";
    const MIN_SIZE: usize = 1;

    fn validate(&self) -> Result<(), CaptureError> {
        self.as_ref().map_or(Ok(()), T::validate)
    }

    fn encode(&self, w: &mut PayloadWriter) {
        match self {
            Some(value) => {
                w.write_u8(1);
                value.encode(w);
            }
            None => w.write_u8(0),
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            other => Err(bad_tag(Self::NAME, other as u32)),
        }
    }
}

// --- Handles and addresses ---

impl Marshal for ResourceId {
    const NAME: &'static str = "ResourceId";
    const MIN_SIZE: usize = 8;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u64(self.get());
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        let raw = r.read_u64()?;
        ResourceId::new(raw).ok_or_else(|| CaptureError::malformed("null resource id"))
    }
}

impl Marshal for GpuAddress {
    const NAME: &'static str = "GpuAddress";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.resource);
        w.write_u64(self.offset);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok(Self {
            resource: r.get()?,
            offset: r.read_u64()?,
        })
    }
}

impl Marshal for CpuDescriptor {
    const NAME: &'static str = "CpuDescriptor";
    const MIN_SIZE: usize = 12;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.heap);
        w.write_u32(self.index);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok(Self {
            heap: r.get()?,
            index: r.read_u32()?,
        })
    }
}

// --- Plain codes ---

impl Marshal for Format {
    const NAME: &'static str = "Format";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u32(self.0);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok(Format(r.read_u32()?))
    }
}

impl Marshal for ResourceStates {
    const NAME: &'static str = "ResourceStates";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u32(self.0);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok(ResourceStates(r.read_u32()?))
    }
}

impl Marshal for CommandListType {
    const NAME: &'static str = "CommandListType";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::Direct => 0,
            Self::Bundle => 1,
            Self::Compute => 2,
            Self::Copy => 3,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::Direct),
            1 => Ok(Self::Bundle),
            2 => Ok(Self::Compute),
            3 => Ok(Self::Copy),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for ResourceDimension {
    const NAME: &'static str = "ResourceDimension";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::Unknown => 0,
            Self::Buffer => 1,
            Self::Texture1D => 2,
            Self::Texture2D => 3,
            Self::Texture3D => 4,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Buffer),
            2 => Ok(Self::Texture1D),
            3 => Ok(Self::Texture2D),
            4 => Ok(Self::Texture3D),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for HeapType {
    const NAME: &'static str = "HeapType";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        // Native values start at 1.
        let tag = match self {
            Self::Default => 1,
            Self::Upload => 2,
            Self::Readback => 3,
            Self::Custom => 4,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            1 => Ok(Self::Default),
            2 => Ok(Self::Upload),
            3 => Ok(Self::Readback),
            4 => Ok(Self::Custom),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for DescriptorHeapType {
    const NAME: &'static str = "DescriptorHeapType";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::CbvSrvUav => 0,
            Self::Sampler => 1,
            Self::Rtv => 2,
            Self::Dsv => 3,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::CbvSrvUav),
            1 => Ok(Self::Sampler),
            2 => Ok(Self::Rtv),
            3 => Ok(Self::Dsv),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for PrimitiveTopology {
    const NAME: &'static str = "PrimitiveTopology";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::Undefined => 0,
            Self::PointList => 1,
            Self::LineList => 2,
            Self::LineStrip => 3,
            Self::TriangleList => 4,
            Self::TriangleStrip => 5,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::PointList),
            2 => Ok(Self::LineList),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::TriangleList),
            5 => Ok(Self::TriangleStrip),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for PrimitiveTopologyType {
    const NAME: &'static str = "PrimitiveTopologyType";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::Undefined => 0,
            Self::Point => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Patch => 4,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Point),
            2 => Ok(Self::Line),
            3 => Ok(Self::Triangle),
            4 => Ok(Self::Patch),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for InputClassification {
    const NAME: &'static str = "InputClassification";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::PerVertexData => 0,
            Self::PerInstanceData => 1,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::PerVertexData),
            1 => Ok(Self::PerInstanceData),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for MessageSeverity {
    const NAME: &'static str = "MessageSeverity";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        let tag = match self {
            Self::Corruption => 0,
            Self::Error => 1,
            Self::Warning => 2,
            Self::Info => 3,
            Self::Message => 4,
        };
        w.write_u32(tag);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        match r.read_u32()? {
            0 => Ok(Self::Corruption),
            1 => Ok(Self::Error),
            2 => Ok(Self::Warning),
            3 => Ok(Self::Info),
            4 => Ok(Self::Message),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

// --- Descriptor structures ---

impl Marshal for ResourceDesc {
    const NAME: &'static str = "D3D12_RESOURCE_DESC";
    const MIN_SIZE: usize = 48;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.dimension);
        w.write_u64(self.alignment);
        w.write_u64(self.width);
        w.write_u32(self.height);
        w.write_u16(self.depth_or_array_size);
        w.write_u16(self.mip_levels);
        w.put(&self.format);
        w.write_u32(self.sample_count);
        w.write_u32(self.sample_quality);
        w.write_u32(self.layout);
        w.write_u32(self.flags);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            dimension: r.get()?,
            alignment: r.read_u64()?,
            width: r.read_u64()?,
            height: r.read_u32()?,
            depth_or_array_size: r.read_u16()?,
            mip_levels: r.read_u16()?,
            format: r.get()?,
            sample_count: r.read_u32()?,
            sample_quality: r.read_u32()?,
            layout: r.read_u32()?,
            flags: r.read_u32()?,
        })
    }
}

impl Marshal for HeapProperties {
    const NAME: &'static str = "D3D12_HEAP_PROPERTIES";
    const MIN_SIZE: usize = 20;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.heap_type);
        w.write_u32(self.cpu_page_property);
        w.write_u32(self.memory_pool_preference);
        w.write_u32(self.creation_node_mask);
        w.write_u32(self.visible_node_mask);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            heap_type: r.get()?,
            cpu_page_property: r.read_u32()?,
            memory_pool_preference: r.read_u32()?,
            creation_node_mask: r.read_u32()?,
            visible_node_mask: r.read_u32()?,
        })
    }
}

impl Marshal for ClearValue {
    const NAME: &'static str = "D3D12_CLEAR_VALUE";
    const MIN_SIZE: usize = 13;

    fn encode(&self, w: &mut PayloadWriter) {
        match self {
            Self::Color { format, rgba } => {
                w.write_u32(0);
                w.put(format);
                w.put(rgba);
            }
            Self::DepthStencil {
                format,
                depth,
                stencil,
            } => {
                w.write_u32(1);
                w.put(format);
                w.write_f32(*depth);
                w.write_u8(*stencil);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            0 => Ok(Self::Color {
                format: r.get()?,
                rgba: r.get()?,
            }),
            1 => Ok(Self::DepthStencil {
                format: r.get()?,
                depth: r.read_f32()?,
                stencil: r.read_u8()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for CommandQueueDesc {
    const NAME: &'static str = "D3D12_COMMAND_QUEUE_DESC";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.queue_type);
        w.write_i32(self.priority);
        w.write_u32(self.flags);
        w.write_u32(self.node_mask);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            queue_type: r.get()?,
            priority: r.read_i32()?,
            flags: r.read_u32()?,
            node_mask: r.read_u32()?,
        })
    }
}

impl Marshal for DescriptorHeapDesc {
    const NAME: &'static str = "D3D12_DESCRIPTOR_HEAP_DESC";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.heap_type);
        w.write_u32(self.num_descriptors);
        w.write_u32(self.flags);
        w.write_u32(self.node_mask);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            heap_type: r.get()?,
            num_descriptors: r.read_u32()?,
            flags: r.read_u32()?,
            node_mask: r.read_u32()?,
        })
    }
}

impl Marshal for ShaderBytecode {
    const NAME: &'static str = "D3D12_SHADER_BYTECODE";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_bytes(&self.bytecode);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        Ok(Self {
            bytecode: r.read_bytes()?,
        })
    }
}

impl Marshal for InputElementDesc {
    const NAME: &'static str = "D3D12_INPUT_ELEMENT_DESC";
    const MIN_SIZE: usize = 28;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_str(&self.semantic_name);
        w.write_u32(self.semantic_index);
        w.put(&self.format);
        w.write_u32(self.input_slot);
        w.write_u32(self.aligned_byte_offset);
        w.put(&self.input_slot_class);
        w.write_u32(self.instance_data_step_rate);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            semantic_name: r.read_string()?,
            semantic_index: r.read_u32()?,
            format: r.get()?,
            input_slot: r.read_u32()?,
            aligned_byte_offset: r.read_u32()?,
            input_slot_class: r.get()?,
            instance_data_step_rate: r.read_u32()?,
        })
    }
}

impl Marshal for GraphicsPipelineStateDesc {
    const NAME: &'static str = "D3D12_GRAPHICS_PIPELINE_STATE_DESC";
    const MIN_SIZE: usize = 57;

    fn validate(&self) -> Result<(), CaptureError> {
        check_render_targets(self.rtv_formats.len())?;
        self.input_layout.validate()
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.root_signature);
        w.put(&self.vs);
        w.put(&self.ps);
        w.put(&self.ds);
        w.put(&self.hs);
        w.put(&self.gs);
        w.write_u32(self.sample_mask);
        w.put(&self.input_layout);
        w.put(&self.primitive_topology_type);
        w.put(&self.rtv_formats);
        w.put(&self.dsv_format);
        w.write_u32(self.sample_count);
        w.write_u32(self.sample_quality);
        w.write_u32(self.node_mask);
        w.write_u32(self.flags);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        let root_signature = r.get()?;
        let vs = r.get()?;
        let ps = r.get()?;
        let ds = r.get()?;
        let hs = r.get()?;
        let gs = r.get()?;
        let sample_mask = r.read_u32()?;
        let input_layout = r.get()?;
        let primitive_topology_type = r.get()?;
        let rtv_formats: Vec<Format> = r.get()?;
        check_render_targets(rtv_formats.len())?;
        Ok(Self {
            root_signature,
            vs,
            ps,
            ds,
            hs,
            gs,
            sample_mask,
            input_layout,
            primitive_topology_type,
            rtv_formats,
            dsv_format: r.get()?,
            sample_count: r.read_u32()?,
            sample_quality: r.read_u32()?,
            node_mask: r.read_u32()?,
            flags: r.read_u32()?,
        })
    }
}

impl Marshal for ComputePipelineStateDesc {
    const NAME: &'static str = "D3D12_COMPUTE_PIPELINE_STATE_DESC";
    const MIN_SIZE: usize = 13;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.root_signature);
        w.put(&self.cs);
        w.write_u32(self.node_mask);
        w.write_u32(self.flags);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            root_signature: r.get()?,
            cs: r.get()?,
            node_mask: r.read_u32()?,
            flags: r.read_u32()?,
        })
    }
}

impl Marshal for IndexBufferView {
    const NAME: &'static str = "D3D12_INDEX_BUFFER_VIEW";
    const MIN_SIZE: usize = 24;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.buffer_location);
        w.write_u32(self.size_in_bytes);
        w.put(&self.format);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            buffer_location: r.get()?,
            size_in_bytes: r.read_u32()?,
            format: r.get()?,
        })
    }
}

impl Marshal for VertexBufferView {
    const NAME: &'static str = "D3D12_VERTEX_BUFFER_VIEW";
    const MIN_SIZE: usize = 24;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.buffer_location);
        w.write_u32(self.size_in_bytes);
        w.write_u32(self.stride_in_bytes);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            buffer_location: r.get()?,
            size_in_bytes: r.read_u32()?,
            stride_in_bytes: r.read_u32()?,
        })
    }
}

impl Marshal for ResourceBarrier {
    const NAME: &'static str = "D3D12_RESOURCE_BARRIER";
    const MIN_SIZE: usize = 9;

    fn encode(&self, w: &mut PayloadWriter) {
        match self {
            Self::Transition {
                resource,
                subresource,
                state_before,
                state_after,
                flags,
            } => {
                w.write_u32(0);
                w.write_u32(*flags);
                w.put(resource);
                w.write_u32(*subresource);
                w.put(state_before);
                w.put(state_after);
            }
            Self::Aliasing {
                before,
                after,
                flags,
            } => {
                w.write_u32(1);
                w.write_u32(*flags);
                w.put(before);
                w.put(after);
            }
            Self::Uav { resource, flags } => {
                w.write_u32(2);
                w.write_u32(*flags);
                w.put(resource);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        let tag = r.read_u32()?;
        let flags = r.read_u32()?;
        match tag {
            0 => Ok(Self::Transition {
                resource: r.get()?,
                subresource: r.read_u32()?,
                state_before: r.get()?,
                state_after: r.get()?,
                flags,
            }),
            1 => Ok(Self::Aliasing {
                before: r.get()?,
                after: r.get()?,
                flags,
            }),
            2 => Ok(Self::Uav {
                resource: r.get()?,
                flags,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

// --- Views and samplers ---

impl Marshal for SamplerDesc {
    const NAME: &'static str = "D3D12_SAMPLER_DESC";
    const MIN_SIZE: usize = 56;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u32(self.filter);
        w.write_u32(self.address_u);
        w.write_u32(self.address_v);
        w.write_u32(self.address_w);
        w.write_f32(self.mip_lod_bias);
        w.write_u32(self.max_anisotropy);
        w.write_u32(self.comparison_func);
        w.put(&self.border_color);
        w.write_f32(self.min_lod);
        w.write_f32(self.max_lod);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            filter: r.read_u32()?,
            address_u: r.read_u32()?,
            address_v: r.read_u32()?,
            address_w: r.read_u32()?,
            mip_lod_bias: r.read_f32()?,
            max_anisotropy: r.read_u32()?,
            comparison_func: r.read_u32()?,
            border_color: r.get()?,
            min_lod: r.read_f32()?,
            max_lod: r.read_f32()?,
        })
    }
}

impl Marshal for ConstantBufferViewDesc {
    const NAME: &'static str = "D3D12_CONSTANT_BUFFER_VIEW_DESC";
    const MIN_SIZE: usize = 20;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.buffer_location);
        w.write_u32(self.size_in_bytes);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            buffer_location: r.get()?,
            size_in_bytes: r.read_u32()?,
        })
    }
}

impl Marshal for SrvDimension {
    const NAME: &'static str = "D3D12_SRV_DIMENSION";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        match *self {
            Self::Buffer {
                first_element,
                num_elements,
                structure_byte_stride,
                flags,
            } => {
                w.write_u32(1);
                w.write_u64(first_element);
                w.write_u32(num_elements);
                w.write_u32(structure_byte_stride);
                w.write_u32(flags);
            }
            Self::Texture2D {
                most_detailed_mip,
                mip_levels,
                plane_slice,
                resource_min_lod_clamp,
            } => {
                w.write_u32(4);
                w.write_u32(most_detailed_mip);
                w.write_u32(mip_levels);
                w.write_u32(plane_slice);
                w.write_f32(resource_min_lod_clamp);
            }
            Self::Texture2DArray {
                most_detailed_mip,
                mip_levels,
                first_array_slice,
                array_size,
                plane_slice,
                resource_min_lod_clamp,
            } => {
                w.write_u32(5);
                w.write_u32(most_detailed_mip);
                w.write_u32(mip_levels);
                w.write_u32(first_array_slice);
                w.write_u32(array_size);
                w.write_u32(plane_slice);
                w.write_f32(resource_min_lod_clamp);
            }
            Self::TextureCube {
                most_detailed_mip,
                mip_levels,
                resource_min_lod_clamp,
            } => {
                w.write_u32(9);
                w.write_u32(most_detailed_mip);
                w.write_u32(mip_levels);
                w.write_f32(resource_min_lod_clamp);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            1 => Ok(Self::Buffer {
                first_element: r.read_u64()?,
                num_elements: r.read_u32()?,
                structure_byte_stride: r.read_u32()?,
                flags: r.read_u32()?,
            }),
            4 => Ok(Self::Texture2D {
                most_detailed_mip: r.read_u32()?,
                mip_levels: r.read_u32()?,
                plane_slice: r.read_u32()?,
                resource_min_lod_clamp: r.read_f32()?,
            }),
            5 => Ok(Self::Texture2DArray {
                most_detailed_mip: r.read_u32()?,
                mip_levels: r.read_u32()?,
                first_array_slice: r.read_u32()?,
                array_size: r.read_u32()?,
                plane_slice: r.read_u32()?,
                resource_min_lod_clamp: r.read_f32()?,
            }),
            9 => Ok(Self::TextureCube {
                most_detailed_mip: r.read_u32()?,
                mip_levels: r.read_u32()?,
                resource_min_lod_clamp: r.read_f32()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for ShaderResourceViewDesc {
    const NAME: &'static str = "D3D12_SHADER_RESOURCE_VIEW_DESC";
    const MIN_SIZE: usize = 24;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.format);
        w.write_u32(self.component_mapping);
        w.put(&self.dimension);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            format: r.get()?,
            component_mapping: r.read_u32()?,
            dimension: r.get()?,
        })
    }
}

impl Marshal for RtvDimension {
    const NAME: &'static str = "D3D12_RTV_DIMENSION";
    const MIN_SIZE: usize = 12;

    fn encode(&self, w: &mut PayloadWriter) {
        match *self {
            Self::Buffer {
                first_element,
                num_elements,
            } => {
                w.write_u32(1);
                w.write_u64(first_element);
                w.write_u32(num_elements);
            }
            Self::Texture2D {
                mip_slice,
                plane_slice,
            } => {
                w.write_u32(4);
                w.write_u32(mip_slice);
                w.write_u32(plane_slice);
            }
            Self::Texture2DArray {
                mip_slice,
                first_array_slice,
                array_size,
                plane_slice,
            } => {
                w.write_u32(5);
                w.write_u32(mip_slice);
                w.write_u32(first_array_slice);
                w.write_u32(array_size);
                w.write_u32(plane_slice);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            1 => Ok(Self::Buffer {
                first_element: r.read_u64()?,
                num_elements: r.read_u32()?,
            }),
            4 => Ok(Self::Texture2D {
                mip_slice: r.read_u32()?,
                plane_slice: r.read_u32()?,
            }),
            5 => Ok(Self::Texture2DArray {
                mip_slice: r.read_u32()?,
                first_array_slice: r.read_u32()?,
                array_size: r.read_u32()?,
                plane_slice: r.read_u32()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for RenderTargetViewDesc {
    const NAME: &'static str = "D3D12_RENDER_TARGET_VIEW_DESC";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.format);
        w.put(&self.dimension);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            format: r.get()?,
            dimension: r.get()?,
        })
    }
}

impl Marshal for DsvDimension {
    const NAME: &'static str = "D3D12_DSV_DIMENSION";
    const MIN_SIZE: usize = 8;

    fn encode(&self, w: &mut PayloadWriter) {
        match *self {
            Self::Texture2D { mip_slice } => {
                w.write_u32(3);
                w.write_u32(mip_slice);
            }
            Self::Texture2DArray {
                mip_slice,
                first_array_slice,
                array_size,
            } => {
                w.write_u32(4);
                w.write_u32(mip_slice);
                w.write_u32(first_array_slice);
                w.write_u32(array_size);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            3 => Ok(Self::Texture2D {
                mip_slice: r.read_u32()?,
            }),
            4 => Ok(Self::Texture2DArray {
                mip_slice: r.read_u32()?,
                first_array_slice: r.read_u32()?,
                array_size: r.read_u32()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for DepthStencilViewDesc {
    const NAME: &'static str = "D3D12_DEPTH_STENCIL_VIEW_DESC";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.format);
        w.write_u32(self.flags);
        w.put(&self.dimension);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            format: r.get()?,
            flags: r.read_u32()?,
            dimension: r.get()?,
        })
    }
}

impl Marshal for UavDimension {
    const NAME: &'static str = "D3D12_UAV_DIMENSION";
    const MIN_SIZE: usize = 12;

    fn encode(&self, w: &mut PayloadWriter) {
        match *self {
            Self::Buffer {
                first_element,
                num_elements,
                structure_byte_stride,
                counter_offset_in_bytes,
                flags,
            } => {
                w.write_u32(1);
                w.write_u64(first_element);
                w.write_u32(num_elements);
                w.write_u32(structure_byte_stride);
                w.write_u64(counter_offset_in_bytes);
                w.write_u32(flags);
            }
            Self::Texture2D {
                mip_slice,
                plane_slice,
            } => {
                w.write_u32(4);
                w.write_u32(mip_slice);
                w.write_u32(plane_slice);
            }
            Self::Texture2DArray {
                mip_slice,
                first_array_slice,
                array_size,
                plane_slice,
            } => {
                w.write_u32(5);
                w.write_u32(mip_slice);
                w.write_u32(first_array_slice);
                w.write_u32(array_size);
                w.write_u32(plane_slice);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            1 => Ok(Self::Buffer {
                first_element: r.read_u64()?,
                num_elements: r.read_u32()?,
                structure_byte_stride: r.read_u32()?,
                counter_offset_in_bytes: r.read_u64()?,
                flags: r.read_u32()?,
            }),
            4 => Ok(Self::Texture2D {
                mip_slice: r.read_u32()?,
                plane_slice: r.read_u32()?,
            }),
            5 => Ok(Self::Texture2DArray {
                mip_slice: r.read_u32()?,
                first_array_slice: r.read_u32()?,
                array_size: r.read_u32()?,
                plane_slice: r.read_u32()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for UnorderedAccessViewDesc {
    const NAME: &'static str = "D3D12_UNORDERED_ACCESS_VIEW_DESC";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.format);
        w.put(&self.dimension);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            format: r.get()?,
            dimension: r.get()?,
        })
    }
}

impl Marshal for DescriptorContents {
    const NAME: &'static str = "D3D12DescriptorContents";
    const MIN_SIZE: usize = 4;

    fn encode(&self, w: &mut PayloadWriter) {
        match self {
            Self::Undefined => w.write_u32(0),
            Self::Sampler(desc) => {
                w.write_u32(1);
                w.put(desc);
            }
            Self::ConstantBuffer(desc) => {
                w.write_u32(2);
                w.put(desc);
            }
            Self::ShaderResource { resource, desc } => {
                w.write_u32(3);
                w.put(resource);
                w.put(desc);
            }
            Self::RenderTarget { resource, desc } => {
                w.write_u32(4);
                w.put(resource);
                w.put(desc);
            }
            Self::DepthStencil { resource, desc } => {
                w.write_u32(5);
                w.put(resource);
                w.put(desc);
            }
            Self::UnorderedAccess {
                resource,
                counter,
                desc,
            } => {
                w.write_u32(6);
                w.put(resource);
                w.put(counter);
                w.put(desc);
            }
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        match r.read_u32()? {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Sampler(r.get()?)),
            2 => Ok(Self::ConstantBuffer(r.get()?)),
            3 => Ok(Self::ShaderResource {
                resource: r.get()?,
                desc: r.get()?,
            }),
            4 => Ok(Self::RenderTarget {
                resource: r.get()?,
                desc: r.get()?,
            }),
            5 => Ok(Self::DepthStencil {
                resource: r.get()?,
                desc: r.get()?,
            }),
            6 => Ok(Self::UnorderedAccess {
                resource: r.get()?,
                counter: r.get()?,
                desc: r.get()?,
            }),
            tag => Err(bad_tag(Self::NAME, tag)),
        }
    }
}

impl Marshal for Descriptor {
    const NAME: &'static str = "D3D12Descriptor";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.slot);
        w.put(&self.contents);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            slot: r.get()?,
            contents: r.get()?,
        })
    }
}

impl Marshal for Viewport {
    const NAME: &'static str = "D3D12_VIEWPORT";
    const MIN_SIZE: usize = 24;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_f32(self.top_left_x);
        w.write_f32(self.top_left_y);
        w.write_f32(self.width);
        w.write_f32(self.height);
        w.write_f32(self.min_depth);
        w.write_f32(self.max_depth);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            top_left_x: r.read_f32()?,
            top_left_y: r.read_f32()?,
            width: r.read_f32()?,
            height: r.read_f32()?,
            min_depth: r.read_f32()?,
            max_depth: r.read_f32()?,
        })
    }
}

impl Marshal for Rect {
    const NAME: &'static str = "D3D12_RECT";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_i32(self.left);
        w.write_i32(self.top);
        w.write_i32(self.right);
        w.write_i32(self.bottom);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            left: r.read_i32()?,
            top: r.read_i32()?,
            right: r.read_i32()?,
            bottom: r.read_i32()?,
        })
    }
}

impl Marshal for DrawIndexedArgs {
    const NAME: &'static str = "DrawIndexedInstanced";
    const MIN_SIZE: usize = 20;

    fn encode(&self, w: &mut PayloadWriter) {
        w.write_u32(self.index_count_per_instance);
        w.write_u32(self.instance_count);
        w.write_u32(self.start_index_location);
        w.write_i32(self.base_vertex_location);
        w.write_u32(self.start_instance_location);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            index_count_per_instance: r.read_u32()?,
            instance_count: r.read_u32()?,
            start_index_location: r.read_u32()?,
            base_vertex_location: r.read_i32()?,
            start_instance_location: r.read_u32()?,
        })
    }
}

impl Marshal for DeviceInitParams {
    const NAME: &'static str = "D3D12InitParams";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.device);
        w.write_u32(self.minimum_feature_level);
        w.write_u32(self.sdk_version);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            device: r.get()?,
            minimum_feature_level: r.read_u32()?,
            sdk_version: r.read_u32()?,
        })
    }
}

impl Marshal for DebugMessage {
    const NAME: &'static str = "DebugMessage";
    const MIN_SIZE: usize = 16;

    fn encode(&self, w: &mut PayloadWriter) {
        w.put(&self.severity);
        w.write_u32(self.category);
        w.write_u32(self.id);
        w.write_str(&self.description);
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CaptureError> {
        r.require(Self::MIN_SIZE, Self::NAME)?;
        Ok(Self {
            severity: r.get()?,
            category: r.read_u32()?,
            id: r.read_u32()?,
            description: r.read_string()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::registry::MarshalRegistry;

    fn id(raw: u64) -> ResourceId {
        ResourceId::new(raw).unwrap()
    }

    fn sample_pipeline() -> GraphicsPipelineStateDesc {
        GraphicsPipelineStateDesc {
            root_signature: Some(id(4)),
            vs: ShaderBytecode::new(vec![0x44, 0x58, 0x42, 0x43]),
            ps: ShaderBytecode::new(vec![1, 2, 3]),
            ds: ShaderBytecode::default(),
            hs: ShaderBytecode::default(),
            gs: ShaderBytecode::default(),
            sample_mask: u32::MAX,
            input_layout: vec![
                InputElementDesc {
                    semantic_name: "POSITION".into(),
                    semantic_index: 0,
                    format: Format(6),
                    input_slot: 0,
                    aligned_byte_offset: 0,
                    input_slot_class: InputClassification::PerVertexData,
                    instance_data_step_rate: 0,
                },
                InputElementDesc {
                    semantic_name: "TEXCOORD".into(),
                    semantic_index: 1,
                    format: Format(16),
                    input_slot: 1,
                    aligned_byte_offset: 12,
                    input_slot_class: InputClassification::PerInstanceData,
                    instance_data_step_rate: 1,
                },
            ],
            primitive_topology_type: PrimitiveTopologyType::Triangle,
            rtv_formats: vec![Format::R8G8B8A8_UNORM],
            dsv_format: Format::D32_FLOAT,
            sample_count: 1,
            sample_quality: 0,
            node_mask: 0,
            flags: 0,
        }
    }

    #[test]
    fn pipeline_desc_round_trip() {
        let desc = sample_pipeline();
        let bytes = encode_to_vec(&desc);
        assert_eq!(decode_exact::<GraphicsPipelineStateDesc>(&bytes).unwrap(), desc);
    }

    #[test]
    fn every_barrier_kind_round_trips() {
        let barriers = vec![
            ResourceBarrier::transition(id(9), ResourceStates::COPY_DEST, ResourceStates::INDEX_BUFFER),
            ResourceBarrier::Aliasing {
                before: None,
                after: Some(id(10)),
                flags: 0,
            },
            ResourceBarrier::Uav {
                resource: Some(id(11)),
                flags: 2,
            },
        ];
        let bytes = encode_to_vec(&barriers);
        assert_eq!(decode_exact::<Vec<ResourceBarrier>>(&bytes).unwrap(), barriers);
    }

    #[test]
    fn clear_values_round_trip() {
        for value in [
            ClearValue::Color {
                format: Format::R8G8B8A8_UNORM,
                rgba: [0.0, 0.25, 0.5, 1.0],
            },
            ClearValue::DepthStencil {
                format: Format::D32_FLOAT,
                depth: 1.0,
                stencil: 0x80,
            },
        ] {
            let bytes = encode_to_vec(&value);
            assert_eq!(decode_exact::<ClearValue>(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn resource_desc_has_fixed_size() {
        let desc = ResourceDesc::texture_2d(Format::R8G8B8A8_UNORM, 1920, 1080);
        let bytes = encode_to_vec(&desc);
        assert_eq!(bytes.len(), ResourceDesc::MIN_SIZE);
        assert_eq!(decode_exact::<ResourceDesc>(&bytes).unwrap(), desc);
    }

    #[test]
    fn truncation_is_malformed_at_every_length() {
        let bytes = encode_to_vec(&sample_pipeline());
        for len in 0..bytes.len() {
            let result = decode_exact::<GraphicsPipelineStateDesc>(&bytes[..len]);
            assert!(
                matches!(result, Err(CaptureError::MalformedPayload(_))),
                "length {} decoded",
                len
            );
        }
    }

    #[test]
    fn shorter_than_minimum_fails_before_decoding() {
        let err = decode_exact::<ResourceDesc>(&[0u8; 47]).unwrap_err();
        assert!(err.to_string().contains("D3D12_RESOURCE_DESC"));
    }

    #[test]
    fn oversized_input_layout_count_is_malformed() {
        let mut desc = sample_pipeline();
        desc.input_layout.clear();
        let mut bytes = encode_to_vec(&desc);

        // root sig (1 + 8) + five empty shaders (4 each) + sample mask (4)
        let count_offset = 9 + 5 * 4 + 4;
        bytes[count_offset..count_offset + 4].copy_from_slice(&500u32.to_le_bytes());
        assert!(matches!(
            decode_exact::<GraphicsPipelineStateDesc>(&bytes),
            Err(CaptureError::MalformedPayload(_))
        ));
    }

    #[test]
    fn too_many_render_targets_is_malformed() {
        let mut desc = sample_pipeline();
        desc.rtv_formats = vec![Format::R8G8B8A8_UNORM; MAX_RENDER_TARGETS + 1];
        assert!(matches!(desc.validate(), Err(CaptureError::MalformedPayload(_))));
        let bytes = encode_to_vec(&desc);
        assert!(decode_exact::<GraphicsPipelineStateDesc>(&bytes).is_err());

        desc.rtv_formats.truncate(MAX_RENDER_TARGETS);
        assert!(desc.validate().is_ok());
    }

    /// Round-trips `value` and checks every strict prefix is malformed.
    fn check_exact<T: Marshal + PartialEq + std::fmt::Debug>(value: T) -> &'static str {
        let bytes = encode_to_vec(&value);
        assert!(bytes.len() >= T::MIN_SIZE, "{} shorter than its minimum", T::NAME);
        assert_eq!(decode_exact::<T>(&bytes).unwrap(), value, "{}", T::NAME);
        for len in 0..bytes.len() {
            assert!(
                matches!(decode_exact::<T>(&bytes[..len]), Err(CaptureError::MalformedPayload(_))),
                "{} decoded from {} of {} bytes",
                T::NAME,
                len,
                bytes.len()
            );
        }
        T::NAME
    }

    fn sample_sampler() -> SamplerDesc {
        SamplerDesc {
            filter: 0x15,
            address_u: 1,
            address_v: 2,
            address_w: 3,
            mip_lod_bias: -0.5,
            max_anisotropy: 16,
            comparison_func: 4,
            border_color: [1.0, 0.0, 0.0, 1.0],
            min_lod: 0.0,
            max_lod: 12.0,
        }
    }

    fn samples() -> Vec<&'static str> {
        let address = GpuAddress {
            resource: id(12),
            offset: 0x100,
        };
        let srv = ShaderResourceViewDesc {
            format: Format::R8G8B8A8_UNORM,
            component_mapping: crate::models::descriptors::DEFAULT_COMPONENT_MAPPING,
            dimension: SrvDimension::Texture2DArray {
                most_detailed_mip: 1,
                mip_levels: 3,
                first_array_slice: 2,
                array_size: 4,
                plane_slice: 0,
                resource_min_lod_clamp: 0.5,
            },
        };
        let rtv = RenderTargetViewDesc {
            format: Format::R8G8B8A8_UNORM,
            dimension: RtvDimension::Texture2D {
                mip_slice: 2,
                plane_slice: 0,
            },
        };
        let dsv = DepthStencilViewDesc {
            format: Format::D32_FLOAT,
            flags: 1,
            dimension: DsvDimension::Texture2DArray {
                mip_slice: 0,
                first_array_slice: 1,
                array_size: 2,
            },
        };
        let uav = UnorderedAccessViewDesc {
            format: Format::R32_UINT,
            dimension: UavDimension::Buffer {
                first_element: 64,
                num_elements: 128,
                structure_byte_stride: 0,
                counter_offset_in_bytes: 4096,
                flags: 0,
            },
        };

        vec![
            check_exact(id(77)),
            check_exact(address),
            check_exact(CpuDescriptor {
                heap: id(5),
                index: 17,
            }),
            check_exact(Format::R16_UINT),
            check_exact(ResourceStates::COPY_SOURCE),
            check_exact(CommandListType::Compute),
            check_exact(ResourceDimension::Texture3D),
            check_exact(HeapType::Readback),
            check_exact(DescriptorHeapType::Dsv),
            check_exact(PrimitiveTopology::TriangleStrip),
            check_exact(PrimitiveTopologyType::Patch),
            check_exact(InputClassification::PerInstanceData),
            check_exact(MessageSeverity::Corruption),
            check_exact(ResourceDesc::texture_2d(Format::R8G8B8A8_UNORM, 640, 480)),
            check_exact(HeapProperties::of_type(HeapType::Upload)),
            check_exact(ClearValue::DepthStencil {
                format: Format::D32_FLOAT,
                depth: 0.75,
                stencil: 3,
            }),
            check_exact(CommandQueueDesc {
                queue_type: CommandListType::Copy,
                priority: 100,
                flags: 1,
                node_mask: 2,
            }),
            check_exact(DescriptorHeapDesc {
                heap_type: DescriptorHeapType::CbvSrvUav,
                num_descriptors: 1024,
                flags: 1,
                node_mask: 0,
            }),
            check_exact(ShaderBytecode::new(vec![0x44, 0x58, 0x42, 0x43, 9])),
            check_exact(sample_pipeline().input_layout[1].clone()),
            check_exact(sample_pipeline()),
            check_exact(ComputePipelineStateDesc {
                root_signature: Some(id(4)),
                cs: ShaderBytecode::new(vec![7, 7, 7]),
                node_mask: 1,
                flags: 0,
            }),
            check_exact(IndexBufferView {
                buffer_location: address,
                size_in_bytes: 6 * 2,
                format: Format::R16_UINT,
            }),
            check_exact(VertexBufferView {
                buffer_location: address,
                size_in_bytes: 3 * 32,
                stride_in_bytes: 32,
            }),
            check_exact(ResourceBarrier::Aliasing {
                before: Some(id(1)),
                after: Some(id(2)),
                flags: 1,
            }),
            check_exact(Viewport {
                top_left_x: 8.0,
                top_left_y: 4.0,
                width: 1280.0,
                height: 720.0,
                min_depth: 0.0,
                max_depth: 1.0,
            }),
            check_exact(Rect {
                left: -4,
                top: 2,
                right: 100,
                bottom: 50,
            }),
            check_exact(DrawIndexedArgs {
                index_count_per_instance: 36,
                instance_count: 2,
                start_index_location: 6,
                base_vertex_location: -3,
                start_instance_location: 1,
            }),
            check_exact(DeviceInitParams {
                device: id(1),
                minimum_feature_level: 0xc000,
                sdk_version: 4,
            }),
            check_exact(DebugMessage {
                severity: MessageSeverity::Error,
                category: 7,
                id: 1024,
                description: "descriptor heap is not shader visible".into(),
            }),
            check_exact(sample_sampler()),
            check_exact(ConstantBufferViewDesc {
                buffer_location: address,
                size_in_bytes: 256,
            }),
            check_exact(SrvDimension::TextureCube {
                most_detailed_mip: 0,
                mip_levels: 5,
                resource_min_lod_clamp: 1.0,
            }),
            check_exact(srv),
            check_exact(RtvDimension::Buffer {
                first_element: 3,
                num_elements: 9,
            }),
            check_exact(rtv),
            check_exact(DsvDimension::Texture2D { mip_slice: 1 }),
            check_exact(dsv),
            check_exact(UavDimension::Texture2DArray {
                mip_slice: 0,
                first_array_slice: 2,
                array_size: 2,
                plane_slice: 1,
            }),
            check_exact(uav),
            check_exact(DescriptorContents::UnorderedAccess {
                resource: Some(id(12)),
                counter: Some(id(13)),
                desc: Some(uav),
            }),
            check_exact(Descriptor {
                slot: CpuDescriptor {
                    heap: id(5),
                    index: 3,
                },
                contents: DescriptorContents::ShaderResource {
                    resource: Some(id(12)),
                    desc: Some(srv),
                },
            }),
        ]
    }

    #[test]
    fn every_registered_type_round_trips_exactly() {
        let mut checked = samples();
        checked.sort_unstable();
        checked.dedup();

        let registered: Vec<&str> = MarshalRegistry::global()
            .entries()
            .iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(checked, registered);
    }

    #[test]
    fn every_descriptor_kind_round_trips() {
        let srv_buffer = ShaderResourceViewDesc {
            format: Format::UNKNOWN,
            component_mapping: crate::models::descriptors::DEFAULT_COMPONENT_MAPPING,
            dimension: SrvDimension::Buffer {
                first_element: 0,
                num_elements: 64,
                structure_byte_stride: 16,
                flags: 0,
            },
        };
        let kinds = vec![
            DescriptorContents::Undefined,
            DescriptorContents::Sampler(sample_sampler()),
            DescriptorContents::ConstantBuffer(ConstantBufferViewDesc {
                buffer_location: GpuAddress {
                    resource: id(2),
                    offset: 0,
                },
                size_in_bytes: 512,
            }),
            DescriptorContents::ShaderResource {
                resource: Some(id(3)),
                desc: Some(srv_buffer),
            },
            DescriptorContents::RenderTarget {
                resource: Some(id(4)),
                desc: None,
            },
            DescriptorContents::DepthStencil {
                resource: None,
                desc: None,
            },
            DescriptorContents::UnorderedAccess {
                resource: Some(id(6)),
                counter: None,
                desc: Some(UnorderedAccessViewDesc {
                    format: Format::R32_UINT,
                    dimension: UavDimension::Texture2D {
                        mip_slice: 0,
                        plane_slice: 0,
                    },
                }),
            },
        ];
        for contents in kinds {
            check_exact(Descriptor {
                slot: CpuDescriptor { heap: id(9), index: 0 },
                contents,
            });
        }
        assert!(decode_exact::<DescriptorContents>(&7u32.to_le_bytes()).is_err());
    }

    #[test]
    fn null_resource_id_is_malformed() {
        let bytes = 0u64.to_le_bytes();
        assert!(decode_exact::<ResourceId>(&bytes).is_err());
    }

    #[test]
    fn unknown_enum_tag_is_malformed() {
        let bytes = 9u32.to_le_bytes();
        assert!(decode_exact::<CommandListType>(&bytes).is_err());
        assert!(decode_exact::<HeapType>(&0u32.to_le_bytes()).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_to_vec(&Rect {
            left: 0,
            top: 0,
            right: 64,
            bottom: 64,
        });
        bytes.push(0);
        assert!(decode_exact::<Rect>(&bytes).is_err());
    }
}
