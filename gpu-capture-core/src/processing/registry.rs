use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::descriptors::{
    ClearValue, CommandListType, CommandQueueDesc, ComputePipelineStateDesc,
    ConstantBufferViewDesc, CpuDescriptor, DebugMessage, DepthStencilViewDesc, Descriptor,
    DescriptorContents, DescriptorHeapDesc, DescriptorHeapType, DeviceInitParams, DrawIndexedArgs,
    DsvDimension, Format, GpuAddress, GraphicsPipelineStateDesc, HeapProperties, HeapType,
    IndexBufferView, InputClassification, InputElementDesc, MessageSeverity, PrimitiveTopology,
    PrimitiveTopologyType, Rect, RenderTargetViewDesc, ResourceBarrier, ResourceDesc,
    ResourceDimension, ResourceId, ResourceStates, RtvDimension, SamplerDesc, ShaderBytecode,
    ShaderResourceViewDesc, SrvDimension, UavDimension, UnorderedAccessViewDesc, VertexBufferView,
    Viewport,
};
use crate::models::error::CaptureError;

use super::marshal::Marshal;
use super::serialiser::{PayloadReader, PayloadWriter};

type ErasedDecode = fn(&mut PayloadReader<'_>) -> Result<Box<dyn Any + Send>, CaptureError>;

/// Table entry for one registered parameter type.
#[derive(Clone, Copy)]
pub struct MarshalEntry {
    pub name: &'static str,
    pub min_size: usize,
    decode: ErasedDecode,
}

impl std::fmt::Debug for MarshalEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshalEntry")
            .field("name", &self.name)
            .field("min_size", &self.min_size)
            .finish()
    }
}

fn decode_boxed<T: Marshal + Send + 'static>(
    r: &mut PayloadReader<'_>,
) -> Result<Box<dyn Any + Send>, CaptureError> {
    Ok(Box::new(T::decode(r)?))
}

/// The closed set of parameter types that may be written into a chunk.
///
/// Built once, then shared read-only. Typed call sites still dispatch
/// statically through [`Marshal`]; the table guards that only known types
/// reach a payload and lets inspection tools decode by name.
#[derive(Debug, Default)]
pub struct MarshalRegistry {
    by_type: HashMap<TypeId, MarshalEntry>,
    by_name: HashMap<&'static str, TypeId>,
}

impl MarshalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every structure used by the intercepted entry points.
    pub fn with_api_types() -> Self {
        let mut registry = Self::new();
        registry.register::<ResourceId>();
        registry.register::<GpuAddress>();
        registry.register::<CpuDescriptor>();
        registry.register::<Format>();
        registry.register::<ResourceStates>();
        registry.register::<CommandListType>();
        registry.register::<ResourceDimension>();
        registry.register::<HeapType>();
        registry.register::<DescriptorHeapType>();
        registry.register::<PrimitiveTopology>();
        registry.register::<PrimitiveTopologyType>();
        registry.register::<InputClassification>();
        registry.register::<MessageSeverity>();
        registry.register::<ResourceDesc>();
        registry.register::<HeapProperties>();
        registry.register::<ClearValue>();
        registry.register::<CommandQueueDesc>();
        registry.register::<DescriptorHeapDesc>();
        registry.register::<ShaderBytecode>();
        registry.register::<InputElementDesc>();
        registry.register::<GraphicsPipelineStateDesc>();
        registry.register::<ComputePipelineStateDesc>();
        registry.register::<IndexBufferView>();
        registry.register::<VertexBufferView>();
        registry.register::<ResourceBarrier>();
        registry.register::<Viewport>();
        registry.register::<Rect>();
        registry.register::<DrawIndexedArgs>();
        registry.register::<DeviceInitParams>();
        registry.register::<DebugMessage>();
        registry.register::<SamplerDesc>();
        registry.register::<ConstantBufferViewDesc>();
        registry.register::<SrvDimension>();
        registry.register::<ShaderResourceViewDesc>();
        registry.register::<RtvDimension>();
        registry.register::<RenderTargetViewDesc>();
        registry.register::<DsvDimension>();
        registry.register::<DepthStencilViewDesc>();
        registry.register::<UavDimension>();
        registry.register::<UnorderedAccessViewDesc>();
        registry.register::<DescriptorContents>();
        registry.register::<Descriptor>();
        registry
    }

    /// Process-wide table, initialized on first use.
    pub fn global() -> &'static MarshalRegistry {
        static REGISTRY: OnceLock<MarshalRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::with_api_types)
    }

    pub fn register<T: Marshal + Send + 'static>(&mut self) {
        let entry = MarshalEntry {
            name: T::NAME,
            min_size: T::MIN_SIZE,
            decode: decode_boxed::<T>,
        };
        self.by_type.insert(TypeId::of::<T>(), entry);
        self.by_name.insert(T::NAME, TypeId::of::<T>());
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn lookup(&self, name: &str) -> Option<&MarshalEntry> {
        let type_id = self.by_name.get(name)?;
        self.by_type.get(type_id)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Registered entries sorted by name.
    pub fn entries(&self) -> Vec<&MarshalEntry> {
        let mut entries: Vec<_> = self.by_type.values().collect();
        entries.sort_by_key(|e| e.name);
        entries
    }

    fn check<T: Marshal + 'static>(&self) -> Result<&MarshalEntry, CaptureError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .ok_or(CaptureError::UnregisteredType(T::NAME))
    }

    pub fn encode<T: Marshal + 'static>(
        &self,
        value: &T,
        w: &mut PayloadWriter,
    ) -> Result<(), CaptureError> {
        self.check::<T>()?;
        value.validate()?;
        value.encode(w);
        Ok(())
    }

    /// Count-prefixed array of a registered element type.
    pub fn encode_slice<T: Marshal + 'static>(
        &self,
        values: &[T],
        w: &mut PayloadWriter,
    ) -> Result<(), CaptureError> {
        self.check::<T>()?;
        values.iter().try_for_each(T::validate)?;
        w.write_count(values.len());
        for value in values {
            value.encode(w);
        }
        Ok(())
    }

    /// Presence byte, then the value if there is one.
    pub fn encode_option<T: Marshal + 'static>(
        &self,
        value: Option<&T>,
        w: &mut PayloadWriter,
    ) -> Result<(), CaptureError> {
        self.check::<T>()?;
        value.map_or(Ok(()), T::validate)?;
        match value {
            Some(value) => {
                w.write_u8(1);
                value.encode(w);
            }
            None => w.write_u8(0),
        }
        Ok(())
    }

    pub fn decode<T: Marshal + 'static>(
        &self,
        r: &mut PayloadReader<'_>,
    ) -> Result<T, CaptureError> {
        let entry = self.check::<T>()?;
        r.require(entry.min_size, entry.name)?;
        T::decode(r)
    }

    pub fn decode_slice<T: Marshal + 'static>(
        &self,
        r: &mut PayloadReader<'_>,
    ) -> Result<Vec<T>, CaptureError> {
        let entry = self.check::<T>()?;
        let count = r.read_count(entry.min_size)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(T::decode(r)?);
        }
        Ok(values)
    }

    /// Decode a value whose type is only known by name, as inspection tools
    /// reading a capture need to.
    pub fn decode_erased(
        &self,
        name: &str,
        r: &mut PayloadReader<'_>,
    ) -> Result<Box<dyn Any + Send>, CaptureError> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| CaptureError::malformed(format!("no parameter type named {}", name)))?;
        r.require(entry.min_size, entry.name)?;
        (entry.decode)(r)
    }
}
