use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::capture_result::CaptureResult;
use crate::models::chunk::{Chunk, ChunkType};
use crate::models::config::CaptureConfiguration;
use crate::models::descriptors::{
    ClearValue, CommandListType, CommandQueueDesc, ComputePipelineStateDesc, DebugMessage,
    DescriptorHeapDesc, DeviceInitParams, GraphicsPipelineStateDesc, HeapProperties, ResourceDesc,
    ResourceId, ResourceStates,
};
use crate::models::diagnostics::CaptureDiagnostics;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::processing::chunk_stream::CHUNK_HEADER_SIZE;
use crate::processing::registry::MarshalRegistry;
use crate::processing::serialiser::PayloadWriter;
use crate::traits::capture_sink::CaptureSink;
use crate::traits::chunk_recorder::ChunkRecorder;
use crate::traits::real_api::{HandleTable, QueryResult, RealDevice, RealObject};
use crate::traits::soft_ref::SoftRefOwner;

use super::command_list::WrappedCommandList;
use super::command_queue::WrappedCommandQueue;
use super::dispatch;
use super::objects::{DeviceChild, ObjectKind, QueriedObject, WrappedObject};
use super::ref_counter::RefCounter;
use super::scope::ChunkStreamWriter;

/// SDK version recorded in the device initialisation chunk.
pub const SDK_VERSION: u32 = 4;

/// What a capture needs to recreate one live object.
struct ResourceRecord {
    kind: ObjectKind,
    real: Weak<dyn RealObject>,
    /// Creation chunk first, then the latest name and debug path.
    chunks: Vec<Chunk>,
}

#[derive(Default)]
struct Counters {
    chunks_recorded: AtomicU64,
    bytes_recorded: AtomicU64,
    captures_completed: AtomicU64,
    captures_aborted: AtomicU64,
    chunks_dropped: AtomicU64,
}

/// The capturing stand-in for a real device.
///
/// Owns the chunk stream and the records of every live child. The
/// application releases it like any other object, but it is only destroyed
/// once both its hard count and its soft count (one per live child) are
/// zero.
///
/// Lock order: `records` before the stream writer. Real API calls run
/// outside both.
pub struct WrappedDevice {
    id: ResourceId,
    counter: RefCounter<dyn RealDevice>,
    soft_refs: AtomicU32,
    config: CaptureConfiguration,
    minimum_feature_level: u32,
    writer: ChunkStreamWriter,
    records: RwLock<BTreeMap<ResourceId, ResourceRecord>>,
    next_id: AtomicU64,
    frames_begun: AtomicU32,
    debug_messages: Mutex<Vec<DebugMessage>>,
    counters: Counters,
    self_ref: Weak<WrappedDevice>,
}

impl WrappedDevice {
    pub fn new(
        real: Arc<dyn RealDevice>,
        minimum_feature_level: u32,
        config: CaptureConfiguration,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<Arc<Self>, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        let id = ResourceId::DEVICE;

        let device = Arc::new_cyclic(|self_ref| Self {
            id,
            counter: RefCounter::new(real, false),
            soft_refs: AtomicU32::new(0),
            writer: ChunkStreamWriter::new(sink, config.max_chunk_payload),
            config,
            minimum_feature_level,
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(id.get() + 1),
            frames_begun: AtomicU32::new(0),
            debug_messages: Mutex::new(Vec::new()),
            counters: Counters::default(),
            self_ref: self_ref.clone(),
        });
        log::info!("wrapped {} device {}", device.config.api_name, id);
        Ok(device)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub(crate) fn downgrade(&self) -> Weak<WrappedDevice> {
        self.self_ref.clone()
    }

    // --- Lifetime ---

    pub fn add_ref(&self) -> u32 {
        self.counter.add_ref()
    }

    pub fn release(&self) -> u32 {
        let count = self.counter.release();
        if count == 0 {
            self.destroy_if_unreferenced();
        }
        count
    }

    pub fn ref_count(&self) -> u32 {
        self.counter.ref_count()
    }

    pub fn soft_ref_count(&self) -> u32 {
        self.soft_refs.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.counter.is_destroyed()
    }

    fn destroy_if_unreferenced(&self) {
        if self.counter.ref_count() != 0 || self.soft_refs.load(Ordering::Acquire) != 0 {
            return;
        }
        if self.counter.is_destroyed() {
            return;
        }
        self.abort_capture(CaptureError::ObjectDestroyed);
        self.counter.destroy();
        log::info!("device {} destroyed", self.id);
    }

    pub fn query_capability(&self, iid: &Uuid) -> Result<QueriedObject, CaptureError> {
        let real = self.counter.real()?;
        match real.query_capability(iid)? {
            QueryResult::Same => {
                self.add_ref();
                Ok(QueriedObject::ThisObject)
            }
            QueryResult::Other(other) => Ok(QueriedObject::Wrapped(self.wrap_queried(other)?)),
            QueryResult::Unsupported => Err(CaptureError::CapabilityUnsupported(*iid)),
        }
    }

    // --- Capture control ---

    /// Open a capture scope for the next frame.
    ///
    /// The scope starts with the device initialisation chunk, then the
    /// retained chunks of every live object in id order, so it can be
    /// replayed without anything recorded before it. The records lock is
    /// held until the scope is open, and the whole prefix is written before
    /// any other call can record into the scope.
    pub fn begin_capture(&self) -> Result<u32, CaptureError> {
        if self.counter.is_destroyed() {
            return Err(CaptureError::ObjectDestroyed);
        }

        let init = DeviceInitParams {
            device: self.id,
            minimum_feature_level: self.minimum_feature_level,
            sdk_version: SDK_VERSION,
        };
        let mut w = PayloadWriter::new();
        MarshalRegistry::global().encode(&init, &mut w)?;

        let records = self.records.read();
        let mut prefix = vec![Chunk::new(ChunkType::DeviceInit, w.into_bytes())?];
        prefix.extend(records.values().flat_map(|record| record.chunks.iter().cloned()));

        self.debug_messages.lock().clear();
        let frame = self.frames_begun.load(Ordering::Acquire) + 1;
        let opened = self.writer.begin_scope_with(frame, &self.config.api_name, &prefix);
        drop(records);
        if let Err(e) = opened {
            self.counters.captures_aborted.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        self.frames_begun.fetch_add(1, Ordering::AcqRel);
        prefix.iter().for_each(|chunk| self.count_recorded(chunk));

        log::info!("capture started for frame {} with {} chunks", frame, prefix.len());
        Ok(frame)
    }

    /// Close the open scope and hand it to the sink.
    ///
    /// Queued debug messages and the `CaptureScope` chunk are the last
    /// chunks before the end marker.
    pub fn end_capture(&self) -> Result<CaptureResult, CaptureError> {
        let mut trailer = Vec::new();
        let closed = self.writer.end_scope_with(|frame| {
            let messages = std::mem::take(&mut *self.debug_messages.lock());
            trailer = self.trailer(frame, &messages)?;
            Ok(trailer.clone())
        });

        match closed {
            Ok(result) => {
                trailer.iter().for_each(|chunk| self.count_recorded(chunk));
                self.counters.captures_completed.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "capture of frame {} finished: {} chunks, {} bytes",
                    result.frame,
                    result.chunk_count,
                    result.byte_len
                );
                Ok(result)
            }
            Err(CaptureError::NoScopeOpen) => Err(CaptureError::NoScopeOpen),
            Err(e) => {
                self.counters.captures_aborted.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn trailer(&self, frame: u32, messages: &[DebugMessage]) -> Result<Vec<Chunk>, CaptureError> {
        let mut chunks = Vec::with_capacity(2);
        if self.config.record_debug_messages && !messages.is_empty() {
            let mut w = PayloadWriter::new();
            MarshalRegistry::global().encode_slice(messages, &mut w)?;
            chunks.push(Chunk::new(ChunkType::DebugMessages, w.into_bytes())?);
        }

        let mut w = PayloadWriter::with_capacity(4);
        w.write_u32(frame);
        chunks.push(Chunk::new(ChunkType::CaptureScope, w.into_bytes())?);
        Ok(chunks)
    }

    pub fn capture_state(&self) -> CaptureState {
        self.writer.state()
    }

    /// Queue a debug-layer message for the open capture.
    pub fn add_debug_message(&self, message: DebugMessage) {
        if !self.config.record_debug_messages || !self.writer.is_open() {
            return;
        }
        self.debug_messages.lock().push(message);
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            chunks_recorded: self.counters.chunks_recorded.load(Ordering::Relaxed),
            bytes_recorded: self.counters.bytes_recorded.load(Ordering::Relaxed),
            captures_completed: self.counters.captures_completed.load(Ordering::Relaxed),
            captures_aborted: self.counters.captures_aborted.load(Ordering::Relaxed),
            chunks_dropped: self.counters.chunks_dropped.load(Ordering::Relaxed),
            live_objects: self.records.read().len(),
            soft_refs: self.soft_refs.load(Ordering::Acquire),
        }
    }

    fn count_recorded(&self, chunk: &Chunk) {
        self.counters.chunks_recorded.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_recorded
            .fetch_add((CHUNK_HEADER_SIZE + chunk.payload().len()) as u64, Ordering::Relaxed);
    }

    fn append(&self, chunk: &Chunk) -> Result<(), CaptureError> {
        match self.writer.append_chunk(chunk) {
            Ok(_) => {
                self.count_recorded(chunk);
                Ok(())
            }
            Err(e) => {
                self.counters.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    // --- Resource records ---

    fn allocate_id(&self) -> Result<ResourceId, CaptureError> {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        ResourceId::new(raw).ok_or_else(|| CaptureError::RealCallFailed("resource ids exhausted".into()))
    }

    /// Record `chunk` if a scope is open, under the records lock the caller
    /// already holds.
    fn record_locked(&self, chunk_type: ChunkType, chunk: &Chunk) {
        if self.writer.is_open() {
            dispatch::record_or_abort(self, chunk_type, Ok(chunk.clone()));
        }
    }

    /// Start tracking a new child and record its creation.
    fn register(&self, id: ResourceId, kind: ObjectKind, real: &Arc<dyn RealObject>, chunk: Option<Chunk>) {
        let mut records = self.records.write();
        if let Some(chunk) = &chunk {
            self.record_locked(chunk.chunk_type(), chunk);
        }
        records.insert(
            id,
            ResourceRecord {
                kind,
                real: Arc::downgrade(real),
                chunks: chunk.into_iter().collect(),
            },
        );
    }

    /// Stop tracking a destroyed child and record its release.
    pub(crate) fn forget_child(&self, id: ResourceId) {
        let mut records = self.records.write();
        let Some(record) = records.remove(&id) else {
            return;
        };
        if self.writer.is_open() {
            let mut w = PayloadWriter::with_capacity(8);
            w.put(&id);
            let chunk = Chunk::new(ChunkType::ReleaseResource, w.into_bytes());
            dispatch::record_or_abort(self, ChunkType::ReleaseResource, chunk);
        }
        log::debug!("dropped record for {} {}", record.kind, id);
    }

    /// Run a call on a live object whose chunk is kept with the object's
    /// record, replacing any earlier chunk of the same type.
    pub(crate) fn intercept_retained<T>(
        &self,
        id: ResourceId,
        chunk_type: ChunkType,
        execute: impl FnOnce() -> Result<T, CaptureError>,
        encode: impl FnOnce(&T, &mut PayloadWriter) -> Result<(), CaptureError>,
    ) -> Result<T, CaptureError> {
        let (value, chunk) = dispatch::intercept_create(self, chunk_type, execute, encode)?;
        if let Some(chunk) = chunk {
            let mut records = self.records.write();
            self.record_locked(chunk_type, &chunk);
            if let Some(record) = records.get_mut(&id) {
                record.chunks.retain(|c| c.chunk_type() != chunk_type);
                record.chunks.push(chunk);
            }
        }
        Ok(value)
    }

    pub(crate) fn wrap_queried(&self, real: Arc<dyn RealObject>) -> Result<Arc<WrappedObject>, CaptureError> {
        let id = self.allocate_id()?;
        self.register(id, ObjectKind::Unknown, &real, None);
        Ok(Arc::new(DeviceChild::new(self, id, ObjectKind::Unknown, real, None)))
    }

    fn create_object(
        &self,
        kind: ObjectKind,
        chunk_type: ChunkType,
        execute: impl FnOnce(&dyn RealDevice) -> Result<Arc<dyn RealObject>, CaptureError>,
        encode: impl FnOnce(ResourceId, &mut PayloadWriter) -> Result<(), CaptureError>,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        let real_device = self.counter.real()?;
        let id = self.allocate_id()?;
        let (real, chunk) = dispatch::intercept_create(
            self,
            chunk_type,
            || execute(real_device.as_ref()),
            |_, w| encode(id, w),
        )?;
        self.register(id, kind, &real, chunk);
        Ok(Arc::new(DeviceChild::new(self, id, kind, real, None)))
    }

    // --- Creation entry points ---

    pub fn create_command_queue(
        &self,
        desc: &CommandQueueDesc,
    ) -> Result<Arc<WrappedCommandQueue>, CaptureError> {
        let real_device = self.counter.real()?;
        let id = self.allocate_id()?;
        let (real, chunk) = dispatch::intercept_create(
            self,
            ChunkType::CreateCommandQueue,
            || real_device.create_command_queue(desc),
            |_, w| {
                w.put(&id);
                MarshalRegistry::global().encode(desc, w)
            },
        )?;
        let object: Arc<dyn RealObject> = real.clone();
        self.register(id, ObjectKind::CommandQueue, &object, chunk);
        Ok(Arc::new(WrappedCommandQueue::new(
            DeviceChild::new(self, id, ObjectKind::CommandQueue, real, None),
            desc.clone(),
        )))
    }

    pub fn create_command_allocator(
        &self,
        list_type: CommandListType,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::CommandAllocator,
            ChunkType::CreateCommandAllocator,
            |device| device.create_command_allocator(list_type),
            |id, w| {
                w.put(&id);
                MarshalRegistry::global().encode(&list_type, w)
            },
        )
    }

    /// The new list soft-references `allocator` until it is reset onto
    /// another allocator or destroyed.
    pub fn create_command_list(
        &self,
        node_mask: u32,
        list_type: CommandListType,
        allocator: &Arc<WrappedObject>,
        initial_state: Option<&WrappedObject>,
    ) -> Result<Arc<WrappedCommandList>, CaptureError> {
        let real_device = self.counter.real()?;
        let real_allocator = allocator.real()?;
        let real_initial = initial_state.map(|p| p.real()).transpose()?;
        let id = self.allocate_id()?;
        let (real, chunk) = dispatch::intercept_create(
            self,
            ChunkType::CreateCommandList,
            || {
                real_device.create_command_list(
                    node_mask,
                    list_type,
                    &real_allocator,
                    real_initial.as_ref(),
                )
            },
            |_, w| {
                let registry = MarshalRegistry::global();
                w.put(&id);
                w.write_u32(node_mask);
                registry.encode(&list_type, w)?;
                registry.encode(&allocator.id(), w)?;
                registry.encode_option(initial_state.map(|p| p.id()).as_ref(), w)
            },
        )?;
        let object: Arc<dyn RealObject> = real.clone();
        self.register(id, ObjectKind::CommandList, &object, chunk);
        Ok(Arc::new(WrappedCommandList::new(self, id, list_type, real, allocator.clone())))
    }

    pub fn create_graphics_pipeline_state(
        &self,
        desc: &GraphicsPipelineStateDesc,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::PipelineState,
            ChunkType::CreateGraphicsPipe,
            |device| device.create_graphics_pipeline_state(desc, self),
            |id, w| {
                w.put(&id);
                MarshalRegistry::global().encode(desc, w)
            },
        )
    }

    pub fn create_compute_pipeline_state(
        &self,
        desc: &ComputePipelineStateDesc,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::PipelineState,
            ChunkType::CreateComputePipe,
            |device| device.create_compute_pipeline_state(desc, self),
            |id, w| {
                w.put(&id);
                MarshalRegistry::global().encode(desc, w)
            },
        )
    }

    pub fn create_descriptor_heap(
        &self,
        desc: &DescriptorHeapDesc,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::DescriptorHeap,
            ChunkType::CreateDescriptorHeap,
            |device| device.create_descriptor_heap(desc),
            |id, w| {
                w.put(&id);
                MarshalRegistry::global().encode(desc, w)
            },
        )
    }

    pub fn create_root_signature(
        &self,
        node_mask: u32,
        blob: &[u8],
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::RootSignature,
            ChunkType::CreateRootSig,
            |device| device.create_root_signature(node_mask, blob),
            |id, w| {
                w.put(&id);
                w.write_u32(node_mask);
                w.write_bytes(blob);
                Ok(())
            },
        )
    }

    pub fn create_committed_resource(
        &self,
        heap: &HeapProperties,
        heap_flags: u32,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
        clear_value: Option<&ClearValue>,
    ) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::Resource,
            ChunkType::CreateCommittedResource,
            |device| device.create_committed_resource(heap, heap_flags, desc, initial_state, clear_value),
            |id, w| {
                let registry = MarshalRegistry::global();
                w.put(&id);
                registry.encode(heap, w)?;
                w.write_u32(heap_flags);
                registry.encode(desc, w)?;
                registry.encode(&initial_state, w)?;
                registry.encode_option(clear_value, w)
            },
        )
    }

    pub fn create_fence(&self, initial_value: u64, flags: u32) -> Result<Arc<WrappedObject>, CaptureError> {
        self.create_object(
            ObjectKind::Fence,
            ChunkType::CreateFence,
            |device| device.create_fence(initial_value, flags),
            |id, w| {
                w.put(&id);
                w.write_u64(initial_value);
                w.write_u32(flags);
                Ok(())
            },
        )
    }
}

impl SoftRefOwner for WrappedDevice {
    fn soft_ref(&self) -> u32 {
        self.soft_refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn soft_release(&self) -> u32 {
        let count = self.soft_refs.fetch_sub(1, Ordering::AcqRel).wrapping_sub(1);
        if count == 0 {
            self.destroy_if_unreferenced();
        }
        count
    }
}

impl HandleTable for WrappedDevice {
    fn resolve(&self, id: ResourceId) -> Option<Arc<dyn RealObject>> {
        self.records.read().get(&id)?.real.upgrade()
    }
}

impl ChunkRecorder for WrappedDevice {
    fn is_capturing(&self) -> bool {
        self.writer.is_open()
    }

    fn record(&self, chunk: Chunk) -> Result<(), CaptureError> {
        self.append(&chunk)
    }

    fn abort_capture(&self, reason: CaptureError) {
        if self.writer.abort(reason) {
            self.counters.captures_aborted.fetch_add(1, Ordering::Relaxed);
        }
    }
}
