//! In-memory stand-ins for the real graphics API, shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::CaptureConfiguration;
use crate::models::descriptors::{
    ClearValue, CommandListType, CommandQueueDesc, ComputePipelineStateDesc, CpuDescriptor,
    DescriptorHeapDesc, DrawIndexedArgs, GpuAddress, GraphicsPipelineStateDesc, HeapProperties,
    IndexBufferView, PrimitiveTopology, Rect, ResourceBarrier, ResourceDesc, ResourceStates,
    VertexBufferView, Viewport,
};
use crate::models::error::CaptureError;
use crate::session::device::WrappedDevice;
use crate::storage::memory_sink::MemorySink;
use crate::traits::real_api::{
    HandleTable, QueryResult, RealCommandList, RealCommandQueue, RealDevice, RealObject,
};

pub(crate) const IID_SELF: Uuid = Uuid::from_u128(1);
pub(crate) const IID_OTHER: Uuid = Uuid::from_u128(2);

/// Everything the fakes were asked to do, and which of them were dropped.
#[derive(Default)]
pub(crate) struct Journal {
    calls: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl Journal {
    pub(crate) fn call(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn was_released(&self, label: &str) -> bool {
        self.released.lock().iter().any(|l| l == label)
    }

    /// Make every fallible real call fail until switched back.
    pub(crate) fn fail_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self, error: &str) -> Result<(), CaptureError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::RealCallFailed(error.into()));
        }
        Ok(())
    }
}

pub(crate) struct FakeObject {
    label: String,
    journal: Arc<Journal>,
}

impl FakeObject {
    fn new(label: impl Into<String>, journal: &Arc<Journal>) -> Self {
        Self {
            label: label.into(),
            journal: journal.clone(),
        }
    }
}

impl RealObject for FakeObject {
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError> {
        if *iid == IID_SELF {
            return Ok(QueryResult::Same);
        }
        if *iid == IID_OTHER {
            let other = FakeObject::new(format!("{}.other", self.label), &self.journal);
            return Ok(QueryResult::Other(Arc::new(other)));
        }
        Ok(QueryResult::Unsupported)
    }

    fn set_name(&self, name: &str) -> Result<(), CaptureError> {
        self.journal.check("E_INVALIDARG")?;
        self.journal.call(format!("{}.set_name {}", self.label, name));
        Ok(())
    }
}

impl Drop for FakeObject {
    fn drop(&mut self) {
        self.journal.released.lock().push(self.label.clone());
    }
}

#[derive(Default)]
pub(crate) struct FakeDevice {
    journal: Arc<Journal>,
}

impl FakeDevice {
    fn object(&self, label: &str) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.journal.check("E_OUTOFMEMORY")?;
        self.journal.call(format!("device.create {}", label));
        Ok(Arc::new(FakeObject::new(label, &self.journal)))
    }
}

impl RealObject for FakeDevice {
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError> {
        if *iid == IID_SELF {
            return Ok(QueryResult::Same);
        }
        Ok(QueryResult::Unsupported)
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.journal.released.lock().push("device".into());
    }
}

impl RealDevice for FakeDevice {
    fn create_command_queue(
        &self,
        _desc: &CommandQueueDesc,
    ) -> Result<Arc<dyn RealCommandQueue>, CaptureError> {
        self.journal.check("E_OUTOFMEMORY")?;
        Ok(Arc::new(FakeCommandQueue(FakeObject::new("queue", &self.journal))))
    }

    fn create_command_allocator(
        &self,
        _list_type: CommandListType,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("allocator")
    }

    fn create_command_list(
        &self,
        _node_mask: u32,
        _list_type: CommandListType,
        _allocator: &Arc<dyn RealObject>,
        _initial_state: Option<&Arc<dyn RealObject>>,
    ) -> Result<Arc<dyn RealCommandList>, CaptureError> {
        self.journal.check("E_OUTOFMEMORY")?;
        Ok(Arc::new(FakeCommandList(FakeObject::new("list", &self.journal))))
    }

    fn create_graphics_pipeline_state(
        &self,
        desc: &GraphicsPipelineStateDesc,
        handles: &dyn HandleTable,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        let root_sig = match desc.root_signature {
            Some(id) if handles.resolve(id).is_some() => "resolved",
            Some(_) => "dangling",
            None => "none",
        };
        self.journal
            .call(format!("device.create_graphics_pipeline_state root_sig={}", root_sig));
        self.object("pipeline")
    }

    fn create_compute_pipeline_state(
        &self,
        _desc: &ComputePipelineStateDesc,
        _handles: &dyn HandleTable,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("pipeline")
    }

    fn create_descriptor_heap(
        &self,
        _desc: &DescriptorHeapDesc,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("heap")
    }

    fn create_root_signature(
        &self,
        _node_mask: u32,
        _blob: &[u8],
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("root_sig")
    }

    fn create_committed_resource(
        &self,
        _heap: &HeapProperties,
        _heap_flags: u32,
        _desc: &ResourceDesc,
        _initial_state: ResourceStates,
        _clear_value: Option<&ClearValue>,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("resource")
    }

    fn create_fence(
        &self,
        _initial_value: u64,
        _flags: u32,
    ) -> Result<Arc<dyn RealObject>, CaptureError> {
        self.object("fence")
    }
}

pub(crate) struct FakeCommandList(FakeObject);

impl FakeCommandList {
    fn call(&self, call: impl Into<String>) {
        self.0.journal.call(call);
    }
}

impl RealObject for FakeCommandList {
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError> {
        self.0.query_capability(iid)
    }
}

impl RealCommandList for FakeCommandList {
    fn close(&self) -> Result<(), CaptureError> {
        self.0.journal.check("E_FAIL")?;
        self.call("list.close");
        Ok(())
    }

    fn reset(
        &self,
        _allocator: &Arc<dyn RealObject>,
        _initial_state: Option<&Arc<dyn RealObject>>,
    ) -> Result<(), CaptureError> {
        self.0.journal.check("E_FAIL")?;
        self.call("list.reset");
        Ok(())
    }

    fn resource_barrier(&self, barriers: &[ResourceBarrier], handles: &dyn HandleTable) {
        let resolved = barriers
            .iter()
            .flat_map(|b| b.resources())
            .all(|id| handles.resolve(id).is_some());
        let status = if resolved { "resolved" } else { "dangling" };
        self.call(format!("list.resource_barrier {} {}", barriers.len(), status));
    }

    fn draw_indexed_instanced(&self, args: &DrawIndexedArgs) {
        self.call(format!(
            "list.draw_indexed_instanced {}",
            args.index_count_per_instance
        ));
    }

    fn copy_buffer_region(
        &self,
        _dst: &Arc<dyn RealObject>,
        _dst_offset: u64,
        _src: &Arc<dyn RealObject>,
        _src_offset: u64,
        num_bytes: u64,
    ) {
        self.call(format!("list.copy_buffer_region {}", num_bytes));
    }

    fn clear_render_target_view(
        &self,
        _rtv: CpuDescriptor,
        _color: [f32; 4],
        _rects: &[Rect],
        _handles: &dyn HandleTable,
    ) {
        self.call("list.clear_render_target_view");
    }

    fn ia_set_primitive_topology(&self, topology: PrimitiveTopology) {
        self.call(format!("list.ia_set_primitive_topology {:?}", topology));
    }

    fn ia_set_index_buffer(&self, view: Option<&IndexBufferView>, _handles: &dyn HandleTable) {
        self.call(format!("list.ia_set_index_buffer {}", view.is_some()));
    }

    fn ia_set_vertex_buffers(
        &self,
        start_slot: u32,
        views: &[VertexBufferView],
        _handles: &dyn HandleTable,
    ) {
        self.call(format!("list.ia_set_vertex_buffers {} {}", start_slot, views.len()));
    }

    fn rs_set_viewports(&self, viewports: &[Viewport]) {
        self.call(format!("list.rs_set_viewports {}", viewports.len()));
    }

    fn rs_set_scissor_rects(&self, rects: &[Rect]) {
        self.call(format!("list.rs_set_scissor_rects {}", rects.len()));
    }

    fn set_pipeline_state(&self, _pipeline: &Arc<dyn RealObject>) {
        self.call("list.set_pipeline_state");
    }

    fn om_set_render_targets(
        &self,
        rtvs: &[CpuDescriptor],
        _single_handle_to_range: bool,
        _dsv: Option<CpuDescriptor>,
        _handles: &dyn HandleTable,
    ) {
        self.call(format!("list.om_set_render_targets {}", rtvs.len()));
    }

    fn set_graphics_root_signature(&self, root_signature: Option<&Arc<dyn RealObject>>) {
        self.call(format!(
            "list.set_graphics_root_signature {}",
            root_signature.is_some()
        ));
    }

    fn set_graphics_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        _location: GpuAddress,
        _handles: &dyn HandleTable,
    ) {
        self.call(format!(
            "list.set_graphics_root_constant_buffer_view {}",
            root_parameter_index
        ));
    }

    fn begin_event(&self, name: &str) {
        self.call(format!("list.begin_event {}", name));
    }

    fn set_marker(&self, name: &str) {
        self.call(format!("list.set_marker {}", name));
    }

    fn end_event(&self) {
        self.call("list.end_event");
    }
}

pub(crate) struct FakeCommandQueue(FakeObject);

impl RealObject for FakeCommandQueue {
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError> {
        self.0.query_capability(iid)
    }
}

impl RealCommandQueue for FakeCommandQueue {
    fn execute_command_lists(&self, lists: &[Arc<dyn RealCommandList>]) {
        self.0
            .journal
            .call(format!("queue.execute_command_lists {}", lists.len()));
    }

    fn signal(&self, _fence: &Arc<dyn RealObject>, value: u64) -> Result<(), CaptureError> {
        self.0.journal.check("DXGI_ERROR_DEVICE_REMOVED")?;
        self.0.journal.call(format!("queue.signal {}", value));
        Ok(())
    }
}

pub(crate) fn fake_device() -> (Arc<WrappedDevice>, Arc<Journal>, Arc<MemorySink>) {
    fake_device_with(CaptureConfiguration::default())
}

pub(crate) fn fake_device_with(
    config: CaptureConfiguration,
) -> (Arc<WrappedDevice>, Arc<Journal>, Arc<MemorySink>) {
    let journal = Arc::new(Journal::default());
    let real = Arc::new(FakeDevice {
        journal: journal.clone(),
    });
    let sink = Arc::new(MemorySink::new());
    let device = WrappedDevice::new(real, 0xb000, config, sink.clone()).unwrap();
    (device, journal, sink)
}
