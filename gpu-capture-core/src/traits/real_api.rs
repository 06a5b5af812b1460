use std::sync::Arc;

use uuid::Uuid;

use crate::models::descriptors::{
    ClearValue, CommandListType, CommandQueueDesc, ComputePipelineStateDesc, CpuDescriptor,
    DescriptorHeapDesc, DrawIndexedArgs, GpuAddress, GraphicsPipelineStateDesc, HeapProperties,
    IndexBufferView, PrimitiveTopology, Rect, ResourceBarrier, ResourceDesc, ResourceId,
    ResourceStates, VertexBufferView, Viewport,
};
use crate::models::error::CaptureError;

/// Outcome of asking a real object for another capability.
pub enum QueryResult {
    /// The object itself implements it.
    Same,
    /// A different real object implements it.
    Other(Arc<dyn RealObject>),
    Unsupported,
}

/// A handle to an object owned by the real graphics API.
///
/// Dropping the last `Arc` releases the real handle. The capture layer never
/// hands these to application code; everything it returns is wrapped.
pub trait RealObject: Send + Sync {
    /// Forward a capability query to the real object.
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError>;

    /// Attach a debug name to the real object.
    fn set_name(&self, _name: &str) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Resolves recorded ids back to the live real objects they stand for.
///
/// Parameter structures refer to objects by [`ResourceId`]; a backend that
/// needs the real pointer looks it up here.
pub trait HandleTable {
    fn resolve(&self, id: ResourceId) -> Option<Arc<dyn RealObject>>;
}

/// The real device: factory for every other real object.
pub trait RealDevice: RealObject {
    fn create_command_queue(
        &self,
        desc: &CommandQueueDesc,
    ) -> Result<Arc<dyn RealCommandQueue>, CaptureError>;

    fn create_command_allocator(
        &self,
        list_type: CommandListType,
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_command_list(
        &self,
        node_mask: u32,
        list_type: CommandListType,
        allocator: &Arc<dyn RealObject>,
        initial_state: Option<&Arc<dyn RealObject>>,
    ) -> Result<Arc<dyn RealCommandList>, CaptureError>;

    fn create_graphics_pipeline_state(
        &self,
        desc: &GraphicsPipelineStateDesc,
        handles: &dyn HandleTable,
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_compute_pipeline_state(
        &self,
        desc: &ComputePipelineStateDesc,
        handles: &dyn HandleTable,
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_descriptor_heap(
        &self,
        desc: &DescriptorHeapDesc,
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_root_signature(
        &self,
        node_mask: u32,
        blob: &[u8],
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_committed_resource(
        &self,
        heap: &HeapProperties,
        heap_flags: u32,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
        clear_value: Option<&ClearValue>,
    ) -> Result<Arc<dyn RealObject>, CaptureError>;

    fn create_fence(&self, initial_value: u64, flags: u32)
        -> Result<Arc<dyn RealObject>, CaptureError>;
}

/// A real graphics command list.
///
/// Recording calls have no result in the native API, so only `close` and
/// `reset` can fail.
pub trait RealCommandList: RealObject {
    fn close(&self) -> Result<(), CaptureError>;

    fn reset(
        &self,
        allocator: &Arc<dyn RealObject>,
        initial_state: Option<&Arc<dyn RealObject>>,
    ) -> Result<(), CaptureError>;

    fn resource_barrier(&self, barriers: &[ResourceBarrier], handles: &dyn HandleTable);

    fn draw_indexed_instanced(&self, args: &DrawIndexedArgs);

    fn copy_buffer_region(
        &self,
        dst: &Arc<dyn RealObject>,
        dst_offset: u64,
        src: &Arc<dyn RealObject>,
        src_offset: u64,
        num_bytes: u64,
    );

    fn clear_render_target_view(
        &self,
        rtv: CpuDescriptor,
        color: [f32; 4],
        rects: &[Rect],
        handles: &dyn HandleTable,
    );

    fn ia_set_primitive_topology(&self, topology: PrimitiveTopology);

    fn ia_set_index_buffer(&self, view: Option<&IndexBufferView>, handles: &dyn HandleTable);

    fn ia_set_vertex_buffers(
        &self,
        start_slot: u32,
        views: &[VertexBufferView],
        handles: &dyn HandleTable,
    );

    fn rs_set_viewports(&self, viewports: &[Viewport]);

    fn rs_set_scissor_rects(&self, rects: &[Rect]);

    fn set_pipeline_state(&self, pipeline: &Arc<dyn RealObject>);

    fn om_set_render_targets(
        &self,
        rtvs: &[CpuDescriptor],
        single_handle_to_range: bool,
        dsv: Option<CpuDescriptor>,
        handles: &dyn HandleTable,
    );

    fn set_graphics_root_signature(&self, root_signature: Option<&Arc<dyn RealObject>>);

    fn set_graphics_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        location: GpuAddress,
        handles: &dyn HandleTable,
    );

    // Debug markers only matter to tools attached to the real API.
    fn begin_event(&self, _name: &str) {}

    fn set_marker(&self, _name: &str) {}

    fn end_event(&self) {}
}

pub trait RealCommandQueue: RealObject {
    fn execute_command_lists(&self, lists: &[Arc<dyn RealCommandList>]);

    fn signal(&self, fence: &Arc<dyn RealObject>, value: u64) -> Result<(), CaptureError>;
}
