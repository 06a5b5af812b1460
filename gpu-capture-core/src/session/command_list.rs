use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::chunk::ChunkType;
use crate::models::descriptors::{
    CommandListType, CpuDescriptor, DrawIndexedArgs, GpuAddress, IndexBufferView,
    PrimitiveTopology, Rect, ResourceBarrier, ResourceId, VertexBufferView, Viewport,
};
use crate::models::error::CaptureError;
use crate::processing::registry::MarshalRegistry;
use crate::traits::real_api::RealCommandList;

use super::device::WrappedDevice;
use super::objects::{DeviceChild, ObjectKind, WrappedObject};

type AllocatorSlot = Arc<Mutex<Option<Arc<WrappedObject>>>>;

/// A wrapped graphics command list.
///
/// Every recording call is forwarded to the real list first and, while a
/// capture is open, recorded with the list's id leading the payload. The
/// list soft-references the allocator it records into, so the allocator
/// outlives any release by the application until the list is reset onto
/// another allocator or destroyed.
pub struct WrappedCommandList {
    child: DeviceChild<dyn RealCommandList>,
    list_type: CommandListType,
    allocator: AllocatorSlot,
}

impl WrappedCommandList {
    pub(crate) fn new(
        device: &WrappedDevice,
        id: ResourceId,
        list_type: CommandListType,
        real: Arc<dyn RealCommandList>,
        allocator: Arc<WrappedObject>,
    ) -> Self {
        allocator.soft_ref();
        let slot: AllocatorSlot = Arc::new(Mutex::new(Some(allocator)));
        let teardown_slot = slot.clone();
        let teardown = Box::new(move || {
            let allocator = teardown_slot.lock().take();
            if let Some(allocator) = allocator {
                allocator.soft_release();
            }
        });
        Self {
            child: DeviceChild::new(device, id, ObjectKind::CommandList, real, Some(teardown)),
            list_type,
            allocator: slot,
        }
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// The allocator the list currently records into.
    pub fn allocator(&self) -> Option<Arc<WrappedObject>> {
        self.allocator.lock().clone()
    }

    pub fn close(&self) -> Result<(), CaptureError> {
        self.child
            .intercept(ChunkType::CloseList, |real, _| real.close(), |_, _| Ok(()))
    }

    /// Reset onto `allocator`, moving the list's soft reference to it.
    pub fn reset(
        &self,
        allocator: &Arc<WrappedObject>,
        initial_state: Option<&WrappedObject>,
    ) -> Result<(), CaptureError> {
        let real_allocator = allocator.real()?;
        let real_initial = initial_state.map(|p| p.real()).transpose()?;
        self.child.intercept(
            ChunkType::ResetList,
            |real, _| real.reset(&real_allocator, real_initial.as_ref()),
            |_, w| {
                let registry = MarshalRegistry::global();
                registry.encode(&allocator.id(), w)?;
                registry.encode_option(initial_state.map(|p| p.id()).as_ref(), w)
            },
        )?;

        allocator.soft_ref();
        let previous = self.allocator.lock().replace(allocator.clone());
        if let Some(previous) = previous {
            previous.soft_release();
        }
        Ok(())
    }

    pub fn resource_barrier(&self, barriers: &[ResourceBarrier]) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::ResourceBarrier,
            |real, handles| {
                real.resource_barrier(barriers, handles);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode_slice(barriers, w),
        )
    }

    pub fn draw_indexed_instanced(&self, args: &DrawIndexedArgs) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::DrawIndexedInst,
            |real, _| {
                real.draw_indexed_instanced(args);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode(args, w),
        )
    }

    pub fn copy_buffer_region(
        &self,
        dst: &WrappedObject,
        dst_offset: u64,
        src: &WrappedObject,
        src_offset: u64,
        num_bytes: u64,
    ) -> Result<(), CaptureError> {
        let real_dst = dst.real()?;
        let real_src = src.real()?;
        self.child.intercept(
            ChunkType::CopyBuffer,
            |real, _| {
                real.copy_buffer_region(&real_dst, dst_offset, &real_src, src_offset, num_bytes);
                Ok(())
            },
            |_, w| {
                w.put(&dst.id());
                w.write_u64(dst_offset);
                w.put(&src.id());
                w.write_u64(src_offset);
                w.write_u64(num_bytes);
                Ok(())
            },
        )
    }

    pub fn clear_render_target_view(
        &self,
        rtv: CpuDescriptor,
        color: [f32; 4],
        rects: &[Rect],
    ) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::ClearRtv,
            |real, handles| {
                real.clear_render_target_view(rtv, color, rects, handles);
                Ok(())
            },
            |_, w| {
                let registry = MarshalRegistry::global();
                registry.encode(&rtv, w)?;
                w.put(&color);
                registry.encode_slice(rects, w)
            },
        )
    }

    pub fn ia_set_primitive_topology(&self, topology: PrimitiveTopology) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetTopology,
            |real, _| {
                real.ia_set_primitive_topology(topology);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode(&topology, w),
        )
    }

    /// `None` unbinds the index buffer.
    pub fn ia_set_index_buffer(&self, view: Option<&IndexBufferView>) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetIBuffer,
            |real, handles| {
                real.ia_set_index_buffer(view, handles);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode_option(view, w),
        )
    }

    pub fn ia_set_vertex_buffers(
        &self,
        start_slot: u32,
        views: &[VertexBufferView],
    ) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetVBuffers,
            |real, handles| {
                real.ia_set_vertex_buffers(start_slot, views, handles);
                Ok(())
            },
            |_, w| {
                w.write_u32(start_slot);
                MarshalRegistry::global().encode_slice(views, w)
            },
        )
    }

    pub fn rs_set_viewports(&self, viewports: &[Viewport]) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetViewports,
            |real, _| {
                real.rs_set_viewports(viewports);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode_slice(viewports, w),
        )
    }

    pub fn rs_set_scissor_rects(&self, rects: &[Rect]) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetScissors,
            |real, _| {
                real.rs_set_scissor_rects(rects);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode_slice(rects, w),
        )
    }

    pub fn set_pipeline_state(&self, pipeline: &WrappedObject) -> Result<(), CaptureError> {
        let real_pipeline = pipeline.real()?;
        self.child.intercept(
            ChunkType::SetPipe,
            |real, _| {
                real.set_pipeline_state(&real_pipeline);
                Ok(())
            },
            |_, w| MarshalRegistry::global().encode(&pipeline.id(), w),
        )
    }

    pub fn om_set_render_targets(
        &self,
        rtvs: &[CpuDescriptor],
        single_handle_to_range: bool,
        dsv: Option<CpuDescriptor>,
    ) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetRtvs,
            |real, handles| {
                real.om_set_render_targets(rtvs, single_handle_to_range, dsv, handles);
                Ok(())
            },
            |_, w| {
                let registry = MarshalRegistry::global();
                registry.encode_slice(rtvs, w)?;
                w.write_bool(single_handle_to_range);
                registry.encode_option(dsv.as_ref(), w)
            },
        )
    }

    pub fn set_graphics_root_signature(
        &self,
        root_signature: Option<&WrappedObject>,
    ) -> Result<(), CaptureError> {
        let real_root_signature = root_signature.map(|r| r.real()).transpose()?;
        self.child.intercept(
            ChunkType::SetGfxRootSig,
            |real, _| {
                real.set_graphics_root_signature(real_root_signature.as_ref());
                Ok(())
            },
            |_, w| {
                MarshalRegistry::global().encode_option(root_signature.map(|r| r.id()).as_ref(), w)
            },
        )
    }

    pub fn set_graphics_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        location: GpuAddress,
    ) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetGfxRootCbv,
            |real, handles| {
                real.set_graphics_root_constant_buffer_view(root_parameter_index, location, handles);
                Ok(())
            },
            |_, w| {
                w.write_u32(root_parameter_index);
                MarshalRegistry::global().encode(&location, w)
            },
        )
    }

    pub fn begin_event(&self, name: &str) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::PushEvent,
            |real, _| {
                real.begin_event(name);
                Ok(())
            },
            |_, w| {
                w.write_str(name);
                Ok(())
            },
        )
    }

    pub fn set_marker(&self, name: &str) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::SetMarker,
            |real, _| {
                real.set_marker(name);
                Ok(())
            },
            |_, w| {
                w.write_str(name);
                Ok(())
            },
        )
    }

    pub fn end_event(&self) -> Result<(), CaptureError> {
        self.child.intercept(
            ChunkType::PopEvent,
            |real, _| {
                real.end_event();
                Ok(())
            },
            |_, _| Ok(()),
        )
    }
}

impl Deref for WrappedCommandList {
    type Target = DeviceChild<dyn RealCommandList>;

    fn deref(&self) -> &Self::Target {
        &self.child
    }
}
