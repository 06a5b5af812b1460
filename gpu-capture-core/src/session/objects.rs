use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::chunk::ChunkType;
use crate::models::descriptors::ResourceId;
use crate::models::error::CaptureError;
use crate::processing::serialiser::PayloadWriter;
use crate::traits::real_api::{HandleTable, QueryResult, RealObject};
use crate::traits::soft_ref::SoftRefOwner;

use super::device::WrappedDevice;
use super::dispatch;
use super::ref_counter::RefCounter;

/// Category of a wrapped object, kept with its resource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Device,
    CommandQueue,
    CommandAllocator,
    CommandList,
    PipelineState,
    DescriptorHeap,
    RootSignature,
    Resource,
    Fence,
    /// Produced by a capability query.
    Unknown,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::CommandQueue => "command queue",
            Self::CommandAllocator => "command allocator",
            Self::CommandList => "command list",
            Self::PipelineState => "pipeline state",
            Self::DescriptorHeap => "descriptor heap",
            Self::RootSignature => "root signature",
            Self::Resource => "resource",
            Self::Fence => "fence",
            Self::Unknown => "object",
        };
        f.write_str(name)
    }
}

/// What a capability query on a wrapped object handed back.
pub enum QueriedObject {
    /// The queried object itself; its hard count was incremented.
    ThisObject,
    /// A different real object, wrapped before it reaches the caller.
    Wrapped(Arc<WrappedObject>),
}

/// Extra teardown run when a child is destroyed, after its release is
/// recorded and before the device soft reference is dropped.
pub(crate) type Teardown = Box<dyn FnOnce() + Send>;

/// Resolves nothing. Used once the owning device is gone.
struct NoHandles;

impl HandleTable for NoHandles {
    fn resolve(&self, _id: ResourceId) -> Option<Arc<dyn RealObject>> {
        None
    }
}

/// Shared lifetime machinery for every object a device creates.
///
/// Composes a self-deleting [`RefCounter`] and holds one device soft
/// reference from construction until destruction. Destruction releases the
/// real handle, records `ReleaseResource` if a capture is open, then drops
/// the soft reference.
pub struct DeviceChild<R: ?Sized> {
    id: ResourceId,
    kind: ObjectKind,
    counter: RefCounter<R>,
    device: Weak<WrappedDevice>,
    name: Mutex<Option<String>>,
}

/// Wrapper for the object categories that only need the common surface.
pub type WrappedObject = DeviceChild<dyn RealObject>;

impl<R: ?Sized + RealObject> DeviceChild<R> {
    pub(crate) fn new(
        device: &WrappedDevice,
        id: ResourceId,
        kind: ObjectKind,
        real: Arc<R>,
        teardown: Option<Teardown>,
    ) -> Self {
        device.soft_ref();
        let weak = device.downgrade();
        let hook_device = weak.clone();
        let counter = RefCounter::new(real, true).with_destructor(move || {
            let device = hook_device.upgrade();
            if let Some(device) = &device {
                device.forget_child(id);
            }
            if let Some(teardown) = teardown {
                teardown();
            }
            match device {
                Some(device) => {
                    device.soft_release();
                }
                None => log::warn!("{} {} destroyed after its device", kind, id),
            }
            log::debug!("{} {} destroyed", kind, id);
        });
        Self {
            id,
            kind,
            counter,
            device: weak,
            name: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    pub fn ref_count(&self) -> u32 {
        self.counter.ref_count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.counter.is_destroyed()
    }

    pub(crate) fn real(&self) -> Result<Arc<R>, CaptureError> {
        self.counter.real()
    }

    /// Run a recorded call against the real object. The payload starts with
    /// this object's id, followed by whatever `encode` writes.
    pub(crate) fn intercept<T>(
        &self,
        chunk_type: ChunkType,
        execute: impl FnOnce(&R, &dyn HandleTable) -> Result<T, CaptureError>,
        encode: impl FnOnce(&T, &mut PayloadWriter) -> Result<(), CaptureError>,
    ) -> Result<T, CaptureError> {
        let real = self.counter.real()?;
        let Some(device) = self.device.upgrade() else {
            return execute(&*real, &NoHandles);
        };
        let id = self.id;
        dispatch::intercept(
            &*device,
            chunk_type,
            || execute(&*real, &*device),
            |value, w| {
                w.put(&id);
                encode(value, w)
            },
        )
    }

    pub fn add_ref(&self) -> u32 {
        self.counter.add_ref()
    }

    pub fn release(&self) -> u32 {
        self.counter.release()
    }

    pub fn soft_ref(&self) -> u32 {
        let device = self.device.upgrade();
        self.counter
            .soft_ref(device.as_deref().map(|d| d as &dyn SoftRefOwner))
    }

    pub fn soft_release(&self) -> u32 {
        let device = self.device.upgrade();
        self.counter
            .soft_release(device.as_deref().map(|d| d as &dyn SoftRefOwner))
    }

    /// Forward a capability query, wrapping any other real object returned.
    pub fn query_capability(&self, iid: &Uuid) -> Result<QueriedObject, CaptureError> {
        let real = self.counter.real()?;
        match real.query_capability(iid)? {
            QueryResult::Same => {
                self.add_ref();
                Ok(QueriedObject::ThisObject)
            }
            QueryResult::Other(other) => {
                let device = self.device.upgrade().ok_or(CaptureError::ObjectDestroyed)?;
                Ok(QueriedObject::Wrapped(device.wrap_queried(other)?))
            }
            QueryResult::Unsupported => Err(CaptureError::CapabilityUnsupported(*iid)),
        }
    }

    /// Name the real object and record `SetResourceName`.
    pub fn set_name(&self, name: &str) -> Result<(), CaptureError> {
        let real = self.counter.real()?;
        let id = self.id;
        let execute = || real.set_name(name);
        match self.device.upgrade() {
            Some(device) => device.intercept_retained(
                id,
                ChunkType::SetResourceName,
                execute,
                |_, w| {
                    w.put(&id);
                    w.write_str(name);
                    Ok(())
                },
            )?,
            None => execute()?,
        }
        *self.name.lock() = Some(name.to_string());
        Ok(())
    }

    /// Record where this object's shader debug info lives.
    pub fn set_shader_debug_path(&self, path: &str) -> Result<(), CaptureError> {
        if self.counter.is_destroyed() {
            return Err(CaptureError::ObjectDestroyed);
        }
        let Some(device) = self.device.upgrade() else {
            return Ok(());
        };
        let id = self.id;
        device.intercept_retained(
            id,
            ChunkType::SetShaderDebugPath,
            || Ok(()),
            |_, w| {
                w.put(&id);
                w.write_str(path);
                Ok(())
            },
        )
    }
}

impl<R: ?Sized> fmt::Debug for DeviceChild<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceChild")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("ref_count", &self.counter.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptors::CommandListType;
    use crate::processing::chunk_stream::read_capture;
    use crate::test_support::{fake_device, IID_OTHER, IID_SELF};

    #[test]
    fn child_holds_device_soft_ref_for_its_lifetime() {
        let (device, journal, _sink) = fake_device();
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        assert_eq!(device.soft_ref_count(), 1);

        allocator.soft_ref();
        assert_eq!(allocator.ref_count(), 2);
        assert_eq!(device.soft_ref_count(), 2);

        allocator.release();
        allocator.release();
        assert!(allocator.is_destroyed());
        assert!(journal.was_released("allocator"));
        // The explicit soft ref was never soft-released; only the lifetime
        // one goes away with the object.
        assert_eq!(device.soft_ref_count(), 1);
    }

    #[test]
    fn query_same_capability_add_refs() {
        let (device, _journal, _sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();

        assert!(matches!(
            fence.query_capability(&IID_SELF).unwrap(),
            QueriedObject::ThisObject
        ));
        assert_eq!(fence.ref_count(), 2);
    }

    #[test]
    fn query_other_capability_is_wrapped() {
        let (device, _journal, _sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();

        let QueriedObject::Wrapped(other) = fence.query_capability(&IID_OTHER).unwrap() else {
            panic!("expected a wrapped object");
        };
        assert_ne!(other.id(), fence.id());
        assert_eq!(other.kind(), ObjectKind::Unknown);
        assert_eq!(fence.ref_count(), 1);
        assert_eq!(device.diagnostics().live_objects, 2);
    }

    #[test]
    fn query_unsupported_capability() {
        let (device, _journal, _sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();
        let iid = Uuid::from_u128(0xdead);
        assert_eq!(
            fence.query_capability(&iid).err(),
            Some(CaptureError::CapabilityUnsupported(iid))
        );
    }

    #[test]
    fn destroyed_object_rejects_calls() {
        let (device, _journal, _sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();
        fence.release();
        assert_eq!(fence.set_name("late"), Err(CaptureError::ObjectDestroyed));
        assert_eq!(fence.set_shader_debug_path("x.pdb"), Err(CaptureError::ObjectDestroyed));
    }

    #[test]
    fn release_is_recorded_during_capture() {
        let (device, journal, sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();
        device.begin_capture().unwrap();

        fence.release();
        assert!(journal.was_released("fence"));
        device.end_capture().unwrap();

        let stream = read_capture(&sink.captures()[0].bytes).unwrap();
        let release = stream
            .chunks
            .iter()
            .find(|c| c.chunk_type() == Some(ChunkType::ReleaseResource))
            .unwrap();
        assert_eq!(release.payload, fence.id().get().to_le_bytes());
    }

    #[test]
    fn names_are_forwarded_and_recorded() {
        let (device, journal, _sink) = fake_device();
        let fence = device.create_fence(0, 0).unwrap();
        fence.set_name("frame fence").unwrap();
        assert_eq!(fence.name().as_deref(), Some("frame fence"));
        assert!(journal.calls().contains(&"fence.set_name frame fence".to_string()));
    }
}
