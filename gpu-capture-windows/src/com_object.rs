//! COM bridge between real Direct3D 12 objects and the capture core.
//!
//! Any interface pointer the runtime hands out is held by its `IUnknown`
//! identity. Capability queries go through `QueryInterface`; names go
//! through `ID3D12Object::SetName`.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use uuid::Uuid;
use windows::core::{IUnknown, Interface, GUID, HSTRING};
use windows::Win32::Foundation::E_NOINTERFACE;
use windows::Win32::Graphics::Direct3D12::ID3D12Object;

use gpu_capture_core::models::error::CaptureError;
use gpu_capture_core::traits::real_api::{QueryResult, RealObject};

/// A real COM object, held by its identity `IUnknown`.
///
/// Dropping it releases the reference it owns.
pub struct ComObject {
    unknown: IUnknown,
}

// SAFETY: Direct3D 12 objects are free-threaded; the runtime synchronizes
// every method this type calls.
unsafe impl Send for ComObject {}
unsafe impl Sync for ComObject {}

impl ComObject {
    /// Take the COM identity of any interface pointer.
    pub fn from_interface<T: Interface>(object: &T) -> Result<Self, CaptureError> {
        let unknown = object
            .cast::<IUnknown>()
            .map_err(|e| CaptureError::RealCallFailed(format!("QueryInterface(IUnknown) failed: {}", e)))?;
        Ok(Self { unknown })
    }

    /// Borrow the object as another interface it implements.
    pub fn cast<T: Interface>(&self) -> Result<T, CaptureError> {
        self.unknown
            .cast::<T>()
            .map_err(|e| CaptureError::RealCallFailed(format!("QueryInterface failed: {}", e)))
    }

    pub fn as_unknown(&self) -> &IUnknown {
        &self.unknown
    }

    fn is_same_object(&self, other: &IUnknown) -> bool {
        self.unknown.as_raw() == other.as_raw()
    }
}

pub fn guid_from_uuid(iid: &Uuid) -> GUID {
    GUID::from_u128(iid.as_u128())
}

pub fn uuid_from_guid(guid: &GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

impl RealObject for ComObject {
    fn query_capability(&self, iid: &Uuid) -> Result<QueryResult, CaptureError> {
        let guid = guid_from_uuid(iid);
        let mut raw: *mut c_void = ptr::null_mut();
        // SAFETY: `guid` and `raw` are valid for the call; on success `raw`
        // holds one reference, which `from_raw` takes ownership of.
        let hr = unsafe { self.unknown.query(&guid, &mut raw) };
        if hr == E_NOINTERFACE {
            return Ok(QueryResult::Unsupported);
        }
        if hr.is_err() || raw.is_null() {
            return Err(CaptureError::RealCallFailed(format!(
                "QueryInterface({}) failed: {:#010x}",
                iid, hr.0
            )));
        }
        // SAFETY: `raw` is non-null and carries the reference `query` added.
        let queried = unsafe { IUnknown::from_raw(raw) };

        let identity = queried
            .cast::<IUnknown>()
            .map_err(|e| CaptureError::RealCallFailed(format!("QueryInterface(IUnknown) failed: {}", e)))?;
        if self.is_same_object(&identity) {
            return Ok(QueryResult::Same);
        }
        log::debug!("QueryInterface({}) returned a distinct object", iid);
        Ok(QueryResult::Other(Arc::new(Self { unknown: identity })))
    }

    fn set_name(&self, name: &str) -> Result<(), CaptureError> {
        let object: ID3D12Object = self.cast()?;
        let name = HSTRING::from(name);
        // SAFETY: `name` is a null-terminated wide string that outlives the
        // call, and the runtime copies it before returning.
        unsafe { object.SetName(&name) }
            .map_err(|e| CaptureError::RealCallFailed(format!("SetName failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_conversion_keeps_field_order() {
        // IID_ID3D12Object
        let iid = Uuid::parse_str("c4fec28f-7966-4e95-9f94-f431cb56c3b8").unwrap();
        let guid = guid_from_uuid(&iid);
        assert_eq!(guid.data1, 0xc4fec28f);
        assert_eq!(guid.data2, 0x7966);
        assert_eq!(guid.data3, 0x4e95);
        assert_eq!(guid, ID3D12Object::IID);
        assert_eq!(uuid_from_guid(&guid), iid);
    }
}
