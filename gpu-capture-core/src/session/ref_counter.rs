use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::soft_ref::SoftRefOwner;

static ORPHANED_SOFT_REFS: AtomicU64 = AtomicU64::new(0);

/// Number of soft-ref operations attempted without an owning device since
/// process start.
pub fn orphaned_soft_ref_warnings() -> u64 {
    ORPHANED_SOFT_REFS.load(Ordering::Relaxed)
}

type Destructor = Box<dyn FnOnce() + Send>;

/// Hard reference count mirrored in front of a real API object.
///
/// The count starts at 1 for the reference the creator hands out. With
/// `self_deleting` set, the release that reaches zero destroys the wrapper:
/// the real handle is dropped, then the destructor hook runs. Without it, the
/// owner decides when to call [`RefCounter::destroy`].
///
/// Counting is lock-free. The real handle is cloned out of its slot before
/// any forwarded call, so no lock is held while the real API runs.
pub struct RefCounter<R: ?Sized> {
    real: Mutex<Option<Arc<R>>>,
    ref_count: AtomicU32,
    self_deleting: AtomicBool,
    destroyed: AtomicBool,
    on_destroy: Mutex<Option<Destructor>>,
}

impl<R: ?Sized> RefCounter<R> {
    pub fn new(real: Arc<R>, self_deleting: bool) -> Self {
        Self {
            real: Mutex::new(Some(real)),
            ref_count: AtomicU32::new(1),
            self_deleting: AtomicBool::new(self_deleting),
            destroyed: AtomicBool::new(false),
            on_destroy: Mutex::new(None),
        }
    }

    /// Run `hook` once, right after the real handle is released.
    pub fn with_destructor(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.on_destroy.lock() = Some(Box::new(hook));
        self
    }

    pub fn add_ref(&self) -> u32 {
        self.ref_count.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Returns the post-decrement count, also when this call destroyed the
    /// object.
    pub fn release(&self) -> u32 {
        let previous = self.ref_count.fetch_sub(1, Ordering::AcqRel);
        if previous == 0 {
            // Caller broke the reference protocol. The real API leaves this
            // undefined and so do we.
            log::warn!("release on an object with no outstanding references");
        }
        let count = previous.wrapping_sub(1);
        if count == 0 && self.self_deleting.load(Ordering::Acquire) {
            self.destroy();
        }
        count
    }

    /// `add_ref`, then take a soft reference on `device`.
    pub fn soft_ref(&self, device: Option<&dyn SoftRefOwner>) -> u32 {
        let count = self.add_ref();
        match device {
            Some(device) => {
                device.soft_ref();
            }
            None => {
                ORPHANED_SOFT_REFS.fetch_add(1, Ordering::Relaxed);
                log::warn!("no device pointer, is a deleted resource being add-ref'd?");
            }
        }
        count
    }

    /// `release`, then drop a soft reference on `device`.
    pub fn soft_release(&self, device: Option<&dyn SoftRefOwner>) -> u32 {
        let count = self.release();
        match device {
            Some(device) => {
                device.soft_release();
            }
            None => {
                ORPHANED_SOFT_REFS.fetch_add(1, Ordering::Relaxed);
                log::warn!("no device pointer, is a deleted resource being released?");
            }
        }
        count
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn is_self_deleting(&self) -> bool {
        self.self_deleting.load(Ordering::Acquire)
    }

    pub fn set_self_deleting(&self, self_deleting: bool) {
        self.self_deleting.store(self_deleting, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// The real handle, for one forwarded call.
    pub fn real(&self) -> Result<Arc<R>, CaptureError> {
        self.real.lock().clone().ok_or(CaptureError::ObjectDestroyed)
    }

    /// Release the real handle and run the destructor hook. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let real = self.real.lock().take();
        drop(real);
        let hook = self.on_destroy.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<R: ?Sized> Drop for RefCounter<R> {
    fn drop(&mut self) {
        self.destroy();
    }
}
