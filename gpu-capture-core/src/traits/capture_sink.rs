use crate::models::capture_result::{CaptureResult, FinishedCapture};
use crate::models::error::CaptureError;

/// Transport for finished capture scopes.
///
/// Called on whichever application thread closed the scope, outside every
/// capture-layer lock.
pub trait CaptureSink: Send + Sync {
    /// Take ownership of a closed scope. The returned result is what the
    /// device reports for the capture.
    fn on_capture_finished(&self, capture: FinishedCapture) -> Result<CaptureResult, CaptureError>;

    /// The scope for `frame` was discarded before it could close.
    fn on_capture_aborted(&self, frame: u32, reason: &CaptureError);
}
