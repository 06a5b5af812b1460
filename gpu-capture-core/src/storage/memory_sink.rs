use parking_lot::Mutex;

use crate::models::capture_result::{CaptureResult, FinishedCapture};
use crate::models::error::CaptureError;
use crate::traits::capture_sink::CaptureSink;

use super::file_sink::sha256_hex;

/// Keeps finished captures in memory for in-process consumers.
#[derive(Default)]
pub struct MemorySink {
    finished: Mutex<Vec<FinishedCapture>>,
    aborted: Mutex<Vec<(u32, CaptureError)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> Vec<FinishedCapture> {
        self.finished.lock().clone()
    }

    /// Remove and return everything captured so far.
    pub fn take_captures(&self) -> Vec<FinishedCapture> {
        std::mem::take(&mut *self.finished.lock())
    }

    pub fn last_capture(&self) -> Option<FinishedCapture> {
        self.finished.lock().last().cloned()
    }

    /// Frames whose scope was discarded, with the reason.
    pub fn aborted(&self) -> Vec<(u32, CaptureError)> {
        self.aborted.lock().clone()
    }
}

impl CaptureSink for MemorySink {
    fn on_capture_finished(&self, capture: FinishedCapture) -> Result<CaptureResult, CaptureError> {
        let result = CaptureResult::new(&capture, sha256_hex(&capture.bytes), None);
        self.finished.lock().push(capture);
        Ok(result)
    }

    fn on_capture_aborted(&self, frame: u32, reason: &CaptureError) {
        self.aborted.lock().push((frame, reason.clone()));
    }
}
