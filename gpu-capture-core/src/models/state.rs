use super::capture_result::CaptureResult;
use super::error::CaptureError;

/// Capture state machine.
///
/// State transitions:
/// ```text
/// idle → capturing → completed
///            ↓
///          failed
/// ```
/// A new capture may start from any state except `Capturing`.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing { frame: u32, chunk_count: u32 },
    Completed(Box<CaptureResult>),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Frame number of the open or last completed capture.
    pub fn frame(&self) -> Option<u32> {
        match self {
            Self::Capturing { frame, .. } => Some(*frame),
            Self::Completed(result) => Some(result.frame),
            _ => None,
        }
    }
}
