use crate::models::chunk::Chunk;
use crate::models::error::CaptureError;

/// Where intercepted calls deposit their chunks.
pub trait ChunkRecorder {
    fn is_capturing(&self) -> bool;

    /// Append to the open scope.
    fn record(&self, chunk: Chunk) -> Result<(), CaptureError>;

    /// Throw away the open scope after a recording failure.
    fn abort_capture(&self, reason: CaptureError);
}
