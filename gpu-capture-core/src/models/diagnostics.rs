/// Counters for debugging a capturing device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub chunks_recorded: u64,
    pub bytes_recorded: u64,
    pub captures_completed: u64,
    pub captures_aborted: u64,
    /// Chunks that could not be encoded or appended and were lost with
    /// their capture.
    pub chunks_dropped: u64,
    pub live_objects: usize,
    pub soft_refs: u32,
}
