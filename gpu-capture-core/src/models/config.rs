use std::path::PathBuf;

/// Configuration for a capturing device.
#[derive(Debug, Clone)]
pub struct CaptureConfiguration {
    /// API label written into every capture header (default: "D3D12").
    pub api_name: String,

    /// Directory where the file sink writes finished captures.
    pub output_directory: PathBuf,

    /// Largest payload a single chunk may carry (default: 64 MiB).
    pub max_chunk_payload: u32,

    /// Write a JSON metadata sidecar next to each capture file (default: true).
    pub write_metadata: bool,

    /// Flush queued debug-layer messages into each capture (default: true).
    pub record_debug_messages: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.api_name.trim().is_empty() {
            return Err("api name must not be empty".into());
        }
        if self.max_chunk_payload == 0 {
            return Err("max chunk payload must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            api_name: "D3D12".into(),
            output_directory: PathBuf::from("."),
            max_chunk_payload: 64 * 1024 * 1024,
            write_metadata: true,
            record_debug_messages: true,
        }
    }
}
