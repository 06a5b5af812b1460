use std::fs;
use std::path::{Path, PathBuf};

use crate::models::capture_result::CaptureMetadata;
use crate::models::error::CaptureError;

/// Sidecar path for a capture file: `{stem}.metadata.json` next to it.
pub fn metadata_path(capture_path: &Path) -> PathBuf {
    capture_path.with_extension("metadata.json")
}

/// Write capture metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &CaptureMetadata, capture_path: &Path) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(capture_path), json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read capture metadata from a JSON sidecar file.
pub fn read_metadata(capture_path: &Path) -> Result<CaptureMetadata, CaptureError> {
    let json = fs::read_to_string(metadata_path(capture_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    let metadata: CaptureMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture_result::ChunkTally;

    #[test]
    fn sidecar_round_trip() {
        let path = std::env::temp_dir().join("gpu_capture_test_sidecar.cap");
        let metadata = CaptureMetadata {
            id: "0b7e".into(),
            api: "D3D12".into(),
            frame: 12,
            chunk_count: 1,
            byte_len: 64,
            checksum: "ff".into(),
            started_at: "2026-01-01T00:00:00+00:00".into(),
            created_at: "2026-01-01T00:00:01+00:00".into(),
            chunks: vec![ChunkTally {
                id: 1037,
                name: "ID3D12GraphicsCommandQueue::Signal".into(),
                count: 1,
            }],
        };

        write_metadata(&metadata, &path).unwrap();
        assert!(metadata_path(&path).ends_with("gpu_capture_test_sidecar.metadata.json"));
        assert_eq!(read_metadata(&path).unwrap(), metadata);

        fs::remove_file(metadata_path(&path)).ok();
    }

    #[test]
    fn missing_sidecar_is_storage_error() {
        let path = std::env::temp_dir().join("gpu_capture_test_no_such_capture.cap");
        assert!(matches!(read_metadata(&path), Err(CaptureError::StorageError(_))));
    }
}
