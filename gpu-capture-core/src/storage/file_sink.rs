use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::capture_result::{CaptureResult, FinishedCapture};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::traits::capture_sink::CaptureSink;

use super::metadata;

/// Streaming writer for one capture file.
///
/// ## File Format
///
/// The file is the scope's wire stream, unchanged:
/// ```text
/// [ContextCaptureHeader chunk]
/// [content chunk: 4-byte LE type id | 4-byte LE length | payload]
/// ...
/// [ContextCaptureFooter chunk]
/// ```
pub struct CaptureFileWriter {
    file_path: PathBuf,
    file: Option<File>,
    total_bytes_written: u64,
}

impl CaptureFileWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            total_bytes_written: 0,
        }
    }

    /// Create the file, and its directory if needed.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;
        self.file = Some(file);
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open for writing".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush and close the file. Returns the SHA-256 of what landed on disk.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.sync_all().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        drop(file);

        sha256_file(&self.file_path)
    }

    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Writes each finished capture to `capture_<frame>_<uuid>.cap` in a
/// directory, with an optional JSON metadata sidecar.
pub struct FileCaptureSink {
    output_directory: PathBuf,
    write_metadata: bool,
}

impl FileCaptureSink {
    pub fn new(output_directory: impl Into<PathBuf>, write_metadata: bool) -> Self {
        Self {
            output_directory: output_directory.into(),
            write_metadata,
        }
    }

    pub fn from_config(config: &CaptureConfiguration) -> Self {
        Self::new(config.output_directory.clone(), config.write_metadata)
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    fn capture_path(&self, frame: u32) -> PathBuf {
        self.output_directory
            .join(format!("capture_{}_{}.cap", frame, uuid::Uuid::new_v4()))
    }
}

impl CaptureSink for FileCaptureSink {
    fn on_capture_finished(&self, capture: FinishedCapture) -> Result<CaptureResult, CaptureError> {
        let path = self.capture_path(capture.frame);

        let mut writer = CaptureFileWriter::new(path.clone());
        writer.open()?;
        writer.write(&capture.bytes)?;
        let checksum = writer.close()?;

        let result = CaptureResult::new(&capture, checksum, Some(path.clone()));
        if self.write_metadata {
            metadata::write_metadata(&result.metadata, &path)?;
        }
        log::info!(
            "wrote capture of frame {} to {} ({} bytes)",
            capture.frame,
            path.display(),
            writer.bytes_written()
        );
        Ok(result)
    }

    fn on_capture_aborted(&self, frame: u32, reason: &CaptureError) {
        log::warn!("capture of frame {} not written: {}", frame, reason);
    }
}

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data =
        fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(sha256_hex(&data))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
