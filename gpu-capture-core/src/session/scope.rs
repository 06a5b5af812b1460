use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::capture_result::{CaptureResult, FinishedCapture};
use crate::models::chunk::{Chunk, ChunkType};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::processing::chunk_stream::{begin_marker, end_marker, write_chunk};
use crate::traits::capture_sink::CaptureSink;

/// The scope currently accepting chunks.
struct OpenScope {
    frame: u32,
    api_name: String,
    stream: Vec<u8>,
    chunk_count: u32,
    histogram: BTreeMap<ChunkType, u32>,
    started_at: DateTime<Utc>,
}

impl OpenScope {
    fn push(&mut self, chunk: &Chunk) {
        write_chunk(&mut self.stream, chunk);
        self.chunk_count += 1;
        *self.histogram.entry(chunk.chunk_type()).or_insert(0) += 1;
    }
}

/// Accumulates chunks into one capture scope at a time.
///
/// Appends are serialized by a single lock, so the finished stream is a
/// linearization of the order in which calls completed. The sink is always
/// called after that lock is released.
pub struct ChunkStreamWriter {
    scope: Mutex<Option<OpenScope>>,
    state: Mutex<CaptureState>,
    max_payload: u32,
    sink: Arc<dyn CaptureSink>,
}

impl ChunkStreamWriter {
    pub fn new(sink: Arc<dyn CaptureSink>, max_payload: u32) -> Self {
        Self {
            scope: Mutex::new(None),
            state: Mutex::new(CaptureState::Idle),
            max_payload,
            sink,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.scope.lock().is_some()
    }

    /// Open a scope and write its begin marker.
    pub fn begin_scope(&self, frame: u32, api_name: &str) -> Result<(), CaptureError> {
        self.begin_scope_with(frame, api_name, &[])
    }

    /// Open a scope whose stream starts with `prefix`.
    ///
    /// The begin marker and every prefix chunk are written before the scope
    /// becomes visible, so no concurrent append can land among them.
    ///
    /// A begin while a scope is open is a protocol error. The open scope can
    /// no longer be trusted, so it is discarded along with the request. A
    /// prefix chunk that cannot be appended fails the begin and leaves no
    /// scope open.
    pub fn begin_scope_with(
        &self,
        frame: u32,
        api_name: &str,
        prefix: &[Chunk],
    ) -> Result<(), CaptureError> {
        let marker = begin_marker(frame, api_name)?;

        let mut scope = self.scope.lock();
        if let Some(open) = scope.take() {
            drop(scope);
            log::warn!(
                "begin for frame {} while frame {} is open, discarding both",
                frame,
                open.frame
            );
            self.discard(open.frame, CaptureError::ScopeAlreadyOpen);
            return Err(CaptureError::ScopeAlreadyOpen);
        }
        if let Err(e) = prefix.iter().try_for_each(|chunk| self.check(chunk)) {
            drop(scope);
            log::warn!("capture of frame {} could not start: {}", frame, e);
            self.discard(frame, e.clone());
            return Err(e);
        }

        let mut open = OpenScope {
            frame,
            api_name: api_name.to_string(),
            stream: Vec::new(),
            chunk_count: 0,
            histogram: BTreeMap::new(),
            started_at: Utc::now(),
        };
        write_chunk(&mut open.stream, &marker);
        for chunk in prefix {
            open.push(chunk);
        }
        *self.state.lock() = CaptureState::Capturing {
            frame,
            chunk_count: open.chunk_count,
        };
        *scope = Some(open);
        log::debug!("capture scope opened for frame {} with {} chunks", frame, prefix.len());
        Ok(())
    }

    /// Append a content chunk. Returns the scope's new chunk count.
    ///
    /// A capture marker is a protocol error and discards the open scope.
    pub fn append_chunk(&self, chunk: &Chunk) -> Result<u32, CaptureError> {
        let mut scope = self.scope.lock();
        if scope.is_none() {
            return Err(CaptureError::NoScopeOpen);
        }
        if let Err(e) = self.check(chunk) {
            if e.is_protocol_error() {
                if let Some(open) = scope.take() {
                    drop(scope);
                    log::warn!("capture of frame {} aborted: {}", open.frame, e);
                    self.discard(open.frame, e.clone());
                }
            }
            return Err(e);
        }

        let open = scope.as_mut().ok_or(CaptureError::NoScopeOpen)?;
        open.push(chunk);
        *self.state.lock() = CaptureState::Capturing {
            frame: open.frame,
            chunk_count: open.chunk_count,
        };
        Ok(open.chunk_count)
    }

    /// Write the end marker and hand the scope to the sink.
    pub fn end_scope(&self) -> Result<CaptureResult, CaptureError> {
        self.end_scope_with(|_| Ok(Vec::new()))
    }

    /// Close the scope with the chunks `trailer` builds for its frame, then
    /// the end marker.
    ///
    /// The scope is detached before `trailer` runs, so nothing appended
    /// concurrently can follow the trailer, and of two concurrent ends only
    /// one sees the scope. If the trailer cannot be built or appended the
    /// scope is discarded.
    pub fn end_scope_with(
        &self,
        trailer: impl FnOnce(u32) -> Result<Vec<Chunk>, CaptureError>,
    ) -> Result<CaptureResult, CaptureError> {
        let mut open = self.scope.lock().take().ok_or(CaptureError::NoScopeOpen)?;

        let closed = trailer(open.frame).and_then(|chunks| {
            chunks.iter().try_for_each(|chunk| self.check(chunk))?;
            for chunk in &chunks {
                open.push(chunk);
            }
            end_marker(open.chunk_count)
        });
        let footer = match closed {
            Ok(footer) => footer,
            Err(e) => {
                log::warn!("capture of frame {} could not be closed: {}", open.frame, e);
                self.discard(open.frame, e.clone());
                return Err(e);
            }
        };
        write_chunk(&mut open.stream, &footer);

        let capture = FinishedCapture {
            frame: open.frame,
            api_name: open.api_name,
            chunk_count: open.chunk_count,
            bytes: open.stream,
            chunk_histogram: open.histogram,
            started_at: open.started_at,
            finished_at: Utc::now(),
        };
        log::debug!(
            "capture scope closed for frame {}: {} chunks, {} bytes",
            capture.frame,
            capture.chunk_count,
            capture.bytes.len()
        );

        match self.sink.on_capture_finished(capture) {
            Ok(result) => {
                self.settle(CaptureState::Completed(Box::new(result.clone())));
                Ok(result)
            }
            Err(e) => {
                log::error!("capture sink failed: {}", e);
                self.settle(CaptureState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Discard the open scope, if any. Returns whether one was discarded.
    pub fn abort(&self, reason: CaptureError) -> bool {
        let Some(open) = self.scope.lock().take() else {
            return false;
        };
        log::warn!("capture of frame {} aborted: {}", open.frame, reason);
        self.discard(open.frame, reason);
        true
    }

    /// Checks every content chunk must pass.
    fn check(&self, chunk: &Chunk) -> Result<(), CaptureError> {
        let chunk_type = chunk.chunk_type();
        if matches!(
            chunk_type,
            ChunkType::ContextCaptureHeader | ChunkType::ContextCaptureFooter
        ) {
            return Err(CaptureError::InvalidChunkType(chunk_type.id()));
        }
        if chunk.payload_len() > self.max_payload {
            return Err(CaptureError::PayloadTooLarge {
                size: chunk.payload().len(),
                limit: self.max_payload,
            });
        }
        Ok(())
    }

    fn discard(&self, frame: u32, reason: CaptureError) {
        self.sink.on_capture_aborted(frame, &reason);
        self.settle(CaptureState::Failed(reason));
    }

    /// Publish the outcome of a closed scope unless a newer one has opened.
    fn settle(&self, state: CaptureState) {
        let scope = self.scope.lock();
        if scope.is_none() {
            *self.state.lock() = state;
        }
    }
}
