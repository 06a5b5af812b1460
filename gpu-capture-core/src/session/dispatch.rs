//! The fixed sequence every intercepted entry point follows:
//!
//! 1. execute against the real API;
//! 2. if that succeeded and a scope is open, encode the call as a chunk;
//! 3. append the chunk.
//!
//! Step 1's result is what the application sees. A failure in steps 2 or 3
//! aborts the capture and is otherwise swallowed.

use crate::models::chunk::{Chunk, ChunkType};
use crate::models::error::CaptureError;
use crate::processing::serialiser::PayloadWriter;
use crate::traits::chunk_recorder::ChunkRecorder;

fn build_chunk<T>(
    chunk_type: ChunkType,
    value: &T,
    encode: impl FnOnce(&T, &mut PayloadWriter) -> Result<(), CaptureError>,
) -> Result<Chunk, CaptureError> {
    let mut w = PayloadWriter::new();
    encode(value, &mut w)?;
    Chunk::new(chunk_type, w.into_bytes())
}

/// Append `chunk`, aborting the capture if that fails.
///
/// A scope that closed after the caller checked `is_capturing` is not a
/// failure: the chunk belongs to no capture and is dropped. Aborting then
/// would hit whatever scope opened next.
pub fn record_or_abort(recorder: &dyn ChunkRecorder, chunk_type: ChunkType, chunk: Result<Chunk, CaptureError>) {
    let result = chunk.and_then(|chunk| recorder.record(chunk));
    match result {
        Ok(()) => {}
        Err(CaptureError::NoScopeOpen) => {
            log::debug!("{} finished after its capture closed", chunk_type.name());
        }
        Err(e) => {
            log::error!("failed to record {}: {}", chunk_type.name(), e);
            recorder.abort_capture(e);
        }
    }
}

/// Run one intercepted call.
///
/// `encode` sees the real call's output, so it can record values the call
/// produced.
pub fn intercept<T>(
    recorder: &dyn ChunkRecorder,
    chunk_type: ChunkType,
    execute: impl FnOnce() -> Result<T, CaptureError>,
    encode: impl FnOnce(&T, &mut PayloadWriter) -> Result<(), CaptureError>,
) -> Result<T, CaptureError> {
    let value = execute()?;
    if recorder.is_capturing() {
        record_or_abort(recorder, chunk_type, build_chunk(chunk_type, &value, encode));
    }
    Ok(value)
}

/// Run a call whose chunk the device retains.
///
/// The chunk is built even when no scope is open and handed back unrecorded:
/// the caller registers it with the object it belongs to and records it in
/// the same critical section, so a capture starting concurrently sees it
/// exactly once. `None` means encoding failed; that was already logged.
pub fn intercept_create<T>(
    recorder: &dyn ChunkRecorder,
    chunk_type: ChunkType,
    execute: impl FnOnce() -> Result<T, CaptureError>,
    encode: impl FnOnce(&T, &mut PayloadWriter) -> Result<(), CaptureError>,
) -> Result<(T, Option<Chunk>), CaptureError> {
    let value = execute()?;
    let chunk = match build_chunk(chunk_type, &value, encode) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            log::error!("failed to encode {}: {}", chunk_type.name(), e);
            if recorder.is_capturing() {
                recorder.abort_capture(e);
            }
            None
        }
    };
    Ok((value, chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recorder {
        capturing: AtomicBool,
        record_error: Option<CaptureError>,
        chunks: Mutex<Vec<Chunk>>,
        aborted: Mutex<Vec<CaptureError>>,
    }

    impl ChunkRecorder for Recorder {
        fn is_capturing(&self) -> bool {
            self.capturing.load(Ordering::SeqCst)
        }

        fn record(&self, chunk: Chunk) -> Result<(), CaptureError> {
            if let Some(e) = &self.record_error {
                return Err(e.clone());
            }
            self.chunks.lock().push(chunk);
            Ok(())
        }

        fn abort_capture(&self, reason: CaptureError) {
            self.capturing.store(false, Ordering::SeqCst);
            self.aborted.lock().push(reason);
        }
    }

    fn capturing() -> Recorder {
        let recorder = Recorder::default();
        recorder.capturing.store(true, Ordering::SeqCst);
        recorder
    }

    #[test]
    fn records_after_successful_call() {
        let recorder = capturing();
        let calls = Mutex::new(Vec::new());

        let out = intercept(
            &recorder,
            ChunkType::Signal,
            || {
                calls.lock().push("execute");
                Ok(42u64)
            },
            |value, w| {
                calls.lock().push("encode");
                w.write_u64(*value);
                Ok(())
            },
        );

        assert_eq!(out, Ok(42));
        assert_eq!(*calls.lock(), vec!["execute", "encode"]);
        let chunks = recorder.chunks.lock();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Signal);
        assert_eq!(chunks[0].payload(), &42u64.to_le_bytes());
    }

    #[test]
    fn failed_call_is_not_recorded() {
        let recorder = capturing();
        let out: Result<(), _> = intercept(
            &recorder,
            ChunkType::CloseList,
            || Err(CaptureError::RealCallFailed("E_FAIL".into())),
            |_, _| panic!("encode must not run"),
        );
        assert_eq!(out, Err(CaptureError::RealCallFailed("E_FAIL".into())));
        assert!(recorder.chunks.lock().is_empty());
        assert!(recorder.is_capturing());
    }

    #[test]
    fn idle_recorder_skips_encoding() {
        let recorder = Recorder::default();
        let out = intercept(&recorder, ChunkType::SetMarker, || Ok(()), |_, _| panic!("encoded"));
        assert!(out.is_ok());
    }

    #[test]
    fn encode_failure_aborts_capture_but_keeps_result() {
        let recorder = capturing();
        let out = intercept(
            &recorder,
            ChunkType::ResourceBarrier,
            || Ok(7u32),
            |_, _| Err(CaptureError::UnregisteredType("Mystery")),
        );
        assert_eq!(out, Ok(7));
        assert!(!recorder.is_capturing());
        assert_eq!(
            *recorder.aborted.lock(),
            vec![CaptureError::UnregisteredType("Mystery")]
        );
    }

    #[test]
    fn record_failure_aborts_capture() {
        let too_large = CaptureError::PayloadTooLarge { size: 8, limit: 4 };
        let recorder = Recorder {
            record_error: Some(too_large.clone()),
            ..capturing()
        };
        let out = intercept(&recorder, ChunkType::SetMarker, || Ok(()), |_, _| Ok(()));
        assert!(out.is_ok());
        assert_eq!(*recorder.aborted.lock(), vec![too_large]);
    }

    #[test]
    fn record_after_scope_closed_is_dropped_quietly() {
        let recorder = Recorder {
            record_error: Some(CaptureError::NoScopeOpen),
            ..capturing()
        };
        let out = intercept(&recorder, ChunkType::SetMarker, || Ok(5u8), |_, _| Ok(()));
        assert_eq!(out, Ok(5));
        assert!(recorder.aborted.lock().is_empty());
        assert!(recorder.is_capturing());
    }

    #[test]
    fn retained_chunk_is_built_but_not_recorded() {
        let recorder = Recorder::default();
        let (value, chunk) = intercept_create(
            &recorder,
            ChunkType::CreateFence,
            || Ok(3u32),
            |v, w| {
                w.write_u32(*v);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(chunk.unwrap().payload(), &3u32.to_le_bytes());
        assert!(recorder.chunks.lock().is_empty());

        let recorder = capturing();
        let (_, chunk) =
            intercept_create(&recorder, ChunkType::CreateFence, || Ok(()), |_, _| Ok(())).unwrap();
        assert!(chunk.is_some());
        assert!(recorder.chunks.lock().is_empty());
    }

    #[test]
    fn retained_encode_failure_aborts_open_capture() {
        let recorder = capturing();
        let (value, chunk) = intercept_create(
            &recorder,
            ChunkType::CreateRootSig,
            || Ok(1u8),
            |_, _| Err(CaptureError::malformed("bad blob")),
        )
        .unwrap();
        assert_eq!(value, 1);
        assert!(chunk.is_none());
        assert!(!recorder.is_capturing());
    }
}
