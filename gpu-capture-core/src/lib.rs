//! # gpu-capture-core
//!
//! Platform-agnostic graphics API capture core library.
//!
//! Wraps real device objects so every state-mutating call is forwarded to the
//! real API and, while a capture scope is open, recorded as a typed chunk.
//! Platform backends implement the `RealDevice` family of traits and hand
//! the real device to `WrappedDevice`.
//!
//! ## Architecture
//!
//! ```text
//! gpu-capture-core (this crate)
//! ├── traits/       ← RealDevice, RealCommandList, CaptureSink, ChunkRecorder, SoftRefOwner
//! ├── models/       ← CaptureError, ChunkType, Chunk, parameter descriptors, CaptureState
//! ├── processing/   ← PayloadWriter/Reader, Marshal, MarshalRegistry, chunk stream framing
//! ├── session/      ← WrappedDevice, wrapped children, RefCounter, ChunkStreamWriter
//! └── storage/      ← FileCaptureSink, MemorySink, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::capture_result::{CaptureMetadata, CaptureResult, FinishedCapture};
pub use models::chunk::{Chunk, ChunkType, FIRST_CHUNK_ID};
pub use models::config::CaptureConfiguration;
pub use models::descriptors::ResourceId;
pub use models::diagnostics::CaptureDiagnostics;
pub use models::error::CaptureError;
pub use models::state::CaptureState;
pub use processing::chunk_stream::{read_capture, CapturedStream, ChunkStreamReader};
pub use processing::marshal::Marshal;
pub use processing::registry::MarshalRegistry;
pub use processing::serialiser::{PayloadReader, PayloadWriter};
pub use session::command_list::WrappedCommandList;
pub use session::command_queue::WrappedCommandQueue;
pub use session::device::WrappedDevice;
pub use session::objects::{DeviceChild, ObjectKind, QueriedObject, WrappedObject};
pub use session::ref_counter::RefCounter;
pub use session::scope::ChunkStreamWriter;
pub use storage::file_sink::FileCaptureSink;
pub use storage::memory_sink::MemorySink;
pub use traits::capture_sink::CaptureSink;
pub use traits::chunk_recorder::ChunkRecorder;
pub use traits::real_api::{
    HandleTable, QueryResult, RealCommandList, RealCommandQueue, RealDevice, RealObject,
};
pub use traits::soft_ref::SoftRefOwner;
