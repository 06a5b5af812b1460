//! Wire layout of a finished capture scope.
//!
//! ```text
//! [ContextCaptureHeader][chunk]*[ContextCaptureFooter]
//! chunk = [type id: u32 LE][payload length: u32 LE][payload]
//! ```
//!
//! The length prefix lets a reader skip ids it does not know, so streams from
//! newer producers stay readable.

use crate::models::chunk::{Chunk, ChunkType};
use crate::models::error::CaptureError;

use super::serialiser::{PayloadReader, PayloadWriter};

/// Bytes in a chunk header: type id plus payload length.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Append one chunk record to `out`.
pub fn write_chunk(out: &mut Vec<u8>, chunk: &Chunk) {
    out.reserve(CHUNK_HEADER_SIZE + chunk.payload().len());
    out.extend_from_slice(&chunk.chunk_type().id().to_le_bytes());
    out.extend_from_slice(&chunk.payload_len().to_le_bytes());
    out.extend_from_slice(chunk.payload());
}

/// Begin marker for a scope.
pub fn begin_marker(frame: u32, api_name: &str) -> Result<Chunk, CaptureError> {
    let mut w = PayloadWriter::new();
    w.write_u32(frame);
    w.write_str(api_name);
    Chunk::new(ChunkType::ContextCaptureHeader, w.into_bytes())
}

/// End marker for a scope holding `content_chunks` chunks between the markers.
pub fn end_marker(content_chunks: u32) -> Result<Chunk, CaptureError> {
    let mut w = PayloadWriter::with_capacity(4);
    w.write_u32(content_chunks);
    Chunk::new(ChunkType::ContextCaptureFooter, w.into_bytes())
}

/// A chunk as read off the wire. The id is kept raw so unknown ids survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub type_id: u32,
    pub payload: Vec<u8>,
}

impl RawChunk {
    pub fn chunk_type(&self) -> Option<ChunkType> {
        ChunkType::from_id(self.type_id)
    }
}

/// Iterates the chunk records in a byte stream.
///
/// Stops after the first error.
pub struct ChunkStreamReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ChunkStreamReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    fn read_next(&mut self) -> Result<RawChunk, CaptureError> {
        let mut r = PayloadReader::new(&self.bytes[self.pos..]);
        r.require(CHUNK_HEADER_SIZE, "chunk header")?;
        let type_id = r.read_u32()?;
        let len = r.read_u32()? as usize;
        if len > r.remaining() {
            return Err(CaptureError::malformed(format!(
                "chunk {} at offset {} declares {} payload bytes, {} remain",
                type_id,
                self.pos,
                len,
                r.remaining()
            )));
        }
        let payload = r.take(len)?.to_vec();
        self.pos += CHUNK_HEADER_SIZE + len;
        Ok(RawChunk { type_id, payload })
    }
}

impl Iterator for ChunkStreamReader<'_> {
    type Item = Result<RawChunk, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }
        let item = self.read_next();
        self.failed = item.is_err();
        Some(item)
    }
}

/// A validated capture scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedStream {
    pub frame: u32,
    pub api_name: String,
    /// Content chunks in stream order, markers excluded.
    pub chunks: Vec<RawChunk>,
}

impl CapturedStream {
    /// Content chunks whose id this build knows.
    pub fn known_chunks(&self) -> impl Iterator<Item = (ChunkType, &RawChunk)> {
        self.chunks
            .iter()
            .filter_map(|c| c.chunk_type().map(|t| (t, c)))
    }
}

/// Parse and validate a complete scope: begin marker first, end marker last,
/// and a footer count that matches the chunks in between.
pub fn read_capture(bytes: &[u8]) -> Result<CapturedStream, CaptureError> {
    let mut records = ChunkStreamReader::new(bytes).collect::<Result<Vec<_>, _>>()?;

    let first = match records.first() {
        Some(first) if first.chunk_type() == Some(ChunkType::ContextCaptureHeader) => first,
        _ => return Err(CaptureError::malformed("stream does not start with a begin marker")),
    };
    let mut r = PayloadReader::new(&first.payload);
    let frame = r.read_u32()?;
    let api_name = r.read_string()?;
    r.finish()?;

    if records.len() < 2 {
        return Err(CaptureError::malformed("stream has no end marker"));
    }
    let last = records.remove(records.len() - 1);
    if last.chunk_type() != Some(ChunkType::ContextCaptureFooter) {
        return Err(CaptureError::malformed("stream does not end with an end marker"));
    }
    let mut r = PayloadReader::new(&last.payload);
    let declared = r.read_u32()?;
    r.finish()?;

    records.remove(0);
    if records.iter().any(|c| {
        matches!(
            c.chunk_type(),
            Some(ChunkType::ContextCaptureHeader | ChunkType::ContextCaptureFooter)
        )
    }) {
        return Err(CaptureError::malformed("marker chunk inside scope content"));
    }
    if declared as usize != records.len() {
        return Err(CaptureError::malformed(format!(
            "end marker declares {} chunks, stream holds {}",
            declared,
            records.len()
        )));
    }

    Ok(CapturedStream {
        frame,
        api_name,
        chunks: records,
    })
}
