use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the capture layer.
///
/// None of these are ever surfaced in place of a real API result: a failure
/// that happens while recording aborts the capture, not the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("a capture scope is already open")]
    ScopeAlreadyOpen,

    #[error("no capture scope is open")]
    NoScopeOpen,

    #[error("chunk type id {0} cannot be emitted")]
    InvalidChunkType(u32),

    #[error("payload of {size} bytes exceeds the {limit} byte chunk limit")]
    PayloadTooLarge { size: usize, limit: u32 },

    #[error("parameter type is not registered for marshaling: {0}")]
    UnregisteredType(&'static str),

    #[error("object has already been destroyed")]
    ObjectDestroyed,

    #[error("capability not supported: {0}")]
    CapabilityUnsupported(Uuid),

    #[error("real API call failed: {0}")]
    RealCallFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// Errors caused by the calling layer misusing the scope protocol.
    ///
    /// A scope that saw one of these cannot be replayed and is discarded.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ScopeAlreadyOpen | Self::NoScopeOpen | Self::InvalidChunkType(_)
        )
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors() {
        assert!(CaptureError::ScopeAlreadyOpen.is_protocol_error());
        assert!(CaptureError::NoScopeOpen.is_protocol_error());
        assert!(CaptureError::InvalidChunkType(1038).is_protocol_error());
        assert!(!CaptureError::malformed("short").is_protocol_error());
        assert!(!CaptureError::ObjectDestroyed.is_protocol_error());
    }

    #[test]
    fn display_messages() {
        let err = CaptureError::PayloadTooLarge { size: 10, limit: 4 };
        assert_eq!(err.to_string(), "payload of 10 bytes exceeds the 4 byte chunk limit");
        assert_eq!(
            CaptureError::malformed("truncated u32").to_string(),
            "malformed payload: truncated u32"
        );
    }
}
