//! Framing errors.

use thiserror::Error;

/// Failures while moving a frame over a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = crate::codec::MAX_FRAME_LEN)]
    FrameTooLarge(usize),
}

impl TransportError {
    /// Convert into the ring error seen by callers of `addr`.
    pub fn into_ring_error(self, addr: &str) -> corelib::Error {
        match self {
            TransportError::Io(err) => corelib::Error::unreachable(addr, err),
            TransportError::Codec(err) => {
                corelib::Error::ProtocolViolation(format!("{}: {}", addr, err))
            }
            TransportError::FrameTooLarge(len) => corelib::Error::ProtocolViolation(format!(
                "{}: oversized frame of {} bytes",
                addr, len
            )),
        }
    }
}
