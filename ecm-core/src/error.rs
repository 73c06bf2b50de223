//! Domain-specific error types for the ECM bridge.
//!
//! All fallible operations return `Result<T, EcmError>`.
//! Backend errors raised while opening devices are fatal to the caller;
//! transport errors are per-transaction and meant to be logged and dropped.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the ECM bridge.
#[derive(Debug, Error)]
pub enum EcmError {
    // ── Packet Errors ────────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A buffer handed to the packet parser was not exactly 7 bytes.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    /// The peer disconnected with a partial packet still buffered.
    #[error("incomplete packet: {received} byte(s) left at end of stream")]
    IncompletePacket { received: usize },

    // ── Backend Errors ───────────────────────────────────────────
    /// The GPIO chip or one of its lines could not be opened or requested.
    #[error("gpio error: {0}")]
    Gpio(String),

    /// Reading or driving an already-requested line failed.
    #[error("line {line} failed: {reason}")]
    Line { line: &'static str, reason: String },

    /// The framebuffer device could not be opened, queried or mapped.
    #[error("framebuffer error: {0}")]
    Framebuffer(String),

    /// The framebuffer is not configured for 16-bit RGB565.
    #[error("unsupported pixel format: {bits_per_pixel} bits per pixel (need 16)")]
    UnsupportedPixelFormat { bits_per_pixel: u32 },

    /// Surface geometry and backing memory disagree.
    #[error("invalid surface geometry: {0}")]
    InvalidGeometry(String),

    /// Startup configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Requested deployment has no backend on this platform.
    #[error("unsupported platform: {0}")]
    Unsupported(&'static str),
}

impl EcmError {
    /// Whether the error is scoped to one transaction or connection,
    /// as opposed to a backend failure that should stop the process.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EcmError::Connection(_)
                | EcmError::Timeout(_)
                | EcmError::IncompletePacket { .. }
                | EcmError::InvalidPacketLength { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = EcmError::InvalidPacketLength {
            expected: 7,
            actual: 3,
        };
        assert!(e.to_string().contains('7'));
        assert!(e.to_string().contains('3'));

        let e = EcmError::UnsupportedPixelFormat { bits_per_pixel: 32 };
        assert!(e.to_string().contains("32"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: EcmError = io_err.into();
        assert!(matches!(e, EcmError::Connection(_)));
        assert!(e.is_transient());
    }

    #[test]
    fn backend_errors_are_fatal() {
        assert!(!EcmError::Gpio("no chip".into()).is_transient());
        assert!(!EcmError::Framebuffer("no fb".into()).is_transient());
    }
}
