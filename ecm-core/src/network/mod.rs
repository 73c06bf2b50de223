//! TCP relay carrying raw command packets between a line decoder and a
//! remote renderer.
//!
//! ```text
//! relay (sender)                         serve (receiver)
//! ┌──────────────┐   one TCP connection  ┌──────────────────┐
//! │ PacketSender │ ───── per packet ───► │ PacketReceiver   │
//! └──────────────┘      7 bytes, close   │  accepts 1 at a  │
//!                                        │  time, 7-byte    │
//!                                        │  records until   │
//!                                        │  disconnect      │
//!                                        └──────────────────┘
//! ```

pub mod receiver;
pub mod sender;

pub use receiver::{PacketReceiver, serve_connection};
pub use sender::PacketSender;

/// Host and port of a relay peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        let ep = Endpoint::new("127.0.0.1", 5000);
        assert_eq!(ep.to_string(), "127.0.0.1:5000");
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 5000);
    }
}
