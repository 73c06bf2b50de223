//! # ecm-core
//!
//! Core library for the ECM display bridge: a legacy machine drives a
//! 4-bit parallel handshake, we rebuild 7-byte command packets from the
//! line transitions and paint them into an RGB565 framebuffer, either
//! locally or after relaying them over TCP.
//!
//! This crate contains:
//! - **Packet**: `CommandPacket`, the fixed 7-byte wire record
//! - **Command**: `PacketType` codes and the `DisplayCommand` interpreter
//! - **Lines / Decoder**: the `HandshakeLines` seam and `HandshakeDecoder`
//! - **Assembler**: `PacketAssembler` collecting decoded bytes
//! - **Surface / Render**: `FrameSurface` geometry and the `Renderer`
//! - **Codec / Network**: `PacketCodec`, `PacketSender`, `PacketReceiver`
//! - **Backend**: Linux GPIO and framebuffer devices
//! - **Error**: `EcmError`, the `thiserror`-based error type

pub mod assembler;
pub mod backend;
pub mod codec;
pub mod command;
pub mod decoder;
pub mod error;
pub mod lines;
pub mod network;
pub mod packet;
pub mod render;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod surface;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use assembler::{PacketAssembler, assemble};
pub use codec::PacketCodec;
pub use command::{DisplayCommand, PacketType, interpret};
pub use decoder::{DecoderPhase, DecoderTiming, HandshakeDecoder};
pub use error::EcmError;
pub use lines::{HandshakeLines, LineMap, PinBank};
pub use network::{Endpoint, PacketReceiver, PacketSender};
pub use packet::{CommandPacket, PACKET_SIZE};
pub use render::{FillMode, RenderOutcome, Renderer};
pub use surface::{FrameSurface, Geometry};

/// Re-exported so callers share one cancellation type with the decoder.
pub use tokio_util::sync::CancellationToken;
