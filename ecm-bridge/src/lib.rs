//! # ecm-bridge: ECM display bridge
//!
//! Drives the ECM parallel display link on a Linux board and paints the
//! decoded commands into a 16-bit framebuffer.
//!
//! ## Modes
//!
//! - **Local**: decode the handshake lines and draw on this board.
//! - **Relay**: decode the handshake lines and forward packets over TCP.
//! - **Serve**: receive relayed packets over TCP and draw them.

pub mod config;
pub mod service;
