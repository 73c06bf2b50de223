//! Packet type codes and the display commands they decode to.
//!
//! Uses proper enums with `TryFrom`. Unknown type bytes become
//! [`DisplayCommand::Unknown`], never a panic.

use std::fmt;

use crate::error::EcmError;
use crate::packet::CommandPacket;

// ── RGB565 constants ─────────────────────────────────────────────

pub const BLANK_RGB565: u16 = 0x0000;
pub const RED_RGB565: u16 = 0xF800;
pub const GREEN_RGB565: u16 = 0x07E0;
pub const BLUE_RGB565: u16 = 0x001F;
pub const WHITE_RGB565: u16 = 0xFFFF;

// ── PacketType ───────────────────────────────────────────────────

/// The command selector carried in byte 0 of every packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    FillBlank = 0,
    SetPixel = 1,
    FillRed = 2,
    FillGreen = 3,
    FillBlue = 4,
    FillWhite = 5,
    FillColour = 6,
    /// Reserved; defined on the wire but not implemented.
    Resolution = 7,
}

impl TryFrom<u8> for PacketType {
    type Error = EcmError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::FillBlank),
            1 => Ok(PacketType::SetPixel),
            2 => Ok(PacketType::FillRed),
            3 => Ok(PacketType::FillGreen),
            4 => Ok(PacketType::FillBlue),
            5 => Ok(PacketType::FillWhite),
            6 => Ok(PacketType::FillColour),
            7 => Ok(PacketType::Resolution),
            _ => Err(EcmError::UnknownVariant {
                type_name: "PacketType",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── DisplayCommand ───────────────────────────────────────────────

/// A decoded packet, ready for the renderer.
///
/// Fields are not range-checked here; `SetPixel` bounds are the
/// renderer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    FillBlank,
    SetPixel { x: u16, y: u16, colour: u16 },
    FillRed,
    FillGreen,
    FillBlue,
    FillWhite,
    FillColour { colour: u16 },
    Resolution,
    /// Any undefined type byte.
    Unknown(u8),
}

impl DisplayCommand {
    /// The colour a fill command paints, or `None` for non-fill commands.
    pub fn fill_colour(&self) -> Option<u16> {
        match *self {
            DisplayCommand::FillBlank => Some(BLANK_RGB565),
            DisplayCommand::FillRed => Some(RED_RGB565),
            DisplayCommand::FillGreen => Some(GREEN_RGB565),
            DisplayCommand::FillBlue => Some(BLUE_RGB565),
            DisplayCommand::FillWhite => Some(WHITE_RGB565),
            DisplayCommand::FillColour { colour } => Some(colour),
            DisplayCommand::SetPixel { .. }
            | DisplayCommand::Resolution
            | DisplayCommand::Unknown(_) => None,
        }
    }

    /// Returns `true` for commands that have no rendering side effect.
    pub fn is_noop(&self) -> bool {
        matches!(self, DisplayCommand::Resolution | DisplayCommand::Unknown(_))
    }
}

/// Decode a packet into the command it selects.
pub fn interpret(packet: &CommandPacket) -> DisplayCommand {
    match PacketType::try_from(packet.kind()) {
        Ok(PacketType::FillBlank) => DisplayCommand::FillBlank,
        Ok(PacketType::SetPixel) => DisplayCommand::SetPixel {
            x: packet.x(),
            y: packet.y(),
            colour: packet.colour(),
        },
        Ok(PacketType::FillRed) => DisplayCommand::FillRed,
        Ok(PacketType::FillGreen) => DisplayCommand::FillGreen,
        Ok(PacketType::FillBlue) => DisplayCommand::FillBlue,
        Ok(PacketType::FillWhite) => DisplayCommand::FillWhite,
        Ok(PacketType::FillColour) => DisplayCommand::FillColour {
            colour: packet.colour(),
        },
        Ok(PacketType::Resolution) => DisplayCommand::Resolution,
        Err(_) => DisplayCommand::Unknown(packet.kind()),
    }
}

impl From<&CommandPacket> for DisplayCommand {
    fn from(packet: &CommandPacket) -> Self {
        interpret(packet)
    }
}
