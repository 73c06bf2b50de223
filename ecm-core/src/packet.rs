//! The fixed 7-byte command packet shared by the parallel link and the
//! TCP relay.
//!
//! ```text
//! offset  field    type
//! 0       type     u8
//! 1..3    x        u16 LE
//! 3..5    y        u16 LE
//! 5..7    colour   u16 LE (RGB565)
//! ```
//!
//! There is no length field and no checksum; both ends agree on
//! [`PACKET_SIZE`] out of band.

use std::fmt;

use crate::error::EcmError;

/// Size of every command packet on the wire.
pub const PACKET_SIZE: usize = 7;

pub type PacketBytes = [u8; PACKET_SIZE];

/// One complete, immutable command packet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandPacket {
    bytes: PacketBytes,
}

impl CommandPacket {
    pub const fn from_bytes(bytes: PacketBytes) -> Self {
        Self { bytes }
    }

    /// Build a packet from its decoded fields.
    pub fn from_fields(kind: u8, x: u16, y: u16, colour: u16) -> Self {
        let mut bytes: PacketBytes = [0; PACKET_SIZE];
        bytes[0] = kind;
        bytes[1..3].copy_from_slice(&x.to_le_bytes());
        bytes[3..5].copy_from_slice(&y.to_le_bytes());
        bytes[5..7].copy_from_slice(&colour.to_le_bytes());
        Self { bytes }
    }

    pub fn to_bytes(&self) -> PacketBytes {
        self.bytes
    }

    pub fn as_bytes(&self) -> &PacketBytes {
        &self.bytes
    }

    /// The raw command selector byte.
    pub fn kind(&self) -> u8 {
        self.bytes[0]
    }

    pub fn x(&self) -> u16 {
        u16::from_le_bytes([self.bytes[1], self.bytes[2]])
    }

    pub fn y(&self) -> u16 {
        u16::from_le_bytes([self.bytes[3], self.bytes[4]])
    }

    pub fn colour(&self) -> u16 {
        u16::from_le_bytes([self.bytes[5], self.bytes[6]])
    }
}

impl From<PacketBytes> for CommandPacket {
    fn from(bytes: PacketBytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<&[u8]> for CommandPacket {
    type Error = EcmError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: PacketBytes = bytes
            .try_into()
            .map_err(|_| EcmError::InvalidPacketLength {
                expected: PACKET_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPacket")
            .field("kind", &self.kind())
            .field("x", &self.x())
            .field("y", &self.y())
            .field("colour", &format_args!("{:#06x}", self.colour()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_little_endian() {
        let pkt = CommandPacket::from_bytes([1, 10, 0, 20, 0, 0x00, 0xF8]);
        assert_eq!(pkt.kind(), 1);
        assert_eq!(pkt.x(), 10);
        assert_eq!(pkt.y(), 20);
        assert_eq!(pkt.colour(), 0xF800);
    }

    #[test]
    fn from_fields_layout() {
        let pkt = CommandPacket::from_fields(6, 0x0102, 0x0304, 0x07E0);
        assert_eq!(pkt.to_bytes(), [6, 0x02, 0x01, 0x04, 0x03, 0xE0, 0x07]);
    }

    #[test]
    fn wrong_length_rejected() {
        let short: &[u8] = &[1, 2, 3];
        let err = CommandPacket::try_from(short).unwrap_err();
        assert!(matches!(
            err,
            EcmError::InvalidPacketLength {
                expected: 7,
                actual: 3
            }
        ));

        let long: &[u8] = &[0; 8];
        assert!(CommandPacket::try_from(long).is_err());
    }

    #[test]
    fn debug_shows_hex_colour() {
        let pkt = CommandPacket::from_fields(6, 0, 0, 0x001F);
        assert!(format!("{pkt:?}").contains("0x001f"));
    }
}
