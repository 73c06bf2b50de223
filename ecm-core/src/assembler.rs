//! Collects decoded bytes into command packets.

use crate::packet::{CommandPacket, PACKET_SIZE, PacketBytes};

/// A 7-slot buffer filled in byte order by the decoder.
///
/// Once slot 6 is written the buffer yields a [`CommandPacket`] and
/// resets, so nothing from one transaction leaks into the next.
#[derive(Debug, Default, Clone)]
pub struct PacketAssembler {
    slots: PacketBytes,
    filled: usize,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes collected for the in-progress packet.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Append the next byte; returns the packet when it is complete.
    pub fn push(&mut self, byte: u8) -> Option<CommandPacket> {
        self.slots[self.filled] = byte;
        self.filled += 1;
        if self.filled < PACKET_SIZE {
            return None;
        }
        let packet = CommandPacket::from_bytes(self.slots);
        self.reset();
        Some(packet)
    }

    /// Discard the partial packet of an abandoned transaction.
    pub fn reset(&mut self) {
        self.slots = [0; PACKET_SIZE];
        self.filled = 0;
    }
}

/// Feed `bytes` through a fresh assembler and return the first packet,
/// or `None` if fewer than [`PACKET_SIZE`] bytes were supplied.
pub fn assemble(bytes: &[u8]) -> Option<CommandPacket> {
    let mut assembler = PacketAssembler::new();
    bytes.iter().find_map(|&b| assembler.push(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::interpret;
    use proptest::prelude::*;

    #[test]
    fn completes_on_seventh_byte() {
        let mut asm = PacketAssembler::new();
        for b in 0..6u8 {
            assert!(asm.push(b).is_none());
            assert_eq!(asm.len(), b as usize + 1);
        }
        let pkt = asm.push(6).expect("seventh byte completes the packet");
        assert_eq!(pkt.to_bytes(), [0, 1, 2, 3, 4, 5, 6]);
        assert!(asm.is_empty());
    }

    #[test]
    fn reset_discards_partial() {
        let mut asm = PacketAssembler::new();
        asm.push(0xAA);
        asm.push(0xBB);
        asm.reset();
        assert!(asm.is_empty());

        let pkt = (0..7u8).find_map(|b| asm.push(b + 1)).unwrap();
        assert_eq!(pkt.to_bytes(), [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn short_input_yields_nothing() {
        assert!(assemble(&[1, 2, 3, 4, 5, 6]).is_none());
        assert!(assemble(&[]).is_none());
    }

    proptest! {
        #[test]
        fn assemble_preserves_interpretation(bytes in proptest::array::uniform7(any::<u8>())) {
            let assembled = assemble(&bytes).unwrap();
            prop_assert_eq!(interpret(&assembled), interpret(&CommandPacket::from_bytes(bytes)));
        }

        #[test]
        fn fields_survive_reencoding(kind in any::<u8>(), x in any::<u16>(), y in any::<u16>(), colour in any::<u16>()) {
            let pkt = CommandPacket::from_fields(kind, x, y, colour);
            let back = assemble(pkt.as_bytes()).unwrap();
            prop_assert_eq!(back.kind(), kind);
            prop_assert_eq!(back.x(), x);
            prop_assert_eq!(back.y(), y);
            prop_assert_eq!(back.colour(), colour);
        }
    }
}
