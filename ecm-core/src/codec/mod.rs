//! Fixed-size framing of command packets for `tokio_util` streams.
//!
//! The stream is cut into 7-byte records with no header. Bytes that
//! arrive in several reads are buffered until a record is complete;
//! whatever is left when the peer disconnects is reported as
//! [`EcmError::IncompletePacket`] and never decoded.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::EcmError;
use crate::packet::{CommandPacket, PACKET_SIZE};

#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = CommandPacket;
    type Error = EcmError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_SIZE {
            src.reserve(PACKET_SIZE - src.len());
            return Ok(None);
        }
        let frame = src.split_to(PACKET_SIZE);
        CommandPacket::try_from(&frame[..]).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => {
                let received = src.len();
                src.advance(received);
                Err(EcmError::IncompletePacket { received })
            }
        }
    }
}

impl Encoder<CommandPacket> for PacketCodec {
    type Error = EcmError;

    fn encode(&mut self, item: CommandPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
