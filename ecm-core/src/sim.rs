//! In-memory transmitter for exercising the decoder without hardware.
//!
//! [`ScriptedTransmitter`] plays the master side of the handshake: it
//! holds start low while it has bytes queued, presents one nibble per
//! rising clock edge, and only drops the clock after it has seen the
//! receiver's ack pulse. Every line access is recorded so tests can
//! check ordering.

use std::collections::VecDeque;

use crate::error::EcmError;
use crate::lines::HandshakeLines;
use crate::packet::PacketBytes;

#[derive(Debug, Default)]
pub struct ScriptedTransmitter {
    nibbles: VecDeque<u8>,
    data: u8,
    clock: bool,
    ack: bool,
    acked: bool,
    stall_after: Option<usize>,
    sent: usize,
    clock_polls: usize,
    status_history: Vec<u8>,
    ack_pulses: usize,
    early_acks: usize,
}

impl ScriptedTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a packet, low nibble of each byte first.
    pub fn queue_packet(&mut self, bytes: PacketBytes) -> &mut Self {
        for b in bytes {
            self.nibbles.push_back(b & 0x0F);
            self.nibbles.push_back(b >> 4);
        }
        self
    }

    /// Keep the clock low forever once `nibbles` nibbles have been sent,
    /// as a transmitter that lost power mid-transaction would.
    pub fn stall_after(&mut self, nibbles: usize) -> &mut Self {
        self.stall_after = Some(nibbles);
        self
    }

    /// Nibbles presented so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn clock_polls(&self) -> usize {
        self.clock_polls
    }

    /// Byte index seen on the status lines at each nibble.
    pub fn status_history(&self) -> &[u8] {
        &self.status_history
    }

    pub fn ack_pulses(&self) -> usize {
        self.ack_pulses
    }

    /// Acks raised while the clock was low, i.e. before a nibble was
    /// presented.
    pub fn early_acks(&self) -> usize {
        self.early_acks
    }

    fn stalled(&self) -> bool {
        self.stall_after.is_some_and(|n| self.sent >= n)
    }
}

impl HandshakeLines for ScriptedTransmitter {
    fn start_is_low(&mut self) -> Result<bool, EcmError> {
        Ok(!self.nibbles.is_empty() || self.clock)
    }

    fn clock_is_high(&mut self) -> Result<bool, EcmError> {
        self.clock_polls += 1;
        if self.clock {
            if self.acked {
                self.clock = false;
                self.acked = false;
            }
        } else if !self.stalled() {
            if let Some(nibble) = self.nibbles.pop_front() {
                self.data = nibble;
                self.clock = true;
                self.sent += 1;
            }
        }
        Ok(self.clock)
    }

    fn read_nibble(&mut self) -> Result<u8, EcmError> {
        Ok(self.data)
    }

    fn set_ack(&mut self, high: bool) -> Result<(), EcmError> {
        if high && !self.ack {
            self.ack_pulses += 1;
            if self.clock {
                self.acked = true;
            } else {
                self.early_acks += 1;
            }
        }
        self.ack = high;
        Ok(())
    }

    fn set_status(&mut self, index: u8) -> Result<(), EcmError> {
        self.status_history.push(index & 0x07);
        Ok(())
    }
}
