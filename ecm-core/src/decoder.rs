//! Receiver side of the parallel-port handshake.
//!
//! The transmitter is the master: it pulls start low, then for every
//! nibble raises the clock, waits for our ack pulse and drops the clock
//! again. Two nibbles make a byte (low nibble first), seven bytes make
//! a packet.
//!
//! ```text
//!  Idle ──start low──► AwaitNibble(0,0) ─► AwaitNibble(0,1) ─► … ─► AwaitNibble(6,1) ─► Done
//!    ▲                        │ cancelled                                                │
//!    └────────────────────────┴──────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no error detection. A missed edge shifts every later nibble
//! and the packet is built from whatever arrives; the next transaction
//! starts clean.
//!
//! Every wait polls the [`CancellationToken`] and yields to the runtime,
//! so a stuck transmitter never blocks shutdown.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::assembler::PacketAssembler;
use crate::error::EcmError;
use crate::lines::HandshakeLines;
use crate::packet::CommandPacket;

// ── DecoderTiming ────────────────────────────────────────────────

/// Delays applied around each nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderTiming {
    /// Settling time between the clock edge and sampling the data lines.
    pub settle: Duration,
    /// How long the ack line is held high.
    pub ack_hold: Duration,
    /// Sleep between start-line polls while idle.
    pub idle_poll: Duration,
}

impl Default for DecoderTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_micros(10),
            ack_hold: Duration::from_micros(10),
            idle_poll: Duration::from_millis(1),
        }
    }
}

impl DecoderTiming {
    /// No delays at all; for simulated lines.
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            ack_hold: Duration::ZERO,
            idle_poll: Duration::ZERO,
        }
    }
}

// ── DecoderPhase ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderPhase {
    /// Waiting for the start line to go low.
    #[default]
    Idle,
    /// Inside a transaction, waiting on the clock for this nibble.
    AwaitNibble { byte: u8, nibble: u8 },
    /// The last transaction produced a packet.
    Done,
}

impl std::fmt::Display for DecoderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AwaitNibble { byte, nibble } => write!(f, "AwaitNibble({byte}, {nibble})"),
            Self::Done => write!(f, "Done"),
        }
    }
}

// ── HandshakeDecoder ─────────────────────────────────────────────

pub struct HandshakeDecoder<L> {
    lines: L,
    timing: DecoderTiming,
    assembler: PacketAssembler,
    phase: DecoderPhase,
}

impl<L: HandshakeLines> HandshakeDecoder<L> {
    pub fn new(lines: L, timing: DecoderTiming) -> Self {
        Self {
            lines,
            timing,
            assembler: PacketAssembler::new(),
            phase: DecoderPhase::Idle,
        }
    }

    pub fn phase(&self) -> DecoderPhase {
        self.phase
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn into_lines(self) -> L {
        self.lines
    }

    /// Run one transaction.
    ///
    /// Returns `Ok(None)` when `cancel` fires, whether idle or halfway
    /// through a packet; the partial packet is discarded.
    pub async fn next_packet(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CommandPacket>, EcmError> {
        self.phase = DecoderPhase::Idle;
        let result = self.transaction(cancel).await;
        match &result {
            Ok(Some(_)) => self.phase = DecoderPhase::Done,
            _ => {
                if !self.assembler.is_empty() {
                    debug!(
                        bytes = self.assembler.len(),
                        phase = %self.phase,
                        "transaction abandoned"
                    );
                }
                self.assembler.reset();
            }
        }
        result
    }

    async fn transaction(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CommandPacket>, EcmError> {
        if !self.wait_for_start(cancel).await? {
            return Ok(None);
        }
        debug!("transaction started");

        loop {
            let byte = self.assembler.len() as u8;
            let Some(value) = self.read_byte(byte, cancel).await? else {
                return Ok(None);
            };
            debug!(byte, value = format_args!("{value:#04x}"), "byte decoded");
            if let Some(packet) = self.assembler.push(value) {
                debug!(?packet, "transaction completed");
                return Ok(Some(packet));
            }
        }
    }

    /// Two handshaked nibbles, low nibble first.
    async fn read_byte(
        &mut self,
        byte: u8,
        cancel: &CancellationToken,
    ) -> Result<Option<u8>, EcmError> {
        let mut value = 0u8;
        for nibble in 0..2u8 {
            self.phase = DecoderPhase::AwaitNibble { byte, nibble };

            if !self.wait_for_clock(true, cancel).await? {
                return Ok(None);
            }
            pause(self.timing.settle);

            self.lines.set_status(byte)?;
            let bits = self.lines.read_nibble()? & 0x0F;
            value |= bits << (nibble * 4);
            trace!(byte, nibble, bits, "nibble captured");

            self.lines.set_ack(true)?;
            pause(self.timing.ack_hold);
            self.lines.set_ack(false)?;

            if !self.wait_for_clock(false, cancel).await? {
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Returns `false` if cancelled before the start line went low.
    async fn wait_for_start(&mut self, cancel: &CancellationToken) -> Result<bool, EcmError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            if self.lines.start_is_low()? {
                return Ok(true);
            }
            if self.timing.idle_poll.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(false),
                    _ = tokio::time::sleep(self.timing.idle_poll) => {}
                }
            }
        }
    }

    /// Busy-wait for the clock to reach `high`. Returns `false` if
    /// cancelled first.
    async fn wait_for_clock(
        &mut self,
        high: bool,
        cancel: &CancellationToken,
    ) -> Result<bool, EcmError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            if self.lines.clock_is_high()? == high {
                return Ok(true);
            }
            tokio::task::yield_now().await;
        }
    }
}

/// Sub-millisecond hold; tokio timers only resolve whole milliseconds.
fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{DisplayCommand, interpret};
    use crate::sim::ScriptedTransmitter;

    fn decoder(tx: ScriptedTransmitter) -> HandshakeDecoder<ScriptedTransmitter> {
        HandshakeDecoder::new(tx, DecoderTiming::immediate())
    }

    /// Cancels the token after a fixed number of clock polls.
    struct CancelAfter {
        inner: ScriptedTransmitter,
        polls: usize,
        cancel: CancellationToken,
    }

    impl HandshakeLines for CancelAfter {
        fn start_is_low(&mut self) -> Result<bool, EcmError> {
            self.inner.start_is_low()
        }

        fn clock_is_high(&mut self) -> Result<bool, EcmError> {
            if self.inner.clock_polls() >= self.polls {
                self.cancel.cancel();
            }
            self.inner.clock_is_high()
        }

        fn read_nibble(&mut self) -> Result<u8, EcmError> {
            self.inner.read_nibble()
        }

        fn set_ack(&mut self, high: bool) -> Result<(), EcmError> {
            self.inner.set_ack(high)
        }

        fn set_status(&mut self, index: u8) -> Result<(), EcmError> {
            self.inner.set_status(index)
        }
    }

    /// Data lines that fail once `after` nibbles have been presented.
    struct FailingData {
        inner: ScriptedTransmitter,
        after: usize,
    }

    impl HandshakeLines for FailingData {
        fn start_is_low(&mut self) -> Result<bool, EcmError> {
            self.inner.start_is_low()
        }

        fn clock_is_high(&mut self) -> Result<bool, EcmError> {
            self.inner.clock_is_high()
        }

        fn read_nibble(&mut self) -> Result<u8, EcmError> {
            if self.inner.sent() > self.after {
                return Err(EcmError::Line {
                    line: "data",
                    reason: "device removed".into(),
                });
            }
            self.inner.read_nibble()
        }

        fn set_ack(&mut self, high: bool) -> Result<(), EcmError> {
            self.inner.set_ack(high)
        }

        fn set_status(&mut self, index: u8) -> Result<(), EcmError> {
            self.inner.set_status(index)
        }
    }

    #[tokio::test]
    async fn decodes_set_pixel_packet() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([1, 10, 0, 20, 0, 0, 0xF8]);
        let mut dec = decoder(tx);

        let cancel = CancellationToken::new();
        let pkt = dec.next_packet(&cancel).await.unwrap().unwrap();

        assert_eq!(pkt.to_bytes(), [1, 10, 0, 20, 0, 0, 0xF8]);
        assert_eq!(
            interpret(&pkt),
            DisplayCommand::SetPixel {
                x: 10,
                y: 20,
                colour: 0xF800
            }
        );
        assert_eq!(dec.phase(), DecoderPhase::Done);
    }

    #[tokio::test]
    async fn high_nibble_lands_in_upper_bits() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([0xA5, 0x0F, 0xF0, 0x81, 0x18, 0xFF, 0x00]);
        let mut dec = decoder(tx);

        let pkt = dec
            .next_packet(&CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pkt.to_bytes(), [0xA5, 0x0F, 0xF0, 0x81, 0x18, 0xFF, 0x00]);
    }

    #[tokio::test]
    async fn acks_every_nibble_after_clock_rises() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([0; 7]);
        let mut dec = decoder(tx);
        dec.next_packet(&CancellationToken::new()).await.unwrap();

        let tx = dec.into_lines();
        assert_eq!(tx.ack_pulses(), 14);
        assert_eq!(tx.early_acks(), 0);
    }

    #[tokio::test]
    async fn status_lines_repeat_byte_index_per_nibble() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([0; 7]);
        let mut dec = decoder(tx);
        dec.next_packet(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            dec.lines().status_history(),
            &[0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6]
        );
    }

    #[tokio::test]
    async fn back_to_back_transactions() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([2, 0, 0, 0, 0, 0, 0])
            .queue_packet([6, 0, 0, 0, 0, 0x1F, 0x00]);
        let mut dec = decoder(tx);
        let cancel = CancellationToken::new();

        let first = dec.next_packet(&cancel).await.unwrap().unwrap();
        let second = dec.next_packet(&cancel).await.unwrap().unwrap();
        assert_eq!(interpret(&first), DisplayCommand::FillRed);
        assert_eq!(
            interpret(&second),
            DisplayCommand::FillColour { colour: 0x001F }
        );
    }

    #[tokio::test]
    async fn cancelled_while_idle() {
        let mut dec = decoder(ScriptedTransmitter::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(dec.next_packet(&cancel).await.unwrap().is_none());
        assert_eq!(dec.phase(), DecoderPhase::Idle);
    }

    #[tokio::test]
    async fn cancel_aborts_stalled_transaction() {
        let mut inner = ScriptedTransmitter::new();
        inner.queue_packet([1, 2, 3, 4, 5, 6, 7]).stall_after(5);
        let cancel = CancellationToken::new();
        let lines = CancelAfter {
            inner,
            polls: 50,
            cancel: cancel.clone(),
        };
        let mut dec = HandshakeDecoder::new(lines, DecoderTiming::immediate());

        let result = dec.next_packet(&cancel).await.unwrap();
        assert!(result.is_none());
        assert_eq!(dec.phase(), DecoderPhase::AwaitNibble { byte: 2, nibble: 1 });
        assert_eq!(dec.lines().inner.sent(), 5);
        assert!(dec.assembler.is_empty());
    }

    #[tokio::test]
    async fn cancel_from_another_task_unblocks_clock_wait() {
        let mut tx = ScriptedTransmitter::new();
        tx.queue_packet([0; 7]).stall_after(1);
        let mut dec = decoder(tx);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), dec.next_packet(&cancel))
            .await
            .expect("decoder did not observe cancellation");
        assert!(result.unwrap().is_none());
        assert!(matches!(dec.phase(), DecoderPhase::AwaitNibble { .. }));
    }

    #[tokio::test]
    async fn line_failure_propagates_and_discards_partial() {
        let mut inner = ScriptedTransmitter::new();
        inner.queue_packet([1, 2, 3, 4, 5, 6, 7]);
        let mut dec = HandshakeDecoder::new(
            FailingData { inner, after: 4 },
            DecoderTiming::immediate(),
        );

        let err = dec.next_packet(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EcmError::Line { line: "data", .. }));
        assert!(!err.is_transient());
        assert_eq!(dec.phase(), DecoderPhase::AwaitNibble { byte: 2, nibble: 0 });
        assert!(dec.assembler.is_empty());
    }

    #[test]
    fn default_timing_matches_wire_constants() {
        let t = DecoderTiming::default();
        assert_eq!(t.settle, Duration::from_micros(10));
        assert_eq!(t.ack_hold, Duration::from_micros(10));
        assert_eq!(t.idle_poll, Duration::from_millis(1));
    }
}
