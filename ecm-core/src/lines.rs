//! The digital line set driven by the handshake decoder.
//!
//! ```text
//! data[0..4]   in   nibble bits, data[0] = LSB
//! clock        in   rising edge = nibble ready
//! start        in   low = transaction in progress
//! ack          out  pulsed once per captured nibble
//! status[0..3] out  current byte index, status[0] = LSB
//! ```
//!
//! The decoder only sees [`HandshakeLines`]. [`PinBank`] implements it
//! over any `embedded-hal` pins, which is how the Linux GPIO backend and
//! the tests plug in.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::EcmError;

/// Number of data lines carrying one nibble.
pub const DATA_LINES: usize = 4;

/// Number of status lines broadcasting the byte index.
pub const STATUS_LINES: usize = 3;

/// Line-level operations the decoder needs from a backend.
pub trait HandshakeLines {
    /// `true` while the start line is held low by the transmitter.
    fn start_is_low(&mut self) -> Result<bool, EcmError>;

    fn clock_is_high(&mut self) -> Result<bool, EcmError>;

    /// Sample the data lines as a 4-bit value, bit `i` from `data[i]`.
    fn read_nibble(&mut self) -> Result<u8, EcmError>;

    fn set_ack(&mut self, high: bool) -> Result<(), EcmError>;

    /// Drive the status lines with the low 3 bits of `index`.
    fn set_status(&mut self, index: u8) -> Result<(), EcmError>;
}

impl<T: HandshakeLines + ?Sized> HandshakeLines for &mut T {
    fn start_is_low(&mut self) -> Result<bool, EcmError> {
        (**self).start_is_low()
    }

    fn clock_is_high(&mut self) -> Result<bool, EcmError> {
        (**self).clock_is_high()
    }

    fn read_nibble(&mut self) -> Result<u8, EcmError> {
        (**self).read_nibble()
    }

    fn set_ack(&mut self, high: bool) -> Result<(), EcmError> {
        (**self).set_ack(high)
    }

    fn set_status(&mut self, index: u8) -> Result<(), EcmError> {
        (**self).set_status(index)
    }
}

// ── LineMap ──────────────────────────────────────────────────────

/// Line offsets on a GPIO chip, plus the consumer label used when
/// requesting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMap {
    pub chip: String,
    pub data: [u32; DATA_LINES],
    pub clock: u32,
    pub ack: u32,
    pub start: u32,
    pub status: [u32; STATUS_LINES],
    pub consumer: String,
}

impl Default for LineMap {
    fn default() -> Self {
        Self {
            chip: "gpiochip0".into(),
            data: [5, 6, 13, 19],
            clock: 26,
            ack: 11,
            start: 9,
            status: [2, 3, 4],
            consumer: "gpio_reader".into(),
        }
    }
}

impl LineMap {
    /// Every offset in request order, tagged with its role.
    pub fn offsets(&self) -> Vec<(&'static str, u32)> {
        const DATA: [&str; DATA_LINES] = ["data0", "data1", "data2", "data3"];
        const STATUS: [&str; STATUS_LINES] = ["status0", "status1", "status2"];

        let mut all: Vec<(&'static str, u32)> = DATA.into_iter().zip(self.data).collect();
        all.push(("clock", self.clock));
        all.push(("ack", self.ack));
        all.push(("start", self.start));
        all.extend(STATUS.into_iter().zip(self.status));
        all
    }

    /// Reject maps that assign one offset to two roles.
    pub fn validate(&self) -> Result<(), EcmError> {
        let offsets = self.offsets();
        for (i, (role, offset)) in offsets.iter().enumerate() {
            if let Some((other, _)) = offsets[..i].iter().find(|(_, o)| o == offset) {
                return Err(EcmError::InvalidConfig(format!(
                    "line {offset} assigned to both {other} and {role}"
                )));
            }
        }
        if self.consumer.is_empty() {
            return Err(EcmError::InvalidConfig("empty line consumer label".into()));
        }
        Ok(())
    }
}

// ── PinBank ──────────────────────────────────────────────────────

/// The full line set as individual `embedded-hal` pins.
pub struct PinBank<I, O> {
    pub data: [I; DATA_LINES],
    pub clock: I,
    pub start: I,
    pub ack: O,
    pub status: [O; STATUS_LINES],
}

fn line_err<E: std::fmt::Debug>(line: &'static str) -> impl FnOnce(E) -> EcmError {
    move |e| EcmError::Line {
        line,
        reason: format!("{e:?}"),
    }
}

impl<I: InputPin, O: OutputPin> HandshakeLines for PinBank<I, O> {
    fn start_is_low(&mut self) -> Result<bool, EcmError> {
        self.start.is_low().map_err(line_err("start"))
    }

    fn clock_is_high(&mut self) -> Result<bool, EcmError> {
        self.clock.is_high().map_err(line_err("clock"))
    }

    fn read_nibble(&mut self) -> Result<u8, EcmError> {
        let mut value = 0u8;
        for (i, pin) in self.data.iter_mut().enumerate() {
            if pin.is_high().map_err(line_err("data"))? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    fn set_ack(&mut self, high: bool) -> Result<(), EcmError> {
        if high {
            self.ack.set_high().map_err(line_err("ack"))
        } else {
            self.ack.set_low().map_err(line_err("ack"))
        }
    }

    fn set_status(&mut self, index: u8) -> Result<(), EcmError> {
        for (i, pin) in self.status.iter_mut().enumerate() {
            let result = if (index >> i) & 0x01 == 1 {
                pin.set_high()
            } else {
                pin.set_low()
            };
            result.map_err(line_err("status"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FakePin(Rc<Cell<bool>>);

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0.get())
        }
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.set(true);
            Ok(())
        }
    }

    fn bank() -> PinBank<FakePin, FakePin> {
        PinBank {
            data: Default::default(),
            clock: FakePin::default(),
            start: FakePin::default(),
            ack: FakePin::default(),
            status: Default::default(),
        }
    }

    #[test]
    fn data_line_zero_is_lsb() {
        let mut lines = bank();
        lines.data[0].0.set(true);
        lines.data[3].0.set(true);
        assert_eq!(lines.read_nibble().unwrap(), 0b1001);
    }

    #[test]
    fn status_lines_carry_byte_index() {
        let mut lines = bank();
        lines.set_status(6).unwrap();
        let levels: Vec<bool> = lines.status.iter().map(|p| p.0.get()).collect();
        assert_eq!(levels, [false, true, true]);

        lines.set_status(1).unwrap();
        let levels: Vec<bool> = lines.status.iter().map(|p| p.0.get()).collect();
        assert_eq!(levels, [true, false, false]);
    }

    #[test]
    fn start_is_active_low() {
        let mut lines = bank();
        assert!(lines.start_is_low().unwrap());
        lines.start.0.set(true);
        assert!(!lines.start_is_low().unwrap());
    }

    #[test]
    fn ack_follows_requested_level() {
        let mut lines = bank();
        lines.set_ack(true).unwrap();
        assert!(lines.ack.0.get());
        lines.set_ack(false).unwrap();
        assert!(!lines.ack.0.get());
    }

    #[test]
    fn default_map_is_valid() {
        LineMap::default().validate().unwrap();
        assert_eq!(LineMap::default().offsets().len(), 11);
    }

    #[test]
    fn duplicate_offsets_rejected() {
        let map = LineMap {
            ack: 26,
            ..LineMap::default()
        };
        let err = map.validate().unwrap_err();
        assert!(err.to_string().contains("clock"));
        assert!(err.to_string().contains("ack"));
    }
}
