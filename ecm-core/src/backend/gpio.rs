//! GPIO character-device backend for the handshake lines.

use linux_embedded_hal::CdevPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use tracing::debug;

use crate::error::EcmError;
use crate::lines::{LineMap, PinBank};

/// The handshake line set on a Linux GPIO chip.
pub type GpioLines = PinBank<CdevPin, CdevPin>;

fn chip_path(chip: &str) -> String {
    if chip.starts_with('/') {
        chip.to_string()
    } else {
        format!("/dev/{chip}")
    }
}

fn request(
    chip: &mut Chip,
    offset: u32,
    flags: LineRequestFlags,
    consumer: &str,
) -> Result<CdevPin, EcmError> {
    let line = chip
        .get_line(offset)
        .map_err(|e| EcmError::Gpio(format!("getting line {offset}: {e}")))?;
    let handle = line
        .request(flags, 0, consumer)
        .map_err(|e| EcmError::Gpio(format!("requesting line {offset}: {e}")))?;
    CdevPin::new(handle).map_err(|e| EcmError::Gpio(format!("creating pin {offset}: {e}")))
}

/// Open the chip and request every line in `map`. Outputs start low.
///
/// The lines are released when the returned bank is dropped.
pub fn open(map: &LineMap) -> Result<GpioLines, EcmError> {
    map.validate()?;
    let path = chip_path(&map.chip);
    let mut chip =
        Chip::new(&path).map_err(|e| EcmError::Gpio(format!("opening {path}: {e}")))?;

    let input = |chip: &mut Chip, offset| request(chip, offset, LineRequestFlags::INPUT, &map.consumer);
    let output =
        |chip: &mut Chip, offset| request(chip, offset, LineRequestFlags::OUTPUT, &map.consumer);

    let data = [
        input(&mut chip, map.data[0])?,
        input(&mut chip, map.data[1])?,
        input(&mut chip, map.data[2])?,
        input(&mut chip, map.data[3])?,
    ];
    let status = [
        output(&mut chip, map.status[0])?,
        output(&mut chip, map.status[1])?,
        output(&mut chip, map.status[2])?,
    ];
    let clock = input(&mut chip, map.clock)?;
    let ack = output(&mut chip, map.ack)?;
    let start = input(&mut chip, map.start)?;

    debug!(chip = %path, consumer = %map.consumer, "handshake lines requested");
    Ok(PinBank {
        data,
        clock,
        start,
        ack,
        status,
    })
}
