//! Applies display commands to a frame surface.
//!
//! Fills cover the **entire mapped buffer** by default, virtual rows
//! included, matching the display firmware.
//! [`FillMode::Visible`] restricts fills to the on-screen rectangle.

use std::ops::DerefMut;

use serde::{Deserialize, Serialize};

use crate::command::{BLANK_RGB565, DisplayCommand};
use crate::surface::FrameSurface;

// ── Surface operations ───────────────────────────────────────────

impl<M: DerefMut<Target = [u8]>> FrameSurface<M> {
    /// Overwrite every 16-bit slot of the mapped buffer.
    pub fn fill_whole(&mut self, colour: u16) {
        let bytes = colour.to_ne_bytes();
        for slot in self.as_bytes_mut().chunks_exact_mut(2) {
            slot.copy_from_slice(&bytes);
        }
    }

    /// Overwrite only the visible `width × height` pixels, leaving row
    /// padding and virtual rows untouched.
    pub fn fill_visible(&mut self, colour: u16) {
        let g = *self.geometry();
        let bytes = colour.to_ne_bytes();
        let row_len = g.width as usize * g.bytes_per_pixel as usize;
        let memory = self.as_bytes_mut();
        for y in 0..g.height as usize {
            let start = y * g.stride as usize;
            let Some(row) = memory.get_mut(start..start + row_len) else {
                break;
            };
            for slot in row.chunks_exact_mut(2) {
                slot.copy_from_slice(&bytes);
            }
        }
    }

    /// Write one pixel. Positions outside the visible area are ignored.
    pub fn set_pixel(&mut self, x: u16, y: u16, colour: u16) -> bool {
        let Some(offset) = self.geometry().pixel_offset(x as u32, y as u32) else {
            return false;
        };
        match self.as_bytes_mut().get_mut(offset..offset + 2) {
            Some(slot) => {
                slot.copy_from_slice(&colour.to_ne_bytes());
                true
            }
            None => false,
        }
    }

    /// Zero the whole mapped buffer.
    pub fn clear(&mut self) {
        self.as_bytes_mut().fill(0);
    }
}

// ── FillMode ─────────────────────────────────────────────────────

/// Which region a fill command paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Every mapped byte, virtual rows included.
    #[default]
    Whole,
    /// Only the visible rectangle.
    Visible,
}

// ── Renderer ─────────────────────────────────────────────────────

/// What `apply` did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Filled(u16),
    PixelSet,
    /// `SetPixel` outside the visible area.
    Clipped,
    /// `Resolution` or an unknown type.
    Ignored,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Renderer {
    fill_mode: FillMode,
}

impl Renderer {
    pub fn new(fill_mode: FillMode) -> Self {
        Self { fill_mode }
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    fn fill<M: DerefMut<Target = [u8]>>(&self, surface: &mut FrameSurface<M>, colour: u16) {
        match self.fill_mode {
            FillMode::Whole if colour == BLANK_RGB565 => surface.clear(),
            FillMode::Whole => surface.fill_whole(colour),
            FillMode::Visible => surface.fill_visible(colour),
        }
    }

    pub fn apply<M: DerefMut<Target = [u8]>>(
        &self,
        surface: &mut FrameSurface<M>,
        command: &DisplayCommand,
    ) -> RenderOutcome {
        if let Some(colour) = command.fill_colour() {
            self.fill(surface, colour);
            return RenderOutcome::Filled(colour);
        }
        match *command {
            DisplayCommand::SetPixel { x, y, colour } => {
                if surface.set_pixel(x, y, colour) {
                    RenderOutcome::PixelSet
                } else {
                    RenderOutcome::Clipped
                }
            }
            _ => RenderOutcome::Ignored,
        }
    }
}
