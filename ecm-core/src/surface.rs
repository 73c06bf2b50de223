//! Pixel memory plus the geometry needed to address it.
//!
//! These types are the renderer's view of a display. The memory can be a
//! kernel framebuffer mapping (see `backend::fbdev`) or a plain `Vec<u8>`.

use std::ops::DerefMut;

use crate::error::EcmError;

/// Bytes per RGB565 pixel.
pub const RGB565_BYTES: u32 = 2;

// ── Geometry ─────────────────────────────────────────────────────

/// Layout of a frame surface.
///
/// `stride` is the scan-line pitch in bytes and may exceed
/// `width * bytes_per_pixel`. `virtual_height` counts the off-screen
/// rows that are mapped along with the visible ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    pub bytes_per_pixel: u32,
    /// Row pitch in **bytes**.
    pub stride: u32,
    /// Rows mapped in total, visible plus virtual.
    pub virtual_height: u32,
}

impl Geometry {
    /// A packed RGB565 layout with no virtual rows.
    pub fn packed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel: RGB565_BYTES,
            stride: width * RGB565_BYTES,
            virtual_height: height,
        }
    }

    /// Bytes covering every mapped row.
    pub fn mapped_len(&self) -> usize {
        self.stride as usize * self.virtual_height as usize
    }

    /// Byte offset of a visible pixel, or `None` outside the visible area.
    pub fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(x as usize * self.bytes_per_pixel as usize + y as usize * self.stride as usize)
    }

    pub fn validate(&self) -> Result<(), EcmError> {
        if self.bytes_per_pixel != RGB565_BYTES {
            return Err(EcmError::UnsupportedPixelFormat {
                bits_per_pixel: self.bytes_per_pixel * 8,
            });
        }
        if self.stride < self.width * self.bytes_per_pixel {
            return Err(EcmError::InvalidGeometry(format!(
                "stride {} shorter than {} pixels",
                self.stride, self.width
            )));
        }
        if self.virtual_height < self.height {
            return Err(EcmError::InvalidGeometry(format!(
                "virtual height {} below visible height {}",
                self.virtual_height, self.height
            )));
        }
        Ok(())
    }
}

// ── FrameSurface ─────────────────────────────────────────────────

/// Mapped RGB565 pixel memory.
pub struct FrameSurface<M> {
    geometry: Geometry,
    memory: M,
}

impl<M: DerefMut<Target = [u8]>> FrameSurface<M> {
    /// Wrap `memory`, which must cover at least every visible row.
    pub fn new(geometry: Geometry, memory: M) -> Result<Self, EcmError> {
        geometry.validate()?;
        let visible = geometry.stride as usize * geometry.height as usize;
        if memory.len() < visible {
            return Err(EcmError::InvalidGeometry(format!(
                "{} bytes mapped, visible area needs {visible}",
                memory.len()
            )));
        }
        Ok(Self { geometry, memory })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Total mapped size in bytes, including virtual rows.
    pub fn mapped_len(&self) -> usize {
        self.memory.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Read back the pixel at a visible position.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        let offset = self.geometry.pixel_offset(x, y)?;
        let bytes = self.memory.get(offset..offset + 2)?;
        Some(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }
}

impl FrameSurface<Vec<u8>> {
    /// A zeroed heap-backed surface covering `geometry.mapped_len()` bytes.
    pub fn in_memory(geometry: Geometry) -> Result<Self, EcmError> {
        let memory = vec![0u8; geometry.mapped_len()];
        Self::new(geometry, memory)
    }
}

impl<M> std::fmt::Debug for FrameSurface<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSurface")
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}
