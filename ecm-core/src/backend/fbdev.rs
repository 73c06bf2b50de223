//! Linux framebuffer (`/dev/fbN`) backend.
//!
//! Queries the variable and fixed screen info, checks for 16 bpp and
//! maps `yres_virtual * line_length` bytes shared read/write. The
//! mapping is released and the device closed when [`FbMemory`] drops.

use std::fs::{File, OpenOptions};
use std::ops::{Deref, DerefMut};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::NonNull;

use tracing::debug;

use crate::error::EcmError;
use crate::surface::{FrameSurface, Geometry};

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;

// ── Kernel structs (linux/fb.h) ──────────────────────────────────

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbVarScreeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbFixScreeninfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

fn ioctl_read<T: Default>(file: &File, request: libc::c_ulong, what: &str) -> Result<T, EcmError> {
    let mut value = T::default();
    // SAFETY: `value` is a live, correctly sized repr(C) struct for `request`.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, &mut value as *mut T) };
    if rc < 0 {
        return Err(EcmError::Framebuffer(format!(
            "{what}: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(value)
}

// ── FbMemory ─────────────────────────────────────────────────────

/// A shared mapping of framebuffer memory.
pub struct FbMemory {
    ptr: NonNull<u8>,
    len: usize,
    _file: File,
}

impl Deref for FbMemory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` maps `len` readable bytes for the life of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for FbMemory {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: mapped PROT_WRITE, and `&mut self` gives exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for FbMemory {
    fn drop(&mut self) {
        // SAFETY: unmapping exactly the region returned by mmap.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

pub type FbSurface = FrameSurface<FbMemory>;

/// Open the framebuffer device at `path` and map its full virtual buffer.
pub fn open(path: &Path) -> Result<FbSurface, EcmError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| EcmError::Framebuffer(format!("opening {}: {e}", path.display())))?;

    let var: FbVarScreeninfo = ioctl_read(&file, FBIOGET_VSCREENINFO, "FBIOGET_VSCREENINFO")?;
    let fix: FbFixScreeninfo = ioctl_read(&file, FBIOGET_FSCREENINFO, "FBIOGET_FSCREENINFO")?;

    if var.bits_per_pixel != 16 {
        return Err(EcmError::UnsupportedPixelFormat {
            bits_per_pixel: var.bits_per_pixel,
        });
    }

    let geometry = Geometry {
        width: var.xres,
        height: var.yres,
        bytes_per_pixel: var.bits_per_pixel / 8,
        stride: fix.line_length,
        virtual_height: var.yres_virtual.max(var.yres),
    };
    geometry.validate()?;
    let len = geometry.mapped_len();

    // SAFETY: fresh shared mapping of an open fd; checked for MAP_FAILED below.
    let raw = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };
    if raw == libc::MAP_FAILED {
        return Err(EcmError::Framebuffer(format!(
            "mmap of {len} bytes: {}",
            std::io::Error::last_os_error()
        )));
    }
    let ptr = NonNull::new(raw.cast::<u8>())
        .ok_or_else(|| EcmError::Framebuffer("mmap returned null".into()))?;

    debug!(
        device = %path.display(),
        xres = var.xres,
        yres = var.yres,
        yres_virtual = var.yres_virtual,
        bits_per_pixel = var.bits_per_pixel,
        line_length = fix.line_length,
        mapped = len,
        "framebuffer mapped"
    );

    FrameSurface::new(
        geometry,
        FbMemory {
            ptr,
            len,
            _file: file,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_sizes_match_kernel_abi() {
        assert_eq!(std::mem::size_of::<FbVarScreeninfo>(), 160);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<FbFixScreeninfo>(), 80);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<FbFixScreeninfo>(), 68);
    }

    #[test]
    fn missing_device_is_a_framebuffer_error() {
        let err = open(Path::new("/nonexistent/fb9")).unwrap_err();
        assert!(matches!(err, EcmError::Framebuffer(_)));
    }
}
