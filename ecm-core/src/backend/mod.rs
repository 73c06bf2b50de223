//! Hardware backends. Both are Linux-only.
//!
//! | Module  | Device                         |
//! |---------|--------------------------------|
//! | `gpio`  | GPIO character device lines    |
//! | `fbdev` | `/dev/fbN` RGB565 framebuffer  |

#[cfg(target_os = "linux")]
pub mod fbdev;
#[cfg(target_os = "linux")]
pub mod gpio;
