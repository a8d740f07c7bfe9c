//! Capture trait definitions
//!
//! Platform-agnostic traits for the OS surfaces the dock consumes: window
//! enumeration and activation, screen frames, and PCM audio streams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by platform capture code
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture source unavailable: {0}")]
    Unavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("OS call failed: {0}")]
    Os(String),
}

/// Opaque OS window identifier.
///
/// Borrowed from the OS; never created or released by the dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A process together with its main top-level window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    /// Main window handle (null when the process has no window)
    pub handle: WindowHandle,

    /// Main window title
    pub title: String,

    /// Process name, e.g. "notepad.exe"
    pub process_name: String,

    /// Owning process ID
    pub pid: u32,

    /// Executable path, used for icon extraction
    pub exe_path: Option<PathBuf>,
}

/// Square RGBA icon bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Edge length of dock icons in pixels
pub const ICON_SIZE: u32 = 32;

impl IconBitmap {
    /// Generic application icon used when extraction fails.
    ///
    /// A light window frame with a dark title strip.
    pub fn generic() -> Self {
        let size = ICON_SIZE;
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let border = x < 2 || y < 2 || x >= size - 2 || y >= size - 2;
                let title_bar = (2..8).contains(&y);
                let pixel = if border || title_bar {
                    [0x3a, 0x5f, 0x9e, 0xff]
                } else {
                    [0xf0, 0xf0, 0xf0, 0xff]
                };
                rgba.extend_from_slice(&pixel);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    /// Encode the bitmap as PNG bytes
    pub fn encode_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.rgba)?;
        }
        Ok(bytes)
    }
}

/// Information about a display/screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Unique display ID
    pub id: u32,

    /// Display name
    pub name: String,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Whether this is the primary display
    pub is_primary: bool,
}

/// PCM format of an audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// 16-bit PCM at the given rate and channel count
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }

    /// Bytes per sample frame (all channels)
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Raw captured screen pixels, 32 bits per pixel (BGRX)
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows (>= width * 4)
    pub stride: usize,
    /// Whether row 0 is the top of the image
    pub top_down: bool,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a zeroed top-down buffer with tightly packed rows
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * 4;
        Self {
            width,
            height,
            stride,
            top_down: true,
            data: vec![0; stride * height as usize],
        }
    }
}

/// Consumer of 16-bit little-endian PCM buffers
pub type AudioCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// OS window surface: enumeration, icons, and activation primitives
pub trait WindowSurface: Send + Sync {
    /// Enumerate running processes with their main windows
    fn enumerate(&self) -> Result<Vec<WindowInfo>, CaptureError>;

    /// Extract the icon associated with a window's executable
    fn icon(&self, window: &WindowInfo) -> Option<IconBitmap>;

    fn is_minimized(&self, handle: WindowHandle) -> bool;

    fn restore(&self, handle: WindowHandle) -> Result<(), CaptureError>;

    /// Move the window to the top of the Z-order
    fn bring_to_top(&self, handle: WindowHandle) -> Result<(), CaptureError>;

    fn set_foreground(&self, handle: WindowHandle) -> Result<(), CaptureError>;

    fn is_visible(&self, handle: WindowHandle) -> bool;

    fn show(&self, handle: WindowHandle) -> Result<(), CaptureError>;
}

/// Periodic screen frame source
pub trait FrameSource: Send {
    fn is_available(&self) -> bool;

    /// Width and height of the sampling rectangle
    fn dimensions(&self) -> (u32, u32);

    /// Copy the sampling rectangle into `frame`, reusing its allocation
    fn capture(&mut self, frame: &mut FrameBuffer) -> Result<(), CaptureError>;
}

/// Audio capture stream delivering 16-bit PCM buffers
pub trait AudioSource: Send {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Format of the buffers passed to the callback
    fn format(&self) -> AudioFormat;

    /// Begin capturing; `on_data` runs on the OS capture thread
    fn start(&mut self, on_data: AudioCallback) -> Result<(), CaptureError>;

    /// Halt capturing. Stopping a stopped source is a no-op.
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn is_running(&self) -> bool;
}
