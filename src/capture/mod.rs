//! Platform capture implementations
//!
//! Window enumeration, screen frames and audio for the current platform.
//! Off Windows the window surface is empty and the screen is unavailable, so
//! the dock runs but recording reports a missing dependency.

pub mod audio;
pub mod traits;

#[cfg(target_os = "windows")]
pub mod windows;

pub use audio::{AudioEndpoint, CpalAudioSource};
pub use traits::{
    AudioCallback, AudioFormat, AudioSource, CaptureError, DisplayInfo, FrameBuffer, FrameSource,
    IconBitmap, WindowHandle, WindowInfo, WindowSurface,
};

use std::sync::Arc;

/// Window surface for this platform
#[cfg(target_os = "windows")]
pub fn window_surface() -> Arc<dyn WindowSurface> {
    Arc::new(windows::Win32WindowSurface::new())
}

#[cfg(not(target_os = "windows"))]
pub fn window_surface() -> Arc<dyn WindowSurface> {
    Arc::new(unsupported::EmptyWindowSurface)
}

/// Displays attached to the machine
#[cfg(target_os = "windows")]
pub fn displays() -> Vec<DisplayInfo> {
    windows::get_displays()
}

#[cfg(not(target_os = "windows"))]
pub fn displays() -> Vec<DisplayInfo> {
    Vec::new()
}

/// Frame source for a `width` x `height` rectangle at the desktop origin
#[cfg(target_os = "windows")]
pub fn frame_source(width: u32, height: u32) -> Box<dyn FrameSource> {
    match windows::GdiScreenSource::new(0, 0, width, height) {
        Ok(source) => Box::new(source),
        Err(e) => {
            tracing::warn!("Screen capture unavailable: {}", e);
            Box::new(unsupported::UnavailableFrameSource { width, height })
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub fn frame_source(width: u32, height: u32) -> Box<dyn FrameSource> {
    Box::new(unsupported::UnavailableFrameSource { width, height })
}

/// Audio source for an endpoint, requesting `sample_rate` where negotiable
pub fn audio_source(endpoint: AudioEndpoint, sample_rate: u32) -> Box<dyn AudioSource> {
    Box::new(CpalAudioSource::new(endpoint, sample_rate))
}

/// Opens capture sources for a new recording
pub trait CaptureBackend: Send + Sync {
    fn displays(&self) -> Vec<DisplayInfo>;

    fn frame_source(&self, width: u32, height: u32) -> Box<dyn FrameSource>;

    fn audio_source(&self, endpoint: AudioEndpoint, sample_rate: u32) -> Box<dyn AudioSource>;
}

/// Capture backend for the current platform
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformCapture;

impl CaptureBackend for PlatformCapture {
    fn displays(&self) -> Vec<DisplayInfo> {
        displays()
    }

    fn frame_source(&self, width: u32, height: u32) -> Box<dyn FrameSource> {
        frame_source(width, height)
    }

    fn audio_source(&self, endpoint: AudioEndpoint, sample_rate: u32) -> Box<dyn AudioSource> {
        audio_source(endpoint, sample_rate)
    }
}

mod unsupported {
    use super::traits::{
        CaptureError, FrameBuffer, FrameSource, IconBitmap, WindowHandle, WindowInfo,
        WindowSurface,
    };

    #[cfg_attr(target_os = "windows", allow(dead_code))]
    pub struct EmptyWindowSurface;

    impl WindowSurface for EmptyWindowSurface {
        fn enumerate(&self) -> Result<Vec<WindowInfo>, CaptureError> {
            Ok(Vec::new())
        }

        fn icon(&self, _window: &WindowInfo) -> Option<IconBitmap> {
            None
        }

        fn is_minimized(&self, _handle: WindowHandle) -> bool {
            false
        }

        fn restore(&self, handle: WindowHandle) -> Result<(), CaptureError> {
            Err(unsupported(handle))
        }

        fn bring_to_top(&self, handle: WindowHandle) -> Result<(), CaptureError> {
            Err(unsupported(handle))
        }

        fn set_foreground(&self, handle: WindowHandle) -> Result<(), CaptureError> {
            Err(unsupported(handle))
        }

        fn is_visible(&self, _handle: WindowHandle) -> bool {
            true
        }

        fn show(&self, handle: WindowHandle) -> Result<(), CaptureError> {
            Err(unsupported(handle))
        }
    }

    fn unsupported(handle: WindowHandle) -> CaptureError {
        CaptureError::Unavailable(format!("cannot activate {} on this platform", handle))
    }

    pub struct UnavailableFrameSource {
        pub width: u32,
        pub height: u32,
    }

    impl FrameSource for UnavailableFrameSource {
        fn is_available(&self) -> bool {
            false
        }

        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn capture(&mut self, _frame: &mut FrameBuffer) -> Result<(), CaptureError> {
            Err(CaptureError::Unavailable(
                "screen capture is not supported on this platform".to_string(),
            ))
        }
    }
}
