//! Windows screen capture using GDI BitBlt
//!
//! The memory DC and bitmap are created once per source and reused on every
//! tick; only `BitBlt` and `GetDIBits` run per frame.

use crate::capture::traits::{CaptureError, DisplayInfo, FrameBuffer, FrameSource};
use std::mem::zeroed;
use windows::{
    Win32::Foundation::{BOOL, HWND, LPARAM, RECT},
    Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
        EnumDisplayMonitors, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject,
        BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, HMONITOR,
        MONITORINFOEXW, SRCCOPY,
    },
};

const MONITORINFOF_PRIMARY: u32 = 1;

/// Get list of available displays
pub fn get_displays() -> Vec<DisplayInfo> {
    let mut displays = Vec::new();
    let displays_ptr = &mut displays as *mut Vec<DisplayInfo>;

    unsafe extern "system" fn enum_monitors_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let displays = &mut *(lparam.0 as *mut Vec<DisplayInfo>);

        let mut monitor_info: MONITORINFOEXW = zeroed();
        monitor_info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(hmonitor, &mut monitor_info.monitorInfo).as_bool() {
            let rect = monitor_info.monitorInfo.rcMonitor;
            let name_len = monitor_info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(monitor_info.szDevice.len());

            displays.push(DisplayInfo {
                id: displays.len() as u32,
                name: String::from_utf16_lossy(&monitor_info.szDevice[..name_len]),
                width: (rect.right - rect.left) as u32,
                height: (rect.bottom - rect.top) as u32,
                is_primary: monitor_info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
            });
        }

        BOOL::from(true)
    }

    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_monitors_callback),
            LPARAM(displays_ptr as isize),
        );
    }

    displays
}

/// Captures a fixed rectangle of the desktop
pub struct GdiScreenSource {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    screen_dc: HDC,
    mem_dc: HDC,
    bitmap: HBITMAP,
    old_object: HGDIOBJ,
}

// The GDI handles are only touched by the thread currently owning the source
unsafe impl Send for GdiScreenSource {}

impl GdiScreenSource {
    /// Prepare a source for the rectangle at (`x`, `y`) of `width` x `height`
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::Unavailable(format!(
                "empty capture rectangle {}x{}",
                width, height
            )));
        }

        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(CaptureError::Os("GetDC failed for the desktop".to_string()));
            }

            let mem_dc = CreateCompatibleDC(screen_dc);
            if mem_dc.is_invalid() {
                ReleaseDC(HWND::default(), screen_dc);
                return Err(CaptureError::Os("CreateCompatibleDC failed".to_string()));
            }

            let bitmap = CreateCompatibleBitmap(screen_dc, width as i32, height as i32);
            if bitmap.is_invalid() {
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);
                return Err(CaptureError::Os("CreateCompatibleBitmap failed".to_string()));
            }

            let old_object = SelectObject(mem_dc, bitmap);

            tracing::debug!("GDI screen source ready: {}x{} at ({}, {})", width, height, x, y);

            Ok(Self {
                x,
                y,
                width,
                height,
                screen_dc,
                mem_dc,
                bitmap,
                old_object,
            })
        }
    }

    /// Source covering the primary display
    pub fn primary() -> Result<Self, CaptureError> {
        let display = get_displays()
            .into_iter()
            .find(|d| d.is_primary)
            .ok_or_else(|| CaptureError::Unavailable("no primary display".to_string()))?;
        Self::new(0, 0, display.width, display.height)
    }
}

impl FrameSource for GdiScreenSource {
    fn is_available(&self) -> bool {
        true
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn capture(&mut self, frame: &mut FrameBuffer) -> Result<(), CaptureError> {
        if frame.width != self.width || frame.height != self.height {
            *frame = FrameBuffer::new(self.width, self.height);
        }

        unsafe {
            BitBlt(
                self.mem_dc,
                0,
                0,
                self.width as i32,
                self.height as i32,
                self.screen_dc,
                self.x,
                self.y,
                SRCCOPY,
            )
            .map_err(|e| CaptureError::Os(format!("BitBlt failed: {}", e)))?;

            let mut bmi: BITMAPINFO = zeroed();
            bmi.bmiHeader.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as u32;
            bmi.bmiHeader.biWidth = self.width as i32;
            bmi.bmiHeader.biHeight = -(self.height as i32); // Negative for top-down
            bmi.bmiHeader.biPlanes = 1;
            bmi.bmiHeader.biBitCount = 32;
            bmi.bmiHeader.biCompression = BI_RGB.0;

            let lines = GetDIBits(
                self.mem_dc,
                self.bitmap,
                0,
                self.height,
                Some(frame.data.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(CaptureError::Os("GetDIBits returned no rows".to_string()));
            }
        }

        frame.top_down = true;
        frame.stride = self.width as usize * 4;
        Ok(())
    }
}

impl Drop for GdiScreenSource {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.mem_dc, self.old_object);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.mem_dc);
            ReleaseDC(HWND::default(), self.screen_dc);
        }
    }
}
