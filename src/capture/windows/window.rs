//! Win32 window enumeration and activation

use super::icon::extract_icon;
use crate::capture::traits::{CaptureError, IconBitmap, WindowHandle, WindowInfo, WindowSurface};
use std::collections::HashMap;
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetWindow, GetWindowTextW, GetWindowThreadProcessId, IsIconic,
    IsWindow, IsWindowVisible, SetForegroundWindow, ShowWindow, GW_OWNER, SW_RESTORE, SW_SHOW,
};

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut std::ffi::c_void)
}

/// Main window per process: the first visible, unowned, titled top-level window
struct MainWindow {
    handle: WindowHandle,
    title: String,
}

unsafe extern "system" fn enum_window_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut HashMap<u32, MainWindow>);

    if !IsWindowVisible(hwnd).as_bool() {
        return TRUE;
    }
    if matches!(GetWindow(hwnd, GW_OWNER), Ok(owner) if !owner.is_invalid()) {
        return TRUE;
    }

    let mut buf = [0u16; 512];
    let len = GetWindowTextW(hwnd, &mut buf);
    if len <= 0 {
        return TRUE;
    }

    let mut pid: u32 = 0;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));

    windows.entry(pid).or_insert_with(|| MainWindow {
        handle: WindowHandle(hwnd.0 as isize),
        title: String::from_utf16_lossy(&buf[..len as usize]),
    });

    TRUE
}

/// Desktop window surface backed by user32 and sysinfo
#[derive(Default)]
pub struct Win32WindowSurface;

impl Win32WindowSurface {
    pub fn new() -> Self {
        Self
    }

    fn check(&self, handle: WindowHandle) -> Result<HWND, CaptureError> {
        let hwnd = hwnd(handle);
        if handle.is_null() || !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(CaptureError::Os(format!("window {} no longer exists", handle)));
        }
        Ok(hwnd)
    }
}

impl WindowSurface for Win32WindowSurface {
    fn enumerate(&self) -> Result<Vec<WindowInfo>, CaptureError> {
        let mut main_windows: HashMap<u32, MainWindow> = HashMap::new();
        unsafe {
            EnumWindows(
                Some(enum_window_cb),
                LPARAM(&mut main_windows as *mut HashMap<u32, MainWindow> as isize),
            )
            .map_err(|e| CaptureError::Os(format!("EnumWindows failed: {}", e)))?;
        }

        let refresh = RefreshKind::new().with_processes(ProcessRefreshKind::everything());
        let sys = System::new_with_specifics(refresh);

        let mut windows: Vec<WindowInfo> = main_windows
            .into_iter()
            .filter_map(|(pid, window)| {
                // Processes that exited between the two snapshots are skipped
                let process = sys.process(Pid::from_u32(pid))?;
                Some(WindowInfo {
                    handle: window.handle,
                    title: window.title,
                    process_name: process.name().to_string_lossy().to_string(),
                    pid,
                    exe_path: process.exe().map(|p| p.to_path_buf()),
                })
            })
            .collect();

        windows.sort_by_key(|w| w.pid);
        Ok(windows)
    }

    fn icon(&self, window: &WindowInfo) -> Option<IconBitmap> {
        let path = window.exe_path.as_deref()?;
        let icon = extract_icon(path);
        if icon.is_none() {
            tracing::debug!("No icon in {}", path.display());
        }
        icon
    }

    fn is_minimized(&self, handle: WindowHandle) -> bool {
        unsafe { IsIconic(hwnd(handle)) }.as_bool()
    }

    fn restore(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let hwnd = self.check(handle)?;
        // The return value is the previous visibility, not success
        let _ = unsafe { ShowWindow(hwnd, SW_RESTORE) };
        Ok(())
    }

    fn bring_to_top(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let hwnd = self.check(handle)?;
        unsafe { BringWindowToTop(hwnd) }
            .map_err(|e| CaptureError::Os(format!("BringWindowToTop failed: {}", e)))
    }

    fn set_foreground(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let hwnd = self.check(handle)?;
        if unsafe { SetForegroundWindow(hwnd) }.as_bool() {
            Ok(())
        } else {
            Err(CaptureError::Os(
                "SetForegroundWindow was refused".to_string(),
            ))
        }
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindowVisible(hwnd(handle)) }.as_bool()
    }

    fn show(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let hwnd = self.check(handle)?;
        let _ = unsafe { ShowWindow(hwnd, SW_SHOW) };
        Ok(())
    }
}
