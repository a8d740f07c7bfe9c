//! Executable icon extraction using Shell32 and GDI

use crate::capture::traits::{IconBitmap, ICON_SIZE};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::core::PCWSTR;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject,
    BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
};
use windows::Win32::UI::Shell::ExtractIconExW;
use windows::Win32::UI::WindowsAndMessaging::{DestroyIcon, DrawIconEx, DI_NORMAL, HICON};

/// First large icon of an executable as 32x32 RGBA
pub fn extract_icon(exe_path: &Path) -> Option<IconBitmap> {
    unsafe {
        let hicon = first_large_icon(exe_path)?;
        let rgba = render_icon(hicon, ICON_SIZE);
        let _ = DestroyIcon(hicon);

        Some(IconBitmap {
            width: ICON_SIZE,
            height: ICON_SIZE,
            rgba: rgba?,
        })
    }
}

unsafe fn first_large_icon(exe_path: &Path) -> Option<HICON> {
    let path_wide: Vec<u16> = exe_path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut large = [HICON::default()];
    let count = ExtractIconExW(
        PCWSTR::from_raw(path_wide.as_ptr()),
        0,
        Some(large.as_mut_ptr()),
        None,
        1,
    );

    if count > 0 && !large[0].is_invalid() {
        Some(large[0])
    } else {
        None
    }
}

unsafe fn render_icon(hicon: HICON, size: u32) -> Option<Vec<u8>> {
    let screen_dc = GetDC(HWND::default());
    let mem_dc = CreateCompatibleDC(screen_dc);

    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size as i32,
            biHeight: -(size as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
    let bitmap = match CreateDIBSection(mem_dc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) {
        Ok(bitmap) if !bits.is_null() => bitmap,
        _ => {
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);
            return None;
        }
    };

    let old = SelectObject(mem_dc, bitmap);
    let drawn = DrawIconEx(mem_dc, 0, 0, hicon, size as i32, size as i32, 0, None, DI_NORMAL);

    let mut pixels = vec![0u8; (size * size * 4) as usize];
    std::ptr::copy_nonoverlapping(bits as *const u8, pixels.as_mut_ptr(), pixels.len());

    SelectObject(mem_dc, old);
    let _ = DeleteObject(bitmap);
    let _ = DeleteDC(mem_dc);
    ReleaseDC(HWND::default(), screen_dc);

    if drawn.is_err() {
        return None;
    }

    // BGRA -> RGBA
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    Some(pixels)
}
