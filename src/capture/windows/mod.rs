//! Windows capture implementations
//!
//! GDI for screen frames, user32 for window enumeration and activation,
//! Shell32 for executable icons.

pub mod icon;
pub mod screen;
pub mod window;

pub use screen::{get_displays, GdiScreenSource};
pub use window::Win32WindowSurface;
