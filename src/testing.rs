//! In-memory stand-ins for the OS surfaces, used by unit tests

use crate::capture::traits::{
    AudioCallback, AudioFormat, AudioSource, CaptureError, DisplayInfo, FrameBuffer, FrameSource,
    IconBitmap, WindowHandle, WindowInfo, WindowSurface,
};
use crate::capture::{AudioEndpoint, CaptureBackend};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Scriptable window surface that records activation calls
#[derive(Default)]
pub struct FakeSurface {
    windows: Mutex<Vec<WindowInfo>>,
    minimized: Mutex<HashSet<WindowHandle>>,
    hidden: Mutex<HashSet<WindowHandle>>,
    calls: Mutex<Vec<String>>,
    fail_icons: AtomicBool,
    fail_enumeration: AtomicBool,
    fail_activation: AtomicBool,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(handle: isize, process: &str, title: &str) -> WindowInfo {
        WindowInfo {
            handle: WindowHandle(handle),
            title: title.to_string(),
            process_name: process.to_string(),
            pid: handle as u32 + 1000,
            exe_path: None,
        }
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        *self.windows.lock() = windows;
    }

    pub fn set_minimized(&self, handle: WindowHandle, minimized: bool) {
        let mut set = self.minimized.lock();
        if minimized {
            set.insert(handle);
        } else {
            set.remove(&handle);
        }
    }

    pub fn set_hidden(&self, handle: WindowHandle, hidden: bool) {
        let mut set = self.hidden.lock();
        if hidden {
            set.insert(handle);
        } else {
            set.remove(&handle);
        }
    }

    pub fn fail_icons(&self, fail: bool) {
        self.fail_icons.store(fail, Ordering::SeqCst);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub fn fail_activation(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str, handle: WindowHandle) -> Result<(), CaptureError> {
        self.calls.lock().push(format!("{} {}", call, handle.0));
        if self.fail_activation.load(Ordering::SeqCst) {
            Err(CaptureError::Os(format!("{} refused", call)))
        } else {
            Ok(())
        }
    }
}

impl WindowSurface for FakeSurface {
    fn enumerate(&self) -> Result<Vec<WindowInfo>, CaptureError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(CaptureError::Os("enumeration failed".to_string()));
        }
        Ok(self.windows.lock().clone())
    }

    fn icon(&self, _window: &WindowInfo) -> Option<IconBitmap> {
        if self.fail_icons.load(Ordering::SeqCst) {
            None
        } else {
            Some(IconBitmap {
                width: 1,
                height: 1,
                rgba: vec![1, 2, 3, 255],
            })
        }
    }

    fn is_minimized(&self, handle: WindowHandle) -> bool {
        self.minimized.lock().contains(&handle)
    }

    fn restore(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let result = self.record("restore", handle);
        self.minimized.lock().remove(&handle);
        result
    }

    fn bring_to_top(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        self.record("bring_to_top", handle)
    }

    fn set_foreground(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        self.record("set_foreground", handle)
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        !self.hidden.lock().contains(&handle)
    }

    fn show(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        self.record("show", handle)
    }
}

/// Frame source producing a row-numbered pattern
pub struct FakeFrameSource {
    width: u32,
    height: u32,
    available: bool,
    pub captures: Arc<AtomicU32>,
}

impl FakeFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            available: true,
            captures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn unavailable(width: u32, height: u32) -> Self {
        Self {
            available: false,
            ..Self::new(width, height)
        }
    }
}

impl FrameSource for FakeFrameSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn capture(&mut self, frame: &mut FrameBuffer) -> Result<(), CaptureError> {
        if frame.width != self.width || frame.height != self.height {
            *frame = FrameBuffer::new(self.width, self.height);
        }
        for (row, chunk) in frame.data.chunks_mut(frame.stride).enumerate() {
            chunk.fill(row as u8);
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared state behind a [`FakeAudioSource`]
#[derive(Default)]
pub struct FakeAudioControl {
    callback: Mutex<Option<AudioCallback>>,
    running: AtomicBool,
    starts: AtomicU32,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    stall_ms: AtomicU64,
}

impl FakeAudioControl {
    /// Deliver a buffer as the OS capture thread would; dropped when stopped
    pub fn emit(&self, data: &[u8]) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    /// Make `start` hold the calling thread, like a slow driver
    pub fn stall_start(&self, millis: u64) {
        self.stall_ms.store(millis, Ordering::SeqCst);
    }
}

/// Audio source whose buffers are pushed by the test
pub struct FakeAudioSource {
    name: String,
    format: AudioFormat,
    available: bool,
    control: Arc<FakeAudioControl>,
}

impl FakeAudioSource {
    pub fn new(name: &str, format: AudioFormat) -> (Self, Arc<FakeAudioControl>) {
        let control = Arc::new(FakeAudioControl::default());
        (
            Self {
                name: name.to_string(),
                format,
                available: true,
                control: control.clone(),
            },
            control,
        )
    }

    pub fn unavailable(name: &str, format: AudioFormat) -> Self {
        let (mut source, _) = Self::new(name, format);
        source.available = false;
        source
    }
}

impl AudioSource for FakeAudioSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn start(&mut self, on_data: AudioCallback) -> Result<(), CaptureError> {
        if self.control.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::Stream("device busy".to_string()));
        }
        let stall = self.control.stall_ms.load(Ordering::SeqCst);
        if stall > 0 {
            std::thread::sleep(std::time::Duration::from_millis(stall));
        }
        *self.control.callback.lock() = Some(on_data);
        self.control.running.store(true, Ordering::SeqCst);
        self.control.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if self.control.fail_stop.load(Ordering::SeqCst) {
            return Err(CaptureError::Stream("device lost".to_string()));
        }
        self.control.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.control.is_running()
    }
}

/// Capture backend handing out fakes; audio controls are kept for the test
pub struct FakeCapture {
    pub width: u32,
    pub height: u32,
    pub screen_available: bool,
    controls: Mutex<Vec<(AudioEndpoint, Arc<FakeAudioControl>)>>,
}

impl FakeCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            screen_available: true,
            controls: Mutex::new(Vec::new()),
        }
    }

    /// Control of the most recently opened source for `endpoint`
    pub fn control(&self, endpoint: AudioEndpoint) -> Option<Arc<FakeAudioControl>> {
        self.controls
            .lock()
            .iter()
            .rev()
            .find(|(e, _)| *e == endpoint)
            .map(|(_, control)| control.clone())
    }
}

impl CaptureBackend for FakeCapture {
    fn displays(&self) -> Vec<DisplayInfo> {
        vec![DisplayInfo {
            id: 0,
            name: "FAKE1".to_string(),
            width: self.width,
            height: self.height,
            is_primary: true,
        }]
    }

    fn frame_source(&self, width: u32, height: u32) -> Box<dyn FrameSource> {
        if self.screen_available {
            Box::new(FakeFrameSource::new(width, height))
        } else {
            Box::new(FakeFrameSource::unavailable(width, height))
        }
    }

    fn audio_source(&self, endpoint: AudioEndpoint, sample_rate: u32) -> Box<dyn AudioSource> {
        let channels = match endpoint {
            AudioEndpoint::Loopback => 2,
            AudioEndpoint::Microphone => 1,
        };
        let (source, control) =
            FakeAudioSource::new(&format!("{:?}", endpoint), AudioFormat::pcm16(sample_rate, channels));
        self.controls.lock().push((endpoint, control));
        Box::new(source)
    }
}
