//! Screen sampling channel
//!
//! Samples the display on a fixed interval, re-orients each capture to
//! bottom-up rows, and appends it to the container as a key frame.

use super::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use super::sink::StreamSink;
use crate::capture::traits::{FrameBuffer, FrameSource};
use crate::container::{pack_bottom_up, StreamSpec};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Display capture channel
pub struct DisplayCaptureChannel {
    id: String,
    source: Option<Box<dyn FrameSource>>,
    width: u32,
    height: u32,
    available: bool,
    frame_interval: Duration,
    is_recording: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    shutdown: Option<oneshot::Sender<()>>,
    capture_handle: Option<JoinHandle<Box<dyn FrameSource>>>,
}

impl DisplayCaptureChannel {
    pub fn new(source: Box<dyn FrameSource>, frame_interval: Duration) -> Self {
        let (width, height) = source.dimensions();
        let available = source.is_available();
        Self {
            id: format!("display-{}x{}", width, height),
            source: Some(source),
            width,
            height,
            available,
            frame_interval,
            is_recording: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            shutdown: None,
            capture_handle: None,
        }
    }

    /// Frames written since the channel was created
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordingChannel for DisplayCaptureChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Display
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn stream_spec(&self) -> StreamSpec {
        StreamSpec::Video {
            width: self.width,
            height: self.height,
        }
    }

    async fn start(&mut self, sink: StreamSink) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        let mut source = self.source.take().ok_or_else(|| {
            RecordingError::Setup("display source already released".to_string())
        })?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let is_recording = self.is_recording.clone();
        let frames = self.frames.clone();
        let frame_interval = self.frame_interval;
        let (width, height) = (self.width, self.height);

        is_recording.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            // A slow write pushes the next tick back instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut raw = FrameBuffer::new(width, height);
            let mut packed = Vec::with_capacity(width as usize * height as usize * 4);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                if sink.is_paused() {
                    continue;
                }
                if sink.has_failed() {
                    break;
                }

                if let Err(e) = source.capture(&mut raw) {
                    tracing::warn!("Screen capture failed, skipping frame: {}", e);
                    continue;
                }
                if let Err(e) = pack_bottom_up(&raw, &mut packed) {
                    tracing::warn!("Dropping malformed frame: {}", e);
                    continue;
                }
                if !sink.write_video(&packed) {
                    if sink.has_failed() {
                        break;
                    }
                    continue;
                }

                let count = frames.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 300 == 0 {
                    tracing::debug!("Captured {} frames at {}x{}", count, width, height);
                }
            }

            is_recording.store(false, Ordering::SeqCst);
            source
        });

        self.shutdown = Some(shutdown_tx);
        self.capture_handle = Some(handle);

        tracing::info!(
            "Display capture started ({}x{} every {}ms)",
            self.width,
            self.height,
            self.frame_interval.as_millis()
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.capture_handle.take() {
            match handle.await {
                Ok(source) => self.source = Some(source),
                Err(e) => tracing::error!("Display capture task ended abnormally: {}", e),
            }
        }
        self.is_recording.store(false, Ordering::SeqCst);

        tracing::info!("Display capture stopped after {} frames", self.frame_count());
        Ok(())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        // The ticker keeps running; ticks are skipped while the sink is paused
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }
}
