//! Audio capture channels
//!
//! Wraps an [`AudioSource`] so its buffers land in the session's stream for
//! that track. Pause halts the device; mute only gates the data.
//!
//! Device start and stop wait on the OS audio thread, so they run on the
//! blocking pool rather than on a runtime worker.

use super::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use super::sink::{AudioTrack, StreamSink};
use crate::capture::traits::{AudioCallback, AudioSource, CaptureError};
use crate::container::StreamSpec;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Audio capture channel for one track
pub struct AudioCaptureChannel {
    id: String,
    track: AudioTrack,
    source_name: String,
    source: Arc<Mutex<Box<dyn AudioSource>>>,
    callback: Option<AudioCallback>,
}

impl AudioCaptureChannel {
    pub fn new(track: AudioTrack, source: Box<dyn AudioSource>) -> Self {
        let id = match track {
            AudioTrack::System => "system-audio",
            AudioTrack::Microphone => "microphone",
        };
        Self {
            id: id.to_string(),
            track,
            source_name: source.name().to_string(),
            source: Arc::new(Mutex::new(source)),
            callback: None,
        }
    }

    pub fn track(&self) -> AudioTrack {
        self.track
    }

    /// Run a device operation on the blocking pool
    async fn with_source<T, F>(&self, op: F) -> RecordingResult<T>
    where
        F: FnOnce(&mut dyn AudioSource) -> Result<T, CaptureError> + Send + 'static,
        T: Send + 'static,
    {
        let source = self.source.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut source = source.lock();
            op(&mut **source)
        })
        .await
        .map_err(|e| CaptureError::Stream(format!("audio worker failed: {}", e)))?;
        Ok(result?)
    }
}

#[async_trait]
impl RecordingChannel for AudioCaptureChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        match self.track {
            AudioTrack::System => ChannelType::SystemAudio,
            AudioTrack::Microphone => ChannelType::Microphone,
        }
    }

    fn is_available(&self) -> bool {
        self.source.lock().is_available()
    }

    fn stream_spec(&self) -> StreamSpec {
        StreamSpec::Audio(self.source.lock().format())
    }

    async fn start(&mut self, sink: StreamSink) -> RecordingResult<()> {
        if self.callback.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let callback = sink.audio_callback();
        let on_data = callback.clone();
        let format = self
            .with_source(move |source| {
                source.start(on_data)?;
                Ok(source.format())
            })
            .await?;
        self.callback = Some(callback);

        tracing::info!(
            "{} capture started from {} ({}Hz, {}ch)",
            self.id,
            self.source_name,
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        self.with_source(|source| source.stop()).await?;
        self.callback = None;
        tracing::info!("{} capture stopped", self.id);
        Ok(())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        self.with_source(|source| source.stop()).await?;
        tracing::debug!("{} capture halted for pause", self.id);
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        let callback = self.callback.clone().ok_or(RecordingError::NotRecording)?;
        self.with_source(move |source| {
            if !source.is_running() {
                source.start(callback)?;
            }
            Ok(())
        })
        .await?;
        tracing::debug!("{} capture resumed", self.id);
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.source.lock().is_running()
    }
}
