//! Recording coordinator
//!
//! Owns the recording state machine and the session container. Channels are
//! attached once and reused across sessions; each start opens a fresh AVI
//! file and hands every channel a sink for its stream.

use super::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use super::sink::{AudioTrack, MuteFlags, SessionSink};
use super::state::{
    output_file_name, RecordingConfig, RecordingOutput, RecordingSegment, RecordingSession,
    RecordingState, RecordingStatus,
};
use crate::container::{AviConfig, AviWriter, ContainerError, StreamId, StreamSpec};
use chrono::Local;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started, writing to the given file
    Started(PathBuf),
    /// Recording stopped and the container was finalized
    Stopped(PathBuf),
    Paused,
    Resumed,
    /// A write failed; that session must be stopped
    Failed { session: Uuid, message: String },
    MuteChanged { track: AudioTrack, muted: bool },
}

/// A channel taking part in the current session
#[derive(Debug, Clone, Copy)]
struct ActiveChannel {
    index: usize,
    stream: StreamId,
    track: Option<AudioTrack>,
}

fn track_for(channel_type: ChannelType) -> Option<AudioTrack> {
    match channel_type {
        ChannelType::Display => None,
        ChannelType::SystemAudio => Some(AudioTrack::System),
        ChannelType::Microphone => Some(AudioTrack::Microphone),
    }
}

fn stream_rank(channel_type: ChannelType) -> u8 {
    match channel_type {
        ChannelType::Display => 0,
        ChannelType::SystemAudio => 1,
        ChannelType::Microphone => 2,
    }
}

/// Manages the recording channels and the session lifecycle
pub struct RecordingCoordinator {
    /// Current recording state
    state: Arc<RwLock<RecordingState>>,

    /// Recording channels, ordered video first
    channels: Vec<Box<dyn RecordingChannel>>,

    /// Channels started for the current session
    active: Vec<ActiveChannel>,

    session: Option<RecordingSession>,

    sink: Option<Arc<SessionSink>>,

    /// Time the current session started
    origin: Option<Instant>,

    mute: Arc<MuteFlags>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingCoordinator {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            channels: Vec::new(),
            active: Vec::new(),
            session: None,
            sink: None,
            origin: None,
            mute: Arc::new(MuteFlags::default()),
            event_tx,
        }
    }

    /// Add a recording channel. The container declares streams in the order
    /// display, system audio, microphone regardless of insertion order.
    pub fn add_channel(&mut self, channel: Box<dyn RecordingChannel>) {
        tracing::info!("Adding channel: {}", channel.id());
        self.channels.push(channel);
        self.channels
            .sort_by_key(|channel| stream_rank(channel.channel_type()));
    }

    /// Drop all channels. Only allowed while idle.
    pub fn clear_channels(&mut self) -> RecordingResult<()> {
        let state = self.state();
        if state != RecordingState::Idle {
            return Err(RecordingError::InvalidTransition {
                from: state,
                action: "replace channels",
            });
        }
        self.channels.clear();
        Ok(())
    }

    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    /// Id of the session in progress
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Milliseconds since the current session started, pauses included
    fn offset_ms(&self) -> f64 {
        self.origin
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    fn check_dependencies(&self, config: &RecordingConfig) -> RecordingResult<()> {
        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            RecordingError::Dependency(format!(
                "output directory {} is not writable: {}",
                config.output_dir.display(),
                e
            ))
        })?;

        let display = self
            .channels
            .iter()
            .find(|c| c.channel_type() == ChannelType::Display)
            .ok_or_else(|| RecordingError::Dependency("no screen capture source".to_string()))?;

        if !display.is_available() {
            return Err(RecordingError::Dependency(
                "screen capture is not available on this system".to_string(),
            ));
        }

        match display.stream_spec() {
            StreamSpec::Video { width, height }
                if width == config.width && height == config.height => {}
            StreamSpec::Video { width, height } => {
                return Err(RecordingError::Setup(format!(
                    "screen source is {}x{} but {}x{} was requested",
                    width, height, config.width, config.height
                )));
            }
            StreamSpec::Audio(_) => {
                return Err(RecordingError::Setup(
                    "display channel declared an audio stream".to_string(),
                ));
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(RecordingError::Setup(format!(
                "invalid capture size {}x{}",
                config.width, config.height
            )));
        }

        Ok(())
    }

    /// Start recording
    pub async fn start(&mut self, config: RecordingConfig) -> RecordingResult<PathBuf> {
        if self.state() != RecordingState::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        self.check_dependencies(&config)?;

        let mut active = Vec::new();
        let mut streams = Vec::new();
        for (index, channel) in self.channels.iter().enumerate() {
            if !channel.is_available() {
                tracing::warn!("Channel {} is not available, recording without it", channel.id());
                continue;
            }
            active.push(ActiveChannel {
                index,
                stream: StreamId(streams.len()),
                track: track_for(channel.channel_type()),
            });
            streams.push(channel.stream_spec());
        }

        let output_path = unique_output_path(&config.output_dir, &output_file_name(Local::now()));
        tracing::info!("Starting recording to: {}", output_path.display());

        if config.container_fps as u64 * config.frame_interval_ms != 1000 {
            tracing::debug!(
                "Container declares {} fps while frames are sampled every {}ms",
                config.container_fps,
                config.frame_interval_ms
            );
        }

        let avi_config = AviConfig::new(config.container_fps, streams);
        let writer = AviWriter::create(&output_path, &avi_config).map_err(|e| match e {
            ContainerError::Io(io) => RecordingError::Io(io),
            other => RecordingError::Container(other),
        })?;
        let session = RecordingSession::new(output_path.clone(), config.frame_interval_ms);
        let sink = SessionSink::new(writer, session.id, self.mute.clone(), self.event_tx.clone());

        let mut started = Vec::new();
        for entry in &active {
            let stream = sink.stream(entry.stream, entry.track);
            let channel = &mut self.channels[entry.index];
            if let Err(e) = channel.start(stream).await {
                tracing::error!("Failed to start {}: {}", channel.id(), e);
                self.rollback(&started, &sink, &output_path).await;
                return Err(e);
            }
            started.push(*entry);
        }

        self.origin = Some(Instant::now());
        self.session = Some(session);
        self.sink = Some(sink);
        self.active = active;

        *self.state.write() = RecordingState::Recording;
        let _ = self
            .event_tx
            .send(RecordingEvent::Started(output_path.clone()));

        tracing::info!("Recording started");
        Ok(output_path)
    }

    /// Undo a partially started session
    async fn rollback(&mut self, started: &[ActiveChannel], sink: &SessionSink, path: &Path) {
        for entry in started.iter().rev() {
            let channel = &mut self.channels[entry.index];
            if let Err(e) = channel.stop().await {
                tracing::warn!("Failed to stop {} during cleanup: {}", channel.id(), e);
            }
        }
        if let Err(e) = sink.finish() {
            tracing::warn!("Failed to close partial recording: {}", e);
        }
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove partial recording {}: {}", path.display(), e);
        }
    }

    /// Stop recording and finalize the container.
    ///
    /// Returns `Ok(None)` when nothing is recording. If a write failed during
    /// the session the container is still finalized, then the failure is
    /// returned.
    pub async fn stop(&mut self) -> RecordingResult<Option<RecordingOutput>> {
        let state = self.state();
        if state == RecordingState::Idle {
            return Ok(None);
        }

        tracing::info!("Stopping recording");

        let end = self.offset_ms();
        if state == RecordingState::Recording {
            if let Some(segment) = self.session.as_mut().and_then(|s| s.segments.last_mut()) {
                segment.end(end);
            }
        }

        let active = std::mem::take(&mut self.active);
        for entry in &active {
            let channel = &mut self.channels[entry.index];
            if let Err(e) = channel.stop().await {
                tracing::warn!("Failed to stop {}: {}", channel.id(), e);
            }
        }

        let sink = self.sink.take();
        let session = self.session.take();
        self.origin = None;
        *self.state.write() = RecordingState::Idle;

        let (Some(sink), Some(session)) = (sink, session) else {
            return Err(RecordingError::NotRecording);
        };

        let failure = sink.failure();
        let summary = sink.finish()?.unwrap_or_default();

        let bytes_for = |track: AudioTrack| {
            active
                .iter()
                .find(|entry| entry.track == Some(track))
                .map(|entry| summary.bytes.get(entry.stream.0).copied().unwrap_or(0))
        };

        let output = RecordingOutput {
            session_id: session.id,
            output_path: session.output_path.clone(),
            duration_ms: session.elapsed_ms(end, false),
            segment_count: session.segments.len(),
            video_frames: summary.total_frames,
            system_audio_bytes: bytes_for(AudioTrack::System),
            microphone_audio_bytes: bytes_for(AudioTrack::Microphone),
        };

        let _ = self
            .event_tx
            .send(RecordingEvent::Stopped(output.output_path.clone()));

        tracing::info!(
            "Recording stopped. Duration: {:.0}ms, {} frames, {} segments",
            output.duration_ms,
            output.video_frames,
            output.segment_count
        );

        match failure {
            Some(message) => Err(RecordingError::MidSession(message)),
            None => Ok(Some(output)),
        }
    }

    /// Pause recording
    pub async fn pause(&mut self) -> RecordingResult<()> {
        let state = self.state();
        if state != RecordingState::Recording {
            return Err(RecordingError::InvalidTransition {
                from: state,
                action: "pause",
            });
        }

        tracing::info!("Pausing recording");

        for (done, entry) in self.active.iter().enumerate() {
            if let Err(e) = self.channels[entry.index].pause().await {
                tracing::error!("Failed to pause {}: {}", self.channels[entry.index].id(), e);
                // Keep the session recording as a whole
                for paused in self.active[..done].iter().rev() {
                    if let Err(e) = self.channels[paused.index].resume().await {
                        tracing::warn!("Failed to resume {}: {}", self.channels[paused.index].id(), e);
                    }
                }
                return Err(e);
            }
        }

        let end = self.offset_ms();
        if let Some(segment) = self.session.as_mut().and_then(|s| s.segments.last_mut()) {
            segment.end(end);
        }
        if let Some(sink) = &self.sink {
            sink.set_paused(true);
        }

        *self.state.write() = RecordingState::Paused;
        let _ = self.event_tx.send(RecordingEvent::Paused);

        Ok(())
    }

    /// Resume recording
    pub async fn resume(&mut self) -> RecordingResult<()> {
        let state = self.state();
        if state != RecordingState::Paused {
            return Err(RecordingError::InvalidTransition {
                from: state,
                action: "resume",
            });
        }

        tracing::info!("Resuming recording");

        for (done, entry) in self.active.iter().enumerate() {
            if let Err(e) = self.channels[entry.index].resume().await {
                tracing::error!("Failed to resume {}: {}", self.channels[entry.index].id(), e);
                for resumed in self.active[..done].iter().rev() {
                    if let Err(e) = self.channels[resumed.index].pause().await {
                        tracing::warn!("Failed to pause {}: {}", self.channels[resumed.index].id(), e);
                    }
                }
                return Err(e);
            }
        }

        let offset = self.offset_ms();
        if let Some(session) = self.session.as_mut() {
            let index = session.segments.len();
            session.segments.push(RecordingSegment::new(index, offset));
        }
        if let Some(sink) = &self.sink {
            sink.set_paused(false);
        }

        *self.state.write() = RecordingState::Recording;
        let _ = self.event_tx.send(RecordingEvent::Resumed);

        Ok(())
    }

    /// Recorded time in milliseconds, paused stretches excluded
    pub fn duration_ms(&self) -> f64 {
        let open = self.state() == RecordingState::Recording;
        self.session
            .as_ref()
            .map(|s| s.elapsed_ms(self.offset_ms(), open))
            .unwrap_or(0.0)
    }

    pub fn status(&self) -> RecordingStatus {
        RecordingStatus {
            state: self.state(),
            duration_ms: self.duration_ms(),
            output_path: self.session.as_ref().map(|s| s.output_path.clone()),
            system_muted: self.mute.is_muted(AudioTrack::System),
            microphone_muted: self.mute.is_muted(AudioTrack::Microphone),
        }
    }

    /// Flip a track's mute flag and return the new value
    pub fn toggle_mute(&self, track: AudioTrack) -> bool {
        let muted = self.mute.toggle(track);
        tracing::info!("{:?} audio {}", track, if muted { "muted" } else { "unmuted" });
        let _ = self.event_tx.send(RecordingEvent::MuteChanged { track, muted });
        muted
    }

    pub fn set_muted(&self, track: AudioTrack, muted: bool) {
        self.mute.set_muted(track, muted);
        tracing::info!("{:?} audio {}", track, if muted { "muted" } else { "unmuted" });
        let _ = self.event_tx.send(RecordingEvent::MuteChanged { track, muted });
    }

    pub fn is_muted(&self, track: AudioTrack) -> bool {
        self.mute.is_muted(track)
    }
}

impl Default for RecordingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// `dir/name`, or `dir/stem_N.ext` when a file of that name already exists
fn unique_output_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
