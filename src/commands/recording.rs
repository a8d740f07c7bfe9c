//! Recording commands

use super::AppState;
use crate::capture::AudioEndpoint;
use crate::recorder::{
    AudioCaptureChannel, AudioTrack, DisplayCaptureChannel, RecordingConfig, RecordingError,
    RecordingOutput, RecordingState, RecordingStatus,
};
use crate::utils::AppResult;
use std::path::PathBuf;

/// Start recording a `width` x `height` rectangle, defaulting to the primary
/// display size
pub async fn start_recording(
    state: &AppState,
    width: Option<u32>,
    height: Option<u32>,
) -> AppResult<PathBuf> {
    let (width, height) = match (width, height) {
        (Some(width), Some(height)) => (width, height),
        _ => {
            let primary = state
                .capture
                .displays()
                .into_iter()
                .find(|d| d.is_primary)
                .ok_or_else(|| RecordingError::Dependency("no display detected".to_string()))?;
            (width.unwrap_or(primary.width), height.unwrap_or(primary.height))
        }
    };

    let config = &state.config;
    let mut coordinator = state.coordinator.lock().await;
    if coordinator.state() != RecordingState::Idle {
        return Err(RecordingError::AlreadyRecording.into());
    }

    // Sources are reopened for each session so device changes are picked up
    coordinator.clear_channels()?;
    coordinator.add_channel(Box::new(DisplayCaptureChannel::new(
        state.capture.frame_source(width, height),
        config.frame_interval(),
    )));
    if config.capture_system_audio {
        coordinator.add_channel(Box::new(AudioCaptureChannel::new(
            AudioTrack::System,
            state
                .capture
                .audio_source(AudioEndpoint::Loopback, config.audio_sample_rate),
        )));
    }
    if config.capture_microphone {
        coordinator.add_channel(Box::new(AudioCaptureChannel::new(
            AudioTrack::Microphone,
            state
                .capture
                .audio_source(AudioEndpoint::Microphone, config.audio_sample_rate),
        )));
    }

    let path = coordinator
        .start(RecordingConfig {
            output_dir: config.recordings_dir.clone(),
            width,
            height,
            frame_interval_ms: config.frame_interval_ms,
            container_fps: config.container_fps,
        })
        .await?;
    Ok(path)
}

/// Stop recording; `None` when nothing was recording
pub async fn stop_recording(state: &AppState) -> AppResult<Option<RecordingOutput>> {
    let mut coordinator = state.coordinator.lock().await;
    Ok(coordinator.stop().await?)
}

pub async fn pause_recording(state: &AppState) -> AppResult<RecordingStatus> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator.pause().await?;
    Ok(coordinator.status())
}

pub async fn resume_recording(state: &AppState) -> AppResult<RecordingStatus> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator.resume().await?;
    Ok(coordinator.status())
}

/// Flip the system audio mute and return the new value
pub async fn toggle_mute(state: &AppState) -> bool {
    state.coordinator.lock().await.toggle_mute(AudioTrack::System)
}

/// Mute or unmute the microphone
pub async fn toggle_microphone(state: &AppState, muted: bool) -> bool {
    let coordinator = state.coordinator.lock().await;
    coordinator.set_muted(AudioTrack::Microphone, muted);
    coordinator.is_muted(AudioTrack::Microphone)
}

pub async fn recording_status(state: &AppState) -> RecordingStatus {
    state.coordinator.lock().await.status()
}
