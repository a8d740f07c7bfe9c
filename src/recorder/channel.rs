//! Recording channels
//!
//! A channel feeds one stream of the session container: the screen sampler
//! or one of the audio captures.

use super::sink::StreamSink;
use super::state::RecordingState;
use crate::capture::traits::CaptureError;
use crate::container::{ContainerError, StreamSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Cannot {action} while {from:?}")]
    InvalidTransition {
        from: RecordingState,
        action: &'static str,
    },

    #[error("Missing runtime dependency: {0}")]
    Dependency(String),

    #[error("Failed to start recording: {0}")]
    Setup(String),

    #[error("Recording failed mid-session: {0}")]
    MidSession(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Kind of capture source behind a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelType {
    Display,
    SystemAudio,
    Microphone,
}

/// A capture source attached to the session container
#[async_trait]
pub trait RecordingChannel: Send {
    fn id(&self) -> &str;

    fn channel_type(&self) -> ChannelType;

    /// Whether the underlying device or surface can be captured
    fn is_available(&self) -> bool;

    /// Stream declaration for the container
    fn stream_spec(&self) -> StreamSpec;

    /// Begin delivering data into `sink`
    async fn start(&mut self, sink: StreamSink) -> RecordingResult<()>;

    /// Stop delivering and release capture handles
    async fn stop(&mut self) -> RecordingResult<()>;

    async fn pause(&mut self) -> RecordingResult<()>;

    async fn resume(&mut self) -> RecordingResult<()>;

    fn is_recording(&self) -> bool;
}
