//! Recording state management
//!
//! Defines the recording state machine and session tracking.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
}

/// One uninterrupted stretch of recording between start/resume and pause/stop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this segment in milliseconds
    pub duration_ms: f64,

    /// Offset from session start when the segment began
    pub start_ms: f64,

    /// Offset from session start when the segment ended
    pub end_ms: f64,

    /// Unix timestamp when the segment began
    pub unix_start_ms: u64,

    /// Unix timestamp when the segment ended
    pub unix_end_ms: u64,
}

impl RecordingSegment {
    /// Create a new segment starting now
    pub fn new(index: usize, offset_ms: f64) -> Self {
        let now = Utc::now();
        Self {
            index,
            duration_ms: 0.0,
            start_ms: offset_ms,
            end_ms: offset_ms,
            unix_start_ms: now.timestamp_millis() as u64,
            unix_end_ms: now.timestamp_millis() as u64,
        }
    }

    /// End the segment
    pub fn end(&mut self, offset_ms: f64) {
        self.end_ms = offset_ms;
        self.duration_ms = self.end_ms - self.start_ms;
        self.unix_end_ms = Utc::now().timestamp_millis() as u64;
    }
}

/// The single active recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: Uuid,

    /// Container file being written
    pub output_path: PathBuf,

    /// Screen sampling interval
    pub frame_interval_ms: u64,

    pub started_at: DateTime<Local>,

    /// Active stretches; paused time falls between them
    pub segments: Vec<RecordingSegment>,
}

impl RecordingSession {
    pub fn new(output_path: PathBuf, frame_interval_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            output_path,
            frame_interval_ms,
            started_at: Local::now(),
            segments: vec![RecordingSegment::new(0, 0.0)],
        }
    }

    /// Recorded time excluding pauses. `now_ms` is the current offset from
    /// session start; it only counts while the last segment is open.
    pub fn elapsed_ms(&self, now_ms: f64, segment_open: bool) -> f64 {
        let closed: f64 = self
            .segments
            .iter()
            .take(self.segments.len().saturating_sub(1))
            .map(|s| s.duration_ms)
            .sum();

        let current = match self.segments.last() {
            Some(last) if segment_open => now_ms - last.start_ms,
            Some(last) => last.duration_ms,
            None => 0.0,
        };

        closed + current
    }
}

/// Parameters for starting a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Directory receiving the container file
    pub output_dir: PathBuf,

    /// Sampling rectangle width in pixels
    pub width: u32,

    /// Sampling rectangle height in pixels
    pub height: u32,

    /// Screen sampling interval
    pub frame_interval_ms: u64,

    /// Frame rate declared in the container
    pub container_fps: u32,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    pub session_id: Uuid,

    /// Path to the finalized container
    pub output_path: PathBuf,

    /// Recorded time excluding pauses
    pub duration_ms: f64,

    /// Number of recorded stretches (pauses + 1)
    pub segment_count: usize,

    pub video_frames: u32,

    /// PCM bytes written from the system loopback stream
    pub system_audio_bytes: Option<u64>,

    /// PCM bytes written from the microphone stream
    pub microphone_audio_bytes: Option<u64>,
}

/// Snapshot reported to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub state: RecordingState,
    pub duration_ms: f64,
    pub output_path: Option<PathBuf>,
    pub system_muted: bool,
    pub microphone_muted: bool,
}

/// Container filename for a recording started at `at`
pub fn output_file_name(at: DateTime<Local>) -> String {
    format!("Recording_{}.avi", at.format("%Y%m%d_%H%M%S"))
}
