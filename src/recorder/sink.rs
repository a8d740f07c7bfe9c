//! Session sink
//!
//! Single owner of the session container. The screen sampler and both audio
//! capture threads write through it; the lock keeps chunks whole and in
//! arrival order. Pause and mute are enforced here, at the data boundary.

use super::coordinator::RecordingEvent;
use crate::capture::traits::AudioCallback;
use crate::container::{AviWriter, ContainerError, ContainerSummary, StreamId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

type FileWriter = AviWriter<BufWriter<File>>;

/// Audio source whose data can be muted independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioTrack {
    System,
    Microphone,
}

/// Per-track mute flags, shared across sessions
#[derive(Debug, Default)]
pub struct MuteFlags {
    system: AtomicBool,
    microphone: AtomicBool,
}

impl MuteFlags {
    fn flag(&self, track: AudioTrack) -> &AtomicBool {
        match track {
            AudioTrack::System => &self.system,
            AudioTrack::Microphone => &self.microphone,
        }
    }

    pub fn is_muted(&self, track: AudioTrack) -> bool {
        self.flag(track).load(Ordering::SeqCst)
    }

    pub fn set_muted(&self, track: AudioTrack, muted: bool) {
        self.flag(track).store(muted, Ordering::SeqCst);
    }

    /// Flip a track's flag and return the new value
    pub fn toggle(&self, track: AudioTrack) -> bool {
        !self.flag(track).fetch_xor(true, Ordering::SeqCst)
    }
}

/// Shared writer for one recording session
pub struct SessionSink {
    session: Uuid,
    writer: Mutex<Option<FileWriter>>,
    paused: AtomicBool,
    failure: Mutex<Option<String>>,
    mute: Arc<MuteFlags>,
    events: broadcast::Sender<RecordingEvent>,
}

impl SessionSink {
    pub fn new(
        writer: FileWriter,
        session: Uuid,
        mute: Arc<MuteFlags>,
        events: broadcast::Sender<RecordingEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            writer: Mutex::new(Some(writer)),
            paused: AtomicBool::new(false),
            failure: Mutex::new(None),
            mute,
            events,
        })
    }

    /// Handle for one stream of the container
    pub fn stream(self: &Arc<Self>, stream: StreamId, track: Option<AudioTrack>) -> StreamSink {
        StreamSink {
            session: self.clone(),
            stream,
            track,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// First write failure of the session, if any
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Remember the first failure and tell the app to stop the session
    pub fn record_failure(&self, message: String) {
        let mut failure = self.failure.lock();
        if failure.is_some() {
            return;
        }
        tracing::error!("Recording write failed: {}", message);
        *failure = Some(message.clone());
        let _ = self.events.send(RecordingEvent::Failed {
            session: self.session,
            message,
        });
    }

    fn with_writer<F>(&self, write: F) -> bool
    where
        F: FnOnce(&mut FileWriter) -> Result<(), ContainerError>,
    {
        if self.failure.lock().is_some() {
            return false;
        }
        let result = {
            let mut guard = self.writer.lock();
            match guard.as_mut() {
                Some(writer) => write(writer),
                // Late buffers after finish are dropped
                None => return false,
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.record_failure(e.to_string());
                false
            }
        }
    }

    /// Append a packed video frame as a key frame
    pub fn write_video(&self, stream: StreamId, frame: &[u8]) -> bool {
        self.with_writer(|writer| writer.write_video_frame(stream, frame, true))
    }

    /// Append PCM audio unless paused or the track is muted
    pub fn write_audio(&self, stream: StreamId, track: AudioTrack, data: &[u8]) -> bool {
        if self.is_paused() || self.mute.is_muted(track) {
            return false;
        }
        self.with_writer(|writer| writer.write_audio(stream, data))
    }

    /// Bytes written so far to a stream
    pub fn byte_count(&self, stream: StreamId) -> u64 {
        self.writer
            .lock()
            .as_ref()
            .map(|w| w.byte_count(stream))
            .unwrap_or(0)
    }

    /// Chunks written so far to a stream
    pub fn chunk_count(&self, stream: StreamId) -> u32 {
        self.writer
            .lock()
            .as_ref()
            .map(|w| w.chunk_count(stream))
            .unwrap_or(0)
    }

    /// Write the index and close the file. Later writes are ignored.
    pub fn finish(&self) -> Result<Option<ContainerSummary>, ContainerError> {
        let writer = self.writer.lock().take();
        match writer {
            Some(writer) => {
                let (out, summary) = writer.finish()?;
                drop(out);
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}

/// One stream's view of the session sink
#[derive(Clone)]
pub struct StreamSink {
    session: Arc<SessionSink>,
    stream: StreamId,
    track: Option<AudioTrack>,
}

impl StreamSink {
    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    pub fn has_failed(&self) -> bool {
        self.session.failure().is_some()
    }

    pub fn write_video(&self, frame: &[u8]) -> bool {
        self.session.write_video(self.stream, frame)
    }

    /// Callback for an audio source feeding this stream
    pub fn audio_callback(&self) -> AudioCallback {
        let session = self.session.clone();
        let stream = self.stream;
        let track = self.track.unwrap_or(AudioTrack::System);
        Arc::new(move |data: &[u8]| {
            session.write_audio(stream, track, data);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::AudioFormat;
    use crate::container::{AviConfig, StreamSpec};
    use tempfile::tempdir;

    fn sink(dir: &std::path::Path) -> (Arc<SessionSink>, Arc<MuteFlags>, broadcast::Receiver<RecordingEvent>) {
        let config = AviConfig::new(
            20,
            vec![
                StreamSpec::Video { width: 2, height: 2 },
                StreamSpec::Audio(AudioFormat::pcm16(44100, 2)),
            ],
        );
        let writer = AviWriter::create(&dir.join("s.avi"), &config).unwrap();
        let mute = Arc::new(MuteFlags::default());
        let (tx, rx) = broadcast::channel(8);
        (SessionSink::new(writer, Uuid::new_v4(), mute.clone(), tx), mute, rx)
    }

    #[test]
    fn test_toggle_returns_new_state() {
        let flags = MuteFlags::default();
        assert!(flags.toggle(AudioTrack::System));
        assert!(flags.is_muted(AudioTrack::System));
        assert!(!flags.toggle(AudioTrack::System));
        assert!(!flags.is_muted(AudioTrack::Microphone));
    }

    #[test]
    fn test_paused_and_muted_audio_dropped() {
        let dir = tempdir().unwrap();
        let (sink, mute, _rx) = sink(dir.path());
        let audio = sink.stream(StreamId(1), Some(AudioTrack::System)).audio_callback();

        audio(&[0u8; 8]);
        sink.set_paused(true);
        audio(&[0u8; 8]);
        sink.set_paused(false);
        mute.set_muted(AudioTrack::System, true);
        audio(&[0u8; 8]);

        assert_eq!(sink.byte_count(StreamId(1)), 8);
    }

    #[test]
    fn test_failure_reported_once_and_blocks_writes() {
        let dir = tempdir().unwrap();
        let (sink, _mute, mut rx) = sink(dir.path());

        // Wrong frame size is a write error
        assert!(!sink.write_video(StreamId(0), &[0u8; 3]));
        assert!(!sink.write_video(StreamId(0), &[0u8; 3]));
        assert!(sink.failure().is_some());

        match rx.try_recv() {
            Ok(RecordingEvent::Failed { message, .. }) => {
                assert!(message.contains("expected 16 bytes"))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());

        // Valid writes are refused once the session has failed
        assert!(!sink.write_video(StreamId(0), &[0u8; 16]));
    }

    #[test]
    fn test_writes_after_finish_ignored() {
        let dir = tempdir().unwrap();
        let (sink, _mute, _rx) = sink(dir.path());
        assert!(sink.write_video(StreamId(0), &[0u8; 16]));
        let summary = sink.finish().unwrap().unwrap();
        assert_eq!(summary.total_frames, 1);

        assert!(!sink.write_video(StreamId(0), &[0u8; 16]));
        assert!(sink.finish().unwrap().is_none());
        assert!(sink.failure().is_none());
    }
}
