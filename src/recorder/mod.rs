//! Recording system module
//!
//! - RecordingChannel trait for the screen sampler and audio captures
//! - SessionSink serializing all writes into one AVI container
//! - RecordingCoordinator owning the Idle/Recording/Paused state machine

pub mod audio;
pub mod channel;
pub mod coordinator;
pub mod display;
pub mod sink;
pub mod state;

pub use audio::AudioCaptureChannel;
pub use channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use display::DisplayCaptureChannel;
pub use sink::{AudioTrack, MuteFlags};
pub use state::{RecordingConfig, RecordingOutput, RecordingState, RecordingStatus};
