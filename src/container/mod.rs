//! Multiplexed audio/video container
//!
//! Recordings are written as RIFF AVI files with OpenDML extensions:
//! - one uncompressed 32-bit RGB video stream (bottom-up DIB rows)
//! - one 16-bit PCM audio stream per capture source
//! - `idx1` over the first RIFF part plus `indx`/`ix##` indexes over all parts

pub mod avi;
pub mod frame;
pub mod probe;

use thiserror::Error;

pub use avi::{AviConfig, AviWriter, ContainerSummary, StreamId, StreamSpec};
pub use frame::pack_bottom_up;
pub use probe::{probe, AviInfo};

/// Container-related errors
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container exceeds the RIFF parts its indexes can address")]
    TooLarge,

    #[error("Unknown stream: {0}")]
    UnknownStream(usize),

    #[error("Stream {0} has the wrong type for this write")]
    StreamKind(usize),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid container: {0}")]
    Invalid(String),
}
