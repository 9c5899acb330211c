//! Wavetable libraries: the sample sets a synthesizer plays from.
//!
//! A [`WavetableLibrary`] is an ordered list of [`AudioSampleData`], each a
//! PCM buffer tagged with the instrument, key/velocity range, pitch and loop
//! behaviour it is meant for. Libraries are loaded from SoundFont 2 banks or
//! single WAV files and saved in a compact binary form.

mod library;
mod riff;
mod sample;
mod soundfont;

pub use library::{GeneralInfo, VersionTag, WavetableLibrary};
pub use riff::Chunk;
pub use sample::{AudioSampleData, ChannelType, Character, Loop, Mode, Range};
pub use soundfont::{load_soundfont, read_soundfont};

use crate::math::AnalysisError;
use crate::stream::StreamError;

/// Errors raised while loading, saving or validating wavetables.
#[derive(Debug, thiserror::Error)]
pub enum WavetableError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode library: {0}")]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Expected a \"{expected}\" chunk but found \"{found}\".")]
    UnexpectedChunk { expected: &'static str, found: String },

    #[error("Expected RIFF form type \"{expected}\" but found \"{found}\".")]
    UnexpectedForm { expected: &'static str, found: String },

    #[error("No \"{0}\" chunk found.")]
    MissingChunk(&'static str),

    #[error("The \"{id}\" chunk is {len} bytes, not a multiple of its {record}-byte records.")]
    ChunkSize {
        id: &'static str,
        len: usize,
        record: usize,
    },

    #[error("The \"{id}\" chunk should be {expected} bytes but is {actual}.")]
    ChunkLength {
        id: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Sample headers are not terminated by an \"EOS\" record.")]
    UnterminatedSampleHeaders,

    #[error("Sample header \"{name}\" spans [{start}, {end}) outside the {available} available frames.")]
    SampleBounds {
        name: String,
        start: u32,
        end: u32,
        available: usize,
    },

    #[error("Loop boundaries of sample \"{0}\" are not contained within its sample boundaries.")]
    LoopBounds(String),

    #[error("Sample ID {0} does not exist.")]
    SampleIdOutOfRange(u16),

    #[error("Instrument ID {0} does not exist.")]
    InstrumentIdOutOfRange(u16),

    #[error("Zone index {index} in \"{id}\" is out of range.")]
    ZoneIndexOutOfRange { id: &'static str, index: usize },

    #[error("{0} is not implemented.")]
    NotImplemented(&'static str),
}
