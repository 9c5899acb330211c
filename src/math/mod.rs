//! Numeric building blocks for audio analysis.
//!
//! The radix-2 FFT used by the frequency analysis in [`crate::audio`].
//! Complex arithmetic comes from `num-complex`.

mod fft;

pub use fft::ComplexVector;
pub use num_complex::Complex64 as ComplexNumber;

/// Errors raised while analysing or converting audio.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Cannot transform an empty vector.")]
    EmptyInput,

    #[error("FFT length {0} is not a power of 2.")]
    NotPowerOfTwo(usize),

    #[error("The waveform has no samples.")]
    EmptyWaveForm,

    #[error("The waveform spans no time.")]
    ZeroDuration,

    #[error("Audio format has no channels.")]
    NoChannels,

    #[error("Channel {channel} requested from audio with {channels} channel(s).")]
    ChannelOutOfRange { channel: u16, channels: u16 },

    #[error("Unsupported sample format: {bits}-bit {kind}.")]
    UnsupportedSampleFormat { bits: u16, kind: &'static str },

    #[error("Audio buffer of {len} bytes is not a whole number of {frame_size}-byte frames.")]
    PartialFrame { len: usize, frame_size: usize },

    #[error("Playback ratio {0} is not a positive finite number.")]
    InvalidPlaybackRatio(f64),

    #[error("Audio format has zero-width samples ({bits} bits per sample).")]
    ZeroWidthSample { bits: u16 },

    #[error("Frequency graph has no plots.")]
    EmptyGraph,

    #[error("{0} is not implemented.")]
    NotImplemented(&'static str),
}
