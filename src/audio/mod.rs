//! Audio buffers, waveforms and frequency analysis.
//!
//! This module provides:
//! - PCM buffers with cached decoding and meta-data
//! - Waveforms for time-domain manipulation
//! - Frequency graphs and fundamental frequency estimation
//! - WAV import, and rendering of MIDI documents to WAV

mod data;
pub mod export;
mod frequency_graph;
mod waveform;

pub use crate::math::AnalysisError;
pub use data::{AudioData, AudioFormat, AudioMetaData, SampleType};
pub use export::{load_wav, render_to_wav, save_wav};
pub use frequency_graph::{FrequencyGraph, Plot};
pub use waveform::{WaveForm, WaveSample};

/// Default bin strength a fundamental frequency must reach.
pub const DEFAULT_STRENGTH_THRESHOLD: f64 = 35.0;

/// Window length used when deriving [`AudioMetaData`].
pub const METADATA_FFT_SIZE: usize = 32768;
