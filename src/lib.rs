//! wavesynth - MIDI codec, wavetable synthesis and audio analysis.
//!
//! This library provides:
//! - A MIDI event model with a Standard MIDI File reader/writer and player
//! - Wavetable sample libraries loaded from SoundFont 2 banks or WAV files
//! - A sample-based synthesizer driven by live MIDI messages
//! - Complex FFT and frequency graphs for pitch and volume estimation

pub mod audio;
pub mod error;
pub mod math;
pub mod midi;
pub mod stream;
pub mod synth;
pub mod wavetable;

// Re-export commonly used types
pub use audio::{render_to_wav, AudioData, FrequencyGraph, WaveForm};
pub use error::{Error, ErrorReport, Result};
pub use math::{ComplexNumber, ComplexVector};
pub use midi::{ChannelEvent, Event, MidiDocument, MidiMessageSink, MidiPlayer, Track};
pub use synth::{SampleBasedSynth, SynthSettings};
pub use wavetable::{AudioSampleData, WavetableLibrary};
