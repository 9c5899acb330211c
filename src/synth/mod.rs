//! Sample-based synthesis.
//!
//! [`SampleBasedSynth`] turns live MIDI messages into audio by looking up
//! samples in a shared [`WavetableLibrary`](crate::wavetable::WavetableLibrary)
//! and playing each sounding note through its own small graph of
//! [`SynthModule`]s.

mod engine;
mod module;
mod note;

pub use engine::SampleBasedSynth;
pub use module::{AttenuationModule, LoopedAudioModule, PitchShiftModule, SynthModule};
pub use note::{Note, NoteState};

use crate::error::ErrorReport;
use crate::math::AnalysisError;
use crate::midi::{pitch_to_frequency, MidiError};
use crate::wavetable::AudioSampleData;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Output sample rate used when none is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Frames rendered per [`SampleBasedSynth::process`] call by default.
pub const DEFAULT_BUFFER_FRAMES: usize = 256;

/// Errors raised by the synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("No wavetable library is attached to the synthesizer.")]
    NoLibrary,

    #[error("Channel {0} is out of range (0-15).")]
    ChannelOutOfRange(u8),

    #[error("Left and right buffers differ in length ({left} vs {right}).")]
    BufferMismatch { left: usize, right: usize },

    #[error("Invalid synth settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to parse synth settings: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    Initialization(ErrorReport),
}

/// Rendering parameters of a synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    /// Output frames per second.
    pub sample_rate: u32,
    /// Frames per ear rendered by each [`SampleBasedSynth::process`] call.
    pub buffer_frames: usize,
    /// Linear gain applied to the mixed output.
    pub master_volume: f32,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            master_volume: 1.0,
        }
    }
}

impl SynthSettings {
    /// Duration of one processing buffer.
    pub fn buffer_seconds(&self) -> f64 {
        self.buffer_frames as f64 / f64::from(self.sample_rate)
    }

    /// Checks that the settings can drive a synthesizer.
    ///
    /// # Errors
    ///
    /// Fails on a zero sample rate or buffer size, or a negative or non-finite
    /// volume
    pub fn validate(&self) -> Result<(), SynthError> {
        if self.sample_rate == 0 {
            return Err(SynthError::InvalidSettings("sample rate is zero".into()));
        }
        if self.buffer_frames == 0 {
            return Err(SynthError::InvalidSettings("buffer size is zero".into()));
        }
        if !self.master_volume.is_finite() || self.master_volume < 0.0 {
            return Err(SynthError::InvalidSettings(format!(
                "master volume {} is not a non-negative number",
                self.master_volume
            )));
        }
        Ok(())
    }

    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, SynthError> {
        let settings: SynthSettings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read, isn't valid JSON or holds invalid
    /// settings
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SynthError> {
        let settings = Self::from_json(&fs::read_to_string(path.as_ref())?)?;
        tracing::debug!("Loaded synth settings from {}", path.as_ref().display());
        Ok(settings)
    }
}

/// Playback-rate ratio that makes a sample sound at `key` when rendered at
/// `output_rate`.
///
/// With a known original pitch the ratio is
/// `2^((key - original_pitch + fine_tune_cents / 100) / 12)`. A sample with an
/// unknown pitch is tuned from its estimated frequency instead, and plays at
/// its recorded speed if no estimate exists. Either way the ratio includes the
/// conversion from the sample's rate to the output rate.
///
/// # Errors
///
/// Fails if the pitch has to be estimated and the audio can't be analysed, or
/// if either rate is zero so the ratio isn't a positive finite number
pub fn pitch_shift_ratio(
    sample: &AudioSampleData,
    key: u8,
    output_rate: u32,
) -> Result<f64, AnalysisError> {
    let rate_conversion =
        f64::from(sample.audio.format().frames_per_second) / f64::from(output_rate);
    let cents = f64::from(sample.character.fine_tune_cents);

    let ratio = if let Some(original) = sample.character.known_pitch() {
        let semitones = f64::from(key) - f64::from(original) + cents / 100.0;
        2f64.powf(semitones / 12.0) * rate_conversion
    } else {
        match sample.audio.meta_data()?.pitch_hz {
            Some(estimated_hz) if estimated_hz > 0.0 => {
                pitch_to_frequency(f64::from(key)) / estimated_hz
                    * 2f64.powf(cents / 1200.0)
                    * rate_conversion
            }
            _ => {
                tracing::debug!(
                    "Sample \"{}\" has no known or estimated pitch; playing unshifted",
                    sample.name
                );
                rate_conversion
            }
        }
    };

    if ratio.is_finite() && ratio > 0.0 {
        Ok(ratio)
    } else {
        Err(AnalysisError::InvalidPlaybackRatio(ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioData;
    use approx::assert_relative_eq;

    fn sample(original_pitch: i8, rate: u32) -> AudioSampleData {
        let mut sample = AudioSampleData::new("s", AudioData::from_f32_samples(1, rate, &[0.0; 64]));
        sample.character.original_pitch = original_pitch;
        sample
    }

    #[test]
    fn test_pitch_ratio_octaves() {
        let s = sample(60, 44100);
        assert_relative_eq!(pitch_shift_ratio(&s, 60, 44100).unwrap(), 1.0);
        assert_relative_eq!(pitch_shift_ratio(&s, 72, 44100).unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(pitch_shift_ratio(&s, 48, 44100).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pitch_ratio_fine_tune_and_rate() {
        let mut s = sample(60, 22050);
        s.character.fine_tune_cents = 100;
        // One semitone up, at half the output rate
        let expected = 2f64.powf(1.0 / 12.0) * 0.5;
        assert_relative_eq!(pitch_shift_ratio(&s, 60, 44100).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_pitch_ratio_estimated() {
        let rate = 8000;
        let samples: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin())
            .collect();
        let s = AudioSampleData::new("sine", AudioData::from_f32_samples(1, rate, &samples));
        // A4 played back at A4 needs no shift
        let ratio = pitch_shift_ratio(&s, 69, rate).unwrap();
        assert_relative_eq!(ratio, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_pitch_ratio_without_estimate() {
        let s = sample(-1, 22050);
        assert_relative_eq!(pitch_shift_ratio(&s, 90, 44100).unwrap(), 0.5);
    }

    #[test]
    fn test_pitch_ratio_rejects_zero_rates() {
        let s = sample(60, 44100);
        assert!(matches!(
            pitch_shift_ratio(&s, 60, 0),
            Err(AnalysisError::InvalidPlaybackRatio(_))
        ));
        let silent_rate = sample(60, 0);
        assert!(matches!(
            pitch_shift_ratio(&silent_rate, 60, 44100),
            Err(AnalysisError::InvalidPlaybackRatio(_))
        ));
    }

    #[test]
    fn test_settings_json() {
        let settings = SynthSettings::from_json(r#"{"sample_rate": 22050}"#).unwrap();
        assert_eq!(settings.sample_rate, 22050);
        assert_eq!(settings.buffer_frames, DEFAULT_BUFFER_FRAMES);
        assert_relative_eq!(settings.master_volume, 1.0);
        assert_relative_eq!(
            SynthSettings::default().buffer_seconds(),
            256.0 / 44100.0
        );

        assert!(matches!(
            SynthSettings::from_json(r#"{"buffer_frames": 0}"#),
            Err(SynthError::InvalidSettings(_))
        ));
        assert!(matches!(
            SynthSettings::from_json("not json"),
            Err(SynthError::SettingsFormat(_))
        ));
    }
}
