//! PCM audio buffers and their format.
//!
//! [`AudioData`] owns raw interleaved PCM bytes. Decoded samples and the
//! derived [`AudioMetaData`] are cached on first use and thrown away whenever
//! the buffer or the format changes.

use super::{FrequencyGraph, WaveForm, DEFAULT_STRENGTH_THRESHOLD, METADATA_FFT_SIZE};
use crate::math::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Encoding of individual samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    Signed,
    Unsigned,
    Float,
    ALaw,
}

impl SampleType {
    pub fn name(&self) -> &'static str {
        match self {
            SampleType::Signed => "signed integer",
            SampleType::Unsigned => "unsigned integer",
            SampleType::Float => "IEEE floating-point",
            SampleType::ALaw => "A-law",
        }
    }
}

/// Layout of a PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub bits_per_sample: u16,
    pub channels: u16,
    pub frames_per_second: u32,
    pub sample_type: SampleType,
}

impl AudioFormat {
    pub fn new(
        bits_per_sample: u16,
        channels: u16,
        frames_per_second: u32,
        sample_type: SampleType,
    ) -> Self {
        Self {
            bits_per_sample,
            channels,
            frames_per_second,
            sample_type,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_frame() as u64 * u64::from(self.frames_per_second)
    }

    /// Checks that frames of this format have a size.
    ///
    /// # Errors
    ///
    /// Fails on zero channels or on samples narrower than a byte
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.channels == 0 {
            return Err(AnalysisError::NoChannels);
        }
        if self.bytes_per_sample() == 0 {
            return Err(AnalysisError::ZeroWidthSample {
                bits: self.bits_per_sample,
            });
        }
        Ok(())
    }

    /// Rounds a byte count down to a whole number of frames.
    pub fn round_down_to_frame(&self, bytes: usize) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            frame => bytes - bytes % frame,
        }
    }

    pub fn bytes_to_seconds(&self, bytes: usize) -> f64 {
        match self.bytes_per_second() {
            0 => 0.0,
            rate => self.round_down_to_frame(bytes) as f64 / rate as f64,
        }
    }

    pub fn bytes_from_seconds(&self, seconds: f64) -> usize {
        let bytes = (seconds * self.bytes_per_second() as f64) as usize;
        self.round_down_to_frame(bytes)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-bit {}, {} channel(s), {} Hz",
            self.bits_per_sample,
            self.sample_type.name(),
            self.channels,
            self.frames_per_second
        )
    }
}

/// Properties derived by analysing the audio.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioMetaData {
    /// Estimated fundamental frequency, if one was found.
    pub pitch_hz: Option<f64>,
    /// Mean absolute amplitude of the peaks and valleys of channel 0.
    pub volume: f64,
}

/// A PCM buffer with its format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioData {
    format: AudioFormat,
    buffer: Arc<Vec<u8>>,
    #[serde(skip)]
    samples: OnceLock<Arc<Vec<f32>>>,
    #[serde(skip)]
    meta_data: OnceLock<AudioMetaData>,
}

impl AudioData {
    pub fn new(format: AudioFormat, buffer: Vec<u8>) -> Self {
        Self {
            format,
            buffer: Arc::new(buffer),
            samples: OnceLock::new(),
            meta_data: OnceLock::new(),
        }
    }

    /// Builds 32-bit float audio from interleaved samples.
    pub fn from_f32_samples(channels: u16, frames_per_second: u32, samples: &[f32]) -> Self {
        let buffer = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(
            AudioFormat::new(32, channels, frames_per_second, SampleType::Float),
            buffer,
        )
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn set_format(&mut self, format: AudioFormat) {
        self.format = format;
        self.invalidate_cache();
    }

    pub fn set_buffer(&mut self, buffer: Vec<u8>) {
        self.buffer = Arc::new(buffer);
        self.invalidate_cache();
    }

    /// Forgets decoded samples and meta-data.
    pub fn invalidate_cache(&mut self) {
        self.samples = OnceLock::new();
        self.meta_data = OnceLock::new();
    }

    pub fn frame_count(&self) -> usize {
        match self.format.bytes_per_frame() {
            0 => 0,
            frame => self.buffer.len() / frame,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.format.bytes_to_seconds(self.buffer.len())
    }

    /// Interleaved samples normalised to [-1, 1], decoded once and cached.
    ///
    /// # Errors
    ///
    /// Fails on formats without channels, on sample encodings that can't be
    /// decoded, or if the buffer ends in a partial frame
    pub fn samples(&self) -> Result<Arc<Vec<f32>>, AnalysisError> {
        if let Some(samples) = self.samples.get() {
            return Ok(Arc::clone(samples));
        }
        let decoded = Arc::new(self.decode()?);
        Ok(Arc::clone(self.samples.get_or_init(|| decoded)))
    }

    fn decode(&self) -> Result<Vec<f32>, AnalysisError> {
        self.format.validate()?;
        let width = self.format.bytes_per_sample();
        let decoder = sample_decoder(&self.format)?;
        let frame_size = self.format.bytes_per_frame();
        if self.buffer.len() % frame_size != 0 {
            return Err(AnalysisError::PartialFrame {
                len: self.buffer.len(),
                frame_size,
            });
        }
        Ok(self
            .buffer
            .chunks_exact(width)
            .map(|bytes| decoder(bytes) as f32)
            .collect())
    }

    /// Volume and estimated pitch, computed once and cached.
    ///
    /// The pitch comes from a 32768-point frequency graph of channel 0.
    pub fn meta_data(&self) -> Result<AudioMetaData, AnalysisError> {
        if let Some(meta) = self.meta_data.get() {
            return Ok(*meta);
        }

        let wave = WaveForm::from_audio_data(self, 0)?;
        let volume = wave.average_volume();
        let pitch_hz = if wave.timespan() > 0.0 {
            FrequencyGraph::from_waveform(&wave, METADATA_FFT_SIZE)?
                .estimate_fundamental_frequency(DEFAULT_STRENGTH_THRESHOLD)
        } else {
            None
        };
        let meta = AudioMetaData { pitch_hz, volume };
        tracing::trace!("Computed audio meta-data: {:?}", meta);
        Ok(*self.meta_data.get_or_init(|| meta))
    }

    /// Replaces the cached meta-data with known values.
    pub fn set_meta_data(&mut self, meta: AudioMetaData) {
        self.meta_data = OnceLock::new();
        let _ = self.meta_data.set(meta);
    }

    /// Copies one channel out into mono audio of the same encoding.
    pub fn split_channel(&self, channel: u16) -> Result<AudioData, AnalysisError> {
        let channels = self.format.channels;
        if channel >= channels {
            return Err(AnalysisError::ChannelOutOfRange { channel, channels });
        }
        self.format.validate()?;
        let width = self.format.bytes_per_sample();
        let frame_size = self.format.bytes_per_frame();
        let offset = usize::from(channel) * width;
        let buffer = self
            .buffer
            .chunks_exact(frame_size)
            .flat_map(|frame| frame[offset..offset + width].iter().copied())
            .collect();
        let mut format = self.format;
        format.channels = 1;
        Ok(AudioData::new(format, buffer))
    }
}

impl PartialEq for AudioData {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && self.buffer == other.buffer
    }
}

type SampleDecoder = fn(&[u8]) -> f64;

fn sample_decoder(format: &AudioFormat) -> Result<SampleDecoder, AnalysisError> {
    let decoder: SampleDecoder = match (format.sample_type, format.bits_per_sample) {
        (SampleType::Signed, 8) => |b| f64::from(b[0] as i8) / f64::from(i8::MAX),
        (SampleType::Signed, 16) => {
            |b| f64::from(i16::from_le_bytes([b[0], b[1]])) / f64::from(i16::MAX)
        }
        (SampleType::Signed, 24) => |b| {
            // Sign-extend through the top byte of an i32
            let value = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
            f64::from(value) / 8_388_607.0
        },
        (SampleType::Signed, 32) => {
            |b| f64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])) / f64::from(i32::MAX)
        }
        (SampleType::Unsigned, 8) => |b| f64::from(b[0]) / f64::from(u8::MAX) * 2.0 - 1.0,
        (SampleType::Unsigned, 16) => {
            |b| f64::from(u16::from_le_bytes([b[0], b[1]])) / f64::from(u16::MAX) * 2.0 - 1.0
        }
        (SampleType::Unsigned, 32) => |b| {
            f64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])) / f64::from(u32::MAX) * 2.0
                - 1.0
        },
        (SampleType::Float, 32) => |b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        (SampleType::Float, 64) => {
            |b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        }
        (SampleType::ALaw, _) => return Err(AnalysisError::NotImplemented("A-law decoding")),
        (kind, bits) => {
            return Err(AnalysisError::UnsupportedSampleFormat {
                bits,
                kind: kind.name(),
            })
        }
    };
    Ok(decoder)
}
