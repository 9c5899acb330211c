//! Time-domain signals as ordered (time, amplitude) samples.

use super::AudioData;
use crate::math::AnalysisError;
use serde::{Deserialize, Serialize};

/// One point of a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveSample {
    pub time_seconds: f64,
    pub amplitude: f64,
}

impl WaveSample {
    pub fn new(time_seconds: f64, amplitude: f64) -> Self {
        Self {
            time_seconds,
            amplitude,
        }
    }
}

/// A signal sampled at arbitrary, ascending times.
///
/// Evaluation between samples interpolates linearly; outside the sampled span
/// the signal is silent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveForm {
    samples: Vec<WaveSample>,
}

impl WaveForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps samples that are already sorted by time.
    pub fn from_samples(samples: Vec<WaveSample>) -> Self {
        Self { samples }
    }

    /// Builds a waveform from evenly spaced amplitudes starting at time zero.
    pub fn from_amplitudes(amplitudes: &[f64], sample_rate: f64) -> Self {
        let samples = amplitudes
            .iter()
            .enumerate()
            .map(|(i, &amplitude)| WaveSample::new(i as f64 / sample_rate, amplitude))
            .collect();
        Self { samples }
    }

    /// Decodes one channel of PCM audio.
    ///
    /// # Arguments
    ///
    /// * `audio` - The audio to decode
    /// * `channel` - Channel index within each frame
    ///
    /// # Errors
    ///
    /// Fails if the channel doesn't exist or the sample format can't be decoded
    pub fn from_audio_data(audio: &AudioData, channel: u16) -> Result<Self, AnalysisError> {
        let channels = audio.format().channels;
        if channel >= channels {
            return Err(AnalysisError::ChannelOutOfRange { channel, channels });
        }

        let decoded = audio.samples()?;
        let frame_rate = f64::from(audio.format().frames_per_second);
        let samples = decoded
            .iter()
            .skip(usize::from(channel))
            .step_by(usize::from(channels))
            .enumerate()
            .map(|(frame, &amplitude)| {
                WaveSample::new(frame as f64 / frame_rate, f64::from(amplitude))
            })
            .collect();
        Ok(Self { samples })
    }

    /// Replaces the contents with `total_seconds` of silence.
    pub fn make_silence(&mut self, samples_per_second: f64, total_seconds: f64) {
        self.samples.clear();
        let count = (samples_per_second * total_seconds) as usize;
        let last = count.saturating_sub(1).max(1) as f64;
        self.samples.extend(
            (0..count).map(|i| WaveSample::new(i as f64 / last * total_seconds, 0.0)),
        );
    }

    pub fn add_sample(&mut self, sample: WaveSample) {
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[WaveSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start_time(&self) -> f64 {
        self.samples.first().map_or(0.0, |s| s.time_seconds)
    }

    pub fn end_time(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.time_seconds)
    }

    pub fn timespan(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    pub fn contains_time(&self, time_seconds: f64) -> bool {
        !self.samples.is_empty()
            && self.start_time() <= time_seconds
            && time_seconds <= self.end_time()
    }

    /// Amplitude at a point in time.
    ///
    /// Binary-searches the samples bracketing `time_seconds` and interpolates
    /// linearly between them. Returns 0 outside the sampled span.
    pub fn evaluate_at(&self, time_seconds: f64) -> f64 {
        if !self.contains_time(time_seconds) {
            return 0.0;
        }

        // Index of the first sample strictly after the time
        let upper = self
            .samples
            .partition_point(|s| s.time_seconds <= time_seconds);
        if upper == 0 {
            return self.samples[0].amplitude;
        }
        let lower = &self.samples[upper - 1];
        let Some(higher) = self.samples.get(upper) else {
            return lower.amplitude;
        };

        let span = higher.time_seconds - lower.time_seconds;
        if span <= 0.0 {
            return lower.amplitude;
        }
        let alpha = (time_seconds - lower.time_seconds) / span;
        lower.amplitude + alpha * (higher.amplitude - lower.amplitude)
    }

    /// Samples per second, averaged over the whole span.
    pub fn average_sample_rate(&self) -> f64 {
        let span = self.timespan();
        if span == 0.0 {
            0.0
        } else {
            self.samples.len() as f64 / span
        }
    }

    /// Mean absolute amplitude of the peaks and valleys.
    ///
    /// A peak or valley is a sample where the slope changes sign.
    pub fn average_volume(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for window in self.samples.windows(3) {
            let slope_a = slope(&window[0], &window[1]);
            let slope_b = slope(&window[1], &window[2]);
            if sign(slope_a) != sign(slope_b) {
                total += window[1].amplitude.abs();
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    pub fn max_amplitude(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.amplitude).reduce(f64::max)
    }

    pub fn min_amplitude(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.amplitude).reduce(f64::min)
    }

    pub fn scale(&mut self, factor: f64) {
        for sample in &mut self.samples {
            sample.amplitude *= factor;
        }
    }

    pub fn clamp(&mut self, min_amplitude: f64, max_amplitude: f64) {
        for sample in &mut self.samples {
            sample.amplitude = sample.amplitude.clamp(min_amplitude, max_amplitude);
        }
    }

    /// Scales the signal so its largest absolute amplitude becomes 1.
    ///
    /// # Returns
    ///
    /// False if the signal is empty or silent and nothing was changed
    pub fn renormalize(&mut self) -> bool {
        let (Some(min), Some(max)) = (self.min_amplitude(), self.max_amplitude()) else {
            return false;
        };
        let peak = min.abs().max(max.abs());
        let factor = 1.0 / peak;
        if peak == 0.0 || !factor.is_finite() {
            return false;
        }
        self.scale(factor);
        true
    }

    /// Keeps only the samples within `[start, stop]`.
    ///
    /// # Arguments
    ///
    /// * `rebase_time` - Shift the kept samples so the first starts at zero
    ///
    /// # Errors
    ///
    /// Fails if the waveform is empty
    pub fn trim(&mut self, start: f64, stop: f64, rebase_time: bool) -> Result<(), AnalysisError> {
        if self.samples.is_empty() {
            return Err(AnalysisError::EmptyWaveForm);
        }
        self.samples
            .retain(|s| start <= s.time_seconds && s.time_seconds <= stop);
        if rebase_time {
            if let Some(offset) = self.samples.first().map(|s| s.time_seconds) {
                for sample in &mut self.samples {
                    sample.time_seconds -= offset;
                }
            }
        }
        Ok(())
    }

    pub fn sort_samples(&mut self) {
        self.samples
            .sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
    }

    /// Mixes several waveforms into one.
    ///
    /// The result covers the union of their spans at the highest average
    /// sample rate among them.
    pub fn sum_together(wave_forms: &[&WaveForm]) -> WaveForm {
        match wave_forms {
            [] => WaveForm::new(),
            [single] => (*single).clone(),
            many => {
                let start = many
                    .iter()
                    .map(|w| w.start_time())
                    .fold(f64::INFINITY, f64::min);
                let end = many
                    .iter()
                    .map(|w| w.end_time())
                    .fold(f64::NEG_INFINITY, f64::max);
                let rate = many
                    .iter()
                    .map(|w| w.average_sample_rate())
                    .fold(0.0, f64::max);

                let span = end - start;
                let count = (span * rate) as usize;
                let last = count.saturating_sub(1).max(1) as f64;
                let samples = (0..count)
                    .map(|i| {
                        let time = start + i as f64 / last * span;
                        let amplitude = many.iter().map(|w| w.evaluate_at(time)).sum();
                        WaveSample::new(time, amplitude)
                    })
                    .collect();
                WaveForm { samples }
            }
        }
    }
}

fn slope(a: &WaveSample, b: &WaveSample) -> f64 {
    (b.amplitude - a.amplitude) / (b.time_seconds - a.time_seconds)
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}
