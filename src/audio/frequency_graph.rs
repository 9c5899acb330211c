//! Frequency-domain view of a waveform.

use super::{WaveForm, WaveSample};
use crate::math::{AnalysisError, ComplexNumber, ComplexVector};
use serde::{Deserialize, Serialize};

/// Strength scales tried in turn when no peak clears the threshold.
const STRENGTH_SCALES: [f64; 5] = [1.0, 1.5, 2.0, 2.5, 3.0];

/// One frequency bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub frequency: f64,
    /// Phase angle in radians.
    pub phase: f64,
    /// Magnitude of the bin.
    pub strength: f64,
}

/// Spectrum of one analysis window, from DC up to the Nyquist limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGraph {
    plots: Vec<Plot>,
    start_time: f64,
    sample_rate: f64,
    window_len: usize,
}

impl FrequencyGraph {
    /// Analyses a waveform with a single FFT pass.
    ///
    /// `sample_count` points are taken evenly across the waveform, from its
    /// first sample to its last inclusive. The graph keeps the first half of
    /// the bins.
    ///
    /// # Arguments
    ///
    /// * `wave` - The signal to analyse
    /// * `sample_count` - Window length, a power of 2
    ///
    /// # Errors
    ///
    /// Fails if `sample_count` isn't a power of 2 of at least 2, or the
    /// waveform is empty or spans no time
    pub fn from_waveform(wave: &WaveForm, sample_count: usize) -> Result<Self, AnalysisError> {
        if sample_count < 2 || !sample_count.is_power_of_two() {
            return Err(AnalysisError::NotPowerOfTwo(sample_count));
        }
        if wave.is_empty() {
            return Err(AnalysisError::EmptyWaveForm);
        }
        let duration = wave.timespan();
        if duration <= 0.0 {
            return Err(AnalysisError::ZeroDuration);
        }

        let start_time = wave.start_time();
        let last = (sample_count - 1) as f64;
        let window: ComplexVector = (0..sample_count)
            .map(|i| {
                let time = start_time + i as f64 / last * duration;
                ComplexNumber::from(wave.evaluate_at(time))
            })
            .collect();
        let spectrum = window.fft(false)?;

        let sample_rate = last / duration;
        let bin_width = sample_rate / sample_count as f64;
        let plots = spectrum
            .iter()
            .take(sample_count / 2)
            .enumerate()
            .map(|(k, value)| Plot {
                frequency: k as f64 * bin_width,
                phase: value.arg(),
                strength: value.norm(),
            })
            .collect();

        Ok(Self {
            plots,
            start_time,
            sample_rate,
            window_len: sample_count,
        })
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    /// Sample rate of the analysis window.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// The strongest bin.
    pub fn strongest(&self) -> Option<&Plot> {
        self.plots
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
    }

    /// Guesses the fundamental frequency.
    ///
    /// Returns the lowest bin whose strength reaches `strength_threshold` and
    /// which is a local peak of its neighbours. When nothing qualifies the
    /// strengths are scaled up by 1.5, 2.0, 2.5 and 3.0 in turn before giving
    /// up. This is a heuristic, not a pitch tracker.
    ///
    /// # Arguments
    ///
    /// * `strength_threshold` - Minimum bin strength, typically 35
    pub fn estimate_fundamental_frequency(&self, strength_threshold: f64) -> Option<f64> {
        STRENGTH_SCALES.iter().find_map(|&scale| {
            self.plots.windows(3).find_map(|w| {
                let strength = w[1].strength * scale;
                if strength < strength_threshold {
                    return None;
                }
                let rising = (w[1].strength - w[0].strength) * scale > 0.0;
                let falling = (w[2].strength - w[1].strength) * scale < 0.0;
                (rising && falling).then_some(w[1].frequency)
            })
        })
    }

    /// A copy whose strengths are averaged over every bin within
    /// `frequency_radius` of each bin.
    pub fn smoothed(&self, frequency_radius: f64) -> FrequencyGraph {
        let plots = self
            .plots
            .iter()
            .map(|plot| {
                let (sum, count) = self
                    .plots
                    .iter()
                    .filter(|other| (other.frequency - plot.frequency).abs() <= frequency_radius)
                    .fold((0.0, 0usize), |(sum, count), other| {
                        (sum + other.strength, count + 1)
                    });
                Plot {
                    strength: sum / count.max(1) as f64,
                    ..*plot
                }
            })
            .collect();
        FrequencyGraph {
            plots,
            ..self.clone()
        }
    }

    /// Resynthesises the analysis window with an inverse FFT.
    ///
    /// The negative frequencies are rebuilt as the conjugates of the kept
    /// bins. The Nyquist bin isn't kept, so it resynthesises as zero.
    ///
    /// # Errors
    ///
    /// Fails if the graph has no plots
    pub fn to_waveform(&self) -> Result<WaveForm, AnalysisError> {
        if self.plots.is_empty() {
            return Err(AnalysisError::EmptyGraph);
        }

        let n = self.window_len;
        let mut spectrum = vec![ComplexNumber::new(0.0, 0.0); n];
        for (k, plot) in self.plots.iter().enumerate() {
            let value = ComplexNumber::from_polar(plot.strength, plot.phase);
            spectrum[k] = value;
            if k > 0 {
                spectrum[n - k] = value.conj();
            }
        }

        let signal = ComplexVector::from_values(spectrum).fft(true)?;
        let samples = signal
            .iter()
            .enumerate()
            .map(|(i, value)| {
                WaveSample::new(self.start_time + i as f64 / self.sample_rate, value.re)
            })
            .collect();
        Ok(WaveForm::from_samples(samples))
    }
}
