//! Signal-processing modules wired into per-note graphs.
//!
//! Every note owns a chain of boxed modules: sample playback, then
//! resampling to the note's pitch, then velocity gain. Each module pulls from
//! the one it wraps, so the last module in the chain drives the whole graph.

use crate::math::AnalysisError;
use crate::wavetable::{AudioSampleData, Mode};
use std::sync::Arc;

/// A node in a note's signal graph.
pub trait SynthModule: Send {
    /// Fills `out` with the next frames. Writes silence once the sound has
    /// ended.
    fn render(&mut self, out: &mut [f32]);

    /// False once every remaining frame would be silence.
    fn more_sound_available(&self) -> bool;

    /// Signals that the key was released.
    fn release(&mut self);
}

/// Plays a sample's frames, honouring its loop mode.
///
/// - [`Mode::GetsTrappedInLoop`] repeats the loop for as long as the module
///   lives
/// - [`Mode::ExitLoopOnRelease`] repeats the loop until [`SynthModule::release`]
///   then plays on to the end of the sample
/// - Other modes play the sample once
pub struct LoopedAudioModule {
    frames: Arc<Vec<f32>>,
    channels: usize,
    frame_count: usize,
    position: usize,
    loop_range: Option<(usize, usize)>,
    mode: Mode,
    released: bool,
}

impl LoopedAudioModule {
    /// Creates a player for a sample's first channel.
    ///
    /// # Errors
    ///
    /// Fails if the sample's audio can't be decoded
    pub fn new(sample: &AudioSampleData) -> Result<Self, AnalysisError> {
        let frames = sample.audio.samples()?;
        let channels = usize::from(sample.audio.format().channels.max(1));
        let frame_count = frames.len() / channels;
        let loop_range = sample.loops().then(|| {
            let end = (sample.loop_points.end_frame as usize).min(frame_count);
            (sample.loop_points.start_frame as usize, end)
        });
        Ok(Self {
            frames,
            channels,
            frame_count,
            position: 0,
            loop_range: loop_range.filter(|(start, end)| start < end),
            mode: sample.mode,
            released: false,
        })
    }

    fn active_loop(&self) -> Option<(usize, usize)> {
        match self.mode {
            Mode::GetsTrappedInLoop => self.loop_range,
            Mode::ExitLoopOnRelease if !self.released => self.loop_range,
            _ => None,
        }
    }

    fn next_frame(&mut self) -> Option<f32> {
        if let Some((start, end)) = self.active_loop() {
            if self.position >= end {
                self.position = start;
            }
        }
        let value = self.frames.get(self.position * self.channels).copied()?;
        self.position += 1;
        Some(value)
    }

    /// Current playback position in frames.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl SynthModule for LoopedAudioModule {
    fn render(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.next_frame().unwrap_or(0.0);
        }
    }

    fn more_sound_available(&self) -> bool {
        self.active_loop().is_some() || self.position < self.frame_count
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Resamples its source by a constant ratio with linear interpolation.
///
/// A ratio of 2.0 consumes two source frames per output frame, raising the
/// pitch an octave. The two frames being interpolated count as sound until
/// they have been played past, so a one-shot sample ends on its last frame.
pub struct PitchShiftModule {
    source: Box<dyn SynthModule>,
    ratio: f64,
    phase: f64,
    current: f32,
    next: f32,
    /// Whether `current` and `next` came from the source while it still had
    /// sound.
    current_live: bool,
    next_live: bool,
}

impl PitchShiftModule {
    pub fn new(mut source: Box<dyn SynthModule>, ratio: f64) -> Self {
        let (current, current_live) = Self::pull_from(source.as_mut());
        let (next, next_live) = Self::pull_from(source.as_mut());
        Self {
            source,
            ratio,
            phase: 0.0,
            current,
            next,
            current_live,
            next_live,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    fn pull_from(source: &mut dyn SynthModule) -> (f32, bool) {
        let live = source.more_sound_available();
        let mut frame = [0.0f32];
        source.render(&mut frame);
        (frame[0], live)
    }

    fn advance(&mut self) {
        self.current = self.next;
        self.current_live = self.next_live;
        (self.next, self.next_live) = Self::pull_from(self.source.as_mut());
    }
}

impl SynthModule for PitchShiftModule {
    fn render(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.current + (self.next - self.current) * self.phase as f32;
            self.phase += self.ratio;
            while self.phase >= 1.0 {
                self.phase -= 1.0;
                self.advance();
            }
        }
    }

    fn more_sound_available(&self) -> bool {
        self.current_live || self.next_live || self.source.more_sound_available()
    }

    fn release(&mut self) {
        self.source.release();
    }
}

/// Scales its source by a constant gain.
pub struct AttenuationModule {
    source: Box<dyn SynthModule>,
    gain: f32,
}

impl AttenuationModule {
    pub fn new(source: Box<dyn SynthModule>, gain: f32) -> Self {
        Self { source, gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl SynthModule for AttenuationModule {
    fn render(&mut self, out: &mut [f32]) {
        self.source.render(out);
        for sample in out.iter_mut() {
            *sample *= self.gain;
        }
    }

    fn more_sound_available(&self) -> bool {
        self.source.more_sound_available()
    }

    fn release(&mut self) {
        self.source.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioData;
    use crate::wavetable::Loop;
    use approx::assert_relative_eq;

    fn ramp_sample(len: usize, mode: Mode, loop_points: Loop) -> AudioSampleData {
        let frames: Vec<f32> = (0..len).map(|i| i as f32 / 100.0).collect();
        let mut sample = AudioSampleData::new("ramp", AudioData::from_f32_samples(1, 8000, &frames));
        sample.mode = mode;
        sample.loop_points = loop_points;
        sample
    }

    fn render(module: &mut dyn SynthModule, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        module.render(&mut out);
        out
    }

    #[test]
    fn test_not_looped_plays_once() {
        let sample = ramp_sample(4, Mode::NotLooped, Loop::new(1, 3));
        let mut module = LoopedAudioModule::new(&sample).unwrap();
        assert!(module.more_sound_available());
        let out = render(&mut module, 6);
        assert_eq!(out, vec![0.0, 0.01, 0.02, 0.03, 0.0, 0.0]);
        assert!(!module.more_sound_available());
    }

    #[test]
    fn test_trapped_loop_ignores_release() {
        let sample = ramp_sample(5, Mode::GetsTrappedInLoop, Loop::new(1, 3));
        let mut module = LoopedAudioModule::new(&sample).unwrap();
        let out = render(&mut module, 6);
        assert_eq!(out, vec![0.0, 0.01, 0.02, 0.01, 0.02, 0.01]);

        module.release();
        let out = render(&mut module, 3);
        assert_eq!(out, vec![0.02, 0.01, 0.02]);
        assert!(module.more_sound_available());
    }

    #[test]
    fn test_exit_loop_on_release() {
        let sample = ramp_sample(5, Mode::ExitLoopOnRelease, Loop::new(1, 3));
        let mut module = LoopedAudioModule::new(&sample).unwrap();
        let out = render(&mut module, 5);
        assert_eq!(out, vec![0.0, 0.01, 0.02, 0.01, 0.02]);

        module.release();
        let out = render(&mut module, 4);
        assert_eq!(out, vec![0.03, 0.04, 0.0, 0.0]);
        assert!(!module.more_sound_available());
    }

    #[test]
    fn test_empty_loop_plays_once() {
        let sample = ramp_sample(3, Mode::GetsTrappedInLoop, Loop::new(2, 2));
        let mut module = LoopedAudioModule::new(&sample).unwrap();
        render(&mut module, 3);
        assert!(!module.more_sound_available());
    }

    #[test]
    fn test_pitch_shift_octave_up_skips_frames() {
        let sample = ramp_sample(16, Mode::NotLooped, Loop::default());
        let source = LoopedAudioModule::new(&sample).unwrap();
        let mut module = PitchShiftModule::new(Box::new(source), 2.0);
        let out = render(&mut module, 4);
        for (value, expected) in out.iter().zip([0.0, 0.02, 0.04, 0.06]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pitch_shift_octave_down_interpolates() {
        let sample = ramp_sample(16, Mode::NotLooped, Loop::default());
        let source = LoopedAudioModule::new(&sample).unwrap();
        let mut module = PitchShiftModule::new(Box::new(source), 0.5);
        let out = render(&mut module, 4);
        for (value, expected) in out.iter().zip([0.0, 0.005, 0.01, 0.015]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pitch_shift_plays_final_frames() {
        let sample = ramp_sample(4, Mode::NotLooped, Loop::default());
        let source = LoopedAudioModule::new(&sample).unwrap();
        let mut module = PitchShiftModule::new(Box::new(source), 1.0);

        let out = render(&mut module, 3);
        for (value, expected) in out.iter().zip([0.0, 0.01, 0.02]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-6);
        }
        // The source is spent but its last frame hasn't been played
        assert!(module.more_sound_available());

        let out = render(&mut module, 2);
        assert_relative_eq!(out[0], 0.03, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.0);
        assert!(!module.more_sound_available());
    }

    #[test]
    fn test_pitch_shift_of_empty_source_is_silent() {
        let sample = ramp_sample(0, Mode::NotLooped, Loop::default());
        let source = LoopedAudioModule::new(&sample).unwrap();
        let module = PitchShiftModule::new(Box::new(source), 1.0);
        assert!(!module.more_sound_available());
    }

    #[test]
    fn test_attenuation_scales_and_forwards_release() {
        let sample = ramp_sample(6, Mode::ExitLoopOnRelease, Loop::new(0, 2));
        let source = LoopedAudioModule::new(&sample).unwrap();
        let mut module = AttenuationModule::new(Box::new(source), 0.5);
        let out = render(&mut module, 3);
        for (value, expected) in out.iter().zip([0.0, 0.005, 0.0]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-6);
        }
        module.release();
        render(&mut module, 8);
        assert!(!module.more_sound_available());
    }
}
