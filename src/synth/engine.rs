//! The sample-based synthesizer.
//!
//! Each key pressed on a channel becomes a [`Note`] holding one module graph
//! per ear. Notes live in a map keyed by `(channel, key)`:
//!
//! - NOTE_ON (velocity > 0) looks up a sample for the channel's instrument
//!   and starts a note, replacing any note already on that key
//! - NOTE_OFF, or NOTE_ON with velocity 0, cuts the note off, unless its
//!   sample exits its loop on release, in which case the tail plays out
//! - Notes whose graphs run out of sound are dropped after each render
//!
//! The synthesizer is single-threaded: every entry point takes `&mut self`.
//! It is `Send`, so it can be moved to an audio thread.

use super::{
    pitch_shift_ratio, AttenuationModule, LoopedAudioModule, Note, NoteState, PitchShiftModule,
    SynthError, SynthModule, SynthSettings,
};
use crate::midi::{
    velocity_to_amplitude, ChannelEvent, ChannelEventType, MidiMessageSink, NUM_CHANNELS,
};
use crate::wavetable::{AudioSampleData, ChannelType, WavetableLibrary};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Plays MIDI through samples from a wavetable library.
pub struct SampleBasedSynth {
    /// Rendering parameters.
    settings: SynthSettings,
    /// Samples to play from; shared with other synthesizers.
    library: Option<Arc<WavetableLibrary>>,
    /// Instrument assigned to each channel by PROGRAM_CHANGE or
    /// [`SampleBasedSynth::set_channel_instrument`].
    channel_instruments: [Option<u8>; NUM_CHANNELS as usize],
    /// Sounding and releasing notes by `(channel, key)`.
    notes: BTreeMap<(u8, u8), Note>,
    /// Output of the last [`SampleBasedSynth::process`] call.
    left: Vec<f32>,
    right: Vec<f32>,
    /// Per-graph render buffer.
    scratch: Vec<f32>,
}

impl SampleBasedSynth {
    pub fn new(settings: SynthSettings) -> Self {
        Self {
            settings,
            library: None,
            channel_instruments: [None; NUM_CHANNELS as usize],
            notes: BTreeMap::new(),
            left: Vec::new(),
            right: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    /// Attaches a library. Notes already sounding keep their samples.
    pub fn set_wavetable_library(&mut self, library: Arc<WavetableLibrary>) {
        tracing::debug!("Attached wavetable library with {} sample(s)", library.len());
        self.library = Some(library);
    }

    pub fn get_wavetable_library(&self) -> Option<&Arc<WavetableLibrary>> {
        self.library.as_ref()
    }

    /// Detaches the library and silences every note.
    pub fn clear_wavetable_library(&mut self) {
        self.library = None;
        self.notes.clear();
    }

    /// Assigns an instrument to a channel.
    ///
    /// # Arguments
    ///
    /// * `channel` - MIDI channel (0-15)
    /// * `instrument` - Instrument number samples are tagged with
    ///
    /// # Errors
    ///
    /// Fails if the channel is above 15
    pub fn set_channel_instrument(&mut self, channel: u8, instrument: u8) -> Result<(), SynthError> {
        let slot = self
            .channel_instruments
            .get_mut(usize::from(channel))
            .ok_or(SynthError::ChannelOutOfRange(channel))?;
        *slot = Some(instrument);
        Ok(())
    }

    /// The instrument assigned to a channel, or `None` if it was never set.
    /// Unassigned channels play instrument 0.
    pub fn get_channel_instrument(&self, channel: u8) -> Option<u8> {
        self.channel_instruments
            .get(usize::from(channel))
            .copied()
            .flatten()
    }

    /// Number of notes still producing sound.
    pub fn active_note_count(&self) -> usize {
        self.notes.len()
    }

    /// State of the note on a key, if any.
    pub fn note_state(&self, channel: u8, key: u8) -> Option<NoteState> {
        self.notes.get(&(channel, key)).map(Note::state)
    }

    /// Handles one live MIDI message.
    ///
    /// Messages with a system status byte (0xF0 and above) and channel
    /// events other than notes and program changes are ignored.
    ///
    /// # Arguments
    ///
    /// * `_delta_time_seconds` - Time since the previous message; messages
    ///   take effect at the next render
    /// * `message` - Status byte followed by its data bytes
    ///
    /// # Errors
    ///
    /// Fails if the settings are invalid, no library is attached, the
    /// message is malformed, or a matched sample can't be decoded
    pub fn receive_message(
        &mut self,
        _delta_time_seconds: f64,
        message: &[u8],
    ) -> Result<(), SynthError> {
        self.settings.validate()?;
        let library = self.library.clone().ok_or(SynthError::NoLibrary)?;

        let Some(&status) = message.first() else {
            tracing::trace!("Ignoring empty MIDI message");
            return Ok(());
        };
        if status >= 0xF0 {
            tracing::trace!("Ignoring system message 0x{:02X}", status);
            return Ok(());
        }

        let event = ChannelEvent::from_bytes(message)?;
        match event.kind {
            ChannelEventType::NoteOn if event.param2 > 0 => {
                self.start_note(&library, event.channel, event.param1, event.param2)
            }
            ChannelEventType::NoteOn | ChannelEventType::NoteOff => {
                self.stop_note(event.channel, event.param1);
                Ok(())
            }
            ChannelEventType::ProgramChange => {
                self.set_channel_instrument(event.channel, event.param1)
            }
            _ => {
                tracing::trace!("Ignoring {}", event);
                Ok(())
            }
        }
    }

    /// Presses a key.
    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), SynthError> {
        let message = ChannelEvent::note_on(channel, key, velocity).to_bytes()?;
        self.receive_message(0.0, &message)
    }

    /// Releases a key.
    pub fn note_off(&mut self, channel: u8, key: u8) -> Result<(), SynthError> {
        let message = ChannelEvent::note_off(channel, key).to_bytes()?;
        self.receive_message(0.0, &message)
    }

    fn start_note(
        &mut self,
        library: &WavetableLibrary,
        channel: u8,
        key: u8,
        velocity: u8,
    ) -> Result<(), SynthError> {
        if self.notes.remove(&(channel, key)).is_some() {
            tracing::trace!("Retriggering key {} on channel {}", key, channel);
        }

        let instrument = self.get_channel_instrument(channel).unwrap_or(0);
        let Some(sample) = library.find_audio_sample(instrument, key, velocity) else {
            tracing::debug!(
                "No sample for instrument {} key {} velocity {}",
                instrument,
                key,
                velocity
            );
            return Ok(());
        };

        let partner = sample
            .channel_type
            .opposite()
            .and_then(|ear| library.find_audio_sample_for_ear(instrument, key, velocity, ear));

        let note = match partner {
            Some(partner) => {
                let (left, right) = if sample.channel_type == ChannelType::LeftEar {
                    (sample, partner)
                } else {
                    (partner, sample)
                };
                Note::stereo(
                    channel,
                    key,
                    sample.mode,
                    self.build_graph(left, key, velocity)?,
                    self.build_graph(right, key, velocity)?,
                )
            }
            None => Note::mono(channel, key, sample.mode, self.build_graph(sample, key, velocity)?),
        };

        tracing::trace!(
            "Note on: channel {} key {} velocity {} using {}",
            channel,
            key,
            velocity,
            sample
        );
        self.notes.insert((channel, key), note);
        Ok(())
    }

    fn stop_note(&mut self, channel: u8, key: u8) {
        let Some(note) = self.notes.get_mut(&(channel, key)) else {
            return;
        };
        if note.plays_tail_on_release() {
            note.release();
        } else {
            self.notes.remove(&(channel, key));
            tracing::trace!("Note off: channel {} key {}", channel, key);
        }
    }

    /// Builds sample playback, then pitch shift, then velocity gain.
    fn build_graph(
        &self,
        sample: &AudioSampleData,
        key: u8,
        velocity: u8,
    ) -> Result<Box<dyn SynthModule>, SynthError> {
        let ratio = pitch_shift_ratio(sample, key, self.settings.sample_rate)?;
        let playback = LoopedAudioModule::new(sample)?;
        let shifted = PitchShiftModule::new(Box::new(playback), ratio);
        Ok(Box::new(AttenuationModule::new(
            Box::new(shifted),
            velocity_to_amplitude(velocity),
        )))
    }

    /// Renders every note into a pair of buffers, replacing their contents.
    ///
    /// # Errors
    ///
    /// Fails if the settings are invalid, no library is attached or the
    /// buffers differ in length
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<(), SynthError> {
        self.settings.validate()?;
        if self.library.is_none() {
            return Err(SynthError::NoLibrary);
        }
        if left.len() != right.len() {
            return Err(SynthError::BufferMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        left.fill(0.0);
        right.fill(0.0);
        self.scratch.resize(left.len(), 0.0);
        for note in self.notes.values_mut() {
            note.render(left, right, &mut self.scratch);
        }

        let volume = self.settings.master_volume;
        if volume != 1.0 {
            for sample in left.iter_mut().chain(right.iter_mut()) {
                *sample *= volume;
            }
        }

        self.notes.retain(|&(channel, key), note| {
            let alive = note.more_sound_available();
            if !alive {
                tracing::trace!("Note finished: channel {} key {}", channel, key);
            }
            alive
        });
        Ok(())
    }

    /// Renders one buffer of [`SynthSettings::buffer_frames`] frames per ear,
    /// readable through [`SampleBasedSynth::output`].
    ///
    /// # Errors
    ///
    /// Fails if the settings are invalid or no library is attached
    pub fn process(&mut self) -> Result<(), SynthError> {
        let frames = self.settings.buffer_frames;
        let mut left = std::mem::take(&mut self.left);
        let mut right = std::mem::take(&mut self.right);
        left.resize(frames, 0.0);
        right.resize(frames, 0.0);
        let result = self.render(&mut left, &mut right);
        self.left = left;
        self.right = right;
        result
    }

    /// The left and right buffers of the last [`SampleBasedSynth::process`].
    pub fn output(&self) -> (&[f32], &[f32]) {
        (&self.left, &self.right)
    }

    /// Prepares the attached library for playback.
    ///
    /// Checks the settings, validates every sample, then decodes them and
    /// estimates unknown pitches in parallel.
    ///
    /// # Errors
    ///
    /// Fails if the settings are invalid or no library is attached, or with
    /// one [`SynthError::Initialization`] listing every problem found
    pub fn initialize(&mut self) -> Result<(), SynthError> {
        self.settings.validate()?;
        let library = self.library.as_ref().ok_or(SynthError::NoLibrary)?;

        let mut report = library.validate();
        report.merge(library.warm_caches());
        if !report.is_empty() {
            tracing::warn!("Wavetable library has {} problem(s)", report.len());
            return Err(SynthError::Initialization(report));
        }

        tracing::info!(
            "Synth ready: {} sample(s) at {} Hz, {} frames per buffer",
            library.len(),
            self.settings.sample_rate,
            self.settings.buffer_frames
        );
        Ok(())
    }

    /// Stops every note immediately.
    pub fn finalize(&mut self) {
        if !self.notes.is_empty() {
            tracing::debug!("Dropping {} note(s)", self.notes.len());
        }
        self.notes.clear();
    }
}

impl MidiMessageSink for SampleBasedSynth {
    fn receive_message(&mut self, delta_time_seconds: f64, message: &[u8]) -> crate::Result<()> {
        Ok(SampleBasedSynth::receive_message(self, delta_time_seconds, message)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioData;
    use crate::math::AnalysisError;
    use crate::wavetable::{Loop, Mode, Range};

    const RATE: u32 = 8000;

    fn settings() -> SynthSettings {
        SynthSettings {
            sample_rate: RATE,
            buffer_frames: 64,
            ..SynthSettings::default()
        }
    }

    fn constant_sample(name: &str, value: f32, len: usize) -> AudioSampleData {
        let mut sample =
            AudioSampleData::new(name, AudioData::from_f32_samples(1, RATE, &vec![value; len]));
        sample.character.original_pitch = 60;
        sample
    }

    fn synth_with(samples: Vec<AudioSampleData>) -> SampleBasedSynth {
        let mut library = WavetableLibrary::new();
        for sample in samples {
            library.add_sample(sample);
        }
        let mut synth = SampleBasedSynth::new(settings());
        synth.set_wavetable_library(Arc::new(library));
        synth
    }

    #[test]
    fn test_requires_library() {
        let mut synth = SampleBasedSynth::new(settings());
        assert!(matches!(
            synth.receive_message(0.0, &[0x90, 60, 100]),
            Err(SynthError::NoLibrary)
        ));
        assert!(matches!(synth.process(), Err(SynthError::NoLibrary)));
        assert!(matches!(synth.initialize(), Err(SynthError::NoLibrary)));
    }

    #[test]
    fn test_invalid_settings_refuse_notes_and_rendering() {
        let mut library = WavetableLibrary::new();
        library.add_sample(constant_sample("zero", 0.5, 100));
        let mut synth = SampleBasedSynth::new(SynthSettings {
            sample_rate: 0,
            ..settings()
        });
        synth.set_wavetable_library(Arc::new(library));

        assert!(matches!(
            synth.note_on(0, 60, 100),
            Err(SynthError::InvalidSettings(_))
        ));
        assert_eq!(synth.active_note_count(), 0);
        let (mut left, mut right) = (vec![0.0; 8], vec![0.0; 8]);
        assert!(matches!(
            synth.render(&mut left, &mut right),
            Err(SynthError::InvalidSettings(_))
        ));
        assert!(matches!(synth.process(), Err(SynthError::InvalidSettings(_))));
    }

    #[test]
    fn test_unplayable_sample_rate_is_an_error() {
        let mut sample = constant_sample("no rate", 0.5, 100);
        sample.audio = AudioData::from_f32_samples(1, 0, &[0.5; 100]);
        let mut synth = synth_with(vec![sample]);
        assert!(matches!(
            synth.note_on(0, 60, 100),
            Err(SynthError::Analysis(AnalysisError::InvalidPlaybackRatio(_)))
        ));
        assert_eq!(synth.active_note_count(), 0);
    }

    #[test]
    fn test_channel_instruments() {
        let mut synth = SampleBasedSynth::new(settings());
        assert_eq!(synth.get_channel_instrument(3), None);
        synth.set_channel_instrument(3, 0).unwrap();
        assert_eq!(synth.get_channel_instrument(3), Some(0));
        assert!(matches!(
            synth.set_channel_instrument(16, 1),
            Err(SynthError::ChannelOutOfRange(16))
        ));
        assert_eq!(synth.get_channel_instrument(16), None);
    }

    #[test]
    fn test_unmapped_channel_plays_instrument_zero() {
        let mut other = constant_sample("other", 0.9, 1000);
        other.character.instrument = 4;
        let mut synth = synth_with(vec![other, constant_sample("zero", 0.5, 1000)]);

        synth.receive_message(0.0, &[0x95, 60, 127]).unwrap();
        synth.process().unwrap();
        let (left, right) = synth.output();
        assert!((left[10] - 0.5).abs() < 1e-6);
        assert!((right[10] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_program_change_selects_instrument() {
        let mut other = constant_sample("other", 0.25, 1000);
        other.character.instrument = 4;
        let mut synth = synth_with(vec![constant_sample("zero", 0.5, 1000), other]);

        synth.receive_message(0.0, &[0xC2, 4]).unwrap();
        assert_eq!(synth.get_channel_instrument(2), Some(4));
        synth.receive_message(0.0, &[0x92, 60, 127]).unwrap();
        synth.process().unwrap();
        assert!((synth.output().0[10] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let mut synth = synth_with(vec![constant_sample("zero", 0.5, 1000)]);
        synth.receive_message(0.0, &[0x90, 60, 100]).unwrap();
        assert_eq!(synth.active_note_count(), 1);
        synth.receive_message(0.0, &[0x90, 60, 0]).unwrap();
        assert_eq!(synth.active_note_count(), 0);

        synth.receive_message(0.0, &[0x90, 60, 100]).unwrap();
        synth.receive_message(0.0, &[0x80, 60, 64]).unwrap();
        assert_eq!(synth.active_note_count(), 0);
    }

    #[test]
    fn test_velocity_attenuates() {
        let mut synth = synth_with(vec![constant_sample("zero", 1.0, 1000)]);
        synth.note_on(0, 60, 127).unwrap();
        synth.note_on(1, 60, 0x40).unwrap();
        synth.process().unwrap();
        let expected = 1.0 + 64.0 / 127.0;
        assert!((synth.output().0[5] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_first_overlapping_sample_wins() {
        let mut low = constant_sample("low", 0.1, 1000);
        low.range = Range::new(0, 64, 0, 127);
        let mut high = constant_sample("high", 0.2, 1000);
        high.range = Range::new(60, 127, 0, 127);
        let mut synth = synth_with(vec![low, high]);

        synth.note_on(0, 62, 100).unwrap();
        synth.process().unwrap();
        let gain = 100.0 / 127.0;
        assert!((synth.output().0[3] - 0.1 * gain).abs() < 1e-5);
    }

    #[test]
    fn test_exit_loop_on_release_rings_out() {
        let mut sample = constant_sample("looped", 0.5, 200);
        sample.mode = Mode::ExitLoopOnRelease;
        sample.loop_points = Loop::new(50, 100);
        let mut synth = synth_with(vec![sample]);

        synth.note_on(0, 60, 127).unwrap();
        for _ in 0..10 {
            synth.process().unwrap();
        }
        assert_eq!(synth.note_state(0, 60), Some(NoteState::Sounding));

        synth.note_off(0, 60).unwrap();
        assert_eq!(synth.note_state(0, 60), Some(NoteState::Releasing));
        // The tail is at most 150 frames: three buffers
        for _ in 0..3 {
            synth.process().unwrap();
        }
        assert_eq!(synth.active_note_count(), 0);
    }

    #[test]
    fn test_trapped_loop_stops_on_release() {
        let mut sample = constant_sample("trapped", 0.5, 200);
        sample.mode = Mode::GetsTrappedInLoop;
        sample.loop_points = Loop::new(50, 100);
        let mut synth = synth_with(vec![sample]);

        synth.note_on(0, 60, 127).unwrap();
        for _ in 0..10 {
            synth.process().unwrap();
        }
        assert_eq!(synth.active_note_count(), 1);
        synth.note_off(0, 60).unwrap();
        assert_eq!(synth.active_note_count(), 0);
    }

    #[test]
    fn test_unlooped_note_ends_by_itself() {
        let mut synth = synth_with(vec![constant_sample("short", 0.5, 100)]);
        synth.note_on(0, 60, 127).unwrap();
        synth.process().unwrap();
        assert_eq!(synth.active_note_count(), 1);
        synth.process().unwrap();
        assert_eq!(synth.active_note_count(), 0);
        synth.process().unwrap();
        assert!(synth.output().0.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stereo_pair() {
        let mut left = constant_sample("left", 0.25, 1000);
        left.channel_type = ChannelType::LeftEar;
        let mut right = constant_sample("right", 0.75, 1000);
        right.channel_type = ChannelType::RightEar;
        let mut synth = synth_with(vec![right, left]);

        synth.note_on(0, 60, 127).unwrap();
        synth.process().unwrap();
        let (l, r) = synth.output();
        assert!((l[7] - 0.25).abs() < 1e-6);
        assert!((r[7] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_retrigger_and_ignored_messages() {
        let mut synth = synth_with(vec![constant_sample("zero", 0.5, 1000)]);
        synth.note_on(0, 60, 127).unwrap();
        synth.note_on(0, 60, 127).unwrap();
        assert_eq!(synth.active_note_count(), 1);

        synth.receive_message(0.0, &[0xF8]).unwrap();
        synth.receive_message(0.0, &[0xB0, 7, 100]).unwrap();
        synth.receive_message(0.0, &[]).unwrap();
        assert!(synth.receive_message(0.0, &[0x90, 60]).is_err());

        // No sample answers key 60 on instrument 9
        synth.set_channel_instrument(1, 9).unwrap();
        synth.note_on(1, 60, 127).unwrap();
        assert_eq!(synth.active_note_count(), 1);

        synth.finalize();
        assert_eq!(synth.active_note_count(), 0);
    }

    #[test]
    fn test_render_custom_lengths() {
        let mut synth = synth_with(vec![constant_sample("zero", 0.5, 1000)]);
        synth.note_on(0, 60, 127).unwrap();
        let (mut left, mut right) = (vec![1.0; 10], vec![1.0; 10]);
        synth.render(&mut left, &mut right).unwrap();
        assert!(left.iter().all(|&s| (s - 0.5).abs() < 1e-6));

        let mut short = vec![0.0; 3];
        assert!(matches!(
            synth.render(&mut left, &mut short),
            Err(SynthError::BufferMismatch { left: 10, right: 3 })
        ));
    }

    #[test]
    fn test_initialize_reports_every_problem() {
        let mut bad_loop = constant_sample("bad loop", 0.5, 10);
        bad_loop.loop_points = Loop::new(5, 50);
        let mut undecodable = constant_sample("undecodable", 0.5, 10);
        undecodable.audio.set_buffer(vec![0; 7]);
        let mut synth = synth_with(vec![bad_loop, undecodable]);

        match synth.initialize() {
            Err(SynthError::Initialization(report)) => {
                assert!(report.len() >= 2);
                assert!(report.to_string().contains("errors..."));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut synth = synth_with(vec![constant_sample("zero", 0.5, 10)]);
        synth.initialize().unwrap();
    }

    #[test]
    fn test_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SampleBasedSynth>();
    }
}
