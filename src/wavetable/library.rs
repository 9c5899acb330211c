//! The sample library a synthesizer plays from.

use super::{AudioSampleData, ChannelType, WavetableError};
use crate::audio::AudioData;
use crate::error::ErrorReport;
use crate::midi::{pitch_to_frequency, velocity_to_amplitude};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// A `major.minor` version stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionTag {
    pub major: u16,
    pub minor: u16,
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Descriptive data about a library, as found in a SoundFont's INFO list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneralInfo {
    pub version: VersionTag,
    pub rom_version: VersionTag,
    pub sound_engine: String,
    pub rom_name: String,
    pub bank_name: String,
    pub creation_date: String,
    pub engineers: String,
    pub product: String,
    pub copyright: String,
    pub comments: String,
    pub tool: String,
}

impl fmt::Display for GeneralInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "       Bank name: {}", self.bank_name)?;
        writeln!(f, "         Version: {}", self.version)?;
        writeln!(f, "       Copyright: {}", self.copyright)?;
        writeln!(f, " Sound engineers: {}", self.engineers)?;
        writeln!(f, "     For product: {}", self.product)?;
        writeln!(f, "        Comments: {}", self.comments)?;
        writeln!(f, "   Creation date: {}", self.creation_date)?;
        writeln!(f, "            Tool: {}", self.tool)?;
        writeln!(f, "Wavetable engine: {}", self.sound_engine)?;
        write!(f, "   Wavetable ROM: {}", self.rom_name)
    }
}

/// An ordered collection of samples.
///
/// Lookups scan in insertion order and return the first match, so earlier
/// samples win where ranges overlap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WavetableLibrary {
    pub info: GeneralInfo,
    samples: Vec<Arc<AudioSampleData>>,
}

impl WavetableLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from one audio clip.
    ///
    /// Mono audio becomes a single [`ChannelType::Mono`] sample. Stereo audio
    /// is split into a left-ear and a right-ear sample; further channels are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Fails if the audio has no channels
    pub fn from_audio(name: &str, audio: AudioData) -> Result<Self, WavetableError> {
        let mut library = Self::new();
        library.info.bank_name = name.to_string();
        match audio.format().channels {
            0 => return Err(crate::math::AnalysisError::NoChannels.into()),
            1 => library.add_sample(AudioSampleData::new(name, audio)),
            _ => {
                for (channel, ear) in [(0, ChannelType::LeftEar), (1, ChannelType::RightEar)] {
                    let mut sample = AudioSampleData::new(name, audio.split_channel(channel)?);
                    sample.channel_type = ear;
                    library.add_sample(sample);
                }
            }
        }
        Ok(library)
    }

    pub fn add_sample(&mut self, sample: AudioSampleData) {
        self.samples.push(Arc::new(sample));
    }

    pub fn add_shared_sample(&mut self, sample: Arc<AudioSampleData>) {
        self.samples.push(sample);
    }

    /// Appends every sample of another library after this one's.
    pub fn merge(&mut self, other: &WavetableLibrary) {
        self.samples.extend(other.samples.iter().cloned());
    }

    pub fn samples(&self) -> &[Arc<AudioSampleData>] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<&Arc<AudioSampleData>> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Instrument numbers that have at least one sample.
    pub fn instruments(&self) -> BTreeSet<u8> {
        self.samples
            .iter()
            .map(|s| s.character.instrument)
            .collect()
    }

    /// Finds the first sample for an instrument whose range contains the key
    /// and velocity.
    pub fn find_audio_sample(
        &self,
        instrument: u8,
        key: u8,
        velocity: u8,
    ) -> Option<&Arc<AudioSampleData>> {
        self.find_matching(instrument, key, velocity, |_| true)
    }

    /// Like [`WavetableLibrary::find_audio_sample`], restricted to one ear.
    pub fn find_audio_sample_for_ear(
        &self,
        instrument: u8,
        key: u8,
        velocity: u8,
        channel_type: ChannelType,
    ) -> Option<&Arc<AudioSampleData>> {
        self.find_matching(instrument, key, velocity, |s| s.channel_type == channel_type)
    }

    fn find_matching<F>(
        &self,
        instrument: u8,
        key: u8,
        velocity: u8,
        filter: F,
    ) -> Option<&Arc<AudioSampleData>>
    where
        F: Fn(&AudioSampleData) -> bool,
    {
        self.samples.iter().find(|s| {
            s.character.instrument == instrument && s.range.contains(key, velocity) && filter(s)
        })
    }

    /// Checks every sample and reports all problems found.
    ///
    /// A sample is a problem if its audio can't be decoded, its loop lies
    /// outside its frames, its key range is inverted or its original pitch is
    /// out of range.
    pub fn validate(&self) -> ErrorReport {
        let mut report = ErrorReport::new();
        for sample in &self.samples {
            let name = &sample.name;
            if let Err(err) = sample.audio.samples() {
                report.add(format!("Sample \"{name}\": {err}"));
            }
            let frames = sample.frame_count();
            let loop_points = sample.loop_points;
            if loop_points.start_frame > loop_points.end_frame || loop_points.end_frame > frames {
                report.add(format!(
                    "Sample \"{name}\": loop [{}, {}) is outside its {frames} frames.",
                    loop_points.start_frame, loop_points.end_frame
                ));
            }
            if sample.range.min_key > sample.range.max_key {
                report.add(format!(
                    "Sample \"{name}\": key range {}-{} is inverted.",
                    sample.range.min_key, sample.range.max_key
                ));
            }
            if sample.character.original_pitch < -1 {
                report.add(format!(
                    "Sample \"{name}\": original pitch {} is out of range.",
                    sample.character.original_pitch
                ));
            }
        }
        report
    }

    /// Decodes every sample, and estimates the pitch of samples without a
    /// known one, in parallel.
    ///
    /// # Returns
    ///
    /// A report of every sample that failed to decode or analyse
    pub fn warm_caches(&self) -> ErrorReport {
        let failures: Vec<String> = self
            .samples
            .par_iter()
            .filter_map(|sample| {
                let result = sample.audio.samples().and_then(|_| {
                    if sample.character.known_pitch().is_none() {
                        sample.audio.meta_data().map(|_| ())
                    } else {
                        Ok(())
                    }
                });
                result
                    .err()
                    .map(|err| format!("Sample \"{}\": {}", sample.name, err))
            })
            .collect();

        let mut report = ErrorReport::new();
        for failure in failures {
            report.add(failure);
        }
        report
    }

    /// Writes one CSV row per sample comparing its nominal pitch and range
    /// with its analysed pitch and volume.
    ///
    /// # Errors
    ///
    /// Fails if a sample can't be analysed or the writer fails
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<(), WavetableError> {
        writeln!(
            writer,
            "Sample Name, Orig. Key, Orig. Freq., Est. Freq., Min. Freq., Max. Freq., Est. Vol., Min. Vol., Max. Vol."
        )?;
        for sample in &self.samples {
            let meta = sample.audio.meta_data()?;
            let original_freq = sample
                .character
                .known_pitch()
                .map_or(0.0, |key| pitch_to_frequency(f64::from(key)));
            writeln!(
                writer,
                "{}, {}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}",
                sample.name,
                sample.character.original_pitch,
                original_freq,
                meta.pitch_hz.unwrap_or(0.0),
                pitch_to_frequency(f64::from(sample.range.min_key)),
                pitch_to_frequency(f64::from(sample.range.max_key)),
                meta.volume,
                velocity_to_amplitude(sample.range.min_vel),
                velocity_to_amplitude(sample.range.max_vel),
            )?;
        }
        Ok(())
    }

    /// Encodes the library with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WavetableError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a library produced by [`WavetableLibrary::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, WavetableError> {
        Ok(bincode::deserialize(data)?)
    }

    /// Saves the library to binary format (.wtl).
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the output file
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WavetableError> {
        fs::write(path.as_ref(), self.to_bytes()?)?;
        tracing::info!(
            "Saved {} sample(s) to {}",
            self.samples.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Loads a library from binary format (.wtl).
    ///
    /// # Errors
    ///
    /// Returns error if file reading or decoding fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WavetableError> {
        let library = Self::from_bytes(&fs::read(path.as_ref())?)?;
        tracing::info!(
            "Loaded {} sample(s) from {}",
            library.samples.len(),
            path.as_ref().display()
        );
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavetable::{Loop, Mode, Range};

    fn sample(name: &str, instrument: u8, range: Range) -> AudioSampleData {
        let mut sample = AudioSampleData::new(name, AudioData::from_f32_samples(1, 8000, &[0.0; 8]));
        sample.character.instrument = instrument;
        sample.character.original_pitch = 60;
        sample.range = range;
        sample
    }

    #[test]
    fn test_first_inserted_sample_wins() {
        let mut library = WavetableLibrary::new();
        library.add_sample(sample("low", 0, Range::new(0, 64, 0, 127)));
        library.add_sample(sample("overlap", 0, Range::new(60, 127, 0, 127)));
        library.add_sample(sample("other", 5, Range::new(0, 127, 0, 127)));

        assert_eq!(library.find_audio_sample(0, 62, 100).unwrap().name, "low");
        assert_eq!(library.find_audio_sample(0, 70, 100).unwrap().name, "overlap");
        assert_eq!(library.find_audio_sample(5, 70, 100).unwrap().name, "other");
        assert!(library.find_audio_sample(1, 70, 100).is_none());
        assert_eq!(library.instruments().into_iter().collect::<Vec<_>>(), vec![0, 5]);
    }

    #[test]
    fn test_find_for_ear() {
        let mut library = WavetableLibrary::new();
        let mut left = sample("left", 0, Range::default());
        left.channel_type = ChannelType::LeftEar;
        let mut right = sample("right", 0, Range::default());
        right.channel_type = ChannelType::RightEar;
        library.add_sample(left);
        library.add_sample(right);

        let found = library
            .find_audio_sample_for_ear(0, 60, 90, ChannelType::RightEar)
            .unwrap();
        assert_eq!(found.name, "right");
        assert!(library
            .find_audio_sample_for_ear(0, 60, 90, ChannelType::Mono)
            .is_none());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut library = WavetableLibrary::new();
        library.add_sample(sample("good", 0, Range::default()));

        let mut bad_loop = sample("bad loop", 0, Range::default());
        bad_loop.mode = Mode::GetsTrappedInLoop;
        bad_loop.loop_points = Loop::new(2, 20);
        library.add_sample(bad_loop);

        let mut inverted = sample("inverted", 0, Range::new(70, 60, 0, 127));
        inverted.audio.set_buffer(vec![0; 3]);
        library.add_sample(inverted);

        let report = library.validate();
        assert_eq!(report.len(), 3);
        assert!(report.message().starts_with("3 errors...\n\n"));
        assert!(report.messages()[0].contains("bad loop"));
        assert!(report.messages()[1].contains("inverted"));
    }

    #[test]
    fn test_warm_caches() {
        let mut library = WavetableLibrary::new();
        library.add_sample(sample("good", 0, Range::default()));
        assert!(library.warm_caches().is_empty());

        let mut broken = sample("broken", 0, Range::default());
        broken.audio.set_buffer(vec![0; 5]);
        library.add_sample(broken);
        let report = library.warm_caches();
        assert_eq!(report.len(), 1);
        assert!(report.messages()[0].contains("broken"));
    }

    #[test]
    fn test_bincode_round_trip() {
        let mut library = WavetableLibrary::new();
        library.info.bank_name = "Test Bank".to_string();
        library.info.version = VersionTag { major: 2, minor: 1 };
        let mut looped = sample("looped", 3, Range::new(10, 20, 30, 40));
        looped.mode = Mode::ExitLoopOnRelease;
        looped.loop_points = Loop::new(1, 7);
        library.add_sample(looped);

        let decoded = WavetableLibrary::from_bytes(&library.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, library);
        assert!(WavetableLibrary::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_from_stereo_audio() {
        let audio = AudioData::from_f32_samples(2, 8000, &[0.1, 0.2, 0.3, 0.4]);
        let library = WavetableLibrary::from_audio("clip", audio).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.samples()[0].channel_type, ChannelType::LeftEar);
        assert_eq!(library.samples()[1].channel_type, ChannelType::RightEar);
        assert_eq!(library.samples()[1].audio.samples().unwrap().as_slice(), &[0.2, 0.4]);
        assert_eq!(library.info.bank_name, "clip");
    }

    #[test]
    fn test_csv_header() {
        let library = WavetableLibrary::new();
        let mut out = Vec::new();
        library.write_csv(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("Sample Name, Orig. Key"));
    }
}
