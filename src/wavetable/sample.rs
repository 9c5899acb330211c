//! One playable sample and the performance data attached to it.

use crate::audio::AudioData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the sample sounds like and which instrument it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Instrument number; channels are mapped to instruments.
    pub instrument: u8,
    /// MIDI key heard when the sample plays unshifted, or -1 if unknown.
    pub original_pitch: i8,
    /// Pitch correction of the recording, in cents.
    pub fine_tune_cents: i16,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            instrument: 0,
            original_pitch: -1,
            fine_tune_cents: 0,
        }
    }
}

impl Character {
    /// The original pitch, if known.
    pub fn known_pitch(&self) -> Option<u8> {
        u8::try_from(self.original_pitch).ok()
    }
}

/// Loop region in frames, relative to the start of the sample. The end is
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Loop {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl Loop {
    pub fn new(start_frame: u64, end_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame,
        }
    }

    pub fn len(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a sample uses its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Plays once, like a plucked string.
    #[default]
    NotLooped,
    /// Repeats the loop for as long as the note sounds.
    GetsTrappedInLoop,
    /// Reserved; plays like [`Mode::NotLooped`].
    Unused,
    /// Repeats the loop until released, then plays the rest of the sample.
    ExitLoopOnRelease,
}

impl Mode {
    /// Decodes the low two bits of a SoundFont `sampleModes` value.
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x3 {
            1 => Mode::GetsTrappedInLoop,
            2 => Mode::Unused,
            3 => Mode::ExitLoopOnRelease,
            _ => Mode::NotLooped,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Mode::NotLooped => 0,
            Mode::GetsTrappedInLoop => 1,
            Mode::Unused => 2,
            Mode::ExitLoopOnRelease => 3,
        }
    }

    pub fn is_looped(self) -> bool {
        matches!(self, Mode::GetsTrappedInLoop | Mode::ExitLoopOnRelease)
    }
}

/// Keys and velocities a sample responds to, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min_key: u8,
    pub max_key: u8,
    pub min_vel: u8,
    pub max_vel: u8,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            min_key: 0,
            max_key: 127,
            min_vel: 0,
            max_vel: 127,
        }
    }
}

impl Range {
    pub fn new(min_key: u8, max_key: u8, min_vel: u8, max_vel: u8) -> Self {
        Self {
            min_key,
            max_key,
            min_vel,
            max_vel,
        }
    }

    /// True if the key is in range and the velocity is too.
    ///
    /// A degenerate velocity range (`min_vel == max_vel`) accepts every
    /// velocity.
    pub fn contains(&self, key: u8, velocity: u8) -> bool {
        if !(self.min_key..=self.max_key).contains(&key) {
            return false;
        }
        if self.min_vel == self.max_vel {
            return true;
        }
        (self.min_vel..=self.max_vel).contains(&velocity)
    }
}

/// Which ear a sample is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    Mono,
    LeftEar,
    RightEar,
}

impl ChannelType {
    /// The ear a stereo partner must have.
    pub fn opposite(self) -> Option<ChannelType> {
        match self {
            ChannelType::Mono => None,
            ChannelType::LeftEar => Some(ChannelType::RightEar),
            ChannelType::RightEar => Some(ChannelType::LeftEar),
        }
    }
}

/// Mono audio plus everything a synthesizer needs to play it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSampleData {
    pub name: String,
    pub character: Character,
    pub loop_points: Loop,
    pub mode: Mode,
    pub range: Range,
    pub channel_type: ChannelType,
    pub audio: AudioData,
}

impl AudioSampleData {
    /// Creates an unlooped sample answering every key and velocity of
    /// instrument 0.
    pub fn new(name: impl Into<String>, audio: AudioData) -> Self {
        Self {
            name: name.into(),
            character: Character::default(),
            loop_points: Loop::default(),
            mode: Mode::default(),
            range: Range::default(),
            channel_type: ChannelType::default(),
            audio,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.audio.frame_count() as u64
    }

    /// True if the sample should loop: its mode asks for it and the loop
    /// region isn't empty.
    pub fn loops(&self) -> bool {
        self.mode.is_looped() && !self.loop_points.is_empty()
    }
}

impl fmt::Display for AudioSampleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" (instrument {}, keys {}-{}, {:?}, {:?})",
            self.name,
            self.character.instrument,
            self.range.min_key,
            self.range.max_key,
            self.mode,
            self.channel_type
        )
    }
}
