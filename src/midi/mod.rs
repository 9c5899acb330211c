//! MIDI data model and binary codec.
//!
//! This module provides events, tracks and documents, the Standard MIDI
//! File reader/writer, and a player that feeds documents to a synthesizer
//! in wall-clock time.

mod document;
mod error;
pub mod event;
mod file;
pub mod meta;
mod player;
mod track;
pub mod vlq;

pub use document::{FormatType, MidiDocument, Timing};
pub use error::MidiError;
pub use event::{ChannelEvent, ChannelEventType, Event, EventKind, SystemExclusiveEvent};
pub use file::{read_midi, write_midi};
pub use meta::{KeySignature, MetaEvent, MetaEventType, SmpteOffset, Tempo, TextKind, TimeSignature};
pub use player::{MidiMessageSink, MidiPlayer};
pub use track::Track;

/// Ticks per quarter note of a new document.
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 48;

/// Number of MIDI channels.
pub const NUM_CHANNELS: u8 = 16;

/// Pitch class names, sharps only, starting from C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name of a key, with middle C (60) as `C4`.
///
/// ```
/// use wavesynth::midi::note_to_name;
///
/// assert_eq!(note_to_name(61), "C#4");
/// ```
pub fn note_to_name(key: u8) -> String {
    let octave = i16::from(key / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(key % 12)], octave)
}

/// Parses a pitch name such as `A4`, `f#2` or `Bb-1` into a key.
///
/// Returns `None` for unknown letters, malformed octaves and pitches outside
/// 0-127.
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i16 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.as_bytes().first() {
        Some(b'#') => (1, &rest[1..]),
        Some(b'b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i16 = octave.parse().ok()?;

    let key = (octave + 1) * 12 + base + accidental;
    u8::try_from(key).ok().filter(|&key| key <= 127)
}

/// Frequency of a MIDI pitch in equal temperament, A4 (69) = 440 Hz.
pub fn pitch_to_frequency(pitch: f64) -> f64 {
    440.0 * 2f64.powf((pitch - 69.0) / 12.0)
}

/// Fractional MIDI pitch of a frequency.
pub fn frequency_to_pitch(frequency_hz: f64) -> f64 {
    69.0 + 12.0 * (frequency_hz / 440.0).log2()
}

/// Detunes a frequency by a number of cents.
pub fn tune_pitch(frequency_hz: f64, cents: f64) -> f64 {
    frequency_hz * 2f64.powf(cents / 1200.0)
}

/// Linear amplitude for a note velocity.
pub fn velocity_to_amplitude(velocity: u8) -> f32 {
    f32::from(velocity.min(127)) / 127.0
}
