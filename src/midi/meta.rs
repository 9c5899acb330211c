//! Meta events: file-only metadata such as tempo, text and signatures.
//!
//! Each kind is its own variant with a typed payload, so a payload can never
//! disagree with its type code. Subtypes this module does not know are kept
//! as opaque bytes so that a file survives a read/write cycle.

use super::vlq::{read_vlq, vlq_len, write_vlq};
use super::MidiError;
use crate::stream::ByteReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Prefix byte shared by every meta event.
pub const META_PREFIX: u8 = 0xFF;

/// Default tempo: 120 BPM.
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Type codes of meta events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaEventType {
    SequenceNumber,
    TextEvent,
    Copyright,
    TrackName,
    InstrumentName,
    Lyrics,
    Marker,
    CuePoint,
    ChannelPrefix,
    EndOfTrack,
    SetTempo,
    SmpteOffset,
    TimeSignature,
    KeySignature,
    SequencerSpecific,
    Unknown(u8),
}

impl MetaEventType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => MetaEventType::SequenceNumber,
            0x01 => MetaEventType::TextEvent,
            0x02 => MetaEventType::Copyright,
            0x03 => MetaEventType::TrackName,
            0x04 => MetaEventType::InstrumentName,
            0x05 => MetaEventType::Lyrics,
            0x06 => MetaEventType::Marker,
            0x07 => MetaEventType::CuePoint,
            0x20 => MetaEventType::ChannelPrefix,
            0x2F => MetaEventType::EndOfTrack,
            0x51 => MetaEventType::SetTempo,
            0x54 => MetaEventType::SmpteOffset,
            0x58 => MetaEventType::TimeSignature,
            0x59 => MetaEventType::KeySignature,
            0x7F => MetaEventType::SequencerSpecific,
            other => MetaEventType::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            MetaEventType::SequenceNumber => 0x00,
            MetaEventType::TextEvent => 0x01,
            MetaEventType::Copyright => 0x02,
            MetaEventType::TrackName => 0x03,
            MetaEventType::InstrumentName => 0x04,
            MetaEventType::Lyrics => 0x05,
            MetaEventType::Marker => 0x06,
            MetaEventType::CuePoint => 0x07,
            MetaEventType::ChannelPrefix => 0x20,
            MetaEventType::EndOfTrack => 0x2F,
            MetaEventType::SetTempo => 0x51,
            MetaEventType::SmpteOffset => 0x54,
            MetaEventType::TimeSignature => 0x58,
            MetaEventType::KeySignature => 0x59,
            MetaEventType::SequencerSpecific => 0x7F,
            MetaEventType::Unknown(code) => code,
        }
    }

    /// Payload length mandated for this type, if it is fixed.
    pub fn fixed_length(self) -> Option<usize> {
        match self {
            MetaEventType::SequenceNumber => Some(2),
            MetaEventType::ChannelPrefix => Some(1),
            MetaEventType::EndOfTrack => Some(0),
            MetaEventType::SetTempo => Some(3),
            MetaEventType::SmpteOffset => Some(5),
            MetaEventType::TimeSignature => Some(4),
            MetaEventType::KeySignature => Some(2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MetaEventType::SequenceNumber => "sequence number",
            MetaEventType::TextEvent => "text",
            MetaEventType::Copyright => "copyright",
            MetaEventType::TrackName => "track name",
            MetaEventType::InstrumentName => "instrument name",
            MetaEventType::Lyrics => "lyrics",
            MetaEventType::Marker => "marker",
            MetaEventType::CuePoint => "cue point",
            MetaEventType::ChannelPrefix => "channel prefix",
            MetaEventType::EndOfTrack => "end of track",
            MetaEventType::SetTempo => "set tempo",
            MetaEventType::SmpteOffset => "SMPTE offset",
            MetaEventType::TimeSignature => "time signature",
            MetaEventType::KeySignature => "key signature",
            MetaEventType::SequencerSpecific => "sequencer specific",
            MetaEventType::Unknown(_) => "unknown",
        }
    }
}

/// The seven meta kinds whose payload is free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextKind {
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyrics,
    Marker,
    CuePoint,
}

impl TextKind {
    pub fn event_type(self) -> MetaEventType {
        match self {
            TextKind::Text => MetaEventType::TextEvent,
            TextKind::Copyright => MetaEventType::Copyright,
            TextKind::TrackName => MetaEventType::TrackName,
            TextKind::InstrumentName => MetaEventType::InstrumentName,
            TextKind::Lyrics => MetaEventType::Lyrics,
            TextKind::Marker => MetaEventType::Marker,
            TextKind::CuePoint => MetaEventType::CuePoint,
        }
    }

    fn from_event_type(event_type: MetaEventType) -> Option<Self> {
        match event_type {
            MetaEventType::TextEvent => Some(TextKind::Text),
            MetaEventType::Copyright => Some(TextKind::Copyright),
            MetaEventType::TrackName => Some(TextKind::TrackName),
            MetaEventType::InstrumentName => Some(TextKind::InstrumentName),
            MetaEventType::Lyrics => Some(TextKind::Lyrics),
            MetaEventType::Marker => Some(TextKind::Marker),
            MetaEventType::CuePoint => Some(TextKind::CuePoint),
            _ => None,
        }
    }
}

/// Microseconds per quarter note (24 bits on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tempo {
    pub microseconds_per_quarter_note: u32,
}

impl Tempo {
    pub fn new(microseconds_per_quarter_note: u32) -> Self {
        Self {
            microseconds_per_quarter_note,
        }
    }

    pub fn beats_per_minute(&self) -> f64 {
        60_000_000.0 / self.microseconds_per_quarter_note as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO_US)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub sub_frames: u8,
}

/// Time signature; the denominator is stored as a power-of-two exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator_exponent: u8,
    pub metronome_clocks: u8,
    pub thirty_seconds_per_quarter: u8,
}

impl TimeSignature {
    /// The denominator as a note value (4 for quarter notes).
    pub fn denominator(&self) -> u32 {
        1u32.checked_shl(self.denominator_exponent.into())
            .unwrap_or(0)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator_exponent: 2,
            metronome_clocks: 24,
            thirty_seconds_per_quarter: 8,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator())
    }
}

/// Key signature as a count of sharps (positive) or flats (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySignature {
    pub sharps_flats: i8,

    /// 0 for major, 1 for minor.
    pub scale: u8,
}

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

impl KeySignature {
    pub fn is_minor(&self) -> bool {
        self.scale == 1
    }

    /// Tonic name, or `None` for more than seven sharps or flats.
    pub fn tonic(&self) -> Option<&'static str> {
        let index = usize::try_from(i16::from(self.sharps_flats) + 7).ok()?;
        let table = if self.is_minor() { &MINOR_KEYS } else { &MAJOR_KEYS };
        table.get(index).copied()
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_minor() { "minor" } else { "major" };
        match self.tonic() {
            Some(tonic) => write!(f, "{} {}", tonic, mode),
            None => write!(f, "{} accidentals {}", self.sharps_flats, mode),
        }
    }
}

/// A meta event with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaEvent {
    SequenceNumber(u16),
    Text { kind: TextKind, bytes: Vec<u8> },
    ChannelPrefix(u8),
    EndOfTrack,
    SetTempo(Tempo),
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    SequencerSpecific(Vec<u8>),
    Unknown { type_code: u8, bytes: Vec<u8> },
}

impl MetaEvent {
    /// Convenience constructor for text-family events.
    pub fn text(kind: TextKind, text: &str) -> Self {
        MetaEvent::Text {
            kind,
            bytes: text.as_bytes().to_vec(),
        }
    }

    pub fn event_type(&self) -> MetaEventType {
        match self {
            MetaEvent::SequenceNumber(_) => MetaEventType::SequenceNumber,
            MetaEvent::Text { kind, .. } => kind.event_type(),
            MetaEvent::ChannelPrefix(_) => MetaEventType::ChannelPrefix,
            MetaEvent::EndOfTrack => MetaEventType::EndOfTrack,
            MetaEvent::SetTempo(_) => MetaEventType::SetTempo,
            MetaEvent::SmpteOffset(_) => MetaEventType::SmpteOffset,
            MetaEvent::TimeSignature(_) => MetaEventType::TimeSignature,
            MetaEvent::KeySignature(_) => MetaEventType::KeySignature,
            MetaEvent::SequencerSpecific(_) => MetaEventType::SequencerSpecific,
            MetaEvent::Unknown { type_code, .. } => MetaEventType::Unknown(*type_code),
        }
    }

    /// Text payload, lossily decoded, for text-family events.
    pub fn as_text(&self) -> Option<String> {
        match self {
            MetaEvent::Text { bytes, .. } => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Decodes a meta event starting at its 0xFF prefix.
    ///
    /// # Errors
    ///
    /// Fails if the prefix is wrong, if a fixed-size kind declares a different
    /// length, if a sequencer-specific payload is empty, or on a short stream.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, MidiError> {
        let prefix = reader.read_u8()?;
        if prefix != META_PREFIX {
            return Err(MidiError::NotAMetaEvent(prefix));
        }

        let event_type = MetaEventType::from_code(reader.read_u8()?);
        let length = read_vlq(reader)?;

        if let Some(expected) = event_type.fixed_length() {
            if length != expected as u64 {
                return Err(MidiError::MetaLength {
                    kind: event_type.name(),
                    expected,
                    actual: length,
                });
            }
        }

        let length = usize::try_from(length)
            .ok()
            .filter(|&len| len <= reader.remaining())
            .ok_or(MidiError::MetaTooLong(length))?;
        let payload = reader.read_bytes(length)?;

        let event = match event_type {
            MetaEventType::SequenceNumber => {
                MetaEvent::SequenceNumber(u16::from_be_bytes([payload[0], payload[1]]))
            }
            MetaEventType::ChannelPrefix => MetaEvent::ChannelPrefix(payload[0]),
            MetaEventType::EndOfTrack => MetaEvent::EndOfTrack,
            MetaEventType::SetTempo => MetaEvent::SetTempo(Tempo::new(u32::from_be_bytes([
                0, payload[0], payload[1], payload[2],
            ]))),
            MetaEventType::SmpteOffset => MetaEvent::SmpteOffset(SmpteOffset {
                hours: payload[0],
                minutes: payload[1],
                seconds: payload[2],
                frames: payload[3],
                sub_frames: payload[4],
            }),
            MetaEventType::TimeSignature => MetaEvent::TimeSignature(TimeSignature {
                numerator: payload[0],
                denominator_exponent: payload[1],
                metronome_clocks: payload[2],
                thirty_seconds_per_quarter: payload[3],
            }),
            MetaEventType::KeySignature => MetaEvent::KeySignature(KeySignature {
                sharps_flats: payload[0] as i8,
                scale: payload[1],
            }),
            MetaEventType::SequencerSpecific => {
                if payload.is_empty() {
                    return Err(MidiError::EmptySequencerSpecific);
                }
                MetaEvent::SequencerSpecific(payload.to_vec())
            }
            MetaEventType::Unknown(type_code) => MetaEvent::Unknown {
                type_code,
                bytes: payload.to_vec(),
            },
            text_type => match TextKind::from_event_type(text_type) {
                Some(kind) => MetaEvent::Text {
                    kind,
                    bytes: payload.to_vec(),
                },
                None => MetaEvent::Unknown {
                    type_code: text_type.code(),
                    bytes: payload.to_vec(),
                },
            },
        };

        Ok(event)
    }

    /// Payload bytes as written after the length.
    fn payload(&self) -> Result<Vec<u8>, MidiError> {
        let payload = match self {
            MetaEvent::SequenceNumber(number) => number.to_be_bytes().to_vec(),
            MetaEvent::Text { bytes, .. } => bytes.clone(),
            MetaEvent::ChannelPrefix(channel) => vec![*channel],
            MetaEvent::EndOfTrack => Vec::new(),
            MetaEvent::SetTempo(tempo) => {
                let us = tempo.microseconds_per_quarter_note;
                if us > 0x00FF_FFFF {
                    return Err(MidiError::TempoOutOfRange(us));
                }
                us.to_be_bytes()[1..].to_vec()
            }
            MetaEvent::SmpteOffset(offset) => vec![
                offset.hours,
                offset.minutes,
                offset.seconds,
                offset.frames,
                offset.sub_frames,
            ],
            MetaEvent::TimeSignature(sig) => vec![
                sig.numerator,
                sig.denominator_exponent,
                sig.metronome_clocks,
                sig.thirty_seconds_per_quarter,
            ],
            MetaEvent::KeySignature(key) => vec![key.sharps_flats as u8, key.scale],
            MetaEvent::SequencerSpecific(bytes) => {
                if bytes.is_empty() {
                    return Err(MidiError::EmptySequencerSpecific);
                }
                bytes.clone()
            }
            MetaEvent::Unknown { type_code, bytes } => {
                if !matches!(MetaEventType::from_code(*type_code), MetaEventType::Unknown(_)) {
                    return Err(MidiError::KnownMetaTypeAsUnknown(*type_code));
                }
                bytes.clone()
            }
        };
        Ok(payload)
    }

    /// Encodes prefix, type code, length and payload.
    ///
    /// # Errors
    ///
    /// Fails on a tempo wider than 24 bits, an empty sequencer-specific
    /// payload, an [`MetaEvent::Unknown`] carrying a recognised type code, or
    /// a write error
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), MidiError> {
        let payload = self.payload()?;
        writer.write_all(&[META_PREFIX, self.event_type().code()])?;
        write_vlq(payload.len() as u64, writer)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        let len = match self {
            MetaEvent::Text { bytes, .. }
            | MetaEvent::SequencerSpecific(bytes)
            | MetaEvent::Unknown { bytes, .. } => bytes.len(),
            other => other.event_type().fixed_length().unwrap_or(0),
        };
        2 + vlq_len(len as u64) + len
    }
}
