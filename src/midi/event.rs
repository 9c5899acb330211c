//! MIDI events and their binary codec.
//!
//! An [`Event`] is a delta time plus one of three payload kinds. Channel
//! events are the performance messages shared by files and live input; meta
//! events only appear in files; system-exclusive events are recognised but
//! not decoded.
//!
//! Every channel event carries its own status byte. Running status is not
//! supported.

use super::meta::MetaEvent;
use super::vlq::{read_vlq, vlq_len, write_vlq};
use super::{note_to_name, MidiError};
use crate::stream::ByteReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Status nibble of a channel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelEventType {
    NoteOff,
    NoteOn,
    NoteAftertouch,
    Controller,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
}

impl ChannelEventType {
    pub const ALL: [ChannelEventType; 7] = [
        ChannelEventType::NoteOff,
        ChannelEventType::NoteOn,
        ChannelEventType::NoteAftertouch,
        ChannelEventType::Controller,
        ChannelEventType::ProgramChange,
        ChannelEventType::ChannelAftertouch,
        ChannelEventType::PitchBend,
    ];

    /// Maps the high nibble of a status byte to an event type.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x8 => Some(ChannelEventType::NoteOff),
            0x9 => Some(ChannelEventType::NoteOn),
            0xA => Some(ChannelEventType::NoteAftertouch),
            0xB => Some(ChannelEventType::Controller),
            0xC => Some(ChannelEventType::ProgramChange),
            0xD => Some(ChannelEventType::ChannelAftertouch),
            0xE => Some(ChannelEventType::PitchBend),
            _ => None,
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            ChannelEventType::NoteOff => 0x8,
            ChannelEventType::NoteOn => 0x9,
            ChannelEventType::NoteAftertouch => 0xA,
            ChannelEventType::Controller => 0xB,
            ChannelEventType::ProgramChange => 0xC,
            ChannelEventType::ChannelAftertouch => 0xD,
            ChannelEventType::PitchBend => 0xE,
        }
    }

    /// Program change and channel aftertouch carry a single data byte.
    pub fn has_second_param(self) -> bool {
        !matches!(
            self,
            ChannelEventType::ProgramChange | ChannelEventType::ChannelAftertouch
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelEventType::NoteOff => "NOTE_OFF",
            ChannelEventType::NoteOn => "NOTE_ON",
            ChannelEventType::NoteAftertouch => "NOTE_AFTERTOUCH",
            ChannelEventType::Controller => "CONTROLLER",
            ChannelEventType::ProgramChange => "PROGRAM_CHANGE",
            ChannelEventType::ChannelAftertouch => "CHANNEL_AFTERTOUCH",
            ChannelEventType::PitchBend => "PITCH_BEND",
        }
    }
}

/// A performance message addressed to one of 16 channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub kind: ChannelEventType,

    /// MIDI channel (0-15).
    pub channel: u8,

    pub param1: u8,

    /// Ignored by event types with a single data byte.
    pub param2: u8,
}

impl ChannelEvent {
    pub fn new(kind: ChannelEventType, channel: u8, param1: u8, param2: u8) -> Self {
        Self {
            kind,
            channel,
            param1,
            param2,
        }
    }

    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(ChannelEventType::NoteOn, channel, key, velocity)
    }

    pub fn note_off(channel: u8, key: u8) -> Self {
        Self::new(ChannelEventType::NoteOff, channel, key, 0)
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(ChannelEventType::ProgramChange, channel, program, 0)
    }

    pub fn controller(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(ChannelEventType::Controller, channel, controller, value)
    }

    /// Status byte: type in the high nibble, channel in the low nibble.
    pub fn status(&self) -> u8 {
        (self.kind.nibble() << 4) | (self.channel & 0x0F)
    }

    /// True for NOTE_OFF and for NOTE_ON with velocity zero.
    pub fn is_note_release(&self) -> bool {
        match self.kind {
            ChannelEventType::NoteOff => true,
            ChannelEventType::NoteOn => self.param2 == 0,
            _ => false,
        }
    }

    /// Number of bytes [`ChannelEvent::encode`] writes.
    pub fn encoded_len(&self) -> usize {
        if self.kind.has_second_param() {
            3
        } else {
            2
        }
    }

    /// Decodes a channel event starting at its status byte.
    ///
    /// # Errors
    ///
    /// Fails on an unknown status nibble, a data byte with its high bit set,
    /// or a short stream.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, MidiError> {
        let status = reader.read_u8()?;
        let kind = ChannelEventType::from_nibble(status >> 4)
            .ok_or(MidiError::UnknownChannelEventType(status >> 4))?;
        let channel = status & 0x0F;

        let param1 = read_data_byte(reader)?;
        let param2 = if kind.has_second_param() {
            read_data_byte(reader)?
        } else {
            0
        };

        Ok(Self {
            kind,
            channel,
            param1,
            param2,
        })
    }

    /// Decodes a complete live message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MidiError> {
        Self::decode(&mut ByteReader::new(bytes))
    }

    /// Encodes the event, status byte first.
    ///
    /// # Errors
    ///
    /// Fails on a channel above 15, a data byte above 127, or a short write.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), MidiError> {
        if self.channel > 0x0F {
            return Err(MidiError::ChannelOutOfRange(self.channel));
        }
        check_data_byte(self.param1)?;

        if self.kind.has_second_param() {
            check_data_byte(self.param2)?;
            writer.write_all(&[self.status(), self.param1, self.param2])?;
        } else {
            writer.write_all(&[self.status(), self.param1])?;
        }
        Ok(())
    }

    /// Encodes the event as a standalone live message.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MidiError> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buffer)?;
        Ok(buffer)
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChannelEventType::NoteOn | ChannelEventType::NoteOff => write!(
                f,
                "{}: {} ({}), {} (channel: {})",
                self.kind.name(),
                self.param1,
                note_to_name(self.param1),
                self.param2,
                self.channel
            ),
            kind if kind.has_second_param() => write!(
                f,
                "{}: {}, {} (channel: {})",
                kind.name(),
                self.param1,
                self.param2,
                self.channel
            ),
            kind => write!(
                f,
                "{}: {} (channel: {})",
                kind.name(),
                self.param1,
                self.channel
            ),
        }
    }
}

fn read_data_byte(reader: &mut ByteReader<'_>) -> Result<u8, MidiError> {
    let byte = reader.read_u8()?;
    check_data_byte(byte)?;
    Ok(byte)
}

fn check_data_byte(byte: u8) -> Result<u8, MidiError> {
    if byte & 0x80 != 0 {
        Err(MidiError::DataByteOutOfRange(byte))
    } else {
        Ok(byte)
    }
}

/// A system-exclusive message. Its payload is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemExclusiveEvent {
    pub data: Vec<u8>,
}

impl SystemExclusiveEvent {
    pub fn decode(_reader: &mut ByteReader<'_>) -> Result<Self, MidiError> {
        Err(MidiError::NotImplemented("Decoding system-exclusive events"))
    }

    pub fn encode<W: Write>(&self, _writer: &mut W) -> Result<(), MidiError> {
        Err(MidiError::NotImplemented("Encoding system-exclusive events"))
    }
}

/// Payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Channel(ChannelEvent),
    Meta(MetaEvent),
    SystemExclusive(SystemExclusiveEvent),
}

/// A track event: ticks since the previous event plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub delta_time_ticks: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(delta_time_ticks: u64, kind: EventKind) -> Self {
        Self {
            delta_time_ticks,
            kind,
        }
    }

    pub fn channel(delta_time_ticks: u64, event: ChannelEvent) -> Self {
        Self::new(delta_time_ticks, EventKind::Channel(event))
    }

    pub fn meta(delta_time_ticks: u64, event: MetaEvent) -> Self {
        Self::new(delta_time_ticks, EventKind::Meta(event))
    }

    pub fn as_channel(&self) -> Option<&ChannelEvent> {
        match &self.kind {
            EventKind::Channel(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&MetaEvent> {
        match &self.kind {
            EventKind::Meta(event) => Some(event),
            _ => None,
        }
    }

    /// Decodes a delta time followed by an event, dispatching on the status byte.
    ///
    /// # Errors
    ///
    /// Fails on a status byte that starts no known event, on malformed
    /// payloads, and on system-exclusive events.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, MidiError> {
        let delta_time_ticks = read_vlq(reader)?;
        let status = reader.peek_u8()?;

        let kind = match status {
            0x80..=0xEF => EventKind::Channel(ChannelEvent::decode(reader)?),
            0xFF => EventKind::Meta(MetaEvent::decode(reader)?),
            0xF0 | 0xF7 => EventKind::SystemExclusive(SystemExclusiveEvent::decode(reader)?),
            other => return Err(MidiError::UnknownStatus(other)),
        };

        Ok(Self {
            delta_time_ticks,
            kind,
        })
    }

    /// Encodes the delta time and the event.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), MidiError> {
        write_vlq(self.delta_time_ticks, writer)?;
        match &self.kind {
            EventKind::Channel(event) => event.encode(writer),
            EventKind::Meta(event) => event.encode(writer),
            EventKind::SystemExclusive(event) => event.encode(writer),
        }
    }

    /// Encoded size, when it is known without encoding.
    pub fn encoded_len(&self) -> Option<usize> {
        let payload = match &self.kind {
            EventKind::Channel(event) => event.encoded_len(),
            EventKind::Meta(event) => event.encoded_len(),
            EventKind::SystemExclusive(_) => return None,
        };
        Some(vlq_len(self.delta_time_ticks) + payload)
    }
}
