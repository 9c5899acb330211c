//! MIDI document: format, timing and an ordered list of tracks.
//!
//! In multi-track documents, track 0 is the info track. It carries the
//! global tempo and time signature and has no playable duration of its own.

use super::event::EventKind;
use super::meta::{MetaEvent, MetaEventType, Tempo, TimeSignature};
use super::{MidiError, Track, DEFAULT_TICKS_PER_QUARTER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard MIDI File format types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatType {
    /// Format 0: one track holding every channel.
    SingleTrack,
    /// Format 1: simultaneous tracks, track 0 holding global metadata.
    MultiTrack,
    /// Format 2: independent sequences.
    VariousTracks,
}

impl FormatType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(FormatType::SingleTrack),
            1 => Some(FormatType::MultiTrack),
            2 => Some(FormatType::VariousTracks),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            FormatType::SingleTrack => 0,
            FormatType::MultiTrack => 1,
            FormatType::VariousTracks => 2,
        }
    }
}

/// How delta times map to musical or wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    TicksPerQuarterNote(u16),
    FramesPerSecond { fps: u8, ticks_per_frame: u8 },
}

impl Default for Timing {
    fn default() -> Self {
        Timing::TicksPerQuarterNote(DEFAULT_TICKS_PER_QUARTER)
    }
}

/// A complete MIDI sequence.
///
/// The document exclusively owns its tracks, which own their events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiDocument {
    pub format_type: FormatType,
    pub timing: Timing,
    tracks: Vec<Track>,
}

impl Default for MidiDocument {
    fn default() -> Self {
        Self::new(FormatType::MultiTrack, Timing::default())
    }
}

impl MidiDocument {
    /// Creates an empty document.
    ///
    /// # Arguments
    ///
    /// * `format_type` - SMF format of the document
    /// * `timing` - Delta-time resolution
    pub fn new(format_type: FormatType, timing: Timing) -> Self {
        Self {
            format_type,
            timing,
            tracks: Vec::new(),
        }
    }

    /// Appends a track.
    ///
    /// # Returns
    ///
    /// The index of the new track
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Removes the track at `index`, keeping the order of the others.
    ///
    /// # Errors
    ///
    /// Returns [`MidiError::TrackNotFound`] if `index` is out of range
    pub fn remove_track(&mut self, index: usize) -> Result<Track, MidiError> {
        if index >= self.tracks.len() {
            return Err(MidiError::TrackNotFound(index));
        }
        Ok(self.tracks.remove(index))
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Removes every track.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// The info track of a multi-track document.
    pub fn info_track(&self) -> Option<&Track> {
        match self.format_type {
            FormatType::MultiTrack => self.tracks.first(),
            _ => None,
        }
    }

    /// The first tempo of the info track, or the default tempo.
    pub fn initial_tempo(&self) -> Tempo {
        match self
            .info_track()
            .and_then(|track| track.find_meta_event(MetaEventType::SetTempo))
        {
            Some(MetaEvent::SetTempo(tempo)) => *tempo,
            _ => Tempo::default(),
        }
    }

    /// The first time signature of the info track, or 4/4.
    pub fn initial_time_signature(&self) -> TimeSignature {
        match self
            .info_track()
            .and_then(|track| track.find_meta_event(MetaEventType::TimeSignature))
        {
            Some(MetaEvent::TimeSignature(sig)) => *sig,
            _ => TimeSignature::default(),
        }
    }

    /// Measures the playing time of a track.
    ///
    /// Only channel events advance the clock. Tempo changes in the track
    /// apply from the point they appear. Time signatures don't affect
    /// wall-clock length.
    ///
    /// # Arguments
    ///
    /// * `index` - Track to measure
    ///
    /// # Returns
    ///
    /// Length in seconds
    ///
    /// # Errors
    ///
    /// Fails if the track doesn't exist, if it is the info track of a
    /// multi-track document, or if the document uses frames-per-second timing.
    pub fn calculate_track_length_seconds(&self, index: usize) -> Result<f64, MidiError> {
        let track = self.track(index).ok_or(MidiError::TrackNotFound(index))?;

        if self.format_type == FormatType::MultiTrack && index == 0 {
            return Err(MidiError::InfoTrackLength);
        }

        let ticks_per_quarter = match self.timing {
            Timing::TicksPerQuarterNote(0) => return Err(MidiError::ZeroTicksPerQuarter),
            Timing::TicksPerQuarterNote(tpqn) => f64::from(tpqn),
            Timing::FramesPerSecond { .. } => return Err(MidiError::FpsTimingUnsupported),
        };

        let mut tempo = self.initial_tempo();
        let mut seconds = 0.0;

        for event in track.events() {
            match &event.kind {
                EventKind::Meta(MetaEvent::SetTempo(new_tempo)) => tempo = *new_tempo,
                EventKind::Channel(_) => {
                    let us_per_tick =
                        f64::from(tempo.microseconds_per_quarter_note) / ticks_per_quarter;
                    seconds += event.delta_time_ticks as f64 * us_per_tick / 1_000_000.0;
                }
                _ => {}
            }
        }

        Ok(seconds)
    }

    /// Serializes the document to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, MidiError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a document from JSON produced by [`MidiDocument::to_json`].
    pub fn from_json(json: &str) -> Result<Self, MidiError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for MidiDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Format: {:?}, ", self.format_type)?;
        match self.timing {
            Timing::TicksPerQuarterNote(tpqn) => write!(f, "{} ticks per quarter note, ", tpqn)?,
            Timing::FramesPerSecond {
                fps,
                ticks_per_frame,
            } => write!(f, "{} fps x {} ticks per frame, ", fps, ticks_per_frame)?,
        }
        write!(f, "{} track(s)", self.tracks.len())
    }
}
