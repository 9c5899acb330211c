//! Plays a MIDI document in wall-clock time.
//!
//! The player keeps one cursor per track. Each call to
//! [`MidiPlayer::advance`] moves the clock forward and forwards every channel
//! event that became due to a [`MidiMessageSink`] as a live message.

use super::event::EventKind;
use super::meta::{MetaEvent, Tempo};
use super::{ChannelEvent, FormatType, MidiDocument, MidiError, Timing};
use std::collections::BTreeSet;

/// Receives live MIDI messages.
pub trait MidiMessageSink {
    /// Handles one encoded channel message.
    ///
    /// # Arguments
    ///
    /// * `delta_time_seconds` - Time since the previous message, if known
    /// * `message` - Status byte followed by its data bytes
    fn receive_message(&mut self, delta_time_seconds: f64, message: &[u8]) -> crate::Result<()>;
}

/// Playback position within one track.
#[derive(Debug, Clone)]
struct TrackCursor {
    track: usize,
    next_event: usize,
    time_since_last_event: f64,
    tempo: Tempo,
}

impl TrackCursor {
    fn advance<S: MidiMessageSink + ?Sized>(
        &mut self,
        document: &MidiDocument,
        ticks_per_quarter: f64,
        delta_seconds: f64,
        sink: &mut S,
    ) -> crate::Result<()> {
        let track = document
            .track(self.track)
            .ok_or(MidiError::TrackNotFound(self.track))?;

        self.time_since_last_event += delta_seconds;

        while let Some(event) = track.get_event(self.next_event) {
            let us_per_tick = f64::from(self.tempo.microseconds_per_quarter_note) / ticks_per_quarter;
            let wait_seconds = event.delta_time_ticks as f64 * us_per_tick / 1_000_000.0;
            if self.time_since_last_event < wait_seconds {
                break;
            }
            self.time_since_last_event -= wait_seconds;

            match &event.kind {
                EventKind::Meta(MetaEvent::SetTempo(tempo)) => {
                    tracing::debug!(
                        "Track {} tempo change to {:.1} BPM",
                        self.track,
                        tempo.beats_per_minute()
                    );
                    self.tempo = *tempo;
                }
                EventKind::Channel(channel_event) => {
                    let message = channel_event.to_bytes()?;
                    sink.receive_message(0.0, &message)?;
                }
                _ => {}
            }
            self.next_event += 1;
        }

        Ok(())
    }

    fn more_to_play(&self, document: &MidiDocument) -> bool {
        document
            .track(self.track)
            .is_some_and(|track| self.next_event < track.len())
    }
}

/// Walks a document's tracks in time, sending their channel events to a sink.
#[derive(Debug)]
pub struct MidiPlayer<'a> {
    document: &'a MidiDocument,
    tracks_to_play: BTreeSet<usize>,
    cursors: Vec<TrackCursor>,
    time_seconds: f64,
}

impl<'a> MidiPlayer<'a> {
    /// Creates a player configured to play every playable track.
    pub fn new(document: &'a MidiDocument) -> Self {
        let mut player = Self {
            document,
            tracks_to_play: BTreeSet::new(),
            cursors: Vec::new(),
            time_seconds: 0.0,
        };
        player.configure_to_play_all_tracks();
        player
    }

    /// Selects every playable track: track 0 of a single-track document, or
    /// every track but the info track of a multi-track one.
    pub fn configure_to_play_all_tracks(&mut self) {
        self.tracks_to_play.clear();
        match self.document.format_type {
            FormatType::SingleTrack => {
                if self.document.num_tracks() == 1 {
                    self.tracks_to_play.insert(0);
                }
            }
            FormatType::MultiTrack => {
                self.tracks_to_play.extend(1..self.document.num_tracks());
            }
            FormatType::VariousTracks => {}
        }
    }

    /// Replaces the set of tracks to play.
    pub fn set_tracks_to_play<I: IntoIterator<Item = usize>>(&mut self, tracks: I) {
        self.tracks_to_play = tracks.into_iter().collect();
    }

    pub fn tracks_to_play(&self) -> impl Iterator<Item = usize> + '_ {
        self.tracks_to_play.iter().copied()
    }

    fn ticks_per_quarter(&self) -> Result<f64, MidiError> {
        match self.document.timing {
            Timing::TicksPerQuarterNote(0) => Err(MidiError::ZeroTicksPerQuarter),
            Timing::TicksPerQuarterNote(tpqn) => Ok(f64::from(tpqn)),
            Timing::FramesPerSecond { .. } => Err(MidiError::FpsTimingUnsupported),
        }
    }

    /// Rewinds to the start and creates the track cursors.
    ///
    /// # Errors
    ///
    /// Fails if there is nothing to play, if the format or timing isn't
    /// supported, or if a selected track doesn't exist.
    pub fn setup(&mut self) -> Result<(), MidiError> {
        self.cursors.clear();
        self.time_seconds = 0.0;

        if self.tracks_to_play.is_empty() {
            return Err(MidiError::NothingToPlay);
        }
        if self.document.format_type == FormatType::VariousTracks {
            return Err(MidiError::UnsupportedPlaybackFormat(self.document.format_type));
        }
        self.ticks_per_quarter()?;

        let tempo = self.document.initial_tempo();
        for &track in &self.tracks_to_play {
            if track >= self.document.num_tracks() {
                return Err(MidiError::TrackNotFound(track));
            }
            self.cursors.push(TrackCursor {
                track,
                next_event: 0,
                time_since_last_event: 0.0,
                tempo,
            });
        }

        tracing::info!(
            "Player set up with {} track(s) at {:.1} BPM",
            self.cursors.len(),
            tempo.beats_per_minute()
        );
        Ok(())
    }

    /// Moves playback forward and sends every event that became due.
    ///
    /// # Arguments
    ///
    /// * `delta_seconds` - Wall-clock time elapsed since the previous call
    /// * `sink` - Receiver of the channel events
    pub fn advance<S: MidiMessageSink + ?Sized>(
        &mut self,
        delta_seconds: f64,
        sink: &mut S,
    ) -> crate::Result<()> {
        let ticks_per_quarter = self.ticks_per_quarter()?;
        self.time_seconds += delta_seconds;
        for cursor in &mut self.cursors {
            cursor.advance(self.document, ticks_per_quarter, delta_seconds, sink)?;
        }
        Ok(())
    }

    /// True once every cursor has passed its last event.
    pub fn is_finished(&self) -> bool {
        !self
            .cursors
            .iter()
            .any(|cursor| cursor.more_to_play(self.document))
    }

    /// Playback time since [`MidiPlayer::setup`].
    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    /// Sends NOTE_OFF for every key on every channel.
    pub fn silence_all_channels<S: MidiMessageSink + ?Sized>(
        &self,
        sink: &mut S,
    ) -> crate::Result<()> {
        for channel in 0..16u8 {
            for key in 0..=127u8 {
                let message = ChannelEvent::note_off(channel, key).to_bytes()?;
                sink.receive_message(0.0, &message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::Event;
    use crate::midi::Track;

    #[derive(Default)]
    struct RecordingSink {
        messages: Vec<Vec<u8>>,
    }

    impl MidiMessageSink for RecordingSink {
        fn receive_message(&mut self, _delta: f64, message: &[u8]) -> crate::Result<()> {
            self.messages.push(message.to_vec());
            Ok(())
        }
    }

    fn document() -> MidiDocument {
        let mut info = Track::new();
        info.add_event(Event::meta(0, MetaEvent::SetTempo(Tempo::new(1_000_000))));

        let mut melody = Track::new();
        melody.add_event(Event::channel(0, ChannelEvent::note_on(0, 60, 100)));
        melody.add_event(Event::channel(100, ChannelEvent::note_off(0, 60)));
        melody.add_event(Event::meta(0, MetaEvent::SetTempo(Tempo::new(500_000))));
        melody.add_event(Event::channel(100, ChannelEvent::note_on(0, 62, 100)));

        let mut doc = MidiDocument::new(FormatType::MultiTrack, Timing::TicksPerQuarterNote(100));
        doc.add_track(info);
        doc.add_track(melody);
        doc
    }

    #[test]
    fn test_plays_events_when_due() {
        let doc = document();
        let mut player = MidiPlayer::new(&doc);
        assert_eq!(player.tracks_to_play().collect::<Vec<_>>(), vec![1]);
        player.setup().unwrap();

        let mut sink = RecordingSink::default();
        player.advance(0.0, &mut sink).unwrap();
        assert_eq!(sink.messages, vec![vec![0x90, 60, 100]]);

        // One quarter at 60 BPM is a full second
        player.advance(0.5, &mut sink).unwrap();
        assert_eq!(sink.messages.len(), 1);
        player.advance(0.5, &mut sink).unwrap();
        assert_eq!(sink.messages.len(), 2);
        assert_eq!(sink.messages[1], vec![0x80, 60, 0]);

        // The track's own tempo change halves the next wait
        assert!(!player.is_finished());
        player.advance(0.5, &mut sink).unwrap();
        assert_eq!(sink.messages.len(), 3);
        assert!(player.is_finished());
        assert!((player.time_seconds() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_setup_errors() {
        let doc = MidiDocument::default();
        let mut player = MidiPlayer::new(&doc);
        assert!(matches!(player.setup(), Err(MidiError::NothingToPlay)));

        let mut doc = document();
        doc.timing = Timing::FramesPerSecond {
            fps: 30,
            ticks_per_frame: 4,
        };
        let mut player = MidiPlayer::new(&doc);
        assert!(matches!(player.setup(), Err(MidiError::FpsTimingUnsupported)));

        let doc = document();
        let mut player = MidiPlayer::new(&doc);
        player.set_tracks_to_play([5]);
        assert!(matches!(player.setup(), Err(MidiError::TrackNotFound(5))));
    }

    #[test]
    fn test_single_track_plays_track_zero() {
        let mut doc = MidiDocument::new(FormatType::SingleTrack, Timing::TicksPerQuarterNote(96));
        doc.add_track(Track::from_events(vec![Event::channel(
            0,
            ChannelEvent::note_on(3, 70, 80),
        )]));
        let mut player = MidiPlayer::new(&doc);
        player.setup().unwrap();
        let mut sink = RecordingSink::default();
        player.advance(0.0, &mut sink).unwrap();
        assert_eq!(sink.messages, vec![vec![0x93, 70, 80]]);
        assert!(player.is_finished());
    }

    #[test]
    fn test_silence_all_channels() {
        let doc = document();
        let player = MidiPlayer::new(&doc);
        let mut sink = RecordingSink::default();
        player.silence_all_channels(&mut sink).unwrap();
        assert_eq!(sink.messages.len(), 16 * 128);
        assert_eq!(sink.messages[0], vec![0x80, 0, 0]);
        assert_eq!(sink.messages[16 * 128 - 1], vec![0x8F, 127, 0]);
    }
}
