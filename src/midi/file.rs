//! Standard MIDI File (SMF) reading and writing.
//!
//! A file is an `MThd` header chunk followed by `MTrk` track chunks. Chunk
//! lengths and header fields are big-endian. Chunks with other IDs are
//! skipped on read.
//!
//! # Limitations
//!
//! - Running status is not supported, so files relying on it fail to load
//! - System-exclusive events fail to load

use super::event::Event;
use super::{FormatType, MidiDocument, MidiError, Timing, Track};
use crate::stream::{ByteOrderResolver, ByteReader, Endianness};
use std::fs;
use std::io::Write;
use std::path::Path;

const HEADER_CHUNK_ID: &[u8; 4] = b"MThd";
const TRACK_CHUNK_ID: &[u8; 4] = b"MTrk";
const HEADER_LENGTH: u32 = 6;

/// Division bit selecting frames-per-second timing.
const DIVISION_FPS_BIT: u16 = 0x8000;

fn big_endian() -> ByteOrderResolver {
    ByteOrderResolver::for_stream(Endianness::Big)
}

fn chunk_name(id: &[u8]) -> String {
    String::from_utf8_lossy(id).into_owned()
}

/// Parses a complete MIDI file held in memory.
///
/// # Arguments
///
/// * `data` - The file contents
///
/// # Returns
///
/// The decoded document
///
/// # Errors
///
/// Returns an error naming the failing track and event if any event is
/// malformed, or if the header is invalid or disagrees with the track count.
pub fn read_midi(data: &[u8]) -> Result<MidiDocument, MidiError> {
    let order = big_endian();
    let mut reader = ByteReader::new(data);

    let id = reader.read_bytes(4)?;
    if id != HEADER_CHUNK_ID {
        return Err(MidiError::UnexpectedChunk {
            expected: "MThd",
            found: chunk_name(id),
        });
    }
    let header_length = reader.read_u32(order)?;
    if header_length < HEADER_LENGTH {
        return Err(MidiError::HeaderTooShort(header_length));
    }
    let header_end = reader.offset() + header_length as usize;

    let format = reader.read_u16(order)?;
    let format_type = FormatType::from_u16(format).ok_or(MidiError::UnknownFormat(format))?;
    let declared_tracks = reader.read_u16(order)?;
    let division = reader.read_u16(order)?;
    reader.set_offset(header_end)?;

    let timing = if division & DIVISION_FPS_BIT != 0 {
        Timing::FramesPerSecond {
            fps: ((division & 0x7F00) >> 8) as u8,
            ticks_per_frame: (division & 0x00FF) as u8,
        }
    } else {
        Timing::TicksPerQuarterNote(division)
    };

    let mut document = MidiDocument::new(format_type, timing);

    while reader.can_read() {
        let id = reader.read_bytes(4)?;
        let length = reader.read_u32(order)? as usize;
        let payload = reader.read_bytes(length)?;

        if id != TRACK_CHUNK_ID {
            tracing::debug!("Skipping unknown chunk \"{}\" ({} bytes)", chunk_name(id), length);
            continue;
        }

        let track_index = document.num_tracks();
        document.add_track(read_track(payload, track_index)?);
    }

    if document.num_tracks() != usize::from(declared_tracks) {
        return Err(MidiError::TrackCountMismatch {
            declared: declared_tracks,
            found: document.num_tracks(),
        });
    }

    tracing::debug!("Read MIDI document: {}", document);
    Ok(document)
}

fn read_track(payload: &[u8], track_index: usize) -> Result<Track, MidiError> {
    let mut reader = ByteReader::new(payload);
    let mut track = Track::new();

    while reader.can_read() {
        let event = Event::decode(&mut reader).map_err(|source| MidiError::EventDecode {
            track: track_index,
            event: track.len(),
            source: Box::new(source),
        })?;
        track.add_event(event);
    }

    Ok(track)
}

/// Writes a document as a MIDI file.
///
/// # Arguments
///
/// * `document` - The document to write
/// * `writer` - Destination
///
/// # Errors
///
/// Fails if the document has no tracks, if a single-track document has more
/// than one, if the timing doesn't fit the header's division field, if a
/// track is too large for a chunk, or if any event fails to encode.
pub fn write_midi<W: Write>(document: &MidiDocument, writer: &mut W) -> Result<(), MidiError> {
    let num_tracks = document.num_tracks();
    if num_tracks == 0 {
        return Err(MidiError::NoTracks);
    }
    if document.format_type == FormatType::SingleTrack && num_tracks > 1 {
        return Err(MidiError::TooManyTracksForSingleTrack(num_tracks));
    }
    let declared_tracks =
        u16::try_from(num_tracks).map_err(|_| MidiError::TooManyTracks(num_tracks))?;

    let division = match document.timing {
        Timing::TicksPerQuarterNote(tpqn) => {
            if tpqn & DIVISION_FPS_BIT != 0 {
                return Err(MidiError::TicksPerQuarterOutOfRange(tpqn));
            }
            tpqn
        }
        Timing::FramesPerSecond {
            fps,
            ticks_per_frame,
        } => {
            if fps & 0x80 != 0 {
                return Err(MidiError::FramesPerSecondOutOfRange(fps));
            }
            DIVISION_FPS_BIT | (u16::from(fps) << 8) | u16::from(ticks_per_frame)
        }
    };

    let order = big_endian();
    writer.write_all(HEADER_CHUNK_ID)?;
    writer.write_all(&order.resolve(HEADER_LENGTH).to_ne_bytes())?;
    writer.write_all(&order.resolve(document.format_type.as_u16()).to_ne_bytes())?;
    writer.write_all(&order.resolve(declared_tracks).to_ne_bytes())?;
    writer.write_all(&order.resolve(division).to_ne_bytes())?;

    for (track_index, track) in document.tracks().iter().enumerate() {
        let mut track_data = Vec::new();
        for (event_index, event) in track.events().iter().enumerate() {
            event
                .encode(&mut track_data)
                .map_err(|source| MidiError::EventEncode {
                    track: track_index,
                    event: event_index,
                    source: Box::new(source),
                })?;
        }
        write_track_chunk(writer, &track_data, track_index)?;
    }

    Ok(())
}

fn write_track_chunk<W: Write>(
    writer: &mut W,
    track_data: &[u8],
    track_index: usize,
) -> Result<(), MidiError> {
    let length = u32::try_from(track_data.len()).map_err(|_| MidiError::TrackTooLarge {
        track: track_index,
        len: track_data.len(),
    })?;
    writer.write_all(TRACK_CHUNK_ID)?;
    writer.write_all(&big_endian().resolve(length).to_ne_bytes())?;
    writer.write_all(track_data)?;
    Ok(())
}

impl MidiDocument {
    /// Parses a MIDI file held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MidiError> {
        read_midi(data)
    }

    /// Encodes the document as MIDI file bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MidiError> {
        let mut buffer = Vec::new();
        write_midi(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Loads a MIDI file from disk.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the .mid file
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MidiError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        tracing::info!("Loading MIDI file {} ({} bytes)", path.display(), data.len());
        read_midi(&data)
    }

    /// Saves the document as a MIDI file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MidiError> {
        let data = self.to_bytes()?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::{ChannelEvent, EventKind};
    use crate::midi::meta::{MetaEvent, Tempo, TextKind, TimeSignature};

    fn sample_document() -> MidiDocument {
        let mut info = Track::new();
        info.add_event(Event::meta(0, MetaEvent::SetTempo(Tempo::new(600_000))));
        info.add_event(Event::meta(0, MetaEvent::TimeSignature(TimeSignature::default())));
        info.add_event(Event::meta(0, MetaEvent::EndOfTrack));

        let mut melody = Track::new();
        melody.add_event(Event::meta(0, MetaEvent::text(TextKind::TrackName, "Melody")));
        melody.add_event(Event::channel(0, ChannelEvent::program_change(0, 5)));
        melody.add_event(Event::channel(0, ChannelEvent::note_on(0, 60, 100)));
        melody.add_event(Event::channel(480, ChannelEvent::note_off(0, 60)));
        melody.add_event(Event::channel(0, ChannelEvent::note_on(0, 64, 90)));
        melody.add_event(Event::channel(480, ChannelEvent::note_on(0, 64, 0)));
        melody.add_event(Event::meta(0, MetaEvent::EndOfTrack));

        let mut doc = MidiDocument::new(FormatType::MultiTrack, Timing::TicksPerQuarterNote(480));
        doc.add_track(info);
        doc.add_track(melody);
        doc
    }

    #[test]
    fn test_header_bytes() {
        let bytes = sample_document().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[4..8], &[0, 0, 0, 6]);
        assert_eq!(&bytes[8..10], &[0, 1]); // format
        assert_eq!(&bytes[10..12], &[0, 2]); // tracks
        assert_eq!(&bytes[12..14], &[0x01, 0xE0]); // 480
        assert_eq!(&bytes[14..18], b"MTrk");
    }

    #[test]
    fn test_write_then_read() {
        let doc = sample_document();
        let bytes = doc.to_bytes().unwrap();
        let read = MidiDocument::from_bytes(&bytes).unwrap();
        assert_eq!(read, doc);
    }

    #[test]
    fn test_midly_reads_written_file() {
        let bytes = sample_document().to_bytes().unwrap();
        let smf = midly::Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert_eq!(
            smf.header.timing,
            midly::Timing::Metrical(midly::num::u15::new(480))
        );
        assert_eq!(smf.tracks.len(), 2);

        let notes: Vec<(u32, u8)> = smf.tracks[1]
            .iter()
            .filter_map(|event| match event.kind {
                midly::TrackEventKind::Midi {
                    message: midly::MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((event.delta.as_int(), key.as_int())),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![(0, 60), (0, 64), (480, 64)]);
    }

    #[test]
    fn test_fps_division() {
        let mut doc = MidiDocument::new(
            FormatType::SingleTrack,
            Timing::FramesPerSecond {
                fps: 25,
                ticks_per_frame: 40,
            },
        );
        doc.add_track(Track::from_events(vec![Event::meta(0, MetaEvent::EndOfTrack)]));
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(&bytes[12..14], &[0x80 | 25, 40]);
        assert_eq!(MidiDocument::from_bytes(&bytes).unwrap().timing, doc.timing);
    }

    #[test]
    fn test_write_validation() {
        let doc = MidiDocument::default();
        assert!(matches!(doc.to_bytes(), Err(MidiError::NoTracks)));

        let mut doc = MidiDocument::new(FormatType::SingleTrack, Timing::default());
        doc.add_track(Track::new());
        doc.add_track(Track::new());
        assert!(matches!(
            doc.to_bytes(),
            Err(MidiError::TooManyTracksForSingleTrack(2))
        ));

        let mut doc = MidiDocument::new(FormatType::MultiTrack, Timing::TicksPerQuarterNote(0x8000));
        doc.add_track(Track::new());
        assert!(matches!(
            doc.to_bytes(),
            Err(MidiError::TicksPerQuarterOutOfRange(_))
        ));

        let mut doc = MidiDocument::new(
            FormatType::MultiTrack,
            Timing::FramesPerSecond {
                fps: 0x80,
                ticks_per_frame: 1,
            },
        );
        doc.add_track(Track::new());
        assert!(matches!(
            doc.to_bytes(),
            Err(MidiError::FramesPerSecondOutOfRange(0x80))
        ));
    }

    #[test]
    fn test_track_count_mismatch() {
        let mut bytes = sample_document().to_bytes().unwrap();
        bytes[11] = 3;
        assert!(matches!(
            MidiDocument::from_bytes(&bytes),
            Err(MidiError::TrackCountMismatch {
                declared: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_bad_event_names_track_and_event() {
        let mut bytes = sample_document().to_bytes().unwrap();
        // Corrupt the status byte of the program change in track 1
        let track1 = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == b"MTrk")
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        let name_event_len = 1 + 3 + "Melody".len();
        let status_offset = track1 + 8 + name_event_len + 1;
        assert_eq!(bytes[status_offset], 0xC0);
        bytes[status_offset] = 0xF4;

        let err = MidiDocument::from_bytes(&bytes).unwrap_err();
        match err {
            MidiError::EventDecode { track, event, .. } => {
                assert_eq!(track, 1);
                assert_eq!(event, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let doc = sample_document();
        let mut bytes = doc.to_bytes().unwrap();
        let mut alien = b"XFIH".to_vec();
        alien.extend_from_slice(&[0, 0, 0, 2, 0xAB, 0xCD]);
        bytes.splice(14..14, alien);
        assert_eq!(MidiDocument::from_bytes(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_not_a_midi_file() {
        assert!(matches!(
            MidiDocument::from_bytes(b"RIFF\0\0\0\0"),
            Err(MidiError::UnexpectedChunk { .. })
        ));
    }

    #[test]
    fn test_short_writer_fails() {
        let mut storage = [0u8; 20];
        let mut writer: &mut [u8] = &mut storage;
        assert!(matches!(
            write_midi(&sample_document(), &mut writer),
            Err(MidiError::Io(_))
        ));
    }

    #[test]
    fn test_read_decodes_velocity_zero_note_on() {
        let doc = MidiDocument::from_bytes(&sample_document().to_bytes().unwrap()).unwrap();
        let releases = doc.tracks()[1]
            .events()
            .iter()
            .filter(|event| matches!(&event.kind, EventKind::Channel(c) if c.is_note_release()))
            .count();
        assert_eq!(releases, 2);
    }
}
