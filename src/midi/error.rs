//! Errors raised by the MIDI codec and document model.

use crate::stream::StreamError;

/// Errors that can occur while decoding, encoding or measuring MIDI data.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A write accepted fewer bytes than requested.
    #[error("Failed to write MIDI data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Variable-length quantity does not fit in 64 bits.")]
    VlqOverflow,

    #[error("Unknown channel event type (0x{0:X}).")]
    UnknownChannelEventType(u8),

    #[error("Channel {0} is out of range (0-15).")]
    ChannelOutOfRange(u8),

    #[error("Data byte 0x{0:02X} has its high bit set.")]
    DataByteOutOfRange(u8),

    #[error("Can't decode meta-event if type is not 0xFF (got 0x{0:02X}).")]
    NotAMetaEvent(u8),

    #[error("Expected length {expected} for {kind} meta-event, got {actual}.")]
    MetaLength {
        kind: &'static str,
        expected: usize,
        actual: u64,
    },

    #[error("Got zero data size for sequencer-specific meta-event.")]
    EmptySequencerSpecific,

    #[error("Tempo {0} does not fit in 24 bits.")]
    TempoOutOfRange(u32),

    #[error("Meta-event type 0x{0:02X} has its own kind and can't be written as unknown.")]
    KnownMetaTypeAsUnknown(u8),

    #[error("Meta-event length {0} is larger than the remaining data.")]
    MetaTooLong(u64),

    #[error("Unrecognized event status byte 0x{0:02X}.")]
    UnknownStatus(u8),

    #[error("{0} is not implemented.")]
    NotImplemented(&'static str),

    #[error("Failed to decode event {event} of track {track}.")]
    EventDecode {
        track: usize,
        event: usize,
        #[source]
        source: Box<MidiError>,
    },

    #[error("Failed to encode event {event} of track {track}.")]
    EventEncode {
        track: usize,
        event: usize,
        #[source]
        source: Box<MidiError>,
    },

    #[error("Expected chunk \"{expected}\", found \"{found}\".")]
    UnexpectedChunk { expected: &'static str, found: String },

    #[error("Header chunk length {0} is smaller than 6.")]
    HeaderTooShort(u32),

    #[error("Unknown format type {0}.")]
    UnknownFormat(u16),

    #[error("Header declares {declared} track(s) but {found} were found.")]
    TrackCountMismatch { declared: u16, found: usize },

    #[error("Can't write a MIDI file with no tracks.")]
    NoTracks,

    #[error("Single-track format can't hold {0} tracks.")]
    TooManyTracksForSingleTrack(usize),

    #[error("Too many tracks ({0}) for the header.")]
    TooManyTracks(usize),

    #[error("Ticks per quarter note {0} does not fit in 15 bits.")]
    TicksPerQuarterOutOfRange(u16),

    #[error("Frames per second {0} does not fit in 7 bits.")]
    FramesPerSecondOutOfRange(u8),

    #[error("Track {track} is {len} bytes, too large for a chunk.")]
    TrackTooLarge { track: usize, len: usize },

    #[error("Track ({0}) not found.")]
    TrackNotFound(usize),

    #[error("Doesn't make sense to measure length of the info track.")]
    InfoTrackLength,

    #[error("Calculating time with FPS is not yet supported.")]
    FpsTimingUnsupported,

    #[error("Ticks per quarter note is zero.")]
    ZeroTicksPerQuarter,

    #[error("MIDI format type {0:?} is not supported for playback.")]
    UnsupportedPlaybackFormat(super::FormatType),

    #[error("No tracks are configured to play.")]
    NothingToPlay,

    #[error("Failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),
}
