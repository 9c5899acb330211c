//! Runtime state of one sounding key.

use super::SynthModule;
use crate::wavetable::Mode;

/// Where a note is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// Key held down.
    Sounding,
    /// Key released; the sample's tail is still playing.
    Releasing,
}

/// Graph roots feeding the two ears.
enum Voices {
    /// One graph heard in both ears.
    Mono(Box<dyn SynthModule>),
    Stereo {
        left: Box<dyn SynthModule>,
        right: Box<dyn SynthModule>,
    },
}

/// A sounding key and the module graphs that produce it.
pub struct Note {
    channel: u8,
    key: u8,
    mode: Mode,
    state: NoteState,
    voices: Voices,
}

impl Note {
    /// A note whose graph is heard in both ears.
    pub fn mono(channel: u8, key: u8, mode: Mode, graph: Box<dyn SynthModule>) -> Self {
        Self {
            channel,
            key,
            mode,
            state: NoteState::Sounding,
            voices: Voices::Mono(graph),
        }
    }

    /// A note with a separate graph per ear.
    pub fn stereo(
        channel: u8,
        key: u8,
        mode: Mode,
        left: Box<dyn SynthModule>,
        right: Box<dyn SynthModule>,
    ) -> Self {
        Self {
            channel,
            key,
            mode,
            state: NoteState::Sounding,
            voices: Voices::Stereo { left, right },
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// True if releasing the key should let the note ring out instead of
    /// cutting it off.
    pub fn plays_tail_on_release(&self) -> bool {
        self.mode == Mode::ExitLoopOnRelease
    }

    /// Moves to [`NoteState::Releasing`] and releases every graph.
    pub fn release(&mut self) {
        if self.state == NoteState::Releasing {
            return;
        }
        self.state = NoteState::Releasing;
        match &mut self.voices {
            Voices::Mono(graph) => graph.release(),
            Voices::Stereo { left, right } => {
                left.release();
                right.release();
            }
        }
    }

    pub fn more_sound_available(&self) -> bool {
        match &self.voices {
            Voices::Mono(graph) => graph.more_sound_available(),
            Voices::Stereo { left, right } => {
                left.more_sound_available() || right.more_sound_available()
            }
        }
    }

    /// Mixes the next `left.len()` frames into the output buffers.
    ///
    /// `scratch` must be as long as the output buffers.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], scratch: &mut [f32]) {
        match &mut self.voices {
            Voices::Mono(graph) => {
                graph.render(scratch);
                for ((l, r), s) in left.iter_mut().zip(right.iter_mut()).zip(scratch.iter()) {
                    *l += s;
                    *r += s;
                }
            }
            Voices::Stereo {
                left: left_graph,
                right: right_graph,
            } => {
                left_graph.render(scratch);
                mix_into(left, scratch);
                right_graph.render(scratch);
                mix_into(right, scratch);
            }
        }
    }
}

fn mix_into(out: &mut [f32], source: &[f32]) {
    for (o, s) in out.iter_mut().zip(source) {
        *o += s;
    }
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Note")
            .field("channel", &self.channel)
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}
