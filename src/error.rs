//! Crate-wide error type and the accumulating error report.
//!
//! Each subsystem has its own `thiserror` enum. [`Error`] unifies them for
//! callers that cross subsystem boundaries (the MIDI player feeding the synth,
//! the command-line tool). [`ErrorReport`] collects human-readable messages
//! so that several problems can be surfaced together.

use crate::math::AnalysisError;
use crate::midi::MidiError;
use crate::stream::StreamError;
use crate::synth::SynthError;
use crate::wavetable::WavetableError;
use std::fmt;

/// Result alias used by operations that span subsystems.
pub type Result<T> = std::result::Result<T, Error>;

/// Any error produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Wavetable(#[from] WavetableError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accumulates diagnostic messages.
///
/// A report holding a single message displays as that message. A report
/// holding several displays as `"N errors...\n\n"` followed by every message
/// on its own line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    messages: Vec<String>,
}

impl ErrorReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a report from an error and every error in its `source()` chain.
    ///
    /// # Arguments
    ///
    /// * `error` - The outermost error
    ///
    /// # Returns
    ///
    /// A report with one message per link in the chain, outermost first
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut report = Self::new();
        report.record(error);
        report
    }

    /// Appends a message.
    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Appends an error and its whole cause chain.
    pub fn record(&mut self, error: &(dyn std::error::Error + 'static)) {
        let mut current = Some(error);
        while let Some(err) = current {
            self.add(err.to_string());
            current = err.source();
        }
    }

    /// Moves every message of `other` into this report.
    pub fn merge(&mut self, other: ErrorReport) {
        self.messages.extend(other.messages);
    }

    /// Returns true if no message has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// All recorded messages in insertion order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Forgets every recorded message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Formats the combined report text.
    pub fn message(&self) -> String {
        match self.messages.as_slice() {
            [] => String::new(),
            [single] => single.clone(),
            many => {
                let mut text = format!("{} errors...\n\n", many.len());
                for message in many {
                    text.push_str(message);
                    text.push('\n');
                }
                text
            }
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ErrorReport {}
