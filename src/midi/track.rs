//! MIDI track representation.
//!
//! A track is an ordered list of events. Order is significant: summing the
//! delta times of the events in sequence reconstructs absolute time.

use super::event::{Event, EventKind};
use super::meta::{MetaEvent, MetaEventType, TextKind};
use serde::{Deserialize, Serialize};

/// An ordered sequence of events owned by a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    events: Vec<Event>,
}

impl Track {
    /// Creates an empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a track from events already in order.
    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Appends an event at the end of the track.
    ///
    /// # Arguments
    ///
    /// * `event` - The event to add; its delta time is relative to the
    ///   previous last event
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Returns the event at `index`, if any.
    pub fn get_event(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Returns all events in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Returns the number of events in this track.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the track has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Iterates over the meta events of the track.
    pub fn meta_events(&self) -> impl Iterator<Item = &MetaEvent> {
        self.events.iter().filter_map(Event::as_meta)
    }

    /// Finds the first meta event of the given type.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The meta-event type to look for
    ///
    /// # Returns
    ///
    /// The first matching meta event in track order
    pub fn find_meta_event(&self, event_type: MetaEventType) -> Option<&MetaEvent> {
        self.meta_events()
            .find(|event| event.event_type() == event_type)
    }

    /// The text of the first track-name meta event.
    pub fn name(&self) -> Option<String> {
        self.meta_events().find_map(|event| match event {
            MetaEvent::Text {
                kind: TextKind::TrackName,
                ..
            } => event.as_text(),
            _ => None,
        })
    }

    /// Total length of the track in ticks.
    pub fn duration_ticks(&self) -> u64 {
        self.events
            .iter()
            .fold(0u64, |total, event| total.saturating_add(event.delta_time_ticks))
    }

    /// Number of channel events.
    pub fn channel_event_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event.kind, EventKind::Channel(_)))
            .count()
    }
}
