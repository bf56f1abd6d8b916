//! Append-only, per-room event history.
//!
//! Events are ordered by `(timestamp_ms, sequence)`. The sequence is a
//! per-room monotonic counter assigned under the room lock, and timestamps
//! are clamped so they never run backwards within a room. Insertion order
//! and retrieval order therefore always agree.

use crate::audit::AuditTrail;
use crate::registry::RoomRegistry;
use c2_core::{
    now_epoch_millis, C2Result, EpochMillis, EventId, NewEvent, RoomId, TimelineEvent,
    TimelineEventType,
};
use c2_observability::names;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub event_type: Option<TimelineEventType>,
    #[serde(default)]
    pub since_ms: Option<EpochMillis>,
}

impl EventFilter {
    pub fn of_type(event_type: TimelineEventType) -> Self {
        Self {
            event_type: Some(event_type),
            since_ms: None,
        }
    }

    pub fn since(mut self, since_ms: EpochMillis) -> Self {
        self.since_ms = Some(since_ms);
        self
    }

    fn matches(&self, event: &TimelineEvent) -> bool {
        self.event_type.is_none_or(|kind| kind == event.event_type)
            && self.since_ms.is_none_or(|since| event.timestamp_ms >= since)
    }
}

#[derive(Debug)]
pub struct Timeline {
    room_id: RoomId,
    events: Vec<TimelineEvent>,
    next_sequence: u64,
}

impl Timeline {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            events: Vec::new(),
            next_sequence: 0,
        }
    }

    pub(crate) fn append(&mut self, event: NewEvent) -> TimelineEvent {
        let floor = self
            .events
            .last()
            .map(|last| last.timestamp_ms)
            .unwrap_or_default();
        let entry = TimelineEvent {
            id: EventId::new(),
            room_id: self.room_id,
            sequence: self.next_sequence,
            event_type: event.event_type,
            title: event.title,
            description: event.description,
            payload: event.payload,
            source: event.source,
            timestamp_ms: now_epoch_millis().max(floor),
        };
        self.next_sequence += 1;
        metrics::counter!(names::TIMELINE_EVENTS, "type" => entry.event_type.as_str())
            .increment(1);
        self.events.push(entry.clone());
        entry
    }

    /// Newest first, at most `limit` events.
    pub fn recent(&self, limit: usize) -> Vec<TimelineEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    /// Newest first.
    pub fn filter(&self, filter: &EventFilter) -> Vec<TimelineEvent> {
        self.events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect()
    }

    /// Oldest first, every event whose sequence is at least `sequence`.
    pub fn from_sequence(&self, sequence: u64) -> Vec<TimelineEvent> {
        let start = self.events.partition_point(|event| event.sequence < sequence);
        self.events[start..].to_vec()
    }

    pub fn count_of(&self, event_type: TimelineEventType) -> usize {
        self.events
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Room-scoped access to timelines. `append` is the only mutation; a
/// mistaken entry is answered with a compensating `Correction` event.
#[derive(Debug, Clone)]
pub struct TimelineLog {
    registry: Arc<RoomRegistry>,
    audit: AuditTrail,
}

impl TimelineLog {
    pub(crate) fn new(registry: Arc<RoomRegistry>, audit: AuditTrail) -> Self {
        Self { registry, audit }
    }

    pub async fn append(&self, room_id: RoomId, event: NewEvent) -> C2Result<TimelineEvent> {
        let mut record = self.registry.lock(room_id).await?;
        let source = event.source.clone();
        let entry = record.timeline_mut().append(event);
        drop(record);

        tracing::debug!(
            room_id = %room_id,
            event_type = %entry.event_type,
            sequence = entry.sequence,
            "Timeline event appended"
        );
        self.audit
            .record(source, "timeline.append", room_id, None, Some(&entry));
        Ok(entry)
    }

    pub async fn recent(&self, room_id: RoomId, limit: usize) -> C2Result<Vec<TimelineEvent>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.timeline().recent(limit))
    }

    pub async fn filter(
        &self,
        room_id: RoomId,
        filter: &EventFilter,
    ) -> C2Result<Vec<TimelineEvent>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.timeline().filter(filter))
    }

    pub async fn from_sequence(
        &self,
        room_id: RoomId,
        sequence: u64,
    ) -> C2Result<Vec<TimelineEvent>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.timeline().from_sequence(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str) -> NewEvent {
        NewEvent::system(TimelineEventType::Note, title)
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let mut timeline = Timeline::new(RoomId::new());
        for index in 0..10 {
            timeline.append(note(&format!("note {index}")));
        }

        let recent = timeline.recent(4);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].title, "note 9");
        for window in recent.windows(2) {
            let newer = (window[0].timestamp_ms, window[0].sequence);
            let older = (window[1].timestamp_ms, window[1].sequence);
            assert!(newer > older);
        }
        assert_eq!(timeline.recent(100).len(), 10);
    }

    #[test]
    fn sequence_breaks_timestamp_ties() {
        let mut timeline = Timeline::new(RoomId::new());
        let first = timeline.append(note("first"));
        let second = timeline.append(note("second"));
        assert!(second.timestamp_ms >= first.timestamp_ms);
        assert_eq!(second.sequence, first.sequence + 1);
    }

    #[test]
    fn filter_by_type_and_since() {
        let mut timeline = Timeline::new(RoomId::new());
        timeline.append(note("a"));
        let order = timeline.append(NewEvent::system(
            TimelineEventType::EvacuationOrder,
            "Evacuate zone B",
        ));
        timeline.append(note("b"));

        let orders = timeline.filter(&EventFilter::of_type(TimelineEventType::EvacuationOrder));
        assert_eq!(orders, vec![order.clone()]);

        let later = timeline.filter(&EventFilter::default().since(order.timestamp_ms));
        assert!(later.iter().all(|event| event.timestamp_ms >= order.timestamp_ms));
        assert!(later.iter().any(|event| event.id == order.id));
        assert_eq!(timeline.count_of(TimelineEventType::Note), 2);
    }

    #[test]
    fn from_sequence_resumes_after_cursor() {
        let mut timeline = Timeline::new(RoomId::new());
        for index in 0..5 {
            timeline.append(note(&format!("note {index}")));
        }
        let tail = timeline.from_sequence(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].title, "note 3");
        assert!(timeline.from_sequence(5).is_empty());
    }
}
