//! Incident room registry.
//!
//! Each room, its task graph, and its timeline live together behind one
//! async mutex. The index maps are guarded by short, non-async locks that
//! are never held across an await, so the only suspension point in any
//! operation is waiting for the room itself. The open-room count is an
//! atomic that only changes while the room being opened or closed is held.

use crate::audit::AuditTrail;
use crate::tasks::TaskGraph;
use crate::timeline::Timeline;
use c2_core::{
    now_epoch_millis, C2Error, C2Result, CasualtyCounts, EventSource, IncidentRoom, NewEvent,
    NewRoom, ResourceCounts, RoomId, RoomStatus, StatusUpdate, TaskId, TimelineEventType,
};
use c2_observability::names;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct RoomRecord {
    room: IncidentRoom,
    tasks: TaskGraph,
    timeline: Timeline,
}

impl RoomRecord {
    fn new(room: IncidentRoom) -> Self {
        let id = room.id;
        Self {
            room,
            tasks: TaskGraph::new(id),
            timeline: Timeline::new(id),
        }
    }

    pub fn room(&self) -> &IncidentRoom {
        &self.room
    }

    pub fn tasks(&self) -> &TaskGraph {
        &self.tasks
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub(crate) fn room_mut(&mut self) -> &mut IncidentRoom {
        &mut self.room
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut IncidentRoom, &mut TaskGraph, &mut Timeline) {
        (&mut self.room, &mut self.tasks, &mut self.timeline)
    }
}

type RoomHandle = Arc<Mutex<RoomRecord>>;

#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    task_rooms: RwLock<HashMap<TaskId, RoomId>>,
    open_rooms: AtomicU32,
    audit: AuditTrail,
}

impl RoomRegistry {
    pub(crate) fn new(audit: AuditTrail) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            task_rooms: RwLock::new(HashMap::new()),
            open_rooms: AtomicU32::new(0),
            audit,
        }
    }

    pub fn create_room(&self, new: NewRoom) -> C2Result<IncidentRoom> {
        let name = required("room name", &new.name)?;
        let commander = required("commander", &new.commander)?;
        let hazard_type = required("hazard type", &new.hazard_type)?;

        let now = now_epoch_millis();
        let room = IncidentRoom {
            id: RoomId::new(),
            name,
            hazard_type,
            description: new.description,
            status: RoomStatus::Active,
            priority: new.priority,
            location: new.location,
            commander: commander.clone(),
            agencies_involved: Vec::new(),
            affected_population: new.affected_population,
            casualties: CasualtyCounts::default(),
            resources_deployed: ResourceCounts::default(),
            active_tasks: 0,
            completed_tasks: 0,
            notes: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
            last_briefing_ms: None,
        };

        let mut record = RoomRecord::new(room.clone());
        record.timeline.append(
            NewEvent::system(
                TimelineEventType::IncidentCreated,
                format!("Incident room opened: {}", room.name),
            )
            .with_description(room.description.clone())
            .with_payload(json!({
                "hazard_type": room.hazard_type,
                "priority": room.priority,
                "location": room.location,
                "commander": room.commander,
                "affected_population": room.affected_population,
            }))
            .from_source(EventSource::actor(commander.clone())),
        );
        self.rooms
            .write()
            .insert(room.id, Arc::new(Mutex::new(record)));
        self.open_rooms.fetch_add(1, Ordering::AcqRel);

        metrics::counter!(names::ROOMS_OPENED).increment(1);
        tracing::info!(
            room_id = %room.id,
            name = %room.name,
            hazard_type = %room.hazard_type,
            priority = %room.priority,
            "Incident room opened"
        );
        self.audit.record(
            EventSource::actor(commander),
            "room.create",
            room.id,
            None,
            Some(&room),
        );
        Ok(room)
    }

    /// Applies a status change and counter deltas as one step. All checks run
    /// before anything is written, so a rejected update leaves the room as it was.
    pub async fn update_status(
        &self,
        room_id: RoomId,
        update: StatusUpdate,
    ) -> C2Result<IncidentRoom> {
        let mut record = self.lock(room_id).await?;
        let current = record.room.clone();

        if current.status.is_terminal() {
            return Err(C2Error::invalid_transition(
                "room",
                room_id,
                current.status,
                update.status,
            ));
        }
        let status_changed = update.status != current.status;
        if status_changed && !current.status.can_transition_to(update.status) {
            return Err(C2Error::invalid_transition(
                "room",
                room_id,
                current.status,
                update.status,
            ));
        }

        let affected_population = match update.affected_population_delta {
            Some(delta) => current
                .affected_population
                .checked_add_signed(delta)
                .ok_or_else(|| {
                    C2Error::invalid_argument("affected population delta", delta.to_string())
                })?,
            None => current.affected_population,
        };
        let casualties = match &update.casualties {
            Some(delta) => current.casualties.apply(delta).ok_or_else(|| {
                C2Error::invalid_argument("casualty delta", format!("{delta:?}"))
            })?,
            None => current.casualties,
        };
        let resources_deployed = match &update.resources {
            Some(delta) => current.resources_deployed.apply(delta).ok_or_else(|| {
                C2Error::invalid_argument("resource delta", format!("{delta:?}"))
            })?,
            None => current.resources_deployed,
        };
        let note = update
            .note
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let counters_changed = affected_population != current.affected_population
            || casualties != current.casualties
            || resources_deployed != current.resources_deployed;
        if !status_changed && !counters_changed && note.is_none() {
            tracing::debug!(room_id = %room_id, "Room update carried no changes");
            return Ok(current);
        }

        let room = record.room_mut();
        room.status = update.status;
        room.affected_population = affected_population;
        room.casualties = casualties;
        room.resources_deployed = resources_deployed;
        if let Some(note) = &note {
            room.notes.push(note.clone());
        }
        room.updated_at_ms = now_epoch_millis();
        let after = room.clone();

        let resources_changed = resources_deployed != current.resources_deployed;
        let (event_type, title) = if status_changed {
            (
                TimelineEventType::StatusChange,
                format!("Status changed from {} to {}", current.status, after.status),
            )
        } else if resources_changed {
            (
                TimelineEventType::ResourceDeployed,
                "Deployed resources updated".to_string(),
            )
        } else {
            (
                TimelineEventType::SituationUpdate,
                "Situation update".to_string(),
            )
        };
        record.timeline_mut().append(
            NewEvent::system(event_type, title)
                .with_description(note.unwrap_or_default())
                .with_payload(json!({
                    "from": current.status,
                    "to": after.status,
                    "affected_population": after.affected_population,
                    "casualties": after.casualties,
                    "resources_deployed": after.resources_deployed,
                })),
        );
        if status_changed && after.status.is_terminal() {
            self.open_rooms.fetch_sub(1, Ordering::AcqRel);
        }
        drop(record);

        if status_changed {
            metrics::counter!(names::ROOM_TRANSITIONS, "to" => after.status.as_str())
                .increment(1);
            tracing::info!(
                room_id = %room_id,
                from = %current.status,
                to = %after.status,
                "Incident room status changed"
            );
        }
        self.audit.record(
            EventSource::System,
            "room.update_status",
            room_id,
            Some(&current),
            Some(&after),
        );
        Ok(after)
    }

    /// Adding an agency that is already involved is a successful no-op.
    pub async fn add_agency(&self, room_id: RoomId, agency_name: &str) -> C2Result<IncidentRoom> {
        let agency_name = required("agency name", agency_name)?;
        let mut record = self.lock(room_id).await?;
        let current = record.room.clone();

        if current.status.is_terminal() {
            return Err(C2Error::invalid_transition(
                "room",
                room_id,
                current.status,
                "agency_joined",
            ));
        }
        if current.has_agency(&agency_name) {
            tracing::debug!(
                room_id = %room_id,
                agency = %agency_name,
                "Agency already involved, ignoring duplicate join"
            );
            return Ok(current);
        }

        let room = record.room_mut();
        room.agencies_involved.push(agency_name.clone());
        room.updated_at_ms = now_epoch_millis();
        let after = room.clone();
        record.timeline_mut().append(
            NewEvent::system(
                TimelineEventType::AgencyJoined,
                format!("{agency_name} joined the response"),
            )
            .with_payload(json!({
                "agency": agency_name,
                "agencies_involved": after.agencies_involved.len(),
            })),
        );
        drop(record);

        tracing::info!(room_id = %room_id, agency = %agency_name, "Agency joined incident room");
        self.audit.record(
            EventSource::actor(agency_name),
            "room.add_agency",
            room_id,
            Some(&current),
            Some(&after),
        );
        Ok(after)
    }

    pub async fn close(&self, room_id: RoomId, reason: Option<String>) -> C2Result<IncidentRoom> {
        let mut update = StatusUpdate::to(RoomStatus::Closed);
        update.note = reason;
        self.update_status(room_id, update).await
    }

    pub async fn get_room(&self, room_id: RoomId) -> C2Result<IncidentRoom> {
        let record = self.lock(room_id).await?;
        Ok(record.room.clone())
    }

    /// Rooms in creation order. Each room is locked on its own, never all at once.
    pub async fn list_rooms(&self, status: Option<RoomStatus>) -> Vec<IncidentRoom> {
        let mut rooms = Vec::new();
        for handle in self.handles() {
            let record = handle.lock().await;
            if status.is_none_or(|wanted| record.room.status == wanted) {
                rooms.push(record.room.clone());
            }
        }
        rooms.sort_by_key(|room| room.created_at_ms);
        rooms
    }

    /// Rooms not yet closed. Reads no room locks.
    pub fn open_room_count(&self) -> u32 {
        self.open_rooms.load(Ordering::Acquire)
    }

    pub(crate) fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.read().values().cloned().collect()
    }

    pub(crate) async fn lock(&self, room_id: RoomId) -> C2Result<OwnedMutexGuard<RoomRecord>> {
        let handle = self
            .rooms
            .read()
            .get(&room_id)
            .cloned()
            .ok_or(C2Error::RoomNotFound(room_id))?;
        Ok(handle.lock_owned().await)
    }

    pub(crate) async fn lock_for_task(
        &self,
        task_id: TaskId,
    ) -> C2Result<OwnedMutexGuard<RoomRecord>> {
        let room_id = self
            .task_rooms
            .read()
            .get(&task_id)
            .copied()
            .ok_or(C2Error::TaskNotFound(task_id))?;
        self.lock(room_id).await
    }

    pub(crate) fn index_task(&self, task_id: TaskId, room_id: RoomId) {
        self.task_rooms.write().insert(task_id, room_id);
    }
}

pub(crate) fn required(field: &'static str, value: &str) -> C2Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(C2Error::invalid_argument(field, value));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use assert_matches::assert_matches;
    use c2_core::{CasualtyDelta, ResourceDelta, RoomPriority};

    fn registry() -> (RoomRegistry, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        (RoomRegistry::new(AuditTrail::new(sink.clone())), sink)
    }

    fn flood() -> NewRoom {
        NewRoom {
            name: "River Flood".to_string(),
            hazard_type: "flood".to_string(),
            priority: RoomPriority::High,
            location: "Lower Basin".to_string(),
            description: "Levee breach".to_string(),
            commander: "IC Alvarez".to_string(),
            affected_population: 2_500,
        }
    }

    #[tokio::test]
    async fn create_room_starts_active_with_creation_event() {
        let (registry, sink) = registry();
        let room = registry.create_room(flood()).unwrap();
        assert_eq!(room.status, RoomStatus::Active);

        let record = registry.lock(room.id).await.unwrap();
        assert_eq!(record.timeline().len(), 1);
        assert_eq!(record.timeline().count_of(TimelineEventType::IncidentCreated), 1);
        assert_eq!(sink.operations(), vec!["room.create".to_string()]);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (registry, _) = registry();
        let mut new = flood();
        new.name = "  ".to_string();
        assert_matches!(
            registry.create_room(new),
            Err(C2Error::InvalidArgument { field: "room name", .. })
        );
    }

    #[tokio::test]
    async fn status_change_emits_exactly_one_event() {
        let (registry, _) = registry();
        let room = registry.create_room(flood()).unwrap();

        registry
            .update_status(room.id, StatusUpdate::to(RoomStatus::Contained))
            .await
            .unwrap();
        let record = registry.lock(room.id).await.unwrap();
        assert_eq!(record.timeline().count_of(TimelineEventType::StatusChange), 1);
    }

    #[tokio::test]
    async fn closed_room_never_reopens() {
        let (registry, _) = registry();
        let room = registry.create_room(flood()).unwrap();
        registry.close(room.id, None).await.unwrap();

        for status in RoomStatus::ALL {
            let result = registry
                .update_status(room.id, StatusUpdate::to(*status))
                .await;
            assert_matches!(result, Err(C2Error::InvalidTransition { entity: "room", .. }));
        }
        assert_eq!(
            registry.get_room(room.id).await.unwrap().status,
            RoomStatus::Closed
        );
    }

    #[tokio::test]
    async fn backwards_transition_is_rejected() {
        let (registry, _) = registry();
        let room = registry.create_room(flood()).unwrap();
        registry
            .update_status(room.id, StatusUpdate::to(RoomStatus::Resolved))
            .await
            .unwrap_err();
        registry
            .update_status(room.id, StatusUpdate::to(RoomStatus::Monitoring))
            .await
            .unwrap();
        registry
            .update_status(room.id, StatusUpdate::to(RoomStatus::Resolved))
            .await
            .unwrap();
        assert_matches!(
            registry
                .update_status(room.id, StatusUpdate::to(RoomStatus::Active))
                .await,
            Err(C2Error::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn negative_counter_rejects_whole_update() {
        let (registry, sink) = registry();
        let room = registry.create_room(flood()).unwrap();

        let update = StatusUpdate::to(RoomStatus::Contained)
            .with_resources(ResourceDelta {
                personnel: 40,
                ..ResourceDelta::default()
            })
            .with_casualties(CasualtyDelta {
                fatalities: -1,
                ..CasualtyDelta::default()
            });
        assert_matches!(
            registry.update_status(room.id, update).await,
            Err(C2Error::InvalidArgument { field: "casualty delta", .. })
        );

        let unchanged = registry.get_room(room.id).await.unwrap();
        assert_eq!(unchanged, room);
        assert_eq!(sink.operations(), vec!["room.create".to_string()]);
    }

    #[tokio::test]
    async fn counter_only_update_records_deployment() {
        let (registry, _) = registry();
        let room = registry.create_room(flood()).unwrap();
        let updated = registry
            .update_status(
                room.id,
                StatusUpdate::to(RoomStatus::Active).with_resources(ResourceDelta {
                    personnel: 25,
                    vehicles: 4,
                    equipment: 0,
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.resources_deployed.personnel, 25);

        let record = registry.lock(room.id).await.unwrap();
        assert_eq!(record.timeline().count_of(TimelineEventType::StatusChange), 0);
        assert_eq!(
            record.timeline().count_of(TimelineEventType::ResourceDeployed),
            1
        );
    }

    #[tokio::test]
    async fn add_agency_is_idempotent() {
        let (registry, _) = registry();
        let room = registry.create_room(flood()).unwrap();
        registry.add_agency(room.id, "Fire Dept").await.unwrap();
        let room = registry.add_agency(room.id, "Fire Dept").await.unwrap();

        assert_eq!(room.agencies_involved, vec!["Fire Dept".to_string()]);
        let record = registry.lock(room.id).await.unwrap();
        assert_eq!(record.timeline().count_of(TimelineEventType::AgencyJoined), 1);
    }

    #[tokio::test]
    async fn open_count_drops_once_on_close() {
        let (registry, _) = registry();
        let first = registry.create_room(flood()).unwrap();
        let second = registry.create_room(flood()).unwrap();
        assert_eq!(registry.open_room_count(), 2);

        registry
            .update_status(first.id, StatusUpdate::to(RoomStatus::Monitoring))
            .await
            .unwrap();
        assert_eq!(registry.open_room_count(), 2);

        registry.close(first.id, None).await.unwrap();
        registry.close(first.id, None).await.unwrap_err();
        assert_eq!(registry.open_room_count(), 1);

        let _held = registry.lock(second.id).await.unwrap();
        assert_eq!(registry.open_room_count(), 1);
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let (registry, _) = registry();
        let missing = RoomId::new();
        assert_matches!(
            registry.add_agency(missing, "EMS").await,
            Err(C2Error::RoomNotFound(id)) if id == missing
        );
    }
}
