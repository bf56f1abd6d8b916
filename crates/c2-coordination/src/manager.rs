use crate::audit::{AuditSink, AuditTrail, TracingAuditSink};
use crate::brief::{BriefBuilder, BriefRules};
use crate::eoc::EocCoordinator;
use crate::registry::RoomRegistry;
use crate::snapshot::{self, CoordinationSnapshot};
use crate::tasks::TaskEngine;
use crate::timeline::{EventFilter, TimelineLog};
use c2_config::CoordinationConfig;
use c2_core::{
    Agency, AgencyId, AvailableResource, Brief, BriefType, C2Result, EocStatus, EocStatusUpdate,
    IncidentRoom, NewAgency, NewEvent, NewRoom, NewTask, ResourceRequest, RoomId, RoomPriority,
    RoomStatus, StatusUpdate, Task, TaskId, TaskStatus, TimelineEvent,
};
use std::sync::Arc;

/// Owns the five coordination components and the glue between them.
///
/// The manager is constructed explicitly and passed to callers; tests build
/// a fresh one each. Components can also be reached directly, but only the
/// manager keeps the EOC's incident count and briefing cycle in step with
/// room activity.
#[derive(Debug, Clone)]
pub struct CoordinationManager {
    config: CoordinationConfig,
    rooms: Arc<RoomRegistry>,
    tasks: TaskEngine,
    timeline: TimelineLog,
    briefs: BriefBuilder,
    eoc: Arc<EocCoordinator>,
}

impl Default for CoordinationManager {
    fn default() -> Self {
        Self::new(CoordinationConfig::default(), Arc::new(TracingAuditSink))
    }
}

impl CoordinationManager {
    pub fn new(config: CoordinationConfig, sink: Arc<dyn AuditSink>) -> Self {
        let audit = AuditTrail::new(sink);
        let rooms = Arc::new(RoomRegistry::new(audit.clone()));
        Self {
            tasks: TaskEngine::new(rooms.clone(), audit.clone()),
            timeline: TimelineLog::new(rooms.clone(), audit.clone()),
            briefs: BriefBuilder::new(rooms.clone(), BriefRules::from(&config)),
            eoc: Arc::new(EocCoordinator::new(audit)),
            rooms,
            config,
        }
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn tasks(&self) -> &TaskEngine {
        &self.tasks
    }

    pub fn timeline(&self) -> &TimelineLog {
        &self.timeline
    }

    pub fn briefs(&self) -> &BriefBuilder {
        &self.briefs
    }

    pub fn eoc(&self) -> &EocCoordinator {
        &self.eoc
    }

    pub async fn create_room(&self, new: NewRoom) -> C2Result<IncidentRoom> {
        let room = self.rooms.create_room(new)?;
        self.eoc.adjust_active_incidents(true);
        Ok(room)
    }

    pub async fn update_status(
        &self,
        room_id: RoomId,
        update: StatusUpdate,
    ) -> C2Result<IncidentRoom> {
        let room = self.rooms.update_status(room_id, update).await?;
        self.track_closure(&room);
        Ok(room)
    }

    pub async fn add_agency(&self, room_id: RoomId, agency_name: &str) -> C2Result<IncidentRoom> {
        self.rooms.add_agency(room_id, agency_name).await
    }

    pub async fn close_room(
        &self,
        room_id: RoomId,
        reason: Option<String>,
    ) -> C2Result<IncidentRoom> {
        let room = self.rooms.close(room_id, reason).await?;
        self.track_closure(&room);
        Ok(room)
    }

    pub async fn get_room(&self, room_id: RoomId) -> C2Result<IncidentRoom> {
        self.rooms.get_room(room_id).await
    }

    pub async fn list_rooms(&self, status: Option<RoomStatus>) -> Vec<IncidentRoom> {
        self.rooms.list_rooms(status).await
    }

    pub async fn create_task(&self, room_id: RoomId, new: NewTask) -> C2Result<Task> {
        self.tasks.create_task(room_id, new).await
    }

    pub async fn assign_task(
        &self,
        task_id: TaskId,
        person: &str,
        agency: Option<&str>,
    ) -> C2Result<Task> {
        self.tasks.assign_task(task_id, person, agency).await
    }

    pub async fn start_task(&self, task_id: TaskId) -> C2Result<Task> {
        self.tasks.start_task(task_id).await
    }

    pub async fn complete_task(&self, task_id: TaskId, notes: Option<String>) -> C2Result<Task> {
        self.tasks.complete_task(task_id, notes).await
    }

    pub async fn block_task(&self, task_id: TaskId, reason: &str) -> C2Result<Task> {
        self.tasks.block_task(task_id, reason).await
    }

    pub async fn cancel_task(&self, task_id: TaskId, reason: Option<String>) -> C2Result<Task> {
        self.tasks.cancel_task(task_id, reason).await
    }

    pub async fn auto_assign(
        &self,
        room_id: RoomId,
        resources: &[AvailableResource],
    ) -> C2Result<Vec<Task>> {
        self.tasks.auto_assign(room_id, resources).await
    }

    pub async fn get_task(&self, task_id: TaskId) -> C2Result<Task> {
        self.tasks.get_task(task_id).await
    }

    pub async fn tasks_for_room(
        &self,
        room_id: RoomId,
        status: Option<TaskStatus>,
    ) -> C2Result<Vec<Task>> {
        self.tasks.tasks_for_room(room_id, status).await
    }

    pub async fn pending_tasks(&self, room_id: RoomId) -> C2Result<Vec<Task>> {
        self.tasks.pending_tasks(room_id).await
    }

    pub async fn overdue_tasks(&self, room_id: RoomId) -> C2Result<Vec<Task>> {
        self.tasks.overdue_tasks(room_id).await
    }

    pub async fn append_event(&self, room_id: RoomId, event: NewEvent) -> C2Result<TimelineEvent> {
        self.timeline.append(room_id, event).await
    }

    /// Falls back to the configured default limit when none is given.
    pub async fn recent_events(
        &self,
        room_id: RoomId,
        limit: Option<usize>,
    ) -> C2Result<Vec<TimelineEvent>> {
        let limit = limit.unwrap_or(self.config.timeline_default_limit);
        self.timeline.recent(room_id, limit).await
    }

    pub async fn filter_events(
        &self,
        room_id: RoomId,
        filter: &EventFilter,
    ) -> C2Result<Vec<TimelineEvent>> {
        self.timeline.filter(room_id, filter).await
    }

    pub async fn events_from(
        &self,
        room_id: RoomId,
        sequence: u64,
    ) -> C2Result<Vec<TimelineEvent>> {
        self.timeline.from_sequence(room_id, sequence).await
    }

    pub async fn generate_brief(&self, room_id: RoomId, brief_type: BriefType) -> C2Result<Brief> {
        let brief = self.briefs.generate_brief(room_id, brief_type).await?;
        self.eoc
            .record_briefing(brief.generated_at_ms, self.config.brief_interval_minutes);
        Ok(brief)
    }

    pub fn register_agency(&self, new: NewAgency) -> C2Result<Agency> {
        self.eoc.register_agency(new)
    }

    /// The new EOC starts with the current number of open rooms.
    pub fn activate_eoc(&self, name: &str, activation_level: u8) -> C2Result<EocStatus> {
        self.eoc
            .activate_eoc(name, activation_level, self.rooms.open_room_count())
    }

    pub fn deactivate_eoc(&self) -> C2Result<EocStatus> {
        self.eoc.deactivate_eoc()
    }

    pub fn join_eoc(&self, agency_id: AgencyId, liaison_officer: &str) -> C2Result<Agency> {
        self.eoc.join_eoc(agency_id, liaison_officer)
    }

    pub fn update_eoc_status(&self, update: EocStatusUpdate) -> C2Result<EocStatus> {
        self.eoc.update_eoc_status(update)
    }

    pub fn eoc_status(&self) -> C2Result<EocStatus> {
        self.eoc.eoc_status()
    }

    pub fn request_resources(
        &self,
        requesting_agency: &str,
        resource_type: &str,
        quantity: u64,
        priority: RoomPriority,
    ) -> C2Result<ResourceRequest> {
        self.eoc
            .request_resources(requesting_agency, resource_type, quantity, priority)
    }

    pub fn agencies(&self) -> Vec<Agency> {
        self.eoc.agencies()
    }

    pub fn agency(&self, agency_id: AgencyId) -> C2Result<Agency> {
        self.eoc.agency(agency_id)
    }

    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        self.eoc.resource_requests()
    }

    pub async fn snapshot(&self) -> CoordinationSnapshot {
        snapshot::collect(&self.rooms, &self.eoc).await
    }

    /// A successful update that ends in a terminal status is the close
    /// itself, since closed rooms reject every later update.
    fn track_closure(&self, room: &IncidentRoom) {
        if room.status.is_terminal() {
            self.eoc.adjust_active_incidents(false);
        }
    }
}
