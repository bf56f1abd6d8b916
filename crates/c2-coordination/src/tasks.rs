//! Task graph engine.
//!
//! Tasks belong to exactly one room and are stored in that room's
//! [`TaskGraph`], in creation order. Dependencies may only name tasks that
//! already exist in the same room, so the graph is acyclic by construction.

use crate::audit::AuditTrail;
use crate::registry::{required, RoomRegistry};
use c2_core::{
    now_epoch_millis, AvailableResource, C2Error, C2Result, EpochMillis, EventSource, NewEvent,
    NewTask, RoomId, Task, TaskCounts, TaskId, TaskStatus, TimelineEventType,
};
use c2_observability::names;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug)]
pub struct TaskGraph {
    room_id: RoomId,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskGraph {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.index.get(&task_id).map(|position| &self.tasks[*position])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn with_status(&self, status: Option<TaskStatus>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| status.is_none_or(|wanted| task.status == wanted))
            .cloned()
            .collect()
    }

    pub fn pending(&self) -> Vec<Task> {
        self.with_status(Some(TaskStatus::Pending))
    }

    pub fn overdue(&self, now_ms: EpochMillis) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.is_overdue(now_ms))
            .cloned()
            .collect()
    }

    pub fn counts(&self, now_ms: EpochMillis) -> TaskCounts {
        let mut counts = TaskCounts {
            total: self.tasks.len(),
            ..TaskCounts::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Assigned => counts.assigned += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Blocked => counts.blocked += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
            if task.is_overdue(now_ms) {
                counts.overdue += 1;
            }
        }
        counts
    }

    pub(crate) fn create(&mut self, new: NewTask, now_ms: EpochMillis) -> C2Result<Task> {
        let title = required("task title", &new.title)?;

        let mut dependencies = Vec::with_capacity(new.dependencies.len());
        for dependency in new.dependencies {
            if !self.index.contains_key(&dependency) {
                return Err(C2Error::invalid_argument(
                    "task dependency",
                    dependency.to_string(),
                ));
            }
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        let mut required_capabilities: Vec<String> = Vec::new();
        for capability in &new.required_capabilities {
            let capability = required("required capability", capability)?;
            if !required_capabilities.contains(&capability) {
                required_capabilities.push(capability);
            }
        }

        let task = Task {
            id: TaskId::new(),
            room_id: self.room_id,
            title,
            description: new.description,
            status: TaskStatus::Pending,
            priority: new.priority,
            assignee: None,
            assigned_agency: None,
            due_at_ms: new.due_at_ms,
            dependencies,
            required_capabilities,
            location: new.location,
            completion_notes: None,
            blocked_reason: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
        };
        self.index.insert(task.id, self.tasks.len());
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub(crate) fn assign(
        &mut self,
        task_id: TaskId,
        person: &str,
        agency: Option<&str>,
        now_ms: EpochMillis,
    ) -> C2Result<Task> {
        let person = required("assignee", person)?;
        let agency = agency
            .map(|value| required("assigned agency", value))
            .transpose()?;
        let task = self.task_mut(task_id)?;
        expect_status(
            task,
            &[TaskStatus::Pending, TaskStatus::Assigned, TaskStatus::Blocked],
            TaskStatus::Assigned,
        )?;

        task.status = TaskStatus::Assigned;
        task.assignee = Some(person);
        task.assigned_agency = agency;
        task.blocked_reason = None;
        task.updated_at_ms = now_ms;
        Ok(task.clone())
    }

    pub(crate) fn start(&mut self, task_id: TaskId, now_ms: EpochMillis) -> C2Result<Task> {
        let task = self.task_mut(task_id)?;
        expect_status(
            task,
            &[TaskStatus::Pending, TaskStatus::Assigned, TaskStatus::Blocked],
            TaskStatus::InProgress,
        )?;

        task.status = TaskStatus::InProgress;
        task.blocked_reason = None;
        task.started_at_ms.get_or_insert(now_ms);
        task.updated_at_ms = now_ms;
        Ok(task.clone())
    }

    /// Completion requires every dependency to be completed first. On any
    /// failure the task is left untouched.
    pub(crate) fn complete(
        &mut self,
        task_id: TaskId,
        notes: Option<String>,
        now_ms: EpochMillis,
    ) -> C2Result<Task> {
        let task = self.get(task_id).ok_or(C2Error::TaskNotFound(task_id))?;
        expect_status(
            task,
            &[
                TaskStatus::Pending,
                TaskStatus::Assigned,
                TaskStatus::InProgress,
            ],
            TaskStatus::Completed,
        )?;
        let pending: Vec<TaskId> = task
            .dependencies
            .iter()
            .copied()
            .filter(|dependency| {
                self.get(*dependency)
                    .is_none_or(|prerequisite| prerequisite.status != TaskStatus::Completed)
            })
            .collect();
        if !pending.is_empty() {
            return Err(C2Error::DependenciesIncomplete { task_id, pending });
        }

        let task = self.task_mut(task_id)?;
        task.status = TaskStatus::Completed;
        task.completion_notes = notes.filter(|value| !value.trim().is_empty());
        task.completed_at_ms = Some(now_ms);
        task.updated_at_ms = now_ms;
        Ok(task.clone())
    }

    pub(crate) fn block(
        &mut self,
        task_id: TaskId,
        reason: &str,
        now_ms: EpochMillis,
    ) -> C2Result<Task> {
        let reason = required("block reason", reason)?;
        let task = self.task_mut(task_id)?;
        expect_status(
            task,
            &[
                TaskStatus::Pending,
                TaskStatus::Assigned,
                TaskStatus::InProgress,
            ],
            TaskStatus::Blocked,
        )?;

        task.status = TaskStatus::Blocked;
        task.blocked_reason = Some(reason);
        task.updated_at_ms = now_ms;
        Ok(task.clone())
    }

    pub(crate) fn cancel(
        &mut self,
        task_id: TaskId,
        reason: Option<String>,
        now_ms: EpochMillis,
    ) -> C2Result<Task> {
        let task = self.task_mut(task_id)?;
        if task.status.is_terminal() {
            return Err(C2Error::invalid_transition(
                "task",
                task_id,
                task.status,
                TaskStatus::Cancelled,
            ));
        }

        task.status = TaskStatus::Cancelled;
        task.completion_notes = reason.filter(|value| !value.trim().is_empty());
        task.updated_at_ms = now_ms;
        Ok(task.clone())
    }

    /// First-fit matching: pending tasks are taken in creation order and each
    /// is bound to the first unclaimed resource, in the order supplied, whose
    /// capabilities cover the task's requirements. A resource is claimed at
    /// most once per call. No load balancing or priority ordering is applied.
    pub(crate) fn auto_assign(
        &mut self,
        resources: &[AvailableResource],
        now_ms: EpochMillis,
    ) -> Vec<Task> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut assigned = Vec::new();

        for task in self
            .tasks
            .iter_mut()
            .filter(|task| task.status == TaskStatus::Pending)
        {
            let candidate = resources.iter().find(|resource| {
                !claimed.contains(resource.name.as_str())
                    && resource.covers(&task.required_capabilities)
            });
            let Some(resource) = candidate else {
                continue;
            };
            claimed.insert(resource.name.as_str());

            task.status = TaskStatus::Assigned;
            task.assignee = Some(resource.name.clone());
            task.assigned_agency = resource.agency.clone();
            task.updated_at_ms = now_ms;
            assigned.push(task.clone());
        }
        assigned
    }

    fn task_mut(&mut self, task_id: TaskId) -> C2Result<&mut Task> {
        let position = *self
            .index
            .get(&task_id)
            .ok_or(C2Error::TaskNotFound(task_id))?;
        Ok(&mut self.tasks[position])
    }
}

fn expect_status(task: &Task, allowed: &[TaskStatus], next: TaskStatus) -> C2Result<()> {
    if allowed.contains(&task.status) {
        Ok(())
    } else {
        Err(C2Error::invalid_transition(
            "task",
            task.id,
            task.status,
            next,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct TaskEngine {
    registry: Arc<RoomRegistry>,
    audit: AuditTrail,
}

impl TaskEngine {
    pub(crate) fn new(registry: Arc<RoomRegistry>, audit: AuditTrail) -> Self {
        Self { registry, audit }
    }

    pub async fn create_task(&self, room_id: RoomId, new: NewTask) -> C2Result<Task> {
        let mut record = self.registry.lock(room_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        if room.status.is_terminal() {
            return Err(C2Error::invalid_transition(
                "room",
                room_id,
                room.status,
                "task_created",
            ));
        }

        let now = now_epoch_millis();
        let task = tasks.create(new, now)?;
        room.active_tasks += 1;
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskCreated,
                format!("Task created: {}", task.title),
            )
            .with_description(task.description.clone())
            .with_payload(json!({
                "task_id": task.id,
                "priority": task.priority,
                "dependencies": task.dependencies,
                "required_capabilities": task.required_capabilities,
            })),
        );
        self.registry.index_task(task.id, room_id);
        drop(record);

        metrics::counter!(names::TASKS_CREATED).increment(1);
        tracing::info!(
            room_id = %room_id,
            task_id = %task.id,
            priority = %task.priority,
            "Task created"
        );
        self.audit
            .record(EventSource::System, "task.create", task.id, None, Some(&task));
        Ok(task)
    }

    pub async fn assign_task(
        &self,
        task_id: TaskId,
        person: &str,
        agency: Option<&str>,
    ) -> C2Result<Task> {
        let mut record = self.registry.lock_for_task(task_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        let before = tasks.get(task_id).cloned();
        let now = now_epoch_millis();
        let task = tasks.assign(task_id, person, agency, now)?;
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskAssigned,
                format!(
                    "{} assigned to {}",
                    task.title,
                    task.assignee.as_deref().unwrap_or_default()
                ),
            )
            .with_payload(json!({
                "task_id": task.id,
                "assignee": task.assignee,
                "agency": task.assigned_agency,
                "auto": false,
            })),
        );
        drop(record);

        tracing::info!(
            task_id = %task_id,
            assignee = %person,
            "Task assigned"
        );
        self.audit.record(
            EventSource::actor(person),
            "task.assign",
            task_id,
            before.as_ref(),
            Some(&task),
        );
        Ok(task)
    }

    pub async fn start_task(&self, task_id: TaskId) -> C2Result<Task> {
        let mut record = self.registry.lock_for_task(task_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        let before = tasks.get(task_id).cloned();
        let now = now_epoch_millis();
        let task = tasks.start(task_id, now)?;
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskStarted,
                format!("Task started: {}", task.title),
            )
            .with_payload(json!({ "task_id": task.id, "assignee": task.assignee })),
        );
        drop(record);

        tracing::info!(task_id = %task_id, "Task started");
        self.audit.record(
            EventSource::System,
            "task.start",
            task_id,
            before.as_ref(),
            Some(&task),
        );
        Ok(task)
    }

    pub async fn complete_task(&self, task_id: TaskId, notes: Option<String>) -> C2Result<Task> {
        let mut record = self.registry.lock_for_task(task_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        let before = tasks.get(task_id).cloned();
        let now = now_epoch_millis();
        let task = tasks.complete(task_id, notes, now)?;
        room.active_tasks = room.active_tasks.saturating_sub(1);
        room.completed_tasks += 1;
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskCompleted,
                format!("Task completed: {}", task.title),
            )
            .with_description(task.completion_notes.clone().unwrap_or_default())
            .with_payload(json!({ "task_id": task.id, "assignee": task.assignee })),
        );
        drop(record);

        metrics::counter!(names::TASKS_COMPLETED).increment(1);
        tracing::info!(task_id = %task_id, "Task completed");
        self.audit.record(
            EventSource::System,
            "task.complete",
            task_id,
            before.as_ref(),
            Some(&task),
        );
        Ok(task)
    }

    pub async fn block_task(&self, task_id: TaskId, reason: &str) -> C2Result<Task> {
        let mut record = self.registry.lock_for_task(task_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        let before = tasks.get(task_id).cloned();
        let now = now_epoch_millis();
        let task = tasks.block(task_id, reason, now)?;
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskBlocked,
                format!("Task blocked: {}", task.title),
            )
            .with_description(task.blocked_reason.clone().unwrap_or_default())
            .with_payload(json!({ "task_id": task.id })),
        );
        drop(record);

        tracing::warn!(task_id = %task_id, reason = %reason, "Task blocked");
        self.audit.record(
            EventSource::System,
            "task.block",
            task_id,
            before.as_ref(),
            Some(&task),
        );
        Ok(task)
    }

    pub async fn cancel_task(&self, task_id: TaskId, reason: Option<String>) -> C2Result<Task> {
        let mut record = self.registry.lock_for_task(task_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        let before = tasks.get(task_id).cloned();
        let now = now_epoch_millis();
        let task = tasks.cancel(task_id, reason, now)?;
        room.active_tasks = room.active_tasks.saturating_sub(1);
        room.updated_at_ms = now;
        timeline.append(
            NewEvent::system(
                TimelineEventType::TaskCancelled,
                format!("Task cancelled: {}", task.title),
            )
            .with_description(task.completion_notes.clone().unwrap_or_default())
            .with_payload(json!({ "task_id": task.id })),
        );
        drop(record);

        tracing::info!(task_id = %task_id, "Task cancelled");
        self.audit.record(
            EventSource::System,
            "task.cancel",
            task_id,
            before.as_ref(),
            Some(&task),
        );
        Ok(task)
    }

    /// Binds pending tasks to resources from an availability snapshot. The
    /// snapshot itself is not reserved or modified.
    pub async fn auto_assign(
        &self,
        room_id: RoomId,
        resources: &[AvailableResource],
    ) -> C2Result<Vec<Task>> {
        let mut record = self.registry.lock(room_id).await?;
        let (room, tasks, timeline) = record.parts_mut();
        if room.status.is_terminal() {
            return Err(C2Error::invalid_transition(
                "room",
                room_id,
                room.status,
                "task_assigned",
            ));
        }

        let now = now_epoch_millis();
        let assigned = tasks.auto_assign(resources, now);
        if assigned.is_empty() {
            tracing::debug!(room_id = %room_id, "Auto-assignment matched no tasks");
            return Ok(assigned);
        }
        room.updated_at_ms = now;
        for task in &assigned {
            timeline.append(
                NewEvent::system(
                    TimelineEventType::TaskAssigned,
                    format!(
                        "{} auto-assigned to {}",
                        task.title,
                        task.assignee.as_deref().unwrap_or_default()
                    ),
                )
                .with_payload(json!({
                    "task_id": task.id,
                    "assignee": task.assignee,
                    "agency": task.assigned_agency,
                    "auto": true,
                })),
            );
        }
        drop(record);

        metrics::counter!(names::TASKS_AUTO_ASSIGNED).increment(assigned.len() as u64);
        tracing::info!(
            room_id = %room_id,
            assigned = assigned.len(),
            candidates = resources.len(),
            "Auto-assignment completed"
        );
        self.audit.record(
            EventSource::System,
            "task.auto_assign",
            room_id,
            None,
            Some(&assigned),
        );
        Ok(assigned)
    }

    pub async fn get_task(&self, task_id: TaskId) -> C2Result<Task> {
        let record = self.registry.lock_for_task(task_id).await?;
        record
            .tasks()
            .get(task_id)
            .cloned()
            .ok_or(C2Error::TaskNotFound(task_id))
    }

    pub async fn tasks_for_room(
        &self,
        room_id: RoomId,
        status: Option<TaskStatus>,
    ) -> C2Result<Vec<Task>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.tasks().with_status(status))
    }

    pub async fn pending_tasks(&self, room_id: RoomId) -> C2Result<Vec<Task>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.tasks().pending())
    }

    /// Evaluated against the wall clock at call time.
    pub async fn overdue_tasks(&self, room_id: RoomId) -> C2Result<Vec<Task>> {
        let record = self.registry.lock(room_id).await?;
        Ok(record.tasks().overdue(now_epoch_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use c2_core::TaskPriority;

    fn graph() -> TaskGraph {
        TaskGraph::new(RoomId::new())
    }

    fn medical(title: &str) -> NewTask {
        NewTask::new(title, TaskPriority::High).requires("medical")
    }

    #[test]
    fn completion_waits_for_dependencies() {
        let mut graph = graph();
        let open = graph
            .create(NewTask::new("Open shelter A", TaskPriority::Urgent), 1)
            .unwrap();
        let staff = graph
            .create(
                NewTask::new("Staff shelter A", TaskPriority::High).depends_on(open.id),
                1,
            )
            .unwrap();

        assert_matches!(
            graph.complete(staff.id, None, 2),
            Err(C2Error::DependenciesIncomplete { task_id, pending })
                if task_id == staff.id && pending == vec![open.id]
        );
        assert_eq!(graph.get(staff.id).unwrap().status, TaskStatus::Pending);

        graph.complete(open.id, None, 3).unwrap();
        let done = graph.complete(staff.id, Some("Shift 1 on site".into()), 4).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at_ms, Some(4));

        assert_matches!(
            graph.complete(staff.id, None, 5),
            Err(C2Error::InvalidTransition { entity: "task", .. })
        );
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut graph = graph();
        let result = graph.create(
            NewTask::new("Orphan", TaskPriority::Low).depends_on(TaskId::new()),
            1,
        );
        assert_matches!(
            result,
            Err(C2Error::InvalidArgument { field: "task dependency", .. })
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn auto_assign_claims_each_resource_once() {
        let mut graph = graph();
        let first = graph.create(medical("Triage north"), 1).unwrap();
        let second = graph.create(medical("Triage south"), 1).unwrap();
        let resources = vec![AvailableResource::new("Medic 1", &["medical", "rescue"])];

        let assigned = graph.auto_assign(&resources, 2);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, first.id);
        assert_eq!(assigned[0].assignee.as_deref(), Some("Medic 1"));
        assert_eq!(graph.get(second.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn auto_assign_is_first_fit_in_supplied_order() {
        let mut graph = graph();
        let hazmat = graph
            .create(NewTask::new("Contain spill", TaskPriority::Urgent).requires("hazmat"), 1)
            .unwrap();
        let triage = graph.create(medical("Triage"), 1).unwrap();
        let resources = vec![
            AvailableResource::new("Engine 4", &["fire"]),
            AvailableResource::new("Hazmat 2", &["hazmat", "medical"]).with_agency("Fire Dept"),
            AvailableResource::new("Medic 9", &["medical"]),
        ];

        let assigned = graph.auto_assign(&resources, 2);
        let by_task: HashMap<TaskId, Option<String>> = assigned
            .iter()
            .map(|task| (task.id, task.assignee.clone()))
            .collect();
        assert_eq!(by_task[&hazmat.id].as_deref(), Some("Hazmat 2"));
        assert_eq!(by_task[&triage.id].as_deref(), Some("Medic 9"));
        assert_eq!(
            graph.get(hazmat.id).unwrap().assigned_agency.as_deref(),
            Some("Fire Dept")
        );
    }

    #[test]
    fn blocked_task_must_resume_before_completion() {
        let mut graph = graph();
        let task = graph.create(medical("Transport"), 1).unwrap();
        graph.block(task.id, "Road washed out", 2).unwrap();
        assert_matches!(
            graph.complete(task.id, None, 3),
            Err(C2Error::InvalidTransition { .. })
        );
        let resumed = graph.start(task.id, 4).unwrap();
        assert_eq!(resumed.status, TaskStatus::InProgress);
        assert!(resumed.blocked_reason.is_none());
        graph.complete(task.id, None, 5).unwrap();
    }

    #[test]
    fn cancelled_task_is_terminal() {
        let mut graph = graph();
        let task = graph.create(medical("Standby"), 1).unwrap();
        graph.cancel(task.id, Some("Not needed".into()), 2).unwrap();
        assert_matches!(
            graph.assign(task.id, "Medic 1", None, 3),
            Err(C2Error::InvalidTransition { .. })
        );
        assert_matches!(
            graph.block(task.id, "late", 3),
            Err(C2Error::InvalidTransition { .. })
        );
    }

    #[test]
    fn overdue_excludes_terminal_tasks() {
        let mut graph = graph();
        let late = graph
            .create(NewTask::new("Sandbags", TaskPriority::High).due_at(100), 1)
            .unwrap();
        let done = graph
            .create(NewTask::new("Survey", TaskPriority::Low).due_at(100), 1)
            .unwrap();
        graph
            .create(NewTask::new("Later", TaskPriority::Low).due_at(1_000), 1)
            .unwrap();
        graph.complete(done.id, None, 50).unwrap();

        let overdue = graph.overdue(500);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);

        let counts = graph.counts(500);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.overdue, 1);
    }
}
