use crate::error::C2Error;
use crate::ids::{AgencyId, BriefId, EocId, EventId, RequestId, RoomId, TaskId};
use crate::time::EpochMillis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Declares a closed tag set with its canonical wire names. Parsing is
/// case-insensitive, treats `-` and spaces as `_`, and rejects anything else.
/// Deserialization goes through the same parser as query strings.
macro_rules! tag_enum {
    ($name:ident, $field:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = C2Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($tag => Ok(Self::$variant),)+
                    _ => Err(C2Error::invalid_argument($field, value)),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

tag_enum!(RoomStatus, "room status" {
    Active => "active",
    Monitoring => "monitoring",
    Contained => "contained",
    Resolved => "resolved",
    Closed => "closed",
});

impl RoomStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Forward-only lifecycle. Any open room may be forced to closed.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed, _) => false,
            (_, Self::Closed) => true,
            (Self::Active, Self::Monitoring | Self::Contained) => true,
            (Self::Monitoring, Self::Contained | Self::Resolved) => true,
            (Self::Contained, Self::Resolved) => true,
            _ => false,
        }
    }
}

tag_enum!(RoomPriority, "room priority" {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

tag_enum!(TaskStatus, "task status" {
    Pending => "pending",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
    Blocked => "blocked",
    Cancelled => "cancelled",
});

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

tag_enum!(TaskPriority, "task priority" {
    Urgent => "urgent",
    High => "high",
    Medium => "medium",
    Low => "low",
});

tag_enum!(TimelineEventType, "timeline event type" {
    IncidentCreated => "incident_created",
    StatusChange => "status_change",
    SituationUpdate => "situation_update",
    TaskCreated => "task_created",
    TaskAssigned => "task_assigned",
    TaskStarted => "task_started",
    TaskCompleted => "task_completed",
    TaskBlocked => "task_blocked",
    TaskCancelled => "task_cancelled",
    ResourceDeployed => "resource_deployed",
    AgencyJoined => "agency_joined",
    EvacuationOrder => "evacuation_order",
    Correction => "correction",
    Note => "note",
});

tag_enum!(AgencyType, "agency type" {
    Police => "police",
    Fire => "fire",
    Ems => "ems",
    EmergencyManagement => "emergency_management",
    PublicWorks => "public_works",
    Utilities => "utilities",
    NationalGuard => "national_guard",
    Fema => "fema",
    RedCross => "red_cross",
    HealthDepartment => "health_department",
    Transportation => "transportation",
});

tag_enum!(BriefType, "brief type" {
    Situation => "situation",
    Executive => "executive",
    Operational => "operational",
    Public => "public",
});

tag_enum!(CommsStatus, "communications status" {
    Online => "online",
    Intermittent => "intermittent",
    Offline => "offline",
    Unknown => "unknown",
});

impl TimelineEventType {
    /// Types an outside caller may append. Lifecycle events are written only
    /// by the operations that cause them.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::SituationUpdate | Self::EvacuationOrder | Self::Correction | Self::Note
        )
    }
}

impl Default for CommsStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtyCounts {
    pub fatalities: u64,
    pub injuries: u64,
    pub missing: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtyDelta {
    #[serde(default)]
    pub fatalities: i64,
    #[serde(default)]
    pub injuries: i64,
    #[serde(default)]
    pub missing: i64,
}

impl CasualtyCounts {
    /// Returns `None` when any counter would drop below zero.
    pub fn apply(&self, delta: &CasualtyDelta) -> Option<Self> {
        Some(Self {
            fatalities: self.fatalities.checked_add_signed(delta.fatalities)?,
            injuries: self.injuries.checked_add_signed(delta.injuries)?,
            missing: self.missing.checked_add_signed(delta.missing)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub personnel: u64,
    pub vehicles: u64,
    pub equipment: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDelta {
    #[serde(default)]
    pub personnel: i64,
    #[serde(default)]
    pub vehicles: i64,
    #[serde(default)]
    pub equipment: i64,
}

impl ResourceCounts {
    pub fn apply(&self, delta: &ResourceDelta) -> Option<Self> {
        Some(Self {
            personnel: self.personnel.checked_add_signed(delta.personnel)?,
            vehicles: self.vehicles.checked_add_signed(delta.vehicles)?,
            equipment: self.equipment.checked_add_signed(delta.equipment)?,
        })
    }
}

/// Arguments for opening a room. Seeded by a hazard detector or an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub hazard_type: String,
    pub priority: RoomPriority,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub commander: String,
    #[serde(default)]
    pub affected_population: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: RoomStatus,
    #[serde(default)]
    pub affected_population_delta: Option<i64>,
    #[serde(default)]
    pub casualties: Option<CasualtyDelta>,
    #[serde(default)]
    pub resources: Option<ResourceDelta>,
    #[serde(default)]
    pub note: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: RoomStatus) -> Self {
        Self {
            status,
            affected_population_delta: None,
            casualties: None,
            resources: None,
            note: None,
        }
    }

    pub fn with_population(mut self, delta: i64) -> Self {
        self.affected_population_delta = Some(delta);
        self
    }

    pub fn with_casualties(mut self, delta: CasualtyDelta) -> Self {
        self.casualties = Some(delta);
        self
    }

    pub fn with_resources(mut self, delta: ResourceDelta) -> Self {
        self.resources = Some(delta);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRoom {
    pub id: RoomId,
    pub name: String,
    pub hazard_type: String,
    pub description: String,
    pub status: RoomStatus,
    pub priority: RoomPriority,
    pub location: String,
    pub commander: String,
    pub agencies_involved: Vec<String>,
    pub affected_population: u64,
    pub casualties: CasualtyCounts,
    pub resources_deployed: ResourceCounts,
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub notes: Vec<String>,
    pub created_at_ms: EpochMillis,
    pub updated_at_ms: EpochMillis,
    pub last_briefing_ms: Option<EpochMillis>,
}

impl IncidentRoom {
    pub fn has_agency(&self, name: &str) -> bool {
        self.agencies_involved.iter().any(|agency| agency == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_at_ms: Option<EpochMillis>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority,
            due_at_ms: None,
            dependencies: Vec::new(),
            required_capabilities: Vec::new(),
            location: None,
        }
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.dependencies.push(task_id);
        self
    }

    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.push(capability.into());
        self
    }

    pub fn due_at(mut self, due_at_ms: EpochMillis) -> Self {
        self.due_at_ms = Some(due_at_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub assigned_agency: Option<String>,
    pub due_at_ms: Option<EpochMillis>,
    pub dependencies: Vec<TaskId>,
    pub required_capabilities: Vec<String>,
    pub location: Option<String>,
    pub completion_notes: Option<String>,
    pub blocked_reason: Option<String>,
    pub created_at_ms: EpochMillis,
    pub updated_at_ms: EpochMillis,
    pub started_at_ms: Option<EpochMillis>,
    pub completed_at_ms: Option<EpochMillis>,
}

impl Task {
    pub fn is_overdue(&self, now_ms: EpochMillis) -> bool {
        !self.status.is_terminal() && self.due_at_ms.is_some_and(|due| due < now_ms)
    }
}

/// A candidate for capability matching, supplied by an availability snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableResource {
    pub name: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AvailableResource {
    pub fn new(name: impl Into<String>, capabilities: &[&str]) -> Self {
        Self {
            name: name.into(),
            agency: None,
            capabilities: capabilities.iter().map(|value| (*value).to_string()).collect(),
        }
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    /// Capabilities compare trimmed on both sides.
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|capability| {
            let capability = capability.trim();
            self.capabilities
                .iter()
                .any(|offered| offered.trim() == capability)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    System,
    Actor(String),
}

impl EventSource {
    pub fn actor(name: impl Into<String>) -> Self {
        Self::Actor(name.into())
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Actor(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: TimelineEventType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub source: EventSource,
}

impl NewEvent {
    pub fn system(event_type: TimelineEventType, title: impl Into<String>) -> Self {
        Self {
            event_type,
            title: title.into(),
            description: String::new(),
            payload: serde_json::Value::Null,
            source: EventSource::System,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn from_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    pub room_id: RoomId,
    pub sequence: u64,
    pub event_type: TimelineEventType,
    pub title: String,
    pub description: String,
    pub payload: serde_json::Value,
    pub source: EventSource,
    pub timestamp_ms: EpochMillis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub agency_type: AgencyType,
    pub jurisdiction: String,
    #[serde(default)]
    pub contact_info: String,
    #[serde(default)]
    pub resources_available: BTreeMap<String, u64>,
    #[serde(default)]
    pub personnel_available: u32,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub agency_type: AgencyType,
    pub jurisdiction: String,
    pub contact_info: String,
    pub resources_available: BTreeMap<String, u64>,
    pub personnel_available: u32,
    pub capabilities: Vec<String>,
    pub liaison_officer: Option<String>,
    pub joined_at_ms: Option<EpochMillis>,
    pub registered_at_ms: EpochMillis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EocState {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EocStatus {
    pub id: EocId,
    pub name: String,
    pub activation_level: u8,
    pub state: EocState,
    pub agencies_present: Vec<String>,
    pub active_incidents: u32,
    pub personnel_on_duty: u32,
    pub last_briefing_ms: Option<EpochMillis>,
    pub next_briefing_ms: Option<EpochMillis>,
    pub communications_status: CommsStatus,
    pub backup_ready: bool,
    pub activated_at_ms: EpochMillis,
    pub updated_at_ms: EpochMillis,
}

impl EocStatus {
    pub fn is_active(&self) -> bool {
        self.state == EocState::Activated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EocStatusUpdate {
    #[serde(default)]
    pub activation_level: Option<u8>,
    #[serde(default)]
    pub personnel_on_duty: Option<u32>,
    #[serde(default)]
    pub active_incidents: Option<u32>,
    #[serde(default)]
    pub communications_status: Option<CommsStatus>,
    #[serde(default)]
    pub backup_ready: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOffer {
    pub agency_id: AgencyId,
    pub agency_name: String,
    pub available: u64,
}

/// Advisory lookup result. Matching agencies are reported, never reserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub id: RequestId,
    pub requesting_agency: String,
    pub resource_type: String,
    pub quantity: u64,
    pub priority: RoomPriority,
    pub available_from: Vec<ResourceOffer>,
    pub requested_at_ms: EpochMillis,
}

impl ResourceRequest {
    pub fn is_satisfiable(&self) -> bool {
        !self.available_from.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
    pub cancelled: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub id: BriefId,
    pub room_id: RoomId,
    pub brief_type: BriefType,
    pub title: String,
    pub situation_summary: String,
    pub key_developments: Vec<String>,
    pub immediate_priorities: Vec<String>,
    pub pending_decisions: Vec<String>,
    pub resource_summary: String,
    pub task_counts: TaskCounts,
    pub recent_events: Vec<TimelineEvent>,
    pub generated_at_ms: EpochMillis,
}
