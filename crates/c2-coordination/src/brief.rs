//! Rule-based situation briefs.
//!
//! A brief is a deterministic rendering of a room's counters, task graph and
//! recent timeline. Each rule contributes at most one bullet when its
//! threshold is crossed.

use crate::registry::{RoomRecord, RoomRegistry};
use c2_config::CoordinationConfig;
use c2_core::{
    now_epoch_millis, Brief, BriefId, BriefType, C2Result, EpochMillis, IncidentRoom, RoomId,
    RoomPriority, RoomStatus, TaskCounts,
};
use c2_observability::names;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefRules {
    pub population_threshold: u64,
    pub agency_threshold: usize,
    pub personnel_threshold: u64,
    pub recent_events: usize,
}

impl Default for BriefRules {
    fn default() -> Self {
        Self::from(&CoordinationConfig::default())
    }
}

impl From<&CoordinationConfig> for BriefRules {
    fn from(config: &CoordinationConfig) -> Self {
        Self {
            population_threshold: config.brief_population_threshold,
            agency_threshold: config.brief_agency_threshold,
            personnel_threshold: config.brief_personnel_threshold,
            recent_events: config.brief_recent_events,
        }
    }
}

impl BriefRules {
    pub fn compose(&self, record: &RoomRecord, brief_type: BriefType, now_ms: EpochMillis) -> Brief {
        let room = record.room();
        let counts = record.tasks().counts(now_ms);

        let mut pending_decisions = self.pending_decisions(room, &counts);
        let mut recent_events = record.timeline().recent(self.recent_events);
        match brief_type {
            BriefType::Public => {
                pending_decisions.clear();
                recent_events.clear();
            }
            BriefType::Executive => recent_events.clear(),
            BriefType::Situation | BriefType::Operational => {}
        }

        Brief {
            id: BriefId::new(),
            room_id: room.id,
            brief_type,
            title: format!("{} brief: {}", title_case(brief_type), room.name),
            situation_summary: situation_summary(room, &counts),
            key_developments: self.key_developments(room, &counts),
            immediate_priorities: self.immediate_priorities(room, &counts),
            pending_decisions,
            resource_summary: format!(
                "{} personnel, {} vehicles and {} equipment units deployed",
                room.resources_deployed.personnel,
                room.resources_deployed.vehicles,
                room.resources_deployed.equipment
            ),
            task_counts: counts,
            recent_events,
            generated_at_ms: now_ms,
        }
    }

    fn key_developments(&self, room: &IncidentRoom, counts: &TaskCounts) -> Vec<String> {
        let mut bullets = Vec::new();
        if room.casualties.fatalities > 0 {
            bullets.push(format!(
                "{} fatalities confirmed",
                room.casualties.fatalities
            ));
        }
        if room.affected_population > self.population_threshold {
            bullets.push(format!(
                "Large-scale impact: {} people affected",
                room.affected_population
            ));
        }
        if room.agencies_involved.len() >= self.agency_threshold {
            bullets.push(format!(
                "Multi-agency response activated: {} agencies involved",
                room.agencies_involved.len()
            ));
        }
        if room.resources_deployed.personnel > self.personnel_threshold {
            bullets.push(format!(
                "Major deployment: {} personnel on scene",
                room.resources_deployed.personnel
            ));
        }
        match room.status {
            RoomStatus::Contained => bullets.push("Incident reported contained".to_string()),
            RoomStatus::Resolved => bullets.push("Incident reported resolved".to_string()),
            RoomStatus::Active | RoomStatus::Monitoring | RoomStatus::Closed => {}
        }
        if counts.completed > 0 {
            bullets.push(format!("{} response tasks completed", counts.completed));
        }
        bullets
    }

    fn immediate_priorities(&self, room: &IncidentRoom, counts: &TaskCounts) -> Vec<String> {
        let mut bullets = Vec::new();
        if room.casualties.injuries > 0 {
            bullets.push(format!(
                "Treat and transport {} injured",
                room.casualties.injuries
            ));
        }
        if room.casualties.missing > 0 {
            bullets.push(format!(
                "Search and rescue for {} missing persons",
                room.casualties.missing
            ));
        }
        if room.status == RoomStatus::Active
            && matches!(room.priority, RoomPriority::Critical | RoomPriority::High)
        {
            bullets.push("Stabilize the scene and protect life safety".to_string());
        }
        if counts.overdue > 0 {
            bullets.push(format!("Resolve {} overdue tasks", counts.overdue));
        }
        if counts.pending > 0 {
            bullets.push(format!("Assign {} pending tasks", counts.pending));
        }
        if bullets.is_empty() {
            bullets.push("Maintain situational awareness".to_string());
        }
        bullets
    }

    fn pending_decisions(&self, room: &IncidentRoom, counts: &TaskCounts) -> Vec<String> {
        let mut bullets = Vec::new();
        if room.affected_population > self.population_threshold {
            bullets.push("Determine scope of evacuation orders".to_string());
        }
        if room.priority == RoomPriority::Critical
            && room.agencies_involved.len() < self.agency_threshold
        {
            bullets.push("Request mutual aid from additional agencies".to_string());
        }
        if counts.blocked > 0 {
            bullets.push(format!("Clear {} blocked tasks", counts.blocked));
        }
        if room.casualties.fatalities > 0 {
            bullets.push("Coordinate family assistance and public notification".to_string());
        }
        match room.status {
            RoomStatus::Contained => {
                bullets.push("Approve transition to recovery operations".to_string());
            }
            RoomStatus::Resolved => bullets.push("Approve incident closure".to_string()),
            RoomStatus::Active | RoomStatus::Monitoring | RoomStatus::Closed => {}
        }
        bullets
    }
}

fn situation_summary(room: &IncidentRoom, counts: &TaskCounts) -> String {
    format!(
        "{name} ({hazard}) at {location} is {status} at {priority} priority under {commander}. \
         {population} people affected; {fatalities} fatalities, {injuries} injured, {missing} missing. \
         {agencies} agencies involved with {personnel} personnel deployed. \
         {active} tasks active, {completed} completed.",
        name = room.name,
        hazard = room.hazard_type,
        location = room.location,
        status = room.status,
        priority = room.priority,
        commander = room.commander,
        population = room.affected_population,
        fatalities = room.casualties.fatalities,
        injuries = room.casualties.injuries,
        missing = room.casualties.missing,
        agencies = room.agencies_involved.len(),
        personnel = room.resources_deployed.personnel,
        active = counts.total - counts.completed - counts.cancelled,
        completed = counts.completed,
    )
}

fn title_case(brief_type: BriefType) -> &'static str {
    match brief_type {
        BriefType::Situation => "Situation",
        BriefType::Executive => "Executive",
        BriefType::Operational => "Operational",
        BriefType::Public => "Public",
    }
}

#[derive(Debug, Clone)]
pub struct BriefBuilder {
    registry: Arc<RoomRegistry>,
    rules: BriefRules,
}

impl BriefBuilder {
    pub(crate) fn new(registry: Arc<RoomRegistry>, rules: BriefRules) -> Self {
        Self { registry, rules }
    }

    pub fn rules(&self) -> &BriefRules {
        &self.rules
    }

    /// Reads room state and stamps `last_briefing_ms`; nothing else changes.
    pub async fn generate_brief(&self, room_id: RoomId, brief_type: BriefType) -> C2Result<Brief> {
        let mut record = self.registry.lock(room_id).await?;
        let now = now_epoch_millis();
        let brief = self.rules.compose(&record, brief_type, now);
        record.room_mut().last_briefing_ms = Some(now);
        drop(record);

        metrics::counter!(names::BRIEFS_GENERATED).increment(1);
        tracing::info!(
            room_id = %room_id,
            brief_type = %brief_type,
            developments = brief.key_developments.len(),
            "Situation brief generated"
        );
        Ok(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditTrail, MemoryAuditSink};
    use c2_core::{CasualtyDelta, NewRoom, ResourceDelta, StatusUpdate};

    async fn setup() -> (Arc<RoomRegistry>, BriefBuilder, RoomId) {
        let registry = Arc::new(RoomRegistry::new(AuditTrail::new(Arc::new(
            MemoryAuditSink::new(),
        ))));
        let builder = BriefBuilder::new(registry.clone(), BriefRules::default());
        let room = registry
            .create_room(NewRoom {
                name: "Canyon Fire".to_string(),
                hazard_type: "wildfire".to_string(),
                priority: RoomPriority::Critical,
                location: "Ridge Road".to_string(),
                description: String::new(),
                commander: "IC Brooks".to_string(),
                affected_population: 0,
            })
            .unwrap();
        (registry, builder, room.id)
    }

    fn contains(bullets: &[String], fragment: &str) -> bool {
        bullets
            .iter()
            .any(|bullet| bullet.to_lowercase().contains(fragment))
    }

    #[tokio::test]
    async fn quiet_room_has_no_key_developments() {
        let (_, builder, room_id) = setup().await;
        let brief = builder
            .generate_brief(room_id, BriefType::Situation)
            .await
            .unwrap();
        assert!(brief.key_developments.is_empty());
        assert!(contains(&brief.immediate_priorities, "life safety"));
        assert!(contains(&brief.pending_decisions, "mutual aid"));
        assert!(brief.situation_summary.starts_with("Canyon Fire (wildfire)"));
    }

    #[tokio::test]
    async fn thresholds_add_one_bullet_each() {
        let (registry, builder, room_id) = setup().await;
        registry
            .update_status(
                room_id,
                StatusUpdate::to(RoomStatus::Active)
                    .with_population(12_000)
                    .with_casualties(CasualtyDelta {
                        fatalities: 2,
                        injuries: 7,
                        missing: 1,
                    })
                    .with_resources(ResourceDelta {
                        personnel: 150,
                        ..ResourceDelta::default()
                    }),
            )
            .await
            .unwrap();
        for agency in ["Fire Dept", "EMS", "Police"] {
            registry.add_agency(room_id, agency).await.unwrap();
        }

        let brief = builder
            .generate_brief(room_id, BriefType::Operational)
            .await
            .unwrap();
        assert_eq!(brief.key_developments.len(), 4);
        assert!(contains(&brief.key_developments, "fatalities"));
        assert!(contains(&brief.key_developments, "large-scale impact"));
        assert!(contains(&brief.key_developments, "multi-agency response activated"));
        assert!(contains(&brief.key_developments, "major deployment"));
        assert!(contains(&brief.immediate_priorities, "7 injured"));
        assert!(contains(&brief.immediate_priorities, "1 missing"));
        assert!(contains(&brief.pending_decisions, "evacuation"));
        assert!(!contains(&brief.pending_decisions, "mutual aid"));
    }

    #[tokio::test]
    async fn public_brief_omits_internal_sections() {
        let (registry, builder, room_id) = setup().await;
        let brief = builder
            .generate_brief(room_id, BriefType::Public)
            .await
            .unwrap();
        assert!(brief.pending_decisions.is_empty());
        assert!(brief.recent_events.is_empty());

        let stamped = registry.get_room(room_id).await.unwrap();
        assert_eq!(stamped.last_briefing_ms, Some(brief.generated_at_ms));
    }

    #[tokio::test]
    async fn generating_twice_leaves_timeline_untouched() {
        let (registry, builder, room_id) = setup().await;
        let first = builder
            .generate_brief(room_id, BriefType::Situation)
            .await
            .unwrap();
        let second = builder
            .generate_brief(room_id, BriefType::Situation)
            .await
            .unwrap();
        assert_eq!(first.key_developments, second.key_developments);
        assert_eq!(first.recent_events, second.recent_events);
        assert_eq!(registry.lock(room_id).await.unwrap().timeline().len(), 1);
    }
}
