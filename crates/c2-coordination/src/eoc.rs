//! Multi-agency Emergency Operations Center coordination.
//!
//! One lock covers the agency registry, the single EOC instance and the
//! request history. Resource requests are advisory: matching agencies are
//! reported and no inventory is reserved or decremented.

use crate::audit::AuditTrail;
use crate::registry::required;
use c2_core::{
    minutes_after, now_epoch_millis, Agency, AgencyId, C2Error, C2Result, CommsStatus, EocId,
    EocState, EocStatus, EocStatusUpdate, EpochMillis, EventSource, NewAgency, RequestId,
    ResourceOffer, ResourceRequest, RoomPriority,
};
use c2_observability::names;
use parking_lot::RwLock;
use std::collections::HashMap;

pub const MIN_ACTIVATION_LEVEL: u8 = 1;
pub const MAX_ACTIVATION_LEVEL: u8 = 3;

#[derive(Debug, Default)]
struct EocRegistry {
    agencies: Vec<Agency>,
    index: HashMap<AgencyId, usize>,
    eoc: Option<EocStatus>,
    requests: Vec<ResourceRequest>,
}

impl EocRegistry {
    fn active_eoc_mut(&mut self) -> C2Result<&mut EocStatus> {
        self.eoc
            .as_mut()
            .filter(|eoc| eoc.is_active())
            .ok_or(C2Error::EocNotActivated)
    }
}

#[derive(Debug)]
pub struct EocCoordinator {
    state: RwLock<EocRegistry>,
    audit: AuditTrail,
}

impl EocCoordinator {
    pub(crate) fn new(audit: AuditTrail) -> Self {
        Self {
            state: RwLock::new(EocRegistry::default()),
            audit,
        }
    }

    pub fn register_agency(&self, new: NewAgency) -> C2Result<Agency> {
        let name = required("agency name", &new.name)?;
        let agency = Agency {
            id: AgencyId::new(),
            name,
            agency_type: new.agency_type,
            jurisdiction: new.jurisdiction,
            contact_info: new.contact_info,
            resources_available: new.resources_available,
            personnel_available: new.personnel_available,
            capabilities: new.capabilities,
            liaison_officer: None,
            joined_at_ms: None,
            registered_at_ms: now_epoch_millis(),
        };

        {
            let mut state = self.state.write();
            let position = state.agencies.len();
            state.index.insert(agency.id, position);
            state.agencies.push(agency.clone());
        }

        tracing::info!(
            agency_id = %agency.id,
            name = %agency.name,
            agency_type = %agency.agency_type,
            "Agency registered"
        );
        self.audit.record(
            EventSource::System,
            "eoc.register_agency",
            agency.id,
            None,
            Some(&agency),
        );
        Ok(agency)
    }

    /// Replaces any previous EOC instance.
    pub fn activate_eoc(
        &self,
        name: &str,
        activation_level: u8,
        active_incidents: u32,
    ) -> C2Result<EocStatus> {
        let name = required("EOC name", name)?;
        validate_level(activation_level)?;

        let now = now_epoch_millis();
        let eoc = EocStatus {
            id: EocId::new(),
            name,
            activation_level,
            state: EocState::Activated,
            agencies_present: Vec::new(),
            active_incidents,
            personnel_on_duty: 0,
            last_briefing_ms: None,
            next_briefing_ms: None,
            communications_status: CommsStatus::Online,
            backup_ready: false,
            activated_at_ms: now,
            updated_at_ms: now,
        };
        let previous = self.state.write().eoc.replace(eoc.clone());

        metrics::gauge!(names::EOC_ACTIVATION_LEVEL).set(f64::from(activation_level));
        tracing::info!(
            eoc_id = %eoc.id,
            name = %eoc.name,
            activation_level,
            replaced = previous.is_some(),
            "EOC activated"
        );
        self.audit.record(
            EventSource::System,
            "eoc.activate",
            eoc.id,
            previous.as_ref(),
            Some(&eoc),
        );
        Ok(eoc)
    }

    pub fn deactivate_eoc(&self) -> C2Result<EocStatus> {
        let (before, after) = {
            let mut state = self.state.write();
            let eoc = state.active_eoc_mut()?;
            let before = eoc.clone();
            eoc.state = EocState::Deactivated;
            eoc.updated_at_ms = now_epoch_millis();
            (before, eoc.clone())
        };

        metrics::gauge!(names::EOC_ACTIVATION_LEVEL).set(0.0);
        tracing::info!(eoc_id = %after.id, "EOC deactivated");
        self.audit.record(
            EventSource::System,
            "eoc.deactivate",
            after.id,
            Some(&before),
            Some(&after),
        );
        Ok(after)
    }

    /// Requires an active EOC. The agency's name is listed as present once,
    /// however many times it joins.
    pub fn join_eoc(&self, agency_id: AgencyId, liaison_officer: &str) -> C2Result<Agency> {
        let liaison_officer = required("liaison officer", liaison_officer)?;
        let (before, after) = {
            let mut state = self.state.write();
            let state = &mut *state;
            let eoc = state
                .eoc
                .as_mut()
                .filter(|eoc| eoc.is_active())
                .ok_or(C2Error::EocNotActivated)?;
            let position = *state
                .index
                .get(&agency_id)
                .ok_or(C2Error::AgencyNotFound(agency_id))?;
            let agency = &mut state.agencies[position];

            let now = now_epoch_millis();
            let before = agency.clone();
            agency.liaison_officer = Some(liaison_officer.clone());
            agency.joined_at_ms = Some(now);
            if !eoc.agencies_present.contains(&agency.name) {
                eoc.agencies_present.push(agency.name.clone());
            }
            eoc.updated_at_ms = now;
            (before, agency.clone())
        };

        tracing::info!(
            agency_id = %agency_id,
            agency = %after.name,
            liaison = %liaison_officer,
            "Agency joined EOC"
        );
        self.audit.record(
            EventSource::actor(liaison_officer),
            "eoc.join",
            agency_id,
            Some(&before),
            Some(&after),
        );
        Ok(after)
    }

    pub fn update_eoc_status(&self, update: EocStatusUpdate) -> C2Result<EocStatus> {
        if let Some(level) = update.activation_level {
            validate_level(level)?;
        }
        let (before, after) = {
            let mut state = self.state.write();
            let eoc = state.active_eoc_mut()?;
            let before = eoc.clone();
            if let Some(level) = update.activation_level {
                eoc.activation_level = level;
            }
            if let Some(personnel) = update.personnel_on_duty {
                eoc.personnel_on_duty = personnel;
            }
            if let Some(incidents) = update.active_incidents {
                eoc.active_incidents = incidents;
            }
            if let Some(comms) = update.communications_status {
                eoc.communications_status = comms;
            }
            if let Some(backup_ready) = update.backup_ready {
                eoc.backup_ready = backup_ready;
            }
            eoc.updated_at_ms = now_epoch_millis();
            (before, eoc.clone())
        };

        metrics::gauge!(names::EOC_ACTIVATION_LEVEL).set(f64::from(after.activation_level));
        tracing::info!(
            eoc_id = %after.id,
            activation_level = after.activation_level,
            personnel_on_duty = after.personnel_on_duty,
            "EOC status updated"
        );
        self.audit.record(
            EventSource::System,
            "eoc.update_status",
            after.id,
            Some(&before),
            Some(&after),
        );
        Ok(after)
    }

    /// Reports every registered agency holding at least `quantity` of
    /// `resource_type`, in registration order. An empty match is a valid result.
    pub fn request_resources(
        &self,
        requesting_agency: &str,
        resource_type: &str,
        quantity: u64,
        priority: RoomPriority,
    ) -> C2Result<ResourceRequest> {
        let requesting_agency = required("requesting agency", requesting_agency)?;
        let resource_type = required("resource type", resource_type)?;
        if quantity == 0 {
            return Err(C2Error::invalid_argument("quantity", "0"));
        }

        let request = {
            let mut state = self.state.write();
            let available_from = state
                .agencies
                .iter()
                .filter_map(|agency| {
                    let available = agency.resources_available.get(&resource_type).copied()?;
                    (available >= quantity).then(|| ResourceOffer {
                        agency_id: agency.id,
                        agency_name: agency.name.clone(),
                        available,
                    })
                })
                .collect();
            let request = ResourceRequest {
                id: RequestId::new(),
                requesting_agency,
                resource_type,
                quantity,
                priority,
                available_from,
                requested_at_ms: now_epoch_millis(),
            };
            state.requests.push(request.clone());
            request
        };

        metrics::counter!(
            names::RESOURCE_REQUESTS,
            "satisfiable" => if request.is_satisfiable() { "true" } else { "false" }
        )
        .increment(1);
        tracing::info!(
            request_id = %request.id,
            requesting_agency = %request.requesting_agency,
            resource_type = %request.resource_type,
            quantity = request.quantity,
            matches = request.available_from.len(),
            "Resource request brokered"
        );
        self.audit.record(
            EventSource::actor(request.requesting_agency.clone()),
            "eoc.request_resources",
            request.id,
            None,
            Some(&request),
        );
        Ok(request)
    }

    /// Moves the incident count by one as a room opens or closes, on top of
    /// whatever value the EOC holds. No-op while inactive.
    pub(crate) fn adjust_active_incidents(&self, opened: bool) {
        let mut state = self.state.write();
        if let Ok(eoc) = state.active_eoc_mut() {
            eoc.active_incidents = if opened {
                eoc.active_incidents.saturating_add(1)
            } else {
                eoc.active_incidents.saturating_sub(1)
            };
        }
    }

    /// Stamps the briefing cycle on the active EOC. No-op while inactive.
    pub(crate) fn record_briefing(&self, briefed_at_ms: EpochMillis, interval_minutes: u64) {
        let mut state = self.state.write();
        if let Ok(eoc) = state.active_eoc_mut() {
            eoc.last_briefing_ms = Some(briefed_at_ms);
            eoc.next_briefing_ms = Some(minutes_after(briefed_at_ms, interval_minutes));
        }
    }

    pub fn eoc_status(&self) -> C2Result<EocStatus> {
        self.state.read().eoc.clone().ok_or(C2Error::EocNotActivated)
    }

    pub fn agency(&self, agency_id: AgencyId) -> C2Result<Agency> {
        let state = self.state.read();
        state
            .index
            .get(&agency_id)
            .map(|position| state.agencies[*position].clone())
            .ok_or(C2Error::AgencyNotFound(agency_id))
    }

    pub fn agencies(&self) -> Vec<Agency> {
        self.state.read().agencies.clone()
    }

    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        self.state.read().requests.clone()
    }
}

fn validate_level(level: u8) -> C2Result<()> {
    if (MIN_ACTIVATION_LEVEL..=MAX_ACTIVATION_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(C2Error::invalid_argument(
            "activation level",
            level.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use assert_matches::assert_matches;
    use c2_core::{AgencyType, MILLIS_PER_MINUTE};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn coordinator() -> (EocCoordinator, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        (EocCoordinator::new(AuditTrail::new(sink.clone())), sink)
    }

    fn agency(name: &str, agency_type: AgencyType, ambulances: Option<u64>) -> NewAgency {
        let mut resources_available = BTreeMap::new();
        if let Some(count) = ambulances {
            resources_available.insert("ambulances".to_string(), count);
        }
        NewAgency {
            name: name.to_string(),
            agency_type,
            jurisdiction: "County".to_string(),
            contact_info: String::new(),
            resources_available,
            personnel_available: 20,
            capabilities: Vec::new(),
        }
    }

    #[test]
    fn join_before_activation_fails() {
        let (eoc, _) = coordinator();
        let fire = eoc.register_agency(agency("Fire Dept", AgencyType::Fire, None)).unwrap();
        assert_matches!(eoc.join_eoc(fire.id, "Chief Ortiz"), Err(C2Error::EocNotActivated));
        assert!(eoc.agency(fire.id).unwrap().liaison_officer.is_none());
    }

    #[test]
    fn update_before_activation_fails() {
        let (eoc, sink) = coordinator();
        assert_matches!(
            eoc.update_eoc_status(EocStatusUpdate {
                personnel_on_duty: Some(12),
                ..EocStatusUpdate::default()
            }),
            Err(C2Error::EocNotActivated)
        );
        assert!(sink.records().is_empty());
    }

    #[test]
    fn deactivated_eoc_rejects_join_and_update() {
        let (eoc, sink) = coordinator();
        let fire = eoc.register_agency(agency("Fire Dept", AgencyType::Fire, None)).unwrap();
        let active = eoc.activate_eoc("County EOC", 3, 2).unwrap();

        let deactivated = eoc.deactivate_eoc().unwrap();
        assert_eq!(deactivated.id, active.id);
        assert_eq!(deactivated.state, EocState::Deactivated);
        assert_eq!(eoc.eoc_status().unwrap().state, EocState::Deactivated);

        assert_matches!(eoc.join_eoc(fire.id, "Chief Ortiz"), Err(C2Error::EocNotActivated));
        assert_matches!(
            eoc.update_eoc_status(EocStatusUpdate {
                backup_ready: Some(true),
                ..EocStatusUpdate::default()
            }),
            Err(C2Error::EocNotActivated)
        );
        assert_matches!(eoc.deactivate_eoc(), Err(C2Error::EocNotActivated));
        assert_eq!(
            sink.operations(),
            vec!["eoc.register_agency", "eoc.activate", "eoc.deactivate"]
        );
    }

    #[test]
    fn incident_adjustments_build_on_manual_count() {
        let (eoc, _) = coordinator();
        eoc.adjust_active_incidents(true);
        eoc.activate_eoc("County EOC", 1, 0).unwrap();
        eoc.update_eoc_status(EocStatusUpdate {
            active_incidents: Some(5),
            ..EocStatusUpdate::default()
        })
        .unwrap();

        eoc.adjust_active_incidents(true);
        eoc.adjust_active_incidents(false);
        eoc.adjust_active_incidents(false);
        assert_eq!(eoc.eoc_status().unwrap().active_incidents, 4);
    }

    #[test]
    fn second_activation_replaces_first() {
        let (eoc, _) = coordinator();
        let fire = eoc.register_agency(agency("Fire Dept", AgencyType::Fire, None)).unwrap();
        let first = eoc.activate_eoc("County EOC", 2, 1).unwrap();
        eoc.join_eoc(fire.id, "Chief Ortiz").unwrap();

        let second = eoc.activate_eoc("Regional EOC", 1, 1).unwrap();
        assert_ne!(first.id, second.id);
        let current = eoc.eoc_status().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.name, "Regional EOC");
        assert!(current.agencies_present.is_empty());
    }

    #[test]
    fn join_lists_agency_once() {
        let (eoc, _) = coordinator();
        let ems = eoc.register_agency(agency("County EMS", AgencyType::Ems, None)).unwrap();
        eoc.activate_eoc("County EOC", 1, 0).unwrap();
        eoc.join_eoc(ems.id, "Lt. Chen").unwrap();
        let joined = eoc.join_eoc(ems.id, "Sgt. Patel").unwrap();

        assert_eq!(joined.liaison_officer.as_deref(), Some("Sgt. Patel"));
        assert!(joined.joined_at_ms.is_some());
        assert_eq!(
            eoc.eoc_status().unwrap().agencies_present,
            vec!["County EMS".to_string()]
        );
    }

    #[test]
    fn join_unknown_agency_fails() {
        let (eoc, _) = coordinator();
        eoc.activate_eoc("County EOC", 1, 0).unwrap();
        let missing = AgencyId::new();
        assert_matches!(
            eoc.join_eoc(missing, "Nobody"),
            Err(C2Error::AgencyNotFound(id)) if id == missing
        );
    }

    #[test]
    fn activation_level_is_bounded() {
        let (eoc, _) = coordinator();
        assert_matches!(
            eoc.activate_eoc("County EOC", 0, 0),
            Err(C2Error::InvalidArgument { field: "activation level", .. })
        );
        assert_matches!(
            eoc.activate_eoc("County EOC", 4, 0),
            Err(C2Error::InvalidArgument { .. })
        );
        assert_matches!(eoc.eoc_status(), Err(C2Error::EocNotActivated));
    }

    #[test]
    fn request_reports_sufficient_agencies_without_reserving() {
        let (eoc, _) = coordinator();
        let ems = eoc
            .register_agency(agency("County EMS", AgencyType::Ems, Some(5)))
            .unwrap();
        eoc.register_agency(agency("City Fire", AgencyType::Fire, Some(2)))
            .unwrap();
        let red_cross = eoc
            .register_agency(agency("Red Cross", AgencyType::RedCross, Some(3)))
            .unwrap();
        eoc.register_agency(agency("Public Works", AgencyType::PublicWorks, None))
            .unwrap();

        let request = eoc
            .request_resources("PD", "ambulances", 3, RoomPriority::High)
            .unwrap();
        let matched: Vec<AgencyId> = request
            .available_from
            .iter()
            .map(|offer| offer.agency_id)
            .collect();
        assert_eq!(matched, vec![ems.id, red_cross.id]);

        let again = eoc
            .request_resources("PD", "ambulances", 3, RoomPriority::High)
            .unwrap();
        assert_eq!(again.available_from, request.available_from);
        assert_eq!(
            eoc.agency(ems.id).unwrap().resources_available["ambulances"],
            5
        );
        assert_eq!(eoc.resource_requests().len(), 2);
    }

    #[test]
    fn request_with_no_match_is_empty() {
        let (eoc, _) = coordinator();
        eoc.register_agency(agency("City Fire", AgencyType::Fire, Some(1)))
            .unwrap();
        let request = eoc
            .request_resources("PD", "ambulances", 3, RoomPriority::High)
            .unwrap();
        assert!(request.available_from.is_empty());
        assert!(!request.is_satisfiable());
    }

    #[test]
    fn briefing_cycle_is_stamped_on_active_eoc() {
        let (eoc, _) = coordinator();
        eoc.record_briefing(1_000, 60);
        eoc.activate_eoc("County EOC", 1, 0).unwrap();
        eoc.record_briefing(1_000, 60);
        let status = eoc.eoc_status().unwrap();
        assert_eq!(status.last_briefing_ms, Some(1_000));
        assert_eq!(status.next_briefing_ms, Some(1_000 + 60 * MILLIS_PER_MINUTE));
    }
}
