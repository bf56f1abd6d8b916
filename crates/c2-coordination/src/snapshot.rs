//! Point-in-time counts across every room and the EOC.

use crate::eoc::EocCoordinator;
use crate::registry::RoomRegistry;
use c2_core::{now_epoch_millis, EpochMillis, RoomPriority, RoomStatus, TaskPriority, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EocSnapshot {
    pub active: bool,
    pub activation_level: Option<u8>,
    pub agencies_present: usize,
    pub agencies_registered: usize,
}

/// Rooms are read one lock at a time, so counts from different rooms may
/// straddle concurrent writes. Each room's own numbers are consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationSnapshot {
    pub rooms_total: usize,
    pub rooms_by_status: BTreeMap<RoomStatus, usize>,
    pub rooms_by_priority: BTreeMap<RoomPriority, usize>,
    pub tasks_total: usize,
    pub tasks_by_status: BTreeMap<TaskStatus, usize>,
    pub tasks_by_priority: BTreeMap<TaskPriority, usize>,
    pub overdue_tasks: usize,
    pub eoc: EocSnapshot,
    pub generated_at_ms: EpochMillis,
}

impl CoordinationSnapshot {
    pub fn open_rooms(&self) -> usize {
        self.rooms_by_status
            .iter()
            .filter(|(status, _)| !status.is_terminal())
            .map(|(_, count)| count)
            .sum()
    }
}

pub(crate) async fn collect(registry: &RoomRegistry, eoc: &EocCoordinator) -> CoordinationSnapshot {
    let now = now_epoch_millis();
    let mut snapshot = CoordinationSnapshot {
        generated_at_ms: now,
        ..CoordinationSnapshot::default()
    };

    for handle in registry.handles() {
        let record = handle.lock().await;
        let room = record.room();
        snapshot.rooms_total += 1;
        *snapshot.rooms_by_status.entry(room.status).or_default() += 1;
        *snapshot.rooms_by_priority.entry(room.priority).or_default() += 1;

        for task in record.tasks().iter() {
            snapshot.tasks_total += 1;
            *snapshot.tasks_by_status.entry(task.status).or_default() += 1;
            *snapshot.tasks_by_priority.entry(task.priority).or_default() += 1;
            if task.is_overdue(now) {
                snapshot.overdue_tasks += 1;
            }
        }
    }

    let status = eoc.eoc_status().ok();
    snapshot.eoc = EocSnapshot {
        active: status.as_ref().is_some_and(|eoc| eoc.is_active()),
        activation_level: status
            .as_ref()
            .filter(|eoc| eoc.is_active())
            .map(|eoc| eoc.activation_level),
        agencies_present: status
            .as_ref()
            .map(|eoc| eoc.agencies_present.len())
            .unwrap_or_default(),
        agencies_registered: eoc.agencies().len(),
    };
    snapshot
}
