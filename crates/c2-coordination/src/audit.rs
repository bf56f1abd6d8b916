//! Audit notifications produced by every successful mutation.
//!
//! The core never waits on an audit consumer: sinks receive a finished
//! [`AuditRecord`] and must not call back into the coordination components.

use c2_core::{now_epoch_millis, EpochMillis, EventSource};
use c2_observability::AUDIT_TARGET;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: EventSource,
    pub operation: String,
    pub target: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub recorded_at_ms: EpochMillis,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Writes audit records to the `c2::audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: AUDIT_TARGET,
            actor = %record.actor,
            operation = %record.operation,
            target_id = %record.target,
            recorded_at_ms = record.recorded_at_ms,
            before = ?record.before,
            after = ?record.after,
            "audit"
        );
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.operation.clone())
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}

#[derive(Clone)]
pub(crate) struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub(crate) fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn record<T: Serialize>(
        &self,
        actor: EventSource,
        operation: &str,
        target: impl fmt::Display,
        before: Option<&T>,
        after: Option<&T>,
    ) {
        self.sink.record(AuditRecord {
            actor,
            operation: operation.to_string(),
            target: target.to_string(),
            before: before.and_then(|value| serde_json::to_value(value).ok()),
            after: after.and_then(|value| serde_json::to_value(value).ok()),
            recorded_at_ms: now_epoch_millis(),
        });
    }
}

impl fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}
