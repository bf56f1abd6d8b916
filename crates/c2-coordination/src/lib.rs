//! Crisis coordination core: incident rooms, task graphs, timelines,
//! situation briefs and multi-agency EOC coordination.
//!
//! Everything is in memory. The [`CoordinationManager`] is the entry point.

pub mod audit;
pub mod brief;
pub mod eoc;
pub mod manager;
pub mod registry;
pub mod snapshot;
pub mod tasks;
pub mod timeline;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use brief::{BriefBuilder, BriefRules};
pub use eoc::{EocCoordinator, MAX_ACTIVATION_LEVEL, MIN_ACTIVATION_LEVEL};
pub use manager::CoordinationManager;
pub use registry::{RoomRecord, RoomRegistry};
pub use snapshot::{CoordinationSnapshot, EocSnapshot};
pub use tasks::{TaskEngine, TaskGraph};
pub use timeline::{EventFilter, Timeline, TimelineLog};
