pub mod domain;
pub mod error;
pub mod ids;
pub mod time;

pub use domain::{
    Agency, AgencyType, AvailableResource, Brief, BriefType, CasualtyCounts, CasualtyDelta,
    CommsStatus, EocState, EocStatus, EocStatusUpdate, EventSource, IncidentRoom, NewAgency,
    NewEvent, NewRoom, NewTask, ResourceCounts, ResourceDelta, ResourceOffer, ResourceRequest,
    RoomPriority, RoomStatus, StatusUpdate, Task, TaskCounts, TaskPriority, TaskStatus,
    TimelineEvent, TimelineEventType,
};
pub use error::{C2Error, C2Result, ErrorCode};
pub use ids::{AgencyId, BriefId, EocId, EventId, RequestId, RoomId, TaskId};
pub use time::{minutes_after, now_epoch_millis, EpochMillis, MILLIS_PER_MINUTE};
