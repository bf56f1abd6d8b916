use crate::ids::{AgencyId, RoomId, TaskId};
use std::fmt;

/// Coarse classification used by hosts to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Conflict,
    Unavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum C2Error {
    #[error("incident room {0} not found")]
    RoomNotFound(RoomId),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("agency {0} not found")]
    AgencyNotFound(AgencyId),

    #[error("invalid transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("task {task_id} cannot complete, unfinished dependencies: {}", join_ids(.pending))]
    DependenciesIncomplete { task_id: TaskId, pending: Vec<TaskId> },

    #[error("emergency operations center is not activated")]
    EocNotActivated,

    #[error("invalid {field}: {value}")]
    InvalidArgument { field: &'static str, value: String },
}

impl C2Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) | Self::TaskNotFound(_) | Self::AgencyNotFound(_) => {
                ErrorCode::NotFound
            }
            Self::InvalidTransition { .. } | Self::DependenciesIncomplete { .. } => {
                ErrorCode::Conflict
            }
            Self::EocNotActivated => ErrorCode::Unavailable,
            Self::InvalidArgument { .. } => ErrorCode::InvalidInput,
        }
    }

    pub fn invalid_argument(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            value: value.into(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl fmt::Display,
        from: impl fmt::Display,
        to: impl fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type C2Result<T> = Result<T, C2Error>;
