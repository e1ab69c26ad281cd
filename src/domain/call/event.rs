//! Call session events delivered to subscribers

use crate::domain::call::entity::RemoteUser;
use crate::domain::call::value_object::SessionState;
use crate::domain::shared::events::{DomainEvent, EventMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CallEventKind {
    /// The session moved to a new state. `remote_user` is `None` once idle.
    StatusChanged {
        status: SessionState,
        remote_user: Option<RemoteUser>,
    },
    /// Talk time advanced
    DurationChanged { seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub metadata: EventMetadata,
    pub kind: CallEventKind,
}

impl CallEvent {
    pub fn status_changed(status: SessionState, remote_user: Option<RemoteUser>) -> Self {
        Self {
            metadata: EventMetadata::new("call.status_changed"),
            kind: CallEventKind::StatusChanged {
                status,
                remote_user,
            },
        }
    }

    pub fn duration_changed(seconds: u64) -> Self {
        Self {
            metadata: EventMetadata::new("call.duration_changed"),
            kind: CallEventKind::DurationChanged { seconds },
        }
    }
}

impl DomainEvent for CallEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            CallEventKind::StatusChanged { .. } => "call.status_changed",
            CallEventKind::DurationChanged { .. } => "call.duration_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}
