//! Durable call records: the call itself, the per-user active pointer and
//! the per-user history log.

use crate::domain::call::value_object::{CallDirection, CallStatus, CallType, HistoryFilter};
use crate::domain::shared::value_objects::{CallId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One call's lifecycle, stored under `Calls/{callId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Key of the record; not part of the stored value
    #[serde(skip)]
    pub id: Option<CallId>,
    pub caller_id: UserId,
    pub callee_id: UserId,
    #[serde(rename = "type", default)]
    pub call_type: CallType,
    pub status: CallStatus,
    pub start_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl CallRecord {
    /// A freshly placed voice call, stamped by the server on write
    pub fn outgoing(caller_id: UserId, callee_id: UserId) -> Self {
        Self {
            id: None,
            caller_id,
            callee_id,
            call_type: CallType::Voice,
            status: CallStatus::Outgoing,
            start_time: Timestamp::server(),
            answered_at: None,
            end_time: None,
            duration: None,
        }
    }

    pub fn with_id(mut self, id: CallId) -> Self {
        self.id = Some(id);
        self
    }

    /// The party that is not `user`
    pub fn remote_party(&self, user: &UserId) -> &UserId {
        if &self.caller_id == user {
            &self.callee_id
        } else {
            &self.caller_id
        }
    }

    pub fn direction_for(&self, user: &UserId) -> CallDirection {
        if &self.caller_id == user {
            CallDirection::Outgoing
        } else {
            CallDirection::Incoming
        }
    }
}

/// Partial update of a call record; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl CallRecordPatch {
    pub fn connected() -> Self {
        Self {
            status: Some(CallStatus::Connected),
            answered_at: Some(Timestamp::server()),
            ..Default::default()
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: Some(CallStatus::Rejected),
            end_time: Some(Timestamp::server()),
            ..Default::default()
        }
    }

    pub fn ended(duration: u64) -> Self {
        Self {
            status: Some(CallStatus::Ended),
            end_time: Some(Timestamp::server()),
            duration: Some(duration),
            ..Default::default()
        }
    }
}

/// Marker of the call a user is currently in, under `ActiveCalls/{userId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCallPointer {
    pub call_id: CallId,
    pub remote_user_id: UserId,
    pub status: CallStatus,
}

/// Append-only summary of a finished call, under `CallHistory/{userId}/{entryId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallHistoryEntry {
    /// Push key of the entry; not part of the stored value
    #[serde(skip)]
    pub id: Option<String>,
    pub call_id: CallId,
    pub remote_user_id: UserId,
    #[serde(rename = "type", default)]
    pub call_type: CallType,
    pub status: CallStatus,
    /// Missing on entries written before the direction was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<CallDirection>,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub duration: u64,
}

impl CallHistoryEntry {
    /// Summarize `record` from the point of view of `user`
    pub fn from_record(
        call_id: CallId,
        record: &CallRecord,
        user: &UserId,
        status: CallStatus,
        duration: u64,
    ) -> Self {
        Self {
            id: None,
            call_id,
            remote_user_id: record.remote_party(user).clone(),
            call_type: record.call_type,
            status,
            direction: Some(record.direction_for(user)),
            timestamp: Timestamp::server(),
            duration,
        }
    }

    pub fn is_missed(&self) -> bool {
        self.status == CallStatus::Rejected
    }

    pub fn matches(&self, filter: HistoryFilter) -> bool {
        match filter {
            HistoryFilter::All => true,
            HistoryFilter::Incoming => {
                self.direction == Some(CallDirection::Incoming) && !self.is_missed()
            }
            HistoryFilter::Outgoing => self.direction == Some(CallDirection::Outgoing),
            HistoryFilter::Missed => self.is_missed(),
        }
    }
}

/// Keep the entries visible under `filter`, preserving order
pub fn filter_history(
    entries: &[CallHistoryEntry],
    filter: HistoryFilter,
) -> Vec<CallHistoryEntry> {
    entries
        .iter()
        .filter(|entry| entry.matches(filter))
        .cloned()
        .collect()
}
