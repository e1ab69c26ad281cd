//! Call bounded context - manages the lifecycle of a call session

pub mod entity;
pub mod event;
pub mod record;
pub mod repository;
pub mod service;
pub mod ticker;
pub mod value_object;

pub use entity::{RemoteUser, UserProfile};
pub use event::{CallEvent, CallEventKind};
pub use record::{filter_history, ActiveCallPointer, CallHistoryEntry, CallRecord, CallRecordPatch};
pub use repository::{fetch_profiles, CallRepository};
pub use service::{CallSessionManager, CallSettings, CurrentCall, HistoryView};
pub use ticker::DurationTicker;
pub use value_object::{
    format_duration, CallDirection, CallStatus, CallType, HistoryFilter, SessionState,
};
