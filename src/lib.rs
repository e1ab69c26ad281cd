//! Ringline - call session lifecycle over a realtime database
//!
//! A client signs in, places or receives one-to-one voice calls, and the
//! [`CallSessionManager`](domain::call::CallSessionManager) keeps the shared
//! call records, per-user active-call pointers and call history consistent
//! while publishing status and talk-time events to subscribers.

pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use domain::shared::error::{DomainError, StoreError};
pub use domain::shared::result::Result;
