//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - Entities and value objects of a call session
//! - The session manager, the only place call state changes
//! - Repository and identity ports, implemented by the infrastructure layer
//! - Domain events published to subscribers

pub mod call;
pub mod identity;
pub mod shared;

// Re-export commonly used types
pub use identity::{IdentityProvider, StaticIdentity};
pub use shared::{DomainError, Result, StoreError};
