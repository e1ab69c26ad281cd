//! Shared kernel - Common types used by the call context and the store adapters

pub mod error;
pub mod events;
pub mod result;
pub mod value_objects;

pub use error::{DomainError, StoreError};
pub use result::Result;
pub use value_objects::*;
