//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - The realtime data store port and its in-memory implementation
//! - Repository implementations on top of the store
//! - Metric descriptions

pub mod metrics;
pub mod persistence;
pub mod store;
