//! Persistence implementations

pub mod call_repository;

pub use call_repository::StoreCallRepository;
