//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod cache;
pub mod clock;
pub mod config;
pub mod importers;
pub mod memory_store;
pub mod notifier;
pub mod ports;
