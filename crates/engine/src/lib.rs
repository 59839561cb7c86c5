//! Beacon Engine library.
//!
//! Entity registry, change dispatch and content import for Lancer worlds.
//!
//! ## Structure
//!
//! - `entities/` - Live entities, registries, factories and the operation context
//! - `use_cases/` - Wrapping, import and license lookup built on the entities
//! - `notifications/` - Debounced change signals per document
//! - `infrastructure/` - Ports and their adapters (store, clock, cache, config)
//! - `app` - Application composition

pub mod app;
pub mod entities;
pub mod infrastructure;
pub mod notifications;
pub mod use_cases;

pub use app::App;
