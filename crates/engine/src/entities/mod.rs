//! Entity modules - live entity resolution.
//!
//! Registries turn persisted documents into live entities within one scope.
//! They depend on the storage port and provide the building blocks for use cases.

pub mod collections;
pub mod context;
pub mod error;
pub mod factory;
pub mod live;
pub mod registry;

pub use collections::CollectionIndex;
pub use context::OpCtx;
pub use error::WrapError;
pub use factory::{EntityFactory, FactoryError, FactorySet, StandardFactory};
pub use live::LiveEntity;
pub use registry::{Category, Registry};
