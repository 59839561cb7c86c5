//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Document storage (the host application's persistence engine)
//! - Operator-facing notifications
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;
pub mod types;

pub use error::RepoError;
pub use external::OperatorNotifier;
pub use repos::DocumentStore;
pub use testing::ClockPort;
pub use types::{
    CollectionConfig, CollectionFilter, CollectionInfo, CollectionSpec, DocumentFilter,
    StoreEvent,
};

#[cfg(test)]
pub use external::MockOperatorNotifier;
#[cfg(test)]
pub use repos::MockDocumentStore;
#[cfg(test)]
pub use testing::MockClockPort;
