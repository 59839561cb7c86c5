//! Use cases - operations built on the entity layer.
//!
//! `wrap` turns documents into live entities, `import` fills the core
//! compendium collections, and `license` resolves item licenses.

pub mod import;
pub mod license;
pub mod wrap;

pub use import::{ImportError, ImportLock, ImportPipeline, ImportReport, Invalidate};
pub use license::{LicenseLookup, LicenseLookupError};
pub use wrap::EntityWrapper;
