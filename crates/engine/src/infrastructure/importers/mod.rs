//! Content importers for external data sources.

mod content_pack;

pub use content_pack::{load_content_pack, PackLoadError};
