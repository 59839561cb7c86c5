//! Beacon domain types.
//!
//! Pure data shared by the registry engine: document identity, the entry
//! type catalogue, storage scopes and the scope resolver, and the content
//! pack model consumed by the import pipeline. Nothing here performs I/O.

pub mod collection;
pub mod content_pack;
pub mod document;
pub mod entry_type;
pub mod error;
pub mod ids;
pub mod scope;

pub use collection::{
    core_collection_entry_type, core_collection_id, is_core_collection_name,
    CORE_COLLECTION_SCOPE,
};
pub use content_pack::{ContentPack, PackEntry};
pub use document::{Document, NewDocument, ParentRef, TokenRef};
pub use entry_type::{DocumentKind, EntryType};
pub use error::DomainError;
pub use ids::{CollectionId, DocumentId, Lid, SceneId, TokenId};
pub use scope::{inventory_scope, resolve_scope, ScopeDescriptor, ScopeError};
