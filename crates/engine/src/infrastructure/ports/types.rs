//! Data types shared by the storage port and its callers.

use beacon_domain::{CollectionId, Document, DocumentId, DocumentKind, EntryType};
use serde::{Deserialize, Serialize};

/// Which collections a listing covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollectionFilter {
    #[default]
    Any,
    /// Documents outside every compendium.
    World,
    Named(CollectionId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub entry_type: Option<EntryType>,
    pub collection: CollectionFilter,
    /// Only documents embedded in this actor.
    pub owner: Option<DocumentId>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(entry_type: EntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Self::default()
        }
    }

    pub fn in_collection(mut self, collection: CollectionId) -> Self {
        self.collection = CollectionFilter::Named(collection);
        self
    }

    pub fn in_world(mut self) -> Self {
        self.collection = CollectionFilter::World;
        self
    }

    pub fn owned_by(mut self, owner: DocumentId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(t) = self.entry_type {
            if doc.entry_type != t {
                return false;
            }
        }
        if let Some(owner) = self.owner {
            if doc.owner() != Some(owner) {
                return false;
            }
        }
        match &self.collection {
            CollectionFilter::Any => true,
            CollectionFilter::World => doc.collection.is_none(),
            CollectionFilter::Named(id) => doc.collection.as_ref() == Some(id),
        }
    }
}

/// Requested shape of a collection, used when creating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub id: CollectionId,
    pub kind: DocumentKind,
    pub label: String,
    /// Lock state for a newly created collection. Ignored if it already exists.
    pub locked: bool,
}

/// Partial collection settings. `None` leaves the setting unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionConfig {
    pub locked: Option<bool>,
    pub private: Option<bool>,
}

impl CollectionConfig {
    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            private: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub kind: DocumentKind,
    pub label: String,
    pub locked: bool,
    pub private: bool,
}

/// Change published by the storage engine after a write is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Created(Document),
    Updated(Document),
    Deleted {
        id: DocumentId,
        collection: Option<CollectionId>,
    },
}

impl StoreEvent {
    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::Created(doc) | Self::Updated(doc) => doc.id,
            Self::Deleted { id, .. } => *id,
        }
    }
}
