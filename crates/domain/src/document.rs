//! Persisted documents as seen by the registry.
//!
//! The storage engine owns these records. The registry only reads the
//! identifying fields (type, parent, collection, token) and hands the
//! payload to an entity factory.

use serde::{Deserialize, Serialize};

use crate::{CollectionId, DocumentId, EntryType, Lid, SceneId, TokenId};

/// Placement of a token instance on a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub scene_id: SceneId,
    pub token_id: TokenId,
}

impl TokenRef {
    pub fn new(scene_id: SceneId, token_id: TokenId) -> Self {
        Self { scene_id, token_id }
    }
}

/// The actor that owns an embedded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub actor_id: DocumentId,
    /// Set when the owning actor is itself a token instance.
    pub token: Option<TokenRef>,
}

impl ParentRef {
    pub fn actor(actor_id: DocumentId) -> Self {
        Self {
            actor_id,
            token: None,
        }
    }

    pub fn token_actor(actor_id: DocumentId, token: TokenRef) -> Self {
        Self {
            actor_id,
            token: Some(token),
        }
    }

    pub fn is_token(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub entry_type: EntryType,
    pub name: String,
    pub payload: serde_json::Value,
    pub parent: Option<ParentRef>,
    pub collection: Option<CollectionId>,
    /// Present when this document is a token-instance actor.
    pub token: Option<TokenRef>,
}

impl Document {
    /// Logical id from the payload, if the payload carries one.
    pub fn lid(&self) -> Option<Lid> {
        self.payload
            .get("lid")
            .and_then(|v| v.as_str())
            .map(Lid::from)
    }

    pub fn is_token_instance(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_owned(&self) -> bool {
        self.parent.is_some()
    }

    pub fn owner(&self) -> Option<DocumentId> {
        self.parent.map(|p| p.actor_id)
    }
}

/// A document that has not been assigned an id by the storage engine yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub entry_type: EntryType,
    pub name: String,
    pub payload: serde_json::Value,
    pub parent: Option<ParentRef>,
    pub collection: Option<CollectionId>,
    pub token: Option<TokenRef>,
}

impl NewDocument {
    /// A world-level document with no parent, collection or token.
    pub fn new(entry_type: EntryType, name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            entry_type,
            name: name.into(),
            payload,
            parent: None,
            collection: None,
            token: None,
        }
    }

    pub fn in_collection(mut self, collection: CollectionId) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn owned_by(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn as_token(mut self, token: TokenRef) -> Self {
        self.token = Some(token);
        self
    }

    /// Assign an id, producing the stored form.
    pub fn into_document(self, id: DocumentId) -> Document {
        Document {
            id,
            entry_type: self.entry_type,
            name: self.name,
            payload: self.payload,
            parent: self.parent,
            collection: self.collection,
            token: self.token,
        }
    }
}
