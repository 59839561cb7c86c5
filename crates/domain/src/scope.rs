//! Storage scopes and the scope resolver.
//!
//! A document's canonical data lives in exactly one scope. The scope is
//! derived from the document's own parent, collection and token fields;
//! callers never get to suggest one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CollectionId, Document, DocumentId, SceneId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "src", rename_all = "snake_case")]
pub enum ScopeDescriptor {
    /// World-level documents outside any compendium.
    Game,
    /// Inventory of a world actor.
    GameActor { actor_id: DocumentId },
    /// Token-instance actors placed on a scene.
    Scene { scene_id: SceneId },
    /// Inventory of a token-instance actor.
    SceneToken { scene_id: SceneId, token_id: TokenId },
    /// The shared core compendium collections.
    CompCore,
    /// A secondary compendium.
    Comp { collection_id: CollectionId },
    /// Inventory of an actor stored in a compendium.
    CompActor {
        collection_id: CollectionId,
        actor_id: DocumentId,
    },
}

impl ScopeDescriptor {
    /// Inventory scopes hold items owned by a single actor.
    pub fn is_inventory(&self) -> bool {
        matches!(
            self,
            Self::GameActor { .. } | Self::SceneToken { .. } | Self::CompActor { .. }
        )
    }

    pub fn src(&self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::GameActor { .. } => "game_actor",
            Self::Scene { .. } => "scene",
            Self::SceneToken { .. } => "scene_token",
            Self::CompCore => "comp_core",
            Self::Comp { .. } => "comp",
            Self::CompActor { .. } => "comp_actor",
        }
    }
}

impl std::fmt::Display for ScopeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Game | Self::CompCore => write!(f, "{}", self.src()),
            Self::GameActor { actor_id } => write!(f, "game_actor({})", actor_id),
            Self::Scene { scene_id } => write!(f, "scene({})", scene_id),
            Self::SceneToken { scene_id, token_id } => {
                write!(f, "scene_token({}, {})", scene_id, token_id)
            }
            Self::Comp { collection_id } => write!(f, "comp({})", collection_id),
            Self::CompActor {
                collection_id,
                actor_id,
            } => write!(f, "comp_actor({}, {})", collection_id, actor_id),
        }
    }
}

/// A document whose shape matches no known scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("{entry_type} actor {id} cannot be owned by another document")]
    OwnedActor { id: DocumentId, entry_type: String },

    #[error("item {id} is flagged as a token instance")]
    TokenItem { id: DocumentId },

    #[error("document {id} belongs to a collection with an empty name")]
    EmptyCollection { id: DocumentId },
}

/// Compute the storage scope of a document.
///
/// Guards run in a fixed priority order and the first match wins:
///
/// Items
/// 1. owned + in a compendium: `comp_actor`
/// 2. owned + parent is a token: `scene_token`
/// 3. owned: `game_actor`
/// 4. unowned + core compendium: `comp_core`
/// 5. unowned + other compendium: `comp`
/// 6. otherwise: `game`
///
/// Actors (never an inventory scope)
/// 1. token instance: `scene`
/// 2. core compendium: `comp_core`
/// 3. other compendium: `comp`
/// 4. otherwise: `game`
pub fn resolve_scope(doc: &Document) -> Result<ScopeDescriptor, ScopeError> {
    if let Some(collection) = &doc.collection {
        if collection.is_empty() {
            return Err(ScopeError::EmptyCollection { id: doc.id });
        }
    }

    if doc.entry_type.is_actor() {
        resolve_actor_scope(doc)
    } else {
        resolve_item_scope(doc)
    }
}

fn resolve_actor_scope(doc: &Document) -> Result<ScopeDescriptor, ScopeError> {
    if doc.parent.is_some() {
        return Err(ScopeError::OwnedActor {
            id: doc.id,
            entry_type: doc.entry_type.to_string(),
        });
    }

    if let Some(token) = doc.token {
        return Ok(ScopeDescriptor::Scene {
            scene_id: token.scene_id,
        });
    }

    Ok(unowned_scope(doc.collection.as_ref()))
}

fn resolve_item_scope(doc: &Document) -> Result<ScopeDescriptor, ScopeError> {
    if doc.token.is_some() {
        return Err(ScopeError::TokenItem { id: doc.id });
    }

    let Some(parent) = doc.parent else {
        return Ok(unowned_scope(doc.collection.as_ref()));
    };

    if let Some(collection) = &doc.collection {
        return Ok(ScopeDescriptor::CompActor {
            collection_id: collection.clone(),
            actor_id: parent.actor_id,
        });
    }

    if let Some(token) = parent.token {
        return Ok(ScopeDescriptor::SceneToken {
            scene_id: token.scene_id,
            token_id: token.token_id,
        });
    }

    Ok(ScopeDescriptor::GameActor {
        actor_id: parent.actor_id,
    })
}

/// Scope holding the inventory of an actor document.
///
/// Mirrors the owned-item guards of [`resolve_scope`]: an item embedded in
/// `actor` resolves to exactly this scope. `None` for item documents.
pub fn inventory_scope(actor: &Document) -> Option<ScopeDescriptor> {
    if !actor.entry_type.is_actor() {
        return None;
    }
    if let Some(collection) = &actor.collection {
        return Some(ScopeDescriptor::CompActor {
            collection_id: collection.clone(),
            actor_id: actor.id,
        });
    }
    if let Some(token) = actor.token {
        return Some(ScopeDescriptor::SceneToken {
            scene_id: token.scene_id,
            token_id: token.token_id,
        });
    }
    Some(ScopeDescriptor::GameActor { actor_id: actor.id })
}

fn unowned_scope(collection: Option<&CollectionId>) -> ScopeDescriptor {
    match collection {
        Some(c) if c.is_core() => ScopeDescriptor::CompCore,
        Some(c) => ScopeDescriptor::Comp {
            collection_id: c.clone(),
        },
        None => ScopeDescriptor::Game,
    }
}
