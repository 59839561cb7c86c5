//! Live entities: normalized, in-memory views of persisted documents.

use std::sync::Arc;

use beacon_domain::{
    inventory_scope, resolve_scope, Document, DocumentId, EntryType, Lid, ScopeDescriptor,
};
use serde_json::Value;
use tokio::sync::RwLock;

use super::context::OpCtx;
use super::error::WrapError;
use super::registry::Registry;
use crate::infrastructure::ports::RepoError;

/// A document's data as produced by its factory.
///
/// Edits made with [`LiveEntity::update`] stay in memory until
/// [`LiveEntity::commit`] writes them back to storage.
pub struct LiveEntity {
    id: DocumentId,
    entry_type: EntryType,
    lid: Lid,
    name: String,
    scope: ScopeDescriptor,
    owner: Option<DocumentId>,
    /// Scope of this actor's embedded items.
    inventory: Option<ScopeDescriptor>,
    data: RwLock<Value>,
    registry: Registry,
}

impl LiveEntity {
    pub(crate) fn from_parts(registry: &Registry, doc: &Document, data: Value) -> Self {
        Self {
            id: doc.id,
            entry_type: doc.entry_type,
            lid: doc.lid().unwrap_or_else(|| Lid::new("")),
            name: doc.name.clone(),
            scope: registry.scope().clone(),
            owner: doc.owner(),
            inventory: inventory_scope(doc),
            data: RwLock::new(data),
            registry: registry.clone(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn lid(&self) -> &Lid {
        &self.lid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &ScopeDescriptor {
        &self.scope
    }

    /// Owning actor, for embedded items.
    pub fn owner(&self) -> Option<DocumentId> {
        self.owner
    }

    pub fn inventory_scope(&self) -> Option<&ScopeDescriptor> {
        self.inventory.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Snapshot of the current data.
    pub async fn data(&self) -> Value {
        self.data.read().await.clone()
    }

    /// Read one field by JSON pointer, e.g. `/license`.
    pub async fn field(&self, pointer: &str) -> Option<Value> {
        self.data.read().await.pointer(pointer).cloned()
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut data = self.data.write().await;
        f(&mut data)
    }

    /// Write the in-memory data back to the document.
    pub async fn commit(&self) -> Result<Document, RepoError> {
        let data = self.data().await;
        let doc = self.registry.store().update(self.id, data).await?;
        tracing::debug!(document_id = %self.id, entry_type = %self.entry_type, "Committed live entity");
        Ok(doc)
    }

    /// Resolve the `{ "id", "type" }` reference stored at `pointer`.
    ///
    /// `Ok(None)` when the field is absent or null. The referenced document
    /// must live in this entity's scope or, for actors, in its inventory.
    pub async fn related(
        &self,
        ctx: &OpCtx,
        pointer: &str,
    ) -> Result<Option<Arc<LiveEntity>>, WrapError> {
        let Some(reference) = self.field(pointer).await else {
            return Ok(None);
        };
        if reference.is_null() {
            return Ok(None);
        }
        let (id, entry_type) = parse_reference(pointer, &reference)?;
        self.resolve_reference(ctx, id, entry_type).await.map(Some)
    }

    /// Resolve an array of references. Entries that fail to resolve are
    /// logged and skipped.
    pub async fn related_list(
        &self,
        ctx: &OpCtx,
        pointer: &str,
    ) -> Result<Vec<Arc<LiveEntity>>, WrapError> {
        let Some(value) = self.field(pointer).await else {
            return Ok(Vec::new());
        };
        let items = match value {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            _ => return Err(WrapError::bad_reference(pointer, "expected an array")),
        };

        let mut resolved = Vec::with_capacity(items.len());
        for (idx, reference) in items.iter().enumerate() {
            let item_pointer = format!("{}/{}", pointer, idx);
            let outcome = match parse_reference(&item_pointer, reference) {
                Ok((id, entry_type)) => self.resolve_reference(ctx, id, entry_type).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(entity) => resolved.push(entity),
                Err(e) => tracing::warn!(
                    document_id = %self.id,
                    pointer = %item_pointer,
                    error = %e,
                    "Skipping unresolvable reference"
                ),
            }
        }
        Ok(resolved)
    }

    async fn resolve_reference(
        &self,
        ctx: &OpCtx,
        id: DocumentId,
        entry_type: EntryType,
    ) -> Result<Arc<LiveEntity>, WrapError> {
        for scope in std::iter::once(&self.scope).chain(self.inventory.as_ref()) {
            if let Some(entity) = ctx.get(scope, id).await {
                return Ok(entity);
            }
        }

        let doc = self
            .registry
            .store()
            .get(id)
            .await?
            .ok_or(WrapError::NotFound { id })?;
        let scope = resolve_scope(&doc)?;
        let allowed = scope == self.scope || Some(&scope) == self.inventory.as_ref();
        if !allowed {
            return Err(WrapError::OutOfScope {
                id,
                expected: self.scope.clone(),
                actual: scope,
            });
        }

        self.registry
            .for_scope(scope)
            .category(entry_type)
            .wrap_doc(ctx, &doc)
            .await
    }
}

fn parse_reference(pointer: &str, value: &Value) -> Result<(DocumentId, EntryType), WrapError> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| WrapError::bad_reference(pointer, "missing string id"))?
        .parse::<DocumentId>()
        .map_err(|e| WrapError::bad_reference(pointer, e.to_string()))?;
    let entry_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| WrapError::bad_reference(pointer, "missing string type"))?
        .parse::<EntryType>()
        .map_err(|e| WrapError::bad_reference(pointer, e.to_string()))?;
    Ok((id, entry_type))
}

impl std::fmt::Debug for LiveEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEntity")
            .field("id", &self.id)
            .field("entry_type", &self.entry_type)
            .field("lid", &self.lid)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
