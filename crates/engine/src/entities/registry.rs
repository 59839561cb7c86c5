//! Scope-bound registries and per-type category handles.

use std::sync::Arc;

use beacon_domain::{resolve_scope, Document, DocumentId, EntryType, ScopeDescriptor};

use super::context::OpCtx;
use super::error::WrapError;
use super::factory::FactorySet;
use super::live::LiveEntity;
use crate::infrastructure::ports::{DocumentFilter, DocumentStore};

/// Entry point for resolving live entities within one scope.
#[derive(Clone)]
pub struct Registry {
    scope: ScopeDescriptor,
    store: Arc<dyn DocumentStore>,
    factories: Arc<FactorySet>,
}

impl Registry {
    pub fn new(
        scope: ScopeDescriptor,
        store: Arc<dyn DocumentStore>,
        factories: Arc<FactorySet>,
    ) -> Self {
        Self {
            scope,
            store,
            factories,
        }
    }

    pub fn scope(&self) -> &ScopeDescriptor {
        &self.scope
    }

    /// Same store and factories, different scope.
    pub fn for_scope(&self, scope: ScopeDescriptor) -> Registry {
        Self {
            scope,
            store: self.store.clone(),
            factories: self.factories.clone(),
        }
    }

    pub fn category(&self, entry_type: EntryType) -> Category {
        Category {
            registry: self.clone(),
            entry_type,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Filter that narrows a listing to candidates for this scope.
    ///
    /// Candidates are still checked against [`resolve_scope`].
    fn candidate_filter(&self, entry_type: EntryType) -> DocumentFilter {
        let filter = DocumentFilter::of_type(entry_type);
        match &self.scope {
            ScopeDescriptor::Game
            | ScopeDescriptor::Scene { .. }
            | ScopeDescriptor::SceneToken { .. } => filter.in_world(),
            ScopeDescriptor::GameActor { actor_id } => filter.in_world().owned_by(*actor_id),
            ScopeDescriptor::CompCore => filter,
            ScopeDescriptor::Comp { collection_id } => filter.in_collection(collection_id.clone()),
            ScopeDescriptor::CompActor {
                collection_id,
                actor_id,
            } => filter
                .in_collection(collection_id.clone())
                .owned_by(*actor_id),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// All entities of one entry type within a registry's scope.
#[derive(Clone, Debug)]
pub struct Category {
    registry: Registry,
    entry_type: EntryType,
}

impl Category {
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn scope(&self) -> &ScopeDescriptor {
        self.registry.scope()
    }

    /// Produce the live entity for `doc`, or reuse the one in `ctx`.
    ///
    /// Fails when the document has another type, lives in another scope,
    /// or its factory rejects the payload.
    pub async fn wrap_doc(&self, ctx: &OpCtx, doc: &Document) -> Result<Arc<LiveEntity>, WrapError> {
        if doc.entry_type != self.entry_type {
            return Err(WrapError::TypeMismatch {
                id: doc.id,
                expected: self.entry_type,
                actual: doc.entry_type,
            });
        }

        let scope = resolve_scope(doc)?;
        if &scope != self.scope() {
            return Err(WrapError::OutOfScope {
                id: doc.id,
                expected: self.scope().clone(),
                actual: scope,
            });
        }

        ctx.get_or_create(&scope, doc.id, || async {
            let factory = self.registry.factories.get(self.entry_type);
            let data = factory
                .build(&scope, doc)
                .map_err(|e| WrapError::Rejected {
                    id: doc.id,
                    entry_type: doc.entry_type,
                    reason: e.to_string(),
                })?;
            tracing::debug!(
                document_id = %doc.id,
                entry_type = %doc.entry_type,
                scope = %scope,
                "Built live entity"
            );
            Ok::<_, WrapError>(Arc::new(LiveEntity::from_parts(&self.registry, doc, data)))
        })
        .await
    }

    /// Fetch by id and wrap. The document must match this category.
    pub async fn get_live(&self, ctx: &OpCtx, id: DocumentId) -> Result<Arc<LiveEntity>, WrapError> {
        if let Some(entity) = ctx.get(self.scope(), id).await {
            if entity.entry_type() == self.entry_type {
                return Ok(entity);
            }
        }

        let doc = self
            .registry
            .store
            .get(id)
            .await?
            .ok_or(WrapError::NotFound { id })?;
        self.wrap_doc(ctx, &doc).await
    }

    /// Every document of this type in scope.
    ///
    /// Documents that fail to wrap are logged and left out.
    pub async fn list_live(&self, ctx: &OpCtx) -> Result<Vec<Arc<LiveEntity>>, WrapError> {
        let docs = self.candidates().await?;
        let mut live = Vec::with_capacity(docs.len());
        for doc in &docs {
            match self.wrap_doc(ctx, doc).await {
                Ok(entity) => live.push(entity),
                Err(e) => tracing::warn!(
                    document_id = %doc.id,
                    entry_type = %self.entry_type,
                    error = %e,
                    "Skipping document that failed to wrap"
                ),
            }
        }
        Ok(live)
    }

    /// First document in scope whose payload has `value` at `pointer`.
    pub async fn lookup_live(
        &self,
        ctx: &OpCtx,
        pointer: &str,
        value: &serde_json::Value,
    ) -> Result<Option<Arc<LiveEntity>>, WrapError> {
        let docs = self.candidates().await?;
        let Some(doc) = docs
            .iter()
            .find(|doc| doc.payload.pointer(pointer) == Some(value))
        else {
            return Ok(None);
        };
        self.wrap_doc(ctx, doc).await.map(Some)
    }

    async fn candidates(&self) -> Result<Vec<Document>, WrapError> {
        let filter = self.registry.candidate_filter(self.entry_type);
        let docs = self.registry.store.list(&filter).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| resolve_scope(doc).as_ref() == Ok(self.scope()))
            .collect())
    }
}
