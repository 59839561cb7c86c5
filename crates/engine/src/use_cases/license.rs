//! Finding the license an item belongs to.
//!
//! Items name their license by key. A pilot may carry a custom license in
//! their inventory, so the pilot is checked first; otherwise the world and
//! then the core compendium are searched, with results cached briefly since
//! lookups tend to come in bursts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_domain::{DocumentId, EntryType, ScopeDescriptor};
use serde_json::Value;
use thiserror::Error;

use crate::entities::{FactorySet, LiveEntity, OpCtx, Registry, WrapError};
use crate::infrastructure::cache::FetchCache;
use crate::infrastructure::ports::{ClockPort, DocumentStore};
use crate::use_cases::import::Invalidate;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LicenseLookupError {
    #[error("Pilot reference of {mech} points at a {actual}")]
    NotAPilot { mech: DocumentId, actual: EntryType },

    #[error(transparent)]
    Wrap(#[from] WrapError),
}

pub struct LicenseLookup {
    registry: Registry,
    cache: FetchCache<String, Option<Arc<LiveEntity>>>,
}

impl LicenseLookup {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        factories: Arc<FactorySet>,
        clock: Arc<dyn ClockPort>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry: Registry::new(ScopeDescriptor::Game, store, factories),
            cache: FetchCache::new(Some(ttl), clock),
        }
    }

    /// License whose key matches the item's `license` field.
    ///
    /// With an actor, its pilot's inventory wins over world and compendium
    /// licenses. `Ok(None)` when the item names no license or none matches.
    pub async fn find_license_for(
        &self,
        item: &LiveEntity,
        actor: Option<&LiveEntity>,
        ctx: &OpCtx,
    ) -> Result<Option<Arc<LiveEntity>>, LicenseLookupError> {
        let Some(key) = license_key(item).await else {
            return Ok(None);
        };

        if let Some(actor) = actor {
            if let Some(found) = self.search_pilot(actor, &key, ctx).await? {
                return Ok(Some(found));
            }
        }

        Ok(self.shared_license(key).await?)
    }

    async fn search_pilot(
        &self,
        actor: &LiveEntity,
        key: &str,
        ctx: &OpCtx,
    ) -> Result<Option<Arc<LiveEntity>>, LicenseLookupError> {
        let pilot = match actor.entry_type() {
            EntryType::Pilot => None,
            EntryType::Mech => match actor.related(ctx, "/pilot").await {
                Ok(Some(pilot)) if pilot.entry_type() == EntryType::Pilot => Some(pilot),
                Ok(Some(other)) => {
                    return Err(LicenseLookupError::NotAPilot {
                        mech: actor.id(),
                        actual: other.entry_type(),
                    })
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::warn!(mech_id = %actor.id(), error = %e, "Could not resolve mech pilot");
                    return Ok(None);
                }
            },
            _ => return Ok(None),
        };
        let pilot_ref = pilot.as_deref().unwrap_or(actor);

        let Some(inventory) = pilot_ref.inventory_scope() else {
            return Ok(None);
        };
        let found = pilot_ref
            .registry()
            .for_scope(inventory.clone())
            .category(EntryType::License)
            .lookup_live(ctx, "/key", &Value::String(key.to_string()))
            .await?;
        if found.is_some() {
            tracing::debug!(pilot_id = %pilot_ref.id(), license = key, "License found in pilot inventory");
        }
        Ok(found)
    }

    async fn shared_license(&self, key: String) -> Result<Option<Arc<LiveEntity>>, WrapError> {
        let registry = self.registry.clone();
        self.cache
            .fetch(key, |key| async move {
                let ctx = OpCtx::new();
                let wanted = Value::String(key.clone());
                for scope in [ScopeDescriptor::Game, ScopeDescriptor::CompCore] {
                    let found = registry
                        .for_scope(scope)
                        .category(EntryType::License)
                        .lookup_live(&ctx, "/key", &wanted)
                        .await?;
                    if found.is_some() {
                        return Ok::<_, WrapError>(found);
                    }
                }
                tracing::info!(
                    license = %key,
                    "License not found in world or core compendium; secondary compendiums are not searched"
                );
                Ok(None)
            })
            .await
    }

    pub async fn invalidate(&self) {
        self.cache.flush_all().await;
    }
}

#[async_trait]
impl Invalidate for LicenseLookup {
    async fn invalidate(&self) {
        LicenseLookup::invalidate(self).await;
    }
}

async fn license_key(item: &LiveEntity) -> Option<String> {
    match item.field("/license").await {
        Some(Value::String(key)) if !key.is_empty() => Some(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use crate::infrastructure::ports::CollectionSpec;
    use beacon_domain::{core_collection_id, Document, NewDocument, ParentRef};
    use chrono::Utc;
    use serde_json::json;

    struct World {
        store: Arc<InMemoryDocumentStore>,
        clock: Arc<ManualClock>,
        lookup: LicenseLookup,
        factories: Arc<FactorySet>,
    }

    async fn world() -> World {
        let store = Arc::new(InMemoryDocumentStore::default());
        store
            .ensure_collection(CollectionSpec {
                id: core_collection_id(EntryType::License),
                kind: EntryType::License.document_kind(),
                label: EntryType::License.friendly_name_plural().to_string(),
                locked: false,
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let factories = Arc::new(FactorySet::standard());
        let lookup = LicenseLookup::new(
            store.clone(),
            factories.clone(),
            clock.clone(),
            Duration::from_secs(60),
        );
        World {
            store,
            clock,
            lookup,
            factories,
        }
    }

    impl World {
        async fn create(&self, doc: NewDocument) -> Document {
            self.store.create(vec![doc]).await.unwrap().remove(0)
        }

        async fn live(&self, doc: &Document, ctx: &OpCtx) -> Arc<LiveEntity> {
            Registry::new(
                beacon_domain::resolve_scope(doc).unwrap(),
                self.store.clone(),
                self.factories.clone(),
            )
            .category(doc.entry_type)
            .wrap_doc(ctx, doc)
            .await
            .unwrap()
        }

        async fn sunzi_weapon(&self, ctx: &OpCtx) -> Arc<LiveEntity> {
            let doc = self
                .create(NewDocument::new(
                    EntryType::MechWeapon,
                    "Tachyon Shotgun",
                    json!({ "lid": "mw_tachyon_shotgun", "license": "SUNZI" }),
                ))
                .await;
            self.live(&doc, ctx).await
        }
    }

    fn license(lid: &str, key: &str) -> NewDocument {
        NewDocument::new(EntryType::License, key, json!({ "lid": lid, "key": key }))
    }

    #[tokio::test]
    async fn item_without_license_has_none() {
        let world = world().await;
        let ctx = OpCtx::new();
        let doc = world
            .create(NewDocument::new(EntryType::PilotGear, "Rope", json!({ "lid": "pg_rope" })))
            .await;
        let item = world.live(&doc, &ctx).await;

        assert!(world.lookup.find_license_for(&item, None, &ctx).await.unwrap().is_none());
        assert!(world.lookup.cache.is_empty().await);
    }

    #[tokio::test]
    async fn world_license_wins_over_core() {
        let world = world().await;
        world
            .create(license("lic_sunzi", "SUNZI").in_collection(core_collection_id(EntryType::License)))
            .await;
        let homebrew = world.create(license("lic_sunzi_hb", "SUNZI")).await;
        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;

        let found = world.lookup.find_license_for(&item, None, &ctx).await.unwrap().unwrap();
        assert_eq!(found.id(), homebrew.id);
        assert_eq!(found.scope(), &ScopeDescriptor::Game);
    }

    #[tokio::test]
    async fn falls_back_to_core_compendium() {
        let world = world().await;
        let core = world
            .create(license("lic_sunzi", "SUNZI").in_collection(core_collection_id(EntryType::License)))
            .await;
        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;

        let found = world.lookup.find_license_for(&item, None, &ctx).await.unwrap().unwrap();
        assert_eq!(found.id(), core.id);
        assert_eq!(found.scope(), &ScopeDescriptor::CompCore);
    }

    #[tokio::test]
    async fn mech_pilot_inventory_is_searched_first() {
        let world = world().await;
        world
            .create(license("lic_sunzi", "SUNZI").in_collection(core_collection_id(EntryType::License)))
            .await;
        let pilot = world
            .create(NewDocument::new(EntryType::Pilot, "Lt. Vasquez", json!({ "lid": "" })))
            .await;
        let custom = world
            .create(license("lic_sunzi_custom", "SUNZI").owned_by(ParentRef::actor(pilot.id)))
            .await;
        let mech = world
            .create(NewDocument::new(
                EntryType::Mech,
                "Long Shot",
                json!({ "lid": "", "pilot": { "id": pilot.id.to_string(), "type": "pilot" } }),
            ))
            .await;

        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;
        let mech = world.live(&mech, &ctx).await;
        let found = world
            .lookup
            .find_license_for(&item, Some(&mech), &ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id(), custom.id);
        assert_eq!(found.scope(), &ScopeDescriptor::GameActor { actor_id: pilot.id });
    }

    #[tokio::test]
    async fn pilot_actor_searches_own_inventory() {
        let world = world().await;
        let pilot = world
            .create(NewDocument::new(EntryType::Pilot, "Lt. Vasquez", json!({ "lid": "" })))
            .await;
        let custom = world
            .create(license("lic_sunzi_custom", "SUNZI").owned_by(ParentRef::actor(pilot.id)))
            .await;

        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;
        let pilot = world.live(&pilot, &ctx).await;
        let found = world
            .lookup
            .find_license_for(&item, Some(&pilot), &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), custom.id);
    }

    #[tokio::test]
    async fn pilot_reference_to_non_pilot_is_an_error() {
        let world = world().await;
        let other = world
            .create(NewDocument::new(EntryType::Npc, "Ronin", json!({ "lid": "" })))
            .await;
        let mech = world
            .create(NewDocument::new(
                EntryType::Mech,
                "Long Shot",
                json!({ "lid": "", "pilot": { "id": other.id.to_string(), "type": "npc" } }),
            ))
            .await;

        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;
        let mech = world.live(&mech, &ctx).await;
        let err = world
            .lookup
            .find_license_for(&item, Some(&mech), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseLookupError::NotAPilot { actual: EntryType::Npc, .. }));
    }

    #[tokio::test]
    async fn shared_results_are_cached_until_expiry_or_invalidation() {
        let world = world().await;
        let ctx = OpCtx::new();
        let item = world.sunzi_weapon(&ctx).await;

        assert!(world.lookup.find_license_for(&item, None, &ctx).await.unwrap().is_none());

        let created = world.create(license("lic_sunzi", "SUNZI")).await;
        assert!(world.lookup.find_license_for(&item, None, &ctx).await.unwrap().is_none());

        world.clock.advance(chrono::Duration::seconds(61));
        let found = world.lookup.find_license_for(&item, None, &ctx).await.unwrap().unwrap();
        assert_eq!(found.id(), created.id);

        world.store.delete(vec![created.id]).await.unwrap();
        assert!(world.lookup.find_license_for(&item, None, &ctx).await.unwrap().is_some());
        Invalidate::invalidate(&world.lookup).await;
        assert!(world.lookup.find_license_for(&item, None, &ctx).await.unwrap().is_none());
    }
}
