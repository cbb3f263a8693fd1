use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;

use crate::core::error::{Result, SoftDeleteError};
use crate::core::value::{EntityId, EntityRef, FieldValue};
use crate::session::{ChangeTracker, PersistenceDriver};

/// Unit-of-work notifications recorded by the in-memory driver, inspectable
/// the same way a host would replay them into its change sets.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedChange {
    FieldUpdated {
        entity: EntityRef,
        property: String,
        old: FieldValue,
        new: FieldValue,
    },
    LinkRemoved {
        owner: EntityRef,
        property: String,
        peer: EntityRef,
    },
}

impl TrackedChange {
    pub fn entity_name(&self) -> &str {
        match self {
            Self::FieldUpdated { entity, .. } => &entity.entity,
            Self::LinkRemoved { owner, .. } => &owner.entity,
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Self::FieldUpdated { property, .. } => property,
            Self::LinkRemoved { property, .. } => property,
        }
    }
}

#[derive(Debug, Default)]
struct EntityStore {
    /// Insertion order; scans and streams follow it so results are
    /// deterministic.
    order: Vec<EntityId>,
    rows: HashMap<EntityId, BTreeMap<String, FieldValue>>,
}

type LinkKey = (String, String);

/// Reference driver backing tests and default wirings: records in locked
/// per-entity stores, join links as ordered owner/peer pairs, notifications
/// in a command log.
///
/// Absent fields read as null; queries against entities that were never
/// touched return empty sets rather than failing, like a schema whose tables
/// exist but hold no rows.
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    stores: RwLock<HashMap<String, EntityStore>>,
    links: RwLock<HashMap<LinkKey, Vec<(EntityId, EntityId)>>>,
    changes: Mutex<Vec<TrackedChange>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, creating the store on first touch, and returns its
    /// generated id.
    pub async fn insert(&self, entity: &str, fields: Vec<(&str, FieldValue)>) -> EntityId {
        let id = EntityId::new();
        let mut stores = self.stores.write().await;
        let store = stores.entry(entity.to_string()).or_default();
        store.order.push(id);
        store.rows.insert(
            id,
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        );
        id
    }

    pub async fn field(&self, entity: &str, id: &EntityId, property: &str) -> Result<FieldValue> {
        let stores = self.stores.read().await;
        let store = stores
            .get(entity)
            .ok_or_else(|| SoftDeleteError::Driver(format!("no store for entity '{entity}'")))?;
        let row = store
            .rows
            .get(id)
            .ok_or_else(|| SoftDeleteError::Driver(format!("no row {id} in '{entity}'")))?;
        Ok(row.get(property).cloned().unwrap_or(FieldValue::Null))
    }

    pub async fn set_field(
        &self,
        entity: &str,
        id: &EntityId,
        property: &str,
        value: FieldValue,
    ) -> Result<()> {
        let mut stores = self.stores.write().await;
        let store = stores
            .get_mut(entity)
            .ok_or_else(|| SoftDeleteError::Driver(format!("no store for entity '{entity}'")))?;
        let row = store
            .rows
            .get_mut(id)
            .ok_or_else(|| SoftDeleteError::Driver(format!("no row {id} in '{entity}'")))?;
        row.insert(property.to_string(), value);
        Ok(())
    }

    pub async fn ids(&self, entity: &str) -> Vec<EntityId> {
        let stores = self.stores.read().await;
        stores
            .get(entity)
            .map(|store| store.order.clone())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, entity: &str) -> usize {
        let stores = self.stores.read().await;
        stores.get(entity).map(|store| store.rows.len()).unwrap_or(0)
    }

    /// Adds one join row to the owning-side collection.
    pub async fn add_link(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
        peer: &EntityId,
    ) {
        let mut links = self.links.write().await;
        links
            .entry((owner_entity.to_string(), owner_property.to_string()))
            .or_default()
            .push((*owner, *peer));
    }

    pub async fn link_count(&self, owner_entity: &str, owner_property: &str) -> usize {
        let links = self.links.read().await;
        links
            .get(&(owner_entity.to_string(), owner_property.to_string()))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Peers currently linked from one owner's collection.
    pub async fn links_of(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
    ) -> Vec<EntityId> {
        let links = self.links.read().await;
        links
            .get(&(owner_entity.to_string(), owner_property.to_string()))
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|(o, _)| o == owner)
                    .map(|(_, p)| *p)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every notification recorded so far, in order.
    pub fn tracked_changes(&self) -> Result<Vec<TrackedChange>> {
        Ok(self.changes.lock()?.clone())
    }

    pub fn clear_tracked_changes(&self) -> Result<()> {
        self.changes.lock()?.clear();
        Ok(())
    }
}

impl ChangeTracker for InMemoryDriver {
    fn notify_field_changed(
        &self,
        entity: &EntityRef,
        property: &str,
        old: FieldValue,
        new: FieldValue,
    ) -> Result<()> {
        self.changes.lock()?.push(TrackedChange::FieldUpdated {
            entity: entity.clone(),
            property: property.to_string(),
            old,
            new,
        });
        Ok(())
    }

    fn notify_link_removed(
        &self,
        owner: &EntityRef,
        property: &str,
        peer: &EntityRef,
    ) -> Result<()> {
        self.changes.lock()?.push(TrackedChange::LinkRemoved {
            owner: owner.clone(),
            property: property.to_string(),
            peer: peer.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl PersistenceDriver for InMemoryDriver {
    async fn referencing_ids(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
    ) -> Result<Vec<EntityId>> {
        let stores = self.stores.read().await;
        let Some(store) = stores.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(store
            .order
            .iter()
            .filter(|id| {
                store
                    .rows
                    .get(id)
                    .and_then(|row| row.get(property))
                    .and_then(|value| value.as_reference())
                    == Some(target)
            })
            .copied()
            .collect())
    }

    async fn clear_references(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
    ) -> Result<u64> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(entity) else {
            return Ok(0);
        };
        let mut updated = 0u64;
        for row in store.rows.values_mut() {
            if row.get(property).and_then(|value| value.as_reference()) == Some(target) {
                row.insert(property.to_string(), FieldValue::Null);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_deleted_where_references(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
        deleted_field: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(entity) else {
            return Ok(0);
        };
        let mut stamped = 0u64;
        for row in store.rows.values_mut() {
            let references =
                row.get(property).and_then(|value| value.as_reference()) == Some(target);
            let live = row.get(deleted_field).is_none_or(FieldValue::is_null);
            if references && live {
                row.insert(deleted_field.to_string(), FieldValue::Timestamp(deleted_at));
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    async fn stream_ids_marked(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
        deleted_field: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<BoxStream<'static, Result<EntityId>>> {
        // Ids are snapshot at call time; only identifiers are materialized,
        // never rows.
        let stores = self.stores.read().await;
        let ids: Vec<Result<EntityId>> = match stores.get(entity) {
            Some(store) => store
                .order
                .iter()
                .filter(|id| {
                    store.rows.get(id).is_some_and(|row| {
                        row.get(property).and_then(|value| value.as_reference()) == Some(target)
                            && row.get(deleted_field).and_then(|value| value.as_timestamp())
                                == Some(deleted_at)
                    })
                })
                .map(|id| Ok(*id))
                .collect(),
            None => Vec::new(),
        };
        Ok(stream::iter(ids).boxed())
    }

    async fn linked_owner_ids(
        &self,
        owner_entity: &str,
        owner_property: &str,
        peer: &EntityId,
    ) -> Result<Vec<EntityId>> {
        let links = self.links.read().await;
        Ok(links
            .get(&(owner_entity.to_string(), owner_property.to_string()))
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|(_, p)| p == peer)
                    .map(|(o, _)| *o)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn linked_peer_ids(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
    ) -> Result<Vec<EntityId>> {
        let links = self.links.read().await;
        Ok(links
            .get(&(owner_entity.to_string(), owner_property.to_string()))
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|(o, _)| o == owner)
                    .map(|(_, p)| *p)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove_link(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
        peer: &EntityId,
    ) -> Result<bool> {
        let mut links = self.links.write().await;
        let Some(pairs) = links.get_mut(&(owner_entity.to_string(), owner_property.to_string()))
        else {
            return Ok(false);
        };
        let before = pairs.len();
        pairs.retain(|(o, p)| !(o == owner && p == peer));
        Ok(pairs.len() < before)
    }
}
