use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::core::error::Result;
use crate::core::value::{EntityId, EntityRef, FieldValue};

/// Unit-of-work reconciliation surface.
///
/// Every bulk mutation the executor issues bypasses the host's in-memory
/// change tracking; these notifications keep the two in sync. A host that
/// ignores them serves stale reads for the rest of the unit of work.
pub trait ChangeTracker: Send + Sync {
    /// Records an out-of-band field transition on one entity.
    fn notify_field_changed(
        &self,
        entity: &EntityRef,
        property: &str,
        old: FieldValue,
        new: FieldValue,
    ) -> Result<()>;

    /// Records an out-of-band join-link removal from the collection at
    /// `owner.property`, so the host recomputes that collection's change set.
    fn notify_link_removed(&self, owner: &EntityRef, property: &str, peer: &EntityRef)
    -> Result<()>;
}

/// Bulk-mutation and identifier-query surface of the host persistence layer.
///
/// Everything is set-based or identifier-only: the executor never loads full
/// objects, so peer sets bounded only by the database stay out of memory.
#[async_trait]
pub trait PersistenceDriver: ChangeTracker {
    /// Ids of `entity` rows whose to-one `property` currently references
    /// `target`.
    async fn referencing_ids(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
    ) -> Result<Vec<EntityId>>;

    /// One bulk update setting `property` to null wherever it references
    /// `target`. Returns the affected row count.
    async fn clear_references(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
    ) -> Result<u64>;

    /// One bulk update stamping `deleted_field = deleted_at` on `entity` rows
    /// that reference `target` and whose `deleted_field` is still null. The
    /// null guard is what makes repeated cascades idempotent.
    async fn mark_deleted_where_references(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
        deleted_field: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Cursor over ids of `entity` rows referencing `target` whose
    /// `deleted_field` equals `deleted_at` exactly: the rows the preceding
    /// bulk update just stamped, and nothing deleted earlier.
    async fn stream_ids_marked(
        &self,
        entity: &str,
        property: &str,
        target: &EntityId,
        deleted_field: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<BoxStream<'static, Result<EntityId>>>;

    /// Owning-side ids whose `owner_property` collection contains `peer`.
    async fn linked_owner_ids(
        &self,
        owner_entity: &str,
        owner_property: &str,
        peer: &EntityId,
    ) -> Result<Vec<EntityId>>;

    /// Contents of one owning-side collection.
    async fn linked_peer_ids(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
    ) -> Result<Vec<EntityId>>;

    /// Deletes one join row; reports whether it existed.
    async fn remove_link(
        &self,
        owner_entity: &str,
        owner_property: &str,
        owner: &EntityId,
        peer: &EntityId,
    ) -> Result<bool>;
}
