use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{Level, event};

use crate::core::error::{Result, SoftDeleteError};
use crate::core::value::{EntityRef, FieldValue};
use crate::event::SoftDeleteEvent;
use crate::metadata::ResolutionRule;

use super::executor::CascadeExecutor;

impl CascadeExecutor {
    /// Soft-deletes every live peer still referencing the deleted entity.
    ///
    /// One guarded bulk update stamps the timestamp; peers deleted in an
    /// earlier invocation carry a different instant and match neither the
    /// update nor the id stream, which is what makes re-deletion idempotent
    /// and terminates self-referential chains. Rows stamped by a sibling rule
    /// of the same invocation share the instant and do reappear in the
    /// stream, so `notified` keeps their hooks and tracker notification
    /// single-fire. Each newly stamped peer gets its pre event, its tracker
    /// notification and its post event before the next rule runs, and is
    /// enqueued so its own rules run under the same deletion instant.
    pub(super) async fn apply_cascade(
        &self,
        rule: &ResolutionRule,
        deleted: &EntityRef,
        deleted_at: DateTime<Utc>,
        queue: &mut VecDeque<EntityRef>,
        notified: &mut HashSet<EntityRef>,
    ) -> Result<()> {
        let field = rule.target_soft_delete_field.as_deref().ok_or_else(|| {
            SoftDeleteError::Cache(format!(
                "cascade rule {}.{} carries no soft-delete field",
                rule.owner_entity, rule.owner_property
            ))
        })?;

        let stamped = self
            .driver
            .mark_deleted_where_references(
                &rule.owner_entity,
                &rule.owner_property,
                &deleted.id,
                field,
                deleted_at,
            )
            .await?;
        if stamped == 0 {
            return Ok(());
        }
        event!(
            Level::DEBUG,
            owner = %rule.owner_entity,
            property = %rule.owner_property,
            stamped,
            "cascaded soft-delete"
        );

        let mut ids = self
            .driver
            .stream_ids_marked(
                &rule.owner_entity,
                &rule.owner_property,
                &deleted.id,
                field,
                deleted_at,
            )
            .await?;
        while let Some(id) = ids.next().await {
            let peer = EntityRef::new(rule.owner_entity.clone(), id?);
            if !notified.insert(peer.clone()) {
                continue;
            }
            let notification = SoftDeleteEvent::new(peer.clone(), deleted_at);

            self.dispatcher.dispatch_pre_soft_delete(&notification).await?;
            self.driver.notify_field_changed(
                &peer,
                field,
                FieldValue::Null,
                FieldValue::Timestamp(deleted_at),
            )?;
            self.dispatcher.dispatch_post_soft_delete(&notification).await?;

            queue.push_back(peer);
        }
        Ok(())
    }
}
