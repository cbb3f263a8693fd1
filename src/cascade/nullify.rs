use tracing::{Level, event};

use crate::core::error::Result;
use crate::core::value::{EntityRef, FieldValue};
use crate::metadata::ResolutionRule;

use super::executor::CascadeExecutor;

impl CascadeExecutor {
    /// Clears every reference to the deleted entity with one bulk update and
    /// reports the transition per peer so tracked state stays in sync.
    ///
    /// Ids are read before the update runs; afterwards the reference column
    /// no longer matches. Re-running against already nullified peers matches
    /// no rows, so the rule is naturally idempotent.
    pub(super) async fn apply_nullify(
        &self,
        rule: &ResolutionRule,
        deleted: &EntityRef,
    ) -> Result<()> {
        let peer_ids = self
            .driver
            .referencing_ids(&rule.owner_entity, &rule.owner_property, &deleted.id)
            .await?;
        if peer_ids.is_empty() {
            return Ok(());
        }

        let updated = self
            .driver
            .clear_references(&rule.owner_entity, &rule.owner_property, &deleted.id)
            .await?;

        for id in peer_ids {
            let peer = EntityRef::new(rule.owner_entity.clone(), id);
            self.driver.notify_field_changed(
                &peer,
                &rule.owner_property,
                FieldValue::Reference(deleted.id),
                FieldValue::Null,
            )?;
        }

        event!(
            Level::DEBUG,
            owner = %rule.owner_entity,
            property = %rule.owner_property,
            updated,
            "nullified references"
        );
        Ok(())
    }
}
