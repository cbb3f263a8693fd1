use tracing::{Level, event};

use crate::core::error::{Result, SoftDeleteError};
use crate::core::value::EntityRef;
use crate::metadata::ResolutionRule;

use super::executor::CascadeExecutor;

impl CascadeExecutor {
    /// Removes many-to-many join records pointing at the deleted entity
    /// without touching either side's soft-delete state.
    ///
    /// Counterpart ids are collected before any link is removed; mutations do
    /// not re-run the query. Which side of the link the deleted entity sits
    /// on decides the direction: a deleted peer is detached from every owning
    /// collection containing it, a deleted owner walks its own collection and
    /// drops the back-references. Self-referential links run both directions.
    pub(super) async fn apply_detach(
        &self,
        rule: &ResolutionRule,
        deleted: &EntityRef,
    ) -> Result<()> {
        let mut removed = 0u64;

        if deleted.entity == rule.target_entity {
            let owner_ids = self
                .driver
                .linked_owner_ids(&rule.owner_entity, &rule.owner_property, &deleted.id)
                .await
                .map_err(|err| accessor_not_found(&rule.owner_entity, &rule.owner_property, err))?;

            for owner_id in owner_ids {
                let owner = EntityRef::new(rule.owner_entity.clone(), owner_id);
                if self
                    .driver
                    .remove_link(&rule.owner_entity, &rule.owner_property, &owner.id, &deleted.id)
                    .await?
                {
                    self.driver
                        .notify_link_removed(&owner, &rule.owner_property, deleted)?;
                    removed += 1;
                }
            }
        }

        if deleted.entity == rule.owner_entity {
            let peer_ids = self
                .driver
                .linked_peer_ids(&rule.owner_entity, &rule.owner_property, &deleted.id)
                .await
                .map_err(|err| accessor_not_found(&rule.owner_entity, &rule.owner_property, err))?;

            for peer_id in peer_ids {
                let peer = EntityRef::new(rule.target_entity.clone(), peer_id);
                if self
                    .driver
                    .remove_link(&rule.owner_entity, &rule.owner_property, &deleted.id, &peer.id)
                    .await?
                {
                    // The surviving side gets the notification; without an
                    // inverse property that is the owner's own collection.
                    match rule.target_inverse_property.as_deref() {
                        Some(inverse) => {
                            self.driver.notify_link_removed(&peer, inverse, deleted)?
                        }
                        None => {
                            self.driver
                                .notify_link_removed(deleted, &rule.owner_property, &peer)?
                        }
                    }
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            event!(
                Level::DEBUG,
                owner = %rule.owner_entity,
                property = %rule.owner_property,
                removed,
                "detached association links"
            );
        }
        Ok(())
    }
}

fn accessor_not_found(entity: &str, property: &str, err: SoftDeleteError) -> SoftDeleteError {
    SoftDeleteError::AccessorNotFound {
        entity: entity.to_string(),
        property: property.to_string(),
        message: err.to_string(),
    }
}
