use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{Level, event};

use crate::core::error::Result;
use crate::core::value::EntityRef;
use crate::event::EventDispatcher;
use crate::mapping::DeletionPolicy;
use crate::metadata::{MetadataResolver, ResolutionRule};
use crate::session::PersistenceDriver;

/// Applies resolution rules when an entity is soft-deleted.
///
/// Recursion is a FIFO work queue: cascaded peers are enqueued and processed
/// breadth-first, so chain depth is bounded by the association graph rather
/// than the call stack. The rules of one entity run strictly in sequence; all
/// bulk mutations of a rule complete before the next rule starts.
pub struct CascadeExecutor {
    pub(super) driver: Arc<dyn PersistenceDriver>,
    pub(super) resolver: Arc<MetadataResolver>,
    pub(super) dispatcher: Arc<EventDispatcher>,
}

impl CascadeExecutor {
    pub fn new(
        driver: Arc<dyn PersistenceDriver>,
        resolver: Arc<MetadataResolver>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            driver,
            resolver,
            dispatcher,
        }
    }

    /// Cascade hook. The host calls this right after stamping `deleted_at`
    /// on `deleted`, before finalizing its change set. Every level of the
    /// resulting cascade shares that same instant.
    pub async fn on_soft_delete(
        &self,
        deleted: &EntityRef,
        deleted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.warm_up(&deleted.entity)?;

        let mut queue: VecDeque<EntityRef> = VecDeque::new();
        queue.push_back(deleted.clone());
        // The root was stamped by the host with this same instant, so it
        // matches its own entity's cascade streams.
        let mut notified: HashSet<EntityRef> = HashSet::new();
        notified.insert(deleted.clone());

        while let Some(current) = queue.pop_front() {
            let rules = self.resolver.rules_for(&current.entity)?;
            for rule in rules.into_values() {
                self.apply_rule(&rule, &current, deleted_at, &mut queue, &mut notified)
                    .await?;
            }
        }
        Ok(())
    }

    /// Metadata warm-up on the first delete of a cold type. Always a
    /// whole-schema pass: the rules affecting a type are written while its
    /// declaring types are computed, so a single-type pass cannot rebuild
    /// them.
    fn warm_up(&self, entity: &str) -> Result<()> {
        if self.resolver.has_cached(entity)? {
            return Ok(());
        }
        if !self.resolver.registry().contains(entity) {
            event!(
                Level::WARN,
                entity = %entity,
                "soft-delete event for an unregistered entity type"
            );
        }
        self.resolver.compute_all()?;
        if !self.resolver.has_cached(entity)? {
            self.resolver.compute_rules_for_entity(entity)?;
        }
        Ok(())
    }

    async fn apply_rule(
        &self,
        rule: &ResolutionRule,
        deleted: &EntityRef,
        deleted_at: DateTime<Utc>,
        queue: &mut VecDeque<EntityRef>,
        notified: &mut HashSet<EntityRef>,
    ) -> Result<()> {
        event!(
            Level::DEBUG,
            policy = %rule.policy,
            owner = %rule.owner_entity,
            property = %rule.owner_property,
            deleted = %deleted,
            "applying soft-delete rule"
        );
        match rule.policy {
            DeletionPolicy::Nullify => self.apply_nullify(rule, deleted).await,
            DeletionPolicy::Cascade => {
                self.apply_cascade(rule, deleted, deleted_at, queue, notified).await
            }
            DeletionPolicy::DetachAssociationOnly => self.apply_detach(rule, deleted).await,
        }
    }
}
