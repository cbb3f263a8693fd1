use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::Result;
use crate::core::value::EntityRef;

/// Payload delivered to listeners around each cascaded soft-delete.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDeleteEvent {
    pub entity: EntityRef,
    pub deleted_at: DateTime<Utc>,
}

impl SoftDeleteEvent {
    pub fn new(entity: EntityRef, deleted_at: DateTime<Utc>) -> Self {
        Self { entity, deleted_at }
    }
}

/// Observer notified when the executor soft-deletes an entity by cascade.
///
/// Both hooks default to no-ops. A returned error aborts the running cascade
/// and propagates to the caller; nothing is swallowed.
#[async_trait]
pub trait SoftDeleteListener: Send + Sync {
    /// Diagnostic name, shown in dispatcher listings.
    fn name(&self) -> &'static str;

    async fn pre_soft_delete(&self, _event: &SoftDeleteEvent) -> Result<()> {
        Ok(())
    }

    async fn post_soft_delete(&self, _event: &SoftDeleteEvent) -> Result<()> {
        Ok(())
    }
}

/// In-process dispatcher; listeners run sequentially in registration order.
///
/// Cascade recursion never goes through this bus (peers are enqueued by the
/// executor itself), so registering observers cannot double-run a cascade.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn SoftDeleteListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn SoftDeleteListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_names(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub async fn dispatch_pre_soft_delete(&self, event: &SoftDeleteEvent) -> Result<()> {
        for listener in &self.listeners {
            listener.pre_soft_delete(event).await?;
        }
        Ok(())
    }

    pub async fn dispatch_post_soft_delete(&self, event: &SoftDeleteEvent) -> Result<()> {
        for listener in &self.listeners {
            listener.post_soft_delete(event).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_names())
            .finish()
    }
}
