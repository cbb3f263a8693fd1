use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug_span};

use crate::cascade::CascadeExecutor;
use crate::config::CascadeConfig;
use crate::core::error::Result;
use crate::core::value::EntityRef;
use crate::event::{EventDispatcher, SoftDeleteListener};
use crate::mapping::MappingRegistry;
use crate::metadata::{InMemoryMetadataCache, MetadataCache, MetadataResolver, RuleMap};
use crate::session::PersistenceDriver;

/// Facade wiring the mapping registry, metadata cache, resolver, event
/// dispatcher and cascade executor together.
///
/// Hosts hand it two things at construction: the registered schema and a
/// [`PersistenceDriver`]. Everything else (cache backend, configuration,
/// listeners) is attached through consuming chainers before first use.
///
/// Two entry points face the host: [`Self::validate_mappings`] when mappings
/// are loaded, and [`Self::on_soft_delete`] right after a deletion timestamp
/// is stamped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use chrono::Utc;
/// use softcascade::{
///     AssociationDescriptor, DeletionPolicy, EntityMapping, EntityRef, FieldValue,
///     InMemoryDriver, MappingRegistry, SoftDeleteEngine,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> softcascade::Result<()> {
/// let registry = MappingRegistry::new()
///     .with_entity(
///         EntityMapping::new("author")
///             .soft_deletable("deleted_at")
///             .association(
///                 AssociationDescriptor::one_to_many("posts", "post").mapped_by("author"),
///             ),
///     )?
///     .with_entity(
///         EntityMapping::new("post")
///             .soft_deletable("deleted_at")
///             .association(
///                 AssociationDescriptor::many_to_one("author", "author")
///                     .inversed_by("posts")
///                     .on_delete(DeletionPolicy::Cascade),
///             ),
///     )?;
///
/// let driver = Arc::new(InMemoryDriver::new());
/// let engine = SoftDeleteEngine::new(registry, driver.clone());
/// engine.validate_mappings()?;
///
/// let author = driver.insert("author", vec![("deleted_at", FieldValue::Null)]).await;
/// let post = driver
///     .insert(
///         "post",
///         vec![
///             ("author", FieldValue::Reference(author)),
///             ("deleted_at", FieldValue::Null),
///         ],
///     )
///     .await;
///
/// // The host stamps the root itself, then hands the cascade off.
/// let now = Utc::now();
/// driver.set_field("author", &author, "deleted_at", FieldValue::Timestamp(now)).await?;
/// engine.on_soft_delete(&EntityRef::new("author", author), now).await?;
///
/// assert_eq!(
///     driver.field("post", &post, "deleted_at").await?,
///     FieldValue::Timestamp(now),
/// );
/// # Ok(())
/// # }
/// ```
pub struct SoftDeleteEngine {
    registry: MappingRegistry,
    driver: Arc<dyn PersistenceDriver>,
    cache: Arc<dyn MetadataCache>,
    config: CascadeConfig,
    dispatcher: EventDispatcher,
    resolver: Arc<MetadataResolver>,
    executor: CascadeExecutor,
}

impl SoftDeleteEngine {
    pub fn new(registry: MappingRegistry, driver: Arc<dyn PersistenceDriver>) -> Self {
        let cache: Arc<dyn MetadataCache> = Arc::new(InMemoryMetadataCache::new());
        let config = CascadeConfig::default();
        let dispatcher = EventDispatcher::new();
        let resolver = Arc::new(MetadataResolver::new(
            registry.clone(),
            Arc::clone(&cache),
            config.cache_namespace.clone(),
        ));
        let executor = CascadeExecutor::new(
            Arc::clone(&driver),
            Arc::clone(&resolver),
            Arc::new(dispatcher.clone()),
        );
        Self {
            registry,
            driver,
            cache,
            config,
            dispatcher,
            resolver,
            executor,
        }
    }

    /// Swaps the metadata cache backend (defaults to
    /// [`InMemoryMetadataCache`]).
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = cache;
        self.rebuild()
    }

    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self.rebuild()
    }

    /// Registers an observer for cascaded soft-deletes. Listeners run in
    /// registration order.
    pub fn register_listener(mut self, listener: Arc<dyn SoftDeleteListener>) -> Self {
        self.dispatcher.register(listener);
        self.rebuild()
    }

    fn rebuild(mut self) -> Self {
        self.resolver = Arc::new(MetadataResolver::new(
            self.registry.clone(),
            Arc::clone(&self.cache),
            self.config.cache_namespace.clone(),
        ));
        self.executor = CascadeExecutor::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.resolver),
            Arc::new(self.dispatcher.clone()),
        );
        self
    }

    /// Mapping-load hook: validates every registered mapping, failing on the
    /// first offending association.
    pub fn validate_mappings(&self) -> Result<()> {
        self.resolver.validate_all()
    }

    /// Eagerly computes and caches rules for the whole schema.
    pub fn warm_metadata(&self) -> Result<()> {
        self.resolver.compute_all()
    }

    /// Cascade hook: resolves and applies every rule triggered by the
    /// deletion of `entity`, recursively, under the given instant.
    pub async fn on_soft_delete(
        &self,
        entity: &EntityRef,
        deleted_at: DateTime<Utc>,
    ) -> Result<()> {
        let span = debug_span!("cascade", entity = %entity.entity, id = %entity.id);
        self.executor
            .on_soft_delete(entity, deleted_at)
            .instrument(span)
            .await
    }

    /// Drops every cached bucket; the next delete recomputes lazily.
    pub fn invalidate_metadata(&self) -> Result<()> {
        self.resolver.invalidate_all()
    }

    /// Decoded rule bucket for one entity type.
    pub fn rules_for(&self, entity: &str) -> Result<RuleMap> {
        self.resolver.rules_for(entity)
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }
}
