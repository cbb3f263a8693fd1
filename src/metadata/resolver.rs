use std::sync::Arc;

use tracing::{Level, event};

use crate::core::error::{Result, SoftDeleteError};
use crate::mapping::{
    AssociationDescriptor, AssociationKind, DeletionPolicy, EntityMapping, MappingRegistry,
};

use super::cache::MetadataCache;
use super::rule::{ResolutionRule, RuleMap};

/// Derives [`ResolutionRule`]s from registered mappings and keeps them in the
/// metadata cache, one bucket per entity type.
///
/// Validation is fail-fast: the first offending association aborts with the
/// declaring entity and property named in the error. Computation is
/// idempotent; recomputing a warm schema rewrites byte-identical payloads.
pub struct MetadataResolver {
    registry: MappingRegistry,
    cache: Arc<dyn MetadataCache>,
    namespace: String,
}

impl MetadataResolver {
    pub fn new(
        registry: MappingRegistry,
        cache: Arc<dyn MetadataCache>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            cache,
            namespace: namespace.into(),
        }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Cache key of one entity's rule bucket.
    pub fn cache_key(&self, entity: &str) -> String {
        format!("{}.rules.{}", self.namespace, entity)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Mapping-load hook: checks every policy-bearing association of one
    /// mapping without touching the cache.
    pub fn validate_entity(&self, mapping: &EntityMapping) -> Result<()> {
        for association in mapping.associations() {
            if association.policy().is_some() {
                self.validate_association(mapping, association)?;
            }
        }
        Ok(())
    }

    /// Validates the whole registry; intended for host startup so schema
    /// mistakes surface before the first delete.
    pub fn validate_all(&self) -> Result<()> {
        for name in self.registry.entity_names() {
            if let Some(mapping) = self.registry.entity(&name) {
                self.validate_entity(&mapping)?;
            }
        }
        Ok(())
    }

    fn validate_association(
        &self,
        mapping: &EntityMapping,
        association: &AssociationDescriptor,
    ) -> Result<()> {
        let Some(policy) = association.policy() else {
            return Ok(());
        };
        let entity = mapping.name();
        let property = association.name();

        if association.kind() == AssociationKind::OneToMany {
            return Err(SoftDeleteError::AssociationTypeNotSupported {
                entity: entity.to_string(),
                property: property.to_string(),
                reason: "one-to-many associations cannot carry a deletion policy; declare it on \
                         the owning to-one side"
                    .to_string(),
            });
        }

        // A bad or incapable target is reported before any policy shape
        // mismatch on the association itself.
        let Some(target) = self.registry.entity(association.target_entity()) else {
            return Err(SoftDeleteError::AssociationTargetNotFound {
                entity: entity.to_string(),
                property: property.to_string(),
                target: association.target_entity().to_string(),
            });
        };

        if policy == DeletionPolicy::Cascade {
            match target.soft_delete_field() {
                None => {
                    return Err(SoftDeleteError::TargetNotSoftDeletable {
                        entity: entity.to_string(),
                        property: property.to_string(),
                        target: target.name().to_string(),
                    });
                }
                Some(field) if field.is_empty() => {
                    return Err(SoftDeleteError::TargetSoftDeleteFieldEmpty {
                        entity: entity.to_string(),
                        property: property.to_string(),
                        target: target.name().to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        match policy {
            DeletionPolicy::Nullify | DeletionPolicy::Cascade => {
                if association.kind() == AssociationKind::ManyToMany {
                    return Err(SoftDeleteError::AssociationTypeNotSupported {
                        entity: entity.to_string(),
                        property: property.to_string(),
                        reason: format!(
                            "many-to-many associations only support {}",
                            DeletionPolicy::DetachAssociationOnly
                        ),
                    });
                }
            }
            DeletionPolicy::DetachAssociationOnly => {
                if association.kind() != AssociationKind::ManyToMany {
                    return Err(SoftDeleteError::AssociationTypeNotSupported {
                        entity: entity.to_string(),
                        property: property.to_string(),
                        reason: format!(
                            "{} is only valid on many-to-many associations",
                            DeletionPolicy::DetachAssociationOnly
                        ),
                    });
                }
                if !association.is_owning_side() {
                    return Err(SoftDeleteError::ManyToManyNotOnOwningSide {
                        entity: entity.to_string(),
                        property: property.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Computation
    // ------------------------------------------------------------------

    /// Ensures `name`'s bucket exists and appends the rules its
    /// policy-bearing associations imply into the buckets of the types they
    /// point at. Unregistered names still get a negative entry so the next
    /// delete event short-circuits on the cache.
    pub fn compute_rules_for_entity(&self, name: &str) -> Result<()> {
        match self.registry.entity(name) {
            Some(mapping) => self.compute_mapping(&mapping),
            None => self.ensure_bucket(name),
        }
    }

    /// Whole-schema pass in deterministic order. After it runs, every
    /// registered type has a cache entry, possibly empty.
    pub fn compute_all(&self) -> Result<()> {
        for name in self.registry.entity_names() {
            if let Some(mapping) = self.registry.entity(&name) {
                self.compute_mapping(&mapping)?;
            }
        }
        event!(
            Level::DEBUG,
            entities = self.registry.len(),
            "metadata warm-up complete"
        );
        Ok(())
    }

    fn compute_mapping(&self, mapping: &EntityMapping) -> Result<()> {
        self.ensure_bucket(mapping.name())?;
        if mapping.is_abstract() {
            return Ok(());
        }

        let mut rules = 0usize;
        for association in mapping.associations() {
            let Some(policy) = association.policy() else {
                continue;
            };
            self.validate_association(mapping, association)?;

            let rule = ResolutionRule {
                owner_entity: mapping.name().to_string(),
                owner_property: association.name().to_string(),
                target_entity: association.target_entity().to_string(),
                target_inverse_property: association.inverse_property().map(str::to_string),
                target_soft_delete_field: match policy {
                    DeletionPolicy::Cascade => self
                        .registry
                        .entity(association.target_entity())
                        .and_then(|target| target.soft_delete_field().map(str::to_string)),
                    _ => None,
                },
                kind: association.kind(),
                unidirectional: association.is_unidirectional(),
                policy,
            };

            let bucket_key = rule.bucket_key().to_string();
            self.append_rule(&rule.target_entity, &bucket_key, rule.clone())?;

            // Detach works from either side of the link, so the declaring
            // side gets the same rule under its own property name.
            if policy == DeletionPolicy::DetachAssociationOnly
                && rule.owner_entity != rule.target_entity
            {
                let owner = rule.owner_entity.clone();
                let key = rule.owner_property.clone();
                self.append_rule(&owner, &key, rule)?;
            }
            rules += 1;
        }

        event!(
            Level::DEBUG,
            entity = %mapping.name(),
            rules,
            "computed soft-delete rules"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cache access
    // ------------------------------------------------------------------

    /// Whether a bucket (possibly empty) is cached for `entity`.
    pub fn has_cached(&self, entity: &str) -> Result<bool> {
        self.cache.contains(&self.cache_key(entity))
    }

    /// Decoded rule bucket; a missing entry decodes to the empty map.
    pub fn rules_for(&self, entity: &str) -> Result<RuleMap> {
        match self.cache.get(&self.cache_key(entity))? {
            Some(payload) => serde_json::from_str(&payload).map_err(|err| {
                SoftDeleteError::Cache(format!("corrupt rule bucket for '{entity}': {err}"))
            }),
            None => Ok(RuleMap::new()),
        }
    }

    pub fn invalidate(&self, entity: &str) -> Result<()> {
        self.cache.remove(&self.cache_key(entity))
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.cache.clear()
    }

    fn ensure_bucket(&self, entity: &str) -> Result<()> {
        if !self.cache.contains(&self.cache_key(entity))? {
            self.write_bucket(entity, &RuleMap::new())?;
        }
        Ok(())
    }

    fn append_rule(&self, entity: &str, bucket_key: &str, rule: ResolutionRule) -> Result<()> {
        let mut bucket = self.rules_for(entity)?;
        bucket.insert(bucket_key.to_string(), rule);
        self.write_bucket(entity, &bucket)
    }

    fn write_bucket(&self, entity: &str, bucket: &RuleMap) -> Result<()> {
        let payload = serde_json::to_string(bucket).map_err(|err| {
            SoftDeleteError::Cache(format!("cannot encode rule bucket for '{entity}': {err}"))
        })?;
        self.cache.put(&self.cache_key(entity), payload)
    }
}
