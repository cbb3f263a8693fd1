/// Metadata resolution and cache behavior tests
///
/// Rule buckets, namespacing, warm-up, invalidation and corrupt payloads
/// Run with: cargo test --test metadata_cache_tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use softcascade::{
    AssociationDescriptor, AssociationKind, CascadeConfig, DeletionPolicy, EntityId,
    EntityMapping, EntityRef, FieldValue, InMemoryDriver, InMemoryMetadataCache, MappingRegistry,
    MetadataCache, Result, SoftDeleteEngine, SoftDeleteError,
};

/// Delegating cache that logs every write, so tests can count warm-ups and
/// compare payload bytes across recomputations.
struct RecordingCache {
    inner: InMemoryMetadataCache,
    puts: Mutex<Vec<(String, String)>>,
}

impl RecordingCache {
    fn new() -> Self {
        Self {
            inner: InMemoryMetadataCache::new(),
            puts: Mutex::new(Vec::new()),
        }
    }

    fn put_log(&self) -> Vec<(String, String)> {
        self.puts.lock().unwrap().clone()
    }

    fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

impl MetadataCache for RecordingCache {
    fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(key)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, payload: String) -> Result<()> {
        self.puts.lock().unwrap().push((key.to_string(), payload.clone()));
        self.inner.put(key, payload)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

fn blog_registry() -> MappingRegistry {
    MappingRegistry::new()
        .with_entity(
            EntityMapping::new("author").soft_deletable("deleted_at").association(
                AssociationDescriptor::one_to_many("posts", "post").mapped_by("author"),
            ),
        )
        .unwrap()
        .with_entity(
            EntityMapping::new("post")
                .soft_deletable("deleted_at")
                .association(
                    AssociationDescriptor::many_to_one("author", "author")
                        .inversed_by("posts")
                        .on_delete(DeletionPolicy::Cascade),
                )
                .association(
                    AssociationDescriptor::many_to_many("tags", "tag")
                        .inversed_by("posts")
                        .on_delete(DeletionPolicy::DetachAssociationOnly),
                ),
        )
        .unwrap()
        .with_entity(EntityMapping::new("tag").soft_deletable("deleted_at"))
        .unwrap()
}

#[tokio::test]
async fn test_ruleless_types_cache_an_empty_bucket() {
    let registry = MappingRegistry::new()
        .with_entity(EntityMapping::new("tag").soft_deletable("deleted_at"))
        .unwrap();
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(registry, driver.clone());

    let tag = driver.insert("tag", vec![("deleted_at", FieldValue::Null)]).await;
    engine.on_soft_delete(&EntityRef::new("tag", tag), Utc::now()).await.unwrap();

    assert!(engine.resolver().has_cached("tag").unwrap());
    assert!(engine.rules_for("tag").unwrap().is_empty());
    assert!(driver.tracked_changes().unwrap().is_empty());
}

#[test]
fn test_cache_keys_carry_the_configured_namespace() {
    let cache = Arc::new(RecordingCache::new());
    let engine = SoftDeleteEngine::new(blog_registry(), Arc::new(InMemoryDriver::new()))
        .with_cache(cache.clone())
        .with_config(CascadeConfig::new().with_cache_namespace("acme"));

    engine.warm_metadata().unwrap();

    let log = cache.put_log();
    assert!(!log.is_empty());
    assert!(log.iter().all(|(key, _)| key.starts_with("acme.rules.")));
    assert!(log.iter().any(|(key, _)| key == "acme.rules.author"));
    assert!(cache.contains("acme.rules.tag").unwrap());
}

#[tokio::test]
async fn test_unknown_entity_types_get_a_negative_entry() {
    let cache = Arc::new(RecordingCache::new());
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(blog_registry(), driver.clone()).with_cache(cache.clone());

    let ghost = EntityRef::new("ghost", EntityId::new());
    engine.on_soft_delete(&ghost, Utc::now()).await.unwrap();

    assert!(engine.resolver().has_cached("ghost").unwrap());
    assert!(engine.rules_for("ghost").unwrap().is_empty());
    assert!(driver.tracked_changes().unwrap().is_empty());

    // The negative entry short-circuits the next event for the same type.
    let writes = cache.put_count();
    engine.on_soft_delete(&ghost, Utc::now()).await.unwrap();
    assert_eq!(cache.put_count(), writes);
}

#[test]
fn test_abstract_entities_contribute_no_rules() {
    let registry = MappingRegistry::new()
        .with_entity(
            EntityMapping::new("content")
                .abstract_entity()
                .soft_deletable("deleted_at")
                .association(
                    AssociationDescriptor::many_to_one("site", "site")
                        .on_delete(DeletionPolicy::Cascade),
                ),
        )
        .unwrap()
        .with_entity(EntityMapping::new("site").soft_deletable("deleted_at"))
        .unwrap();
    let engine = SoftDeleteEngine::new(registry, Arc::new(InMemoryDriver::new()));

    engine.warm_metadata().unwrap();

    assert!(engine.resolver().has_cached("content").unwrap());
    assert!(engine.rules_for("content").unwrap().is_empty());
    // The cascade declared on the abstract base never materializes.
    assert!(engine.rules_for("site").unwrap().is_empty());
}

#[tokio::test]
async fn test_warm_up_runs_once() {
    let cache = Arc::new(RecordingCache::new());
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(blog_registry(), driver.clone()).with_cache(cache.clone());

    let author = driver.insert("author", vec![("deleted_at", FieldValue::Null)]).await;
    let tag = driver.insert("tag", vec![("deleted_at", FieldValue::Null)]).await;

    engine.on_soft_delete(&EntityRef::new("author", author), Utc::now()).await.unwrap();
    let writes = cache.put_count();
    assert!(writes > 0);

    // Second delete, even of another type, finds the whole schema warm.
    engine.on_soft_delete(&EntityRef::new("tag", tag), Utc::now()).await.unwrap();
    assert_eq!(cache.put_count(), writes);
}

#[tokio::test]
async fn test_a_cold_delete_warms_rules_declared_by_other_types() {
    // The author's inbound cascade lives in the post mapping; a warm-up that
    // computed only the deleted type would never see it.
    let cache = Arc::new(RecordingCache::new());
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(blog_registry(), driver.clone()).with_cache(cache.clone());

    let author = driver.insert("author", vec![("deleted_at", FieldValue::Null)]).await;
    let post = driver
        .insert(
            "post",
            vec![
                ("author", FieldValue::Reference(author)),
                ("deleted_at", FieldValue::Null),
            ],
        )
        .await;

    let now = Utc::now();
    driver
        .set_field("author", &author, "deleted_at", FieldValue::Timestamp(now))
        .await
        .unwrap();
    engine.on_soft_delete(&EntityRef::new("author", author), now).await.unwrap();

    assert_eq!(
        driver.field("post", &post, "deleted_at").await.unwrap(),
        FieldValue::Timestamp(now)
    );
    let keys: Vec<String> = cache.put_log().into_iter().map(|(key, _)| key).collect();
    assert!(keys.contains(&"softcascade.rules.post".to_string()));
    assert!(keys.contains(&"softcascade.rules.tag".to_string()));
}

#[tokio::test]
async fn test_invalidate_metadata_forces_a_recompute() {
    let cache = Arc::new(RecordingCache::new());
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(blog_registry(), driver.clone()).with_cache(cache.clone());

    engine.warm_metadata().unwrap();
    let writes = cache.put_count();

    engine.invalidate_metadata().unwrap();
    assert!(!engine.resolver().has_cached("author").unwrap());

    let author = driver.insert("author", vec![("deleted_at", FieldValue::Null)]).await;
    engine.on_soft_delete(&EntityRef::new("author", author), Utc::now()).await.unwrap();

    assert!(cache.put_count() > writes);
    assert!(engine.rules_for("author").unwrap().contains_key("posts"));
}

#[test]
fn test_recomputation_rewrites_identical_payloads() {
    let cache = Arc::new(RecordingCache::new());
    let engine = SoftDeleteEngine::new(blog_registry(), Arc::new(InMemoryDriver::new()))
        .with_cache(cache.clone());

    engine.warm_metadata().unwrap();
    let first: HashMap<String, String> = cache.put_log().into_iter().collect();

    engine.warm_metadata().unwrap();
    let second: HashMap<String, String> = cache.put_log().into_iter().collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_corrupt_payloads_surface_as_cache_errors() {
    let cache = Arc::new(InMemoryMetadataCache::new());
    let driver = Arc::new(InMemoryDriver::new());
    let engine = SoftDeleteEngine::new(blog_registry(), driver.clone()).with_cache(cache.clone());

    cache.put("softcascade.rules.author", "{not json".to_string()).unwrap();

    let author = driver.insert("author", vec![("deleted_at", FieldValue::Null)]).await;
    let res = engine.on_soft_delete(&EntityRef::new("author", author), Utc::now()).await;
    match res {
        Err(SoftDeleteError::Cache(message)) => {
            assert!(message.contains("corrupt rule bucket"));
            assert!(message.contains("author"));
        }
        _ => panic!("Expected Cache error, got {:?}", res),
    }
}

#[test]
fn test_cascade_rules_land_in_the_target_bucket() {
    let engine = SoftDeleteEngine::new(blog_registry(), Arc::new(InMemoryDriver::new()));
    engine.warm_metadata().unwrap();

    let rules = engine.rules_for("author").unwrap();
    let rule = rules.get("posts").expect("cascade rule keyed by the inverse property");
    assert_eq!(rule.owner_entity, "post");
    assert_eq!(rule.owner_property, "author");
    assert_eq!(rule.target_entity, "author");
    assert_eq!(rule.target_soft_delete_field.as_deref(), Some("deleted_at"));
    assert_eq!(rule.kind, AssociationKind::ManyToOne);
    assert_eq!(rule.policy, DeletionPolicy::Cascade);
    assert!(!rule.unidirectional);

    // The declaring side holds no copy of a cascade rule.
    assert!(!engine.rules_for("post").unwrap().contains_key("author"));
}

#[test]
fn test_detach_rules_are_keyed_on_both_sides() {
    let engine = SoftDeleteEngine::new(blog_registry(), Arc::new(InMemoryDriver::new()));
    engine.warm_metadata().unwrap();

    let tag_side = engine.rules_for("tag").unwrap();
    let post_side = engine.rules_for("post").unwrap();
    let from_tag = tag_side.get("posts").expect("detach rule in the tag bucket");
    let from_post = post_side.get("tags").expect("mirrored detach rule in the post bucket");

    assert_eq!(from_tag, from_post);
    assert_eq!(from_tag.owner_entity, "post");
    assert_eq!(from_tag.owner_property, "tags");
    assert_eq!(from_tag.policy, DeletionPolicy::DetachAssociationOnly);
}
