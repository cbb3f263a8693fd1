// ============================================================================
// softcascade Library
// ============================================================================

pub mod core;
pub mod mapping;
pub mod metadata;
pub mod event;
pub mod session;
pub mod cascade;
pub mod config;
pub mod engine;
pub mod backend;

// Re-export main types for convenience
pub use crate::core::{EntityId, EntityRef, FieldValue, Result, SoftDeleteError};
pub use crate::engine::SoftDeleteEngine;

// Re-export schema and metadata API
pub use crate::config::CascadeConfig;
pub use crate::mapping::{
    AssociationDescriptor, AssociationKind, DeletionPolicy, EntityMapping, MappingRegistry,
};
pub use crate::metadata::{
    InMemoryMetadataCache, MetadataCache, MetadataResolver, ResolutionRule, RuleMap,
};

// Re-export runtime seams
pub use crate::backend::{InMemoryDriver, TrackedChange};
pub use crate::cascade::CascadeExecutor;
pub use crate::event::{EventDispatcher, SoftDeleteEvent, SoftDeleteListener};
pub use crate::session::{ChangeTracker, PersistenceDriver};
