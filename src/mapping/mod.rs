pub mod association;
pub mod entity;
pub mod policy;
pub mod registry;

pub use association::{AssociationDescriptor, AssociationKind};
pub use entity::EntityMapping;
pub use policy::DeletionPolicy;
pub use registry::MappingRegistry;
