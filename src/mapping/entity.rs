use serde::{Deserialize, Serialize};

use super::association::AssociationDescriptor;

/// Registered mapping of one entity type: its soft-delete declaration and
/// association properties. Replaces attribute reflection with data assembled
/// at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    name: String,
    is_abstract: bool,
    soft_delete_field: Option<String>,
    associations: Vec<AssociationDescriptor>,
}

impl EntityMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            soft_delete_field: None,
            associations: Vec::new(),
        }
    }

    /// Declares the timestamp field the host stamps when soft-deleting this
    /// type.
    pub fn soft_deletable(mut self, field: impl Into<String>) -> Self {
        self.soft_delete_field = Some(field.into());
        self
    }

    /// Abstract mappings never own rows; rule computation skips their
    /// associations.
    pub fn abstract_entity(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn soft_delete_field(&self) -> Option<&str> {
        self.soft_delete_field.as_deref()
    }

    /// True when a non-empty soft-delete field is declared.
    pub fn is_soft_deletable(&self) -> bool {
        self.soft_delete_field.as_deref().is_some_and(|field| !field.is_empty())
    }

    pub fn associations(&self) -> &[AssociationDescriptor] {
        &self.associations
    }

    pub fn association_named(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name() == name)
    }
}
